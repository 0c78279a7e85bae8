//! Suggestion Worker Thread
//!
//! Each binding owns one worker. It serializes that binding's store I/O and
//! ranking queries off the UI thread and reports results back over a channel.
//! Every store job is bounded by an I/O timeout; a job past its deadline is
//! reported as failed and its eventual result is dropped.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::engine::SuggestionEngine;
use super::types::{QueryError, SuggestionQuery, WorkerRequest, WorkerResponse};
use crate::store::{StoreError, with_store};

/// Channel endpoints of a running worker, held by the UI thread
#[derive(Debug)]
pub struct WorkerHandle {
    request_tx: Sender<WorkerRequest>,
    response_rx: Receiver<WorkerResponse>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a worker thread for one binding
    pub fn spawn(
        engine: SuggestionEngine,
        io_timeout: Duration,
        name: &str,
    ) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name(format!("formfill-worker-{name}"))
            .spawn(move || {
                worker_loop(engine, io_timeout, request_rx, response_tx);
            })?;

        Ok(Self {
            request_tx,
            response_rx,
            thread: Some(thread),
        })
    }

    /// Wrap existing channels without spawning a thread
    pub fn from_channels(
        request_tx: Sender<WorkerRequest>,
        response_rx: Receiver<WorkerResponse>,
    ) -> Self {
        Self {
            request_tx,
            response_rx,
            thread: None,
        }
    }

    /// Queue a request. Returns false if the worker has shut down.
    pub fn send(&self, request: WorkerRequest) -> bool {
        self.request_tx.send(request).is_ok()
    }

    /// Next pending response, if any
    pub fn try_recv(&self) -> Option<WorkerResponse> {
        self.response_rx.try_recv().ok()
    }

    /// Block up to `timeout` for the next response
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }

    /// Close the request channel and wait for queued jobs to drain
    pub fn shutdown(self) {
        let WorkerHandle {
            request_tx, thread, ..
        } = self;
        drop(request_tx);
        if let Some(thread) = thread
            && thread.join().is_err()
        {
            log::warn!("Suggestion worker panicked during shutdown");
        }
    }
}

/// Main worker loop - processes requests until the channel is closed
fn worker_loop(
    engine: SuggestionEngine,
    io_timeout: Duration,
    request_rx: Receiver<WorkerRequest>,
    response_tx: Sender<WorkerResponse>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start suggestion worker runtime: {}", e);
            return;
        }
    };

    while let Ok(request) = request_rx.recv() {
        match request {
            WorkerRequest::Query {
                query,
                request_id,
                cancel,
            } => {
                let response =
                    runtime.block_on(handle_query(&engine, query, request_id, cancel, io_timeout));
                if response_tx.send(response).is_err() {
                    // UI side dropped the binding
                    break;
                }
            }
            WorkerRequest::Save {
                field_identifier,
                value,
                field_type,
                source,
                url_scope,
            } => {
                let store = engine.store().clone();
                let result = runtime.block_on(run_bounded(io_timeout, move || {
                    with_store(&store, |s| {
                        s.upsert(
                            &field_identifier,
                            &value,
                            &field_type,
                            source,
                            url_scope.as_deref(),
                        )
                    })
                }));
                match result {
                    Ok(id) => log::debug!("Saved suggestion {}", id),
                    Err(StoreError::Rejected(_)) => {}
                    Err(e) => log::warn!("Failed to save suggestion: {}", e),
                }
            }
            WorkerRequest::Delete { id } => {
                let store = engine.store().clone();
                let result = runtime.block_on(run_bounded(io_timeout, move || {
                    with_store(&store, |s| s.delete(id))
                }));
                if let Err(e) = result {
                    log::warn!("Failed to delete suggestion {}: {}", id, e);
                }
            }
        }
    }

    // Timed-out jobs may still hold the store lock; don't wait on them forever
    runtime.shutdown_timeout(io_timeout);
    log::debug!("Suggestion worker shutting down");
}

/// Run one ranking query, racing it against cancellation and the I/O timeout
async fn handle_query(
    engine: &SuggestionEngine,
    query: SuggestionQuery,
    request_id: u64,
    cancel: CancellationToken,
    io_timeout: Duration,
) -> WorkerResponse {
    if cancel.is_cancelled() {
        return WorkerResponse::Cancelled { request_id };
    }

    let field_identifier = query.field_identifier.clone();
    let job_engine = engine.clone();
    let job_cancel = cancel.clone();
    let job = tokio::task::spawn_blocking(move || job_engine.run(&query, &job_cancel));

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            log::debug!("Cancelled suggestion request {}", request_id);
            return WorkerResponse::Cancelled { request_id };
        }
        outcome = tokio::time::timeout(io_timeout, job) => outcome,
    };

    match outcome {
        Ok(Ok(Ok(candidates))) => WorkerResponse::Complete {
            request_id,
            field_identifier,
            candidates,
        },
        Ok(Ok(Err(QueryError::Cancelled))) => WorkerResponse::Cancelled { request_id },
        Ok(Ok(Err(QueryError::Store(e)))) => {
            log::warn!("Suggestion query {} failed: {}", request_id, e);
            WorkerResponse::Failed {
                request_id,
                error: e.to_string(),
            }
        }
        Ok(Err(join_error)) => WorkerResponse::Failed {
            request_id,
            error: StoreError::Aborted(join_error.to_string()).to_string(),
        },
        Err(_) => {
            let error = StoreError::Timeout(io_timeout.as_millis() as u64);
            log::warn!("Suggestion query {} failed: {}", request_id, error);
            WorkerResponse::Failed {
                request_id,
                error: error.to_string(),
            }
        }
    }
}

/// Run a blocking store job with an upper bound on its duration
async fn run_bounded<T, F>(io_timeout: Duration, job: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::time::timeout(io_timeout, tokio::task::spawn_blocking(job)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(StoreError::Aborted(join_error.to_string())),
        Err(_) => Err(StoreError::Timeout(io_timeout.as_millis() as u64)),
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod worker_tests;
