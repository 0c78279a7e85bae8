//! Messages exchanged with the suggestion worker

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::store::{RecordId, StoreError, SuggestionRecord, SuggestionSource};

/// Errors produced while computing suggestions
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A ranked-candidate request for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionQuery {
    pub field_identifier: String,
    pub url_scope: Option<String>,
    /// In-progress value typed into the field, narrows the candidates
    pub seed: Option<String>,
    pub limit: usize,
}

impl SuggestionQuery {
    pub fn new(field_identifier: impl Into<String>) -> Self {
        Self {
            field_identifier: field_identifier.into(),
            url_scope: None,
            seed: None,
            limit: super::DEFAULT_LIMIT,
        }
    }

    pub fn with_scope(mut self, url_scope: Option<String>) -> Self {
        self.url_scope = url_scope;
        self
    }

    pub fn with_seed(mut self, seed: Option<String>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Request messages sent to a binding's worker thread
#[derive(Debug)]
pub enum WorkerRequest {
    /// Compute ranked candidates
    Query {
        query: SuggestionQuery,
        /// Unique ID for this request, used to filter stale responses
        request_id: u64,
        cancel: CancellationToken,
    },
    /// Persist a submitted or selected value
    Save {
        field_identifier: String,
        value: String,
        field_type: String,
        source: SuggestionSource,
        url_scope: Option<String>,
    },
    /// Remove a stored record
    Delete { id: RecordId },
}

/// Response messages received from a binding's worker thread
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    /// Candidates for the request
    Complete {
        request_id: u64,
        field_identifier: String,
        candidates: Vec<SuggestionRecord>,
    },
    /// The request was cancelled before it finished
    Cancelled { request_id: u64 },
    /// The store failed or timed out
    Failed { request_id: u64, error: String },
}

impl WorkerResponse {
    pub fn request_id(&self) -> u64 {
        match self {
            WorkerResponse::Complete { request_id, .. }
            | WorkerResponse::Cancelled { request_id }
            | WorkerResponse::Failed { request_id, .. } => *request_id,
        }
    }
}
