use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::store::{RecordId, SuggestionRecord};
use crate::suggestions::{SuggestionQuery, WorkerHandle, WorkerRequest, WorkerResponse};

/// What the suggestion surface currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PanelState {
    #[default]
    Hidden,
    /// A query for the field is in flight
    Loading(String),
    /// Ranked candidates for the field
    Shown(String, Vec<SuggestionRecord>),
    /// The query finished without candidates
    Empty(String),
}

impl PanelState {
    pub fn field(&self) -> Option<&str> {
        match self {
            PanelState::Hidden => None,
            PanelState::Loading(field) | PanelState::Shown(field, _) | PanelState::Empty(field) => {
                Some(field)
            }
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, PanelState::Hidden)
    }

    pub fn candidates(&self) -> &[SuggestionRecord] {
        match self {
            PanelState::Shown(_, candidates) => candidates,
            _ => &[],
        }
    }
}

#[derive(Debug)]
struct InFlight {
    request_id: u64,
    field_identifier: String,
    cancel: CancellationToken,
    /// Candidates removed after the query was issued; its results predate the delete
    removed: HashSet<RecordId>,
}

/// Panel state plus the bookkeeping for its in-flight query
///
/// Request IDs increase monotonically. Only the response to the latest
/// request may change the panel, and only while its field is still focused.
#[derive(Debug, Default)]
pub struct PanelStateMachine {
    state: PanelState,
    request_id: u64,
    in_flight: Option<InFlight>,
}

impl PanelStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// ID of the most recent request
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a query, cancelling whatever was in flight
    ///
    /// A panel already showing results for the same field keeps them until
    /// the new results arrive. Returns false if the worker is gone, in which
    /// case the panel is hidden.
    pub fn request(&mut self, worker: &WorkerHandle, query: SuggestionQuery) -> bool {
        self.cancel_in_flight();
        self.request_id = self.request_id.wrapping_add(1);

        let field_identifier = query.field_identifier.clone();
        let cancel = CancellationToken::new();
        let sent = worker.send(WorkerRequest::Query {
            query,
            request_id: self.request_id,
            cancel: cancel.clone(),
        });
        if !sent {
            log::warn!("Suggestion worker unavailable, hiding panel");
            self.state = PanelState::Hidden;
            return false;
        }

        let keep_current = matches!(
            &self.state,
            PanelState::Shown(field, _) | PanelState::Empty(field) if *field == field_identifier
        );
        if !keep_current {
            self.state = PanelState::Loading(field_identifier.clone());
        }
        self.in_flight = Some(InFlight {
            request_id: self.request_id,
            field_identifier,
            cancel,
            removed: HashSet::new(),
        });
        true
    }

    /// Apply a worker response. Returns whether the panel state changed.
    ///
    /// `focused` is the field focused at the time the response is applied.
    pub fn on_response(&mut self, response: WorkerResponse, focused: Option<&str>) -> bool {
        let is_current = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.request_id == response.request_id());
        if !is_current {
            log::trace!("Discarding stale response {}", response.request_id());
            return false;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };

        match response {
            WorkerResponse::Complete {
                field_identifier,
                mut candidates,
                ..
            } => {
                if field_identifier != in_flight.field_identifier
                    || focused != Some(field_identifier.as_str())
                {
                    log::debug!("Discarding results for unfocused field {}", field_identifier);
                    return false;
                }
                candidates.retain(|c| !in_flight.removed.contains(&c.id));
                self.state = if candidates.is_empty() {
                    PanelState::Empty(field_identifier)
                } else {
                    PanelState::Shown(field_identifier, candidates)
                };
                true
            }
            WorkerResponse::Cancelled { .. } => false,
            WorkerResponse::Failed { error, .. } => {
                log::warn!(
                    "Suggestions for {} unavailable: {}",
                    in_flight.field_identifier,
                    error
                );
                self.set_hidden()
            }
        }
    }

    /// Hide the panel and cancel any in-flight query
    pub fn hide(&mut self) -> bool {
        self.cancel_in_flight();
        self.set_hidden()
    }

    /// Cancel the in-flight query, if any. The panel state is left as is.
    pub fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Candidate at `index` of a shown panel
    pub fn candidate(&self, index: usize) -> Option<&SuggestionRecord> {
        self.state.candidates().get(index)
    }

    /// Close the panel after its candidate was written into the field
    pub fn finish_selection(&mut self) -> bool {
        self.hide()
    }

    /// Remove the candidate at `index` from a shown panel
    ///
    /// Removing the last candidate leaves the panel `Empty`. The record is
    /// also kept out of the results of a query already in flight.
    pub fn remove_candidate(&mut self, index: usize) -> Option<SuggestionRecord> {
        let PanelState::Shown(field, candidates) = &mut self.state else {
            return None;
        };
        if index >= candidates.len() {
            return None;
        }
        let removed = candidates.remove(index);
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.removed.insert(removed.id);
        }
        if candidates.is_empty() {
            let field = std::mem::take(field);
            self.state = PanelState::Empty(field);
        }
        Some(removed)
    }

    fn set_hidden(&mut self) -> bool {
        let changed = self.state != PanelState::Hidden;
        self.state = PanelState::Hidden;
        changed
    }
}

#[cfg(test)]
#[path = "panel_state_tests.rs"]
mod panel_state_tests;
