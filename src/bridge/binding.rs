//! Per-surface binding state

use std::fmt;
use std::time::{Duration, Instant};

use super::surface::{ContentSurface, PanelPresenter};
use crate::config::{BridgeConfig, SuggestionsConfig};
use crate::error::FormfillError;
use crate::panel::PanelStateMachine;
use crate::protocol::{PresenceReport, presence_check_script};
use crate::store::url_scope;
use crate::suggestions::{SuggestionQuery, WorkerHandle};

/// Injection attempts before a binding degrades
pub(super) const MAX_INJECTION_ATTEMPTS: u8 = 2;

/// Host-assigned identifier of a content surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub String);

impl TabId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        TabId(value.to_string())
    }
}

impl From<String> for TabId {
    fn from(value: String) -> Self {
        TabId(value)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which field of a binding currently has focus
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldFocusState {
    focused: Option<String>,
}

impl FieldFocusState {
    pub fn focus(&mut self, field_identifier: &str) {
        self.focused = Some(field_identifier.to_string());
    }

    /// Clear focus if it still names `field_identifier`
    ///
    /// A blur that arrives after another field was focused leaves the newer
    /// focus in place. Returns whether focus was cleared.
    pub fn blur(&mut self, field_identifier: &str) -> bool {
        if self.focused.as_deref() == Some(field_identifier) {
            self.focused = None;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn clear(&mut self) {
        self.focused = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Readiness {
    /// Presence check due at `check_at`
    Verifying { attempt: u8, check_at: Instant },
    /// Re-injection due at `at`
    Reinjecting { attempt: u8, at: Instant },
    Ready,
    /// Verification failed twice; inert until the next page load
    Degraded,
}

/// A debounced live query waiting to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LiveQuery {
    pub field_identifier: String,
    pub seed: Option<String>,
    pub due: Instant,
}

pub(super) struct Binding {
    pub tab: TabId,
    pub surface: Box<dyn ContentSurface>,
    pub presenter: Box<dyn PanelPresenter>,
    pub worker: WorkerHandle,
    pub panel: PanelStateMachine,
    pub focus: FieldFocusState,
    pub url_scope: Option<String>,
    pub field_count: u32,
    pub readiness: Readiness,
    pub live_query: Option<LiveQuery>,
    /// Seed the panel's current candidates were filtered with
    pub active_seed: Option<String>,
    /// Field and value just written by a selection, whose input echo is ignored
    pub written_back: Option<(String, String)>,
}

impl Binding {
    pub fn new(
        tab: TabId,
        surface: Box<dyn ContentSurface>,
        presenter: Box<dyn PanelPresenter>,
        worker: WorkerHandle,
        now: Instant,
    ) -> Self {
        Self {
            tab,
            surface,
            presenter,
            worker,
            panel: PanelStateMachine::new(),
            focus: FieldFocusState::default(),
            url_scope: None,
            field_count: 0,
            readiness: Readiness::Verifying {
                attempt: 1,
                check_at: now,
            },
            live_query: None,
            active_seed: None,
            written_back: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.readiness == Readiness::Degraded
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }

    pub fn refresh_scope(&mut self) {
        self.url_scope = self.surface.current_url().as_deref().and_then(url_scope);
    }

    /// Forget everything tied to the previous document
    pub fn reset_document_state(&mut self) -> bool {
        self.focus.clear();
        self.live_query = None;
        self.active_seed = None;
        self.written_back = None;
        self.field_count = 0;
        self.panel.hide()
    }

    /// Inject the observer and schedule its presence check
    pub fn inject(&mut self, script: &str, attempt: u8, verify_delay: Duration, now: Instant) {
        self.refresh_scope();
        if let Err(e) = self.surface.evaluate_script(script) {
            log::debug!("Observer injection into {} failed: {}", self.tab, e);
        }
        self.readiness = Readiness::Verifying {
            attempt,
            check_at: now + verify_delay,
        };
    }

    /// Run a due presence check or re-injection. Returns whether the panel changed.
    pub fn advance_readiness(
        &mut self,
        script: &str,
        bridge: &BridgeConfig,
        now: Instant,
    ) -> bool {
        match self.readiness {
            Readiness::Verifying { attempt, check_at } if now >= check_at => {
                match self.verify(attempt) {
                    Ok(report) => {
                        log::debug!(
                            "Observer ready in {} (v{}, {} fields)",
                            self.tab,
                            report.version,
                            report.fields
                        );
                        self.field_count = report.fields;
                        self.readiness = Readiness::Ready;
                        false
                    }
                    Err(e) if attempt < MAX_INJECTION_ATTEMPTS => {
                        log::debug!("Observer verification in {} failed: {}", self.tab, e);
                        self.readiness = Readiness::Reinjecting {
                            attempt: attempt + 1,
                            at: now + Duration::from_millis(bridge.retry_delay_ms),
                        };
                        false
                    }
                    Err(e) => {
                        log::warn!("{}: {}", self.not_ready(attempt), e);
                        self.readiness = Readiness::Degraded;
                        self.reset_document_state()
                    }
                }
            }
            Readiness::Reinjecting { attempt, at } if now >= at => {
                self.inject(
                    script,
                    attempt,
                    Duration::from_millis(bridge.verify_delay_ms),
                    now,
                );
                false
            }
            _ => false,
        }
    }

    fn not_ready(&self, attempts: u8) -> FormfillError {
        FormfillError::BridgeNotReady {
            tab: self.tab.to_string(),
            attempts,
        }
    }

    fn verify(&mut self, attempt: u8) -> Result<PresenceReport, FormfillError> {
        let raw = self.surface.evaluate_script(&presence_check_script())?;
        let report = PresenceReport::parse(&raw)?;
        if !report.installed {
            return Err(self.not_ready(attempt));
        }
        Ok(report)
    }

    /// Start a panel query for `field_identifier` with the binding's scope
    pub fn request(
        &mut self,
        field_identifier: &str,
        seed: Option<String>,
        suggestions: &SuggestionsConfig,
    ) -> bool {
        let query = SuggestionQuery::new(field_identifier)
            .with_scope(self.url_scope.clone())
            .with_seed(seed)
            .with_limit(suggestions.limit);
        self.panel.request(&self.worker, query)
    }

    /// Stage a typed value as the next live query seed
    ///
    /// Values of more than `live_query_min_chars` trimmed characters become
    /// the seed. Shrinking below that after a seeded query schedules an
    /// unseeded one; otherwise nothing is scheduled.
    pub fn stage_live_value(
        &mut self,
        field_identifier: String,
        value: &str,
        suggestions: &SuggestionsConfig,
        now: Instant,
    ) {
        if self.focus.current() != Some(field_identifier.as_str()) {
            return;
        }
        if let Some((field, written)) = &self.written_back
            && *field == field_identifier
            && written == value
        {
            self.written_back = None;
            return;
        }
        self.written_back = None;

        let trimmed = value.trim();
        let seed = if trimmed.chars().count() > suggestions.live_query_min_chars {
            Some(trimmed.to_string())
        } else if self.active_seed.is_some() || self.live_query.is_some() {
            None
        } else {
            return;
        };

        self.live_query = Some(LiveQuery {
            field_identifier,
            seed,
            due: now + Duration::from_millis(suggestions.live_query_debounce_ms),
        });
    }

    /// Live query whose debounce window has elapsed, if any
    pub fn take_due_live_query(&mut self, now: Instant) -> Option<LiveQuery> {
        if self.live_query.as_ref().is_some_and(|q| now >= q.due) {
            return self.live_query.take();
        }
        None
    }

    /// Apply every pending worker response. Returns whether the panel changed.
    pub fn drain_responses(&mut self) -> bool {
        let mut changed = false;
        while let Some(response) = self.worker.try_recv() {
            changed |= self.panel.on_response(response, self.focus.current());
        }
        changed
    }

    pub fn present(&mut self, keyboard_height: u32) {
        self.presenter.present(self.panel.state(), keyboard_height);
    }
}
