#[cfg(test)]
pub mod test_helpers {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crate::bridge::{BridgeCoordinator, ContentSurface, PanelPresenter, SurfaceError, TabId};
    use crate::panel::PanelState;
    use crate::store::{
        RecordId, SharedStore, SuggestionRecord, SuggestionSource, SuggestionStore, shared,
    };

    pub fn record(id: i64, field: &str, value: &str) -> SuggestionRecord {
        SuggestionRecord {
            id: RecordId(id),
            field_identifier: field.to_string(),
            value: value.to_string(),
            last_used_timestamp: 1_700_000_000_000 + id,
            usage_count: 1,
            field_type: "text".to_string(),
            source: SuggestionSource::UserInput,
            url_scope: None,
        }
    }

    pub fn memory_store() -> SharedStore {
        shared(SuggestionStore::in_memory().unwrap())
    }

    /// Record `value` for `field` `times` times
    pub fn seed(store: &SharedStore, field: &str, value: &str, scope: Option<&str>, times: u32) {
        let mut guard = store.lock().unwrap();
        for _ in 0..times {
            guard
                .upsert(field, value, "text", SuggestionSource::UserInput, scope)
                .unwrap();
        }
    }

    #[derive(Debug, Default)]
    pub struct SurfaceState {
        pub url: Option<String>,
        pub installed: bool,
        pub injections: u32,
        /// Injections that run without installing the observer
        pub failing_injections: u32,
        pub write_back_accepted: bool,
        pub detached: bool,
        pub scripts: Vec<String>,
    }

    /// Scripted stand-in for a hosted page
    ///
    /// Clones share state, so a test keeps one while the coordinator owns
    /// another.
    #[derive(Debug, Clone, Default)]
    pub struct FakeSurface {
        state: Arc<Mutex<SurfaceState>>,
    }

    impl FakeSurface {
        pub fn new(url: &str) -> Self {
            let surface = Self::default();
            {
                let mut state = surface.state.lock().unwrap();
                state.url = Some(url.to_string());
                state.write_back_accepted = true;
            }
            surface
        }

        pub fn failing_injections(self, count: u32) -> Self {
            self.state.lock().unwrap().failing_injections = count;
            self
        }

        pub fn boxed(&self) -> Box<dyn ContentSurface> {
            Box::new(self.clone())
        }

        pub fn set_url(&self, url: &str) {
            self.state.lock().unwrap().url = Some(url.to_string());
        }

        pub fn set_write_back_accepted(&self, accepted: bool) {
            self.state.lock().unwrap().write_back_accepted = accepted;
        }

        pub fn set_detached(&self, detached: bool) {
            self.state.lock().unwrap().detached = detached;
        }

        pub fn injections(&self) -> u32 {
            self.state.lock().unwrap().injections
        }

        pub fn is_installed(&self) -> bool {
            self.state.lock().unwrap().installed
        }

        pub fn scripts_containing(&self, needle: &str) -> usize {
            self.state
                .lock()
                .unwrap()
                .scripts
                .iter()
                .filter(|s| s.contains(needle))
                .count()
        }
    }

    impl ContentSurface for FakeSurface {
        fn evaluate_script(&mut self, script: &str) -> Result<String, SurfaceError> {
            let mut state = self.state.lock().unwrap();
            state.scripts.push(script.to_string());
            if state.detached {
                return Err(SurfaceError::Detached);
            }

            if script.contains("Observer.prototype.install") {
                state.injections += 1;
                if state.injections > state.failing_injections {
                    state.installed = true;
                }
                return Ok("true".to_string());
            }
            if script.contains("o.presence()") {
                let report = serde_json::json!({
                    "installed": state.installed,
                    "version": if state.installed { 1 } else { 0 },
                    "fields": if state.installed { 2 } else { 0 },
                });
                // Hosts return JSON.stringify results double-encoded
                return Ok(serde_json::to_string(&report.to_string()).unwrap());
            }
            if script.contains("o.setInputValue(") {
                let accepted = state.installed && state.write_back_accepted;
                return Ok(accepted.to_string());
            }
            if script.contains("o.teardown()") {
                state.installed = false;
                return Ok("true".to_string());
            }
            Ok("null".to_string())
        }

        fn current_url(&self) -> Option<String> {
            self.state.lock().unwrap().url.clone()
        }
    }

    /// Presenter recording every frame it was asked to draw
    #[derive(Debug, Clone, Default)]
    pub struct RecordingPresenter {
        frames: Arc<Mutex<Vec<(PanelState, u32)>>>,
    }

    impl RecordingPresenter {
        pub fn boxed(&self) -> Box<dyn PanelPresenter> {
            Box::new(self.clone())
        }

        pub fn frames(&self) -> Vec<(PanelState, u32)> {
            self.frames.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<(PanelState, u32)> {
            self.frames.lock().unwrap().last().cloned()
        }
    }

    impl PanelPresenter for RecordingPresenter {
        fn present(&mut self, state: &PanelState, keyboard_height: u32) {
            self.frames
                .lock()
                .unwrap()
                .push((state.clone(), keyboard_height));
        }
    }

    /// Poll worker responses until the panel of `tab` satisfies `predicate`
    ///
    /// Returns false on timeout.
    pub fn wait_for_panel(
        coordinator: &mut BridgeCoordinator,
        tab: &TabId,
        timeout_ms: u64,
        predicate: impl Fn(&PanelState) -> bool,
    ) -> bool {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            coordinator.poll_responses();
            if coordinator.panel_state(tab).is_some_and(&predicate) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Wait until `predicate` holds for the shared store
    pub fn wait_for_store(
        store: &SharedStore,
        timeout_ms: u64,
        predicate: impl Fn(&SuggestionStore) -> bool,
    ) -> bool {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            if predicate(&store.lock().unwrap()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}
