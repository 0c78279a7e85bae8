use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use super::binding::{Binding, TabId};
use super::surface::{ContentSurface, NoopPresenter, PanelPresenter};
use crate::config::Config;
use crate::error::FormfillError;
use crate::keyboard::{FrameGeometry, KeyboardEvent, KeyboardMonitor, KeyboardSettings};
use crate::panel::PanelState;
use crate::protocol::{
    BridgeCall, ScriptSettings, decode_script_result, observer_script, set_input_value_script,
    teardown_script,
};
use crate::store::{SharedStore, SuggestionSource, SuggestionStore, shared, url_scope};
use crate::suggestions::{SuggestionEngine, WorkerHandle, WorkerRequest};

/// Everything the coordinator needs from its host at start-up
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    pub config: Config,
    /// Store to use instead of opening `config.database_path()`
    pub store: Option<SharedStore>,
}

impl HostContext {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
        }
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }
}

/// Routes bridge traffic for every bound content surface
///
/// Runs on the UI thread. Event-path methods never fail: problems are
/// logged and the affected binding degrades instead.
pub struct BridgeCoordinator {
    config: Config,
    engine: SuggestionEngine,
    keyboard: KeyboardMonitor,
    observer_script: String,
    bindings: HashMap<TabId, Binding>,
    /// Binding in the foreground; only it reacts to the keyboard
    active: Option<TabId>,
}

impl BridgeCoordinator {
    /// Open the store and prepare for bindings
    pub fn start(context: HostContext) -> Result<Self, FormfillError> {
        let HostContext { config, store } = context;
        let store = match store {
            Some(store) => store,
            None => open_store(&config)?,
        };
        let engine = SuggestionEngine::new(store)
            .with_min_scoped_results(config.suggestions.min_scoped_results);

        log::debug!("Bridge coordinator started");
        Ok(Self {
            keyboard: KeyboardMonitor::new(KeyboardSettings::from(&config.keyboard)),
            observer_script: observer_script(&ScriptSettings::from(&config.bridge)),
            engine,
            config,
            bindings: HashMap::new(),
            active: None,
        })
    }

    /// Release every binding
    pub fn stop(mut self) {
        let tabs: Vec<TabId> = self.bindings.keys().cloned().collect();
        for tab in tabs {
            self.unbind(&tab);
        }
        log::debug!("Bridge coordinator stopped");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &SuggestionEngine {
        &self.engine
    }

    pub fn keyboard(&self) -> &KeyboardMonitor {
        &self.keyboard
    }

    pub fn subscribe_keyboard(&mut self) -> Receiver<KeyboardEvent> {
        self.keyboard.subscribe()
    }

    /// Bind a surface without a panel presenter
    pub fn bind(
        &mut self,
        tab: impl Into<TabId>,
        surface: Box<dyn ContentSurface>,
        now: Instant,
    ) -> Result<(), FormfillError> {
        self.bind_with_presenter(tab, surface, Box::new(NoopPresenter), now)
    }

    /// Bind a surface, inject the observer and make the tab active
    ///
    /// Binding an already bound tab replaces the old binding. Fails only if
    /// the binding's worker thread cannot be spawned.
    pub fn bind_with_presenter(
        &mut self,
        tab: impl Into<TabId>,
        surface: Box<dyn ContentSurface>,
        presenter: Box<dyn PanelPresenter>,
        now: Instant,
    ) -> Result<(), FormfillError> {
        let tab = tab.into();
        self.unbind(&tab);

        let io_timeout = Duration::from_millis(self.config.store.io_timeout_ms);
        let worker = WorkerHandle::spawn(self.engine.clone(), io_timeout, tab.as_str())?;
        let mut binding = Binding::new(tab.clone(), surface, presenter, worker, now);
        binding.inject(&self.observer_script, 1, self.verify_delay(), now);
        log::debug!("Bound {} (scope {:?})", tab, binding.url_scope);

        self.bindings.insert(tab.clone(), binding);
        self.active = Some(tab);
        Ok(())
    }

    /// Tear down a binding. Returns false if the tab was not bound.
    pub fn unbind(&mut self, tab: &TabId) -> bool {
        let Some(mut binding) = self.bindings.remove(tab) else {
            return false;
        };
        if self.active.as_ref() == Some(tab) {
            self.active = None;
        }
        if binding.panel.hide() {
            binding.present(0);
        }
        if let Err(e) = binding.surface.evaluate_script(&teardown_script()) {
            log::debug!("Observer teardown in {} failed: {}", tab, e);
        }
        // Dropping the handle closes the worker's queue; it exits on its own
        log::debug!("Unbound {}", tab);
        true
    }

    /// Bring a bound tab to the foreground
    pub fn activate(&mut self, tab: &TabId) -> bool {
        if !self.bindings.contains_key(tab) {
            return false;
        }
        if let Some(previous) = self.active.replace(tab.clone())
            && previous != *tab
            && let Some(binding) = self.bindings.get_mut(&previous)
            && binding.panel.hide()
        {
            binding.present(0);
        }
        if self.keyboard.is_visible() {
            self.show_for_active();
        }
        true
    }

    pub fn active_tab(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    /// A new document finished loading in `tab`: re-inject and re-verify
    pub fn page_loaded(&mut self, tab: &TabId, now: Instant) -> bool {
        let verify_delay = self.verify_delay();
        let Some(binding) = self.bindings.get_mut(tab) else {
            return false;
        };
        if binding.reset_document_state() {
            binding.present(0);
        }
        binding.inject(&self.observer_script, 1, verify_delay, now);
        log::debug!("Page loaded in {} (scope {:?})", tab, binding.url_scope);
        true
    }

    /// Decode and route one raw bridge message
    ///
    /// Malformed payloads are logged and dropped. Returns whether the message
    /// decoded.
    pub fn handle_message(&mut self, tab: &TabId, raw: &str, now: Instant) -> bool {
        match BridgeCall::decode(raw) {
            Ok(call) => {
                self.handle_call(tab, call, now);
                true
            }
            Err(e) => {
                log::warn!("Dropping message from {}: {}", tab, FormfillError::from(e));
                false
            }
        }
    }

    /// Route one decoded bridge call
    pub fn handle_call(&mut self, tab: &TabId, call: BridgeCall, now: Instant) {
        let keyboard_visible = self.keyboard.is_visible();
        let keyboard_height = self.keyboard.height();
        let is_active = self.active.as_ref() == Some(tab);
        let suggestions = &self.config.suggestions;

        let Some(binding) = self.bindings.get_mut(tab) else {
            log::debug!("Dropping {} for unbound {}", call.name(), tab);
            return;
        };
        if binding.is_degraded() {
            log::debug!("Dropping {} for degraded {}", call.name(), tab);
            return;
        }

        let changed = match call {
            BridgeCall::InputFocused {
                field_identifier, ..
            } => {
                binding.focus.focus(&field_identifier);
                binding.live_query = None;
                binding.active_seed = None;
                binding.written_back = None;
                if keyboard_visible && is_active {
                    // Loading is a visible change even when the request fails
                    binding.request(&field_identifier, None, suggestions);
                    true
                } else if binding.panel.state().field() != Some(field_identifier.as_str()) {
                    binding.panel.hide()
                } else {
                    false
                }
            }
            BridgeCall::InputBlurred { field_identifier } => {
                let cleared = binding.focus.blur(&field_identifier);
                if cleared || binding.panel.state().field() == Some(field_identifier.as_str()) {
                    binding.live_query = None;
                    binding.active_seed = None;
                    binding.panel.hide()
                } else {
                    false
                }
            }
            BridgeCall::InputValueChanged {
                field_identifier,
                value,
            } => {
                binding.stage_live_value(field_identifier, &value, suggestions, now);
                false
            }
            BridgeCall::SaveSubmittedValue {
                field_identifier,
                value,
                field_type,
            } => {
                if field_type.eq_ignore_ascii_case("password") {
                    log::warn!("Refusing to store a password value from {}", tab);
                } else if !binding.worker.send(WorkerRequest::Save {
                    field_identifier,
                    value,
                    field_type,
                    source: SuggestionSource::UserInput,
                    url_scope: binding.url_scope.clone(),
                }) {
                    log::warn!("Suggestion worker for {} is gone, value not saved", tab);
                }
                false
            }
            BridgeCall::PageUrlChanged { url } => {
                binding.url_scope = url_scope(&url);
                log::debug!("{} navigated to scope {:?}", tab, binding.url_scope);
                false
            }
            BridgeCall::ReportFieldCount { count } => {
                binding.field_count = count;
                false
            }
            BridgeCall::LogError { message } => {
                log::warn!("Observer error in {}: {}", tab, message);
                false
            }
        };

        if changed {
            binding.present(keyboard_height);
        }
    }

    /// Feed a geometry sample from a layout pass
    pub fn on_layout(&mut self, now: Instant, geometry: FrameGeometry) -> Vec<KeyboardEvent> {
        let events = self.keyboard.on_layout(now, geometry);
        self.apply_keyboard_events(&events);
        events
    }

    /// Advance timers: keyboard re-check, bridge verification, live query
    /// debounce, and worker responses
    pub fn tick(&mut self, now: Instant) {
        let events = self.keyboard.tick(now);
        self.apply_keyboard_events(&events);

        let keyboard_visible = self.keyboard.is_visible();
        let keyboard_height = self.keyboard.height();

        for (tab, binding) in self.bindings.iter_mut() {
            let mut changed =
                binding.advance_readiness(&self.observer_script, &self.config.bridge, now);

            if let Some(live) = binding.take_due_live_query(now) {
                let is_active = self.active.as_ref() == Some(tab);
                let focused = binding.focus.current() == Some(live.field_identifier.as_str());
                if keyboard_visible && is_active && focused && !binding.is_degraded() {
                    binding.active_seed = live.seed.clone();
                    binding.request(&live.field_identifier, live.seed, &self.config.suggestions);
                    changed = true;
                }
            }

            changed |= binding.drain_responses();
            if changed {
                binding.present(keyboard_height);
            }
        }
    }

    /// Apply finished worker queries without advancing timers
    pub fn poll_responses(&mut self) {
        let keyboard_height = self.keyboard.height();
        for binding in self.bindings.values_mut() {
            if binding.drain_responses() {
                binding.present(keyboard_height);
            }
        }
    }

    /// Write the candidate at `index` into the focused field
    ///
    /// On confirmed write-back the value is recorded again and the panel
    /// closes. If the page rejects the write, the panel stays as it is.
    pub fn select_candidate(&mut self, tab: &TabId, index: usize) -> bool {
        let keyboard_height = self.keyboard.height();
        let Some(binding) = self.bindings.get_mut(tab) else {
            return false;
        };
        let Some(record) = binding.panel.candidate(index).cloned() else {
            return false;
        };

        let script = set_input_value_script(&record.field_identifier, &record.value);
        let confirmed = match binding.surface.evaluate_script(&script) {
            Ok(raw) => match decode_script_result::<bool>(&raw) {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    log::warn!(
                        "Unexpected write-back result in {}: {}",
                        tab,
                        FormfillError::from(e)
                    );
                    false
                }
            },
            Err(e) => {
                log::warn!("Write-back into {} failed: {}", tab, e);
                false
            }
        };
        if !confirmed {
            log::debug!("Write-back of {} not confirmed", record.field_identifier);
            return false;
        }

        binding.written_back = Some((record.field_identifier.clone(), record.value.clone()));
        binding.live_query = None;
        binding.active_seed = None;
        if !binding.worker.send(WorkerRequest::Save {
            field_identifier: record.field_identifier,
            value: record.value,
            field_type: record.field_type,
            source: SuggestionSource::UserInput,
            url_scope: binding.url_scope.clone(),
        }) {
            log::warn!("Suggestion worker for {} is gone, selection not recorded", tab);
        }
        if binding.panel.finish_selection() {
            binding.present(keyboard_height);
        }
        true
    }

    /// Delete the candidate at `index` from the store and the panel
    pub fn delete_candidate(&mut self, tab: &TabId, index: usize) -> bool {
        let keyboard_height = self.keyboard.height();
        let Some(binding) = self.bindings.get_mut(tab) else {
            return false;
        };
        let Some(removed) = binding.panel.remove_candidate(index) else {
            return false;
        };
        if !binding.worker.send(WorkerRequest::Delete { id: removed.id }) {
            log::warn!("Suggestion worker for {} is gone, {} not deleted", tab, removed.id);
        }
        binding.present(keyboard_height);
        true
    }

    /// Close the panel of `tab`
    pub fn dismiss(&mut self, tab: &TabId) -> bool {
        let keyboard_height = self.keyboard.height();
        let Some(binding) = self.bindings.get_mut(tab) else {
            return false;
        };
        binding.live_query = None;
        let changed = binding.panel.hide();
        if changed {
            binding.present(keyboard_height);
        }
        changed
    }

    pub fn is_bound(&self, tab: &TabId) -> bool {
        self.bindings.contains_key(tab)
    }

    pub fn is_ready(&self, tab: &TabId) -> bool {
        self.bindings.get(tab).is_some_and(Binding::is_ready)
    }

    pub fn is_degraded(&self, tab: &TabId) -> bool {
        self.bindings.get(tab).is_some_and(Binding::is_degraded)
    }

    pub fn panel_state(&self, tab: &TabId) -> Option<&PanelState> {
        self.bindings.get(tab).map(|b| b.panel.state())
    }

    pub fn focused_field(&self, tab: &TabId) -> Option<&str> {
        self.bindings.get(tab).and_then(|b| b.focus.current())
    }

    pub fn url_scope(&self, tab: &TabId) -> Option<&str> {
        self.bindings.get(tab).and_then(|b| b.url_scope.as_deref())
    }

    pub fn field_count(&self, tab: &TabId) -> Option<u32> {
        self.bindings.get(tab).map(|b| b.field_count)
    }

    fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.config.bridge.verify_delay_ms)
    }

    fn apply_keyboard_events(&mut self, events: &[KeyboardEvent]) {
        for event in events {
            match *event {
                KeyboardEvent::VisibilityChanged { visible: true, .. } => self.show_for_active(),
                KeyboardEvent::VisibilityChanged { visible: false, .. } => {
                    for binding in self.bindings.values_mut() {
                        binding.live_query = None;
                        if binding.panel.hide() {
                            binding.present(0);
                        }
                    }
                }
                KeyboardEvent::HeightChanged { height } => {
                    if let Some(binding) = self.active_binding_mut()
                        && binding.panel.state().is_visible()
                    {
                        binding.present(height);
                    }
                }
            }
        }
    }

    /// Query for the active binding's focused field, if any
    fn show_for_active(&mut self) {
        let keyboard_height = self.keyboard.height();
        let Some(tab) = self.active.clone() else {
            return;
        };
        let Some(binding) = self.bindings.get_mut(&tab) else {
            return;
        };
        if binding.is_degraded() {
            return;
        }
        let Some(field) = binding.focus.current().map(str::to_string) else {
            return;
        };
        let seed = binding.active_seed.clone();
        binding.request(&field, seed, &self.config.suggestions);
        binding.present(keyboard_height);
    }

    fn active_binding_mut(&mut self) -> Option<&mut Binding> {
        let tab = self.active.as_ref()?;
        self.bindings.get_mut(tab)
    }
}

impl Drop for BridgeCoordinator {
    fn drop(&mut self) {
        let tabs: Vec<TabId> = self.bindings.keys().cloned().collect();
        for tab in tabs {
            self.unbind(&tab);
        }
    }
}

fn open_store(config: &Config) -> Result<SharedStore, FormfillError> {
    let store = match config.database_path() {
        Some(path) => SuggestionStore::open_with_timeout(
            &path,
            Duration::from_millis(config.store.io_timeout_ms),
        )?,
        None => {
            log::warn!("No data directory available, suggestions kept in memory");
            SuggestionStore::in_memory()?
        }
    };
    Ok(shared(store))
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod coordinator_tests;
