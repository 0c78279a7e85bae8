//! Field observer
//!
//! Tracks eligible form controls of one content document and turns their
//! DOM events into bridge calls. Password controls, and any control that has
//! ever been a password control, never produce a call.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use super::dom::{ContentDocument, DomEvent, NodeId, SyntheticEvent};
use super::message::{BridgeCall, BridgeSink};
use crate::config::BridgeConfig;
use crate::error::FormfillError;

/// `input` types whose values are worth remembering
pub const TEXT_LIKE_TYPES: &[&str] = &["text", "email", "search", "tel", "url", "number"];

/// Field type of a control the observer may track, `None` otherwise
///
/// `textarea` elements report `"textarea"`; inputs report their lowercased
/// `type`, defaulting to `"text"`.
pub fn eligible_field_type<D: ContentDocument + ?Sized>(doc: &D, node: NodeId) -> Option<String> {
    match doc.tag_name(node)? {
        "textarea" => Some("textarea".to_string()),
        "input" => {
            let kind = input_type(doc, node);
            TEXT_LIKE_TYPES.contains(&kind.as_str()).then_some(kind)
        }
        _ => None,
    }
}

/// Stable identifier of a control: its `id`, else its `name`
pub fn field_identifier<D: ContentDocument + ?Sized>(
    doc: &D,
    node: NodeId,
) -> Result<String, FormfillError> {
    ["id", "name"]
        .iter()
        .filter_map(|attr| doc.attribute(node, attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(FormfillError::UntrackableField)
}

fn input_type<D: ContentDocument + ?Sized>(doc: &D, node: NodeId) -> String {
    doc.attribute(node, "type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

fn is_password<D: ContentDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    doc.tag_name(node) == Some("input") && input_type(doc, node) == "password"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverSettings {
    pub url_poll_interval: Duration,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for ObserverSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            url_poll_interval: config.url_poll_interval(),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedField {
    identifier: String,
    field_type: String,
}

#[derive(Debug)]
pub struct FieldObserver<S> {
    sink: S,
    settings: ObserverSettings,
    installed: bool,
    tracked: BTreeMap<NodeId, TrackedField>,
    /// Controls seen with `type=password`; a later type switch does not clear this
    sensitive: BTreeSet<NodeId>,
    last_url: Option<String>,
    last_poll: Option<Instant>,
}

impl<S: BridgeSink> FieldObserver<S> {
    pub fn new(sink: S, settings: ObserverSettings) -> Self {
        Self {
            sink,
            settings,
            installed: false,
            tracked: BTreeMap::new(),
            sensitive: BTreeSet::new(),
            last_url: None,
            last_poll: None,
        }
    }

    /// Attach to a freshly loaded document, replacing any previous state
    ///
    /// Returns the number of tracked fields.
    pub fn install<D: ContentDocument + ?Sized>(&mut self, doc: &D, now: Instant) -> usize {
        self.teardown();
        self.installed = true;
        self.last_url = Some(doc.url());
        self.last_poll = Some(now);
        self.scan(doc, None);
        self.report_count();
        self.tracked.len()
    }

    /// Detach and forget every tracked control
    pub fn teardown(&mut self) {
        self.installed = false;
        self.tracked.clear();
        self.sensitive.clear();
        self.last_url = None;
        self.last_poll = None;
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn tracked_identifiers(&self) -> Vec<&str> {
        self.tracked
            .values()
            .map(|f| f.identifier.as_str())
            .collect()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn handle_event<D: ContentDocument + ?Sized>(&mut self, doc: &D, event: DomEvent) {
        if !self.installed {
            return;
        }

        match event {
            DomEvent::Focus(node) => {
                if let Some(field) = self.live_field(doc, node) {
                    self.sink.post(BridgeCall::InputFocused {
                        field_identifier: field.identifier,
                        field_type: field.field_type,
                    });
                }
            }
            DomEvent::Blur(node) => {
                if let Some(field) = self.live_field(doc, node) {
                    let value = doc.value(node);
                    if !value.is_empty() {
                        self.sink.post(BridgeCall::SaveSubmittedValue {
                            field_identifier: field.identifier.clone(),
                            value,
                            field_type: field.field_type,
                        });
                    }
                    self.sink.post(BridgeCall::InputBlurred {
                        field_identifier: field.identifier,
                    });
                }
            }
            DomEvent::Input(node) => {
                if let Some(field) = self.live_field(doc, node) {
                    self.sink.post(BridgeCall::InputValueChanged {
                        field_identifier: field.identifier,
                        value: doc.value(node),
                    });
                }
            }
            DomEvent::Submit(form) => self.submit(doc, form),
            DomEvent::Mutation { inserted } => {
                let before = self.tracked.len();
                for root in inserted {
                    self.scan(doc, Some(root));
                }
                if self.tracked.len() != before {
                    self.report_count();
                }
            }
        }
    }

    /// Check the document URL, at most once per poll interval
    ///
    /// A changed URL (e.g. client-side routing) is reported and triggers a
    /// full rescan. Returns whether the URL changed.
    pub fn poll<D: ContentDocument + ?Sized>(&mut self, doc: &D, now: Instant) -> bool {
        if !self.installed {
            return false;
        }
        if let Some(last) = self.last_poll
            && now.saturating_duration_since(last) < self.settings.url_poll_interval
        {
            return false;
        }
        self.last_poll = Some(now);

        let url = doc.url();
        if self.last_url.as_deref() == Some(url.as_str()) {
            return false;
        }
        self.last_url = Some(url.clone());
        self.sink.post(BridgeCall::PageUrlChanged { url });
        self.scan(doc, None);
        self.report_count();
        true
    }

    /// Write a value into the tracked control named `field_identifier`
    ///
    /// Synthesizes input, change and key events afterwards so page scripts
    /// observe the write. Returns false if no such control is attached.
    pub fn set_input_value<D: ContentDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        field_identifier: &str,
        value: &str,
    ) -> bool {
        if !self.installed {
            return false;
        }
        let target = self
            .tracked
            .iter()
            .find(|(node, field)| {
                field.identifier == field_identifier
                    && doc.contains(**node)
                    && !self.sensitive.contains(*node)
            })
            .map(|(node, _)| *node);

        let Some(node) = target else {
            return false;
        };

        doc.set_value(node, value);
        for event in [
            SyntheticEvent::Input,
            SyntheticEvent::Change,
            SyntheticEvent::KeyDown,
            SyntheticEvent::KeyUp,
        ] {
            doc.dispatch(node, event);
        }
        true
    }

    /// Tracked field for `node`, re-checking eligibility at event time
    fn live_field<D: ContentDocument + ?Sized>(
        &mut self,
        doc: &D,
        node: NodeId,
    ) -> Option<TrackedField> {
        if is_password(doc, node) {
            self.sensitive.insert(node);
            self.tracked.remove(&node);
            return None;
        }
        if self.sensitive.contains(&node) || eligible_field_type(doc, node).is_none() {
            return None;
        }
        self.tracked.get(&node).cloned()
    }

    fn submit<D: ContentDocument + ?Sized>(&mut self, doc: &D, form: NodeId) {
        for node in doc.form_controls(Some(form)) {
            if is_password(doc, node) || self.sensitive.contains(&node) {
                continue;
            }
            let Some(field_type) = eligible_field_type(doc, node) else {
                continue;
            };
            let Ok(identifier) = field_identifier(doc, node) else {
                continue;
            };
            let value = doc.value(node);
            if value.is_empty() {
                continue;
            }
            self.sink.post(BridgeCall::SaveSubmittedValue {
                field_identifier: identifier,
                value,
                field_type,
            });
        }
    }

    fn scan<D: ContentDocument + ?Sized>(&mut self, doc: &D, root: Option<NodeId>) {
        if root.is_none() {
            self.tracked.retain(|node, _| doc.contains(*node));
        }

        for node in doc.form_controls(root) {
            if is_password(doc, node) {
                self.sensitive.insert(node);
                continue;
            }
            if self.tracked.contains_key(&node) || self.sensitive.contains(&node) {
                continue;
            }
            let Some(field_type) = eligible_field_type(doc, node) else {
                continue;
            };
            match field_identifier(doc, node) {
                Ok(identifier) => {
                    self.tracked.insert(
                        node,
                        TrackedField {
                            identifier,
                            field_type,
                        },
                    );
                }
                Err(e) => log::trace!("Skipping control {:?}: {}", node, e),
            }
        }
    }

    fn report_count(&mut self) {
        let count = u32::try_from(self.tracked.len()).unwrap_or(u32::MAX);
        self.sink.post(BridgeCall::ReportFieldCount { count });
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod observer_tests;
