//! Keyboard Visibility Monitor
//!
//! Derives on-screen keyboard visibility and height from visible-frame
//! geometry sampled on every layout pass. Evaluations are throttled, small
//! height jitter is ignored, and a hide is only finalized after a delayed
//! re-check so a single glitchy frame cannot flap the suggestion panel.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crate::config::KeyboardConfig;

/// One geometry sample from the host window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Full height of the root view, in pixels
    pub total_height: u32,
    /// Bottom edge of the visible frame, in pixels from the top
    pub visible_bottom: u32,
}

impl FrameGeometry {
    pub fn new(total_height: u32, visible_bottom: u32) -> Self {
        Self {
            total_height,
            visible_bottom,
        }
    }

    pub fn keyboard_height(&self) -> u32 {
        self.total_height.saturating_sub(self.visible_bottom)
    }
}

/// Events published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    VisibilityChanged { visible: bool, height: u32 },
    HeightChanged { height: u32 },
}

/// Thresholds and timings of the monitor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardSettings {
    pub throttle: Duration,
    pub visibility_ratio: f32,
    pub height_change_px: u32,
    pub hide_recheck: Duration,
}

impl Default for KeyboardSettings {
    fn default() -> Self {
        Self::from(&KeyboardConfig::default())
    }
}

impl From<&KeyboardConfig> for KeyboardSettings {
    fn from(config: &KeyboardConfig) -> Self {
        Self {
            throttle: Duration::from_millis(config.throttle_ms),
            visibility_ratio: config.visibility_ratio,
            height_change_px: config.height_change_px,
            hide_recheck: Duration::from_millis(config.hide_recheck_ms),
        }
    }
}

#[derive(Debug)]
pub struct KeyboardMonitor {
    settings: KeyboardSettings,
    visible: bool,
    /// Last height reported to subscribers while visible
    reported_height: u32,
    last_evaluation: Option<Instant>,
    latest: Option<FrameGeometry>,
    /// `latest` arrived inside the throttle window and was never evaluated
    latest_deferred: bool,
    /// Deadline of the re-check that finalizes a pending hide
    pending_hide: Option<Instant>,
    subscribers: Vec<Sender<KeyboardEvent>>,
}

impl Default for KeyboardMonitor {
    fn default() -> Self {
        Self::new(KeyboardSettings::default())
    }
}

impl KeyboardMonitor {
    pub fn new(settings: KeyboardSettings) -> Self {
        Self {
            settings,
            visible: false,
            reported_height: 0,
            last_evaluation: None,
            latest: None,
            latest_deferred: false,
            pending_hide: None,
            subscribers: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Height last published while visible, zero when hidden
    pub fn height(&self) -> u32 {
        if self.visible { self.reported_height } else { 0 }
    }

    pub fn has_pending_hide(&self) -> bool {
        self.pending_hide.is_some()
    }

    /// Register a new subscriber channel
    pub fn subscribe(&mut self) -> Receiver<KeyboardEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Feed a geometry sample from a layout pass
    ///
    /// Returns the events published as a result, which are also sent to
    /// every subscriber.
    pub fn on_layout(&mut self, now: Instant, geometry: FrameGeometry) -> Vec<KeyboardEvent> {
        self.latest = Some(geometry);

        let mut events = self.finish_pending_hide(now);

        if let Some(last) = self.last_evaluation
            && now.saturating_duration_since(last) < self.settings.throttle
        {
            self.latest_deferred = true;
            self.publish(&events);
            return events;
        }
        self.last_evaluation = Some(now);
        self.latest_deferred = false;

        events.extend(self.evaluate(now, geometry));
        self.publish(&events);
        events
    }

    /// Advance timers without a new sample
    ///
    /// Finalizes a pending hide once its re-check deadline has passed, and
    /// evaluates a throttled sample once its window has elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<KeyboardEvent> {
        let mut events = self.finish_pending_hide(now);

        if self.latest_deferred
            && let Some(geometry) = self.latest
            && self
                .last_evaluation
                .is_none_or(|last| now.saturating_duration_since(last) >= self.settings.throttle)
        {
            self.latest_deferred = false;
            self.last_evaluation = Some(now);
            events.extend(self.evaluate(now, geometry));
        }

        self.publish(&events);
        events
    }

    fn is_keyboard_height(&self, geometry: FrameGeometry) -> bool {
        let threshold = geometry.total_height as f32 * self.settings.visibility_ratio;
        geometry.keyboard_height() as f32 > threshold
    }

    fn evaluate(&mut self, now: Instant, geometry: FrameGeometry) -> Vec<KeyboardEvent> {
        let height = geometry.keyboard_height();
        let looks_visible = self.is_keyboard_height(geometry);

        if !self.visible {
            if looks_visible {
                self.visible = true;
                self.reported_height = height;
                log::debug!("Keyboard shown ({} px)", height);
                return vec![KeyboardEvent::VisibilityChanged {
                    visible: true,
                    height,
                }];
            }
            return Vec::new();
        }

        // A hide is pending: the re-check decides, using the latest sample
        if self.pending_hide.is_some() {
            return Vec::new();
        }

        if !looks_visible {
            self.pending_hide = Some(now + self.settings.hide_recheck);
            return Vec::new();
        }

        self.height_update(height).into_iter().collect()
    }

    fn height_update(&mut self, height: u32) -> Option<KeyboardEvent> {
        if height.abs_diff(self.reported_height) > self.settings.height_change_px {
            self.reported_height = height;
            return Some(KeyboardEvent::HeightChanged { height });
        }
        None
    }

    fn finish_pending_hide(&mut self, now: Instant) -> Vec<KeyboardEvent> {
        let Some(deadline) = self.pending_hide else {
            return Vec::new();
        };
        if now < deadline {
            return Vec::new();
        }
        self.pending_hide = None;

        if let Some(geometry) = self.latest
            && self.is_keyboard_height(geometry)
        {
            // Visible again by the re-check: the hide was a glitch
            return self
                .height_update(geometry.keyboard_height())
                .into_iter()
                .collect();
        }

        self.visible = false;
        self.reported_height = 0;
        log::debug!("Keyboard hidden");
        vec![KeyboardEvent::VisibilityChanged {
            visible: false,
            height: 0,
        }]
    }

    fn publish(&mut self, events: &[KeyboardEvent]) {
        if events.is_empty() {
            return;
        }
        self.subscribers
            .retain(|tx| events.iter().all(|event| tx.send(*event).is_ok()));
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod monitor_tests;
