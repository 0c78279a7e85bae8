//! Tests for keyboard/monitor

use super::*;
use proptest::prelude::*;

const TOTAL: u32 = 2000;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Geometry with a keyboard of `height` px on a 2000 px screen (threshold: 100 px)
fn keyboard(height: u32) -> FrameGeometry {
    FrameGeometry::new(TOTAL, TOTAL - height)
}

fn hidden_transitions(events: &[KeyboardEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, KeyboardEvent::VisibilityChanged { visible: false, .. }))
        .count()
}

fn visibility_transitions(events: &[KeyboardEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, KeyboardEvent::VisibilityChanged { .. }))
        .count()
}

// =========================================================================
// Unit Tests
// =========================================================================

#[test]
fn test_geometry_keyboard_height() {
    assert_eq!(FrameGeometry::new(2000, 1200).keyboard_height(), 800);
    assert_eq!(FrameGeometry::new(2000, 2100).keyboard_height(), 0);
}

#[test]
fn test_starts_hidden() {
    let monitor = KeyboardMonitor::default();
    assert!(!monitor.is_visible());
    assert_eq!(monitor.height(), 0);
}

#[test]
fn test_show_is_reported_immediately() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();

    let events = monitor.on_layout(t0, keyboard(800));
    assert_eq!(
        events,
        vec![KeyboardEvent::VisibilityChanged {
            visible: true,
            height: 800
        }]
    );
    assert!(monitor.is_visible());
    assert_eq!(monitor.height(), 800);
}

#[test]
fn test_below_threshold_stays_hidden() {
    let mut monitor = KeyboardMonitor::default();
    let events = monitor.on_layout(Instant::now(), keyboard(100));
    assert!(events.is_empty());
    assert!(!monitor.is_visible());
}

#[test]
fn test_samples_inside_throttle_window_are_not_evaluated() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    monitor.on_layout(t0, keyboard(0));

    assert!(monitor.on_layout(t0 + ms(50), keyboard(800)).is_empty());
    assert!(!monitor.is_visible());

    let events = monitor.on_layout(t0 + ms(100), keyboard(800));
    assert_eq!(visibility_transitions(&events), 1);
}

#[test]
fn test_small_height_changes_are_ignored() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    monitor.on_layout(t0, keyboard(800));

    assert!(monitor.on_layout(t0 + ms(150), keyboard(840)).is_empty());
    assert_eq!(monitor.height(), 800);

    let events = monitor.on_layout(t0 + ms(300), keyboard(900));
    assert_eq!(events, vec![KeyboardEvent::HeightChanged { height: 900 }]);
    assert_eq!(monitor.height(), 900);
}

#[test]
fn test_hide_waits_for_recheck() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    monitor.on_layout(t0, keyboard(800));

    assert!(monitor.on_layout(t0 + ms(150), keyboard(0)).is_empty());
    assert!(monitor.is_visible());
    assert!(monitor.has_pending_hide());

    assert!(monitor.tick(t0 + ms(300)).is_empty());

    let events = monitor.tick(t0 + ms(350));
    assert_eq!(
        events,
        vec![KeyboardEvent::VisibilityChanged {
            visible: false,
            height: 0
        }]
    );
    assert!(!monitor.is_visible());
    assert!(!monitor.has_pending_hide());
}

#[test]
fn test_glitch_cancelled_by_recheck() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    monitor.on_layout(t0, keyboard(800));
    monitor.on_layout(t0 + ms(150), keyboard(0));
    monitor.on_layout(t0 + ms(260), keyboard(800));

    let events = monitor.tick(t0 + ms(400));
    assert!(events.is_empty());
    assert!(monitor.is_visible());
    assert!(!monitor.has_pending_hide());
}

#[test]
fn test_sustained_drop_with_transient_visible_sample_hides_once() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    let mut events = monitor.on_layout(t0, keyboard(800));

    events.extend(monitor.on_layout(t0 + ms(200), keyboard(0)));
    // Transient visible frame inside the re-check window
    events.extend(monitor.on_layout(t0 + ms(320), keyboard(800)));
    events.extend(monitor.on_layout(t0 + ms(360), keyboard(0)));
    events.extend(monitor.tick(t0 + ms(400)));
    events.extend(monitor.on_layout(t0 + ms(500), keyboard(0)));
    events.extend(monitor.tick(t0 + ms(900)));

    assert_eq!(hidden_transitions(&events), 1);
    assert!(!monitor.is_visible());
}

#[test]
fn test_throttled_hide_sample_is_evaluated_by_tick() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    let mut events = monitor.on_layout(t0, keyboard(800));

    // Dismissed inside the throttle window, with no layout pass afterwards
    events.extend(monitor.on_layout(t0 + ms(50), keyboard(0)));
    assert!(monitor.is_visible());

    events.extend(monitor.tick(t0 + ms(80)));
    assert!(!monitor.has_pending_hide());

    events.extend(monitor.tick(t0 + ms(1000)));
    assert!(monitor.has_pending_hide());
    events.extend(monitor.tick(t0 + ms(5000)));

    assert_eq!(hidden_transitions(&events), 1);
    assert!(!monitor.is_visible());
    assert_eq!(monitor.height(), 0);
}

#[test]
fn test_throttled_show_sample_is_evaluated_by_tick() {
    let mut monitor = KeyboardMonitor::default();
    let t0 = Instant::now();
    monitor.on_layout(t0, keyboard(0));
    monitor.on_layout(t0 + ms(30), keyboard(700));

    let events = monitor.tick(t0 + ms(100));
    assert_eq!(
        events,
        vec![KeyboardEvent::VisibilityChanged {
            visible: true,
            height: 700
        }]
    );
    assert!(monitor.tick(t0 + ms(400)).is_empty());
}

#[test]
fn test_subscribers_receive_events() {
    let mut monitor = KeyboardMonitor::default();
    let rx = monitor.subscribe();
    let t0 = Instant::now();

    monitor.on_layout(t0, keyboard(800));
    monitor.on_layout(t0 + ms(150), keyboard(0));
    monitor.tick(t0 + ms(400));

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        received,
        vec![
            KeyboardEvent::VisibilityChanged {
                visible: true,
                height: 800
            },
            KeyboardEvent::VisibilityChanged {
                visible: false,
                height: 0
            },
        ]
    );
}

#[test]
fn test_dropped_subscriber_is_pruned() {
    let mut monitor = KeyboardMonitor::default();
    let rx = monitor.subscribe();
    let kept = monitor.subscribe();
    drop(rx);

    monitor.on_layout(Instant::now(), keyboard(800));
    assert_eq!(monitor.subscribers.len(), 1);
    assert_eq!(kept.try_iter().count(), 1);
}

#[test]
fn test_settings_from_config() {
    let config = KeyboardConfig {
        throttle_ms: 40,
        visibility_ratio: 0.1,
        height_change_px: 20,
        hide_recheck_ms: 500,
    };
    let settings = KeyboardSettings::from(&config);
    assert_eq!(settings.throttle, ms(40));
    assert_eq!(settings.hide_recheck, ms(500));
    assert_eq!(settings.height_change_px, 20);
}

// =========================================================================
// Property Tests
// =========================================================================

// Samples oscillating around the 5% threshold inside one throttle window
// produce at most one visibility transition.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_oscillation_inside_window_flaps_at_most_once(
        samples in prop::collection::vec((0u64..100, 90u32..110), 1..30),
        start_visible in prop::bool::ANY
    ) {
        let mut monitor = KeyboardMonitor::default();
        let base = Instant::now();
        let t0 = base + ms(1000);
        if start_visible {
            monitor.on_layout(base, keyboard(800));
        }

        let mut sorted = samples;
        sorted.sort_by_key(|(offset, _)| *offset);

        let mut events = Vec::new();
        for (offset, height) in sorted {
            events.extend(monitor.on_layout(t0 + ms(offset), keyboard(height)));
        }

        prop_assert!(visibility_transitions(&events) <= 1);
    }
}
