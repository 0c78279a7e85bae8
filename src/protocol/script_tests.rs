//! Tests for protocol/script

use super::*;

#[test]
fn test_observer_script_fills_every_placeholder() {
    let script = observer_script(&ScriptSettings::default());
    assert!(!script.contains("__KEY__"));
    assert!(!script.contains("__CHANNEL__"));
    assert!(!script.contains("__VERSION__"));
    assert!(!script.contains("__POLL_MS__"));
    assert!(script.contains(r#"var CHANNEL = "formfillBridge";"#));
    assert!(script.contains("var POLL_MS = 500;"));
    assert!(script.contains(&format!("var VERSION = {};", OBSERVER_VERSION)));
}

#[test]
fn test_observer_script_uses_configured_channel() {
    let settings = ScriptSettings {
        channel: "hostBridge".to_string(),
        url_poll_interval: Duration::from_millis(250),
    };
    let script = observer_script(&settings);
    assert!(script.contains(r#"var CHANNEL = "hostBridge";"#));
    assert!(script.contains("var POLL_MS = 250;"));
}

#[test]
fn test_zero_poll_interval_is_clamped() {
    let settings = ScriptSettings {
        channel: "c".to_string(),
        url_poll_interval: Duration::ZERO,
    };
    assert!(observer_script(&settings).contains("var POLL_MS = 100;"));
}

#[test]
fn test_observer_script_never_reports_passwords() {
    let script = observer_script(&ScriptSettings::default());
    assert!(script.contains("inputType(el) === 'password'"));
    assert!(script.contains("this.sensitive.has(el)"));
}

#[test]
fn test_observer_script_matches_tags_case_insensitively() {
    let script = observer_script(&ScriptSettings::default());
    assert!(script.contains("toLowerCase()"));
    assert!(script.contains("tagOf(el) === 'input' && inputType(el) === 'password'"));
    // XHTML documents report lowercase tag names
    assert!(!script.contains("tagName === 'INPUT'"));
    assert!(!script.contains("tagName !== 'INPUT'"));
    assert!(!script.contains("tagName === 'TEXTAREA'"));
}

#[test]
fn test_set_input_value_script_escapes_arguments() {
    let script = set_input_value_script("user\"name", "'); alert(1); ('\n</script>");
    assert!(script.contains(r#"o.setInputValue("user\"name", "'); alert(1); ('\n</script>")"#));
    assert!(!script.contains('\n'));
}

#[test]
fn test_line_separators_are_escaped() {
    let script = set_input_value_script("note", "a\u{2028}b\u{2029}c");
    assert!(script.contains(r"a\u2028b\u2029c"));
    assert!(!script.contains('\u{2028}'));
}

#[test]
fn test_presence_and_teardown_scripts_reference_observer_key() {
    assert!(presence_check_script().contains(r#"window["__formfillObserver"]"#));
    assert!(presence_check_script().contains("installed: false"));
    assert!(teardown_script().contains("o.teardown()"));
}

#[test]
fn test_settings_from_config() {
    let config = BridgeConfig {
        channel: "x".to_string(),
        url_poll_interval_ms: 900,
        ..BridgeConfig::default()
    };
    let settings = ScriptSettings::from(&config);
    assert_eq!(settings.channel, "x");
    assert_eq!(settings.url_poll_interval, Duration::from_millis(900));
}
