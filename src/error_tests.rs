//! Tests for FormfillError type

use super::*;

#[test]
fn test_bridge_not_ready_display() {
    let error = FormfillError::BridgeNotReady {
        tab: "tab-7".to_string(),
        attempts: 2,
    };
    let msg = error.to_string();
    assert!(msg.contains("tab-7"));
    assert!(msg.contains("2 injection attempt"));
}

#[test]
fn test_serialization_error_from_serde() {
    let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error = FormfillError::from(serde_err);
    assert!(matches!(error, FormfillError::Serialization(_)));
    assert!(error.to_string().contains("Malformed bridge payload"));
}

#[test]
fn test_untrackable_field_display() {
    let msg = FormfillError::UntrackableField.to_string();
    assert!(msg.contains("neither id nor name"));
}

#[test]
fn test_store_error_wraps() {
    let error = FormfillError::from(StoreError::Timeout(250));
    assert!(matches!(error, FormfillError::Store(StoreError::Timeout(250))));
    assert!(error.to_string().contains("250"));
}

#[test]
fn test_io_error_from_std_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test error");
    let err = FormfillError::from(io_err);
    assert!(matches!(err, FormfillError::Io(_)));
    assert!(err.to_string().contains("test error"));
}

#[test]
fn test_surface_error_wraps() {
    let error = FormfillError::from(SurfaceError::Script("ReferenceError".to_string()));
    assert!(matches!(error, FormfillError::Surface(SurfaceError::Script(_))));
    assert!(error.to_string().contains("ReferenceError"));
}
