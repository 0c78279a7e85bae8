use thiserror::Error;

use crate::bridge::SurfaceError;
use crate::store::StoreError;

/// Custom error types for formfill
///
/// None of these ever reach the hosted page: the coordinator logs them and
/// degrades the affected binding instead.
#[derive(Debug, Error)]
pub enum FormfillError {
    #[error("Bridge not ready for tab {tab} after {attempts} injection attempt(s)")]
    BridgeNotReady { tab: String, attempts: u8 },

    #[error("Malformed bridge payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Field has neither id nor name and cannot be tracked")]
    UntrackableField,

    #[error("Suggestion store error: {0}")]
    Store(#[from] StoreError),

    #[error("Content surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
