//! Suggestion persistence
//!
//! A ranked, deduplicated table of field → value observations backed by SQLite.

mod record;
mod suggestion_store;

pub use record::{RecordId, SuggestionRecord, SuggestionSource, is_persistable, url_scope};
pub use suggestion_store::{
    DEFAULT_BUSY_TIMEOUT_MS, FieldSummary, SharedStore, StoreError, SuggestionStore, shared,
    with_store,
};
