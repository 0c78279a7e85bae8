//! Field Observation Protocol
//!
//! The contract executed inside the content runtime: find eligible input
//! fields, follow their focus/blur/input lifecycle and relay it across the
//! bridge. `script` holds the injected rendition; `observer` is the same
//! protocol over the `ContentDocument` trait, for embedders that expose the
//! DOM natively.

pub mod dom;
pub mod message;
pub mod observer;
pub mod script;

pub use dom::{ContentDocument, DomEvent, MemoryDocument, NodeId, SyntheticEvent};
pub use message::{BridgeCall, BridgeSink, PresenceReport, decode_script_result};
pub use observer::{
    FieldObserver, ObserverSettings, TEXT_LIKE_TYPES, eligible_field_type, field_identifier,
};
pub use script::{
    OBSERVER_VERSION, ScriptSettings, observer_script, presence_check_script,
    set_input_value_script, teardown_script,
};
