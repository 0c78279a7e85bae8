//! Bridge wire messages
//!
//! Content → native calls travel as JSON objects tagged by `type`, with
//! camelCase payload fields:
//!
//! ```json
//! {"type":"saveSubmittedValue","fieldIdentifier":"email","value":"a@b.com","fieldType":"email"}
//! ```

use std::sync::mpsc::Sender;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A protocol call from the content runtime to the native side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeCall {
    InputFocused {
        field_identifier: String,
        field_type: String,
    },
    InputBlurred {
        field_identifier: String,
    },
    InputValueChanged {
        field_identifier: String,
        value: String,
    },
    SaveSubmittedValue {
        field_identifier: String,
        value: String,
        field_type: String,
    },
    PageUrlChanged {
        url: String,
    },
    ReportFieldCount {
        count: u32,
    },
    LogError {
        message: String,
    },
}

impl BridgeCall {
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Protocol name of the call, as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            BridgeCall::InputFocused { .. } => "inputFocused",
            BridgeCall::InputBlurred { .. } => "inputBlurred",
            BridgeCall::InputValueChanged { .. } => "inputValueChanged",
            BridgeCall::SaveSubmittedValue { .. } => "saveSubmittedValue",
            BridgeCall::PageUrlChanged { .. } => "pageUrlChanged",
            BridgeCall::ReportFieldCount { .. } => "reportFieldCount",
            BridgeCall::LogError { .. } => "logError",
        }
    }

    /// Field the call is about, for field-scoped calls
    pub fn field_identifier(&self) -> Option<&str> {
        match self {
            BridgeCall::InputFocused {
                field_identifier, ..
            }
            | BridgeCall::InputBlurred { field_identifier }
            | BridgeCall::InputValueChanged {
                field_identifier, ..
            }
            | BridgeCall::SaveSubmittedValue {
                field_identifier, ..
            } => Some(field_identifier),
            _ => None,
        }
    }
}

/// Destination for protocol calls emitted by an observer
pub trait BridgeSink {
    fn post(&mut self, call: BridgeCall);
}

impl BridgeSink for Vec<BridgeCall> {
    fn post(&mut self, call: BridgeCall) {
        self.push(call);
    }
}

impl BridgeSink for Sender<BridgeCall> {
    fn post(&mut self, call: BridgeCall) {
        // Fire-and-forget: a closed receiver means the binding is gone
        let _ = self.send(call);
    }
}

/// Result of the presence check evaluated after injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceReport {
    pub installed: bool,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub fields: u32,
}

impl PresenceReport {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        decode_script_result(raw)
    }
}

/// Decode the result of a script evaluation
///
/// Hosts hand back the script's completion value serialized as JSON. Scripts
/// that return `JSON.stringify(...)` therefore arrive double-encoded; a
/// top-level JSON string is unwrapped and parsed once more.
pub fn decode_script_result<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_str(raw.trim())?;
    match value {
        Value::String(inner) => match serde_json::from_str::<T>(&inner) {
            Ok(decoded) => Ok(decoded),
            Err(_) => serde_json::from_value(Value::String(inner)),
        },
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod message_tests;
