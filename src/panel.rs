//! Suggestion panel state
//!
//! Tracks what the suggestion surface shows for the focused field and
//! which background query it is waiting on.

mod panel_state;

pub use panel_state::{PanelState, PanelStateMachine};
