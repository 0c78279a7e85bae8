//! formfill: input suggestions for embedded web content
//!
//! Remembers what users type into form fields of hosted pages and offers
//! ranked candidates when they focus a matching field again.
//!
//! - [`store`]: SQLite persistence of field observations
//! - [`suggestions`]: ranking and the per-binding background worker
//! - [`protocol`]: the observer that runs inside the page, and its wire format
//! - [`bridge`]: the native coordinator routing protocol traffic
//! - [`panel`] and [`keyboard`]: when and what the suggestion surface shows

pub mod bridge;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod panel;
pub mod protocol;
pub mod store;
pub mod suggestions;

#[cfg(test)]
mod test_utils;

pub use bridge::{BridgeCoordinator, ContentSurface, HostContext, PanelPresenter, TabId};
pub use error::FormfillError;
pub use keyboard::{FrameGeometry, KeyboardEvent};
pub use panel::PanelState;
