//! Bridge Coordinator
//!
//! Owns every binding between a content surface and the suggestion
//! subsystem. Injects and verifies the observer, routes its calls to the
//! store and the panel, and reacts to keyboard visibility.

mod binding;
mod coordinator;
mod surface;

pub use binding::{FieldFocusState, TabId};
pub use coordinator::{BridgeCoordinator, HostContext};
pub use surface::{ContentSurface, NoopPresenter, PanelPresenter, SurfaceError};
