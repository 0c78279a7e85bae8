//! Host collaborators of a binding

use thiserror::Error;

use crate::panel::PanelState;

/// Errors reported by a host while evaluating scripts
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Script evaluation timed out")]
    Timeout,

    #[error("Content surface is detached")]
    Detached,
}

/// A hosted page the coordinator can run scripts in
pub trait ContentSurface {
    /// Evaluate `script` in the page and return its completion value as JSON
    fn evaluate_script(&mut self, script: &str) -> Result<String, SurfaceError>;

    /// URL of the currently loaded document
    fn current_url(&self) -> Option<String>;
}

/// Renders the suggestion panel for one binding
pub trait PanelPresenter {
    /// Called after every panel state change
    fn present(&mut self, state: &PanelState, keyboard_height: u32);
}

/// Presenter for headless bindings
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresenter;

impl PanelPresenter for NoopPresenter {
    fn present(&mut self, _state: &PanelState, _keyboard_height: u32) {}
}
