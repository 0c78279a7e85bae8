mod monitor;

pub use monitor::{FrameGeometry, KeyboardEvent, KeyboardMonitor, KeyboardSettings};
