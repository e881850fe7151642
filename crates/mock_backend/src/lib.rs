//! # Mock Backend
//!
//! Stand-ins for real detectors and cameras.
//!
//! Responsibilities:
//! - Scripted `ScanPlugin` implementations (`MockPlugin`, `FnPlugin`)
//! - Live `FrameSource` implementations (`MockCamera`, `ManualFrameSource`)
//!
//! Used for testing and development without a detector library or a camera.

mod listeners;

pub mod fn_plugin;
pub mod manual_source;
pub mod mock_camera;
pub mod mock_plugin;

pub use contracts::{FrameSource, ScanPlugin};
pub use fn_plugin::{FnPlugin, FnPluginBuilder};
pub use manual_source::ManualFrameSource;
pub use mock_camera::{MockCamera, MockCameraConfig};
pub use mock_plugin::{MockBehavior, MockPlugin};
