//! # Dispatcher
//!
//! Plugin registry and single-shot dispatch engine.
//!
//! Responsibilities:
//! - Keep one `ScanPlugin` per format identifier
//! - Fan a scan out to every requested plugin concurrently
//! - Reduce the outcomes with the request's `ScanMode`

pub mod dispatcher;
pub mod metrics;
pub mod registry;

pub use contracts::{ScanOutcome, ScanPlugin};
pub use dispatcher::Dispatcher;
pub use metrics::{MetricsSnapshot, PluginMetrics};
pub use registry::{PluginRegistry, RegisteredPlugin};
