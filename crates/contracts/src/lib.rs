//! # Contracts
//!
//! Frozen interface contracts shared by every scanning crate: the plugin
//! contract, scan sources, requests and results, the abort signal and the
//! error taxonomy. Business crates depend on this crate, never the reverse.
//!
//! ## Time Model
//! - Deadlines and poll intervals are wall-clock `Duration`s
//! - Frame timestamps are source-relative seconds (f64), diagnostics only

mod config;
mod context;
mod error;
mod plugin;
mod scan;
mod signal;
mod source;

pub use config::*;
pub use context::*;
pub use error::*;
pub use plugin::*;
pub use scan::*;
pub use signal::{AbortReason, AbortSignal, SCAN_CANCELLED, SCAN_TIMEOUT};
pub use source::*;
