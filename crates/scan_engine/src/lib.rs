//! # Scan Engine
//!
//! Orchestration on top of the dispatcher.
//!
//! Responsibilities:
//! - Compose the caller's signal and the request deadline into one
//!   effective signal
//! - Run continuous scans, paced by frame notifications or by polling
//! - Attach run context to terminal continuous-scan errors
//! - Expose the `Scanner` facade
//!
//! ## Usage
//!
//! ```ignore
//! let scanner = Scanner::new(plugins)?;
//! let results = scanner
//!     .scan_continuous(&ScanSource::Video(camera), ScanOptions::new(["qr_code"]).with_timeout_ms(5000))
//!     .await?;
//! ```

pub mod continuous;
pub mod enrich;
pub mod metrics;
pub mod scanner;
pub mod signal;

pub use contracts::{FormatResult, ScanError, ScanMode, ScanOptions, ScanSource};
pub use continuous::{select_strategy, ContinuousReport, ContinuousScan, ScanState};
pub use enrich::{classify, enrich};
pub use metrics::ScanMetrics;
pub use scanner::Scanner;
pub use signal::{compose_signal, scan_timeout_ms, ComposedSignal};
