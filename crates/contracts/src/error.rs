//! Layered error definitions
//!
//! Categorized by source: registration / request / abort / source / config

use thiserror::Error;

use crate::{ScanContext, SCAN_CANCELLED, SCAN_TIMEOUT};

/// Unified scan error type
#[derive(Debug, Error)]
pub enum ScanError {
    // ===== Registration Errors =====
    /// Plugin failed shape validation at registration time
    #[error("invalid plugin '{format}': {reason}")]
    InvalidPlugin { format: String, reason: String },

    // ===== Request Errors =====
    /// One or more requested formats have no registered plugin
    #[error("unsupported format(s): {}", .formats.join(", "))]
    UnsupportedFormat { formats: Vec<String> },

    /// Resolution policy string is not recognized
    #[error("unknown scan mode '{mode}' (expected first, all or exhaustive)")]
    UnknownMode { mode: String },

    /// Request named no formats at all
    #[error("no formats requested")]
    NoFormatsRequested,

    /// Every plugin settled without producing data ("first" policy only)
    #[error("no results for format(s): {}", .formats.join(", "))]
    NoResults {
        formats: Vec<String>,
        /// Formats whose plugin reported an error rather than no data
        failed: Vec<String>,
    },

    // ===== Abort Errors =====
    /// Caller-initiated cancellation
    #[error("scan cancelled{}", cancel_suffix(.message))]
    Cancelled { message: Option<String> },

    /// Deadline-initiated abort
    #[error("scan timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ===== Source Errors =====
    /// A live source stopped delivering frames
    #[error("frame source '{source_id}' closed")]
    SourceClosed { source_id: String },

    /// A continuous scan is already running on this scanner
    #[error("a continuous scan is already in progress")]
    ContinuousScanActive,

    /// Terminal continuous-scan failure with diagnostic context
    #[error(transparent)]
    Continuous(Box<ContinuousFailure>),

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn cancel_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

impl ScanError {
    /// Create invalid plugin error
    pub fn invalid_plugin(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlugin {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code, preserved through enrichment
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPlugin { .. } => "INVALID_PLUGIN",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::UnknownMode { .. } => "UNKNOWN_MODE",
            Self::NoFormatsRequested => "NO_FORMATS",
            Self::NoResults { .. } => "NO_RESULTS",
            Self::Cancelled { .. } => SCAN_CANCELLED,
            Self::Timeout { .. } => SCAN_TIMEOUT,
            Self::SourceClosed { .. } => "SOURCE_CLOSED",
            Self::ContinuousScanActive => "SCAN_IN_PROGRESS",
            Self::Continuous(failure) => failure.source.code(),
            Self::ConfigParse { .. } => "CONFIG_PARSE",
            Self::ConfigValidation { .. } => "CONFIG_INVALID",
            Self::Io(_) => "IO",
        }
    }

    /// True for cancellation or timeout, including enriched ones
    pub fn is_abort(&self) -> bool {
        match self {
            Self::Cancelled { .. } | Self::Timeout { .. } => true,
            Self::Continuous(failure) => failure.source.is_abort(),
            _ => false,
        }
    }

    /// True for deadline-initiated aborts, including enriched ones
    pub fn is_timeout(&self) -> bool {
        self.code() == SCAN_TIMEOUT
    }

    /// Diagnostic context, present on enriched continuous-scan failures
    pub fn context(&self) -> Option<&ScanContext> {
        match self {
            Self::Continuous(failure) => Some(&failure.context),
            _ => None,
        }
    }

    /// Innermost error, unwrapping enrichment
    pub fn root(&self) -> &ScanError {
        match self {
            Self::Continuous(failure) => failure.source.root(),
            other => other,
        }
    }
}

/// A terminal continuous-scan error together with its run context
#[derive(Debug, Error)]
#[error("{source} ({context})")]
pub struct ContinuousFailure {
    pub context: ScanContext,
    #[source]
    pub source: ScanError,
}

impl From<ContinuousFailure> for ScanError {
    fn from(failure: ContinuousFailure) -> Self {
        Self::Continuous(Box::new(failure))
    }
}

/// Error returned by a plugin's `scan`
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin observed the abort signal and stopped
    #[error("scan cancelled")]
    Cancelled,

    /// Detection itself failed
    #[error("detection failed: {message}")]
    Detection { message: String },

    /// Plugin cannot handle this kind of source
    #[error("unsupported source kind '{kind}'")]
    UnsupportedSource { kind: String },

    /// Source could not be decoded into pixels
    #[error("image decode error: {0}")]
    Decode(String),
}

impl PluginError {
    /// Create detection error
    pub fn detection(message: impl Into<String>) -> Self {
        Self::Detection {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
