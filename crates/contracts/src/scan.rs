//! Scan requests and results

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AbortSignal, Detection, ScanError};

/// Resolution policy of a multi-format request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Resolve with the first format that produces data
    #[default]
    First,

    /// Wait for every format, return all that produced data
    All,

    /// Let every format attempt regardless of early success.
    ///
    /// Currently resolves exactly like `All`.
    Exhaustive,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::All => "all",
            Self::Exhaustive => "exhaustive",
        }
    }
}

impl FromStr for ScanMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "all" => Ok(Self::All),
            "exhaustive" => Ok(Self::Exhaustive),
            _ => Err(ScanError::UnknownMode { mode: s.to_string() }),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of one scan request
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Requested formats, in request order
    pub formats: Vec<String>,

    /// Resolution policy
    pub mode: ScanMode,

    /// Caller cancellation handle
    pub signal: Option<AbortSignal>,

    /// Format-keyed plugin option overrides
    pub plugin_options: HashMap<String, serde_json::Value>,

    /// Request deadline (None = no deadline)
    pub timeout: Option<Duration>,
}

impl ScanOptions {
    /// Options for the given formats with default policy
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formats: formats.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_plugin_options(
        mut self,
        format: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        self.plugin_options.insert(format.into(), params);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Millisecond deadline; `0` disables it
    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(timeout_ms))
    }

    /// Overrides for one format (`Null` when none)
    pub fn params_for(&self, format: &str) -> serde_json::Value {
        self.plugin_options
            .get(format)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Successful per-format result returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatResult {
    pub format: String,
    pub data: Vec<Detection>,
}

/// Outcome of one attempted format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub format: String,

    /// True iff `data` is non-empty
    pub success: bool,

    pub data: Vec<Detection>,

    /// Failure message, if the plugin failed
    pub error: Option<String>,
}

impl ScanOutcome {
    /// Outcome of a plugin that returned; success depends on the payload
    pub fn completed(format: impl Into<String>, data: Vec<Detection>) -> Self {
        Self {
            format: format.into(),
            success: !data.is_empty(),
            data,
            error: None,
        }
    }

    /// Outcome of a plugin that failed
    pub fn failed(format: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            success: false,
            data: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Caller-facing result, only for successful outcomes
    pub fn into_result(self) -> Option<FormatResult> {
        if self.success && !self.data.is_empty() {
            Some(FormatResult {
                format: self.format,
                data: self.data,
            })
        } else {
            None
        }
    }
}
