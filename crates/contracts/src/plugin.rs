//! ScanPlugin trait - format detector interface
//!
//! Every detector (barcode, enhanced barcode, MRZ, ...) implements this trait
//! and is registered under its format identifier.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AbortSignal, PluginError, ScanSource};

/// Format detector
///
/// Implementations hold no state the orchestrator can observe. They should
/// call `options.signal.check()` at reasonable checkpoints and return
/// `PluginError::Cancelled` once the signal is triggered; any other error is
/// treated as "this format found nothing".
#[async_trait]
pub trait ScanPlugin: Send + Sync {
    /// Format identifier (unique registry key)
    fn format(&self) -> &str;

    /// Detect every payload of this format in the source
    ///
    /// # Errors
    /// `PluginError::Cancelled` when aborted, any other variant on failure.
    async fn scan(
        &self,
        source: &ScanSource,
        options: &PluginOptions,
    ) -> Result<Vec<Detection>, PluginError>;
}

/// Per-invocation plugin options
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// Effective abort signal of the request
    pub signal: AbortSignal,

    /// Format-keyed overrides from the request (`Null` when none)
    pub params: serde_json::Value,
}

impl PluginOptions {
    pub fn new(signal: AbortSignal, params: serde_json::Value) -> Self {
        Self { signal, params }
    }

    /// Typed lookup of one parameter
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Axis-aligned bounding box (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 2D point (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One recognized payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Recognized text
    pub text: String,

    /// Producing format
    pub format: String,

    /// Bounding region, if the detector reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    /// Corner points, clockwise from top-left
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corner_points: Vec<Point>,

    /// Detector confidence in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Raw binary payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Bytes>,
}

impl Detection {
    pub fn new(format: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: format.into(),
            bounding_box: None,
            corner_points: Vec::new(),
            confidence: None,
            raw: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}
