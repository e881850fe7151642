//! Mock plugin implementation
//!
//! Implements `ScanPlugin` with scripted behavior, so dispatch and
//! continuous scanning can be exercised without a real detector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{Detection, PluginError, PluginOptions, ScanPlugin, ScanSource};
use tracing::trace;

use crate::listeners::lock;

/// What a `MockPlugin` does once its delay has elapsed
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Return the configured detections (possibly none)
    #[default]
    Detect,
    /// Fail with a detection error
    Fail(String),
    /// Never settle on its own
    NeverResolve,
}

/// Mock plugin
///
/// Cancellation-aware by default: the signal is checked on entry and raced
/// against the configured delay.
#[derive(Debug)]
pub struct MockPlugin {
    format: String,
    detections: Vec<Detection>,
    delay: Duration,
    behavior: MockBehavior,
    honor_cancellation: bool,
    calls: AtomicUsize,
    cancellations: AtomicUsize,
    last_params: Mutex<Option<serde_json::Value>>,
}

impl MockPlugin {
    /// Mock plugin that returns nothing, immediately
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            detections: Vec::new(),
            delay: Duration::ZERO,
            behavior: MockBehavior::Detect,
            honor_cancellation: true,
            calls: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    /// Return one detection per text
    pub fn returning<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detections = texts
            .into_iter()
            .map(|text| Detection::new(self.format.clone(), text).with_confidence(1.0))
            .collect();
        self
    }

    /// Settle only after `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every invocation with a detection error
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = MockBehavior::Fail(message.into());
        self
    }

    /// Never settle unless cancelled
    pub fn never_resolving(mut self) -> Self {
        self.behavior = MockBehavior::NeverResolve;
        self
    }

    /// Ignore the abort signal entirely
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honor_cancellation = false;
        self
    }

    /// Number of invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of invocations that returned `PluginError::Cancelled`
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Params of the most recent invocation
    pub fn last_params(&self) -> Option<serde_json::Value> {
        lock(&self.last_params).clone()
    }

    fn cancelled(&self) -> PluginError {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        PluginError::Cancelled
    }

    /// Wait for `duration` (forever if `None`), cut short by the signal
    async fn wait(
        &self,
        duration: Option<Duration>,
        options: &PluginOptions,
    ) -> Result<(), PluginError> {
        let sleep = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        if !self.honor_cancellation {
            sleep.await;
            return Ok(());
        }

        tokio::select! {
            _ = options.signal.aborted() => Err(self.cancelled()),
            _ = sleep => Ok(()),
        }
    }
}

#[async_trait]
impl ScanPlugin for MockPlugin {
    fn format(&self) -> &str {
        &self.format
    }

    async fn scan(
        &self,
        source: &ScanSource,
        options: &PluginOptions,
    ) -> Result<Vec<Detection>, PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_params) = Some(options.params.clone());
        trace!(format = %self.format, source = source.kind(), "mock scan");

        if self.honor_cancellation && options.signal.is_aborted() {
            return Err(self.cancelled());
        }

        match &self.behavior {
            MockBehavior::NeverResolve => {
                self.wait(None, options).await?;
                Ok(Vec::new())
            }
            behavior => {
                if !self.delay.is_zero() {
                    self.wait(Some(self.delay), options).await?;
                }
                match behavior {
                    MockBehavior::Fail(message) => Err(PluginError::detection(message.clone())),
                    _ => Ok(self.detections.clone()),
                }
            }
        }
    }
}
