//! AbortSignal - cooperative cancellation handle
//!
//! One signal type serves both sides: callers hold one to cancel a scan,
//! and plugins receive the effective one to check at their checkpoints.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{PluginError, ScanError};

/// Error code carried by deadline-initiated aborts
pub const SCAN_TIMEOUT: &str = "SCAN_TIMEOUT";

/// Error code carried by caller-initiated aborts
pub const SCAN_CANCELLED: &str = "SCAN_CANCELLED";

/// Why a signal was triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// Explicit cancellation by the caller
    Cancelled { message: Option<String> },

    /// The request deadline elapsed
    Timeout { timeout_ms: u64 },
}

impl AbortReason {
    /// Plain caller cancellation without a message
    pub fn cancelled() -> Self {
        Self::Cancelled { message: None }
    }

    /// Caller cancellation with a message
    pub fn cancelled_with(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: Some(message.into()),
        }
    }

    /// Stable error code (`SCAN_TIMEOUT` / `SCAN_CANCELLED`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => SCAN_CANCELLED,
            Self::Timeout { .. } => SCAN_TIMEOUT,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Convert into the matching terminal scan error
    pub fn to_error(&self) -> ScanError {
        match self {
            Self::Cancelled { message } => ScanError::Cancelled {
                message: message.clone(),
            },
            Self::Timeout { timeout_ms } => ScanError::Timeout {
                timeout_ms: *timeout_ms,
            },
        }
    }
}

/// Cancellation signal with a sticky reason.
///
/// Cloning shares the underlying state. The first `abort` wins: later calls
/// neither change the reason nor un-trigger the signal.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
}

impl AbortSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that is already triggered
    pub fn aborted_with(reason: AbortReason) -> Self {
        let signal = Self::new();
        signal.abort(reason);
        signal
    }

    /// Trigger the signal.
    ///
    /// Returns `true` if this call triggered it, `false` if it was already
    /// triggered.
    pub fn abort(&self, reason: AbortReason) -> bool {
        // Reason must be visible before the token flips.
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    /// Trigger with a plain caller cancellation
    pub fn cancel(&self) -> bool {
        self.abort(AbortReason::cancelled())
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason of the first trigger, if any
    pub fn reason(&self) -> Option<&AbortReason> {
        if self.is_aborted() {
            self.reason.get()
        } else {
            None
        }
    }

    /// True iff the signal was triggered by a deadline
    pub fn is_timeout(&self) -> bool {
        self.reason().is_some_and(AbortReason::is_timeout)
    }

    /// Resolves once the signal is triggered
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// Terminal error for a triggered signal
    pub fn to_error(&self) -> Option<ScanError> {
        self.reason().map(AbortReason::to_error)
    }

    /// Plugin checkpoint helper.
    ///
    /// # Errors
    /// Returns `PluginError::Cancelled` once the signal is triggered.
    pub fn check(&self) -> Result<(), PluginError> {
        if self.is_aborted() {
            Err(PluginError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let signal = AbortSignal::new();
        assert!(signal.reason().is_none());

        assert!(signal.abort(AbortReason::Timeout { timeout_ms: 50 }));
        assert!(!signal.cancel());

        assert!(signal.is_aborted());
        assert!(signal.is_timeout());
        assert_eq!(signal.reason().map(AbortReason::code), Some(SCAN_TIMEOUT));
    }

    #[test]
    fn test_clone_shares_state() {
        let signal = AbortSignal::new();
        let observer = signal.clone();

        signal.abort(AbortReason::cancelled_with("user left the page"));

        assert!(observer.is_aborted());
        assert!(matches!(
            observer.to_error(),
            Some(ScanError::Cancelled { message: Some(ref m) }) if m == "user left the page"
        ));
    }

    #[test]
    fn test_check_reports_cancelled() {
        let signal = AbortSignal::new();
        assert!(signal.check().is_ok());
        signal.cancel();
        assert!(matches!(signal.check(), Err(PluginError::Cancelled)));
    }

    #[tokio::test]
    async fn test_aborted_future_resolves() {
        let signal = AbortSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.aborted().await });

        signal.cancel();
        handle.await.unwrap();
    }
}
