//! ScanContext - diagnostic context attached to continuous-scan failures

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Continuous-scan scheduling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Paced by the source's frame-ready notifications
    FrameSynchronized,
    /// Paced by a fixed wall-clock delay
    Polling,
}

impl ScanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameSynchronized => "frame-synchronized",
            Self::Polling => "interval-polling",
        }
    }
}

impl fmt::Display for ScanStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    UserCancellation,
    Unexpected,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::UserCancellation => "user cancellation",
            Self::Unexpected => "unexpected",
        }
    }

    /// Only unexpected failures are retried by the continuous loops
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unexpected)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context of one continuous-scan run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanContext {
    /// Attempts (frames for the frame-synchronized strategy) so far
    pub attempts: u64,

    /// Strategy that was active
    pub strategy: ScanStrategy,

    /// Classified failure reason
    pub reason: FailureReason,

    /// Time since the run started
    pub elapsed: Duration,

    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,

    /// Wall-clock time of the first attempt
    pub first_attempt_at: Option<DateTime<Utc>>,

    /// Wall-clock time of the latest attempt
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl ScanContext {
    /// Unit the attempt counter is expressed in
    pub fn attempt_unit(&self) -> &'static str {
        match (self.strategy, self.attempts) {
            (ScanStrategy::FrameSynchronized, 1) => "frame",
            (ScanStrategy::FrameSynchronized, _) => "frames",
            (ScanStrategy::Polling, 1) => "attempt",
            (ScanStrategy::Polling, _) => "attempts",
        }
    }
}

impl fmt::Display for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no match after {} {} using {} scanning, reason: {}",
            self.attempts,
            self.attempt_unit(),
            self.strategy,
            self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let context = ScanContext {
            attempts: 47,
            strategy: ScanStrategy::FrameSynchronized,
            reason: FailureReason::Timeout,
            elapsed: Duration::from_millis(1500),
            started_at: Utc::now(),
            first_attempt_at: None,
            last_attempt_at: None,
        };

        assert_eq!(
            context.to_string(),
            "no match after 47 frames using frame-synchronized scanning, reason: timeout"
        );
    }

    #[test]
    fn test_only_unexpected_is_retryable() {
        assert!(FailureReason::Unexpected.is_retryable());
        assert!(!FailureReason::Timeout.is_retryable());
        assert!(!FailureReason::UserCancellation.is_retryable());
    }
}
