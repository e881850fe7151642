//! Per-run continuous-scan metrics

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use contracts::{FailureReason, ScanContext, ScanStrategy};

/// Attempt bookkeeping of one continuous-scan run
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    started: Instant,
    started_at: DateTime<Utc>,
    attempts: u64,
    first_attempt_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            attempts: 0,
            first_attempt_at: None,
            last_attempt_at: None,
        }
    }

    /// Count one attempt; returns the new attempt number
    pub fn record_attempt(&mut self) -> u64 {
        let now = Utc::now();
        self.attempts += 1;
        self.first_attempt_at.get_or_insert(now);
        self.last_attempt_at = Some(now);
        self.attempts
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Freeze into a diagnostic context
    pub fn context(&self, strategy: ScanStrategy, reason: FailureReason) -> ScanContext {
        ScanContext {
            attempts: self.attempts,
            strategy,
            reason,
            elapsed: self.elapsed(),
            started_at: self.started_at,
            first_attempt_at: self.first_attempt_at,
            last_attempt_at: self.last_attempt_at,
        }
    }
}
