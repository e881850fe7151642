//! Plugin metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use observability::PluginStatus;

/// Metrics for a single registered plugin
#[derive(Debug, Default)]
pub struct PluginMetrics {
    /// Total invocations
    invocations: AtomicU64,
    /// Invocations that returned data
    success_count: AtomicU64,
    /// Invocations that returned nothing
    empty_count: AtomicU64,
    /// Invocations that failed
    failure_count: AtomicU64,
    /// Invocations that observed the abort signal
    cancelled_count: AtomicU64,
    /// Sum of settled latencies (µs)
    total_latency_us: AtomicU64,
    /// Slowest settled invocation (µs)
    max_latency_us: AtomicU64,
}

impl PluginMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total invocation count
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Get success count
    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    /// Get empty count
    pub fn empty_count(&self) -> u64 {
        self.empty_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Get cancelled count
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled_count.load(Ordering::Relaxed)
    }

    /// Record one settled invocation
    pub fn record(&self, status: PluginStatus, latency: Duration) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            PluginStatus::Success => &self.success_count,
            PluginStatus::Empty => &self.empty_count,
            PluginStatus::Failure => &self.failure_count,
            PluginStatus::Cancelled => &self.cancelled_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
        self.max_latency_us.fetch_max(micros, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let invocations = self.invocations();
        let total_us = self.total_latency_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            invocations,
            success_count: self.success_count(),
            empty_count: self.empty_count(),
            failure_count: self.failure_count(),
            cancelled_count: self.cancelled_count(),
            mean_latency_ms: if invocations > 0 {
                total_us as f64 / invocations as f64 / 1000.0
            } else {
                0.0
            },
            max_latency_ms: self.max_latency_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Snapshot of plugin metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub invocations: u64,
    pub success_count: u64,
    pub empty_count: u64,
    pub failure_count: u64,
    pub cancelled_count: u64,
    pub mean_latency_ms: f64,
    pub max_latency_ms: f64,
}
