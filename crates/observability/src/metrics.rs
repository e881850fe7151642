//! Scan metrics
//!
//! `metrics` facade recorders for requests, plugin invocations and
//! continuous-scan attempts, plus in-memory aggregation for summaries.

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ScanContext, ScanMode, ScanStrategy};
use metrics::{counter, histogram};

/// Settled state of one plugin invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginStatus {
    /// Returned non-empty data
    Success,
    /// Returned without data
    Empty,
    /// Failed with a detection error
    Failure,
    /// Observed the abort signal
    Cancelled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Record one single-shot request
pub fn record_scan_request(mode: ScanMode, formats: usize) {
    counter!("optiscan_scan_requests_total", "mode" => mode.as_str()).increment(1);
    histogram!("optiscan_scan_request_formats").record(formats as f64);
}

/// Record the settled state of one plugin invocation
pub fn record_plugin_outcome(format: &str, status: PluginStatus) {
    counter!(
        "optiscan_plugin_invocations_total",
        "format" => format.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Record plugin latency
pub fn record_plugin_latency_ms(format: &str, latency_ms: f64) {
    histogram!("optiscan_plugin_latency_ms", "format" => format.to_string()).record(latency_ms);
}

/// Record one continuous-scan attempt
pub fn record_continuous_attempt(strategy: ScanStrategy) {
    counter!("optiscan_continuous_attempts_total", "strategy" => strategy.as_str()).increment(1);
}

/// Record a terminal continuous-scan failure
pub fn record_scan_abort(context: &ScanContext) {
    counter!(
        "optiscan_scan_aborts_total",
        "strategy" => context.strategy.as_str(),
        "reason" => context.reason.as_str()
    )
    .increment(1);
    histogram!("optiscan_scan_abort_attempts").record(context.attempts as f64);
}

/// Continuous-scan aggregator
///
/// Aggregates finished runs in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct ScanStatsAggregator {
    /// Finished runs
    pub total_runs: u64,

    /// Runs that resolved with a match
    pub matched_runs: u64,

    /// Attempts per run
    pub attempt_stats: RunningStats,

    /// Run duration (ms)
    pub duration_stats: RunningStats,

    /// Failed runs per classified reason
    pub failure_counts: HashMap<String, u64>,
}

impl ScanStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run that matched
    pub fn record_match(&mut self, attempts: u64, elapsed: Duration) {
        self.total_runs += 1;
        self.matched_runs += 1;
        self.push_run(attempts, elapsed);
    }

    /// Record a run that ended with an error
    pub fn record_failure(&mut self, context: &ScanContext) {
        self.total_runs += 1;
        *self
            .failure_counts
            .entry(context.reason.as_str().to_string())
            .or_insert(0) += 1;
        self.push_run(context.attempts, context.elapsed);
    }

    fn push_run(&mut self, attempts: u64, elapsed: Duration) {
        self.attempt_stats.push(attempts as f64);
        self.duration_stats.push(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn summary(&self) -> ScanStatsSummary {
        ScanStatsSummary {
            total_runs: self.total_runs,
            matched_runs: self.matched_runs,
            match_rate: if self.total_runs > 0 {
                self.matched_runs as f64 / self.total_runs as f64 * 100.0
            } else {
                0.0
            },
            attempts: StatsSummary::from(&self.attempt_stats),
            duration_ms: StatsSummary::from(&self.duration_stats),
            failure_counts: self.failure_counts.clone(),
        }
    }
}

/// Aggregated summary
#[derive(Debug, Clone, Default)]
pub struct ScanStatsSummary {
    pub total_runs: u64,
    pub matched_runs: u64,
    pub match_rate: f64,
    pub attempts: StatsSummary,
    pub duration_ms: StatsSummary,
    pub failure_counts: HashMap<String, u64>,
}

impl std::fmt::Display for ScanStatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Scan Summary ===")?;
        writeln!(f, "Runs: {}", self.total_runs)?;
        writeln!(
            f,
            "Matched: {} ({:.2}%)",
            self.matched_runs, self.match_rate
        )?;
        writeln!(f, "Attempts per run: {}", self.attempts)?;
        writeln!(f, "Duration (ms): {}", self.duration_ms)?;

        if !self.failure_counts.is_empty() {
            let mut reasons: Vec<_> = self.failure_counts.iter().collect();
            reasons.sort();
            writeln!(f, "Failures:")?;
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
