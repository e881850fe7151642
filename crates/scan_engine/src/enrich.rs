//! Error context enrichment for continuous scans

use contracts::{AbortSignal, ContinuousFailure, FailureReason, ScanError, ScanStrategy};

use crate::metrics::ScanMetrics;

/// Classify why a run ended, from its effective signal
pub fn classify(signal: &AbortSignal) -> FailureReason {
    if signal.is_timeout() {
        FailureReason::Timeout
    } else if signal.is_aborted() {
        FailureReason::UserCancellation
    } else {
        FailureReason::Unexpected
    }
}

/// Attach the run context to a terminal error
///
/// Errors that already carry a context are returned unchanged.
pub fn enrich(
    error: ScanError,
    signal: &AbortSignal,
    metrics: &ScanMetrics,
    strategy: ScanStrategy,
) -> ScanError {
    if error.context().is_some() {
        return error;
    }

    let context = metrics.context(strategy, classify(signal));
    observability::record_scan_abort(&context);
    ContinuousFailure {
        context,
        source: error,
    }
    .into()
}
