//! Continuous scan controller
//!
//! Repeats single-shot dispatches against a live source until one produces
//! data, the effective signal aborts, or the source goes away.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AbortSignal, ContinuousConfig, FormatResult, Frame, FrameCallback, FrameSource, ListenerId,
    ScanError, ScanMode, ScanOptions, ScanSource, ScanStrategy,
};
use dispatcher::Dispatcher;
use tokio::sync::watch;
use tracing::{debug, info, instrument, trace, warn};

use crate::enrich::{classify, enrich};
use crate::metrics::ScanMetrics;

/// Lifecycle of continuous scanning on one scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    /// No run has happened, or the last one was dropped mid-flight
    Idle = 0,
    /// A run is in flight
    Scanning = 1,
    /// The last run found data
    Resolved = 2,
    /// The last run ended with an error
    Rejected = 3,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Scanning,
            2 => Self::Resolved,
            3 => Self::Rejected,
            _ => Self::Idle,
        }
    }
}

/// Shared state cell that admits one run at a time
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl Default for StateCell {
    fn default() -> Self {
        Self(AtomicU8::new(ScanState::Idle as u8))
    }
}

impl StateCell {
    pub(crate) fn get(&self) -> ScanState {
        ScanState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Enter `Scanning`, unless a run is already in flight
    pub(crate) fn begin(&self) -> Result<RunGuard<'_>, ScanError> {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                (state != ScanState::Scanning as u8).then_some(ScanState::Scanning as u8)
            })
            .map(|_| RunGuard {
                cell: self,
                finished: false,
            })
            .map_err(|_| ScanError::ContinuousScanActive)
    }
}

/// Releases the state cell when a run ends or is dropped
pub(crate) struct RunGuard<'a> {
    cell: &'a StateCell,
    finished: bool,
}

impl RunGuard<'_> {
    pub(crate) fn finish(mut self, state: ScanState) {
        self.cell.0.store(state as u8, Ordering::SeqCst);
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cell.0.store(ScanState::Idle as u8, Ordering::SeqCst);
        }
    }
}

/// Result of a continuous scan that found data
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousReport {
    pub results: Vec<FormatResult>,
    pub strategy: ScanStrategy,
    /// Attempts including the matching one
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Pick the scheduling strategy for a source
pub fn select_strategy(source: &ScanSource) -> ScanStrategy {
    if source.supports_frame_callback() {
        ScanStrategy::FrameSynchronized
    } else {
        ScanStrategy::Polling
    }
}

/// Removes a frame listener when dropped
struct ListenerGuard<'a> {
    source: &'a dyn FrameSource,
    id: ListenerId,
}

impl<'a> ListenerGuard<'a> {
    fn register(source: &'a dyn FrameSource, callback: FrameCallback) -> Self {
        let id = source.add_frame_listener(callback);
        Self { source, id }
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.source.remove_frame_listener(self.id);
        trace!(source_id = self.source.source_id(), "Frame listener removed");
    }
}

/// One continuous-scan run
pub struct ContinuousScan<'a> {
    dispatcher: &'a Dispatcher,
    source: &'a ScanSource,
    signal: &'a AbortSignal,
    attempt_options: ScanOptions,
    poll_interval: Duration,
    failure_ceiling: Option<u32>,
    strategy: ScanStrategy,
    metrics: ScanMetrics,
    consecutive_failures: u32,
}

impl<'a> ContinuousScan<'a> {
    /// Prepare a run
    ///
    /// Each attempt is a `First` dispatch with no deadline of its own that
    /// shares `signal`.
    pub fn new(
        dispatcher: &'a Dispatcher,
        source: &'a ScanSource,
        options: &ScanOptions,
        signal: &'a AbortSignal,
        config: &ContinuousConfig,
    ) -> Self {
        let attempt_options = ScanOptions {
            formats: options.formats.clone(),
            mode: ScanMode::First,
            signal: None,
            plugin_options: options.plugin_options.clone(),
            timeout: None,
        };

        Self {
            dispatcher,
            source,
            signal,
            attempt_options,
            poll_interval: config.poll_interval(),
            failure_ceiling: config.failure_ceiling(),
            strategy: select_strategy(source),
            metrics: ScanMetrics::new(),
            consecutive_failures: 0,
        }
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    /// Scan until a match, enriching any terminal error
    #[instrument(
        name = "continuous_scan",
        skip_all,
        fields(strategy = %self.strategy, source = self.source.kind())
    )]
    pub async fn run(mut self) -> Result<ContinuousReport, ScanError> {
        if self.strategy == ScanStrategy::Polling {
            warn!(
                poll_interval_ms = self.poll_interval.as_millis() as u64,
                "Source has no frame notifications, falling back to interval polling; \
                 use a live video source for frame-synchronized scanning"
            );
        }

        match self.scan_until_match().await {
            Ok(results) => {
                info!(
                    attempts = self.metrics.attempts(),
                    elapsed_ms = self.metrics.elapsed().as_millis() as u64,
                    "Continuous scan matched"
                );
                Ok(ContinuousReport {
                    results,
                    strategy: self.strategy,
                    attempts: self.metrics.attempts(),
                    elapsed: self.metrics.elapsed(),
                })
            }
            Err(err) => {
                let err = enrich(err, self.signal, &self.metrics, self.strategy);
                info!(code = err.code(), error = %err, "Continuous scan ended without match");
                Err(err)
            }
        }
    }

    async fn scan_until_match(&mut self) -> Result<Vec<FormatResult>, ScanError> {
        self.precheck()?;

        let source = self.source;
        match (self.strategy, source) {
            (ScanStrategy::FrameSynchronized, ScanSource::Video(frames)) => {
                self.frame_synchronized(frames.as_ref()).await
            }
            _ => self.polling().await,
        }
    }

    /// Request errors that no amount of retrying can fix
    fn precheck(&self) -> Result<(), ScanError> {
        let missing = self
            .dispatcher
            .registry()
            .missing_formats(&self.attempt_options.formats);
        if !missing.is_empty() {
            return Err(ScanError::UnsupportedFormat { formats: missing });
        }
        if self.attempt_options.formats.is_empty() {
            return Err(ScanError::NoFormatsRequested);
        }
        Ok(())
    }

    async fn frame_synchronized(
        &mut self,
        frames: &dyn FrameSource,
    ) -> Result<Vec<FormatResult>, ScanError> {
        let source_id = frames.source_id().to_string();

        // Only the newest unseen frame is kept while an attempt is running.
        let (tx, mut rx) = watch::channel::<Option<Frame>>(None);
        let callback: FrameCallback = Arc::new(move |frame| {
            tx.send_replace(Some(frame));
        });
        let _listener = ListenerGuard::register(frames, callback);
        debug!(source_id = %source_id, "Frame listener registered");

        loop {
            self.check_signal()?;

            tokio::select! {
                biased;
                _ = self.signal.aborted() => return Err(abort_error(self.signal)),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(ScanError::SourceClosed { source_id });
                    }
                }
            }

            let frame = rx.borrow_and_update().clone();
            let Some(frame) = frame else {
                continue;
            };
            trace!(frame_id = frame.frame_id, "Frame presented");

            if let Some(results) = self.attempt(Some(&ScanSource::Frame(frame))).await? {
                return Ok(results);
            }
        }
    }

    async fn polling(&mut self) -> Result<Vec<FormatResult>, ScanError> {
        loop {
            self.check_signal()?;

            let snapshot = self.source.snapshot();
            if let Some(results) = self.attempt(snapshot.as_ref()).await? {
                return Ok(results);
            }

            self.check_signal()?;
            tokio::select! {
                biased;
                _ = self.signal.aborted() => return Err(abort_error(self.signal)),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One attempt; `Ok(None)` means keep scanning
    ///
    /// A missing snapshot counts as an attempt that found nothing.
    async fn attempt(
        &mut self,
        source: Option<&ScanSource>,
    ) -> Result<Option<Vec<FormatResult>>, ScanError> {
        let attempt = self.metrics.record_attempt();
        observability::record_continuous_attempt(self.strategy);

        let Some(source) = source else {
            trace!(attempt, "No frame available yet");
            return Ok(None);
        };

        match self
            .dispatcher
            .dispatch(source, &self.attempt_options, self.signal)
            .await
        {
            Ok(results) if !results.is_empty() => Ok(Some(results)),
            // an aborted signal makes every error terminal
            Err(err) if err.is_abort() || !classify(self.signal).is_retryable() => Err(err),
            Err(err) if is_attempt_failure(&err) => {
                self.consecutive_failures += 1;
                warn!(
                    attempt,
                    consecutive_failures = self.consecutive_failures,
                    error = %err,
                    "Continuous scan attempt failed, retrying"
                );
                match self.failure_ceiling {
                    Some(ceiling) if self.consecutive_failures >= ceiling => Err(err),
                    _ => Ok(None),
                }
            }
            _ => {
                self.consecutive_failures = 0;
                trace!(attempt, "No match");
                Ok(None)
            }
        }
    }

    fn check_signal(&self) -> Result<(), ScanError> {
        match self.signal.to_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Whether an attempt failed rather than merely finding nothing
///
/// An attempt fails when every requested plugin reported an error, or the
/// dispatch itself failed.
fn is_attempt_failure(err: &ScanError) -> bool {
    match err {
        ScanError::NoResults { formats, failed } => {
            !failed.is_empty() && failed.len() == formats.len()
        }
        _ => true,
    }
}

fn abort_error(signal: &AbortSignal) -> ScanError {
    signal
        .to_error()
        .unwrap_or(ScanError::Cancelled { message: None })
}
