//! Dispatcher - concurrent fan-out of one scan to the requested plugins

use std::collections::HashSet;
use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

use futures::future::{join_all, poll_fn, BoxFuture};
use futures::FutureExt;
use tracing::{debug, instrument, warn};

use contracts::{
    AbortSignal, FormatResult, PluginError, PluginOptions, ScanError, ScanMode, ScanOptions,
    ScanOutcome, ScanPlugin, ScanSource,
};
use observability::PluginStatus;

use crate::metrics::MetricsSnapshot;
use crate::registry::{PluginRegistry, RegisteredPlugin};

type Invocation<'a> = BoxFuture<'a, ScanOutcome>;

/// Single-shot dispatch engine
///
/// Owns the plugin registry and resolves one request against it with the
/// request's resolution policy.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: PluginRegistry,
}

impl Dispatcher {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Register a plugin (replaces any plugin of the same format)
    pub fn register(&mut self, plugin: Arc<dyn ScanPlugin>) -> Result<(), ScanError> {
        self.registry.register(plugin).map(|_| ())
    }

    /// Get metrics for all plugins
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.registry.metrics()
    }

    /// Run one scan of `source` for every requested format
    ///
    /// `signal` is the effective signal of the request; `options.signal` and
    /// `options.timeout` are not consulted here.
    ///
    /// # Errors
    /// - `UnsupportedFormat` naming every unregistered format
    /// - `Cancelled` / `Timeout` if the signal is or becomes triggered
    /// - `NoFormatsRequested` for an empty format list
    /// - `NoResults` when `First` finds nothing
    #[instrument(
        name = "dispatcher_dispatch",
        skip_all,
        fields(mode = %options.mode, formats = options.formats.len(), source = source.kind())
    )]
    pub async fn dispatch(
        &self,
        source: &ScanSource,
        options: &ScanOptions,
        signal: &AbortSignal,
    ) -> Result<Vec<FormatResult>, ScanError> {
        let missing = self.registry.missing_formats(&options.formats);
        if !missing.is_empty() {
            return Err(ScanError::UnsupportedFormat { formats: missing });
        }
        if let Some(err) = signal.to_error() {
            return Err(err);
        }

        let formats = unique_formats(&options.formats);
        if formats.is_empty() {
            return Err(ScanError::NoFormatsRequested);
        }

        // Every invocation exists before the first one is polled.
        let invocations: Vec<Invocation<'_>> = formats
            .iter()
            .filter_map(|format| self.registry.entry(format))
            .map(|entry| {
                let plugin_options =
                    PluginOptions::new(signal.clone(), options.params_for(entry.format()));
                invoke(entry, source, plugin_options).boxed()
            })
            .collect();

        match options.mode {
            ScanMode::First => resolve_first(invocations, signal, formats).await,
            ScanMode::All | ScanMode::Exhaustive => resolve_all(invocations, signal).await,
        }
    }
}

/// Settle on the first invocation with data
///
/// Invocations are polled in request order, so two plugins becoming ready
/// in the same pass resolve to the earlier requested format.
async fn resolve_first(
    invocations: Vec<Invocation<'_>>,
    signal: &AbortSignal,
    formats: Vec<String>,
) -> Result<Vec<FormatResult>, ScanError> {
    let mut pending: Vec<Option<Invocation<'_>>> = invocations.into_iter().map(Some).collect();
    let mut failed = Vec::new();

    let race = poll_fn(|cx| {
        let mut waiting = false;
        for slot in pending.iter_mut() {
            let Some(invocation) = slot.as_mut() else {
                continue;
            };
            let poll = invocation.as_mut().poll(cx);
            match poll {
                Poll::Ready(outcome) => {
                    *slot = None;
                    if outcome.success {
                        return Poll::Ready(Some(outcome));
                    }
                    if outcome.error.is_some() {
                        failed.push(outcome.format);
                    }
                }
                Poll::Pending => waiting = true,
            }
        }
        if waiting {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    });

    let winner = tokio::select! {
        biased;
        _ = signal.aborted() => return Err(abort_error(signal)),
        winner = race => winner,
    };

    match winner {
        Some(outcome) => {
            debug!(format = %outcome.format, "First match resolved");
            Ok(outcome.into_result().into_iter().collect())
        }
        None => Err(signal
            .to_error()
            .unwrap_or(ScanError::NoResults { formats, failed })),
    }
}

/// Wait for every invocation; keep the ones with data, in request order
async fn resolve_all(
    invocations: Vec<Invocation<'_>>,
    signal: &AbortSignal,
) -> Result<Vec<FormatResult>, ScanError> {
    let outcomes = tokio::select! {
        biased;
        _ = signal.aborted() => return Err(abort_error(signal)),
        outcomes = join_all(invocations) => outcomes,
    };

    if let Some(err) = signal.to_error() {
        return Err(err);
    }

    let results: Vec<FormatResult> = outcomes
        .into_iter()
        .filter_map(ScanOutcome::into_result)
        .collect();
    debug!(matched = results.len(), "All invocations settled");
    Ok(results)
}

/// Run one plugin and fold its result into an outcome
async fn invoke(
    entry: Arc<RegisteredPlugin>,
    source: &ScanSource,
    options: PluginOptions,
) -> ScanOutcome {
    let format = entry.format().to_string();
    let started = Instant::now();
    let result = entry.plugin().scan(source, &options).await;
    let latency = started.elapsed();

    let (outcome, status) = match result {
        Ok(data) => {
            let outcome = ScanOutcome::completed(&format, data);
            let status = if outcome.success {
                PluginStatus::Success
            } else {
                PluginStatus::Empty
            };
            (outcome, status)
        }
        Err(PluginError::Cancelled) => (
            ScanOutcome::failed(&format, PluginError::Cancelled.to_string()),
            PluginStatus::Cancelled,
        ),
        Err(e) => {
            warn!(format = %format, error = %e, "Plugin scan failed");
            (ScanOutcome::failed(&format, e.to_string()), PluginStatus::Failure)
        }
    };

    let latency_ms = latency.as_secs_f64() * 1000.0;
    debug!(
        format = %format,
        status = status.as_str(),
        latency_ms,
        "Plugin settled"
    );
    entry.metrics().record(status, latency);
    observability::record_plugin_outcome(&format, status);
    observability::record_plugin_latency_ms(&format, latency_ms);

    outcome
}

fn abort_error(signal: &AbortSignal) -> ScanError {
    signal
        .to_error()
        .unwrap_or(ScanError::Cancelled { message: None })
}

fn unique_formats(formats: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    formats
        .iter()
        .filter(|format| seen.insert(format.as_str()))
        .cloned()
        .collect()
}
