//! Scanner - public orchestration facade

use std::sync::Arc;

use contracts::{
    AbortSignal, FormatResult, ScanError, ScanMode, ScanOptions, ScanPlugin, ScanSource,
    ScannerConfig,
};
use dispatcher::{Dispatcher, MetricsSnapshot, PluginRegistry};
use tracing::{debug, instrument};

use crate::continuous::{ContinuousReport, ContinuousScan, ScanState, StateCell};
use crate::signal::{compose_signal, ComposedSignal};

/// Multi-format scanner
///
/// Owns the plugin registry. Registration needs `&mut self`, so the
/// registry cannot change while a scan borrows the scanner.
#[derive(Debug, Default)]
pub struct Scanner {
    dispatcher: Dispatcher,
    config: ScannerConfig,
    continuous: StateCell,
}

impl Scanner {
    /// Create a scanner with default configuration
    ///
    /// # Errors
    /// `ScanError::InvalidPlugin` for the first malformed plugin.
    pub fn new<I>(plugins: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = Arc<dyn ScanPlugin>>,
    {
        Self::with_config(plugins, ScannerConfig::default())
    }

    /// Create a scanner with a loaded configuration
    ///
    /// # Errors
    /// `ScanError::InvalidPlugin` for the first malformed plugin.
    pub fn with_config<I>(plugins: I, config: ScannerConfig) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = Arc<dyn ScanPlugin>>,
    {
        let registry = PluginRegistry::with_plugins(plugins)?;
        debug!(plugins = registry.len(), "Scanner created");
        Ok(Self {
            dispatcher: Dispatcher::new(registry),
            config,
            continuous: StateCell::default(),
        })
    }

    /// Register a plugin, replacing any plugin of the same format
    pub fn register_plugin(&mut self, plugin: Arc<dyn ScanPlugin>) -> Result<(), ScanError> {
        self.dispatcher.register(plugin)
    }

    /// Registered formats, sorted
    pub fn supported_formats(&self) -> Vec<String> {
        self.dispatcher.registry().supported_formats()
    }

    /// Per-plugin invocation metrics, sorted by format
    pub fn plugin_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.dispatcher.metrics()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// State of continuous scanning
    pub fn state(&self) -> ScanState {
        self.continuous.get()
    }

    /// Request options seeded from the configuration
    ///
    /// An empty configured format list means every registered format.
    ///
    /// # Errors
    /// `ScanError::UnknownMode` if the configured mode is not recognized.
    pub fn options_from_config(&self) -> Result<ScanOptions, ScanError> {
        let mut options = self.config.default_options()?;
        if options.formats.is_empty() {
            options.formats = self.supported_formats();
        }
        Ok(options)
    }

    /// Single-shot scan
    ///
    /// # Errors
    /// See `Dispatcher::dispatch`.
    #[instrument(name = "scanner_scan", skip_all, fields(mode = %options.mode))]
    pub async fn scan(
        &self,
        source: &ScanSource,
        options: ScanOptions,
    ) -> Result<Vec<FormatResult>, ScanError> {
        observability::record_scan_request(options.mode, options.formats.len());

        let composed = compose_signal(options.signal.as_ref(), options.timeout);
        let idle = AbortSignal::new();
        let signal = effective(&composed, &idle);

        self.dispatcher.dispatch(source, &options, signal).await
    }

    /// Single-shot `First` scan, over every registered format unless the
    /// options name some
    pub async fn scan_any(
        &self,
        source: &ScanSource,
        mut options: ScanOptions,
    ) -> Result<Vec<FormatResult>, ScanError> {
        if options.formats.is_empty() {
            options.formats = self.supported_formats();
        }
        options.mode = ScanMode::First;
        self.scan(source, options).await
    }

    /// Scan repeatedly until a match
    ///
    /// `options.mode` is ignored: every attempt resolves on the first match.
    ///
    /// # Errors
    /// - `ContinuousScanActive` if a continuous scan is already running
    /// - otherwise an enriched error carrying the run's `ScanContext`
    pub async fn scan_continuous(
        &self,
        source: &ScanSource,
        options: ScanOptions,
    ) -> Result<Vec<FormatResult>, ScanError> {
        self.scan_continuous_report(source, options)
            .await
            .map(|report| report.results)
    }

    /// `scan_continuous`, also reporting strategy, attempts and duration
    pub async fn scan_continuous_report(
        &self,
        source: &ScanSource,
        options: ScanOptions,
    ) -> Result<ContinuousReport, ScanError> {
        let guard = self.continuous.begin()?;

        let composed = compose_signal(options.signal.as_ref(), options.timeout);
        let idle = AbortSignal::new();
        let signal = effective(&composed, &idle);

        let result = ContinuousScan::new(
            &self.dispatcher,
            source,
            &options,
            signal,
            &self.config.continuous,
        )
        .run()
        .await;

        guard.finish(if result.is_ok() {
            ScanState::Resolved
        } else {
            ScanState::Rejected
        });
        result
    }
}

fn effective<'a>(composed: &'a Option<ComposedSignal>, idle: &'a AbortSignal) -> &'a AbortSignal {
    composed.as_ref().map_or(idle, ComposedSignal::signal)
}
