//! Plugin registry - format identifier to detector mapping

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use contracts::{ScanError, ScanPlugin};

use crate::metrics::{MetricsSnapshot, PluginMetrics};

/// A registered plugin with its metrics
pub struct RegisteredPlugin {
    plugin: Arc<dyn ScanPlugin>,
    metrics: PluginMetrics,
}

impl RegisteredPlugin {
    fn new(plugin: Arc<dyn ScanPlugin>) -> Self {
        Self {
            plugin,
            metrics: PluginMetrics::new(),
        }
    }

    /// Get the plugin's format identifier
    pub fn format(&self) -> &str {
        self.plugin.format()
    }

    /// Get the plugin
    pub fn plugin(&self) -> &Arc<dyn ScanPlugin> {
        &self.plugin
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &PluginMetrics {
        &self.metrics
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("format", &self.format())
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Format-keyed plugin registry
///
/// One plugin per format; a later registration of the same format replaces
/// the earlier one.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<RegisteredPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an initial plugin list
    ///
    /// # Errors
    /// `ScanError::InvalidPlugin` for the first malformed plugin.
    pub fn with_plugins<I>(plugins: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = Arc<dyn ScanPlugin>>,
    {
        let mut registry = Self::new();
        for plugin in plugins {
            registry.register(plugin)?;
        }
        Ok(registry)
    }

    /// Register a plugin under its format identifier
    ///
    /// Returns the plugin it replaced, if any.
    ///
    /// # Errors
    /// `ScanError::InvalidPlugin` if the format is blank or contains
    /// whitespace.
    pub fn register(
        &mut self,
        plugin: Arc<dyn ScanPlugin>,
    ) -> Result<Option<Arc<dyn ScanPlugin>>, ScanError> {
        let format = plugin.format().to_string();
        validate_format(&format)?;

        let previous = self
            .plugins
            .insert(format.clone(), Arc::new(RegisteredPlugin::new(plugin)))
            .map(|entry| Arc::clone(entry.plugin()));

        if previous.is_some() {
            info!(format = %format, "Plugin replaced");
        } else {
            debug!(format = %format, total = self.plugins.len(), "Plugin registered");
        }
        Ok(previous)
    }

    /// Snapshot of registered formats, sorted
    pub fn supported_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.plugins.keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Look up the plugin for a format
    pub fn resolve(&self, format: &str) -> Option<Arc<dyn ScanPlugin>> {
        self.plugins
            .get(format)
            .map(|entry| Arc::clone(entry.plugin()))
    }

    /// Look up the registry entry for a format
    pub fn entry(&self, format: &str) -> Option<Arc<RegisteredPlugin>> {
        self.plugins.get(format).cloned()
    }

    pub fn contains(&self, format: &str) -> bool {
        self.plugins.contains_key(format)
    }

    /// Every requested format with no plugin, in request order, deduplicated
    pub fn missing_formats(&self, formats: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        formats
            .iter()
            .filter(|format| !self.contains(format))
            .filter(|format| seen.insert(format.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Get metrics for all plugins, sorted by format
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut snapshots: Vec<_> = self
            .plugins
            .iter()
            .map(|(format, entry)| (format.clone(), entry.metrics().snapshot()))
            .collect();
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}

fn validate_format(format: &str) -> Result<(), ScanError> {
    if format.trim().is_empty() {
        return Err(ScanError::invalid_plugin(
            format,
            "format identifier must not be empty",
        ));
    }
    if format.chars().any(char::is_whitespace) {
        return Err(ScanError::invalid_plugin(
            format,
            "format identifier must not contain whitespace",
        ));
    }
    Ok(())
}
