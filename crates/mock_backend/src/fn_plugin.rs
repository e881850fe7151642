//! Closure-backed plugin
//!
//! Lets hosts and tests assemble a plugin from a format string and a scan
//! function at runtime. The builder refuses incomplete plugins, mirroring
//! the registry's own validation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use contracts::{Detection, PluginError, PluginOptions, ScanError, ScanPlugin, ScanSource};

type ScanFn =
    Arc<dyn Fn(&ScanSource, &PluginOptions) -> Result<Vec<Detection>, PluginError> + Send + Sync>;

/// Plugin backed by a synchronous scan function
#[derive(Clone)]
pub struct FnPlugin {
    format: String,
    scan_fn: ScanFn,
}

impl FnPlugin {
    pub fn builder(format: impl Into<String>) -> FnPluginBuilder {
        FnPluginBuilder {
            format: format.into(),
            scan_fn: None,
        }
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ScanPlugin for FnPlugin {
    fn format(&self) -> &str {
        &self.format
    }

    async fn scan(
        &self,
        source: &ScanSource,
        options: &PluginOptions,
    ) -> Result<Vec<Detection>, PluginError> {
        options.signal.check()?;
        (self.scan_fn)(source, options)
    }
}

/// Builder for `FnPlugin`
pub struct FnPluginBuilder {
    format: String,
    scan_fn: Option<ScanFn>,
}

impl FnPluginBuilder {
    /// Set the scan function
    pub fn scan_with<F>(mut self, scan_fn: F) -> Self
    where
        F: Fn(&ScanSource, &PluginOptions) -> Result<Vec<Detection>, PluginError>
            + Send
            + Sync
            + 'static,
    {
        self.scan_fn = Some(Arc::new(scan_fn));
        self
    }

    /// Build the plugin
    ///
    /// # Errors
    /// `ScanError::InvalidPlugin` if the format is blank or no scan function
    /// was provided.
    pub fn build(self) -> Result<FnPlugin, ScanError> {
        if self.format.trim().is_empty() {
            return Err(ScanError::invalid_plugin(
                self.format,
                "format identifier must not be empty",
            ));
        }
        let scan_fn = self
            .scan_fn
            .ok_or_else(|| ScanError::invalid_plugin(&self.format, "missing scan function"))?;

        Ok(FnPlugin {
            format: self.format,
            scan_fn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AbortSignal, ImageData};

    fn source() -> ScanSource {
        ScanSource::Image(ImageData::rgba(2, 1, vec![0u8; 8]))
    }

    #[tokio::test]
    async fn test_fn_plugin_scans() {
        let plugin = FnPlugin::builder("qr_code")
            .scan_with(|source, _| {
                let image = source.to_image()?;
                Ok(vec![Detection::new("qr_code", format!("{}px", image.width))])
            })
            .build()
            .unwrap();

        let data = plugin
            .scan(&source(), &PluginOptions::default())
            .await
            .unwrap();
        assert_eq!(data[0].text, "2px");
    }

    #[test]
    fn test_build_without_scan_fn_is_invalid() {
        let err = FnPlugin::builder("qr_code").build().unwrap_err();
        match err {
            ScanError::InvalidPlugin { format, reason } => {
                assert_eq!(format, "qr_code");
                assert!(reason.contains("scan function"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_with_blank_format_is_invalid() {
        let err = FnPlugin::builder("  ")
            .scan_with(|_, _| Ok(Vec::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidPlugin { .. }));
    }

    #[tokio::test]
    async fn test_fn_plugin_checks_signal() {
        let plugin = FnPlugin::builder("qr_code")
            .scan_with(|_, _| Ok(vec![Detection::new("qr_code", "HELLO")]))
            .build()
            .unwrap();
        let signal = AbortSignal::new();
        signal.cancel();

        let err = plugin
            .scan(&source(), &PluginOptions::new(signal, serde_json::Value::Null))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
