//! ScannerConfig - Config Loader output
//!
//! Request defaults, continuous-scan pacing and per-format plugin options.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ScanError, ScanMode, ScanOptions};

/// Default polling delay between continuous-scan attempts (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete scanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Request defaults
    #[serde(default)]
    pub scan: ScanDefaults,

    /// Continuous-scan settings
    #[serde(default)]
    pub continuous: ContinuousConfig,

    /// Format -> plugin options
    #[serde(default)]
    pub plugins: HashMap<String, serde_json::Value>,
}

/// Request defaults
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanDefaults {
    /// Default formats (empty = every registered format)
    #[serde(default)]
    pub formats: Vec<String>,

    /// Resolution policy name
    #[serde(default = "default_mode")]
    #[validate(length(min = 1))]
    pub mode: String,

    /// Request deadline in milliseconds (0 = none)
    #[serde(default)]
    pub timeout_ms: u64,
}

fn default_mode() -> String {
    ScanMode::First.as_str().to_string()
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            mode: default_mode(),
            timeout_ms: 0,
        }
    }
}

impl ScanDefaults {
    /// Parsed resolution policy
    ///
    /// # Errors
    /// `ScanError::UnknownMode` for unrecognized names.
    pub fn scan_mode(&self) -> Result<ScanMode, ScanError> {
        self.mode.parse()
    }
}

/// Continuous-scan settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContinuousConfig {
    /// Delay between polling attempts (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub poll_interval_ms: u64,

    /// Consecutive unexpected failures before giving up (0 = unlimited)
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_consecutive_failures: 0,
        }
    }
}

impl ContinuousConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Failure ceiling, `None` when unlimited
    pub fn failure_ceiling(&self) -> Option<u32> {
        (self.max_consecutive_failures > 0).then_some(self.max_consecutive_failures)
    }
}

impl ScannerConfig {
    /// Request options seeded from the configured defaults
    ///
    /// # Errors
    /// `ScanError::UnknownMode` if the configured mode is not recognized.
    pub fn default_options(&self) -> Result<ScanOptions, ScanError> {
        Ok(ScanOptions {
            formats: self.scan.formats.clone(),
            mode: self.scan.scan_mode()?,
            signal: None,
            plugin_options: self.plugins.clone(),
            timeout: (self.scan.timeout_ms > 0)
                .then(|| Duration::from_millis(self.scan.timeout_ms)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: ScannerConfig = toml::from_str("").unwrap();
        assert_eq!(config.scan.mode, "first");
        assert_eq!(config.continuous.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.continuous.failure_ceiling(), None);
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn test_default_options() {
        let content = r#"
[scan]
formats = ["qr_code", "mrz"]
mode = "all"
timeout_ms = 1500

[plugins.qr_code]
try_harder = true
"#;
        let config: ScannerConfig = toml::from_str(content).unwrap();
        let options = config.default_options().unwrap();

        assert_eq!(options.formats, vec!["qr_code", "mrz"]);
        assert_eq!(options.mode, ScanMode::All);
        assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.params_for("qr_code")["try_harder"], true);
        assert!(options.params_for("mrz").is_null());
    }

    #[test]
    fn test_unknown_mode_surfaces() {
        let mut config = ScannerConfig::default();
        config.scan.mode = "sometimes".into();
        assert!(matches!(
            config.default_options(),
            Err(ScanError::UnknownMode { .. })
        ));
    }

    #[test]
    fn test_poll_interval_range() {
        let config = ContinuousConfig {
            poll_interval_ms: 0,
            max_consecutive_failures: 0,
        };
        assert!(config.validate().is_err());
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
