//! Configuration validation
//!
//! Rules:
//! - scan mode is a known resolution policy
//! - default formats are non-blank and unique
//! - poll interval within range
//! - plugin option keys are non-blank, values are tables

use std::collections::HashSet;

use contracts::{ScanError, ScannerConfig};
use validator::{Validate, ValidationErrors};

/// Validate a ScannerConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ScannerConfig) -> Result<(), ScanError> {
    validate_scan_defaults(config)?;
    validate_continuous(config)?;
    validate_plugin_options(config)?;
    Ok(())
}

fn validate_scan_defaults(config: &ScannerConfig) -> Result<(), ScanError> {
    config
        .scan
        .validate()
        .map_err(|errors| first_field_error("scan", &errors))?;

    // Unknown mode keeps its own error kind
    config.scan.scan_mode()?;

    let mut seen = HashSet::new();
    for (idx, format) in config.scan.formats.iter().enumerate() {
        if format.trim().is_empty() {
            return Err(ScanError::config_validation(
                format!("scan.formats[{idx}]"),
                "format cannot be empty",
            ));
        }
        if !seen.insert(format.as_str()) {
            return Err(ScanError::config_validation(
                format!("scan.formats[{idx}]"),
                format!("duplicate format '{format}'"),
            ));
        }
    }
    Ok(())
}

fn validate_continuous(config: &ScannerConfig) -> Result<(), ScanError> {
    config
        .continuous
        .validate()
        .map_err(|errors| first_field_error("continuous", &errors))
}

fn validate_plugin_options(config: &ScannerConfig) -> Result<(), ScanError> {
    for (format, params) in &config.plugins {
        if format.trim().is_empty() {
            return Err(ScanError::config_validation(
                "plugins",
                "plugin format key cannot be empty",
            ));
        }
        if !(params.is_object() || params.is_null()) {
            return Err(ScanError::config_validation(
                format!("plugins.{format}"),
                "plugin options must be a table",
            ));
        }
    }
    Ok(())
}

/// Flatten derive-validator output into one field-scoped error
fn first_field_error(section: &str, errors: &ValidationErrors) -> ScanError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, field_errors)) => {
            let message = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", e.code))
                })
                .collect::<Vec<_>>()
                .join("; ");
            ScanError::config_validation(format!("{section}.{field}"), message)
        }
        None => ScanError::config_validation(section, errors.to_string()),
    }
}
