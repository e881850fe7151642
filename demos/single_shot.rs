//! Single-shot Scan Demo
//!
//! Dispatches one image to several mock plugins in each resolution mode.
//!
//! Run with: cargo run --bin single_shot

use std::sync::Arc;
use std::time::Duration;

use contracts::{ImageData, ScanMode, ScanOptions, ScanPlugin, ScanSource};
use mock_backend::MockPlugin;
use observability::{LogFormat, ObservabilityConfig};
use scan_engine::Scanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "debug".to_string(),
    })?;

    let plugins: Vec<Arc<dyn ScanPlugin>> = vec![
        Arc::new(
            MockPlugin::new("qr_code")
                .returning(["https://example.com"])
                .with_delay(Duration::from_millis(40)),
        ),
        Arc::new(
            MockPlugin::new("mrz")
                .returning(["P<UTOERIKSSON<<ANNA<MARIA"])
                .with_delay(Duration::from_millis(10)),
        ),
        Arc::new(MockPlugin::new("ean_13").with_delay(Duration::from_millis(5))),
        Arc::new(MockPlugin::new("pdf417").failing("checksum mismatch")),
    ];
    let scanner = Scanner::new(plugins)?;
    let image = ScanSource::Image(ImageData::rgba(4, 4, vec![0u8; 64]));

    for mode in [ScanMode::First, ScanMode::All, ScanMode::Exhaustive] {
        let options = ScanOptions::new(["qr_code", "mrz", "ean_13", "pdf417"])
            .with_mode(mode)
            .with_timeout_ms(500);

        match scanner.scan(&image, options).await {
            Ok(results) => {
                for result in &results {
                    for detection in &result.data {
                        tracing::info!(%mode, format = %result.format, text = %detection.text, "Detected");
                    }
                }
            }
            Err(err) => tracing::warn!(%mode, code = err.code(), error = %err, "Scan failed"),
        }
    }

    for (format, snapshot) in scanner.plugin_metrics() {
        tracing::info!(
            format = %format,
            invocations = snapshot.invocations,
            success = snapshot.success_count,
            empty = snapshot.empty_count,
            failure = snapshot.failure_count,
            mean_latency_ms = snapshot.mean_latency_ms,
            "Plugin metrics"
        );
    }

    Ok(())
}
