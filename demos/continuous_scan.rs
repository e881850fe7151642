//! Continuous Scan Demo
//!
//! Runs continuous scans against a mock camera with a plugin that only
//! "sees" a code after a given frame, then prints a run summary.
//!
//! Run with: cargo run --bin continuous_scan [config.toml]

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use config_loader::ConfigLoader;
use contracts::{Detection, ScanPlugin, ScanSource, ScannerConfig};
use mock_backend::{FnPlugin, MockCamera, MockCameraConfig};
use observability::{LogFormat, ObservabilityConfig, ScanStatsAggregator};
use scan_engine::{scan_timeout_ms, Scanner};

/// Frame id from which the mock decoder reports a match, per run
const MATCH_AFTER_FRAMES: [u64; 4] = [5, 20, 60, 1_000];

/// Deadline used when the config sets none
const DEFAULT_TIMEOUT_MS: u64 = 2_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Pretty,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading scanner config");
            ConfigLoader::load_from_path(Path::new(&path))
                .with_context(|| format!("loading {path}"))?
        }
        None => ScannerConfig::default(),
    };

    let mut aggregator = ScanStatsAggregator::new();

    for threshold in MATCH_AFTER_FRAMES {
        let camera = Arc::new(MockCamera::new(
            "mock-cam",
            MockCameraConfig {
                frame_rate_hz: 60.0,
                ..Default::default()
            },
        ));
        camera.start();

        let scanner = Scanner::with_config([qr_after(threshold)?], config.clone())?;
        let mut options = scanner.options_from_config()?;
        options.timeout = options.timeout.or(scan_timeout_ms(DEFAULT_TIMEOUT_MS));

        tracing::info!(threshold, "Starting continuous scan");
        match scanner
            .scan_continuous_report(&ScanSource::Video(camera.clone()), options)
            .await
        {
            Ok(report) => {
                tracing::info!(
                    strategy = %report.strategy,
                    attempts = report.attempts,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    text = %report.results[0].data[0].text,
                    "Matched"
                );
                aggregator.record_match(report.attempts, report.elapsed);
            }
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Scan ended without a match");
                if let Some(context) = err.context() {
                    aggregator.record_failure(context);
                }
            }
        }

        camera.stop();
    }

    println!("{}", aggregator.summary());
    Ok(())
}

/// QR decoder stand-in that matches once the frame id reaches `threshold`
fn qr_after(threshold: u64) -> anyhow::Result<Arc<dyn ScanPlugin>> {
    let plugin = FnPlugin::builder("qr_code")
        .scan_with(move |source, _| match source {
            ScanSource::Frame(frame) if frame.frame_id >= threshold => Ok(vec![Detection::new(
                "qr_code",
                format!("frame-{}", frame.frame_id),
            )]),
            _ => Ok(Vec::new()),
        })
        .build()?;
    Ok(Arc::new(plugin))
}
