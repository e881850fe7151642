//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Responsibilities:
//! - Contract snapshot tests
//! - Mock e2e tests (no detector library, no camera)
//! - Behavioral properties of single-shot and continuous scanning

#[cfg(test)]
mod contract_tests {
    use contracts::{AbortReason, ScanError, ScanMode, SCAN_CANCELLED, SCAN_TIMEOUT};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            AbortReason::Timeout { timeout_ms: 1 }.to_error().code(),
            SCAN_TIMEOUT
        );
        assert_eq!(AbortReason::cancelled().to_error().code(), SCAN_CANCELLED);
        assert_eq!(
            ScanError::UnsupportedFormat { formats: vec![] }.code(),
            "UNSUPPORTED_FORMAT"
        );
    }

    #[test]
    fn test_unknown_mode() {
        let err = "sometimes".parse::<ScanMode>().unwrap_err();
        assert!(matches!(err, ScanError::UnknownMode { mode } if mode == "sometimes"));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AbortSignal, Detection, FormatResult, ImageData, ScanContext, ScanError, ScanMode,
        ScanOptions, ScanPlugin, ScanSource, ScanStrategy, SCAN_TIMEOUT,
    };
    use mock_backend::{FnPlugin, ManualFrameSource, MockCamera, MockCameraConfig, MockPlugin};
    use observability::ScanStatsAggregator;
    use scan_engine::Scanner;

    fn sample() -> ScanSource {
        ScanSource::Image(ImageData::rgba(2, 2, vec![255u8; 16]))
    }

    fn shared(plugin: MockPlugin) -> Arc<MockPlugin> {
        Arc::new(plugin)
    }

    fn build_scanner(plugins: &[&Arc<MockPlugin>]) -> Scanner {
        Scanner::new(
            plugins
                .iter()
                .map(|plugin| Arc::clone(plugin) as Arc<dyn ScanPlugin>),
        )
        .unwrap()
    }

    fn formats(results: &[FormatResult]) -> Vec<&str> {
        results.iter().map(|r| r.format.as_str()).collect()
    }

    /// End-to-end success
    #[tokio::test]
    async fn test_e2e_hello_qr_code() {
        let qr = shared(MockPlugin::new("qr_code").returning(["HELLO"]));
        let scanner = build_scanner(&[&qr]);

        let results = scanner
            .scan(
                &sample(),
                ScanOptions::new(["qr_code"]).with_mode(ScanMode::First),
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![FormatResult {
                format: "qr_code".to_string(),
                data: vec![Detection::new("qr_code", "HELLO").with_confidence(1.0)],
            }]
        );
    }

    /// Invalid plugin registration
    #[test]
    fn test_invalid_plugin_registration() {
        let err = FnPlugin::builder("x").build().unwrap_err();
        assert!(matches!(err, ScanError::InvalidPlugin { format, .. } if format == "x"));
    }

    /// Exhaustive vs all equivalence
    #[tokio::test]
    async fn test_exhaustive_equals_all() {
        let qr = shared(
            MockPlugin::new("qr_code")
                .returning(["HELLO"])
                .with_delay(Duration::from_millis(20)),
        );
        let mrz = shared(MockPlugin::new("mrz").returning(["P<UTO"]));
        let ean = shared(MockPlugin::new("ean_13"));
        let scanner = build_scanner(&[&qr, &mrz, &ean]);

        let request = ["qr_code", "mrz", "ean_13"];
        let all = scanner
            .scan(&sample(), ScanOptions::new(request).with_mode(ScanMode::All))
            .await
            .unwrap();
        let exhaustive = scanner
            .scan(
                &sample(),
                ScanOptions::new(request).with_mode(ScanMode::Exhaustive),
            )
            .await
            .unwrap();

        assert_eq!(all, exhaustive);
        assert_eq!(formats(&all), vec!["qr_code", "mrz"]);
    }

    /// Registry reflects registrations, last one wins
    #[tokio::test]
    async fn test_registry_uniqueness() {
        let mut scanner = Scanner::new(Vec::<Arc<dyn ScanPlugin>>::new()).unwrap();
        let sequence = ["qr_code", "mrz", "qr_code", "ean_13", "mrz"];
        for (i, format) in sequence.iter().enumerate() {
            scanner
                .register_plugin(Arc::new(
                    MockPlugin::new(*format).returning([format!("v{i}")]),
                ))
                .unwrap();
        }

        assert_eq!(scanner.supported_formats(), vec!["ean_13", "mrz", "qr_code"]);

        let results = scanner
            .scan(
                &sample(),
                ScanOptions::new(["qr_code", "mrz"]).with_mode(ScanMode::All),
            )
            .await
            .unwrap();
        assert_eq!(results[0].data[0].text, "v2");
        assert_eq!(results[1].data[0].text, "v4");
    }

    /// First mode returns only the earliest match
    #[tokio::test]
    async fn test_first_mode_determinism() {
        let a = shared(MockPlugin::new("a").returning(["A"]));
        let b = shared(
            MockPlugin::new("b")
                .returning(["B"])
                .with_delay(Duration::from_millis(30)),
        );
        let scanner = build_scanner(&[&a, &b]);

        for request in [["a", "b"], ["b", "a"]] {
            let results = scanner
                .scan(&sample(), ScanOptions::new(request))
                .await
                .unwrap();
            assert_eq!(formats(&results), vec!["a"]);
        }
    }

    /// All mode returns exactly the successful outcomes
    #[tokio::test]
    async fn test_all_mode_completeness() {
        let fast = shared(MockPlugin::new("fast").returning(["F"]));
        let slow = shared(
            MockPlugin::new("slow")
                .returning(["S"])
                .with_delay(Duration::from_millis(25)),
        );
        let broken = shared(
            MockPlugin::new("broken")
                .failing("decoder crashed")
                .with_delay(Duration::from_millis(10)),
        );
        let scanner = build_scanner(&[&fast, &slow, &broken]);

        let results = scanner
            .scan(
                &sample(),
                ScanOptions::new(["slow", "broken", "fast"]).with_mode(ScanMode::All),
            )
            .await
            .unwrap();

        assert_eq!(formats(&results), vec!["slow", "fast"]);
        assert_eq!(broken.calls(), 1);
    }

    /// First mode with nothing found fails with NoResults
    #[tokio::test]
    async fn test_no_results_failure() {
        let qr = shared(MockPlugin::new("qr_code"));
        let mrz = shared(MockPlugin::new("mrz").with_delay(Duration::from_millis(5)));
        let scanner = build_scanner(&[&qr, &mrz]);

        let err = scanner
            .scan(&sample(), ScanOptions::new(["qr_code", "mrz"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoResults { .. }));
        assert_eq!(err.code(), "NO_RESULTS");
    }

    /// Unsupported formats are reported and nothing runs
    #[tokio::test]
    async fn test_unsupported_format() {
        let qr = shared(MockPlugin::new("qr_code").returning(["HELLO"]));
        let scanner = build_scanner(&[&qr]);

        let err = scanner
            .scan(&sample(), ScanOptions::new(["nonexistent"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("nonexistent"));
        assert_eq!(qr.calls(), 0);
    }

    /// An already-cancelled signal rejects before any plugin runs
    #[tokio::test]
    async fn test_cancellation_precedence() {
        let qr = shared(MockPlugin::new("qr_code").returning(["HELLO"]));
        let scanner = build_scanner(&[&qr]);
        let signal = AbortSignal::new();
        signal.cancel();

        let err = scanner
            .scan(
                &sample(),
                ScanOptions::new(["qr_code"])
                    .with_signal(signal)
                    .with_timeout_ms(1000),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Cancelled { .. }));
        assert!(err.is_abort() && !err.is_timeout());
        assert_eq!(qr.calls(), 0);
    }

    /// Timeout composition, with no timer left behind
    #[tokio::test]
    async fn test_timeout_composition() {
        let stuck = shared(MockPlugin::new("qr_code").never_resolving());
        let scanner = build_scanner(&[&stuck]);

        let started = Instant::now();
        let err = scanner
            .scan(
                &sample(),
                ScanOptions::new(["qr_code"]).with_timeout_ms(50),
            )
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.code(), SCAN_TIMEOUT);
        assert!(elapsed >= Duration::from_millis(45), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");

        // A fast request with a deadline leaves nothing that fires later.
        let fast = shared(MockPlugin::new("qr_code").returning(["HELLO"]));
        let scanner = build_scanner(&[&fast]);
        let caller = AbortSignal::new();
        scanner
            .scan(
                &sample(),
                ScanOptions::new(["qr_code"])
                    .with_signal(caller.clone())
                    .with_timeout_ms(30),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!caller.is_aborted());
        assert_eq!(fast.cancellations(), 0);
    }

    /// Frame-ready sources are scanned per frame, others on a timer
    #[tokio::test]
    async fn test_continuous_strategy_routing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let qr: Arc<dyn ScanPlugin> = Arc::new(
            FnPlugin::builder("qr_code")
                .scan_with(move |source, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    match source {
                        ScanSource::Frame(frame) if frame.frame_id >= 3 => {
                            Ok(vec![Detection::new("qr_code", "HELLO")])
                        }
                        _ => Ok(Vec::new()),
                    }
                })
                .build()
                .unwrap(),
        );

        let mut config = contracts::ScannerConfig::default();
        config.continuous.poll_interval_ms = 10;
        let scanner = Scanner::with_config([qr], config).unwrap();

        // Frame-synchronized: nothing runs until a frame is presented.
        let live = Arc::new(ManualFrameSource::new("live"));
        let source = ScanSource::Video(live.clone());
        let driver = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            for _ in 0..3 {
                live.push_blank();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        let (report, ()) = tokio::join!(
            scanner.scan_continuous_report(&source, ScanOptions::new(["qr_code"])),
            driver
        );
        let report = report.unwrap();
        assert_eq!(report.strategy, ScanStrategy::FrameSynchronized);
        assert_eq!(report.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Polling: one static frame is re-scanned on every tick.
        calls.store(0, Ordering::SeqCst);
        let still = Arc::new(ManualFrameSource::polling_only("still"));
        still.push_blank();
        let source = ScanSource::Video(still.clone());
        let caller = AbortSignal::new();
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            caller.cancel();
        };
        let (result, ()) = tokio::join!(
            scanner.scan_continuous(
                &source,
                ScanOptions::new(["qr_code"]).with_signal(caller.clone())
            ),
            stopper
        );

        let err = result.unwrap_err();
        let context: &ScanContext = err.context().unwrap();
        assert_eq!(context.strategy, ScanStrategy::Polling);
        assert!(calls.load(Ordering::SeqCst) >= 3);
        assert!(err.to_string().contains("interval-polling"));
    }

    /// Continuous scan against a mock camera times out with context
    #[tokio::test]
    async fn test_continuous_timeout_is_enriched() {
        let camera = Arc::new(MockCamera::new(
            "cam0",
            MockCameraConfig {
                frame_rate_hz: 100.0,
                width: 8,
                height: 8,
                ..Default::default()
            },
        ));
        camera.start();

        let qr = shared(MockPlugin::new("qr_code"));
        let scanner = build_scanner(&[&qr]);
        let mut aggregator = ScanStatsAggregator::new();

        let err = scanner
            .scan_continuous(
                &ScanSource::Video(camera.clone()),
                ScanOptions::new(["qr_code"]).with_timeout_ms(100),
            )
            .await
            .unwrap_err();
        camera.stop();

        assert_eq!(err.code(), SCAN_TIMEOUT);
        let context = err.context().unwrap();
        assert_eq!(context.strategy, ScanStrategy::FrameSynchronized);
        assert!(context.attempts > 0);
        assert!(err.to_string().contains("frame-synchronized"));

        aggregator.record_failure(context);
        assert_eq!(aggregator.summary().failure_counts.get("timeout"), Some(&1));
    }

    /// A camera that already ran out of frames ends the scan instead of hanging
    #[tokio::test]
    async fn test_continuous_scan_on_ended_camera() {
        let camera = Arc::new(MockCamera::new(
            "cam0",
            MockCameraConfig {
                frame_rate_hz: 200.0,
                width: 4,
                height: 4,
                max_frames: Some(2),
                ..Default::default()
            },
        ));
        camera.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!camera.is_running());

        let qr = shared(MockPlugin::new("qr_code"));
        let scanner = build_scanner(&[&qr]);

        let err = tokio::time::timeout(
            Duration::from_secs(2),
            scanner.scan_continuous(
                &ScanSource::Video(camera.clone()),
                ScanOptions::new(["qr_code"]),
            ),
        )
        .await
        .expect("scan hung on an ended camera")
        .unwrap_err();

        assert!(matches!(err.root(), ScanError::SourceClosed { source_id } if source_id == "cam0"));
        assert_eq!(qr.calls(), 0);
    }

    /// Profile loaded from TOML drives request defaults
    #[tokio::test]
    async fn test_config_driven_scan() {
        let config = ConfigLoader::load_from_str(
            r#"
[scan]
formats = ["mrz", "qr_code"]
mode = "all"
timeout_ms = 500

[plugins.qr_code]
try_harder = true
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let qr = shared(MockPlugin::new("qr_code").returning(["HELLO"]));
        let mrz = shared(MockPlugin::new("mrz").returning(["P<UTO"]));
        let scanner = Scanner::with_config(
            [
                Arc::clone(&qr) as Arc<dyn ScanPlugin>,
                Arc::clone(&mrz) as Arc<dyn ScanPlugin>,
            ],
            config,
        )
        .unwrap();

        let options = scanner.options_from_config().unwrap();
        let results = scanner.scan(&sample(), options).await.unwrap();

        assert_eq!(formats(&results), vec!["mrz", "qr_code"]);
        assert_eq!(
            qr.last_params(),
            Some(serde_json::json!({ "try_harder": true }))
        );
    }
}
