//! Mock camera implementation
//!
//! Implements `FrameSource`, presenting synthetic frames at a fixed rate from
//! a background thread, the way a real camera driver would.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{Frame, FrameCallback, FrameSource, ImageData, ListenerId};
use tracing::{debug, trace, warn};

use crate::listeners::{lock, ListenerSet};

/// Mock camera configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// Frames per second
    pub frame_rate_hz: f64,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Whether listeners are notified per frame (false = polling only)
    pub frame_callbacks: bool,
    /// Stop after this many frames (None = until stopped)
    pub max_frames: Option<u64>,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 30.0,
            width: 64,
            height: 48,
            frame_callbacks: true,
            max_frames: None,
        }
    }
}

#[derive(Default)]
struct CameraState {
    listeners: ListenerSet,
    current: Mutex<Option<Frame>>,
    frames_presented: AtomicU64,
}

/// Mock camera
///
/// Frames are produced only between `start` and `stop`. When the camera
/// stops, every listener is dropped and listeners added before the next
/// `start` are dropped on registration.
pub struct MockCamera {
    source_id: String,
    config: MockCameraConfig,
    running: Arc<AtomicBool>,
    state: Arc<CameraState>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl MockCamera {
    /// Create new mock camera
    pub fn new(source_id: impl Into<String>, config: MockCameraConfig) -> Self {
        Self {
            source_id: source_id.into(),
            config,
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(CameraState::default()),
            producer: Mutex::new(None),
        }
    }

    /// Create mock camera with default configuration
    pub fn with_defaults(source_id: impl Into<String>) -> Self {
        Self::new(source_id, MockCameraConfig::default())
    }

    /// Start presenting frames (idempotent)
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        // a producer that ended on its own may not have been reaped yet
        self.join_producer();
        self.state.listeners.reopen();

        let source_id = self.source_id.clone();
        let config = self.config.clone();
        let running = self.running.clone();
        let state = self.state.clone();
        let interval = Duration::from_secs_f64(1.0 / config.frame_rate_hz.max(0.1));

        let handle = thread::spawn(move || {
            let start_time = Instant::now();
            debug!(
                source_id = %source_id,
                frame_rate_hz = config.frame_rate_hz,
                "mock camera started"
            );

            while running.load(Ordering::Relaxed) {
                let frame_id = state.frames_presented.fetch_add(1, Ordering::SeqCst) + 1;
                let frame = Frame {
                    frame_id,
                    timestamp: start_time.elapsed().as_secs_f64(),
                    image: Self::generate_image(&config, frame_id),
                };

                *lock(&state.current) = Some(frame.clone());
                if config.frame_callbacks {
                    state.listeners.notify(&frame);
                }
                trace!(source_id = %source_id, frame_id, "mock frame presented");

                if config.max_frames.is_some_and(|max| frame_id >= max) {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                thread::sleep(interval);
            }

            state.listeners.close();
            debug!(source_id = %source_id, "mock camera stopped");
        });
        *lock(&self.producer) = Some(handle);
    }

    /// Stop presenting frames
    ///
    /// Waits for the producer thread to exit, so a following `start` never
    /// runs alongside it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_producer();
    }

    fn join_producer(&self) {
        let Some(handle) = lock(&self.producer).take() else {
            return;
        };
        // a listener calling stop runs on the producer thread itself
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            warn!(source_id = %self.source_id, "mock camera thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Frames presented so far
    pub fn frames_presented(&self) -> u64 {
        self.state.frames_presented.load(Ordering::SeqCst)
    }

    /// Currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.state.listeners.len()
    }

    /// Uniform gray frame whose shade cycles with the frame id
    fn generate_image(config: &MockCameraConfig, frame_id: u64) -> ImageData {
        let shade = (frame_id % 256) as u8;
        let size = (config.width * config.height * 4) as usize;
        ImageData::rgba(config.width, config.height, vec![shade; size])
    }
}

impl FrameSource for MockCamera {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn supports_frame_callback(&self) -> bool {
        self.config.frame_callbacks
    }

    fn current_frame(&self) -> Option<Frame> {
        lock(&self.state.current).clone()
    }

    fn add_frame_listener(&self, callback: FrameCallback) -> ListenerId {
        self.state.listeners.add(callback)
    }

    fn remove_frame_listener(&self, id: ListenerId) {
        self.state.listeners.remove(id);
    }
}

impl Drop for MockCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
