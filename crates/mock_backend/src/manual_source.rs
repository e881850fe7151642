//! Manually driven frame source
//!
//! Frames are presented only when a test calls `push_frame`, which makes
//! frame-synchronized scanning deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use contracts::{Frame, FrameCallback, FrameSource, ImageData, ListenerId};

use crate::listeners::{lock, ListenerSet};

pub struct ManualFrameSource {
    source_id: String,
    frame_callbacks: bool,
    listeners: ListenerSet,
    current: Mutex<Option<Frame>>,
    next_frame_id: AtomicU64,
    created_at: Instant,
}

impl ManualFrameSource {
    /// Source that notifies listeners on every pushed frame
    pub fn new(source_id: impl Into<String>) -> Self {
        Self::build(source_id.into(), true)
    }

    /// Source without frame notification (scans fall back to polling)
    pub fn polling_only(source_id: impl Into<String>) -> Self {
        Self::build(source_id.into(), false)
    }

    fn build(source_id: String, frame_callbacks: bool) -> Self {
        Self {
            source_id,
            frame_callbacks,
            listeners: ListenerSet::default(),
            current: Mutex::new(None),
            next_frame_id: AtomicU64::new(1),
            created_at: Instant::now(),
        }
    }

    /// Present a frame: it becomes current and listeners are notified
    pub fn push_frame(&self, image: ImageData) -> Frame {
        let frame = Frame {
            frame_id: self.next_frame_id.fetch_add(1, Ordering::SeqCst),
            timestamp: self.created_at.elapsed().as_secs_f64(),
            image,
        };
        *lock(&self.current) = Some(frame.clone());
        if self.frame_callbacks {
            self.listeners.notify(&frame);
        }
        frame
    }

    /// Present a 1x1 black frame
    pub fn push_blank(&self) -> Frame {
        self.push_frame(ImageData::rgba(1, 1, vec![0u8; 4]))
    }

    /// End the stream by dropping every listener
    ///
    /// Listeners registered afterwards are dropped immediately.
    pub fn close(&self) {
        self.listeners.close();
    }

    /// Currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl FrameSource for ManualFrameSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn supports_frame_callback(&self) -> bool {
        self.frame_callbacks
    }

    fn current_frame(&self) -> Option<Frame> {
        lock(&self.current).clone()
    }

    fn add_frame_listener(&self, callback: FrameCallback) -> ListenerId {
        self.listeners.add(callback)
    }

    fn remove_frame_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
