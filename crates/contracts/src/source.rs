//! ScanSource - what a scan runs against
//!
//! Still images, encoded files, single video frames and live video sources
//! all flow through the same `ScanSource` value. Live sources are reached
//! only through the `FrameSource` capability trait.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::PluginError;

/// Pixel layout of decoded image data
///
/// Encoded files are always decoded to RGBA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgba8,
}

/// Decoded image or raw pixel buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Pixel layout
    pub format: PixelFormat,

    /// Raw pixel data (zero-copy)
    pub data: Bytes,
}

impl ImageData {
    /// Wrap an RGBA8 buffer
    pub fn rgba(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            data: data.into(),
        }
    }
}

/// Encoded image file (PNG, JPEG, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedFile {
    /// File name, diagnostics only
    pub name: String,

    /// MIME type when known
    pub mime: Option<String>,

    /// Encoded bytes
    pub bytes: Bytes,
}

/// A single frame captured from a live source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonic frame sequence number
    pub frame_id: u64,

    /// Source-relative timestamp (seconds)
    pub timestamp: f64,

    /// Frame pixels
    pub image: ImageData,
}

/// Frame callback type
///
/// Called by a `FrameSource` for every newly presented frame. May be invoked
/// from any thread.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Handle identifying one registered frame listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Live frame source capability
///
/// Camera acquisition and device control live behind this trait; the scan
/// core only inspects the capability flag, snapshots the current frame and
/// subscribes to frame-ready notifications.
pub trait FrameSource: Send + Sync {
    /// Source identifier (logging/diagnostics)
    fn source_id(&self) -> &str;

    /// Whether this source notifies on each newly presented frame
    fn supports_frame_callback(&self) -> bool;

    /// Snapshot of the most recent frame, if any has been produced
    fn current_frame(&self) -> Option<Frame>;

    /// Register a frame-ready callback
    ///
    /// Sources without frame notification may ignore the callback. Dropping
    /// every clone of the callback signals that the source has ended.
    fn add_frame_listener(&self, callback: FrameCallback) -> ListenerId;

    /// Unregister a callback. Unknown ids are ignored.
    fn remove_frame_listener(&self, id: ListenerId);
}

/// Input of one scan
#[derive(Clone)]
pub enum ScanSource {
    /// Decoded still image or raw pixel buffer
    Image(ImageData),

    /// Encoded image file
    File(EncodedFile),

    /// One frame taken from a live source
    Frame(Frame),

    /// Live video source
    Video(Arc<dyn FrameSource>),
}

impl ScanSource {
    /// Short kind name (logging/diagnostics)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::File(_) => "file",
            Self::Frame(_) => "frame",
            Self::Video(_) => "video",
        }
    }

    /// Whether continuous scans can be paced by frame notifications
    pub fn supports_frame_callback(&self) -> bool {
        match self {
            Self::Video(source) => source.supports_frame_callback(),
            _ => false,
        }
    }

    /// Freeze a live source into its current frame.
    ///
    /// Non-live sources are returned as-is. `None` means the live source has
    /// not produced a frame yet.
    pub fn snapshot(&self) -> Option<ScanSource> {
        match self {
            Self::Video(source) => source.current_frame().map(ScanSource::Frame),
            other => Some(other.clone()),
        }
    }

    /// Pixels of this source, decoding encoded files as RGBA8.
    ///
    /// # Errors
    /// - `PluginError::Decode` if a file cannot be decoded
    /// - `PluginError::UnsupportedSource` if a live source has no frame yet
    pub fn to_image(&self) -> Result<Cow<'_, ImageData>, PluginError> {
        match self {
            Self::Image(image) => Ok(Cow::Borrowed(image)),
            Self::Frame(frame) => Ok(Cow::Borrowed(&frame.image)),
            Self::File(file) => decode_file(file).map(Cow::Owned),
            Self::Video(source) => source
                .current_frame()
                .map(|frame| Cow::Owned(frame.image))
                .ok_or_else(|| PluginError::UnsupportedSource {
                    kind: format!("video '{}' without frames", source.source_id()),
                }),
        }
    }
}

fn decode_file(file: &EncodedFile) -> Result<ImageData, PluginError> {
    let decoded = image::load_from_memory(&file.bytes)
        .map_err(|e| PluginError::Decode(format!("{}: {e}", file.name)))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData::rgba(width, height, rgba.into_raw()))
}

impl fmt::Debug for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(image) => f
                .debug_struct("Image")
                .field("width", &image.width)
                .field("height", &image.height)
                .field("format", &image.format)
                .finish(),
            Self::File(file) => f
                .debug_struct("File")
                .field("name", &file.name)
                .field("bytes", &file.bytes.len())
                .finish(),
            Self::Frame(frame) => f
                .debug_struct("Frame")
                .field("frame_id", &frame.frame_id)
                .field("timestamp", &frame.timestamp)
                .finish(),
            Self::Video(source) => f
                .debug_struct("Video")
                .field("source_id", &source.source_id())
                .field("frame_callback", &source.supports_frame_callback())
                .finish(),
        }
    }
}
