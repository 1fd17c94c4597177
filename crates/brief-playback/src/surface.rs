//! Contract for the native rendering element.
//!
//! Any element offering this minimal contract can host playback. Methods are
//! synchronous; implementations queue work internally.

use std::fmt;

/// What the surface can play without help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceCapabilities {
    /// The surface plays HLS manifests natively
    pub native_hls: bool,
    /// The surface accepts appended media segments
    pub media_source: bool,
}

/// Container format of a media segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    MpegTs,
    Fmp4,
    Adts,
}

impl Container {
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::MpegTs => "mpegts",
            Container::Fmp4 => "fmp4",
            Container::Adts => "adts",
        }
    }
}

/// A demuxed chunk ready to append.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub data: Vec<u8>,
    pub container: Container,
    /// Presentation start in seconds
    pub start: f64,
    pub duration: f64,
    /// Initialization section rather than media
    pub is_init: bool,
    pub sequence: Option<u64>,
}

/// Error codes a surface reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    /// Append rejected because the surface buffer is full
    QuotaExceeded,
    Unknown,
}

/// Concrete error object reported by a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceError {
    pub code: SurfaceErrorCode,
    pub message: String,
}

impl SurfaceError {
    pub fn new(code: SurfaceErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for SurfaceError {}

/// Events emitted by a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Playhead moved, in seconds
    TimeUpdate(f64),
    /// User or script seeked to a position
    Seeking(f64),
    /// Playback stalled waiting for data
    Waiting,
    Ended,
    /// Error event; `None` when the surface gave no underlying cause
    Error(Option<SurfaceError>),
}

/// A native audio/video element.
pub trait PlaybackSurface: Send + Sync {
    fn capabilities(&self) -> SurfaceCapabilities;

    /// Point the surface at a URL it can play by itself.
    fn attach_url(&self, url: &str) -> Result<(), SurfaceError>;

    /// Switch the surface to accept appended segments.
    fn attach_media_source(&self) -> Result<(), SurfaceError>;

    fn append_segment(&self, segment: &MediaSegment) -> Result<(), SurfaceError>;

    /// Drop buffered media in `[start, end)` seconds.
    fn evict(&self, start: f64, end: f64) -> Result<(), SurfaceError>;

    /// Tear down and re-create decoder state.
    fn reset_decoder(&self) -> Result<(), SurfaceError>;

    /// Detach whatever source is attached.
    fn detach(&self);

    fn play(&self) -> Result<(), SurfaceError>;

    fn pause(&self);

    fn seek(&self, position: f64);

    fn set_muted(&self, muted: bool);

    fn set_rate(&self, rate: f64);

    fn set_fullscreen(&self, fullscreen: bool) -> Result<(), SurfaceError>;
}
