//! Playback engine for briefing videos.
//!
//! This crate provides:
//! - Source selection over a job's media locations (`acquire`)
//! - An HLS playlist parser (`manifest`)
//! - Direct and segmented transports feeding a `PlaybackSurface`
//! - The error classifier and recovery engine supervising a transport
//! - `PlaybackSession`, which owns exactly one transport at a time

pub mod acquire;
pub mod classifier;
pub mod config;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod recovery;
pub mod session;
pub mod surface;
pub mod transport;

pub use acquire::{is_manifest, select_source, SourcePlan};
pub use classifier::{classify, ErrorClass, RecoveryAction, TransportError, TransportErrorKind};
pub use config::BufferConfig;
pub use error::{PlaybackError, PlaybackResult};
pub use manifest::{parse_playlist, ManifestError, MasterPlaylist, MediaPlaylist, Playlist, Variant};
pub use recovery::{PlaybackFailure, RecoveryEngine, RecoveryOutcome};
pub use session::{PlaybackEvent, PlaybackSession, SessionState};
pub use surface::{
    Container, MediaSegment, PlaybackSurface, SurfaceCapabilities, SurfaceError, SurfaceErrorCode,
    SurfaceEvent,
};
pub use transport::{
    DefaultTransportFactory, FetchError, HttpSegmentFetcher, SegmentFetcher, Transport,
    TransportFactory, TransportKind,
};
