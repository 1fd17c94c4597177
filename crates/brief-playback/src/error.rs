//! Playback error types.

use thiserror::Error;

use crate::classifier::TransportError;
use crate::manifest::ManifestError;
use crate::surface::SurfaceError;
use crate::transport::FetchError;

pub type PlaybackResult<T> = Result<T, PlaybackError>;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Nothing the surface can play; `hosted_url` is offered for opening
    /// externally when present.
    #[error("No playable source{}", .hosted_url.as_ref().map(|u| format!(" (open externally: {})", u)).unwrap_or_default())]
    NoPlayableSource { hosted_url: Option<String> },

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Session detached")]
    Detached,
}
