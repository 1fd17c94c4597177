//! Source selection.
//!
//! Picks how a job's media should reach the surface: handed over as a URL,
//! or fed segment by segment from an HLS manifest.

use brief_models::{MediaLocation, MediaLocations};
use tracing::debug;

use crate::error::{PlaybackError, PlaybackResult};
use crate::surface::SurfaceCapabilities;
use crate::transport::TransportKind;

const HLS_CONTENT_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// Whether `url` points at an HLS manifest.
///
/// Looks at the path extension (query and fragment ignored) and, when
/// given, the response content type.
pub fn is_manifest(url: &str, content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        let mime = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if HLS_CONTENT_TYPES.contains(&mime.as_str()) {
            return true;
        }
    }

    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.to_ascii_lowercase().ends_with(".m3u8")
}

/// How to play a selected source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePlan {
    /// Hand the URL to the surface as-is.
    Direct {
        url: String,
        /// The URL is a manifest the surface plays natively
        native_manifest: bool,
    },
    /// Fetch and append segments from a manifest.
    Segmented { manifest_url: String },
}

impl SourcePlan {
    pub fn transport_kind(&self) -> TransportKind {
        match self {
            SourcePlan::Direct { .. } => TransportKind::Direct,
            SourcePlan::Segmented { .. } => TransportKind::Manifest,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            SourcePlan::Direct { url, .. } => url,
            SourcePlan::Segmented { manifest_url } => manifest_url,
        }
    }
}

/// Choose a source for the surface.
///
/// Locations are tried in priority order (manifest, file, hosted page). A
/// manifest the surface cannot consume falls through to the next location.
/// When only a hosted page remains, the error carries its URL so the caller
/// can offer to open it externally.
pub fn select_source(
    locations: &MediaLocations,
    capabilities: &SurfaceCapabilities,
) -> PlaybackResult<SourcePlan> {
    for location in locations.in_priority_order() {
        let url = match &location {
            MediaLocation::Manifest(u) | MediaLocation::File(u) => u,
            MediaLocation::HostedPage(_) => continue,
        };

        if !is_manifest(url, None) {
            debug!(url = %url, "Selected direct source");
            return Ok(SourcePlan::Direct {
                url: url.clone(),
                native_manifest: false,
            });
        }

        if capabilities.native_hls {
            debug!(url = %url, "Selected native manifest playback");
            return Ok(SourcePlan::Direct {
                url: url.clone(),
                native_manifest: true,
            });
        }

        if capabilities.media_source {
            debug!(url = %url, "Selected segmented manifest playback");
            return Ok(SourcePlan::Segmented {
                manifest_url: url.clone(),
            });
        }

        debug!(url = %url, "Surface cannot play manifests, trying next location");
    }

    Err(PlaybackError::NoPlayableSource {
        hosted_url: locations.hosted_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "https://cdn.example.com/v1/master.m3u8?token=abc";
    const FILE: &str = "https://cdn.example.com/v1/video.mp4";
    const HOSTED: &str = "https://provider.example.com/share/v1";

    fn all_locations() -> MediaLocations {
        MediaLocations {
            stream_url: Some(MANIFEST.into()),
            download_url: Some(FILE.into()),
            hosted_url: Some(HOSTED.into()),
        }
    }

    fn caps(native_hls: bool, media_source: bool) -> SurfaceCapabilities {
        SurfaceCapabilities {
            native_hls,
            media_source,
        }
    }

    #[test]
    fn test_is_manifest() {
        assert!(is_manifest(MANIFEST, None));
        assert!(is_manifest("https://a.example.com/X/INDEX.M3U8", None));
        assert!(!is_manifest(FILE, None));
        assert!(!is_manifest("https://a.example.com/video.mp4?x=.m3u8", None));
        assert!(is_manifest(
            "https://a.example.com/stream",
            Some("application/vnd.apple.mpegurl; charset=utf-8")
        ));
        assert!(!is_manifest("https://a.example.com/stream", Some("video/mp4")));
    }

    #[test]
    fn test_native_hls_attaches_manifest_directly() {
        let plan = select_source(&all_locations(), &caps(true, true)).unwrap();
        assert_eq!(
            plan,
            SourcePlan::Direct {
                url: MANIFEST.into(),
                native_manifest: true
            }
        );
        assert_eq!(plan.transport_kind(), TransportKind::Direct);
    }

    #[test]
    fn test_media_source_uses_segmented_transport() {
        let plan = select_source(&all_locations(), &caps(false, true)).unwrap();
        assert_eq!(
            plan,
            SourcePlan::Segmented {
                manifest_url: MANIFEST.into()
            }
        );
        assert_eq!(plan.transport_kind(), TransportKind::Manifest);
    }

    #[test]
    fn test_no_manifest_support_falls_back_to_file() {
        let plan = select_source(&all_locations(), &caps(false, false)).unwrap();
        assert_eq!(
            plan,
            SourcePlan::Direct {
                url: FILE.into(),
                native_manifest: false
            }
        );
    }

    #[test]
    fn test_hosted_only_is_not_playable() {
        let locations = MediaLocations {
            hosted_url: Some(HOSTED.into()),
            ..Default::default()
        };
        match select_source(&locations, &caps(true, true)) {
            Err(PlaybackError::NoPlayableSource { hosted_url }) => {
                assert_eq!(hosted_url.as_deref(), Some(HOSTED));
            }
            other => panic!("expected NoPlayableSource, got {:?}", other),
        }
    }

    #[test]
    fn test_manifest_only_without_support_is_not_playable() {
        let locations = MediaLocations {
            stream_url: Some(MANIFEST.into()),
            ..Default::default()
        };
        assert!(matches!(
            select_source(&locations, &caps(false, false)),
            Err(PlaybackError::NoPlayableSource { hosted_url: None })
        ));
    }
}
