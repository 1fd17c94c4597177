//! Media job definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;
use crate::request::GenerationRequest;
use crate::JobStatus;

/// Strings some providers emit in place of a real id.
const SENTINEL_IDS: [&str; 3] = ["", "null", "undefined"];

/// Provider-assigned job identifier.
///
/// Always constructed through [`JobId::parse`], so a held `JobId` is never
/// empty or a sentinel string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap a raw id.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ModelError> {
        let trimmed = raw.as_ref().trim();
        if SENTINEL_IDS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
            return Err(ModelError::InvalidJobId(raw.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Check a raw id without allocating a `JobId`.
    pub fn is_valid(raw: &str) -> bool {
        let trimmed = raw.trim();
        !SENTINEL_IDS.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single resolved location, tagged by how it can be consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    /// Adaptive streaming manifest
    Manifest(String),
    /// Progressive file download
    File(String),
    /// Provider-hosted page; not playable in-process
    HostedPage(String),
}

impl MediaLocation {
    pub fn url(&self) -> &str {
        match self {
            MediaLocation::Manifest(u) | MediaLocation::File(u) | MediaLocation::HostedPage(u) => u,
        }
    }
}

/// Content locations reported for a job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaLocations {
    /// Streaming manifest URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Direct file URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Hosted page URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_url: Option<String>,
}

impl MediaLocations {
    /// Drop blank or unparseable URLs.
    pub fn normalized(self) -> Self {
        fn keep(u: Option<String>) -> Option<String> {
            u.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && url::Url::parse(s).is_ok())
        }
        Self {
            stream_url: keep(self.stream_url),
            download_url: keep(self.download_url),
            hosted_url: keep(self.hosted_url),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stream_url.is_none() && self.download_url.is_none() && self.hosted_url.is_none()
    }

    /// All locations in priority order: manifest, file, hosted page.
    pub fn in_priority_order(&self) -> Vec<MediaLocation> {
        let mut out = Vec::with_capacity(3);
        if let Some(u) = &self.stream_url {
            out.push(MediaLocation::Manifest(u.clone()));
        }
        if let Some(u) = &self.download_url {
            out.push(MediaLocation::File(u.clone()));
        }
        if let Some(u) = &self.hosted_url {
            out.push(MediaLocation::HostedPage(u.clone()));
        }
        out
    }

    /// Highest-priority location, if any.
    pub fn preferred(&self) -> Option<MediaLocation> {
        self.in_priority_order().into_iter().next()
    }

    /// Best URL to hand to an external viewer.
    pub fn external_url(&self) -> Option<&str> {
        self.hosted_url
            .as_deref()
            .or(self.download_url.as_deref())
            .or(self.stream_url.as_deref())
    }

    /// Overlay non-empty fields from `other`.
    fn overlay(&mut self, other: MediaLocations) {
        if other.stream_url.is_some() {
            self.stream_url = other.stream_url;
        }
        if other.download_url.is_some() {
            self.download_url = other.download_url;
        }
        if other.hosted_url.is_some() {
            self.hosted_url = other.hosted_url;
        }
    }
}

/// A media job as tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaJob {
    /// Provider-assigned id
    pub id: JobId,
    /// User who requested the job
    pub requester_id: String,
    /// Current status
    pub status: JobStatus,
    /// Human-readable name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Resolved content locations
    #[serde(default)]
    pub locations: MediaLocations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Script echoed by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Present only when `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Original generation parameters, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<GenerationRequest>,
}

impl MediaJob {
    /// Create a freshly submitted job.
    pub fn submitted(id: JobId, request: &GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            requester_id: request.requester_id.clone(),
            status: JobStatus::Submitted,
            name: request.display_name(),
            created_at: now,
            updated_at: now,
            locations: MediaLocations::default(),
            thumbnail_url: None,
            script: Some(request.script.clone()),
            failure_reason: None,
            request: Some(request.clone()),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a newer observation into this snapshot.
    ///
    /// Fields are last-writer-wins except identity, ownership, creation
    /// time and original parameters, which are kept when the observation
    /// lacks them. Status monotonicity is the caller's concern.
    pub fn merge_observation(&mut self, observed: MediaJob) {
        debug_assert_eq!(self.id, observed.id);

        if !observed.requester_id.is_empty() {
            self.requester_id = observed.requester_id;
        }
        self.status = observed.status;
        if !observed.name.trim().is_empty() {
            self.name = observed.name;
        }
        self.created_at = self.created_at.min(observed.created_at);
        self.updated_at = self.updated_at.max(observed.updated_at);
        self.locations.overlay(observed.locations);
        if observed.thumbnail_url.is_some() {
            self.thumbnail_url = observed.thumbnail_url;
        }
        if observed.script.is_some() {
            self.script = observed.script;
        }
        self.failure_reason = if self.status == JobStatus::Failed {
            observed.failure_reason.or(self.failure_reason.take())
        } else {
            None
        };
        if observed.request.is_some() {
            self.request = observed.request;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> MediaJob {
        let req = GenerationRequest::new("user-1", "p1", "Hello");
        MediaJob::submitted(JobId::parse(id).unwrap(), &req)
    }

    #[test]
    fn test_job_id_rejects_sentinels() {
        assert!(JobId::parse("").is_err());
        assert!(JobId::parse("   ").is_err());
        assert!(JobId::parse("null").is_err());
        assert!(JobId::parse("NULL").is_err());
        assert!(JobId::parse("undefined").is_err());
        assert_eq!(JobId::parse(" v123 ").unwrap().as_str(), "v123");
    }

    #[test]
    fn test_job_id_deserialize_validates() {
        let ok: Result<JobId, _> = serde_json::from_str("\"v1\"");
        assert!(ok.is_ok());
        let bad: Result<JobId, _> = serde_json::from_str("\"undefined\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_location_priority() {
        let locs = MediaLocations {
            stream_url: Some("https://cdn.example.com/v/manifest.m3u8".into()),
            download_url: Some("https://cdn.example.com/v/video.mp4".into()),
            hosted_url: Some("https://provider.example.com/share/v".into()),
        };
        assert!(matches!(locs.preferred(), Some(MediaLocation::Manifest(_))));
        assert_eq!(locs.external_url(), Some("https://provider.example.com/share/v"));

        let locs = MediaLocations {
            hosted_url: Some("https://provider.example.com/share/v".into()),
            ..Default::default()
        };
        assert!(matches!(locs.preferred(), Some(MediaLocation::HostedPage(_))));
    }

    #[test]
    fn test_normalized_drops_garbage() {
        let locs = MediaLocations {
            stream_url: Some("  ".into()),
            download_url: Some("not a url".into()),
            hosted_url: Some("https://provider.example.com/x".into()),
        }
        .normalized();
        assert!(locs.stream_url.is_none());
        assert!(locs.download_url.is_none());
        assert!(locs.hosted_url.is_some());
    }

    #[test]
    fn test_merge_keeps_request_and_owner() {
        let mut current = job("v1");
        let mut observed = current.clone();
        observed.requester_id = String::new();
        observed.request = None;
        observed.status = JobStatus::Ready;
        observed.locations.stream_url = Some("https://cdn.example.com/m.m3u8".into());

        current.merge_observation(observed);
        assert_eq!(current.status, JobStatus::Ready);
        assert_eq!(current.requester_id, "user-1");
        assert!(current.request.is_some());
        assert!(current.locations.stream_url.is_some());
        assert!(current.failure_reason.is_none());
    }

    #[test]
    fn test_merge_failure_reason_only_when_failed() {
        let mut current = job("v1");
        let mut observed = current.clone();
        observed.status = JobStatus::Processing;
        observed.failure_reason = Some("spurious".into());
        current.merge_observation(observed);
        assert!(current.failure_reason.is_none());

        let mut observed = current.clone();
        observed.status = JobStatus::Failed;
        observed.failure_reason = Some("render crashed".into());
        current.merge_observation(observed);
        assert_eq!(current.failure_reason.as_deref(), Some("render crashed"));
    }
}
