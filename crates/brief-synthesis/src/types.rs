//! Provider wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brief_models::{FailureReason, JobId, JobStatus, MediaJob, MediaLocations};

/// Body of `POST /videos`.
#[derive(Debug, Serialize)]
pub struct CreateVideoRequest<'a> {
    pub persona_id: &'a str,
    pub script: &'a str,
    pub name: &'a str,
}

/// Provider view of a video job, returned by both submit and status calls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoResponse {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub hosted_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl VideoResponse {
    /// Convert to a job observation. Ownership and original parameters are
    /// unknown here and are filled in by the registry merge.
    pub fn into_observation(self, id: JobId) -> MediaJob {
        let now = Utc::now();
        let status = JobStatus::from_provider(self.status.as_deref().unwrap_or("processing"));
        let failure_reason = (status == JobStatus::Failed)
            .then(|| FailureReason::provider(self.error.as_deref()).to_string());

        MediaJob {
            id,
            requester_id: String::new(),
            status,
            name: self.name.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
            locations: MediaLocations {
                stream_url: self.stream_url,
                download_url: self.download_url,
                hosted_url: self.hosted_url,
            }
            .normalized(),
            thumbnail_url: self.thumbnail_url.filter(|u| !u.trim().is_empty()),
            script: self.script,
            failure_reason,
            request: None,
        }
    }
}

/// A persona (avatar and voice) offered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub persona_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PersonaList {
    #[serde(default)]
    pub personas: Vec<Persona>,
}
