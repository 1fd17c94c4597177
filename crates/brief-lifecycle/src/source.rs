//! Provider access seam for the controller.

use async_trait::async_trait;

use brief_models::{GenerationRequest, JobId, MediaJob};
use brief_synthesis::{SynthesisClient, SynthesisResult};

/// Submits jobs and reports their status.
///
/// Implementations record every successful call in the job registry
/// before returning.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn submit(&self, request: &GenerationRequest) -> SynthesisResult<MediaJob>;

    async fn fetch_status(&self, job_id: &JobId) -> SynthesisResult<MediaJob>;
}

#[async_trait]
impl StatusSource for SynthesisClient {
    async fn submit(&self, request: &GenerationRequest) -> SynthesisResult<MediaJob> {
        SynthesisClient::submit(self, request).await
    }

    async fn fetch_status(&self, job_id: &JobId) -> SynthesisResult<MediaJob> {
        SynthesisClient::fetch_status(self, job_id.as_str()).await
    }
}
