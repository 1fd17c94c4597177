//! Persistence seam for job snapshots.

use async_trait::async_trait;

use brief_models::{JobId, MediaJob};

use crate::error::RegistryResult;

/// Upsert-by-id storage for [`MediaJob`] snapshots.
///
/// Implementations only store; ordering and monotonicity are enforced by
/// [`crate::JobRegistry`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a job snapshot.
    async fn load(&self, job_id: &JobId) -> RegistryResult<Option<MediaJob>>;

    /// Insert or replace a job snapshot.
    async fn save(&self, job: &MediaJob) -> RegistryResult<()>;

    /// Jobs owned by `requester_id`, newest first, at most `limit`.
    async fn list_for_requester(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>>;
}
