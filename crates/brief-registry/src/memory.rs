//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use brief_models::{JobId, MediaJob};

use crate::error::RegistryResult;
use crate::store::JobStore;

/// Process-local store. Used in tests and when no durable backend is
/// configured.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, MediaJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self, job_id: &JobId) -> RegistryResult<Option<MediaJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn save(&self, job: &MediaJob) -> RegistryResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn list_for_requester(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<MediaJob> = jobs
            .values()
            .filter(|j| j.requester_id == requester_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        owned.truncate(limit);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brief_models::GenerationRequest;
    use chrono::{Duration, Utc};

    fn job(id: &str, requester: &str, age_secs: i64) -> MediaJob {
        let req = GenerationRequest::new(requester, "p1", "Hello");
        let mut job = MediaJob::submitted(JobId::parse(id).unwrap(), &req);
        job.created_at = Utc::now() - Duration::seconds(age_secs);
        job
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped() {
        let store = MemoryJobStore::new();
        store.save(&job("old", "alice", 300)).await.unwrap();
        store.save(&job("new", "alice", 10)).await.unwrap();
        store.save(&job("mid", "alice", 100)).await.unwrap();
        store.save(&job("other", "bob", 1)).await.unwrap();

        let listed = store.list_for_requester("alice", 10).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let limited = store.list_for_requester("alice", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
