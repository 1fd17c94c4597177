//! Job registry with monotonic, per-job serialized writes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use brief_models::{JobId, JobStatus, MediaJob};

use crate::error::{RegistryError, RegistryResult};
use crate::metrics::{record_rejected_transition, record_upsert};
use crate::store::JobStore;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this id was seen
    Inserted,
    /// Existing snapshot changed
    Updated { from: JobStatus, to: JobStatus },
    /// Observation matched the stored snapshot
    Unchanged,
    /// Observation would move the job backward and was dropped
    RejectedBackward { current: JobStatus, attempted: JobStatus },
}

impl UpsertOutcome {
    fn label(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated { .. } => "updated",
            UpsertOutcome::Unchanged => "unchanged",
            UpsertOutcome::RejectedBackward { .. } => "rejected_backward",
        }
    }
}

/// Result of an upsert: the outcome plus the snapshot now stored.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub outcome: UpsertOutcome,
    pub job: MediaJob,
}

/// Durable record of every submitted job.
///
/// Writes to one job id are serialized; writes to different ids never
/// contend.
#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    locks: Arc<DashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobRegistry {
    /// Create a registry over a store.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Insert or merge a job snapshot.
    ///
    /// Backward status moves are logged and dropped rather than applied;
    /// the returned snapshot is whatever is stored afterwards.
    pub async fn upsert(&self, job: MediaJob) -> RegistryResult<Upserted> {
        let job_id = job.id.clone();
        let lock = self.lock_for(&job_id);
        let result = {
            let _guard = lock.lock().await;
            self.upsert_locked(job).await
        };
        drop(lock);
        self.locks
            .remove_if(&job_id, |_, l| Arc::strong_count(l) == 1);

        if let Ok(upserted) = &result {
            record_upsert(upserted.outcome.label());
        }
        result
    }

    async fn upsert_locked(&self, job: MediaJob) -> RegistryResult<Upserted> {
        let Some(mut current) = self.store.load(&job.id).await? else {
            self.store.save(&job).await?;
            debug!(job_id = %job.id, status = %job.status, "Registered job");
            return Ok(Upserted {
                outcome: UpsertOutcome::Inserted,
                job,
            });
        };

        if !current.status.can_transition_to(job.status) {
            warn!(
                job_id = %job.id,
                current = %current.status,
                attempted = %job.status,
                "Rejected backward status transition"
            );
            record_rejected_transition(current.status.as_str(), job.status.as_str());
            return Ok(Upserted {
                outcome: UpsertOutcome::RejectedBackward {
                    current: current.status,
                    attempted: job.status,
                },
                job: current,
            });
        }

        let before = current.clone();
        current.merge_observation(job);
        if current == before {
            return Ok(Upserted {
                outcome: UpsertOutcome::Unchanged,
                job: current,
            });
        }

        self.store.save(&current).await?;
        debug!(
            job_id = %current.id,
            from = %before.status,
            to = %current.status,
            "Updated job"
        );
        Ok(Upserted {
            outcome: UpsertOutcome::Updated {
                from: before.status,
                to: current.status,
            },
            job: current,
        })
    }

    /// Look up a job by raw id.
    pub async fn get(&self, job_id: &str) -> RegistryResult<Option<MediaJob>> {
        let id = JobId::parse(job_id)?;
        self.store.load(&id).await
    }

    /// Look up a job by validated id.
    pub async fn get_by_id(&self, job_id: &JobId) -> RegistryResult<Option<MediaJob>> {
        self.store.load(job_id).await
    }

    /// Jobs requested by a user, newest first.
    pub async fn list_for_requester(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>> {
        if requester_id.trim().is_empty() {
            return Err(RegistryError::store("requester id must not be empty"));
        }
        self.store.list_for_requester(requester_id, limit).await
    }

    /// Non-terminal jobs requested by a user, newest first.
    ///
    /// Used to resume polling after a restart.
    pub async fn list_pending(
        &self,
        requester_id: &str,
        limit: usize,
    ) -> RegistryResult<Vec<MediaJob>> {
        let jobs = self.list_for_requester(requester_id, limit).await?;
        Ok(jobs.into_iter().filter(|j| !j.is_terminal()).collect())
    }

    fn lock_for(&self, job_id: &JobId) -> Arc<Mutex<()>> {
        self.locks
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("locked_ids", &self.locks.len())
            .finish()
    }
}
