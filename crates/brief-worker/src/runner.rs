//! Follows briefing jobs to completion.

use futures::stream::{FuturesUnordered, StreamExt};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use brief_lifecycle::{JobController, JobWatch};
use brief_models::{JobEvent, JobId};
use brief_registry::JobRegistry;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

const JOBS_TOTAL: &str = "briefing_worker_jobs_total";

/// How a run ended, by job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Still running when shutdown was requested
    pub interrupted: usize,
    /// Submission rejected before a job existed
    pub rejected: usize,
}

pub struct BriefingRunner {
    controller: JobController,
    registry: JobRegistry,
    config: WorkerConfig,
}

impl BriefingRunner {
    pub fn new(controller: JobController, registry: JobRegistry, config: WorkerConfig) -> Self {
        Self {
            controller,
            registry,
            config,
        }
    }

    /// Start watching the requester's unfinished jobs.
    ///
    /// Jobs that cannot be watched are logged and skipped.
    pub async fn resume_pending(&self) -> WorkerResult<Vec<JobWatch>> {
        let pending = self
            .registry
            .list_pending(&self.config.requester_id, self.config.resume_limit)
            .await?;
        info!(
            requester_id = %self.config.requester_id,
            count = pending.len(),
            "Resuming pending jobs"
        );

        let mut watches = Vec::with_capacity(pending.len());
        for job in pending {
            match self.controller.watch(job.id.as_str()).await {
                Ok(watch) => watches.push(watch),
                Err(e) => warn!(job_id = %job.id, error = %e, "Cannot resume job"),
            }
        }
        Ok(watches)
    }

    /// Submit the configured briefing, if any.
    pub async fn submit_configured(&self) -> WorkerResult<Option<JobWatch>> {
        let Some(spec) = &self.config.submit else {
            return Ok(None);
        };
        let request = spec.to_request(&self.config.requester_id);
        let watch = self.controller.submit(&request).await?;
        info!(job_id = %watch.job_id(), name = %request.display_name(), "Submitted briefing");
        Ok(Some(watch))
    }

    /// Resume, submit, then follow every job until it ends or `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerResult<RunSummary> {
        let mut summary = RunSummary::default();
        let mut watches = Vec::new();

        if self.config.resume_pending {
            watches.extend(self.resume_pending().await?);
        }

        match self.submit_configured().await {
            Ok(Some(watch)) => watches.push(watch),
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "Briefing submission rejected");
                counter!(JOBS_TOTAL, "outcome" => "rejected").increment(1);
                summary.rejected += 1;
            }
        }

        let mut following: FuturesUnordered<_> = watches.into_iter().map(follow).collect();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    summary.interrupted += following.len();
                    info!(interrupted = summary.interrupted, "Shutdown requested, cancelling watches");
                    break;
                }
                next = following.next() => match next {
                    Some((_, Some(JobEvent::TerminalSuccess(_)))) => {
                        counter!(JOBS_TOTAL, "outcome" => "ready").increment(1);
                        summary.succeeded += 1;
                    }
                    Some((_, Some(_))) => {
                        counter!(JOBS_TOTAL, "outcome" => "failed").increment(1);
                        summary.failed += 1;
                    }
                    Some((job_id, None)) => {
                        warn!(job_id = %job_id, "Watch ended without a terminal event");
                        summary.interrupted += 1;
                    }
                    None => break,
                },
            }
        }

        Ok(summary)
    }
}

/// Log a job's events until its terminal one.
async fn follow(mut watch: JobWatch) -> (JobId, Option<JobEvent>) {
    let job_id = watch.job_id().clone();
    while let Some(event) = watch.recv().await {
        match &event {
            JobEvent::StatusChanged(status) => {
                info!(job_id = %job_id, status = status.as_str(), "Job status changed");
            }
            JobEvent::TerminalSuccess(locations) => {
                info!(
                    job_id = %job_id,
                    stream_url = ?locations.stream_url,
                    download_url = ?locations.download_url,
                    hosted_url = ?locations.hosted_url,
                    "Briefing ready"
                );
                return (job_id, Some(event));
            }
            JobEvent::TerminalFailure(reason) => {
                warn!(
                    job_id = %job_id,
                    reason = %reason,
                    next_step = reason.next_step(),
                    "Briefing failed"
                );
                return (job_id, Some(event));
            }
        }
    }
    (job_id, None)
}
