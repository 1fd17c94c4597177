//! Structured job logging.

use tracing::{info, warn, Span};

use brief_models::{JobEvent, JobId, JobStatus};

/// Logs lifecycle events with the job id and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn submitted(&self, name: &str) {
        info!(job_id = %self.job_id, operation = self.operation, name = %name, "Job submitted");
    }

    pub fn watching(&self, from: JobStatus) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            status = from.as_str(),
            "Watch started"
        );
    }

    pub fn status_changed(&self, status: JobStatus) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            status = status.as_str(),
            "Job status changed"
        );
    }

    pub fn poll_failed(&self, consecutive: u32, limit: u32, error: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            consecutive,
            limit,
            error = %error,
            "Status check failed"
        );
    }

    pub fn cancelled(&self) {
        info!(job_id = %self.job_id, operation = self.operation, "Watch cancelled");
    }

    /// Log a terminal event. Non-terminal events are ignored.
    pub fn finished(&self, event: &JobEvent) {
        match event {
            JobEvent::TerminalSuccess(locations) => info!(
                job_id = %self.job_id,
                operation = self.operation,
                external_url = ?locations.external_url(),
                "Job ready"
            ),
            JobEvent::TerminalFailure(reason) => warn!(
                job_id = %self.job_id,
                operation = self.operation,
                reason = %reason,
                next_step = reason.next_step(),
                "Job failed"
            ),
            JobEvent::StatusChanged(_) => {}
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span carrying the job context, for instrumenting the poll task.
    pub fn span(&self) -> Span {
        tracing::info_span!("job_watch", job_id = %self.job_id, operation = self.operation)
    }
}
