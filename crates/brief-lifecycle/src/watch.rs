//! Caller handle for a watched job.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use brief_models::{JobEvent, JobId};

/// Event stream for one job plus the means to stop it.
///
/// Dropping the watch cancels it. Once cancelled, no further events are
/// returned, even ones already queued.
#[derive(Debug)]
pub struct JobWatch {
    job_id: JobId,
    events: mpsc::UnboundedReceiver<JobEvent>,
    token: CancellationToken,
}

impl JobWatch {
    pub(crate) fn new(
        job_id: JobId,
        events: mpsc::UnboundedReceiver<JobEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            events,
            token,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Next event, or `None` once the job is finished or the watch is
    /// cancelled.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Wait for the terminal event, skipping status changes.
    pub async fn wait_terminal(&mut self) -> Option<JobEvent> {
        while let Some(event) = self.recv().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }

    /// Stop watching. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for JobWatch {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
