//! Per-job polling state machine.
//!
//! The poller never sleeps or performs I/O. The controller feeds it the
//! result of each status check and acts on the returned decision.

use std::time::Duration;

use tokio::time::Instant;

use brief_models::{FailureReason, JobEvent, JobId, JobStatus, MediaJob};

use crate::config::LifecycleConfig;
use crate::metrics::record_poll_failure;
use crate::JobLogger;

/// Result of one status check.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The provider answered with a snapshot
    Status(MediaJob),
    /// The check failed in a way that may clear up by itself
    TransientFailure(String),
    /// The check failed in a way that ends the job
    TerminalError(FailureReason),
}

/// What the controller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Check again after `delay`, first delivering `event` if present
    Reschedule {
        delay: Duration,
        event: Option<JobEvent>,
    },
    /// Deliver the terminal event and stop
    Finish(JobEvent),
}

/// Terminal event for a snapshot already in a terminal state.
pub fn terminal_event(job: &MediaJob) -> Option<JobEvent> {
    match job.status {
        JobStatus::Ready => Some(JobEvent::TerminalSuccess(job.locations.clone())),
        JobStatus::Failed => Some(JobEvent::TerminalFailure(FailureReason::provider(
            job.failure_reason.as_deref(),
        ))),
        JobStatus::Submitted | JobStatus::Processing => None,
    }
}

/// Polling state for one job.
#[derive(Debug)]
pub struct JobPoller {
    logger: JobLogger,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    max_poll_duration: Option<Duration>,
    started_at: Instant,
    last_status: JobStatus,
    consecutive_failures: u32,
    checks: u32,
    finished: bool,
}

impl JobPoller {
    /// Start polling a job last seen in `initial_status`.
    pub fn new(
        job_id: &JobId,
        config: &LifecycleConfig,
        initial_status: JobStatus,
        started_at: Instant,
    ) -> Self {
        Self {
            logger: JobLogger::new(job_id, "poll"),
            poll_interval: config.poll_interval,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            max_poll_duration: config.max_poll_duration,
            started_at,
            last_status: initial_status,
            consecutive_failures: 0,
            checks: 0,
            finished: false,
        }
    }

    /// Delay before the first check. The first check is immediate.
    pub fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    pub fn last_status(&self) -> JobStatus {
        self.last_status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Number of outcomes observed so far.
    pub fn checks(&self) -> u32 {
        self.checks
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fold one check result into the state machine.
    ///
    /// Must not be called again after returning [`PollDecision::Finish`].
    pub fn observe(&mut self, outcome: PollOutcome, now: Instant) -> PollDecision {
        debug_assert!(!self.finished, "observe called on a finished poller");
        self.checks += 1;

        let decision = match outcome {
            PollOutcome::Status(job) => self.observe_status(job, now),
            PollOutcome::TransientFailure(message) => self.observe_failure(&message, now),
            PollOutcome::TerminalError(reason) => PollDecision::Finish(JobEvent::TerminalFailure(reason)),
        };

        if matches!(decision, PollDecision::Finish(_)) {
            self.finished = true;
        }
        decision
    }

    fn observe_status(&mut self, job: MediaJob, now: Instant) -> PollDecision {
        self.consecutive_failures = 0;

        if let Some(event) = terminal_event(&job) {
            self.last_status = job.status;
            return PollDecision::Finish(event);
        }

        // Backward observations are ignored; the registry refuses them anyway.
        let event = if job.status.rank() > self.last_status.rank() {
            self.last_status = job.status;
            Some(JobEvent::StatusChanged(job.status))
        } else {
            None
        };

        self.reschedule(event, now)
    }

    fn observe_failure(&mut self, message: &str, now: Instant) -> PollDecision {
        self.consecutive_failures += 1;
        record_poll_failure();
        self.logger
            .poll_failed(self.consecutive_failures, self.max_consecutive_failures, message);

        if self.consecutive_failures >= self.max_consecutive_failures {
            return PollDecision::Finish(JobEvent::TerminalFailure(FailureReason::Unreachable {
                attempts: self.consecutive_failures,
            }));
        }

        self.reschedule(None, now)
    }

    fn reschedule(&self, event: Option<JobEvent>, now: Instant) -> PollDecision {
        if let Some(max) = self.max_poll_duration {
            let elapsed = now.saturating_duration_since(self.started_at);
            if elapsed >= max {
                return PollDecision::Finish(JobEvent::TerminalFailure(FailureReason::TimedOut {
                    elapsed_secs: elapsed.as_secs(),
                }));
            }
        }

        PollDecision::Reschedule {
            delay: self.poll_interval,
            event,
        }
    }
}
