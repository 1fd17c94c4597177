//! Job lifecycle controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use brief_models::{GenerationRequest, JobEvent, JobId, JobStatus};
use brief_registry::JobRegistry;
use brief_synthesis::{SynthesisError, SynthesisResult};

use crate::clock::{Clock, TokioClock};
use crate::config::LifecycleConfig;
use crate::logging::JobLogger;
use crate::metrics::{record_poll, record_terminal, set_active_watches};
use crate::poller::{terminal_event, JobPoller, PollDecision, PollOutcome};
use crate::source::StatusSource;
use crate::watch::JobWatch;

struct ActiveWatch {
    generation: u64,
    token: CancellationToken,
}

/// Submits jobs and polls each one on its own task until it finishes or
/// the caller loses interest.
#[derive(Clone)]
pub struct JobController {
    source: Arc<dyn StatusSource>,
    registry: JobRegistry,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
    active: Arc<DashMap<JobId, ActiveWatch>>,
    generation: Arc<AtomicU64>,
}

impl JobController {
    pub fn new(
        source: Arc<dyn StatusSource>,
        registry: JobRegistry,
        config: LifecycleConfig,
    ) -> Self {
        Self::with_clock(source, registry, config, Arc::new(TokioClock))
    }

    pub fn with_clock(
        source: Arc<dyn StatusSource>,
        registry: JobRegistry,
        config: LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            registry,
            clock,
            config,
            active: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Submit a request and start watching the new job.
    ///
    /// The first event is always `StatusChanged(Submitted)`; the first status
    /// check runs immediately.
    pub async fn submit(&self, request: &GenerationRequest) -> SynthesisResult<JobWatch> {
        let job = self.source.submit(request).await?;
        JobLogger::new(&job.id, "submit").submitted(&job.name);
        Ok(self.start_polling(
            job.id,
            JobStatus::Submitted,
            Some(JobEvent::StatusChanged(JobStatus::Submitted)),
        ))
    }

    /// Resume watching a job by id.
    ///
    /// A job the registry already holds as finished gets its terminal event
    /// without any provider call.
    pub async fn watch(&self, job_id: &str) -> SynthesisResult<JobWatch> {
        let id = JobId::parse(job_id)
            .map_err(|_| SynthesisError::validation(format!("invalid job id {:?}", job_id)))?;

        let known = self.registry.get_by_id(&id).await?;
        if let Some(job) = &known {
            if let Some(event) = terminal_event(job) {
                self.cancel(&id);
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(event);
                return Ok(JobWatch::new(id, rx, CancellationToken::new()));
            }
        }

        let status = known.map(|j| j.status).unwrap_or_default();
        Ok(self.start_polling(id, status, None))
    }

    /// Stop watching a job. Returns whether a watch was active. Idempotent.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.active.remove(job_id) {
            Some((_, watch)) => {
                watch.token.cancel();
                JobLogger::new(job_id, "poll").cancelled();
                set_active_watches(self.active.len());
                true
            }
            None => false,
        }
    }

    /// Number of jobs currently being polled.
    pub fn active_watches(&self) -> usize {
        self.active.len()
    }

    fn start_polling(
        &self,
        job_id: JobId,
        initial_status: JobStatus,
        first_event: Option<JobEvent>,
    ) -> JobWatch {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.active.insert(
            job_id.clone(),
            ActiveWatch {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }
        set_active_watches(self.active.len());

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(event) = first_event {
            let _ = tx.send(event);
        }

        let logger = JobLogger::new(&job_id, "poll");
        logger.watching(initial_status);
        let span = logger.span();

        let task = PollTask {
            poller: JobPoller::new(&job_id, &self.config, initial_status, self.clock.now()),
            job_id: job_id.clone(),
            source: Arc::clone(&self.source),
            clock: Arc::clone(&self.clock),
            token: token.clone(),
            events: tx,
            logger,
        };
        let active = Arc::clone(&self.active);
        tokio::spawn(
            async move {
                let id = task.job_id.clone();
                task.run().await;
                active.remove_if(&id, |_, w| w.generation == generation);
                set_active_watches(active.len());
            }
            .instrument(span),
        );

        JobWatch::new(job_id, rx, token)
    }
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("config", &self.config)
            .field("active_watches", &self.active.len())
            .finish()
    }
}

struct PollTask {
    poller: JobPoller,
    job_id: JobId,
    source: Arc<dyn StatusSource>,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
    events: mpsc::UnboundedSender<JobEvent>,
    logger: JobLogger,
}

impl PollTask {
    async fn run(mut self) {
        let mut delay = self.poller.initial_delay();

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = self.clock.sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                result = self.source.fetch_status(&self.job_id) => result,
            };

            let outcome = match result {
                Ok(job) => {
                    record_poll("status");
                    PollOutcome::Status(job)
                }
                Err(e) if e.is_transient() => {
                    record_poll("transient_failure");
                    PollOutcome::TransientFailure(e.to_string())
                }
                Err(e) => {
                    record_poll("terminal_error");
                    PollOutcome::TerminalError(e.failure_reason())
                }
            };

            let decision = self.poller.observe(outcome, self.clock.now());
            if self.token.is_cancelled() {
                return;
            }

            match decision {
                PollDecision::Reschedule { delay: next, event } => {
                    if let Some(event) = event {
                        if let JobEvent::StatusChanged(status) = &event {
                            self.logger.status_changed(*status);
                        }
                        if self.events.send(event).is_err() {
                            return;
                        }
                    }
                    delay = next;
                }
                PollDecision::Finish(event) => {
                    match &event {
                        JobEvent::TerminalSuccess(_) => record_terminal("ready"),
                        JobEvent::TerminalFailure(_) => record_terminal("failed"),
                        JobEvent::StatusChanged(_) => {}
                    }
                    self.logger.finished(&event);
                    let _ = self.events.send(event);
                    return;
                }
            }
        }
    }
}
