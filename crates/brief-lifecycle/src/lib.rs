//! Job lifecycle controller.
//!
//! Drives a submitted job to a terminal state:
//! - `JobPoller` is the per-job state machine (observation in, decision out)
//! - `JobController` owns the polling tasks and their cancellation tokens
//! - `JobWatch` is the caller's handle: an event stream plus cancellation
//!
//! Time comes from an injectable `Clock` and provider access from a
//! `StatusSource`, so the whole loop runs under tokio's paused clock in tests.

pub mod clock;
pub mod config;
pub mod controller;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod source;
pub mod watch;

pub use clock::{Clock, TokioClock};
pub use config::LifecycleConfig;
pub use controller::JobController;
pub use logging::JobLogger;
pub use poller::{JobPoller, PollDecision, PollOutcome};
pub use source::StatusSource;
pub use watch::JobWatch;
