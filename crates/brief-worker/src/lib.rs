//! Briefing worker.
//!
//! Resumes polling of a requester's unfinished briefing jobs, optionally
//! submits a new briefing, and follows every job to a terminal event.

pub mod config;
pub mod error;
pub mod runner;

pub use config::{SubmitSpec, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use runner::{BriefingRunner, RunSummary};
