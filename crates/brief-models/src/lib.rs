//! Shared data models for the briefing video engine.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests submitted to the synthesis provider
//! - Media jobs and their monotonic status machine
//! - Resolved media locations (manifest, direct file, hosted page)
//! - Caller-facing job events and failure reasons

pub mod error;
pub mod event;
pub mod job;
pub mod job_status;
pub mod request;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use event::{FailureReason, JobEvent};
pub use job::{JobId, MediaJob, MediaLocation, MediaLocations};
pub use job_status::JobStatus;
pub use request::{BriefingKind, BriefingMetadata, GenerationRequest, MAX_SCRIPT_CHARS};
