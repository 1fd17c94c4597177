//! Firestore REST backend for the job registry.
//!
//! Documents live at `users/{requester_id}/briefing_jobs/{job_id}`, mirroring
//! the per-user scoping of the registry. Provides:
//! - Service account or emulator authentication with a refresh-margin token cache
//! - Exponential backoff with jitter on network errors, 429 and 5xx
//! - Tracing spans and request metrics

mod client;
mod error;
mod retry;
mod store;
mod token_cache;
mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use store::{FirestoreJobStore, JOBS_COLLECTION};
pub use token_cache::{AccessTokenSource, StaticToken, TokenCache};
pub use types::{Document, StructuredQuery, Value};
