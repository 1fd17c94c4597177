//! Durable registry of submitted briefing jobs.
//!
//! This crate provides:
//! - The `JobRegistry`, which enforces the monotonic status walk and
//!   serializes writes per job id
//! - The `JobStore` persistence seam with in-memory and Firestore backends
//! - Registry metrics

pub mod config;
pub mod error;
pub mod firestore;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod store;

pub use config::{RegistryBackend, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use firestore::{FirestoreClient, FirestoreConfig, FirestoreError, FirestoreJobStore};
pub use memory::MemoryJobStore;
pub use registry::{JobRegistry, UpsertOutcome, Upserted};
pub use store::JobStore;
