//! Client for the external video synthesis provider.
//!
//! This crate provides a client that submits briefing scripts for rendering
//! and fetches the status of previously submitted jobs. Every successful
//! call is mirrored into the job registry before it returns.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use cache::{CacheEntry, TtlCache};
pub use client::SynthesisClient;
pub use config::SynthesisConfig;
pub use error::{SynthesisError, SynthesisResult};
pub use types::Persona;
