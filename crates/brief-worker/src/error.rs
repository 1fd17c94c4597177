//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] brief_synthesis::SynthesisError),

    #[error("Registry error: {0}")]
    Registry(#[from] brief_registry::RegistryError),
}
