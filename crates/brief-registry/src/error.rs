//! Registry error types.

use thiserror::Error;

use brief_models::ModelError;

use crate::firestore::FirestoreError;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid job id: {0:?}")]
    InvalidId(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<ModelError> for RegistryError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidJobId(raw) => RegistryError::InvalidId(raw),
            other => RegistryError::Store(other.to_string()),
        }
    }
}
