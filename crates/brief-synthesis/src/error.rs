//! Synthesis client error types.

use thiserror::Error;

use brief_models::{FailureReason, ModelError};
use brief_registry::RegistryError;

pub type SynthesisResult<T> = Result<T, SynthesisError>;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Provider rejected credentials ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Rate limited by provider{}", .retry_after_secs.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Provider error ({status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Provider protocol error: {0}")]
    Protocol(String),

    #[error("Job not found at provider: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SynthesisError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether a status check that hit this error should simply be retried
    /// on the normal polling cadence.
    pub fn is_transient(&self) -> bool {
        match self {
            SynthesisError::Network(_)
            | SynthesisError::RateLimited { .. }
            | SynthesisError::Provider { .. }
            | SynthesisError::Protocol(_)
            | SynthesisError::Json(_) => true,
            SynthesisError::Registry(e) => {
                matches!(e, RegistryError::Store(_) | RegistryError::Firestore(_))
            }
            SynthesisError::Validation(_)
            | SynthesisError::Auth { .. }
            | SynthesisError::NotFound(_)
            | SynthesisError::Config(_) => false,
        }
    }

    /// Failure reason to report when this error ends a job.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            SynthesisError::NotFound(_) => FailureReason::NotFound,
            SynthesisError::Auth { body, status } => {
                let detail = if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.clone()
                };
                FailureReason::Unauthorized(detail)
            }
            other => FailureReason::provider(Some(&other.to_string())),
        }
    }
}

impl From<ModelError> for SynthesisError {
    fn from(err: ModelError) -> Self {
        SynthesisError::Validation(err.to_string())
    }
}
