//! Caller-facing job events.

use serde::{Deserialize, Serialize};

use crate::{JobStatus, MediaLocations};

/// Why a job ended without playable media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The provider reported the render as failed
    Provider(String),
    /// The provider has no record of the job
    NotFound,
    /// The provider rejected our credentials
    Unauthorized(String),
    /// Too many consecutive status checks failed in transport
    Unreachable { attempts: u32 },
    /// Polling exceeded its wall-clock budget
    TimedOut { elapsed_secs: u64 },
}

impl FailureReason {
    /// Build a provider failure, substituting a generic reason for blanks.
    pub fn provider(reason: Option<&str>) -> Self {
        match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => Self::Provider(r.to_string()),
            None => Self::Provider("video generation failed".to_string()),
        }
    }

    /// Suggested next step for the user.
    pub fn next_step(&self) -> &'static str {
        match self {
            FailureReason::Provider(_) | FailureReason::NotFound => "retry generation",
            FailureReason::Unauthorized(_) => "check provider credentials",
            FailureReason::Unreachable { .. } | FailureReason::TimedOut { .. } => {
                "check back later or retry generation"
            }
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Provider(r) => write!(f, "{}", r),
            FailureReason::NotFound => write!(f, "video job not found at provider"),
            FailureReason::Unauthorized(r) => write!(f, "provider rejected credentials: {}", r),
            FailureReason::Unreachable { attempts } => write!(
                f,
                "provider unreachable after {} consecutive status checks",
                attempts
            ),
            FailureReason::TimedOut { elapsed_secs } => {
                write!(f, "video not ready after {}s", elapsed_secs)
            }
        }
    }
}

/// Event delivered to whoever is watching a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// The job advanced to a new non-terminal status
    StatusChanged(JobStatus),
    /// The job is ready; carries where the media lives
    TerminalSuccess(MediaLocations),
    /// The job ended without media
    TerminalFailure(FailureReason),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::TerminalSuccess(_) | JobEvent::TerminalFailure(_))
    }
}
