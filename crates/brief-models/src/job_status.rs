//! Media job status machine.
//!
//! Jobs walk `Submitted -> Processing -> Ready | Failed`. The walk is
//! monotonic: a status may repeat or advance, never move backward, and a
//! terminal status never changes.

use serde::{Deserialize, Serialize};

/// Media job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the provider, no progress observed yet
    #[default]
    Submitted,
    /// Provider is rendering
    Processing,
    /// Media is available
    Ready,
    /// Provider gave up on the job
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Ready => "ready",
            JobStatus::Failed => "failed",
        }
    }

    /// Position in the monotonic walk. `Ready` and `Failed` share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Submitted => 0,
            JobStatus::Processing => 1,
            JobStatus::Ready | JobStatus::Failed => 2,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps the walk monotonic.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }

    /// Map a provider status string onto the local status machine.
    ///
    /// Unknown strings are treated as still processing so the poller keeps
    /// checking rather than inventing a terminal outcome.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "submitted" | "pending" | "queued" => JobStatus::Submitted,
            "ready" | "completed" | "complete" | "done" => JobStatus::Ready,
            "failed" | "error" | "errored" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Ready));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Submitted));
        assert!(!JobStatus::Ready.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Submitted));
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        assert!(JobStatus::Ready.can_transition_to(JobStatus::Ready));
        assert!(!JobStatus::Ready.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Ready));
    }

    #[test]
    fn test_from_provider() {
        assert_eq!(JobStatus::from_provider("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::from_provider("Completed"), JobStatus::Ready);
        assert_eq!(JobStatus::from_provider("ready"), JobStatus::Ready);
        assert_eq!(JobStatus::from_provider("failed"), JobStatus::Failed);
        assert_eq!(JobStatus::from_provider("pending"), JobStatus::Submitted);
        assert_eq!(JobStatus::from_provider("something-new"), JobStatus::Processing);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
