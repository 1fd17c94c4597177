//! Recovery for classified playback errors.

use tracing::{info, warn};

use crate::classifier::{classify, ErrorClass, RecoveryAction, TransportError};
use crate::metrics;
use crate::surface::{SurfaceError, SurfaceErrorCode};
use crate::transport::Transport;

/// Playback that cannot continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFailure {
    pub class: ErrorClass,
    /// User-facing message
    pub message: String,
    /// Original resource to open outside the player
    pub external_url: Option<String>,
}

impl PlaybackFailure {
    fn new(class: ErrorClass, external_url: Option<&str>) -> Self {
        Self {
            class,
            message: class.message().to_string(),
            external_url: external_url.map(String::from),
        }
    }
}

/// Result of handling one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Non-fatal; the transport deals with it
    Absorbed,
    /// One recovery attempt was made and succeeded
    Recovered(RecoveryAction),
    /// Playback is over for this source
    Terminal(PlaybackFailure),
}

/// Applies the recovery action for an error to a transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// Classify `err` and make at most one recovery attempt.
    pub async fn handle(
        &self,
        err: &TransportError,
        transport: &mut dyn Transport,
        external_url: Option<&str>,
    ) -> RecoveryOutcome {
        let class = classify(err);
        metrics::record_error(class.as_str());
        let action = class.recovery_action();

        let attempt = match action {
            RecoveryAction::Ignore => {
                warn!(
                    transport_id = transport.id(),
                    kind = %err.kind,
                    details = %err.details,
                    "Transient playback error"
                );
                return RecoveryOutcome::Absorbed;
            }
            RecoveryAction::Escalate => {
                warn!(
                    transport_id = transport.id(),
                    kind = %err.kind,
                    details = %err.details,
                    "Unrecoverable playback error"
                );
                return RecoveryOutcome::Terminal(PlaybackFailure::new(class, external_url));
            }
            RecoveryAction::RestartLoad => transport.start_load().await,
            RecoveryAction::RecoverMedia => transport.recover_media().await,
        };

        metrics::record_recovery(action.as_str(), attempt.is_ok());
        match attempt {
            Ok(()) => {
                info!(
                    transport_id = transport.id(),
                    kind = %err.kind,
                    action = action.as_str(),
                    "Recovered from playback error"
                );
                RecoveryOutcome::Recovered(action)
            }
            Err(recovery_err) => {
                warn!(
                    transport_id = transport.id(),
                    kind = %err.kind,
                    action = action.as_str(),
                    error = %recovery_err,
                    "Recovery attempt failed"
                );
                RecoveryOutcome::Terminal(PlaybackFailure::new(class, external_url))
            }
        }
    }

    /// Failure for an error reported by the surface itself.
    pub fn surface_failure(&self, err: &SurfaceError, external_url: Option<&str>) -> PlaybackFailure {
        let class = match err.code {
            SurfaceErrorCode::Network => ErrorClass::Network,
            SurfaceErrorCode::Decode | SurfaceErrorCode::SrcNotSupported => ErrorClass::Media,
            SurfaceErrorCode::Aborted | SurfaceErrorCode::QuotaExceeded | SurfaceErrorCode::Unknown => {
                ErrorClass::Unclassified
            }
        };
        metrics::record_error(class.as_str());
        warn!(code = ?err.code, message = %err.message, "Surface reported an error");
        PlaybackFailure::new(class, external_url)
    }
}
