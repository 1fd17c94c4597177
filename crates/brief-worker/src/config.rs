//! Worker configuration.

use std::net::SocketAddr;

use brief_models::{BriefingKind, GenerationRequest};

use crate::error::{WorkerError, WorkerResult};

/// A briefing to submit at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSpec {
    pub persona_id: String,
    pub script: String,
    pub name: Option<String>,
    pub bill_id: Option<String>,
}

impl SubmitSpec {
    pub fn to_request(&self, requester_id: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new(requester_id, &self.persona_id, &self.script);
        if let Some(name) = &self.name {
            request = request.with_name(name);
        }
        if let Some(bill) = &self.bill_id {
            request = request.with_bill(bill, BriefingKind::OneOff);
        }
        request
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// User whose jobs are resumed and who owns submitted briefings
    pub requester_id: String,
    /// Resume polling of the requester's unfinished jobs
    pub resume_pending: bool,
    /// Maximum number of pending jobs to resume
    pub resume_limit: usize,
    /// Briefing to submit, if any
    pub submit: Option<SubmitSpec>,
    /// Prometheus listener address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            requester_id: String::new(),
            resume_pending: true,
            resume_limit: 50,
            submit: None,
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// `BRIEF_SCRIPT` takes precedence over `BRIEF_SCRIPT_FILE`. A script
    /// without `BRIEF_PERSONA_ID` is a configuration error.
    pub fn from_env() -> WorkerResult<Self> {
        let requester_id = std::env::var("BRIEF_REQUESTER_ID")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if requester_id.is_empty() {
            return Err(WorkerError::ConfigError(
                "BRIEF_REQUESTER_ID is required".to_string(),
            ));
        }

        let script = match std::env::var("BRIEF_SCRIPT").ok().filter(|s| !s.trim().is_empty()) {
            Some(script) => Some(script),
            None => match std::env::var("BRIEF_SCRIPT_FILE").ok() {
                Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                    WorkerError::ConfigError(format!("cannot read script file {}: {}", path, e))
                })?),
                None => None,
            },
        };

        let submit = match script {
            Some(script) => {
                let persona_id = std::env::var("BRIEF_PERSONA_ID")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| {
                        WorkerError::ConfigError(
                            "BRIEF_PERSONA_ID is required to submit a script".to_string(),
                        )
                    })?;
                Some(SubmitSpec {
                    persona_id,
                    script,
                    name: std::env::var("BRIEF_NAME").ok(),
                    bill_id: std::env::var("BRIEF_BILL_ID").ok(),
                })
            }
            None => None,
        };

        let metrics_addr = std::env::var("METRICS_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)));

        Ok(Self {
            requester_id,
            resume_pending: std::env::var("BRIEF_RESUME_PENDING")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            resume_limit: std::env::var("BRIEF_RESUME_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            submit,
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "BRIEF_REQUESTER_ID",
        "BRIEF_SCRIPT",
        "BRIEF_SCRIPT_FILE",
        "BRIEF_PERSONA_ID",
        "BRIEF_NAME",
        "BRIEF_BILL_ID",
        "BRIEF_RESUME_PENDING",
        "METRICS_PORT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_requester_required() {
        clear_env();
        assert!(matches!(
            WorkerConfig::from_env(),
            Err(WorkerError::ConfigError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_resume_only() {
        clear_env();
        std::env::set_var("BRIEF_REQUESTER_ID", "alice");
        std::env::set_var("METRICS_PORT", "9100");

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.requester_id, "alice");
        assert!(config.resume_pending);
        assert!(config.submit.is_none());
        assert_eq!(config.metrics_addr.map(|a| a.port()), Some(9100));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_script_needs_persona() {
        clear_env();
        std::env::set_var("BRIEF_REQUESTER_ID", "alice");
        std::env::set_var("BRIEF_SCRIPT", "HB 12 raises the fuel tax.");
        assert!(WorkerConfig::from_env().is_err());

        std::env::set_var("BRIEF_PERSONA_ID", "anna");
        std::env::set_var("BRIEF_BILL_ID", "HB-12");
        let config = WorkerConfig::from_env().unwrap();
        let request = config.submit.unwrap().to_request(&config.requester_id);
        assert_eq!(request.persona_id, "anna");
        assert_eq!(request.display_name(), "Briefing: HB-12");
        clear_env();
    }
}
