//! Lifecycle controller configuration.

use std::time::Duration;

/// Polling configuration.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Fixed delay between status checks
    pub poll_interval: Duration,
    /// Consecutive failed checks before the job is reported unreachable
    pub max_consecutive_failures: u32,
    /// Optional wall-clock bound on polling; unset means poll until a
    /// terminal state, cancellation or the failure cutoff
    pub max_poll_duration: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_consecutive_failures: 10,
            max_poll_duration: None,
        }
    }
}

impl LifecycleConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_consecutive_failures: std::env::var("POLL_MAX_CONSECUTIVE_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_consecutive_failures),
            max_poll_duration: std::env::var("POLL_MAX_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_consecutive_failures, 10);
        assert!(config.max_poll_duration.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("POLL_INTERVAL_SECS", "2");
        std::env::set_var("POLL_MAX_CONSECUTIVE_FAILURES", "0");
        std::env::set_var("POLL_MAX_DURATION_SECS", "600");

        let config = LifecycleConfig::from_env();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.max_poll_duration, Some(Duration::from_secs(600)));

        std::env::remove_var("POLL_INTERVAL_SECS");
        std::env::remove_var("POLL_MAX_CONSECUTIVE_FAILURES");
        std::env::remove_var("POLL_MAX_DURATION_SECS");
    }
}
