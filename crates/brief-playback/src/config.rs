//! Segmented transport configuration.

use std::time::Duration;

/// Buffering and retry configuration for the segmented transport.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Seconds of media to keep buffered ahead of the playhead
    pub forward_buffer_secs: f64,
    /// Seconds of media to retain behind the playhead for rewinding
    pub back_buffer_secs: f64,
    /// Demux segments on a blocking worker when the runtime allows it
    pub worker_demux: bool,
    /// Internal retries per segment before the failure becomes fatal
    pub segment_retries: u32,
    /// Base delay between segment retries
    pub retry_delay: Duration,
    /// Fraction of measured throughput a variant may use
    pub abr_safety_factor: f64,
    /// Per-request timeout for manifest and segment fetches
    pub fetch_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            forward_buffer_secs: 30.0,
            back_buffer_secs: 90.0,
            worker_demux: true,
            segment_retries: 3,
            retry_delay: Duration::from_millis(500),
            abr_safety_factor: 0.8,
            fetch_timeout: Duration::from_secs(20),
        }
    }
}

impl BufferConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            forward_buffer_secs: std::env::var("PLAYBACK_FORWARD_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| *v > 0.0)
                .unwrap_or(defaults.forward_buffer_secs),
            back_buffer_secs: std::env::var("PLAYBACK_BACK_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| *v >= 0.0)
                .unwrap_or(defaults.back_buffer_secs),
            worker_demux: std::env::var("PLAYBACK_WORKER_DEMUX")
                .ok()
                .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(defaults.worker_demux),
            segment_retries: std::env::var("PLAYBACK_SEGMENT_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.segment_retries),
            ..defaults
        }
    }
}
