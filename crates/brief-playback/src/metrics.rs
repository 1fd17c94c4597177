//! Playback metrics.

use metrics::{counter, gauge};

pub mod names {
    /// Classified transport and surface errors
    pub const ERRORS_TOTAL: &str = "playback_errors_total";

    /// Recovery attempts by action and result
    pub const RECOVERIES_TOTAL: &str = "playback_recoveries_total";

    /// Segments appended to a surface
    pub const SEGMENTS_APPENDED_TOTAL: &str = "playback_segments_appended_total";

    /// Segment fetch retries inside the transport
    pub const SEGMENT_RETRIES_TOTAL: &str = "playback_segment_retries_total";

    /// Transports constructed and not yet released
    pub const ACTIVE_TRANSPORTS: &str = "playback_active_transports";
}

pub fn record_error(class: &'static str) {
    counter!(names::ERRORS_TOTAL, "class" => class).increment(1);
}

pub fn record_recovery(action: &'static str, succeeded: bool) {
    let result = if succeeded { "ok" } else { "failed" };
    counter!(names::RECOVERIES_TOTAL, "action" => action, "result" => result).increment(1);
}

pub fn record_segment_appended(variant_bandwidth: u64) {
    counter!(names::SEGMENTS_APPENDED_TOTAL, "bandwidth" => variant_bandwidth.to_string())
        .increment(1);
}

pub fn record_segment_retry() {
    counter!(names::SEGMENT_RETRIES_TOTAL).increment(1);
}

pub fn transport_created() {
    gauge!(names::ACTIVE_TRANSPORTS).increment(1.0);
}

pub fn transport_released() {
    gauge!(names::ACTIVE_TRANSPORTS).decrement(1.0);
}
