//! Registry metrics.

use metrics::counter;

/// Metric name constants for consistency.
pub mod names {
    /// Upserts by outcome.
    pub const UPSERTS_TOTAL: &str = "registry_upserts_total";

    /// Status writes refused because they would move a job backward.
    pub const REJECTED_TRANSITIONS_TOTAL: &str = "registry_rejected_transitions_total";
}

/// Record an upsert outcome.
pub fn record_upsert(outcome: &'static str) {
    counter!(names::UPSERTS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a refused backward transition.
pub fn record_rejected_transition(from: &'static str, to: &'static str) {
    counter!(
        names::REJECTED_TRANSITIONS_TOTAL,
        "from" => from,
        "to" => to
    )
    .increment(1);
}

/// Firestore metric names.
pub mod firestore_names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "registry_firestore_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "registry_firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "registry_firestore_latency_seconds";
}

/// Record metrics for a completed Firestore request.
pub fn record_firestore_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        firestore_names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        firestore_names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a Firestore retry attempt.
pub fn record_firestore_retry(operation: &str) {
    counter!(
        firestore_names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
