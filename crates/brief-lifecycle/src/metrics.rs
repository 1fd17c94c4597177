//! Lifecycle metrics.

use metrics::{counter, gauge};

pub mod names {
    /// Status checks by result
    pub const POLLS_TOTAL: &str = "lifecycle_polls_total";

    /// Status checks that failed in transport
    pub const POLL_FAILURES_TOTAL: &str = "lifecycle_poll_failures_total";

    /// Jobs that reached a terminal event, by outcome
    pub const TERMINAL_TOTAL: &str = "lifecycle_terminal_total";

    /// Watches currently polling
    pub const ACTIVE_WATCHES: &str = "lifecycle_active_watches";
}

pub fn record_poll(result: &'static str) {
    counter!(names::POLLS_TOTAL, "result" => result).increment(1);
}

pub fn record_poll_failure() {
    counter!(names::POLL_FAILURES_TOTAL).increment(1);
}

pub fn record_terminal(outcome: &'static str) {
    counter!(names::TERMINAL_TOTAL, "outcome" => outcome).increment(1);
}

pub fn set_active_watches(count: usize) {
    gauge!(names::ACTIVE_WATCHES).set(count as f64);
}
