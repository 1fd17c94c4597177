//! Synthesis client metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Provider requests by operation and HTTP status
    pub const REQUESTS_TOTAL: &str = "synthesis_requests_total";

    /// Provider request latency in seconds
    pub const LATENCY_SECONDS: &str = "synthesis_latency_seconds";

    /// Lookups served from a local cache
    pub const CACHE_HITS_TOTAL: &str = "synthesis_cache_hits_total";
}

/// Record a provider request.
pub fn record_request(operation: &'static str, status: &str, latency_ms: f64) {
    counter!(names::REQUESTS_TOTAL, "operation" => operation, "status" => status.to_string())
        .increment(1);
    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_ms / 1000.0);
}

pub fn record_cache_hit(cache: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "cache" => cache).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        record_request("submit", "200", 12.0);
        record_cache_hit("terminal_jobs");
    }
}
