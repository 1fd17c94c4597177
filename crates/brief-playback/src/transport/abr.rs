//! Adaptive variant selection.

use std::time::Duration;

use crate::manifest::Variant;

/// Weight given to the newest sample.
const EWMA_ALPHA: f64 = 0.3;

/// Transfers shorter than this say little about bandwidth.
const MIN_SAMPLE: Duration = Duration::from_millis(1);

/// Smoothed download throughput, in bits per second.
#[derive(Debug, Clone, Default)]
pub struct ThroughputEstimator {
    estimate: Option<f64>,
    samples: u64,
}

impl ThroughputEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one download of `bytes` taking `elapsed`.
    pub fn record(&mut self, bytes: usize, elapsed: Duration) {
        let elapsed = elapsed.max(MIN_SAMPLE);
        let bps = (bytes as f64 * 8.0) / elapsed.as_secs_f64();
        self.estimate = Some(match self.estimate {
            Some(prev) => EWMA_ALPHA * bps + (1.0 - EWMA_ALPHA) * prev,
            None => bps,
        });
        self.samples += 1;
    }

    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

/// Index of the variant to play.
///
/// Highest bandwidth fitting within `estimate * safety_factor`; the lowest
/// bandwidth when nothing fits or there is no estimate yet.
pub fn select_variant(variants: &[Variant], estimate: Option<f64>, safety_factor: f64) -> Option<usize> {
    let lowest = variants
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| v.bandwidth)
        .map(|(i, _)| i)?;

    let Some(estimate) = estimate else {
        return Some(lowest);
    };
    let budget = estimate * safety_factor;

    let best = variants
        .iter()
        .enumerate()
        .filter(|(_, v)| (v.bandwidth as f64) <= budget)
        .max_by_key(|(_, v)| v.bandwidth)
        .map(|(i, _)| i);

    Some(best.unwrap_or(lowest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(bandwidth: u64) -> Variant {
        Variant {
            uri: format!("https://cdn.example.com/{}.m3u8", bandwidth),
            bandwidth,
            resolution: None,
            codecs: None,
        }
    }

    #[test]
    fn test_ewma() {
        let mut est = ThroughputEstimator::new();
        assert_eq!(est.estimate(), None);

        // 1 MB in 1 s = 8 Mbps
        est.record(1_000_000, Duration::from_secs(1));
        assert_eq!(est.estimate(), Some(8_000_000.0));

        // 2 Mbps sample pulls the estimate down by alpha
        est.record(250_000, Duration::from_secs(1));
        let expected = 0.3 * 2_000_000.0 + 0.7 * 8_000_000.0;
        assert!((est.estimate().unwrap() - expected).abs() < 1.0);
        assert_eq!(est.samples(), 2);
    }

    #[test]
    fn test_select_variant() {
        let variants = vec![variant(2_800_000), variant(800_000), variant(5_000_000)];

        assert_eq!(select_variant(&variants, None, 0.8), Some(1));
        assert_eq!(select_variant(&variants, Some(4_000_000.0), 0.8), Some(0));
        assert_eq!(select_variant(&variants, Some(10_000_000.0), 0.8), Some(2));
        assert_eq!(select_variant(&variants, Some(100_000.0), 0.8), Some(1));
        assert_eq!(select_variant(&[], Some(1.0), 0.8), None);
    }
}
