//! Buffered time ranges on the surface.

/// Sorted, non-overlapping `[start, end)` ranges in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedRanges {
    ranges: Vec<(f64, f64)>,
}

/// Gaps smaller than this are treated as contiguous.
const MERGE_TOLERANCE: f64 = 0.1;

impl BufferedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[(f64, f64)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, position: f64) -> bool {
        self.ranges.iter().any(|&(s, e)| position >= s && position < e)
    }

    /// End of the range containing `position`.
    pub fn end_of_range_containing(&self, position: f64) -> Option<f64> {
        self.ranges
            .iter()
            .find(|&&(s, e)| position >= s && position < e)
            .map(|&(_, e)| e)
    }

    /// Earliest buffered time.
    pub fn start(&self) -> Option<f64> {
        self.ranges.first().map(|&(s, _)| s)
    }

    pub fn add(&mut self, start: f64, end: f64) {
        if end <= start {
            return;
        }
        self.ranges.push((start, end));
        self.ranges.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(self.ranges.len());
        for &(s, e) in &self.ranges {
            match merged.last_mut() {
                Some(last) if s <= last.1 + MERGE_TOLERANCE => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        self.ranges = merged;
    }

    /// Drop everything before `time`.
    pub fn remove_before(&mut self, time: f64) {
        self.ranges.retain(|&(_, e)| e > time);
        if let Some(first) = self.ranges.first_mut() {
            first.0 = first.0.max(time);
        }
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}
