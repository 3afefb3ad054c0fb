//! Rolling jitter statistics: a fixed-capacity circular window of scheduler
//! timing error samples with aggregate mean/stddev/min/max.
//!
//! Insertion is O(1) (overwrite oldest); aggregates are recomputed over the
//! window on every record, so readers always see values consistent with the
//! latest sample. The window is resizable; resizing keeps the most recent
//! samples.

use serde::Serialize;

/// Aggregates over the current window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JitterSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone)]
pub struct JitterStats {
    samples: Vec<f64>,
    capacity: usize,
    /// Next write position in the ring.
    next: usize,
    /// Valid samples, at most `capacity`.
    count: usize,
    summary: JitterSummary,
}

impl JitterStats {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![0.0; capacity],
            capacity,
            next: 0,
            count: 0,
            summary: JitterSummary::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record one sample, overwriting the oldest when the window is full,
    /// and recompute the aggregates.
    pub fn record(&mut self, sample: f64) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % self.capacity;
        self.count = (self.count + 1).min(self.capacity);
        self.recompute();
    }

    /// Last computed aggregates.
    pub fn summary(&self) -> JitterSummary {
        self.summary
    }

    /// Grow or shrink the window to `capacity`, keeping the most recent
    /// `min(capacity, len)` samples.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }
        let recent = self.chronological();
        let keep = recent.len().min(capacity);
        let kept = &recent[recent.len() - keep..];

        let mut samples = vec![0.0; capacity];
        samples[..keep].copy_from_slice(kept);
        self.samples = samples;
        self.capacity = capacity;
        self.count = keep;
        self.next = keep % capacity;
        self.recompute();
    }

    /// Valid samples oldest-first.
    fn chronological(&self) -> Vec<f64> {
        if self.count < self.capacity {
            self.samples[..self.count].to_vec()
        } else {
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.samples[self.next..]);
            out.extend_from_slice(&self.samples[..self.next]);
            out
        }
    }

    fn recompute(&mut self) {
        if self.count == 0 {
            self.summary = JitterSummary::default();
            return;
        }
        let window = self.chronological();
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let std_dev = if window.len() > 1 {
            let variance =
                window.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };
        let min = window.iter().copied().fold(f64::INFINITY, f64::min);
        let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.summary = JitterSummary {
            mean,
            std_dev,
            min,
            max,
            sample_count: window.len(),
        };
    }
}
