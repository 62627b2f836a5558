//! Sample buffer
//!
//! Bounded, time-ordered history of incoming samples. Overflow silently drops
//! the oldest entries; downstream stages must tolerate shrinking history.

use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ring buffer of samples ordered by timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    /// Total entries dropped on overflow since creation
    evicted: u64,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl SampleBuffer {
    /// Create an empty buffer retaining at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append a sample, evicting the oldest entry once the cap is exceeded.
    ///
    /// A sample older than the current tail is inserted at its time position
    /// so timestamps stay non-decreasing. In-order arrival is O(1). Band
    /// values are sanitized on entry whatever path built the sample.
    pub fn append(&mut self, sample: Sample) {
        let sample = sample.sanitized();
        match self.samples.back() {
            Some(last) if sample.timestamp_ms < last.timestamp_ms => {
                let idx = self
                    .samples
                    .partition_point(|s| s.timestamp_ms <= sample.timestamp_ms);
                self.samples.insert(idx, sample);
            }
            _ => self.samples.push_back(sample),
        }

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
    }

    /// Append a batch in the order given
    pub fn extend<I: IntoIterator<Item = Sample>>(&mut self, samples: I) {
        for sample in samples {
            self.append(sample);
        }
    }

    /// Read-only view of all retained samples, oldest first
    pub fn snapshot(&self) -> &VecDeque<Sample> {
        &self.samples
    }

    /// Samples with `timestamp_ms >= cutoff_ms`
    pub fn since(&self, cutoff_ms: i64) -> impl Iterator<Item = &Sample> {
        let start = self.samples.partition_point(|s| s.timestamp_ms < cutoff_ms);
        self.samples.range(start..)
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
