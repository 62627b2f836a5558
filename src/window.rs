//! Window aggregation
//!
//! Stateless moving averages over a trailing time window of the sample
//! buffer. Each call is independent, so distinct windows (the short scoring
//! window and any display window) never interfere.

use crate::buffer::SampleBuffer;
use crate::types::{Metric, Sample, WindowSpec};
use serde::{Deserialize, Serialize};

/// Means of every metric over one window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowAverages {
    pub alpha: f64,
    pub beta: f64,
    pub theta: f64,
    pub beta_alpha_ratio: f64,
    pub beta_theta_ratio: f64,
    /// Number of samples that fell inside the window
    pub sample_count: usize,
}

impl WindowAverages {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Alpha => self.alpha,
            Metric::Beta => self.beta,
            Metric::Theta => self.theta,
            Metric::BetaAlphaRatio => self.beta_alpha_ratio,
            Metric::BetaThetaRatio => self.beta_theta_ratio,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Aggregator over a shared sample buffer
pub struct WindowAggregator;

impl WindowAggregator {
    /// Mean of `metric` over samples with `timestamp >= now - window_ms`.
    ///
    /// Returns 0 for an empty window.
    pub fn average(buffer: &SampleBuffer, metric: Metric, window_ms: i64, now_ms: i64) -> f64 {
        let (sum, count) = buffer
            .since(cutoff(now_ms, window_ms))
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.metric(metric), count + 1));
        mean(sum, count)
    }

    /// Means of all metrics in a single pass
    pub fn averages(buffer: &SampleBuffer, window_ms: i64, now_ms: i64) -> WindowAverages {
        Self::average_samples(buffer.since(cutoff(now_ms, window_ms)))
    }

    /// Means of all metrics over a consumer-selected window
    pub fn averages_for(buffer: &SampleBuffer, window: WindowSpec, now_ms: i64) -> WindowAverages {
        Self::averages(buffer, window.to_millis(), now_ms)
    }

    /// Means of all metrics over an arbitrary sample sequence
    pub fn average_samples<'a>(samples: impl Iterator<Item = &'a Sample>) -> WindowAverages {
        let mut totals = [0.0f64; 5];
        let mut count = 0usize;
        for sample in samples {
            for (total, metric) in totals.iter_mut().zip(Metric::ALL) {
                *total += sample.metric(metric);
            }
            count += 1;
        }

        WindowAverages {
            alpha: mean(totals[0], count),
            beta: mean(totals[1], count),
            theta: mean(totals[2], count),
            beta_alpha_ratio: mean(totals[3], count),
            beta_theta_ratio: mean(totals[4], count),
            sample_count: count,
        }
    }
}

fn cutoff(now_ms: i64, window_ms: i64) -> i64 {
    now_ms.saturating_sub(window_ms.max(0))
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
