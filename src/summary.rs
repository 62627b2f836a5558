//! Window summaries
//!
//! Display-oriented views over a trailing window: mean band powers and the
//! distribution of beta/alpha ratios across mood buckets.

use crate::buffer::SampleBuffer;
use crate::types::{Sample, WindowSpec};
use crate::window::WindowAggregator;
use serde::{Deserialize, Serialize};

/// Mean band powers over a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub window: WindowSpec,
    pub sample_count: usize,
    /// True when no sample fell inside the window; all means are then 0
    pub no_data: bool,
    pub alpha: f64,
    pub beta: f64,
    pub theta: f64,
    pub beta_alpha_ratio: f64,
    pub beta_theta_ratio: f64,
}

impl BandSummary {
    /// Summarize samples with `timestamp >= now - window`
    pub fn from_samples(samples: &[Sample], window: WindowSpec, now_ms: i64) -> Self {
        let cutoff = now_ms.saturating_sub(window.to_millis());
        let averages =
            WindowAggregator::average_samples(samples.iter().filter(|s| s.timestamp_ms >= cutoff));
        Self {
            window,
            sample_count: averages.sample_count,
            no_data: averages.is_empty(),
            alpha: averages.alpha,
            beta: averages.beta,
            theta: averages.theta,
            beta_alpha_ratio: averages.beta_alpha_ratio,
            beta_theta_ratio: averages.beta_theta_ratio,
        }
    }

    pub fn from_buffer(buffer: &SampleBuffer, window: WindowSpec, now_ms: i64) -> Self {
        let cutoff = now_ms.saturating_sub(window.to_millis());
        let samples: Vec<Sample> = buffer.since(cutoff).copied().collect();
        Self::from_samples(&samples, window, now_ms)
    }
}

/// Mood bucket over the beta/alpha ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Relaxed,
    Focused,
    Alert,
    Stressed,
    Anxious,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Relaxed,
        Mood::Focused,
        Mood::Alert,
        Mood::Stressed,
        Mood::Anxious,
    ];

    pub fn classify(beta_alpha_ratio: f64) -> Self {
        match beta_alpha_ratio {
            r if r < 0.8 => Mood::Relaxed,
            r if r < 1.1 => Mood::Focused,
            r if r < 1.4 => Mood::Alert,
            r if r < 1.8 => Mood::Stressed,
            _ => Mood::Anxious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Relaxed => "Relaxed",
            Mood::Focused => "Focused",
            Mood::Alert => "Alert",
            Mood::Stressed => "Stressed",
            Mood::Anxious => "Anxious",
        }
    }
}

/// One bucket of the distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodBucket {
    pub mood: Mood,
    pub count: usize,
    /// Mean ratio in the bucket ×100; 0 when empty
    pub value: f64,
}

/// Beta/alpha ratios bucketed by mood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodDistribution {
    pub window: WindowSpec,
    pub buckets: Vec<MoodBucket>,
}

impl MoodDistribution {
    pub fn from_samples(samples: &[Sample], window: WindowSpec, now_ms: i64) -> Self {
        let cutoff = now_ms.saturating_sub(window.to_millis());
        let mut sums = [0.0f64; 5];
        let mut counts = [0usize; 5];

        for sample in samples.iter().filter(|s| s.timestamp_ms >= cutoff) {
            let ratio = sample.beta_alpha_ratio;
            let idx = Mood::classify(ratio) as usize;
            sums[idx] += ratio;
            counts[idx] += 1;
        }

        let buckets = Mood::ALL
            .iter()
            .enumerate()
            .map(|(i, mood)| MoodBucket {
                mood: *mood,
                count: counts[i],
                value: if counts[i] == 0 {
                    0.0
                } else {
                    sums[i] / counts[i] as f64 * 100.0
                },
            })
            .collect();

        Self { window, buckets }
    }

    pub fn bucket(&self, mood: Mood) -> Option<&MoodBucket> {
        self.buckets.iter().find(|b| b.mood == mood)
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(at: i64, ratio: f64) -> Sample {
        Sample::new(at, 0.2, 0.2 * ratio, 0.1, ratio, 2.0)
    }

    #[test]
    fn test_band_summary_window() {
        let samples = vec![sample(0, 1.0), sample(550_000, 1.0), sample(600_000, 2.0)];
        let summary = BandSummary::from_samples(&samples, WindowSpec::minutes(1), 600_000);

        assert_eq!(summary.sample_count, 2);
        assert!(!summary.no_data);
        assert!((summary.beta_alpha_ratio - 1.5).abs() < 1e-12);
        assert_eq!(summary.beta_theta_ratio, 2.0);
    }

    #[test]
    fn test_band_summary_no_data() {
        let summary = BandSummary::from_samples(&[sample(0, 1.0)], WindowSpec::seconds(15), 60_000);
        assert!(summary.no_data);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.alpha, 0.0);
    }

    #[test]
    fn test_summary_from_buffer() {
        let mut buffer = SampleBuffer::new(10);
        buffer.extend([sample(1_000, 0.5), sample(20_000, 1.5)]);
        let summary = BandSummary::from_buffer(&buffer, WindowSpec::seconds(15), 20_000);
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.beta_alpha_ratio, 1.5);
    }

    #[test]
    fn test_mood_classify_boundaries() {
        assert_eq!(Mood::classify(0.79), Mood::Relaxed);
        assert_eq!(Mood::classify(0.8), Mood::Focused);
        assert_eq!(Mood::classify(1.1), Mood::Alert);
        assert_eq!(Mood::classify(1.4), Mood::Stressed);
        assert_eq!(Mood::classify(1.8), Mood::Anxious);
    }

    #[test]
    fn test_mood_distribution() {
        let samples = vec![sample(0, 0.5), sample(1, 0.7), sample(2, 1.5), sample(3, 2.5)];
        let dist = MoodDistribution::from_samples(&samples, WindowSpec::seconds(10), 3);

        assert_eq!(dist.total(), 4);
        let relaxed = dist.bucket(Mood::Relaxed).unwrap();
        assert_eq!(relaxed.count, 2);
        assert!((relaxed.value - 60.0).abs() < 1e-9);
        assert_eq!(dist.bucket(Mood::Focused).unwrap().value, 0.0);
        assert_eq!(dist.bucket(Mood::Anxious).unwrap().value, 250.0);
    }
}
