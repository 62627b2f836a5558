//! Pipeline orchestration
//!
//! Wires the temporal path: buffer → window aggregation → composite score →
//! debounced level. [`StressProcessor`] keeps state across calls for live
//! use; [`replay_samples`] runs a recorded series in one shot.

use crate::buffer::SampleBuffer;
use crate::config::FluxConfig;
use crate::debounce::{LevelDebouncer, Transition};
use crate::error::ComputeError;
use crate::schema::order_history;
use crate::scorer::CompositeScorer;
use crate::types::{LevelChange, Sample, StressDetails, StressStatus};
use crate::window::WindowAggregator;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Stateful processor for the temporal stress path.
///
/// Evaluation time is always supplied by the caller, so the same processor
/// serves live sessions (wall clock) and replays (sample time).
#[derive(Debug, Clone)]
pub struct StressProcessor {
    buffer: SampleBuffer,
    scorer: CompositeScorer,
    debouncer: LevelDebouncer,
    window_ms: i64,
    status: StressStatus,
}

impl StressProcessor {
    /// Create a processor whose debounce interval counts from `started_at_ms`
    pub fn new(config: &FluxConfig, started_at_ms: i64) -> Self {
        Self {
            buffer: SampleBuffer::new(config.buffer.capacity),
            scorer: CompositeScorer::new(&config.scoring),
            debouncer: LevelDebouncer::new(&config.levels, started_at_ms),
            window_ms: config.window.stress_window_ms,
            status: StressStatus {
                evaluated_at_ms: started_at_ms,
                ..StressStatus::default()
            },
        }
    }

    pub fn ingest(&mut self, sample: Sample) {
        self.buffer.append(sample);
    }

    /// Ingest a historical batch, oldest first
    pub fn ingest_history(&mut self, samples: Vec<Sample>) {
        let count = samples.len();
        self.buffer.extend(order_history(samples));
        debug!(count, buffered = self.buffer.len(), "history ingested");
    }

    /// Score the trailing window at `now_ms` and run the debouncer.
    ///
    /// Returns the new status and, when the displayed level changed, the
    /// corresponding [`LevelChange`].
    pub fn evaluate(&mut self, now_ms: i64) -> (StressStatus, Option<LevelChange>) {
        let averages = WindowAggregator::averages(&self.buffer, self.window_ms, now_ms);
        let intensity = self.scorer.score_averages(&averages);
        let raw_level = self.debouncer.thresholds().classify(intensity);

        let details = StressDetails {
            short_window_avg_beta_alpha: averages.beta_alpha_ratio,
            short_window_avg_beta_theta: averages.beta_theta_ratio,
            stress_intensity: intensity,
        };

        let change = match self.debouncer.apply(raw_level, now_ms) {
            Transition::Applied { from, to } => {
                info!(%from, %to, intensity, at_ms = now_ms, "stress level changed");
                Some(LevelChange {
                    from,
                    to,
                    at_ms: now_ms,
                    details,
                })
            }
            Transition::Held {
                pending,
                remaining_ms,
            } => {
                debug!(%pending, remaining_ms, "downgrade held");
                None
            }
            Transition::Steady => None,
        };

        self.status = StressStatus {
            level: self.debouncer.level(),
            raw_level,
            details,
            window_samples: averages.sample_count,
            evaluated_at_ms: now_ms,
        };
        (self.status, change)
    }

    /// Status from the last evaluation
    pub fn status(&self) -> StressStatus {
        self.status
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

/// Outcome of a one-shot replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub samples: usize,
    pub changes: Vec<LevelChange>,
    pub final_status: StressStatus,
}

/// Replay a recorded series.
///
/// Samples are ordered oldest first; after each one the processor is
/// evaluated at that sample's timestamp. The debounce interval counts from
/// the first sample.
pub fn replay_samples(
    samples: Vec<Sample>,
    config: &FluxConfig,
) -> Result<ReplayOutcome, ComputeError> {
    config.validate()?;

    let ordered = order_history(samples);
    let started_at = ordered.first().map(|s| s.timestamp_ms).unwrap_or(0);
    let mut processor = StressProcessor::new(config, started_at);
    let mut changes = Vec::new();

    for sample in &ordered {
        processor.ingest(*sample);
        let (_, change) = processor.evaluate(sample.timestamp_ms);
        changes.extend(change);
    }

    Ok(ReplayOutcome {
        samples: ordered.len(),
        changes,
        final_status: processor.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StressLevel;
    use pretty_assertions::assert_eq;

    fn calm(at: i64) -> Sample {
        Sample::new(at, 0.5, 0.05, 0.4, 0.5, 0.5)
    }

    fn stressed(at: i64) -> Sample {
        Sample::new(at, 0.1, 0.6, 0.1, 3.0, 3.0)
    }

    #[test]
    fn test_empty_buffer_is_low() {
        let mut processor = StressProcessor::new(&FluxConfig::default(), 0);
        let (status, change) = processor.evaluate(10_000);

        assert_eq!(status.level, StressLevel::Low);
        assert_eq!(status.details.stress_intensity, 0.0);
        assert_eq!(status.window_samples, 0);
        assert!(change.is_none());
    }

    #[test]
    fn test_stress_upgrades_immediately() {
        let mut processor = StressProcessor::new(&FluxConfig::default(), 0);
        processor.ingest(stressed(1_000));
        let (status, change) = processor.evaluate(1_000);

        assert_eq!(status.level, StressLevel::High);
        assert!((status.details.stress_intensity - 0.9).abs() < 1e-9);
        assert_eq!(status.details.short_window_avg_beta_alpha, 3.0);
        let change = change.unwrap();
        assert_eq!((change.from, change.to), (StressLevel::Low, StressLevel::High));
    }

    #[test]
    fn test_window_excludes_old_samples() {
        let mut processor = StressProcessor::new(&FluxConfig::default(), 0);
        processor.ingest(stressed(1_000));
        processor.ingest(calm(20_000));
        let (status, _) = processor.evaluate(20_000);

        assert_eq!(status.window_samples, 1);
        assert_eq!(status.raw_level, StressLevel::Low);
        assert_eq!(status.level, StressLevel::Low);
    }

    #[test]
    fn test_history_is_ordered() {
        let mut processor = StressProcessor::new(&FluxConfig::default(), 0);
        processor.ingest_history(vec![calm(3_000), calm(1_000), calm(2_000)]);

        let times: Vec<i64> = processor
            .buffer()
            .snapshot()
            .iter()
            .map(|s| s.timestamp_ms)
            .collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_replay_holds_short_dip() {
        let mut samples = vec![stressed(0)];
        // calm samples arrive but the stressed one stays in the 15s window
        for i in 1..=4 {
            samples.push(calm(i * 1_000));
        }
        // stressed sample has left the window by 16_000
        samples.push(calm(16_000));

        let outcome = replay_samples(samples, &FluxConfig::default()).unwrap();
        let levels: Vec<(StressLevel, StressLevel)> =
            outcome.changes.iter().map(|c| (c.from, c.to)).collect();

        assert_eq!(outcome.samples, 6);
        assert_eq!(levels[0], (StressLevel::Low, StressLevel::High));
        assert_eq!(outcome.final_status.level, StressLevel::Low);
        assert_eq!(outcome.changes.last().unwrap().at_ms, 16_000);
    }

    #[test]
    fn test_saturated_stream_holds_high_through_outlier() {
        let mut processor = StressProcessor::new(&FluxConfig::default(), 0);
        let saturated = |at| Sample::new(at, 0.1, 0.35, 0.1, 3.0, 3.0);

        for at in (0..=15_000).step_by(500) {
            processor.ingest(saturated(at));
            let (status, _) = processor.evaluate(at);
            assert_eq!(status.level, StressLevel::High);
        }
        let saturated_intensity = processor.status().details.stress_intensity;
        assert!((saturated_intensity - 0.9).abs() < 1e-9);

        // one outlier drags the instantaneous average down
        processor.ingest(Sample::new(15_100, 0.0, 0.0, 0.0, 0.0, 0.0));
        let (status, change) = processor.evaluate(15_100);
        assert!(status.details.stress_intensity < saturated_intensity);
        assert_eq!(status.level, StressLevel::High);
        assert!(change.is_none());
    }

    #[test]
    fn test_replay_rejects_bad_config() {
        let mut config = FluxConfig::default();
        config.buffer.capacity = 0;
        assert!(replay_samples(vec![calm(0)], &config).is_err());
    }
}
