//! Acquisition stage
//!
//! Turns raw per-channel band powers into per-electrode stress readings and
//! an aggregate [`Sample`]. Channels failing a quality gate are dropped from
//! both outputs.

use crate::config::{AcquisitionConfig, ScoringConfig};
use crate::schema::{ChannelBands, RawBandFrame};
use crate::scorer::{CompositeScorer, ScoreInputs};
use crate::types::{ElectrodeReading, Sample};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Why a channel was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Delta power above the drowsiness gate
    Drowsy,
    /// Alpha power below the contact gate
    PoorContact,
    /// A band value was negative or non-finite
    InvalidBands,
}

/// Running counters across processed frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub frames: u64,
    pub accepted_channels: u64,
    pub drowsy: u64,
    pub poor_contact: u64,
    pub invalid_bands: u64,
    pub aggregates: u64,
}

/// Result of processing one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionOutput {
    pub readings: Vec<ElectrodeReading>,
    /// Present only when enough channels passed
    pub sample: Option<Sample>,
    pub rejected: Vec<(String, RejectReason)>,
}

/// Stateful band-power to stress converter
#[derive(Debug, Clone)]
pub struct Acquisition {
    config: AcquisitionConfig,
    scorer: CompositeScorer,
    electrode_history: HashMap<String, VecDeque<f64>>,
    aggregate_history: VecDeque<f64>,
    stats: AcquisitionStats,
}

impl Acquisition {
    pub fn new(config: &AcquisitionConfig, scoring: &ScoringConfig) -> Self {
        Self {
            config: config.clone(),
            scorer: CompositeScorer::new(scoring),
            electrode_history: HashMap::new(),
            aggregate_history: VecDeque::new(),
            stats: AcquisitionStats::default(),
        }
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    /// Quality gate for one channel
    pub fn check(&self, channel: &ChannelBands) -> Result<(), RejectReason> {
        let bands = [
            channel.delta,
            channel.theta,
            channel.alpha,
            channel.beta,
            channel.gamma,
        ];
        if bands.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(RejectReason::InvalidBands);
        }
        if channel.delta > self.config.max_delta {
            return Err(RejectReason::Drowsy);
        }
        if channel.alpha < self.config.min_alpha {
            return Err(RejectReason::PoorContact);
        }
        Ok(())
    }

    /// Process one frame; untimed frames are stamped `fallback_now_ms`
    pub fn process(&mut self, frame: &RawBandFrame, fallback_now_ms: i64) -> AcquisitionOutput {
        let at = frame.timestamp_ms().unwrap_or(fallback_now_ms);
        let mut output = AcquisitionOutput::default();
        let mut passing: Vec<&ChannelBands> = Vec::new();

        self.stats.frames += 1;

        for channel in &frame.channels {
            if let Err(reason) = self.check(channel) {
                debug!(electrode = %channel.electrode, ?reason, "channel rejected");
                match reason {
                    RejectReason::Drowsy => self.stats.drowsy += 1,
                    RejectReason::PoorContact => self.stats.poor_contact += 1,
                    RejectReason::InvalidBands => self.stats.invalid_bands += 1,
                }
                output.rejected.push((channel.electrode.clone(), reason));
                continue;
            }
            self.stats.accepted_channels += 1;

            let raw = self.scorer.score(&ScoreInputs {
                beta: channel.beta,
                beta_alpha_ratio: ratio(channel.beta, channel.alpha),
                beta_theta_ratio: ratio(channel.beta, channel.theta),
            });
            let history = self
                .electrode_history
                .entry(channel.electrode.clone())
                .or_default();
            let smoothed = push_mean(history, raw, self.config.electrode_smoothing);
            output
                .readings
                .push(ElectrodeReading::new(channel.electrode.as_str(), smoothed, at));
            passing.push(channel);
        }

        if passing.len() >= self.config.min_aggregate_channels.max(1) {
            let n = passing.len() as f64;
            let alpha = passing.iter().map(|c| c.alpha).sum::<f64>() / n;
            let beta = passing.iter().map(|c| c.beta).sum::<f64>() / n;
            let theta = passing.iter().map(|c| c.theta).sum::<f64>() / n;

            let beta_alpha = push_mean(
                &mut self.aggregate_history,
                ratio(beta, alpha),
                self.config.aggregate_smoothing,
            );
            output.sample = Some(Sample::new(
                at,
                alpha,
                beta,
                theta,
                beta_alpha,
                ratio(beta, theta),
            ));
            self.stats.aggregates += 1;
        }

        output
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Append `value`, keep the last `window` values and return their mean
fn push_mean(history: &mut VecDeque<f64>, value: f64, window: usize) -> f64 {
    history.push_back(value);
    while history.len() > window.max(1) {
        history.pop_front();
    }
    history.iter().sum::<f64>() / history.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel(name: &str, delta: f64, theta: f64, alpha: f64, beta: f64) -> ChannelBands {
        ChannelBands {
            electrode: name.to_string(),
            delta,
            theta,
            alpha,
            beta,
            gamma: 0.05,
        }
    }

    fn frame(at: i64, channels: Vec<ChannelBands>) -> RawBandFrame {
        RawBandFrame {
            created_at: None,
            timestamp_ms: Some(at),
            channels,
        }
    }

    fn acquisition() -> Acquisition {
        Acquisition::new(&AcquisitionConfig::default(), &ScoringConfig::default())
    }

    #[test]
    fn test_quality_gates() {
        let acq = acquisition();
        assert_eq!(acq.check(&channel("AF7", 0.6, 0.1, 0.2, 0.2)), Err(RejectReason::Drowsy));
        assert_eq!(
            acq.check(&channel("AF7", 0.1, 0.1, 0.02, 0.2)),
            Err(RejectReason::PoorContact)
        );
        assert_eq!(
            acq.check(&channel("AF7", f64::NAN, 0.1, 0.2, 0.2)),
            Err(RejectReason::InvalidBands)
        );
        assert_eq!(acq.check(&channel("AF7", 0.5, 0.1, 0.03, 0.2)), Ok(()));
    }

    #[test]
    fn test_aggregate_requires_two_channels() {
        let mut acq = acquisition();
        let out = acq.process(
            &frame(
                1_000,
                vec![
                    channel("AF7", 0.1, 0.2, 0.2, 0.3),
                    channel("AF8", 0.9, 0.2, 0.2, 0.3),
                ],
            ),
            0,
        );

        assert_eq!(out.readings.len(), 1);
        assert!(out.sample.is_none());
        assert_eq!(out.rejected, vec![("AF8".to_string(), RejectReason::Drowsy)]);
        assert_eq!(acq.stats().drowsy, 1);
    }

    #[test]
    fn test_aggregate_sample_means() {
        let mut acq = acquisition();
        let out = acq.process(
            &frame(
                2_000,
                vec![
                    channel("TP9", 0.1, 0.2, 0.2, 0.2),
                    channel("TP10", 0.1, 0.2, 0.4, 0.4),
                ],
            ),
            0,
        );

        let sample = out.sample.unwrap();
        assert_eq!(sample.timestamp_ms, 2_000);
        assert!((sample.alpha - 0.3).abs() < 1e-12);
        assert!((sample.beta - 0.3).abs() < 1e-12);
        assert!((sample.beta_alpha_ratio - 1.0).abs() < 1e-12);
        assert!((sample.beta_theta_ratio - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_electrode_smoothing() {
        let mut acq = acquisition();
        let scorer = CompositeScorer::default();
        let high = channel("AF7", 0.1, 0.05, 0.1, 0.5);
        let low = channel("AF7", 0.1, 0.5, 0.5, 0.05);
        let score = |c: &ChannelBands| {
            scorer.score(&ScoreInputs {
                beta: c.beta,
                beta_alpha_ratio: c.beta / c.alpha,
                beta_theta_ratio: c.beta / c.theta,
            })
        };

        acq.process(&frame(0, vec![high.clone()]), 0);
        let out = acq.process(&frame(1, vec![low.clone()]), 0);
        let expected = (score(&high) + score(&low)) / 2.0;
        assert!((out.readings[0].intensity - expected).abs() < 1e-12);

        // window of three drops the oldest value
        acq.process(&frame(2, vec![low.clone()]), 0);
        let out = acq.process(&frame(3, vec![low.clone()]), 0);
        assert!((out.readings[0].intensity - score(&low)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_frame_yields_nothing() {
        let mut acq = acquisition();
        let out = acq.process(&frame(0, Vec::new()), 0);
        assert_eq!(out, AcquisitionOutput::default());
        assert_eq!(acq.stats().frames, 1);
    }
}
