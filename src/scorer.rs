//! Composite stress scoring
//!
//! Turns averaged band metrics into a single 0-1 stress intensity. The scorer
//! is a pure function of its inputs: the debouncer path and the electrode
//! path both call it and must agree on identical inputs.

use crate::config::{Range, ScoringConfig, Weights};
use crate::window::WindowAverages;
use serde::{Deserialize, Serialize};

/// Clamp `(value - min) / (max - min)` into [0, 1].
///
/// Values at or below `min` map to 0, at or above `max` map to 1. A
/// degenerate range (max <= min) is a step at `min`.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() || value <= min {
        return 0.0;
    }
    if value >= max || max <= min {
        return 1.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Metrics the composite is computed from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub beta: f64,
    pub beta_alpha_ratio: f64,
    pub beta_theta_ratio: f64,
}

impl From<&WindowAverages> for ScoreInputs {
    fn from(averages: &WindowAverages) -> Self {
        Self {
            beta: averages.beta,
            beta_alpha_ratio: averages.beta_alpha_ratio,
            beta_theta_ratio: averages.beta_theta_ratio,
        }
    }
}

/// Normalized terms and the resulting intensity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub norm_beta: f64,
    pub norm_beta_alpha: f64,
    pub norm_beta_theta: f64,
    pub intensity: f64,
}

/// Weighted composite of normalized beta power and beta ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScorer {
    weights: Weights,
    beta_range: Range,
    beta_alpha_range: Range,
    beta_theta_range: Range,
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl CompositeScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights,
            beta_range: config.beta_range,
            beta_alpha_range: config.beta_alpha_range,
            beta_theta_range: config.beta_theta_range,
        }
    }

    /// Composite intensity in [0, 1]
    pub fn score(&self, inputs: &ScoreInputs) -> f64 {
        self.breakdown(inputs).intensity
    }

    /// Score the averages of a window; an empty window scores 0
    pub fn score_averages(&self, averages: &WindowAverages) -> f64 {
        if averages.is_empty() {
            return 0.0;
        }
        self.score(&ScoreInputs::from(averages))
    }

    /// Normalized terms alongside the intensity
    pub fn breakdown(&self, inputs: &ScoreInputs) -> ScoreBreakdown {
        let norm_beta = normalize(inputs.beta, self.beta_range.min, self.beta_range.max);
        let norm_beta_alpha = normalize(
            inputs.beta_alpha_ratio,
            self.beta_alpha_range.min,
            self.beta_alpha_range.max,
        );
        let norm_beta_theta = normalize(
            inputs.beta_theta_ratio,
            self.beta_theta_range.min,
            self.beta_theta_range.max,
        );

        let intensity = (self.weights.beta_theta * norm_beta_theta
            + self.weights.beta * norm_beta
            + self.weights.beta_alpha * norm_beta_alpha)
            .clamp(0.0, 1.0);

        ScoreBreakdown {
            norm_beta,
            norm_beta_alpha,
            norm_beta_theta,
            intensity,
        }
    }
}
