//! Core types for the EEG Stress Flux pipeline
//!
//! This module defines the values that flow between stages: samples entering
//! the buffer, window specifications, the discrete stress level and the
//! status/details handed to the display sink.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coerce a raw band value into the non-negative, finite domain.
///
/// Missing, negative and non-finite values all become 0.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// A single multi-band EEG power reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Event time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// Alpha band power
    pub alpha: f64,
    /// Beta band power
    pub beta: f64,
    /// Theta band power
    pub theta: f64,
    /// Beta / alpha power ratio
    pub beta_alpha_ratio: f64,
    /// Beta / theta power ratio
    pub beta_theta_ratio: f64,
}

impl Sample {
    /// Create a sample, coercing every band value through [`sanitize`]
    pub fn new(
        timestamp_ms: i64,
        alpha: f64,
        beta: f64,
        theta: f64,
        beta_alpha_ratio: f64,
        beta_theta_ratio: f64,
    ) -> Self {
        Self {
            timestamp_ms,
            alpha: sanitize(alpha),
            beta: sanitize(beta),
            theta: sanitize(theta),
            beta_alpha_ratio: sanitize(beta_alpha_ratio),
            beta_theta_ratio: sanitize(beta_theta_ratio),
        }
    }

    /// Copy with every band value coerced through [`sanitize`]
    pub fn sanitized(self) -> Self {
        Self::new(
            self.timestamp_ms,
            self.alpha,
            self.beta,
            self.theta,
            self.beta_alpha_ratio,
            self.beta_theta_ratio,
        )
    }

    /// Read a single metric from this sample
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Alpha => self.alpha,
            Metric::Beta => self.beta,
            Metric::Theta => self.theta,
            Metric::BetaAlphaRatio => self.beta_alpha_ratio,
            Metric::BetaThetaRatio => self.beta_theta_ratio,
        }
    }
}

/// Metrics carried by every sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Alpha,
    Beta,
    Theta,
    BetaAlphaRatio,
    BetaThetaRatio,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Alpha,
        Metric::Beta,
        Metric::Theta,
        Metric::BetaAlphaRatio,
        Metric::BetaThetaRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Alpha => "alpha",
            Metric::Beta => "beta",
            Metric::Theta => "theta",
            Metric::BetaAlphaRatio => "beta_alpha_ratio",
            Metric::BetaThetaRatio => "beta_theta_ratio",
        }
    }
}

/// Unit of a window duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "m",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

/// A trailing time window selected by the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub duration: u64,
    pub unit: TimeUnit,
}

impl WindowSpec {
    pub fn new(duration: u64, unit: TimeUnit) -> Self {
        Self { duration, unit }
    }

    pub fn seconds(duration: u64) -> Self {
        Self::new(duration, TimeUnit::Seconds)
    }

    pub fn minutes(duration: u64) -> Self {
        Self::new(duration, TimeUnit::Minutes)
    }

    /// Resolve the window to milliseconds (saturating)
    pub fn to_millis(&self) -> i64 {
        i64::try_from(self.duration)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.unit.millis())
    }

    /// Parse a compact window such as `15s`, `10m`, `6h` or `3d`
    pub fn parse(raw: &str) -> Result<Self, ComputeError> {
        let trimmed = raw.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ComputeError::WindowError(format!("missing unit in '{}'", raw)))?;
        let (digits, suffix) = trimmed.split_at(split);
        let duration: u64 = digits
            .parse()
            .map_err(|_| ComputeError::WindowError(format!("bad duration in '{}'", raw)))?;
        let unit = match suffix {
            "s" | "sec" | "seconds" => TimeUnit::Seconds,
            "m" | "min" | "minutes" => TimeUnit::Minutes,
            "h" | "hours" => TimeUnit::Hours,
            "d" | "days" => TimeUnit::Days,
            other => {
                return Err(ComputeError::WindowError(format!(
                    "unknown unit '{}'",
                    other
                )))
            }
        };
        Ok(Self { duration, unit })
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.duration, self.unit.suffix())
    }
}

/// Discrete stress level, ordered Low < Moderate < High
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    #[default]
    Low,
    Moderate,
    High,
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::Low => "low",
            StressLevel::Moderate => "moderate",
            StressLevel::High => "high",
        }
    }

    /// Human-facing label used by the display sink
    pub fn label(&self) -> &'static str {
        match self {
            StressLevel::Low => "Relaxed",
            StressLevel::Moderate => "Alert",
            StressLevel::High => "Stressed",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supporting metrics sent alongside the level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StressDetails {
    /// Mean beta/alpha ratio over the short scoring window
    pub short_window_avg_beta_alpha: f64,
    /// Mean beta/theta ratio over the short scoring window
    pub short_window_avg_beta_theta: f64,
    /// Composite stress intensity (0-1)
    pub stress_intensity: f64,
}

/// Snapshot of the debounced level with its inputs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StressStatus {
    /// Debounced (displayed) level
    pub level: StressLevel,
    /// Level derived directly from the current intensity
    pub raw_level: StressLevel,
    pub details: StressDetails,
    /// Number of samples inside the scoring window
    pub window_samples: usize,
    pub evaluated_at_ms: i64,
}

/// Emitted whenever the debounced level actually changes value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelChange {
    pub from: StressLevel,
    pub to: StressLevel,
    pub at_ms: i64,
    pub details: StressDetails,
}

/// Per-electrode intensity reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeReading {
    /// Channel name (AF7, AF8, TP9, TP10, ...)
    pub electrode: String,
    /// Stress intensity (0-1)
    pub intensity: f64,
    pub timestamp_ms: i64,
}

impl ElectrodeReading {
    /// Create a reading with the intensity coerced into [0, 1]
    pub fn new(electrode: impl Into<String>, intensity: f64, timestamp_ms: i64) -> Self {
        Self {
            electrode: electrode.into(),
            intensity: sanitize(intensity).min(1.0),
            timestamp_ms,
        }
    }
}
