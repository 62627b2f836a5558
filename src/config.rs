//! Pipeline configuration
//!
//! Every tunable constant of the pipeline lives here. All sections carry
//! defaults, so a partial JSON document only overrides the fields it names.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum number of retained samples
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;

/// Default scoring window (15 seconds)
pub const DEFAULT_STRESS_WINDOW_MS: i64 = 15_000;

/// Default hold time before a level downgrade is applied
pub const DEFAULT_DEBOUNCE_MS: i64 = 5000;

/// Default fusion redraw cadence (10 Hz)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Default time for an electrode glow to fade to nothing
pub const DEFAULT_FADE_MS: i64 = 8000;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FluxConfig {
    pub buffer: BufferConfig,
    pub window: WindowConfig,
    pub scoring: ScoringConfig,
    pub levels: LevelConfig,
    pub fusion: FusionConfig,
    pub acquisition: AcquisitionConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Trailing window used for stress scoring
    pub stress_window_ms: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            stress_window_ms: DEFAULT_STRESS_WINDOW_MS,
        }
    }
}

/// Inclusive normalization range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Composite weights
///
/// Applied as-is; the defaults total 0.90, so saturated inputs score 0.90.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub beta_theta: f64,
    pub beta: f64,
    pub beta_alpha: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            beta_theta: 0.40,
            beta: 0.30,
            beta_alpha: 0.20,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.beta_theta + self.beta + self.beta_alpha
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub beta_range: Range,
    pub beta_alpha_range: Range,
    pub beta_theta_range: Range,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            beta_range: Range::new(0.05, 0.35),
            beta_alpha_range: Range::new(0.5, 3.0),
            beta_theta_range: Range::new(0.5, 3.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Intensity at or above which the level is Moderate
    pub moderate_threshold: f64,
    /// Intensity at or above which the level is High
    pub high_threshold: f64,
    /// Minimum time since the last applied change before a downgrade
    pub debounce_ms: i64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            moderate_threshold: 0.4,
            high_threshold: 0.7,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// Static baseline activity per anatomical region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineProfile {
    /// Default cortex activity
    pub normal: f64,
    /// Frontal region (y > frontal_y, z > 0)
    pub frontal: f64,
    /// Top of the head (z > motor_z)
    pub motor: f64,
    /// Posterior region (y < visual_y)
    pub visual: f64,
    pub frontal_y: f64,
    pub motor_z: f64,
    pub visual_y: f64,
}

impl Default for BaselineProfile {
    fn default() -> Self {
        Self {
            normal: 20.0,
            frontal: 20.05,
            motor: 20.0,
            visual: 10.1,
            frontal_y: 40.0,
            motor_z: 60.0,
            visual_y: -40.0,
        }
    }
}

/// Anatomical center of an electrode's influence region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodePlacement {
    pub name: String,
    pub center: [f64; 3],
}

impl ElectrodePlacement {
    pub fn new(name: &str, center: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            center,
        }
    }
}

/// Muse-style four channel montage
pub fn default_placements() -> Vec<ElectrodePlacement> {
    vec![
        ElectrodePlacement::new("AF7", [35.0, 55.0, 30.0]),
        ElectrodePlacement::new("AF8", [-35.0, 55.0, 30.0]),
        ElectrodePlacement::new("TP9", [65.0, -10.0, 0.0]),
        ElectrodePlacement::new("TP10", [-65.0, -10.0, 0.0]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub tick_interval_ms: u64,
    pub fade_ms: i64,
    pub radius: f64,
    /// Effective intensities below this are not painted. Compared on the 0-1
    /// intensity scale before `peak` amplification; 0.01 here matches 0.1 on a
    /// tenfold amplified scale.
    pub paint_epsilon: f64,
    pub baseline: BaselineProfile,
    /// Vertex value at full effective intensity
    pub peak: f64,
    /// Electrodes in processing order; later entries win overlaps
    pub electrodes: Vec<ElectrodePlacement>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            fade_ms: DEFAULT_FADE_MS,
            radius: 30.0,
            paint_epsilon: 0.01,
            baseline: BaselineProfile::default(),
            peak: 85.5,
            electrodes: default_placements(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Channels with delta above this are treated as drowsy
    pub max_delta: f64,
    /// Channels with alpha below this are treated as poor contact
    pub min_alpha: f64,
    /// Trailing values averaged per electrode
    pub electrode_smoothing: usize,
    /// Trailing aggregate beta/alpha values averaged
    pub aggregate_smoothing: usize,
    /// Passing channels required before an aggregate sample is produced
    pub min_aggregate_channels: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_delta: 0.5,
            min_alpha: 0.03,
            electrode_smoothing: 3,
            aggregate_smoothing: 5,
            min_aggregate_channels: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the ingestion channel
    pub channel_capacity: usize,
    /// Re-evaluation cadence while no samples arrive
    pub evaluation_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            evaluation_interval_ms: 1000,
        }
    }
}

impl FluxConfig {
    /// Parse a (possibly partial) JSON configuration and validate it
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: FluxConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ComputeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.buffer.capacity == 0 {
            return Err(invalid("buffer.capacity must be positive"));
        }
        if self.window.stress_window_ms <= 0 {
            return Err(invalid("window.stress_window_ms must be positive"));
        }

        let scoring = &self.scoring;
        let weights = &scoring.weights;
        if [weights.beta_theta, weights.beta, weights.beta_alpha]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(invalid("scoring.weights must be non-negative"));
        }
        if !(weights.sum() > 0.0) {
            return Err(invalid("scoring.weights must not all be zero"));
        }
        for (name, range) in [
            ("beta_range", scoring.beta_range),
            ("beta_alpha_range", scoring.beta_alpha_range),
            ("beta_theta_range", scoring.beta_theta_range),
        ] {
            if !(range.max > range.min) {
                return Err(invalid(&format!("scoring.{} must have max > min", name)));
            }
        }

        let levels = &self.levels;
        if !(0.0..=1.0).contains(&levels.moderate_threshold)
            || !(0.0..=1.0).contains(&levels.high_threshold)
            || levels.moderate_threshold >= levels.high_threshold
        {
            return Err(invalid(
                "levels thresholds must satisfy 0 <= moderate < high <= 1",
            ));
        }
        if levels.debounce_ms < 0 {
            return Err(invalid("levels.debounce_ms must not be negative"));
        }

        let fusion = &self.fusion;
        if fusion.tick_interval_ms == 0 {
            return Err(invalid("fusion.tick_interval_ms must be positive"));
        }
        if fusion.fade_ms <= 0 {
            return Err(invalid("fusion.fade_ms must be positive"));
        }
        if !(fusion.radius > 0.0) {
            return Err(invalid("fusion.radius must be positive"));
        }

        let acquisition = &self.acquisition;
        if acquisition.electrode_smoothing == 0 || acquisition.aggregate_smoothing == 0 {
            return Err(invalid("acquisition smoothing windows must be positive"));
        }

        if self.session.channel_capacity == 0 || self.session.evaluation_interval_ms == 0 {
            return Err(invalid("session capacity and interval must be positive"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ComputeError {
    ComputeError::ConfigError(msg.to_string())
}
