//! Level debouncing
//!
//! Converts the continuous intensity into a stable discrete level using
//! asymmetric hysteresis: upgrades apply immediately, downgrades only once the
//! debounce interval has elapsed since the last applied change.

use crate::config::LevelConfig;
use crate::types::StressLevel;
use serde::{Deserialize, Serialize};

/// Intensity cut points for the raw level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self::from(&LevelConfig::default())
    }
}

impl From<&LevelConfig> for LevelThresholds {
    fn from(config: &LevelConfig) -> Self {
        Self {
            moderate: config.moderate_threshold,
            high: config.high_threshold,
        }
    }
}

impl LevelThresholds {
    /// Raw level for an intensity: High if >= high, Moderate if >= moderate
    pub fn classify(&self, intensity: f64) -> StressLevel {
        if intensity >= self.high {
            StressLevel::High
        } else if intensity >= self.moderate {
            StressLevel::Moderate
        } else {
            StressLevel::Low
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Raw level equals the displayed level
    Steady,
    /// Displayed level changed
    Applied { from: StressLevel, to: StressLevel },
    /// A downgrade is pending until the interval elapses
    Held { pending: StressLevel, remaining_ms: i64 },
}

/// Hysteresis state machine over [`StressLevel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDebouncer {
    thresholds: LevelThresholds,
    debounce_ms: i64,
    displayed: StressLevel,
    last_change_ms: i64,
}

impl LevelDebouncer {
    /// Start in `Low`, counting the debounce interval from `started_at_ms`
    pub fn new(config: &LevelConfig, started_at_ms: i64) -> Self {
        Self {
            thresholds: LevelThresholds::from(config),
            debounce_ms: config.debounce_ms.max(0),
            displayed: StressLevel::Low,
            last_change_ms: started_at_ms,
        }
    }

    pub fn level(&self) -> StressLevel {
        self.displayed
    }

    pub fn last_change_ms(&self) -> i64 {
        self.last_change_ms
    }

    pub fn thresholds(&self) -> &LevelThresholds {
        &self.thresholds
    }

    /// Feed a freshly scored intensity observed at `now_ms`
    pub fn update(&mut self, intensity: f64, now_ms: i64) -> Transition {
        let raw = self.thresholds.classify(intensity);
        self.apply(raw, now_ms)
    }

    /// Feed an already classified raw level
    pub fn apply(&mut self, raw: StressLevel, now_ms: i64) -> Transition {
        if raw == self.displayed {
            return Transition::Steady;
        }

        if raw < self.displayed {
            let elapsed = now_ms.saturating_sub(self.last_change_ms);
            if elapsed < self.debounce_ms {
                return Transition::Held {
                    pending: raw,
                    remaining_ms: self.debounce_ms - elapsed,
                };
            }
        }

        let from = self.displayed;
        self.displayed = raw;
        self.last_change_ms = now_ms;
        Transition::Applied { from, to: raw }
    }
}
