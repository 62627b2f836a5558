//! Ingestion record schema
//!
//! Wire shapes accepted from upstream producers:
//! - Aggregate sample rows (the stress time series)
//! - Per-electrode stress readings
//! - Raw per-channel band power frames for the acquisition stage
//!
//! Every field an upstream row may omit is optional here; coercion into the
//! pipeline types happens in one place so downstream code never sees
//! missing or non-finite values.

use crate::error::ComputeError;
use crate::types::{ElectrodeReading, Sample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current record schema version
pub const RECORD_SCHEMA_VERSION: &str = "eeg.stress_record.v1";

/// One aggregate band-power row as stored upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Row creation time (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Event time in ms since the epoch; wins over `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub beta_alpha_ratio: Option<f64>,
    #[serde(default)]
    pub beta_theta_ratio: Option<f64>,
}

impl RawSample {
    pub fn timestamp_ms(&self) -> Option<i64> {
        event_time(self.timestamp_ms, self.created_at)
    }

    /// Coerce into a [`Sample`]; rows without a time are stamped `fallback_now_ms`
    pub fn into_sample(self, fallback_now_ms: i64) -> Sample {
        Sample::new(
            self.timestamp_ms().unwrap_or(fallback_now_ms),
            self.alpha.unwrap_or(0.0),
            self.beta.unwrap_or(0.0),
            self.theta.unwrap_or(0.0),
            self.beta_alpha_ratio.unwrap_or(0.0),
            self.beta_theta_ratio.unwrap_or(0.0),
        )
    }
}

impl From<&Sample> for RawSample {
    fn from(sample: &Sample) -> Self {
        Self {
            created_at: None,
            timestamp_ms: Some(sample.timestamp_ms),
            alpha: Some(sample.alpha),
            beta: Some(sample.beta),
            theta: Some(sample.theta),
            beta_alpha_ratio: Some(sample.beta_alpha_ratio),
            beta_theta_ratio: Some(sample.beta_theta_ratio),
        }
    }
}

/// One per-electrode stress row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawElectrodeReading {
    #[serde(alias = "electrode")]
    pub electrode_name: String,
    #[serde(default, alias = "intensity")]
    pub stress_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_alpha_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_theta_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl RawElectrodeReading {
    pub fn timestamp_ms(&self) -> Option<i64> {
        event_time(self.timestamp_ms, self.created_at)
    }

    /// Coerce into an [`ElectrodeReading`] with intensity clamped to [0, 1]
    pub fn into_reading(self, fallback_now_ms: i64) -> ElectrodeReading {
        let at = self.timestamp_ms().unwrap_or(fallback_now_ms);
        ElectrodeReading::new(self.electrode_name, self.stress_intensity.unwrap_or(0.0), at)
    }
}

/// Band powers of a single channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelBands {
    pub electrode: String,
    #[serde(default)]
    pub delta: f64,
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub alpha: f64,
    #[serde(default)]
    pub beta: f64,
    #[serde(default)]
    pub gamma: f64,
}

/// Raw per-channel band powers captured at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBandFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub channels: Vec<ChannelBands>,
}

impl RawBandFrame {
    pub fn timestamp_ms(&self) -> Option<i64> {
        event_time(self.timestamp_ms, self.created_at)
    }
}

/// Any record accepted on the ingestion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FluxRecord {
    Sample(RawSample),
    Electrode(RawElectrodeReading),
    Bands(RawBandFrame),
}

/// Records split by kind and coerced into pipeline types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub samples: Vec<Sample>,
    pub electrodes: Vec<ElectrodeReading>,
    pub bands: Vec<RawBandFrame>,
}

/// Adapter for parsing ingestion records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<FluxRecord>, ComputeError> {
        let records: Vec<FluxRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON records; blank lines are skipped
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FluxRecord>, ComputeError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            if let Some(record) = Self::parse_line(line, line_num + 1)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Parse a single NDJSON line; `None` for a blank line
    pub fn parse_line(line: &str, line_num: usize) -> Result<Option<FluxRecord>, ComputeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<FluxRecord>(trimmed)
            .map(Some)
            .map_err(|e| {
                ComputeError::ParseError(format!("Failed to parse line {}: {}", line_num, e))
            })
    }

    /// Split records by kind, stamping untimed rows with `fallback_now_ms`
    pub fn split(records: Vec<FluxRecord>, fallback_now_ms: i64) -> RecordBatch {
        let mut batch = RecordBatch::default();
        for record in records {
            match record {
                FluxRecord::Sample(raw) => batch.samples.push(raw.into_sample(fallback_now_ms)),
                FluxRecord::Electrode(raw) => {
                    batch.electrodes.push(raw.into_reading(fallback_now_ms))
                }
                FluxRecord::Bands(frame) => batch.bands.push(frame),
            }
        }
        batch
    }
}

/// Sort a historical batch oldest-first; equal timestamps keep input order
pub fn order_history(mut samples: Vec<Sample>) -> Vec<Sample> {
    samples.sort_by_key(|s| s.timestamp_ms);
    samples
}

fn event_time(timestamp_ms: Option<i64>, created_at: Option<DateTime<Utc>>) -> Option<i64> {
    timestamp_ms.or_else(|| created_at.map(|t| t.timestamp_millis()))
}
