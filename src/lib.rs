//! EEG Stress Flux - streaming stress scoring and spatial activity fusion
//!
//! Flux turns a stream of EEG band-power samples into a debounced stress
//! level, and per-electrode stress readings into a fading activity map over
//! an anatomical mesh.
//!
//! ## Paths
//!
//! - **Temporal**: sample buffer → window aggregation → composite score →
//!   level debouncer → status and level changes
//! - **Spatial**: electrode table → fusion engine (fixed tick) → render target
//!
//! The two paths share nothing but the composite scorer and run as separate
//! tasks in a live [`Session`].

pub mod acquisition;
pub mod buffer;
pub mod config;
pub mod debounce;
pub mod electrode;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod scorer;
pub mod session;
pub mod summary;
pub mod types;
pub mod window;

pub use buffer::SampleBuffer;
pub use config::FluxConfig;
pub use debounce::LevelDebouncer;
pub use electrode::{ElectrodeSource, ElectrodeTable};
pub use error::ComputeError;
pub use fusion::{FusionEngine, Mesh, RenderTarget};
pub use pipeline::{replay_samples, ReplayOutcome, StressProcessor};
pub use schema::{FluxRecord, RecordAdapter, RECORD_SCHEMA_VERSION};
pub use scorer::CompositeScorer;
pub use session::{Clock, IngestEvent, ManualClock, Session, SessionHandle, SystemClock};
pub use types::{ElectrodeReading, LevelChange, Sample, StressLevel, StressStatus, WindowSpec};
pub use window::WindowAggregator;

/// Flux version reported by the CLI
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name attached to reports
pub const PRODUCER_NAME: &str = "eeg-stress-flux";
