//! Spatial fusion
//!
//! Maps per-electrode intensities onto mesh vertices with independent
//! per-source fade and a fixed-rate redraw, decoupled from data arrival.
//!
//! Tick: baseline reset → per-source fade → region membership → overlay →
//! single frame push to the render target.

pub mod engine;
pub mod mesh;
pub mod regions;
pub mod render;

pub use engine::{FrameStats, FusionEngine};
pub use mesh::Mesh;
pub use regions::{baseline_activity, InfluenceRegion};
pub use render::{Frame, MemoryRenderTarget, NdjsonRenderTarget, RenderError, RenderTarget};
