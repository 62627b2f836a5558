//! Fusion engine
//!
//! Owns the vertex intensity array. Every tick rebuilds it from scratch:
//! baselines first, then each active electrode overlays its faded intensity
//! on the vertices inside its region.

use crate::config::{BaselineProfile, FusionConfig};
use crate::electrode::ElectrodeSource;
use crate::fusion::mesh::Mesh;
use crate::fusion::regions::{baseline_activity, InfluenceRegion};
use serde::{Deserialize, Serialize};

/// Summary of one completed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub tick: u64,
    /// Vertices overlaid by at least one source
    pub painted_vertices: usize,
    /// Sources that contributed a non-negligible intensity
    pub active_sources: usize,
}

/// Spatial fusion state
#[derive(Debug, Clone)]
pub struct FusionEngine {
    regions: Vec<InfluenceRegion>,
    baseline: BaselineProfile,
    peak: f64,
    fade_ms: i64,
    paint_epsilon: f64,
    mesh: Option<Mesh>,
    intensities: Vec<f64>,
    tick: u64,
}

impl FusionEngine {
    pub fn new(config: &FusionConfig) -> Self {
        Self {
            regions: config
                .electrodes
                .iter()
                .map(|p| InfluenceRegion::new(p, config.radius))
                .collect(),
            baseline: config.baseline,
            peak: config.peak,
            fade_ms: config.fade_ms.max(1),
            paint_epsilon: config.paint_epsilon,
            mesh: None,
            intensities: Vec::new(),
            tick: 0,
        }
    }

    /// Attach (or replace) the mesh; intensities reset to baseline
    pub fn attach_mesh(&mut self, mesh: Mesh) {
        self.intensities = mesh
            .positions()
            .iter()
            .map(|p| baseline_activity(p, &self.baseline))
            .collect();
        self.mesh = Some(mesh);
    }

    pub fn detach_mesh(&mut self) -> Option<Mesh> {
        self.intensities.clear();
        self.mesh.take()
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn regions(&self) -> &[InfluenceRegion] {
        &self.regions
    }

    /// Intensities produced by the last tick
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Linearly faded intensity of a source at `now_ms`.
    ///
    /// Zero for idle sources and once `fade_ms` has elapsed since the last
    /// reading.
    pub fn effective_intensity(&self, source: &ElectrodeSource, now_ms: i64) -> f64 {
        let Some(elapsed) = source.elapsed_ms(now_ms) else {
            return 0.0;
        };
        if source.intensity <= 0.0 || elapsed >= self.fade_ms {
            return 0.0;
        }
        let fade = 1.0 - elapsed as f64 / self.fade_ms as f64;
        source.intensity * fade
    }

    /// Rebuild the intensity array from `sources` at `now_ms`.
    ///
    /// Returns `None` while no mesh is attached.
    pub fn tick(&mut self, sources: &[ElectrodeSource], now_ms: i64) -> Option<FrameStats> {
        let mesh = self.mesh.as_ref()?;
        let positions = mesh.positions();

        self.intensities.clear();
        self.intensities
            .extend(positions.iter().map(|p| baseline_activity(p, &self.baseline)));

        let mut painted = vec![false; positions.len()];
        let mut active_sources = 0;

        for region in &self.regions {
            let Some(source) = sources.iter().find(|s| s.name == region.electrode) else {
                continue;
            };
            let effective = self.effective_intensity(source, now_ms);
            if effective < self.paint_epsilon {
                continue;
            }
            active_sources += 1;

            for (i, position) in positions.iter().enumerate() {
                if region.contains(position) {
                    let base = baseline_activity(position, &self.baseline);
                    // later regions overwrite earlier ones
                    self.intensities[i] = base + (self.peak - base) * effective;
                    painted[i] = true;
                }
            }
        }

        self.tick += 1;
        Some(FrameStats {
            tick: self.tick,
            painted_vertices: painted.iter().filter(|p| **p).count(),
            active_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElectrodePlacement;
    use pretty_assertions::assert_eq;

    fn source(name: &str, intensity: f64, at: i64) -> ElectrodeSource {
        ElectrodeSource {
            name: name.to_string(),
            intensity,
            last_update_ms: Some(at),
        }
    }

    // one vertex at each default electrode center plus one far away
    fn landmark_mesh() -> Mesh {
        Mesh::new(vec![
            [35.0, 55.0, 30.0],
            [-35.0, 55.0, 30.0],
            [65.0, -10.0, 0.0],
            [-65.0, -10.0, 0.0],
            [0.0, -80.0, 0.0],
        ])
    }

    fn engine() -> FusionEngine {
        let mut engine = FusionEngine::new(&FusionConfig::default());
        engine.attach_mesh(landmark_mesh());
        engine
    }

    #[test]
    fn test_no_mesh_no_frame() {
        let mut engine = FusionEngine::new(&FusionConfig::default());
        assert!(engine.tick(&[], 0).is_none());
        assert!(!engine.has_mesh());
    }

    #[test]
    fn test_idle_sources_give_baseline() {
        let mut engine = engine();
        let stats = engine.tick(&[ElectrodeSource::idle("AF7")], 1_000).unwrap();

        assert_eq!(stats.painted_vertices, 0);
        assert_eq!(stats.active_sources, 0);
        assert_eq!(engine.intensities(), &[20.05, 20.05, 20.0, 20.0, 10.1]);
    }

    #[test]
    fn test_fresh_full_intensity_hits_peak() {
        let mut engine = engine();
        let stats = engine.tick(&[source("TP9", 1.0, 1_000)], 1_000).unwrap();

        assert_eq!(stats.active_sources, 1);
        assert_eq!(stats.painted_vertices, 1);
        assert_eq!(engine.intensities()[2], 85.5);
        assert_eq!(engine.intensities()[3], 20.0);
    }

    #[test]
    fn test_linear_fade() {
        let mut engine = engine();
        engine.tick(&[source("AF7", 1.0, 0)], 4_000).unwrap();
        let expected = 20.05 + (85.5 - 20.05) * 0.5;
        assert!((engine.intensities()[0] - expected).abs() < 1e-9);

        let eff = engine.effective_intensity(&source("AF7", 0.8, 0), 2_000);
        assert!((eff - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_fully_faded_returns_to_baseline() {
        let mut engine = engine();
        engine.tick(&[source("AF8", 1.0, 0)], 8_000).unwrap();
        assert_eq!(engine.intensities()[1], 20.05);

        // below the paint threshold is left untouched
        engine.tick(&[source("AF8", 0.005, 0)], 0).unwrap();
        assert_eq!(engine.intensities()[1], 20.05);
    }

    #[test]
    fn test_paint_threshold_is_on_unit_scale() {
        assert_eq!(FusionConfig::default().paint_epsilon, 0.01);
        let mut engine = engine();

        let stats = engine.tick(&[source("TP9", 0.02, 1_000)], 1_000).unwrap();
        assert_eq!(stats.painted_vertices, 1);
        assert!(engine.intensities()[2] > 20.0);

        let stats = engine.tick(&[source("TP9", 0.009, 1_000)], 1_000).unwrap();
        assert_eq!(stats.painted_vertices, 0);
        assert_eq!(engine.intensities()[2], 20.0);
    }

    #[test]
    fn test_future_reading_counts_as_fresh() {
        let engine = engine();
        let eff = engine.effective_intensity(&source("AF7", 0.7, 5_000), 4_000);
        assert!((eff - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_overlap_last_source_wins() {
        let mut config = FusionConfig::default();
        config.electrodes = vec![
            ElectrodePlacement::new("A", [0.0, 0.0, 0.0]),
            ElectrodePlacement::new("B", [10.0, 0.0, 0.0]),
        ];
        let mut engine = FusionEngine::new(&config);
        engine.attach_mesh(Mesh::new(vec![[5.0, 0.0, 0.0]]));

        let sources = [source("B", 0.5, 0), source("A", 1.0, 0)];
        engine.tick(&sources, 0).unwrap();

        let expected = 20.0 + (85.5 - 20.0) * 0.5;
        assert!((engine.intensities()[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_tick_counter_and_detach() {
        let mut engine = engine();
        engine.tick(&[], 0);
        let stats = engine.tick(&[], 100).unwrap();
        assert_eq!(stats.tick, 2);

        assert!(engine.detach_mesh().is_some());
        assert!(engine.intensities().is_empty());
        assert!(engine.tick(&[], 200).is_none());
    }
}
