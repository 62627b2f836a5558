//! Anatomical regions
//!
//! Baseline activity is a piecewise rule over static vertex positions; each
//! electrode influences the vertices within a fixed radius of its center.

use crate::config::{BaselineProfile, ElectrodePlacement};

/// Resting activity for a vertex position.
///
/// Rules apply in order, later ones overriding: default cortex, frontal
/// (y above `frontal_y` and z > 0), top/motor (z above `motor_z`), then
/// posterior/visual (y below `visual_y`).
pub fn baseline_activity(position: &[f64; 3], profile: &BaselineProfile) -> f64 {
    let [_, y, z] = *position;
    let mut activity = profile.normal;
    if y > profile.frontal_y && z > 0.0 {
        activity = profile.frontal;
    }
    if z > profile.motor_z {
        activity = profile.motor;
    }
    if y < profile.visual_y {
        activity = profile.visual;
    }
    activity
}

/// Sphere of influence around one electrode
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceRegion {
    pub electrode: String,
    pub center: [f64; 3],
    pub radius: f64,
}

impl InfluenceRegion {
    pub fn new(placement: &ElectrodePlacement, radius: f64) -> Self {
        Self {
            electrode: placement.name.clone(),
            center: placement.center,
            radius,
        }
    }

    pub fn distance(&self, position: &[f64; 3]) -> f64 {
        self.center
            .iter()
            .zip(position.iter())
            .map(|(c, p)| (p - c).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Strictly inside the radius
    pub fn contains(&self, position: &[f64; 3]) -> bool {
        self.distance(position) < self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_rules() {
        let profile = BaselineProfile::default();
        assert_eq!(baseline_activity(&[0.0, 0.0, 0.0], &profile), 20.0);
        assert_eq!(baseline_activity(&[0.0, 50.0, 10.0], &profile), 20.05);
        // frontal y but below the midline stays default
        assert_eq!(baseline_activity(&[0.0, 50.0, -10.0], &profile), 20.0);
        // motor overrides frontal
        assert_eq!(baseline_activity(&[0.0, 50.0, 70.0], &profile), 20.0);
        assert_eq!(baseline_activity(&[0.0, -60.0, 0.0], &profile), 10.1);
        // visual overrides motor
        assert_eq!(baseline_activity(&[0.0, -60.0, 70.0], &profile), 10.1);
    }

    #[test]
    fn test_region_membership() {
        let region = InfluenceRegion::new(&ElectrodePlacement::new("TP9", [65.0, -10.0, 0.0]), 30.0);
        assert!(region.contains(&[65.0, -10.0, 0.0]));
        assert!(region.contains(&[40.0, -10.0, 0.0]));
        assert!(!region.contains(&[35.0, -10.0, 0.0]));
        assert!(!region.contains(&[-65.0, -10.0, 0.0]));
        assert!((region.distance(&[65.0, -10.0, 30.0]) - 30.0).abs() < 1e-12);
    }
}
