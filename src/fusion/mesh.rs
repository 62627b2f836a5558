//! Vertex positions of the anatomical mesh
//!
//! Positions are immutable once loaded; intensities live in the engine.

use crate::error::ComputeError;

/// OBJ record tags that carry no vertex position
const SKIPPED_OBJ_TAGS: &[&str] = &[
    "vn", "vt", "vp", "f", "l", "o", "g", "s", "usemtl", "mtllib",
];

/// Static vertex positions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    positions: Vec<[f64; 3]>,
}

impl Mesh {
    pub fn new(positions: Vec<[f64; 3]>) -> Self {
        Self { positions }
    }

    /// Parse vertex lines.
    ///
    /// Accepts bare `x y z` lines and Wavefront/MNI `v x y z` lines. Blank
    /// lines, `#` comments and known OBJ records (`f`, `vn`, ...) are skipped;
    /// any other token is a coordinate and must parse as a finite number.
    pub fn from_xyz_str(text: &str) -> Result<Self, ComputeError> {
        let mut positions = Vec::new();

        for (line_num, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace().peekable();
            let tag = fields.peek().copied();
            match tag {
                Some("v") => {
                    fields.next();
                }
                Some(tag) if SKIPPED_OBJ_TAGS.contains(&tag) => continue,
                _ => {}
            }

            let coords: Vec<f64> = fields
                .take(3)
                .map(|f| f.parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| {
                    ComputeError::MeshError(format!("line {}: {}", line_num + 1, e))
                })?;

            if coords.len() != 3 || coords.iter().any(|c| !c.is_finite()) {
                return Err(ComputeError::MeshError(format!(
                    "line {}: expected three finite coordinates",
                    line_num + 1
                )));
            }
            positions.push([coords[0], coords[1], coords[2]]);
        }

        if positions.is_empty() {
            return Err(ComputeError::MeshError("no vertices found".to_string()));
        }
        Ok(Self { positions })
    }

    /// Deterministic ellipsoid shell roughly the size of an adult cortex.
    ///
    /// Uses a Fibonacci lattice so `count` points are spread evenly; x spans
    /// left/right, y front/back and z bottom/top, in millimetres.
    pub fn synthetic_shell(count: usize) -> Self {
        const SEMI_AXES: [f64; 3] = [70.0, 85.0, 75.0];
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        let n = count.max(1) as f64;

        let positions = (0..count)
            .map(|i| {
                let z = 1.0 - 2.0 * (i as f64 + 0.5) / n;
                let r = (1.0 - z * z).sqrt();
                let theta = golden * i as f64;
                [
                    SEMI_AXES[0] * r * theta.cos(),
                    SEMI_AXES[1] * r * theta.sin(),
                    SEMI_AXES[2] * z,
                ]
            })
            .collect();

        Self { positions }
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_obj_lines() {
        let text = "# brain surface\n1 2 3\n\nv -4.5 5 6\nvn 0 0 1\nf 1 2 3\n";
        let mesh = Mesh::from_xyz_str(text).unwrap();
        assert_eq!(mesh.positions(), &[[1.0, 2.0, 3.0], [-4.5, 5.0, 6.0]]);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = Mesh::from_xyz_str("1 2 3\n1 two 3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = Mesh::from_xyz_str("1 2\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_non_finite_coordinates_rejected() {
        let err = Mesh::from_xyz_str("1 2 3\nnan 1 2\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        let err = Mesh::from_xyz_str("inf 0 0\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));

        let err = Mesh::from_xyz_str("1 2 3\nvertex 1 2 3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert!(Mesh::from_xyz_str("# nothing\n").is_err());
    }

    #[test]
    fn test_synthetic_shell_covers_regions() {
        let mesh = Mesh::synthetic_shell(2000);
        assert_eq!(mesh.len(), 2000);

        let near_af7 = mesh.positions().iter().any(|p| {
            let d = ((p[0] - 35.0).powi(2) + (p[1] - 55.0).powi(2) + (p[2] - 30.0).powi(2)).sqrt();
            d < 30.0
        });
        assert!(near_af7);
        assert_eq!(mesh, Mesh::synthetic_shell(2000));
    }
}
