//! Proxy cube geometry rasterized to launch one ray per covered pixel.

use glam::Vec3;

use crate::bounds::Bounds;

/// Triangle list of the bounding cube, counter-clockwise seen from outside.
pub const CUBE_INDICES: [u16; 36] = [
    0, 5, 4, 5, 0, 1, // y = min
    3, 7, 6, 3, 6, 2, // y = max
    7, 4, 6, 6, 4, 5, // z = max
    2, 1, 3, 3, 1, 0, // z = min
    3, 0, 7, 7, 0, 4, // x = min
    6, 5, 2, 2, 5, 1, // x = max
];

/// Eight corners and twelve triangles covering a [`Bounds`] box.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeGeometry {
    pub vertices: [Vec3; 8],
    pub indices: [u16; 36],
}

impl CubeGeometry {
    /// Builds the cube for `bounds`.
    ///
    /// Corners 0..4 walk the `z = min` face starting at the min corner, corners
    /// 4..8 repeat the walk on `z = max`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bounds(bounds: &Bounds) -> Self {
        let [x0, x1, y0, y1, z0, z1] = bounds.0.map(|v| v as f32);
        Self {
            vertices: [
                Vec3::new(x0, y0, z0),
                Vec3::new(x1, y0, z0),
                Vec3::new(x1, y1, z0),
                Vec3::new(x0, y1, z0),
                Vec3::new(x0, y0, z1),
                Vec3::new(x1, y0, z1),
                Vec3::new(x1, y1, z1),
                Vec3::new(x0, y1, z1),
            ],
            indices: CUBE_INDICES,
        }
    }

    /// Vertex positions as a flat `xyz` array.
    #[must_use]
    pub fn positions(&self) -> Vec<f32> {
        self.vertices.iter().flat_map(|v| v.to_array()).collect()
    }

    /// Triangles as corner triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.vertices[usize::from(t[0])],
                self.vertices[usize::from(t[1])],
                self.vertices[usize::from(t[2])],
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn unit_cube() -> CubeGeometry {
        CubeGeometry::from_bounds(&Bounds([0.0, 1.0, 0.0, 1.0, 0.0, 1.0]))
    }

    #[test]
    fn test_vertex_order() {
        let cube = CubeGeometry::from_bounds(&Bounds([-1.0, 2.0, -3.0, 4.0, -5.0, 6.0]));
        assert_eq!(cube.vertices[0], Vec3::new(-1.0, -3.0, -5.0));
        assert_eq!(cube.vertices[1], Vec3::new(2.0, -3.0, -5.0));
        assert_eq!(cube.vertices[6], Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(cube.vertices[7], Vec3::new(-1.0, 4.0, 6.0));
        assert_eq!(cube.positions().len(), 24);
    }

    #[test]
    fn test_triangles_face_outward() {
        let cube = unit_cube();
        let center = Vec3::splat(0.5);
        for [a, b, c] in cube.triangles() {
            let normal = (b - a).cross(c - a);
            let to_face = (a + b + c) / 3.0 - center;
            assert!(normal.dot(to_face) > 0.0, "inward triangle {a} {b} {c}");
        }
    }

    #[test]
    fn test_cube_is_closed() {
        // Every edge of a closed, consistently wound mesh appears exactly once
        // in each direction.
        let mut edges: HashMap<(u16, u16), i32> = HashMap::new();
        for t in CUBE_INDICES.chunks_exact(3) {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edges.entry((a, b)).or_default() += 1;
            }
        }
        for (&(a, b), &count) in &edges {
            assert_eq!(count, 1);
            assert_eq!(edges.get(&(b, a)), Some(&1));
        }
        assert_eq!(edges.len(), 36);
    }

    #[test]
    fn test_covers_all_faces_once() {
        let cube = unit_cube();
        let mut area = 0.0;
        for [a, b, c] in cube.triangles() {
            area += 0.5 * (b - a).cross(c - a).length();
        }
        assert!((area - 6.0).abs() < 1e-6);
    }
}
