//! World-space bounding box of an image block.

use glam::DVec3;

use crate::image_data::Association;

/// Axis-aligned box `[xmin, xmax, ymin, ymax, zmin, zmax]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds(pub [f64; 6]);

impl Bounds {
    /// Minimum corner.
    #[must_use]
    pub fn min(&self) -> DVec3 {
        DVec3::new(self.0[0], self.0[2], self.0[4])
    }

    /// Maximum corner.
    #[must_use]
    pub fn max(&self) -> DVec3 {
        DVec3::new(self.0[1], self.0[3], self.0[5])
    }

    /// Edge lengths per axis.
    #[must_use]
    pub fn lengths(&self) -> DVec3 {
        self.max() - self.min()
    }

    #[must_use]
    pub fn center(&self) -> DVec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Whether every axis is min-before-max.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (0..3).all(|i| self.0[2 * i] <= self.0[2 * i + 1])
    }
}

/// Computes the world-space box covered by an image block.
///
/// With point scalars each axis spans `origin + extent_edge * spacing`. With
/// cell scalars, an edge on the outer boundary of `whole_extent` maps to
/// `origin + edge * spacing`, while an interior edge is pushed half a cell
/// outward so neighbouring blocks meet without gaps or overlap. Negative
/// spacing swaps which extent edge produces the lower bound.
#[must_use]
pub fn compute_bounds(
    extent: [i32; 6],
    whole_extent: [i32; 6],
    spacing: DVec3,
    origin: DVec3,
    association: Association,
) -> Bounds {
    let spacing = spacing.to_array();
    let origin = origin.to_array();
    let mut bounds = [0.0; 6];

    for axis in 0..3 {
        let swap = usize::from(spacing[axis] < 0.0);
        let edges = [extent[2 * axis], extent[2 * axis + 1]];

        let position = |side: usize| -> f64 {
            let edge = f64::from(edges[side]);
            match association {
                Association::Cell if edges[side] != whole_extent[2 * axis + side] => {
                    origin[axis] + (edge + 0.5) * spacing[axis]
                }
                _ => origin[axis] + edge * spacing[axis],
            }
        };

        bounds[2 * axis] = position(swap);
        bounds[2 * axis + 1] = position(1 - swap);
    }

    Bounds(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WHOLE: [i32; 6] = [0, 9, 0, 9, 0, 9];

    #[test]
    fn test_point_bounds_unit_spacing() {
        let b = compute_bounds(WHOLE, WHOLE, DVec3::ONE, DVec3::ZERO, Association::Point);
        assert_eq!(b, Bounds([0.0, 9.0, 0.0, 9.0, 0.0, 9.0]));
    }

    #[test]
    fn test_point_bounds_with_origin_and_spacing() {
        let b = compute_bounds(
            [2, 4, 0, 1, 0, 0],
            [0, 9, 0, 9, 0, 9],
            DVec3::new(0.5, 2.0, 1.0),
            DVec3::new(10.0, -1.0, 3.0),
            Association::Point,
        );
        assert_eq!(b, Bounds([11.0, 12.0, -1.0, 1.0, 3.0, 3.0]));
    }

    #[test]
    fn test_negative_spacing_swaps_edges() {
        let b = compute_bounds(
            WHOLE,
            WHOLE,
            DVec3::new(-1.0, 1.0, -2.0),
            DVec3::ZERO,
            Association::Point,
        );
        assert_eq!(b, Bounds([-9.0, 0.0, 0.0, 9.0, -18.0, 0.0]));
        assert!(b.is_valid());
    }

    #[test]
    fn test_cell_bounds_snap_on_whole_extent() {
        let b = compute_bounds(WHOLE, WHOLE, DVec3::splat(2.0), DVec3::splat(1.0), Association::Cell);
        assert_eq!(b, Bounds([1.0, 19.0, 1.0, 19.0, 1.0, 19.0]));
    }

    #[test]
    fn test_cell_bounds_offset_interior_edges() {
        // Two blocks of one dataset sharing the plane x = 5.
        let left = compute_bounds([0, 5, 0, 9, 0, 9], WHOLE, DVec3::ONE, DVec3::ZERO, Association::Cell);
        let right = compute_bounds([5, 9, 0, 9, 0, 9], WHOLE, DVec3::ONE, DVec3::ZERO, Association::Cell);
        assert_eq!(left.0[0], 0.0);
        assert_eq!(left.0[1], 5.5);
        assert_eq!(right.0[0], 5.5);
        assert_eq!(right.0[1], 9.0);
    }

    #[test]
    fn test_cell_bounds_negative_spacing() {
        let b = compute_bounds([0, 5, 0, 9, 0, 9], WHOLE, DVec3::new(-1.0, 1.0, 1.0), DVec3::ZERO, Association::Cell);
        assert_eq!(b.0[0], -5.5);
        assert_eq!(b.0[1], 0.0);
        assert!(b.is_valid());
    }

    #[test]
    fn test_bounds_accessors() {
        let b = Bounds([0.0, 2.0, -1.0, 1.0, 4.0, 8.0]);
        assert_eq!(b.lengths(), DVec3::new(2.0, 2.0, 4.0));
        assert_eq!(b.center(), DVec3::new(1.0, 0.0, 6.0));
    }

    proptest! {
        #[test]
        fn prop_bounds_are_ordered_and_idempotent(
            lo in -20i32..20,
            len in 0i32..20,
            sx in -4.0f64..4.0,
            sy in -4.0f64..4.0,
            sz in -4.0f64..4.0,
            ox in -100.0f64..100.0,
            cell in any::<bool>(),
        ) {
            let extent = [lo, lo + len, lo, lo + len, lo, lo + len];
            let whole = [lo - 3, lo + len + 3, lo, lo + len, lo - 1, lo + len];
            let association = if cell { Association::Cell } else { Association::Point };
            let spacing = DVec3::new(sx, sy, sz);
            let origin = DVec3::new(ox, -ox, 0.5 * ox);

            let a = compute_bounds(extent, whole, spacing, origin, association);
            let b = compute_bounds(extent, whole, spacing, origin, association);
            prop_assert_eq!(a, b);
            prop_assert!(a.is_valid(), "bounds not ordered: {:?}", a);
        }
    }
}
