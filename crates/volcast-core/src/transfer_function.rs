//! Piecewise-linear transfer functions mapping scalar values to color and opacity.

use glam::Vec3;

use crate::timestamp::TimeStamp;

/// Opacity values at or below this threshold are left uncorrected.
const OPACITY_EPSILON: f32 = 0.0001;

/// Maps scalar values to RGB colors.
#[derive(Debug, Clone)]
pub struct ColorTransferFunction {
    points: Vec<(f64, Vec3)>,
    mtime: TimeStamp,
}

impl Default for ColorTransferFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorTransferFunction {
    /// Creates an empty function.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            mtime: TimeStamp::now(),
        }
    }

    /// Adds a control point, replacing any existing point at `x`.
    pub fn add_rgb_point(&mut self, x: f64, rgb: Vec3) -> &mut Self {
        insert_sorted(&mut self.points, x, rgb);
        self.mtime.modified();
        self
    }

    /// Removes every control point.
    pub fn remove_all_points(&mut self) {
        self.points.clear();
        self.mtime.modified();
    }

    /// Number of control points.
    #[must_use]
    pub fn size(&self) -> usize {
        self.points.len()
    }

    /// Control points in ascending `x`.
    #[must_use]
    pub fn points(&self) -> &[(f64, Vec3)] {
        &self.points
    }

    /// Last modification time.
    #[must_use]
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }

    /// Seeds a black-to-white ramp over `range` when fewer than two points exist.
    ///
    /// Returns whether points were added.
    pub fn seed_defaults(&mut self, range: (f64, f64)) -> bool {
        if self.points.len() >= 2 {
            return false;
        }
        self.add_rgb_point(range.0, Vec3::ZERO);
        self.add_rgb_point(range.1, Vec3::ONE);
        true
    }

    /// Evaluates the function at `x`, clamping outside the control points.
    #[must_use]
    pub fn color(&self, x: f64) -> Vec3 {
        evaluate(&self.points, x, |a, b, t| a.lerp(b, t as f32)).unwrap_or(Vec3::ZERO)
    }

    /// Samples `width` evenly spaced values across `range` (inclusive).
    #[must_use]
    pub fn table(&self, range: (f64, f64), width: usize) -> Vec<Vec3> {
        sample_positions(range, width).map(|x| self.color(x)).collect()
    }
}

/// Maps scalar values to a single scalar (opacity).
#[derive(Debug, Clone)]
pub struct PiecewiseFunction {
    points: Vec<(f64, f64)>,
    mtime: TimeStamp,
}

impl Default for PiecewiseFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl PiecewiseFunction {
    /// Creates an empty function.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            mtime: TimeStamp::now(),
        }
    }

    /// Adds a control point, replacing any existing point at `x`.
    pub fn add_point(&mut self, x: f64, y: f64) -> &mut Self {
        insert_sorted(&mut self.points, x, y);
        self.mtime.modified();
        self
    }

    /// Removes every control point.
    pub fn remove_all_points(&mut self) {
        self.points.clear();
        self.mtime.modified();
    }

    /// Number of control points.
    #[must_use]
    pub fn size(&self) -> usize {
        self.points.len()
    }

    /// Control points in ascending `x`.
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Last modification time.
    #[must_use]
    pub fn mtime(&self) -> TimeStamp {
        self.mtime
    }

    /// Seeds a transparent-to-half-opaque ramp over `range` when fewer than two
    /// points exist.
    ///
    /// Returns whether points were added.
    pub fn seed_defaults(&mut self, range: (f64, f64)) -> bool {
        if self.points.len() >= 2 {
            return false;
        }
        self.add_point(range.0, 0.0);
        self.add_point(range.1, 0.5);
        true
    }

    /// Evaluates the function at `x`, clamping outside the control points.
    #[must_use]
    pub fn value(&self, x: f64) -> f64 {
        evaluate(&self.points, x, |a, b, t| a + (b - a) * t).unwrap_or(0.0)
    }

    /// Samples `width` evenly spaced values across `range` (inclusive).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn table(&self, range: (f64, f64), width: usize) -> Vec<f32> {
        sample_positions(range, width).map(|x| self.value(x) as f32).collect()
    }
}

/// Rescales an opacity specified per `unit_distance` to one compositing step of
/// `sample_distance`: `1 - (1 - raw)^(sample_distance / unit_distance)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn correct_opacity(raw: f32, sample_distance: f64, unit_distance: f64) -> f32 {
    if raw <= OPACITY_EPSILON || unit_distance <= 0.0 {
        return raw;
    }
    let factor = (sample_distance / unit_distance) as f32;
    1.0 - (1.0 - raw).powf(factor)
}

fn insert_sorted<T>(points: &mut Vec<(f64, T)>, x: f64, value: T) {
    match points.binary_search_by(|(px, _)| px.total_cmp(&x)) {
        Ok(idx) => points[idx].1 = value,
        Err(idx) => points.insert(idx, (x, value)),
    }
}

fn evaluate<T: Copy>(points: &[(f64, T)], x: f64, lerp: impl Fn(T, T, f64) -> T) -> Option<T> {
    let (first, last) = (points.first()?, points.last()?);
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    let upper = points.partition_point(|(px, _)| *px <= x);
    let (x0, v0) = points[upper - 1];
    let (x1, v1) = points[upper];
    let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 0.0 };
    Some(lerp(v0, v1, t))
}

#[allow(clippy::cast_precision_loss)]
fn sample_positions(range: (f64, f64), width: usize) -> impl Iterator<Item = f64> {
    let step = if width > 1 {
        (range.1 - range.0) / (width - 1) as f64
    } else {
        0.0
    };
    (0..width).map(move |i| range.0 + step * i as f64)
}
