//! Procedural jitter noise for ray start offsets.
//!
//! The ray caster offsets each ray's first sample by a value looked up from a
//! small tiled 2D texture to hide wood-grain artifacts. The grid is generated
//! once and cached; it only changes if the device's size limit forces a
//! different edge length.

use ::noise::{NoiseFn, Perlin};
use glam::DVec3;

/// A deterministic scalar field sampled at lattice coordinates.
pub trait NoiseFunction {
    /// Called before a grid of edge `size` is generated.
    fn prepare(&mut self, _size: u32) {}

    /// Value at `(x, y, z)`.
    fn evaluate(&self, x: f64, y: f64, z: f64) -> f64;
}

/// Perlin noise with frequency, phase and amplitude:
/// `amplitude * perlin(p * frequency - phase)`.
#[derive(Debug, Clone)]
pub struct PerlinNoise {
    perlin: Perlin,
    pub frequency: DVec3,
    pub phase: DVec3,
    pub amplitude: f64,
}

impl PerlinNoise {
    pub const DEFAULT_SEED: u32 = 0;

    /// Perlin noise with unit frequency, zero phase and the given amplitude.
    pub fn new(seed: u32, amplitude: f64) -> Self {
        Self {
            perlin: Perlin::new(seed),
            frequency: DVec3::ONE,
            phase: DVec3::ZERO,
            amplitude,
        }
    }

    pub fn with_frequency(mut self, frequency: DVec3) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_phase(mut self, phase: DVec3) -> Self {
        self.phase = phase;
        self
    }
}

impl Default for PerlinNoise {
    fn default() -> Self {
        // Perlin noise vanishes on integer lattice points, so the default
        // phase moves samples onto half-integer coordinates.
        Self::new(Self::DEFAULT_SEED, 0.5 * 0.1).with_phase(DVec3::new(0.5, 0.5, 0.0))
    }
}

impl NoiseFunction for PerlinNoise {
    fn prepare(&mut self, size: u32) {
        self.frequency = DVec3::new(f64::from(size), 1.0, 1.0);
    }

    fn evaluate(&self, x: f64, y: f64, z: f64) -> f64 {
        let p = DVec3::new(x, y, z) * self.frequency - self.phase;
        self.amplitude * self.perlin.get(p.to_array())
    }
}

/// A square grid of non-negative noise values, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseGrid {
    size: u32,
    values: Vec<f32>,
}

impl NoiseGrid {
    /// Edge length.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at column `i`, row `j`.
    #[must_use]
    pub fn value(&self, i: u32, j: u32) -> Option<f32> {
        if i >= self.size || j >= self.size {
            return None;
        }
        self.values.get((j * self.size + i) as usize).copied()
    }

    /// Raw bytes for texture upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.values)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn generate<F: NoiseFunction>(function: &mut F, size: u32, amplitude: f32) -> NoiseGrid {
    log::debug!("generating {size}x{size} noise grid");
    function.prepare(size);
    let mut values = Vec::with_capacity((size * size) as usize);
    for j in 0..size {
        for i in 0..size {
            let n = function.evaluate(f64::from(i), f64::from(j), 0.0) as f32;
            values.push((amplitude + n).max(0.0));
        }
    }
    NoiseGrid { size, values }
}

/// Generates and caches one [`NoiseGrid`].
#[derive(Debug)]
pub struct NoiseTextureGenerator<F: NoiseFunction = PerlinNoise> {
    function: F,
    requested_size: u32,
    amplitude: f32,
    grid: Option<NoiseGrid>,
}

impl Default for NoiseTextureGenerator<PerlinNoise> {
    fn default() -> Self {
        Self::new(PerlinNoise::default(), Self::DEFAULT_SIZE, 0.5 * 0.1)
    }
}

impl<F: NoiseFunction> NoiseTextureGenerator<F> {
    pub const DEFAULT_SIZE: u32 = 128;

    /// Creates a generator producing `requested_size²` values biased by `amplitude`.
    pub fn new(function: F, requested_size: u32, amplitude: f32) -> Self {
        Self {
            function,
            requested_size: requested_size.max(1),
            amplitude,
            grid: None,
        }
    }

    /// Edge length the next grid will have on a device limited to `max_texture_size`.
    #[must_use]
    pub fn target_size(&self, max_texture_size: u32) -> u32 {
        self.requested_size.min(max_texture_size.max(1))
    }

    /// Returns the cached grid, generating it first if none exists or the
    /// target size changed. The flag reports whether generation happened.
    pub fn ensure_ready(&mut self, max_texture_size: u32) -> (&NoiseGrid, bool) {
        let size = self.target_size(max_texture_size);
        let regenerate = self.grid.as_ref().map_or(true, |grid| grid.size != size);
        if regenerate {
            self.grid = None;
        }

        let amplitude = self.amplitude;
        let function = &mut self.function;
        let grid = self
            .grid
            .get_or_insert_with(|| generate(function, size, amplitude));
        (grid, regenerate)
    }

    /// The cached grid, if generated.
    #[must_use]
    pub fn grid(&self) -> Option<&NoiseGrid> {
        self.grid.as_ref()
    }

    /// Drops the cached grid.
    pub fn reset(&mut self) {
        self.grid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingNoise {
        calls: Cell<usize>,
    }

    impl NoiseFunction for CountingNoise {
        fn evaluate(&self, x: f64, y: f64, _z: f64) -> f64 {
            self.calls.set(self.calls.get() + 1);
            (x - y) * 0.01
        }
    }

    #[test]
    fn test_ensure_ready_caches_grid() {
        let noise = CountingNoise { calls: Cell::new(0) };
        let mut generator = NoiseTextureGenerator::new(noise, 16, 0.05);

        let (first, regenerated) = generator.ensure_ready(8192);
        let first = first.clone();
        assert!(regenerated);
        assert_eq!(first.size(), 16);
        assert_eq!(first.values().len(), 256);

        let (second, regenerated) = generator.ensure_ready(8192);
        assert!(!regenerated);
        assert_eq!(second, &first);
        assert_eq!(generator.function.calls.get(), 256);
    }

    #[test]
    fn test_size_clamped_and_regenerated_on_change() {
        let mut generator = NoiseTextureGenerator::new(PerlinNoise::default(), 128, 0.05);
        let (grid, _) = generator.ensure_ready(64);
        assert_eq!(grid.size(), 64);

        let (grid, regenerated) = generator.ensure_ready(32);
        assert!(regenerated);
        assert_eq!(grid.size(), 32);

        let (_, regenerated) = generator.ensure_ready(4096);
        assert!(regenerated);
        assert_eq!(generator.grid().map(NoiseGrid::size), Some(128));
    }

    #[test]
    fn test_values_are_non_negative_and_bounded() {
        let mut generator: NoiseTextureGenerator = NoiseTextureGenerator::default();
        let (grid, _) = generator.ensure_ready(8192);
        assert!(grid.values().iter().all(|&v| (0.0..=0.11).contains(&v)));
    }

    #[test]
    fn test_perlin_default_is_not_constant() {
        let mut generator: NoiseTextureGenerator = NoiseTextureGenerator::default();
        let (grid, _) = generator.ensure_ready(8192);
        let first = grid.values()[0];
        assert!(grid.values().iter().any(|&v| (v - first).abs() > 1e-6));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut a: NoiseTextureGenerator = NoiseTextureGenerator::default();
        let mut b: NoiseTextureGenerator = NoiseTextureGenerator::default();
        assert_eq!(a.ensure_ready(256).0, b.ensure_ready(256).0);
    }

    #[test]
    fn test_grid_accessors() {
        let mut generator = NoiseTextureGenerator::new(PerlinNoise::default(), 4, 0.05);
        let (grid, _) = generator.ensure_ready(8192);
        assert_eq!(grid.value(3, 3), grid.values().last().copied());
        assert!(grid.value(4, 0).is_none());
        assert_eq!(grid.as_bytes().len(), 16 * 4);
    }
}
