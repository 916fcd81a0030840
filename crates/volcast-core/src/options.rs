//! Configuration options for the volume mapper.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};
use crate::image_data::{ArrayAccess, ScalarMode};

/// How samples along a ray are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlendMode {
    /// Front-to-back alpha compositing.
    #[default]
    Composite,
    /// Maximum intensity projection.
    MaximumIntensity,
    /// Minimum intensity projection.
    MinimumIntensity,
    /// Sum of samples weighted by opacity.
    Additive,
    /// Mean of samples.
    AverageIntensity,
    /// Surface at an isovalue.
    Isosurface,
    /// Single slice through the volume.
    Slice,
}

impl BlendMode {
    /// Whether the single-pass ray caster implements this mode.
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Composite | Self::MaximumIntensity | Self::MinimumIntensity | Self::Additive
        )
    }

    /// Integer code passed to the shader.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Composite => 0,
            Self::MaximumIntensity => 1,
            Self::MinimumIntensity => 2,
            Self::Additive => 3,
            Self::AverageIntensity => 4,
            Self::Isosurface => 5,
            Self::Slice => 6,
        }
    }
}

/// Smallest sample distance the setters accept.
pub const MIN_SAMPLE_DISTANCE: f64 = 1e-6;

/// Smallest transfer-function table the setters accept.
pub const MIN_TABLE_WIDTH: usize = 2;

/// Mapper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Ray blending mode.
    pub blend_mode: BlendMode,

    /// World distance between ray samples.
    pub sample_distance: f64,

    /// Which attribute collection scalars come from.
    pub scalar_mode: ScalarMode,

    /// Array selection for the `*FieldData` scalar modes.
    pub array_access: ArrayAccess,

    /// Entries per transfer-function table.
    pub table_width: usize,

    /// Requested edge length of the square noise texture.
    pub noise_size: u32,

    /// Peak amplitude of the jitter noise.
    pub noise_amplitude: f32,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Composite,
            sample_distance: 1.0,
            scalar_mode: ScalarMode::Default,
            array_access: ArrayAccess::default(),
            table_width: 1024,
            noise_size: 128,
            noise_amplitude: 0.5 * 0.1,
        }
    }
}

impl MapperOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Sets the sample distance, clamped to at least [`MIN_SAMPLE_DISTANCE`].
    pub fn with_sample_distance(mut self, sample_distance: f64) -> Self {
        self.sample_distance = sample_distance.max(MIN_SAMPLE_DISTANCE).min(f64::MAX);
        self
    }

    /// Sets the scalar mode.
    pub fn with_scalar_mode(mut self, scalar_mode: ScalarMode) -> Self {
        self.scalar_mode = scalar_mode;
        self
    }

    /// Sets the array access used by the field-data scalar modes.
    pub fn with_array_access(mut self, access: ArrayAccess) -> Self {
        self.array_access = access;
        self
    }

    /// Sets the transfer-function table width.
    pub fn with_table_width(mut self, width: usize) -> Self {
        self.table_width = width.max(MIN_TABLE_WIDTH);
        self
    }

    /// Sets the requested noise texture size.
    pub fn with_noise_size(mut self, size: u32) -> Self {
        self.noise_size = size.max(1);
        self
    }

    /// Checks every numeric option against its valid range.
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_distance.is_finite() && self.sample_distance > 0.0) {
            return Err(VolumeError::InvalidOption {
                name: "sample_distance",
                reason: "must be finite and positive",
            });
        }
        if self.table_width < MIN_TABLE_WIDTH {
            return Err(VolumeError::InvalidOption {
                name: "table_width",
                reason: "must be at least 2",
            });
        }
        if self.noise_size == 0 {
            return Err(VolumeError::InvalidOption {
                name: "noise_size",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes options to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = MapperOptions::default();
        assert_eq!(options.blend_mode, BlendMode::Composite);
        assert_eq!(options.sample_distance, 1.0);
        assert_eq!(options.table_width, 1024);
        assert_eq!(options.noise_size, 128);
    }

    #[test]
    fn test_options_builder() {
        let options = MapperOptions::new()
            .with_blend_mode(BlendMode::MaximumIntensity)
            .with_sample_distance(0.25)
            .with_table_width(0);
        assert_eq!(options.blend_mode, BlendMode::MaximumIntensity);
        assert_eq!(options.sample_distance, 0.25);
        assert_eq!(options.table_width, 2);
    }

    #[test]
    fn test_options_json_roundtrip() {
        let options = MapperOptions::new()
            .with_blend_mode(BlendMode::Additive)
            .with_array_access(ArrayAccess::ByName("density".into()));
        let json = options.to_json().unwrap();
        assert_eq!(MapperOptions::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_options_partial_json() {
        let options = MapperOptions::from_json(r#"{ "sample_distance": 0.5 }"#).unwrap();
        assert_eq!(options.sample_distance, 0.5);
        assert_eq!(options.blend_mode, BlendMode::Composite);
    }

    #[test]
    fn test_setters_clamp_out_of_range_values() {
        let options = MapperOptions::new().with_sample_distance(-1.0).with_table_width(0);
        assert_eq!(options.sample_distance, MIN_SAMPLE_DISTANCE);
        assert_eq!(options.table_width, MIN_TABLE_WIDTH);
        assert!(options.validate().is_ok());

        let options = MapperOptions::new().with_sample_distance(f64::NAN);
        assert_eq!(options.sample_distance, MIN_SAMPLE_DISTANCE);
    }

    #[test]
    fn test_json_rejects_out_of_range_values() {
        for json in [
            r#"{ "sample_distance": 0.0 }"#,
            r#"{ "sample_distance": -0.5 }"#,
            r#"{ "table_width": 0 }"#,
            r#"{ "noise_size": 0 }"#,
        ] {
            let err = MapperOptions::from_json(json).unwrap_err();
            assert!(matches!(err, VolumeError::InvalidOption { .. }), "{json}: {err}");
        }
    }

    #[test]
    fn test_supported_blend_modes() {
        assert!(BlendMode::Composite.is_supported());
        assert!(BlendMode::Additive.is_supported());
        assert!(!BlendMode::AverageIntensity.is_supported());
        assert!(!BlendMode::Isosurface.is_supported());
        assert!(!BlendMode::Slice.is_supported());
    }
}
