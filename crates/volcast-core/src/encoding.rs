//! Scalar-to-texture encoding.
//!
//! Chooses the texture storage for a scalar field and the `(shift, scale)` pair
//! that maps the field's value range onto `[0, 1]` in the shader:
//! `encoded = (normalize(raw) + shift) * scale`, where `normalize` is the
//! sampler convention of [`ScalarType::normalize`].
//!
//! 32-bit single-component fields stored in a 16-bit texture are remapped on
//! the host instead: half floats overflow above 65504 and 16-bit
//! normalization of a 32-bit integer keeps only its top bits. The texture then
//! holds encoded values and the shader receives the identity pair.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};
use crate::scalars::{ScalarBuffer, ScalarType};

/// Internal storage format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8Unorm,
    R16Unorm,
    R16Float,
    R32Float,
    Rgb32Float,
    Rgba8Unorm,
}

/// Channel layout of uploaded texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Red,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Channels per texel.
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Red => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// What the graphics device can do, as far as encoding and sizing care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Largest 1D/2D texture edge.
    pub max_texture_size: u32,
    /// Largest 3D texture edge.
    pub max_texture_size_3d: u32,
    /// Whether half/full float single-channel textures are sampleable.
    pub float_textures: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            max_texture_size_3d: 2048,
            float_textures: true,
        }
    }
}

/// Texture layout plus the affine remap applied in the shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarEncoding {
    pub internal_format: TextureFormat,
    pub pixel_format: PixelFormat,
    pub transfer_type: ScalarType,
    pub shift: f64,
    pub scale: f64,
}

impl ScalarEncoding {
    /// Shader-side value for a raw scalar: `(normalize(raw) + shift) * scale`.
    #[must_use]
    pub fn encode(&self, raw: f64) -> f64 {
        (self.transfer_type.normalize(raw) + self.shift) * self.scale
    }

    /// Inverse of [`ScalarEncoding::encode`]. `None` for a degenerate encoding.
    #[must_use]
    pub fn decode(&self, encoded: f64) -> Option<f64> {
        if self.scale == 0.0 {
            return None;
        }
        let normalized = encoded / self.scale - self.shift;
        Some(match self.transfer_type.unsigned_max() {
            Some(umax) if self.transfer_type.is_signed_integer() => (normalized * umax - 1.0) / 2.0,
            Some(umax) => normalized * umax,
            None => normalized,
        })
    }

    /// Whether texels are encoded before upload rather than in the shader.
    #[must_use]
    pub fn remaps_on_host(&self) -> bool {
        self.pixel_format == PixelFormat::Red
            && matches!(
                self.transfer_type,
                ScalarType::Float32 | ScalarType::Int32 | ScalarType::UInt32
            )
            && matches!(self.internal_format, TextureFormat::R16Float | TextureFormat::R16Unorm)
    }

    /// The `(shift, scale)` pair the shader applies to sampled texels.
    #[must_use]
    pub fn shader_shift_scale(&self) -> (f64, f64) {
        if self.remaps_on_host() {
            (0.0, 1.0)
        } else {
            (self.shift, self.scale)
        }
    }

    /// Encodes every value of `data`, for upload as `Float32` texels.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn remap(&self, data: &ScalarBuffer) -> Vec<f32> {
        (0..data.len())
            .filter_map(|i| data.value(i))
            .map(|v| self.encode(v) as f32)
            .collect()
    }
}

/// Computes the texture encoding of a scalar field.
///
/// `range` is the observed `(min, max)` of the rendered component.
pub fn encode_scalars(
    scalar_type: ScalarType,
    components: usize,
    range: (f64, f64),
    caps: &DeviceCapabilities,
) -> Result<ScalarEncoding> {
    if !scalar_type.is_supported() {
        return Err(VolumeError::UnsupportedScalarType(scalar_type));
    }

    match components {
        4 if scalar_type == ScalarType::UInt8 => {
            return Ok(ScalarEncoding {
                internal_format: TextureFormat::Rgba8Unorm,
                pixel_format: PixelFormat::Rgba,
                transfer_type: ScalarType::UInt8,
                shift: 0.0,
                scale: 1.0,
            });
        }
        1 => {}
        _ => {
            return Err(VolumeError::UnsupportedComponentLayout {
                components,
                independent: false,
            })
        }
    }

    let (min, max) = range;
    let span = max - min;

    let internal_format = match scalar_type {
        ScalarType::Float32 if caps.float_textures => TextureFormat::R16Float,
        ScalarType::Int8 | ScalarType::UInt8 => TextureFormat::R8Unorm,
        _ => TextureFormat::R16Unorm,
    };

    let (shift, scale) = match scalar_type.unsigned_max() {
        None => (-min, 1.0 / span),
        Some(umax) if scalar_type.is_signed_integer() => (-(2.0 * min + 1.0) / umax, umax / (2.0 * span)),
        Some(umax) => (-min / umax, umax / span),
    };

    let scale = if span > 0.0 && scale.is_finite() {
        scale
    } else {
        log::debug!("constant scalar field ({min}); encoding every sample to zero");
        0.0
    };

    Ok(ScalarEncoding {
        internal_format,
        pixel_format: PixelFormat::Red,
        transfer_type: scalar_type,
        shift,
        scale,
    })
}
