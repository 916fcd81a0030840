//! The renderable volume prop and its appearance properties.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::transfer_function::{ColorTransferFunction, PiecewiseFunction};

/// Sampling mode of the volume and transfer-function textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationType {
    Nearest,
    #[default]
    Linear,
}

/// Appearance of a volume: transfer functions, interpolation and lighting.
#[derive(Debug, Clone)]
pub struct VolumeProperty {
    /// Scalar value to RGB.
    pub color: ColorTransferFunction,
    /// Scalar value to opacity per unit distance.
    pub scalar_opacity: PiecewiseFunction,
    /// World distance over which `scalar_opacity` is specified.
    pub scalar_opacity_unit_distance: f64,
    pub interpolation: InterpolationType,
    /// When false, 4-component data is treated as packed RGBA.
    pub independent_components: bool,
    pub shade: bool,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            color: ColorTransferFunction::new(),
            scalar_opacity: PiecewiseFunction::new(),
            scalar_opacity_unit_distance: 1.0,
            interpolation: InterpolationType::Linear,
            independent_components: true,
            shade: false,
            ambient: Vec3::ZERO,
            diffuse: Vec3::splat(0.2),
            specular: Vec3::splat(0.2),
            shininess: 10.0,
        }
    }
}

impl VolumeProperty {
    /// Creates a property with default lighting and empty transfer functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether lookups interpolate linearly.
    #[must_use]
    pub fn is_linear(&self) -> bool {
        self.interpolation == InterpolationType::Linear
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationType) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_independent_components(mut self, independent: bool) -> Self {
        self.independent_components = independent;
        self
    }

    pub fn with_shade(mut self, shade: bool) -> Self {
        self.shade = shade;
        self
    }

    pub fn with_unit_distance(mut self, distance: f64) -> Self {
        self.scalar_opacity_unit_distance = distance;
        self
    }
}

/// A volume prop: appearance plus model-to-world transform.
#[derive(Debug, Clone, Default)]
pub struct Volume {
    pub property: VolumeProperty,
    pub matrix: Mat4,
}

impl Volume {
    /// Creates a volume with an identity transform.
    pub fn new(property: VolumeProperty) -> Self {
        Self {
            property,
            matrix: Mat4::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_defaults() {
        let property = VolumeProperty::default();
        assert_eq!(property.scalar_opacity_unit_distance, 1.0);
        assert!(property.is_linear());
        assert!(property.independent_components);
        assert_eq!(property.diffuse, Vec3::splat(0.2));
        assert_eq!(property.shininess, 10.0);
        assert_eq!(property.color.size(), 0);
    }

    #[test]
    fn test_volume_identity_transform() {
        let volume = Volume::new(VolumeProperty::new().with_shade(true));
        assert_eq!(volume.matrix, Mat4::IDENTITY);
        assert!(volume.property.shade);
    }
}
