//! Render preconditions on the input scalars.
//!
//! Everything here runs before any GPU work, so a failure means the frame is
//! skipped with no device state touched.

use thiserror::Error;

use crate::error::VolumeError;
use crate::image_data::{Association, ImageData};
use crate::options::{BlendMode, MapperOptions};
use crate::scalars::{ScalarArray, ScalarType};
use crate::volume::VolumeProperty;

/// Why a frame was not rendered.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("no renderer to draw into")]
    MissingRenderer,

    #[error("the renderer has no active camera")]
    MissingCamera,

    #[error("no volume prop to render")]
    MissingVolume,

    #[error("no input connected to the mapper")]
    MissingInput,

    #[error("updating the input failed: {0}")]
    InputUpdateFailed(#[source] VolumeError),

    #[error("mapper options are invalid: {0}")]
    InvalidOptions(#[source] VolumeError),

    #[error("no scalars found on the input")]
    ScalarsNotFound,

    #[error("field-associated scalars cannot be volume rendered; use point or cell data")]
    FieldAssociatedScalars,

    #[error("scalar type {0} is not supported")]
    UnsupportedScalarType(ScalarType),

    #[error("blend mode {0:?} is not supported by the single-pass ray caster")]
    UnsupportedBlendMode(BlendMode),

    #[error(
        "{components} component(s) with independent = {independent}: only one component, \
         or four non-independent components, are supported"
    )]
    UnsupportedComponentCount { components: usize, independent: bool },

    #[error("four-component data must be unsigned char, got {0}")]
    RgbaRequiresUInt8(ScalarType),

    #[error("additive blending requires one component, got {0}")]
    AdditiveRequiresSingleComponent(usize),
}

/// Scalars that passed validation, ready to be encoded.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedScalars<'a> {
    pub array: &'a ScalarArray,
    pub association: Association,
}

impl ValidatedScalars<'_> {
    #[must_use]
    pub fn components(&self) -> usize {
        self.array.number_of_components()
    }

    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        self.array.scalar_type()
    }
}

/// Checks the input scalars against what the ray caster can render.
///
/// Checks run in a fixed order and the first failure is returned.
pub fn validate_scalars<'a>(
    image: &'a ImageData,
    options: &MapperOptions,
    property: &VolumeProperty,
) -> Result<ValidatedScalars<'a>, ValidationError> {
    let (array, association) = image
        .find_scalars(options.scalar_mode, &options.array_access)
        .ok_or(ValidationError::ScalarsNotFound)?;

    if association == Association::Field {
        return Err(ValidationError::FieldAssociatedScalars);
    }

    let scalar_type = array.scalar_type();
    if !scalar_type.is_supported() {
        return Err(ValidationError::UnsupportedScalarType(scalar_type));
    }

    if !options.blend_mode.is_supported() {
        return Err(ValidationError::UnsupportedBlendMode(options.blend_mode));
    }

    let components = array.number_of_components();
    let independent = property.independent_components;
    if !(components == 1 || (components == 4 && !independent)) {
        return Err(ValidationError::UnsupportedComponentCount {
            components,
            independent,
        });
    }

    if components == 4 && scalar_type != ScalarType::UInt8 {
        return Err(ValidationError::RgbaRequiresUInt8(scalar_type));
    }

    if options.blend_mode == BlendMode::Additive && components != 1 {
        return Err(ValidationError::AdditiveRequiresSingleComponent(components));
    }

    Ok(ValidatedScalars { array, association })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_data::{ArrayAccess, ScalarMode};
    use glam::DVec3;

    fn image() -> ImageData {
        ImageData::new([0, 1, 0, 1, 0, 1], DVec3::ONE, DVec3::ZERO).unwrap()
    }

    fn rgba_image<T>(data: Vec<T>) -> ImageData
    where
        Vec<T>: Into<crate::scalars::ScalarBuffer>,
    {
        let mut img = image();
        img.set_point_scalars(ScalarArray::new("rgba", 4, data).unwrap()).unwrap();
        img
    }

    fn rgba_property() -> VolumeProperty {
        VolumeProperty::new().with_independent_components(false)
    }

    #[test]
    fn test_accepts_single_component_float() {
        let mut img = image();
        img.set_point_scalars(ScalarArray::single("density", vec![0.0f32; 8])).unwrap();
        let ok = validate_scalars(&img, &MapperOptions::default(), &VolumeProperty::default()).unwrap();
        assert_eq!(ok.association, Association::Point);
        assert_eq!(ok.components(), 1);
        assert_eq!(ok.scalar_type(), ScalarType::Float32);
    }

    #[test]
    fn test_rejects_missing_scalars() {
        let err = validate_scalars(&image(), &MapperOptions::default(), &VolumeProperty::default()).unwrap_err();
        assert!(matches!(err, ValidationError::ScalarsNotFound));
    }

    #[test]
    fn test_rejects_field_data() {
        let mut img = image();
        img.add_field_array(ScalarArray::single("meta", vec![1.0f32, 2.0]));
        let options = MapperOptions::new()
            .with_scalar_mode(ScalarMode::UseFieldData)
            .with_array_access(ArrayAccess::ByName("meta".into()));
        let err = validate_scalars(&img, &options, &VolumeProperty::default()).unwrap_err();
        assert!(matches!(err, ValidationError::FieldAssociatedScalars));
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let mut img = image();
        img.set_point_scalars(ScalarArray::single("d", vec![0.0f64; 8])).unwrap();
        let err = validate_scalars(&img, &MapperOptions::default(), &VolumeProperty::default()).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedScalarType(ScalarType::Float64)));
    }

    #[test]
    fn test_rejects_unsupported_blend_modes() {
        let mut img = image();
        img.set_point_scalars(ScalarArray::single("d", vec![0u8; 8])).unwrap();
        for mode in [BlendMode::AverageIntensity, BlendMode::Isosurface, BlendMode::Slice] {
            let options = MapperOptions::new().with_blend_mode(mode);
            let err = validate_scalars(&img, &options, &VolumeProperty::default()).unwrap_err();
            assert!(matches!(err, ValidationError::UnsupportedBlendMode(m) if m == mode));
        }
    }

    #[test]
    fn test_rejects_two_components() {
        let mut img = image();
        img.set_point_scalars(ScalarArray::new("uv", 2, vec![0.0f32; 16]).unwrap()).unwrap();
        let err = validate_scalars(&img, &MapperOptions::default(), &VolumeProperty::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedComponentCount { components: 2, .. }
        ));
    }

    #[test]
    fn test_rejects_independent_rgba() {
        let img = rgba_image(vec![0u8; 32]);
        let err = validate_scalars(&img, &MapperOptions::default(), &VolumeProperty::default()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedComponentCount {
                components: 4,
                independent: true
            }
        ));
    }

    #[test]
    fn test_rgba_requires_unsigned_char() {
        let img = rgba_image(vec![0u16; 32]);
        let err = validate_scalars(&img, &MapperOptions::default(), &rgba_property()).unwrap_err();
        assert!(matches!(err, ValidationError::RgbaRequiresUInt8(ScalarType::UInt16)));

        let img = rgba_image(vec![0u8; 32]);
        assert!(validate_scalars(&img, &MapperOptions::default(), &rgba_property()).is_ok());
    }

    #[test]
    fn test_additive_requires_one_component() {
        let img = rgba_image(vec![0u8; 32]);
        let options = MapperOptions::new().with_blend_mode(BlendMode::Additive);
        let err = validate_scalars(&img, &options, &rgba_property()).unwrap_err();
        assert!(matches!(err, ValidationError::AdditiveRequiresSingleComponent(4)));
    }

    #[test]
    fn test_cell_scalars_fallback() {
        let mut img = image();
        img.set_cell_scalars(ScalarArray::single("c", vec![3i16])).unwrap();
        let ok = validate_scalars(&img, &MapperOptions::default(), &VolumeProperty::default()).unwrap();
        assert_eq!(ok.association, Association::Cell);
    }
}
