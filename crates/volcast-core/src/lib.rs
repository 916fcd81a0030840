//! Core data model for volcast.
//!
//! This crate holds everything the volume mapper needs that does not touch a GPU:
//! - [`ImageData`] and [`ScalarArray`] for the regular-grid input
//! - [`encode_scalars`] for choosing texture storage and the shader remap
//! - [`compute_bounds`] and [`CubeGeometry`] for the proxy geometry
//! - transfer functions, the noise grid and render validation
//! - modification timestamps and build markers for dirtiness tracking

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Exact comparisons against sentinel values are intended
#![allow(clippy::float_cmp)]

pub mod bounds;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod image_data;
pub mod noise_texture;
pub mod options;
pub mod scalars;
pub mod timestamp;
pub mod transfer_function;
pub mod validation;
pub mod volume;

pub use bounds::{compute_bounds, Bounds};
pub use encoding::{encode_scalars, DeviceCapabilities, PixelFormat, ScalarEncoding, TextureFormat};
pub use error::{Result, VolumeError};
pub use geometry::{CubeGeometry, CUBE_INDICES};
pub use image_data::{ArrayAccess, Association, AttributeData, ImageData, ScalarMode, VolumeInput};
pub use noise_texture::{NoiseFunction, NoiseGrid, NoiseTextureGenerator, PerlinNoise};
pub use options::{BlendMode, MapperOptions, MIN_SAMPLE_DISTANCE, MIN_TABLE_WIDTH};
pub use scalars::{ScalarArray, ScalarBuffer, ScalarType};
pub use timestamp::{BuildMarker, TimeStamp};
pub use transfer_function::{correct_opacity, ColorTransferFunction, PiecewiseFunction};
pub use validation::{validate_scalars, ValidatedScalars, ValidationError};
pub use volume::{InterpolationType, Volume, VolumeProperty};

// Re-export glam types for convenience
pub use glam::{DVec3, Mat4, Vec3, Vec4};
