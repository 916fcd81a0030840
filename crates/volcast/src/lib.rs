//! volcast: single-pass GPU ray-cast volume rendering for regular 3D grids.
//!
//! A [`VolumeMapper`] takes an [`ImageData`] carrying a scalar field, a
//! [`Volume`] describing how to color it, and a [`Renderer`] with the camera.
//! Each frame it uploads the field into a 3D texture (only when the input
//! changed), bakes the transfer functions into lookup tables, and draws the
//! grid's bounding cube once; the fragment shader marches a ray per pixel.
//!
//! # Quick Start
//!
//! ```no_run
//! use volcast::*;
//!
//! fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let mut image = ImageData::new([0, 63, 0, 63, 0, 63], DVec3::ONE, DVec3::ZERO)?;
//!     let values: Vec<u8> = (0..64 * 64 * 64).map(|i| (i % 256) as u8).collect();
//!     image.set_point_scalars(ScalarArray::single("density", values))?;
//!
//!     let renderer = Renderer::new(Camera::new(Vec3::new(32.0, 32.0, 200.0), Vec3::splat(32.0)), [640, 480]);
//!     let mut volume = Volume::default();
//!     let mut mapper = VolumeMapper::default();
//!
//!     let mut headless = HeadlessRenderer::new(640, 480)?;
//!     let outcome = headless.render(&mut mapper, &mut RenderRequest::new(&renderer, &mut volume, &mut image))?;
//!     assert!(outcome.is_rendered());
//!     headless.save("volume.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `volcast-core` holds everything that does not touch a GPU: the grid data
//!   model, scalar encoding, bounds, transfer functions, noise and validation.
//! - `volcast-render` holds the device seam, lookup tables, resource
//!   ownership, the mapper and the wgpu backend.

mod headless;
mod init;

pub use headless::{HeadlessError, HeadlessRenderer};
pub use init::init_logging;

// Re-export core types
pub use volcast_core::{
    compute_bounds, correct_opacity, encode_scalars, validate_scalars, ArrayAccess, Association, AttributeData,
    BlendMode, Bounds, ColorTransferFunction, CubeGeometry, DeviceCapabilities, ImageData, InterpolationType,
    MapperOptions, MIN_SAMPLE_DISTANCE, MIN_TABLE_WIDTH, NoiseFunction, NoiseGrid, NoiseTextureGenerator, PerlinNoise, PiecewiseFunction, PixelFormat,
    Result, ScalarArray, ScalarBuffer, ScalarEncoding, ScalarMode, ScalarType, TextureFormat, TimeStamp,
    ValidatedScalars, ValidationError, Volume, VolumeError, VolumeInput, VolumeProperty,
};
pub use glam;
pub use glam::{DVec3, Mat4, Vec3, Vec4};

// Re-export render types
pub use volcast_render::{
    Camera, GpuDevice, ProjectionMode, RecordingDevice, RenderError, RenderOutcome, RenderRequest, RenderResult,
    RenderTarget, Renderer, ResourceManager, VolumeMapper, VolumeResources, WgpuDevice,
};
