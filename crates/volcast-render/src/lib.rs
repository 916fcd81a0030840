//! Rendering backend for volcast.
//!
//! This crate provides:
//! - The [`GpuDevice`] seam the mapper draws through, with a wgpu
//!   implementation and a recording one for tests
//! - Binding save/restore guards
//! - Color and opacity lookup tables
//! - GPU resource ownership for one mapped volume
//! - The single-pass ray-casting [`VolumeMapper`]

pub mod binding;
pub mod camera;
pub mod device;
pub mod error;
pub mod mapper;
pub mod recording;
pub mod resources;
pub mod screenshot;
pub mod shader;
pub mod tables;
pub mod wgpu_device;

pub use binding::{restore_bindings, BindingState, StateGuard, TextureUnitGuard};
pub use camera::{Camera, ProjectionMode, Renderer};
pub use device::{
    BlendFactor, BufferHandle, BufferTarget, BufferUsage, Capability, Filter, GpuDevice, ProgramHandle,
    SamplerState, TextureHandle, TextureTarget, TextureUpload, UniformKind, UniformValue, Wrap,
};
pub use error::{RenderError, RenderResult};
pub use mapper::{RenderOutcome, RenderRequest, ValidatedFrame, VolumeMapper};
pub use recording::{DeviceCall, ProgramRecord, RecordingDevice, TextureRecord};
pub use resources::{
    FrameResources, ResourceManager, ResourceState, UploadedVolume, VolumeResources, NOISE_UNIT, VOLUME_UNIT,
};
pub use screenshot::{encode_png, save_image, OffscreenTarget, ScreenshotError, OFFSCREEN_FORMAT};
pub use shader::{ShaderSource, RAYCAST_UNIFORMS, VERTEX_POSITION_ATTRIBUTE};
pub use tables::{
    check_layout, ColorTable, OpacityParams, OpacityTable, OpacityTables, TransferFunctionTables,
    COLOR_TABLE_UNIT, OPACITY_TABLE_UNIT,
};
pub use wgpu_device::{RenderTarget, WgpuDevice, DEPTH_FORMAT};
