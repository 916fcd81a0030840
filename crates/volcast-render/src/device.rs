//! The graphics device seam.
//!
//! [`GpuDevice`] is a small, state-machine style interface over the graphics
//! API: named uniforms on a program, numbered texture units, and capability
//! toggles. All mutable binding state lives in a [`BindingState`] the device
//! exposes, so scoped guards can snapshot and restore it.

use glam::{Mat4, Vec3};
use volcast_core::{DeviceCapabilities, PixelFormat, ScalarType, TextureFormat};

use crate::binding::BindingState;
use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderSource;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw device id.
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Raw device id.
            #[must_use]
            pub const fn id(self) -> u32 {
                self.0
            }

            pub(crate) const KIND: &'static str = $kind;
        }
    };
}

handle!(
    /// A linked shader program.
    ProgramHandle,
    "program"
);
handle!(
    /// A vertex or index buffer.
    BufferHandle,
    "buffer"
);
handle!(
    /// A texture object.
    TextureHandle,
    "texture"
);

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextureTarget {
    D1,
    D2,
    D3,
}

/// Declared type of a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Int,
    Float,
    Vec3,
    Mat4,
    /// A sampler reading the texture bound to the unit named by its integer value.
    Sampler(TextureTarget),
}

/// A value assigned to a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Whether this value can be stored in a slot of `kind`.
    #[must_use]
    pub fn fits(&self, kind: UniformKind) -> bool {
        matches!(
            (self, kind),
            (Self::Int(_), UniformKind::Int | UniformKind::Sampler(_))
                | (Self::Float(_), UniformKind::Float)
                | (Self::Vec3(_), UniformKind::Vec3)
                | (Self::Mat4(_), UniformKind::Mat4)
        )
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

/// Checks `value` against the slot `name` declared in `uniforms`.
pub(crate) fn check_uniform(uniforms: &[(String, UniformKind)], name: &str, value: UniformValue) -> RenderResult<()> {
    let kind = uniforms
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, k)| *k)
        .ok_or_else(|| RenderError::UnknownUniform(name.to_string()))?;
    if !value.fits(kind) {
        return Err(RenderError::UniformTypeMismatch {
            name: name.to_string(),
            expected: format!("{kind:?}"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Expected update frequency of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrap {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Wrap and filter parameters of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplerState {
    pub wrap: Wrap,
    pub filter: Filter,
}

impl SamplerState {
    #[must_use]
    pub fn new(wrap: Wrap, filter: Filter) -> Self {
        Self { wrap, filter }
    }
}

/// Fixed-function state that can be switched on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    Texture1D,
    Texture2D,
    Texture3D,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Blend,
        Capability::DepthTest,
        Capability::Texture1D,
        Capability::Texture2D,
        Capability::Texture3D,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Texel data for one texture (re)definition.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    /// Texels along x, y and z; unused axes are 1.
    pub size: [u32; 3],
    pub internal_format: TextureFormat,
    pub pixel_format: PixelFormat,
    /// Storage type of each channel in `data`.
    pub transfer_type: ScalarType,
    /// Tightly packed texels, x fastest.
    pub data: &'a [u8],
}

impl TextureUpload<'_> {
    /// Number of texels described by `size`.
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.size.iter().map(|&s| s as usize).product()
    }
}

/// The operations the volume mapper needs from a graphics device.
pub trait GpuDevice {
    /// What the device supports.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Current binding state.
    fn bindings(&self) -> &BindingState;

    /// Compiles and links a program.
    fn create_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle>;

    /// Makes `program` current, or none.
    fn use_program(&mut self, program: Option<ProgramHandle>);

    /// Declares a vertex attribute slot.
    fn declare_attribute(&mut self, program: ProgramHandle, name: &str) -> RenderResult<()>;

    /// Declares a uniform slot. Declaration order is significant to some backends.
    fn declare_uniform(&mut self, program: ProgramHandle, name: &str, kind: UniformKind) -> RenderResult<()>;

    /// Assigns a declared uniform.
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) -> RenderResult<()>;

    fn create_buffer(&mut self, target: BufferTarget) -> BufferHandle;

    /// Replaces the contents of a buffer.
    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8], usage: BufferUsage) -> RenderResult<()>;

    fn create_texture(&mut self, target: TextureTarget) -> TextureHandle;

    /// (Re)specifies a texture's storage and contents.
    fn upload_texture(&mut self, texture: TextureHandle, upload: &TextureUpload<'_>) -> RenderResult<()>;

    /// Sets the wrap and filter parameters of a texture.
    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState) -> RenderResult<()>;

    /// Selects the texture unit subsequent binds apply to.
    fn active_texture(&mut self, unit: u32);

    /// Binds a texture (or nothing) to `target` on the active unit.
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>);

    fn set_enabled(&mut self, capability: Capability, enabled: bool);

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);

    /// Draws `index_count` indices as triangles with the current program.
    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) -> RenderResult<()>;

    fn delete_program(&mut self, program: ProgramHandle);

    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn delete_texture(&mut self, texture: TextureHandle);
}
