//! Ownership of every GPU object the ray caster uses.
//!
//! [`ResourceManager`] is created with its mapper, initialized lazily on the
//! first successful validation and torn down explicitly with `release`.

use glam::DVec3;
use volcast_core::{
    Association, BuildMarker, Bounds, ColorTransferFunction, CubeGeometry, ImageData, MapperOptions,
    NoiseFunction, NoiseTextureGenerator, PerlinNoise, PiecewiseFunction, PixelFormat, ScalarEncoding,
    ScalarType, TextureFormat, TimeStamp, ValidatedScalars, VolumeError,
};

use crate::binding::TextureUnitGuard;
use crate::device::{
    BufferHandle, BufferTarget, BufferUsage, Filter, GpuDevice, ProgramHandle, SamplerState,
    TextureHandle, TextureTarget, TextureUpload, Wrap,
};
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderSource, RAYCAST_UNIFORMS, VERTEX_POSITION_ATTRIBUTE};
use crate::tables::{OpacityParams, TransferFunctionTables};

/// Texture unit the volume is bound to.
pub const VOLUME_UNIT: u32 = 0;
/// Texture unit the noise is bound to.
pub const NOISE_UNIT: u32 = 3;

/// Number of opacity levels allocated on initialization.
const OPACITY_LEVELS: usize = 1;

/// Lifecycle of a [`ResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    #[default]
    Uninitialized,
    Initialized,
}

/// What the last volume upload put on the GPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadedVolume {
    pub encoding: ScalarEncoding,
    pub bounds: Bounds,
    /// Texels along each axis.
    pub texture_size: [u32; 3],
    /// Index-space extent of the uploaded block.
    pub extent: [i32; 6],
    pub association: Association,
    pub components: usize,
}

impl UploadedVolume {
    /// Texture coordinate of the first sample along each axis: texel centers
    /// for point data, texel edges for cell data.
    #[must_use]
    pub fn texture_coord_offset(&self) -> DVec3 {
        match self.association {
            Association::Cell => DVec3::ZERO,
            Association::Point | Association::Field => {
                let size = self.texture_size.map(f64::from);
                DVec3::new(0.5 / size[0], 0.5 / size[1], 0.5 / size[2])
            }
        }
    }
}

/// Handles needed to issue one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameResources {
    pub program: ProgramHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub volume_texture: TextureHandle,
    pub color_table: TextureHandle,
    pub opacity_table: TextureHandle,
    pub noise_texture: TextureHandle,
    pub volume: UploadedVolume,
}

/// The resource operations a [`VolumeMapper`](crate::VolumeMapper) drives.
pub trait VolumeResources {
    fn state(&self) -> ResourceState;

    /// Creates every GPU object. Calling it again is a no-op.
    fn initialize<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> RenderResult<()>;

    /// Whether the volume or proxy cube must be rebuilt: `image` or the
    /// mapper options (modified at `options_mtime`) changed since the last
    /// upload, or an earlier upload did not complete.
    fn is_data_dirty(&self, image: &ImageData, options_mtime: TimeStamp) -> bool;

    /// Fills the volume texture with the encoded scalars.
    fn upload_volume<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        image: &ImageData,
        scalars: &ValidatedScalars<'_>,
        encoding: ScalarEncoding,
        bounds: Bounds,
    ) -> RenderResult<()>;

    /// Replaces the proxy cube.
    fn upload_geometry<D: GpuDevice + ?Sized>(&mut self, device: &mut D, geometry: &CubeGeometry) -> RenderResult<()>;

    fn refresh_color_table<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut ColorTransferFunction,
        range: (f64, f64),
        linear: bool,
        layout: (usize, bool),
    ) -> RenderResult<bool>;

    fn refresh_opacity_table<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut PiecewiseFunction,
        params: OpacityParams,
        level: usize,
        layout: (usize, bool),
    ) -> RenderResult<bool>;

    /// Generates and uploads the jitter noise if needed. Returns whether it
    /// was uploaded.
    fn ensure_noise<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> RenderResult<bool>;

    fn frame_resources(&self) -> RenderResult<FrameResources>;

    /// Deletes every GPU object and returns to [`ResourceState::Uninitialized`].
    fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D);
}

#[derive(Debug)]
struct GpuObjects {
    program: ProgramHandle,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    volume_texture: TextureHandle,
    noise_texture: TextureHandle,
    tables: TransferFunctionTables,
}

/// Owns the program, buffers and textures of one volume mapper.
#[derive(Debug)]
pub struct ResourceManager<F: NoiseFunction = PerlinNoise> {
    objects: Option<GpuObjects>,
    table_width: usize,
    noise: NoiseTextureGenerator<F>,
    volume_marker: BuildMarker,
    geometry_marker: BuildMarker,
    uploaded: Option<UploadedVolume>,
    index_count: u32,
}

impl ResourceManager<PerlinNoise> {
    /// A manager sized and seeded from `options`.
    pub fn from_options(options: &MapperOptions) -> Self {
        let mut perlin = PerlinNoise::default();
        perlin.amplitude = f64::from(options.noise_amplitude);
        Self::new(
            options.table_width,
            NoiseTextureGenerator::new(perlin, options.noise_size, options.noise_amplitude),
        )
    }
}

impl Default for ResourceManager<PerlinNoise> {
    fn default() -> Self {
        Self::from_options(&MapperOptions::default())
    }
}

impl<F: NoiseFunction> ResourceManager<F> {
    pub fn new(table_width: usize, noise: NoiseTextureGenerator<F>) -> Self {
        Self {
            objects: None,
            table_width,
            noise,
            volume_marker: BuildMarker::new(),
            geometry_marker: BuildMarker::new(),
            uploaded: None,
            index_count: 0,
        }
    }

    /// The last volume upload, if any.
    #[must_use]
    pub fn uploaded_volume(&self) -> Option<&UploadedVolume> {
        self.uploaded.as_ref()
    }

    #[must_use]
    pub fn noise(&self) -> &NoiseTextureGenerator<F> {
        &self.noise
    }

    #[must_use]
    pub fn tables(&self) -> Option<&TransferFunctionTables> {
        self.objects.as_ref().map(|o| &o.tables)
    }

    fn objects_mut(&mut self) -> RenderResult<&mut GpuObjects> {
        self.objects.as_mut().ok_or(RenderError::NotInitialized)
    }
}

fn declare_contract<D: GpuDevice + ?Sized>(device: &mut D, program: ProgramHandle) -> RenderResult<()> {
    device.declare_attribute(program, VERTEX_POSITION_ATTRIBUTE)?;
    for &(name, kind) in RAYCAST_UNIFORMS {
        device.declare_uniform(program, name, kind)?;
    }
    Ok(())
}

/// Texels along each axis for scalars with `association` on `image`.
fn texture_size(image: &ImageData, association: Association) -> [u32; 3] {
    let dims = image.dimensions();
    match association {
        Association::Cell => dims.map(|d| d.saturating_sub(1).max(1)),
        Association::Point | Association::Field => dims,
    }
}

impl<F: NoiseFunction> VolumeResources for ResourceManager<F> {
    fn state(&self) -> ResourceState {
        if self.objects.is_some() {
            ResourceState::Initialized
        } else {
            ResourceState::Uninitialized
        }
    }

    fn initialize<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> RenderResult<()> {
        if self.objects.is_some() {
            return Ok(());
        }

        let caps = device.capabilities();
        log::info!(
            "initializing volume resources (max texture {}, max 3D texture {}, float textures: {})",
            caps.max_texture_size,
            caps.max_texture_size_3d,
            caps.float_textures
        );

        let program = device.create_program(&ShaderSource::raycast())?;
        if let Err(e) = declare_contract(device, program) {
            device.delete_program(program);
            return Err(e);
        }

        let vertex_buffer = device.create_buffer(BufferTarget::Vertex);
        let index_buffer = device.create_buffer(BufferTarget::Index);
        let volume_texture = device.create_texture(TextureTarget::D3);
        let noise_texture = device.create_texture(TextureTarget::D2);
        let tables = TransferFunctionTables::new(device, self.table_width, OPACITY_LEVELS);

        self.objects = Some(GpuObjects {
            program,
            vertex_buffer,
            index_buffer,
            volume_texture,
            noise_texture,
            tables,
        });
        Ok(())
    }

    fn is_data_dirty(&self, image: &ImageData, options_mtime: TimeStamp) -> bool {
        let mtime = image.mtime().max(options_mtime);
        self.uploaded.is_none() || self.volume_marker.is_stale(mtime) || self.geometry_marker.is_stale(mtime)
    }

    fn upload_volume<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        image: &ImageData,
        scalars: &ValidatedScalars<'_>,
        encoding: ScalarEncoding,
        bounds: Bounds,
    ) -> RenderResult<()> {
        let texture = self.objects_mut()?.volume_texture;
        let remapped;
        let (transfer_type, data) = if encoding.remaps_on_host() {
            remapped = encoding.remap(scalars.array.data());
            (ScalarType::Float32, bytemuck::cast_slice::<f32, u8>(&remapped))
        } else {
            let data = scalars
                .array
                .data()
                .as_bytes()
                .ok_or(VolumeError::UnsupportedScalarType(scalars.scalar_type()))?;
            (encoding.transfer_type, data)
        };
        let size = texture_size(image, scalars.association);

        let mut device = TextureUnitGuard::new(device);
        device.active_texture(VOLUME_UNIT);
        device.bind_texture(TextureTarget::D3, Some(texture));
        device.upload_texture(
            texture,
            &TextureUpload {
                size,
                internal_format: encoding.internal_format,
                pixel_format: encoding.pixel_format,
                transfer_type,
                data,
            },
        )?;
        device.set_sampler(texture, SamplerState::new(Wrap::ClampToEdge, Filter::Linear))?;

        self.volume_marker.mark_built();
        self.uploaded = Some(UploadedVolume {
            encoding,
            bounds,
            texture_size: size,
            extent: image.extent(),
            association: scalars.association,
            components: scalars.components(),
        });
        log::debug!(
            "uploaded {size:?} volume as {:?} (shift {}, scale {}, host remap: {})",
            encoding.internal_format,
            encoding.shift,
            encoding.scale,
            encoding.remaps_on_host()
        );
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn upload_geometry<D: GpuDevice + ?Sized>(&mut self, device: &mut D, geometry: &CubeGeometry) -> RenderResult<()> {
        let objects = self.objects_mut()?;
        let (vertices, indices) = (objects.vertex_buffer, objects.index_buffer);

        let positions = geometry.positions();
        device.upload_buffer(vertices, bytemuck::cast_slice(&positions), BufferUsage::StaticDraw)?;
        device.upload_buffer(indices, bytemuck::cast_slice(&geometry.indices), BufferUsage::StaticDraw)?;
        self.index_count = geometry.indices.len() as u32;
        self.geometry_marker.mark_built();
        Ok(())
    }

    fn refresh_color_table<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut ColorTransferFunction,
        range: (f64, f64),
        linear: bool,
        (components, independent): (usize, bool),
    ) -> RenderResult<bool> {
        self.objects_mut()?
            .tables
            .refresh_color(device, function, range, linear, components, independent)
    }

    fn refresh_opacity_table<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut PiecewiseFunction,
        params: OpacityParams,
        level: usize,
        layout: (usize, bool),
    ) -> RenderResult<bool> {
        self.objects_mut()?
            .tables
            .refresh_opacity(device, function, params, level, layout)
    }

    fn ensure_noise<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> RenderResult<bool> {
        let texture = self.objects_mut()?.noise_texture;
        let (grid, regenerated) = self.noise.ensure_ready(device.capabilities().max_texture_size);
        if !regenerated {
            return Ok(false);
        }

        let mut device = TextureUnitGuard::new(device);
        device.active_texture(NOISE_UNIT);
        device.bind_texture(TextureTarget::D2, Some(texture));
        device.upload_texture(
            texture,
            &TextureUpload {
                size: [grid.size(), grid.size(), 1],
                internal_format: TextureFormat::R32Float,
                pixel_format: PixelFormat::Red,
                transfer_type: ScalarType::Float32,
                data: grid.as_bytes(),
            },
        )?;
        device.set_sampler(texture, SamplerState::new(Wrap::Repeat, Filter::Nearest))?;
        Ok(true)
    }

    fn frame_resources(&self) -> RenderResult<FrameResources> {
        let objects = self.objects.as_ref().ok_or(RenderError::NotInitialized)?;
        let volume = self.uploaded.ok_or(RenderError::NotInitialized)?;
        Ok(FrameResources {
            program: objects.program,
            vertex_buffer: objects.vertex_buffer,
            index_buffer: objects.index_buffer,
            index_count: self.index_count,
            volume_texture: objects.volume_texture,
            color_table: objects.tables.color().texture(),
            opacity_table: objects.tables.opacity().level(0)?.texture(),
            noise_texture: objects.noise_texture,
            volume,
        })
    }

    fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        let Some(mut objects) = self.objects.take() else {
            return;
        };
        objects.tables.release(device);
        device.delete_texture(objects.noise_texture);
        device.delete_texture(objects.volume_texture);
        device.delete_buffer(objects.index_buffer);
        device.delete_buffer(objects.vertex_buffer);
        device.delete_program(objects.program);

        self.volume_marker.invalidate();
        self.geometry_marker.invalidate();
        self.uploaded = None;
        self.index_count = 0;
        self.noise.reset();
        log::debug!("released volume resources");
    }
}
