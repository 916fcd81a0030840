//! A [`GpuDevice`] backed by wgpu.
//!
//! Uniforms of a program are packed into one uniform buffer at binding 0, one
//! 16-byte row per value (matrices take four rows) in declaration order.
//! Each sampler uniform adds a texture binding followed by a sampler binding,
//! also in declaration order; its integer value names the texture unit whose
//! bound texture is used at draw time.
//!
//! 1D textures are stored as `width x 1` 2D textures. Texels that are not
//! 8-bit unsigned are converted to the value the sampler would return and
//! stored as half floats (or full floats where those are filterable).

use std::collections::HashMap;

use half::f16;
use wgpu::util::DeviceExt;
use volcast_core::{DeviceCapabilities, PixelFormat, ScalarType, TextureFormat, VolumeError};

use crate::binding::BindingState;
use crate::device::{
    check_uniform, BlendFactor, BufferHandle, BufferTarget, BufferUsage, Capability, Filter, GpuDevice,
    ProgramHandle, SamplerState, TextureHandle, TextureTarget, TextureUpload, UniformKind, UniformValue, Wrap,
};
use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderSource;

/// Depth format expected of render target depth views.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Where draws go. Supplied by the host before rendering.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub color: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    /// A [`DEPTH_FORMAT`] view, if depth testing should apply.
    pub depth: Option<wgpu::TextureView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    blend: Option<(BlendFactor, BlendFactor)>,
    depth_test: bool,
    format: wgpu::TextureFormat,
    has_depth: bool,
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    attributes: Vec<String>,
    uniforms: Vec<(String, UniformKind)>,
    values: HashMap<String, UniformValue>,
    layout: Option<(wgpu::BindGroupLayout, wgpu::PipelineLayout)>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl GpuProgram {
    fn samplers(&self) -> impl Iterator<Item = (&str, TextureTarget)> + '_ {
        self.uniforms.iter().filter_map(|(name, kind)| match kind {
            UniformKind::Sampler(target) => Some((name.as_str(), *target)),
            _ => None,
        })
    }

    fn uniform_rows(&self) -> Vec<[f32; 4]> {
        pack_rows(&self.uniforms, &self.values)
    }
}

/// Uniform buffer contents: one row per scalar or vector, four per matrix.
#[allow(clippy::cast_precision_loss)]
fn pack_rows(uniforms: &[(String, UniformKind)], values: &HashMap<String, UniformValue>) -> Vec<[f32; 4]> {
    let mut rows = Vec::new();
    for (name, kind) in uniforms {
        match (kind, values.get(name)) {
            (UniformKind::Sampler(_), _) => {}
            (UniformKind::Mat4, Some(UniformValue::Mat4(m))) => rows.extend(m.to_cols_array_2d()),
            (UniformKind::Mat4, _) => rows.extend([[0.0; 4]; 4]),
            (_, Some(UniformValue::Int(v))) => rows.push([*v as f32, 0.0, 0.0, 0.0]),
            (_, Some(UniformValue::Float(v))) => rows.push([*v, 0.0, 0.0, 0.0]),
            (_, Some(UniformValue::Vec3(v))) => rows.push([v.x, v.y, v.z, 0.0]),
            _ => rows.push([0.0; 4]),
        }
    }
    if rows.is_empty() {
        rows.push([0.0; 4]);
    }
    rows
}

struct GpuBuffer {
    target: BufferTarget,
    buffer: Option<wgpu::Buffer>,
}

struct GpuTexture {
    target: TextureTarget,
    storage: Option<(wgpu::Texture, wgpu::TextureView)>,
    sampler: wgpu::Sampler,
}

/// Texels ready for `write_texture`.
struct Texels {
    format: wgpu::TextureFormat,
    bytes_per_texel: u32,
    bytes: Vec<u8>,
}

fn scalar_size(ty: ScalarType) -> Option<usize> {
    match ty {
        ScalarType::Int8 | ScalarType::UInt8 => Some(1),
        ScalarType::Int16 | ScalarType::UInt16 => Some(2),
        ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => Some(4),
        _ => None,
    }
}

fn decode<T: bytemuck::Pod>(data: &[u8], widen: impl Fn(T) -> f64) -> Vec<f64> {
    data.chunks_exact(std::mem::size_of::<T>())
        .map(|c| widen(bytemuck::pod_read_unaligned(c)))
        .collect()
}

/// Converts uploaded texels into a sampleable wgpu representation.
#[allow(clippy::cast_possible_truncation)]
fn convert_texels(upload: &TextureUpload<'_>, full_float: bool) -> RenderResult<Texels> {
    let ty = upload.transfer_type;
    let size = scalar_size(ty).ok_or(VolumeError::UnsupportedScalarType(ty))?;
    let channels = upload.pixel_format.channels();
    let expected = upload.texel_count() * channels * size;
    if upload.data.len() != expected {
        return Err(VolumeError::SizeMismatch {
            expected,
            actual: upload.data.len(),
        }
        .into());
    }

    if ty == ScalarType::UInt8 {
        match (upload.pixel_format, upload.internal_format) {
            (PixelFormat::Red, TextureFormat::R8Unorm) => {
                return Ok(Texels {
                    format: wgpu::TextureFormat::R8Unorm,
                    bytes_per_texel: 1,
                    bytes: upload.data.to_vec(),
                });
            }
            (PixelFormat::Rgba, TextureFormat::Rgba8Unorm) => {
                return Ok(Texels {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    bytes_per_texel: 4,
                    bytes: upload.data.to_vec(),
                });
            }
            _ => {}
        }
    }

    let raw = match ty {
        ScalarType::Int8 => decode::<i8>(upload.data, f64::from),
        ScalarType::UInt8 => decode::<u8>(upload.data, f64::from),
        ScalarType::Int16 => decode::<i16>(upload.data, f64::from),
        ScalarType::UInt16 => decode::<u16>(upload.data, f64::from),
        ScalarType::Int32 => decode::<i32>(upload.data, f64::from),
        ScalarType::UInt32 => decode::<u32>(upload.data, f64::from),
        _ => decode::<f32>(upload.data, f64::from),
    };
    let mut values: Vec<f64> = raw.into_iter().map(|v| ty.normalize(v)).collect();

    let out_channels = if channels == 1 { 1 } else { 4 };
    if channels == 3 {
        values = values
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 1.0])
            .collect();
    }

    let (format, bytes_per_channel, bytes) = if full_float {
        let floats: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        let format = if out_channels == 1 {
            wgpu::TextureFormat::R32Float
        } else {
            wgpu::TextureFormat::Rgba32Float
        };
        (format, 4, bytemuck::cast_slice(&floats).to_vec())
    } else {
        let halves: Vec<f16> = values.iter().map(|&v| f16::from_f64(v)).collect();
        let format = if out_channels == 1 {
            wgpu::TextureFormat::R16Float
        } else {
            wgpu::TextureFormat::Rgba16Float
        };
        (format, 2, bytemuck::cast_slice(&halves).to_vec())
    };

    Ok(Texels {
        format,
        bytes_per_texel: bytes_per_channel * out_channels,
        bytes,
    })
}

fn to_wgpu_blend(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn create_sampler(device: &wgpu::Device, state: SamplerState) -> wgpu::Sampler {
    let address_mode = match state.wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
    };
    let filter = match state.filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("volcast sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}

fn create_layouts(device: &wgpu::Device, program: &GpuProgram) -> (wgpu::BindGroupLayout, wgpu::PipelineLayout) {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];

    for (binding, (_, target)) in (1u32..).step_by(2).zip(program.samplers()) {
        let view_dimension = match target {
            TextureTarget::D1 | TextureTarget::D2 => wgpu::TextureViewDimension::D2,
            TextureTarget::D3 => wgpu::TextureViewDimension::D3,
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: binding + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(format!("{} bind group layout", program.label).as_str()),
        entries: &entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(format!("{} pipeline layout", program.label).as_str()),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    (bind_group_layout, pipeline_layout)
}

#[allow(clippy::cast_possible_truncation)]
fn create_pipeline(
    device: &wgpu::Device,
    program: &GpuProgram,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let attribute_count = program.attributes.len().max(1);
    let attributes: Vec<wgpu::VertexAttribute> = (0..attribute_count)
        .map(|i| wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: (i * 12) as wgpu::BufferAddress,
            shader_location: i as u32,
        })
        .collect();

    let blend = key.blend.map(|(src, dst)| {
        let component = wgpu::BlendComponent {
            src_factor: to_wgpu_blend(src),
            dst_factor: to_wgpu_blend(dst),
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(format!("{} pipeline", program.label).as_str()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some(program.vertex_entry.as_str()),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (attribute_count * 12) as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some(program.fragment_entry.as_str()),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: key.has_depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// A [`GpuDevice`] drawing through wgpu into a host-supplied [`RenderTarget`].
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: DeviceCapabilities,
    float32_filterable: bool,
    bindings: BindingState,
    target: Option<RenderTarget>,
    next_id: u32,
    programs: HashMap<ProgramHandle, GpuProgram>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
}

impl WgpuDevice {
    /// Wraps an existing wgpu device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limits = device.limits();
        let float32_filterable = device.features().contains(wgpu::Features::FLOAT32_FILTERABLE);
        Self {
            capabilities: DeviceCapabilities {
                max_texture_size: limits.max_texture_dimension_2d,
                max_texture_size_3d: limits.max_texture_dimension_3d,
                float_textures: true,
            },
            float32_filterable,
            device,
            queue,
            bindings: BindingState::default(),
            target: None,
            next_id: 0,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// Creates a device without a surface.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("volcast device (headless)"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        Ok(Self::new(device, queue))
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Sets (or clears) the target of subsequent draws.
    pub fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.target = target;
    }

    /// Clears the render target's color and resets its depth to the far plane.
    pub fn clear_target(&self, color: wgpu::Color) -> RenderResult<()> {
        let target = self.target.as_ref().ok_or(RenderError::MissingRenderTarget)?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("volcast clear encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("volcast clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn program_mut(&mut self, program: ProgramHandle) -> RenderResult<&mut GpuProgram> {
        self.programs.get_mut(&program).ok_or(RenderError::UnknownHandle {
            kind: ProgramHandle::KIND,
            id: program.id(),
        })
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> RenderResult<&mut GpuTexture> {
        self.textures.get_mut(&texture).ok_or(RenderError::UnknownHandle {
            kind: TextureHandle::KIND,
            id: texture.id(),
        })
    }

    fn buffer(&self, buffer: BufferHandle) -> RenderResult<&wgpu::Buffer> {
        self.buffers
            .get(&buffer)
            .and_then(|b| b.buffer.as_ref())
            .ok_or(RenderError::UnknownHandle {
                kind: BufferHandle::KIND,
                id: buffer.id(),
            })
    }

    /// Texture view and sampler for every sampler uniform of `program`.
    fn sampler_resources(&self, program: &GpuProgram) -> RenderResult<Vec<(&wgpu::TextureView, &wgpu::Sampler)>> {
        program
            .samplers()
            .map(|(name, target)| {
                let unit = match program.values.get(name) {
                    Some(UniformValue::Int(unit)) => u32::try_from(*unit).unwrap_or(0),
                    _ => 0,
                };
                let unbound = || RenderError::UnboundSampler {
                    name: name.to_string(),
                    unit,
                };
                let texture = self
                    .bindings
                    .bound_texture(unit, target)
                    .and_then(|handle| self.textures.get(&handle))
                    .ok_or_else(unbound)?;
                let (_, view) = texture.storage.as_ref().ok_or_else(unbound)?;
                Ok((view, &texture.sampler))
            })
            .collect()
    }
}

impl GpuDevice for WgpuDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn bindings(&self) -> &BindingState {
        &self.bindings
    }

    fn create_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label.as_str()),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ShaderCompilationFailed(error.to_string()));
        }

        let program = ProgramHandle::new(self.next());
        self.programs.insert(
            program,
            GpuProgram {
                label: source.label.clone(),
                module,
                vertex_entry: source.vertex_entry.clone(),
                fragment_entry: source.fragment_entry.clone(),
                attributes: Vec::new(),
                uniforms: Vec::new(),
                values: HashMap::new(),
                layout: None,
                pipelines: HashMap::new(),
            },
        );
        Ok(program)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.bindings.set_program(program);
    }

    fn declare_attribute(&mut self, program: ProgramHandle, name: &str) -> RenderResult<()> {
        let program = self.program_mut(program)?;
        program.attributes.push(name.to_string());
        program.pipelines.clear();
        Ok(())
    }

    fn declare_uniform(&mut self, program: ProgramHandle, name: &str, kind: UniformKind) -> RenderResult<()> {
        let program = self.program_mut(program)?;
        program.uniforms.push((name.to_string(), kind));
        program.layout = None;
        program.pipelines.clear();
        Ok(())
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) -> RenderResult<()> {
        let program = self.program_mut(program)?;
        check_uniform(&program.uniforms, name, value)?;
        program.values.insert(name.to_string(), value);
        Ok(())
    }

    fn create_buffer(&mut self, target: BufferTarget) -> BufferHandle {
        let buffer = BufferHandle::new(self.next());
        self.buffers.insert(buffer, GpuBuffer { target, buffer: None });
        buffer
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8], _usage: BufferUsage) -> RenderResult<()> {
        let entry = self.buffers.get_mut(&buffer).ok_or(RenderError::UnknownHandle {
            kind: BufferHandle::KIND,
            id: buffer.id(),
        })?;
        let max = self.device.limits().max_buffer_size;
        if data.len() as u64 > max {
            return Err(RenderError::BufferUploadFailed(format!(
                "{} bytes exceeds the device limit of {max}",
                data.len()
            )));
        }
        let usage = match entry.target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        };
        entry.buffer = Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("volcast buffer"),
            contents: data,
            usage: usage | wgpu::BufferUsages::COPY_DST,
        }));
        Ok(())
    }

    fn create_texture(&mut self, target: TextureTarget) -> TextureHandle {
        let texture = TextureHandle::new(self.next());
        let sampler = create_sampler(&self.device, SamplerState::default());
        self.textures.insert(
            texture,
            GpuTexture {
                target,
                storage: None,
                sampler,
            },
        );
        texture
    }

    fn upload_texture(&mut self, texture: TextureHandle, upload: &TextureUpload<'_>) -> RenderResult<()> {
        let target = self.texture_mut(texture)?.target;
        let texels = convert_texels(upload, self.float32_filterable)?;

        let [width, height, depth] = match target {
            TextureTarget::D1 => [upload.size[0], 1, 1],
            TextureTarget::D2 => [upload.size[0], upload.size[1], 1],
            TextureTarget::D3 => upload.size,
        };
        let limit = match target {
            TextureTarget::D3 => self.capabilities.max_texture_size_3d,
            TextureTarget::D1 | TextureTarget::D2 => self.capabilities.max_texture_size,
        };
        if [width, height, depth].iter().any(|&s| s == 0 || s > limit) {
            return Err(RenderError::TextureCreationFailed(format!(
                "size {:?} outside 1..={limit}",
                upload.size
            )));
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };
        let (dimension, view_dimension) = match target {
            TextureTarget::D1 | TextureTarget::D2 => (wgpu::TextureDimension::D2, wgpu::TextureViewDimension::D2),
            TextureTarget::D3 => (wgpu::TextureDimension::D3, wgpu::TextureViewDimension::D3),
        };

        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volcast texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format: texels.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels.bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * texels.bytes_per_texel),
                rows_per_image: Some(height),
            },
            extent,
        );

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(view_dimension),
            ..Default::default()
        });
        self.texture_mut(texture)?.storage = Some((gpu_texture, view));
        Ok(())
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState) -> RenderResult<()> {
        let created = create_sampler(&self.device, sampler);
        self.texture_mut(texture)?.sampler = created;
        Ok(())
    }

    fn active_texture(&mut self, unit: u32) {
        self.bindings.set_active_unit(unit);
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        self.bindings.bind_texture(target, texture);
    }

    fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        self.bindings.set_enabled(capability, enabled);
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.bindings.set_blend_func(src, dst);
    }

    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) -> RenderResult<()> {
        let target = self.target.clone().ok_or(RenderError::MissingRenderTarget)?;
        let handle = self.bindings.program().ok_or(RenderError::NotInitialized)?;
        let key = PipelineKey {
            blend: self
                .bindings
                .is_enabled(Capability::Blend)
                .then(|| self.bindings.blend_func()),
            depth_test: self.bindings.is_enabled(Capability::DepthTest),
            format: target.format,
            has_depth: target.depth.is_some(),
        };

        {
            let device = &self.device;
            let program = self.programs.get_mut(&handle).ok_or(RenderError::UnknownHandle {
                kind: ProgramHandle::KIND,
                id: handle.id(),
            })?;
            if program.layout.is_none() {
                let layouts = create_layouts(device, program);
                program.layout = Some(layouts);
            }
            if !program.pipelines.contains_key(&key) {
                if let Some((_, pipeline_layout)) = program.layout.as_ref() {
                    let pipeline = create_pipeline(device, program, pipeline_layout, key);
                    program.pipelines.insert(key, pipeline);
                }
            }
        }

        let program = self.programs.get(&handle).ok_or(RenderError::UnknownHandle {
            kind: ProgramHandle::KIND,
            id: handle.id(),
        })?;
        let (bind_group_layout, _) = program.layout.as_ref().ok_or(RenderError::NotInitialized)?;
        let pipeline = program.pipelines.get(&key).ok_or(RenderError::NotInitialized)?;
        let vertex_buffer = self.buffer(vertices)?;
        let index_buffer = self.buffer(indices)?;

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("volcast uniform buffer"),
            contents: bytemuck::cast_slice(&program.uniform_rows()),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let samplers = self.sampler_resources(program)?;
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        for (binding, (view, sampler)) in (1u32..).step_by(2).zip(samplers) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("volcast bind group"),
            layout: bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("volcast draw encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("volcast raycast pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.as_ref().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.bindings.forget_program(program);
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.bindings.forget_texture(texture);
    }
}
