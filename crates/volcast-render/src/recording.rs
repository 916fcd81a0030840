//! An in-memory [`GpuDevice`] that records every call.
//!
//! Useful for headless hosts and for asserting exactly what the mapper asked of
//! the device: which uniforms were set, how often textures were uploaded, and
//! whether state was restored afterwards.

use std::collections::HashMap;

use volcast_core::{DeviceCapabilities, PixelFormat, TextureFormat};

use crate::binding::BindingState;
use crate::device::{
    check_uniform, BlendFactor, BufferHandle, BufferTarget, BufferUsage, Capability, GpuDevice, ProgramHandle,
    SamplerState, TextureHandle, TextureTarget, TextureUpload, UniformKind, UniformValue,
};
use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderSource;

/// One recorded device call. Payloads are summarized, not copied.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateProgram(ProgramHandle),
    UseProgram(Option<ProgramHandle>),
    DeclareAttribute { program: ProgramHandle, name: String },
    DeclareUniform { program: ProgramHandle, name: String, kind: UniformKind },
    SetUniform { program: ProgramHandle, name: String, value: UniformValue },
    CreateBuffer(BufferHandle, BufferTarget),
    UploadBuffer { buffer: BufferHandle, len: usize, usage: BufferUsage },
    CreateTexture(TextureHandle, TextureTarget),
    UploadTexture {
        texture: TextureHandle,
        size: [u32; 3],
        internal_format: TextureFormat,
        pixel_format: PixelFormat,
    },
    SetSampler(TextureHandle, SamplerState),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureHandle>),
    SetEnabled(Capability, bool),
    BlendFunc(BlendFactor, BlendFactor),
    DrawIndexed { vertices: BufferHandle, indices: BufferHandle, count: u32 },
    DeleteProgram(ProgramHandle),
    DeleteBuffer(BufferHandle),
    DeleteTexture(TextureHandle),
}

/// What the device knows about a program.
#[derive(Debug, Clone, Default)]
pub struct ProgramRecord {
    pub attributes: Vec<String>,
    pub uniforms: Vec<(String, UniformKind)>,
    pub values: HashMap<String, UniformValue>,
}

/// What the device knows about a texture.
#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub target: TextureTarget,
    pub size: [u32; 3],
    pub internal_format: Option<TextureFormat>,
    pub sampler: SamplerState,
    pub data: Vec<u8>,
}

/// A [`GpuDevice`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    capabilities: DeviceCapabilities,
    bindings: BindingState,
    calls: Vec<DeviceCall>,
    next_id: u32,
    programs: HashMap<ProgramHandle, ProgramRecord>,
    buffers: HashMap<BufferHandle, (BufferTarget, Vec<u8>)>,
    textures: HashMap<TextureHandle, TextureRecord>,
    fail_compilation: bool,
    fail_buffer_uploads: bool,
}

impl RecordingDevice {
    /// A device with default capabilities.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A device advertising `capabilities`.
    #[must_use]
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Makes buffer uploads fail until switched back off.
    pub fn set_failing_buffer_uploads(&mut self, fail: bool) {
        self.fail_buffer_uploads = fail;
    }

    /// Makes every subsequent `create_program` fail.
    #[must_use]
    pub fn failing_compilation(mut self) -> Self {
        self.fail_compilation = true;
        self
    }

    /// Calls recorded since creation or the last clear.
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Removes and returns the recorded calls.
    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// Index counts of every recorded draw.
    #[must_use]
    pub fn draws(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed { count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded uploads into `texture`.
    #[must_use]
    pub fn texture_uploads(&self, texture: TextureHandle) -> usize {
        self.count(|c| matches!(c, DeviceCall::UploadTexture { texture: t, .. } if *t == texture))
    }

    #[must_use]
    pub fn program(&self, program: ProgramHandle) -> Option<&ProgramRecord> {
        self.programs.get(&program)
    }

    /// Last value assigned to a uniform.
    #[must_use]
    pub fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.values.get(name).copied()
    }

    #[must_use]
    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureRecord> {
        self.textures.get(&texture)
    }

    /// Current contents of a buffer.
    #[must_use]
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, data)| data.as_slice())
    }

    /// Number of live objects of every kind.
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.programs.len() + self.buffers.len() + self.textures.len()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn program_mut(&mut self, program: ProgramHandle) -> RenderResult<&mut ProgramRecord> {
        self.programs.get_mut(&program).ok_or(RenderError::UnknownHandle {
            kind: ProgramHandle::KIND,
            id: program.id(),
        })
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> RenderResult<&mut TextureRecord> {
        self.textures.get_mut(&texture).ok_or(RenderError::UnknownHandle {
            kind: TextureHandle::KIND,
            id: texture.id(),
        })
    }
}

impl GpuDevice for RecordingDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn bindings(&self) -> &BindingState {
        &self.bindings
    }

    fn create_program(&mut self, source: &ShaderSource) -> RenderResult<ProgramHandle> {
        if self.fail_compilation {
            return Err(RenderError::ShaderCompilationFailed(format!(
                "{}: compilation disabled on this device",
                source.label
            )));
        }
        let program = ProgramHandle::new(self.next());
        self.programs.insert(program, ProgramRecord::default());
        self.calls.push(DeviceCall::CreateProgram(program));
        Ok(program)
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.bindings.set_program(program);
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn declare_attribute(&mut self, program: ProgramHandle, name: &str) -> RenderResult<()> {
        self.program_mut(program)?.attributes.push(name.to_string());
        self.calls.push(DeviceCall::DeclareAttribute {
            program,
            name: name.to_string(),
        });
        Ok(())
    }

    fn declare_uniform(&mut self, program: ProgramHandle, name: &str, kind: UniformKind) -> RenderResult<()> {
        self.program_mut(program)?.uniforms.push((name.to_string(), kind));
        self.calls.push(DeviceCall::DeclareUniform {
            program,
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) -> RenderResult<()> {
        let record = self.program_mut(program)?;
        check_uniform(&record.uniforms, name, value)?;
        record.values.insert(name.to_string(), value);
        self.calls.push(DeviceCall::SetUniform {
            program,
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn create_buffer(&mut self, target: BufferTarget) -> BufferHandle {
        let buffer = BufferHandle::new(self.next());
        self.buffers.insert(buffer, (target, Vec::new()));
        self.calls.push(DeviceCall::CreateBuffer(buffer, target));
        buffer
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8], usage: BufferUsage) -> RenderResult<()> {
        if self.fail_buffer_uploads {
            return Err(RenderError::BufferUploadFailed("uploads disabled on this device".into()));
        }
        let (_, contents) = self.buffers.get_mut(&buffer).ok_or(RenderError::UnknownHandle {
            kind: BufferHandle::KIND,
            id: buffer.id(),
        })?;
        contents.clear();
        contents.extend_from_slice(data);
        self.calls.push(DeviceCall::UploadBuffer {
            buffer,
            len: data.len(),
            usage,
        });
        Ok(())
    }

    fn create_texture(&mut self, target: TextureTarget) -> TextureHandle {
        let texture = TextureHandle::new(self.next());
        self.textures.insert(
            texture,
            TextureRecord {
                target,
                size: [0; 3],
                internal_format: None,
                sampler: SamplerState::default(),
                data: Vec::new(),
            },
        );
        self.calls.push(DeviceCall::CreateTexture(texture, target));
        texture
    }

    fn upload_texture(&mut self, texture: TextureHandle, upload: &TextureUpload<'_>) -> RenderResult<()> {
        let max = match self.texture_mut(texture)?.target {
            TextureTarget::D3 => self.capabilities.max_texture_size_3d,
            TextureTarget::D1 | TextureTarget::D2 => self.capabilities.max_texture_size,
        };
        if upload.size.iter().any(|&s| s > max) {
            return Err(RenderError::TextureCreationFailed(format!(
                "size {:?} exceeds device limit {max}",
                upload.size
            )));
        }

        let record = self.texture_mut(texture)?;
        record.size = upload.size;
        record.internal_format = Some(upload.internal_format);
        record.data = upload.data.to_vec();
        self.calls.push(DeviceCall::UploadTexture {
            texture,
            size: upload.size,
            internal_format: upload.internal_format,
            pixel_format: upload.pixel_format,
        });
        Ok(())
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState) -> RenderResult<()> {
        self.texture_mut(texture)?.sampler = sampler;
        self.calls.push(DeviceCall::SetSampler(texture, sampler));
        Ok(())
    }

    fn active_texture(&mut self, unit: u32) {
        self.bindings.set_active_unit(unit);
        self.calls.push(DeviceCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        self.bindings.bind_texture(target, texture);
        self.calls.push(DeviceCall::BindTexture(target, texture));
    }

    fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        self.bindings.set_enabled(capability, enabled);
        self.calls.push(DeviceCall::SetEnabled(capability, enabled));
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.bindings.set_blend_func(src, dst);
        self.calls.push(DeviceCall::BlendFunc(src, dst));
    }

    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) -> RenderResult<()> {
        for buffer in [vertices, indices] {
            if !self.buffers.contains_key(&buffer) {
                return Err(RenderError::UnknownHandle {
                    kind: BufferHandle::KIND,
                    id: buffer.id(),
                });
            }
        }
        self.calls.push(DeviceCall::DrawIndexed {
            vertices,
            indices,
            count: index_count,
        });
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        self.bindings.forget_program(program);
        self.calls.push(DeviceCall::DeleteProgram(program));
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.calls.push(DeviceCall::DeleteBuffer(buffer));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.bindings.forget_texture(texture);
        self.calls.push(DeviceCall::DeleteTexture(texture));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use volcast_core::ScalarType;

    #[test]
    fn test_uniforms_must_be_declared() {
        let mut device = RecordingDevice::new();
        let program = device.create_program(&ShaderSource::raycast()).unwrap();
        let err = device.set_uniform(program, "scale", UniformValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, RenderError::UnknownUniform(name) if name == "scale"));

        device.declare_uniform(program, "scale", UniformKind::Float).unwrap();
        device.set_uniform(program, "scale", 2.0f32.into()).unwrap();
        assert_eq!(device.uniform(program, "scale"), Some(UniformValue::Float(2.0)));
    }

    #[test]
    fn test_uniform_kind_is_checked() {
        let mut device = RecordingDevice::new();
        let program = device.create_program(&ShaderSource::raycast()).unwrap();
        device.declare_uniform(program, "camera_pos", UniformKind::Vec3).unwrap();
        let err = device.set_uniform(program, "camera_pos", UniformValue::Int(1)).unwrap_err();
        assert!(matches!(err, RenderError::UniformTypeMismatch { .. }));
        device.set_uniform(program, "camera_pos", Vec3::ONE.into()).unwrap();
    }

    #[test]
    fn test_unknown_handles_are_rejected() {
        let mut device = RecordingDevice::new();
        let err = device
            .set_sampler(TextureHandle::new(99), SamplerState::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownHandle { kind: "texture", id: 99 }));
    }

    #[test]
    fn test_texture_size_limit() {
        let mut device = RecordingDevice::with_capabilities(DeviceCapabilities {
            max_texture_size_3d: 4,
            ..DeviceCapabilities::default()
        });
        let texture = device.create_texture(TextureTarget::D3);
        let data = vec![0u8; 125];
        let upload = TextureUpload {
            size: [5, 5, 5],
            internal_format: TextureFormat::R8Unorm,
            pixel_format: PixelFormat::Red,
            transfer_type: ScalarType::UInt8,
            data: &data,
        };
        assert!(matches!(
            device.upload_texture(texture, &upload),
            Err(RenderError::TextureCreationFailed(_))
        ));
        assert_eq!(device.texture_uploads(texture), 0);
    }

    #[test]
    fn test_failing_compilation() {
        let mut device = RecordingDevice::new().failing_compilation();
        assert!(matches!(
            device.create_program(&ShaderSource::raycast()),
            Err(RenderError::ShaderCompilationFailed(_))
        ));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_delete_releases_objects_and_bindings() {
        let mut device = RecordingDevice::new();
        let texture = device.create_texture(TextureTarget::D2);
        let buffer = device.create_buffer(BufferTarget::Vertex);
        device.bind_texture(TextureTarget::D2, Some(texture));
        assert_eq!(device.live_objects(), 2);

        device.delete_texture(texture);
        device.delete_buffer(buffer);
        assert_eq!(device.live_objects(), 0);
        assert_eq!(device.bindings().bound_texture(0, TextureTarget::D2), None);
    }
}
