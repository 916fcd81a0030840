//! The single-pass ray-casting volume mapper.
//!
//! Each frame: validate the request, lazily create resources, re-upload the
//! volume and proxy cube when the input changed, refresh the lookup tables,
//! marshal the uniforms and draw the cube once. Device state touched by the
//! draw is restored before returning.

use std::time::{Duration, Instant};

use glam::{DVec3, Vec3};
use volcast_core::{
    compute_bounds, encode_scalars, BlendMode, CubeGeometry, ImageData, MapperOptions, TimeStamp,
    ValidatedScalars, ValidationError, Volume, VolumeError, VolumeInput,
};

use crate::binding::StateGuard;
use crate::camera::{Camera, Renderer};
use crate::device::{BlendFactor, Capability, GpuDevice, TextureTarget, UniformValue};
use crate::error::{RenderError, RenderResult};
use crate::resources::{FrameResources, ResourceManager, VolumeResources, NOISE_UNIT, VOLUME_UNIT};
use crate::tables::{OpacityParams, COLOR_TABLE_UNIT, OPACITY_TABLE_UNIT};

/// Opacity level the ray caster samples.
const OPACITY_LEVEL: usize = 0;

/// The scene pieces one render call works on. Any of them may be missing;
/// validation reports which.
#[derive(Default)]
pub struct RenderRequest<'a> {
    pub renderer: Option<&'a Renderer>,
    pub volume: Option<&'a mut Volume>,
    pub input: Option<&'a mut dyn VolumeInput>,
}

impl<'a> RenderRequest<'a> {
    pub fn new(renderer: &'a Renderer, volume: &'a mut Volume, input: &'a mut dyn VolumeInput) -> Self {
        Self {
            renderer: Some(renderer),
            volume: Some(volume),
            input: Some(input),
        }
    }
}

/// A request that passed validation.
pub struct ValidatedFrame<'a> {
    pub renderer: &'a Renderer,
    pub camera: &'a Camera,
    pub volume: &'a mut Volume,
    pub image: &'a ImageData,
    pub scalars: ValidatedScalars<'a>,
}

/// What a render call did.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The volume was drawn.
    Rendered,
    /// A precondition failed; the device was not touched.
    Skipped(ValidationError),
    /// Rendering failed after validation; device state was restored.
    Aborted(RenderError),
}

impl RenderOutcome {
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered)
    }
}

/// Renders a regular scalar grid by ray casting through a bounding cube.
#[derive(Debug)]
pub struct VolumeMapper<R: VolumeResources = ResourceManager> {
    options: MapperOptions,
    /// Bumped whenever the options are handed out mutably.
    options_mtime: TimeStamp,
    resources: R,
    time_to_draw: Duration,
}

impl VolumeMapper<ResourceManager> {
    /// A mapper with its own [`ResourceManager`].
    pub fn new(options: MapperOptions) -> Self {
        let resources = ResourceManager::from_options(&options);
        Self::with_resources(options, resources)
    }
}

impl Default for VolumeMapper<ResourceManager> {
    fn default() -> Self {
        Self::new(MapperOptions::default())
    }
}

impl<R: VolumeResources> VolumeMapper<R> {
    pub fn with_resources(options: MapperOptions, resources: R) -> Self {
        Self {
            options,
            options_mtime: TimeStamp::now(),
            resources,
            time_to_draw: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    /// Options for subsequent frames. Table width and noise settings only take
    /// effect for resources created afterwards. The volume is re-uploaded on
    /// the next frame, since the scalar selection may have changed.
    pub fn options_mut(&mut self) -> &mut MapperOptions {
        self.options_mtime.modified();
        &mut self.options
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.options.blend_mode = blend_mode;
    }

    #[must_use]
    pub fn resources(&self) -> &R {
        &self.resources
    }

    /// Wall time spent in the last successful render.
    #[must_use]
    pub fn time_to_draw(&self) -> Duration {
        self.time_to_draw
    }

    /// Checks every precondition of a render, in order, and returns the
    /// scalars to draw. The first failure is logged and returned.
    pub fn validate<'a>(&self, request: &'a mut RenderRequest<'_>) -> Result<ValidatedFrame<'a>, ValidationError> {
        self.check(request).inspect_err(|e| log::error!("volume render skipped: {e}"))
    }

    fn check<'a>(&self, request: &'a mut RenderRequest<'_>) -> Result<ValidatedFrame<'a>, ValidationError> {
        let renderer = request.renderer.ok_or(ValidationError::MissingRenderer)?;
        let camera = renderer.camera.as_ref().ok_or(ValidationError::MissingCamera)?;
        let volume = request.volume.as_deref_mut().ok_or(ValidationError::MissingVolume)?;
        let input = request.input.as_deref_mut().ok_or(ValidationError::MissingInput)?;
        input.update().map_err(ValidationError::InputUpdateFailed)?;
        self.options.validate().map_err(ValidationError::InvalidOptions)?;

        let input: &'a dyn VolumeInput = input;
        let image = input.image();
        let scalars = volcast_core::validate_scalars(image, &self.options, &volume.property)?;
        Ok(ValidatedFrame {
            renderer,
            camera,
            volume,
            image,
            scalars,
        })
    }

    /// Renders one frame. Never panics on bad input: failures are reported in
    /// the outcome and logged.
    pub fn render<D: GpuDevice + ?Sized>(&mut self, device: &mut D, request: &mut RenderRequest<'_>) -> RenderOutcome {
        let frame = match self.validate(request) {
            Ok(frame) => frame,
            Err(reason) => return RenderOutcome::Skipped(reason),
        };

        let start = Instant::now();
        match self.execute(device, frame) {
            Ok(()) => {
                self.time_to_draw = start.elapsed();
                RenderOutcome::Rendered
            }
            Err(e) => {
                log::error!("volume render aborted: {e}");
                RenderOutcome::Aborted(e)
            }
        }
    }

    fn execute<D: GpuDevice + ?Sized>(&mut self, device: &mut D, frame: ValidatedFrame<'_>) -> RenderResult<()> {
        let ValidatedFrame {
            renderer,
            camera,
            volume,
            image,
            scalars,
        } = frame;

        let mut device = StateGuard::new(device);
        self.resources.initialize(&mut *device)?;

        let components = scalars.components();
        let range = if components == 4 {
            (0.0, 255.0)
        } else {
            scalars.array.range(0).ok_or(VolumeError::ScalarsNotFound)?
        };

        if self.resources.is_data_dirty(image, self.options_mtime) {
            let bounds = compute_bounds(
                image.extent(),
                image.whole_extent(),
                image.spacing(),
                image.origin(),
                scalars.association,
            );
            let encoding = encode_scalars(scalars.scalar_type(), components, range, &device.capabilities())?;
            self.resources.upload_volume(&mut *device, image, &scalars, encoding, bounds)?;
            self.resources.upload_geometry(&mut *device, &CubeGeometry::from_bounds(&bounds))?;
        }

        let property = &mut volume.property;
        let linear = property.is_linear();
        let layout = (components, property.independent_components);
        let params = OpacityParams {
            blend_mode: self.options.blend_mode,
            sample_distance: self.options.sample_distance,
            unit_distance: property.scalar_opacity_unit_distance,
            range,
            linear,
        };
        self.resources
            .refresh_opacity_table(&mut *device, &mut property.scalar_opacity, params, OPACITY_LEVEL, layout)?;
        self.resources
            .refresh_color_table(&mut *device, &mut property.color, range, linear, layout)?;
        self.resources.ensure_noise(&mut *device)?;

        let resources = self.resources.frame_resources()?;

        device.set_enabled(Capability::DepthTest, true);
        device.set_enabled(Capability::Blend, true);
        device.blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        for capability in [Capability::Texture1D, Capability::Texture2D, Capability::Texture3D] {
            device.set_enabled(capability, true);
        }

        device.use_program(Some(resources.program));
        for (name, value) in self.uniforms(renderer, camera, volume, &resources) {
            device.set_uniform(resources.program, name, value)?;
        }

        for (unit, target, texture) in [
            (VOLUME_UNIT, TextureTarget::D3, resources.volume_texture),
            (COLOR_TABLE_UNIT, TextureTarget::D1, resources.color_table),
            (OPACITY_TABLE_UNIT, TextureTarget::D1, resources.opacity_table),
            (NOISE_UNIT, TextureTarget::D2, resources.noise_texture),
        ] {
            device.active_texture(unit);
            device.bind_texture(target, Some(texture));
        }

        device.draw_indexed(resources.vertex_buffer, resources.index_buffer, resources.index_count)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    fn uniforms(
        &self,
        renderer: &Renderer,
        camera: &Camera,
        volume: &Volume,
        resources: &FrameResources,
    ) -> Vec<(&'static str, UniformValue)> {
        let uploaded = &resources.volume;
        let (shift, scale) = uploaded.encoding.shader_shift_scale();
        let bounds = uploaded.bounds;
        let lengths = bounds.lengths();

        let step_size = lengths.to_array().map(|len| {
            if len > 0.0 {
                1.0 / len
            } else {
                log::warn!("volume has zero extent along an axis");
                0.0
            }
        });
        let extent = uploaded.extent;
        let property = &volume.property;

        vec![
            ("scene_matrix", volume.matrix.into()),
            ("modelview_matrix", camera.view_matrix().into()),
            ("projection_matrix", camera.projection_matrix(renderer.aspect_ratio()).into()),
            ("volume", UniformValue::Int(VOLUME_UNIT as i32)),
            ("camera_pos", camera.position.into()),
            ("light_pos", camera.position.into()),
            ("step_size", DVec3::from_array(step_size).as_vec3().into()),
            ("sample_distance", (self.options.sample_distance as f32).into()),
            ("scale", (scale as f32).into()),
            ("shift", (shift as f32).into()),
            ("cell_scale", (lengths * 0.5).as_vec3().into()),
            ("color_transfer_func", UniformValue::Int(COLOR_TABLE_UNIT as i32)),
            ("opacity_transfer_func", UniformValue::Int(OPACITY_TABLE_UNIT as i32)),
            ("noise", UniformValue::Int(NOISE_UNIT as i32)),
            ("vol_extents_min", bounds.min().as_vec3().into()),
            ("vol_extents_max", bounds.max().as_vec3().into()),
            (
                "texture_extents_min",
                Vec3::new(extent[0] as f32, extent[2] as f32, extent[4] as f32).into(),
            ),
            (
                "texture_extents_max",
                Vec3::new(extent[1] as f32, extent[3] as f32, extent[5] as f32).into(),
            ),
            ("texture_coord_offset", uploaded.texture_coord_offset().as_vec3().into()),
            ("enable_shading", UniformValue::Int(i32::from(property.shade))),
            ("ambient", property.ambient.into()),
            ("diffuse", property.diffuse.into()),
            ("specular", property.specular.into()),
            ("shininess", property.shininess.into()),
            ("blend_mode", UniformValue::Int(self.options.blend_mode.code())),
            ("components", UniformValue::Int(uploaded.components as i32)),
        ]
    }

    /// Deletes every GPU object owned by this mapper.
    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        self.resources.release(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice};
    use crate::shader::RAYCAST_UNIFORMS;
    use volcast_core::{Association, DeviceCapabilities, ScalarArray, ScalarMode, ScalarType, VolumeProperty};

    fn renderer() -> Renderer {
        Renderer::new(Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO), [640, 480])
    }

    fn image() -> ImageData {
        let mut image = ImageData::new([0, 3, 0, 3, 0, 3], DVec3::ONE, DVec3::ZERO).unwrap();
        let values: Vec<f32> = (0..64u8).map(f32::from).collect();
        image.set_point_scalars(ScalarArray::single("density", values)).unwrap();
        image
    }

    #[test]
    fn test_render_draws_cube_once() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(outcome.is_rendered(), "{outcome:?}");
        assert_eq!(device.draws(), vec![36]);

        let program = mapper.resources().frame_resources().unwrap().program;
        for (name, _) in RAYCAST_UNIFORMS {
            assert!(device.uniform(program, name).is_some(), "uniform `{name}` not set");
        }
        assert_eq!(device.uniform(program, "step_size"), Some(Vec3::splat(1.0 / 3.0).into()));
        assert_eq!(device.uniform(program, "vol_extents_max"), Some(Vec3::splat(3.0).into()));
        assert_eq!(device.uniform(program, "blend_mode"), Some(UniformValue::Int(0)));
        assert_eq!(device.uniform(program, "noise"), Some(UniformValue::Int(3)));
    }

    #[test]
    fn test_render_seeds_transfer_functions() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert_eq!(volume.property.color.points().len(), 2);
        assert_eq!(volume.property.scalar_opacity.points(), &[(0.0, 0.0), (63.0, 0.5)]);
    }

    #[test]
    fn test_validation_order() {
        let mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();

        let cameraless = Renderer::default();

        let mut request = RenderRequest::default();
        assert!(matches!(mapper.validate(&mut request), Err(ValidationError::MissingRenderer)));

        request.renderer = Some(&cameraless);
        assert!(matches!(mapper.validate(&mut request), Err(ValidationError::MissingCamera)));

        request.renderer = Some(&renderer);
        assert!(matches!(mapper.validate(&mut request), Err(ValidationError::MissingVolume)));

        request.volume = Some(&mut volume);
        assert!(matches!(mapper.validate(&mut request), Err(ValidationError::MissingInput)));
    }

    #[test]
    fn test_renderer_without_camera_is_skipped() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = Renderer::default();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(outcome, RenderOutcome::Skipped(ValidationError::MissingCamera)));
        assert!(device.calls().is_empty());
        assert!(device.draws().is_empty());
    }

    #[test]
    fn test_input_update_failure_skips() {
        struct Broken(ImageData);
        impl VolumeInput for Broken {
            fn update(&mut self) -> volcast_core::Result<()> {
                Err(VolumeError::ScalarsNotFound)
            }
            fn image(&self) -> &ImageData {
                &self.0
            }
        }

        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut input = Broken(image());

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut input));
        assert!(matches!(outcome, RenderOutcome::Skipped(ValidationError::InputUpdateFailed(_))));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_unsupported_blend_mode_skips_without_device_calls() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        mapper.set_blend_mode(BlendMode::Isosurface);
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(
            outcome,
            RenderOutcome::Skipped(ValidationError::UnsupportedBlendMode(BlendMode::Isosurface))
        ));
        assert!(device.calls().is_empty());
        assert_eq!(volume.property.color.size(), 0);
    }

    #[test]
    fn test_state_restored_after_render() {
        let mut device = RecordingDevice::new();
        device.active_texture(7);
        device.set_enabled(Capability::DepthTest, true);
        let before = device.bindings().clone();

        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();
        assert!(mapper
            .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
            .is_rendered());
        assert_eq!(device.bindings(), &before);
    }

    #[test]
    fn test_device_failure_aborts_and_restores() {
        let mut device = RecordingDevice::with_capabilities(DeviceCapabilities {
            max_texture_size_3d: 2,
            ..DeviceCapabilities::default()
        });
        let before = device.bindings().clone();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(outcome, RenderOutcome::Aborted(RenderError::TextureCreationFailed(_))));
        assert!(device.draws().is_empty());
        assert_eq!(device.bindings(), &before);
    }

    #[test]
    fn test_compilation_failure_aborts() {
        let mut device = RecordingDevice::new().failing_compilation();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(outcome, RenderOutcome::Aborted(RenderError::ShaderCompilationFailed(_))));
    }

    #[test]
    fn test_rgba_volume_renders() {
        let mut image = ImageData::new([0, 1, 0, 1, 0, 1], DVec3::ONE, DVec3::ZERO).unwrap();
        let rgba = ScalarArray::new("rgba", 4, vec![128u8; 32]).unwrap();
        image.set_point_scalars(rgba).unwrap();
        let mut volume = Volume::new(VolumeProperty::new().with_independent_components(false));
        let renderer = renderer();
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();

        assert!(mapper
            .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
            .is_rendered());
        let program = mapper.resources().frame_resources().unwrap().program;
        assert_eq!(device.uniform(program, "components"), Some(UniformValue::Int(4)));
        assert_eq!(device.uniform(program, "scale"), Some(UniformValue::Float(1.0)));
        assert_eq!(
            mapper.resources().uploaded_volume().unwrap().encoding.transfer_type,
            ScalarType::UInt8
        );
    }

    #[test]
    fn test_second_frame_reuses_uploads() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        device.clear_calls();
        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));

        assert_eq!(device.count(|c| matches!(c, DeviceCall::UploadTexture { .. })), 0);
        assert_eq!(device.count(|c| matches!(c, DeviceCall::UploadBuffer { .. })), 0);
        assert_eq!(device.draws(), vec![36]);
    }

    #[test]
    fn test_failed_geometry_upload_is_retried() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        device.set_failing_buffer_uploads(true);
        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(outcome, RenderOutcome::Aborted(RenderError::BufferUploadFailed(_))));
        assert!(device.draws().is_empty());

        device.set_failing_buffer_uploads(false);
        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(outcome.is_rendered(), "{outcome:?}");
        assert_eq!(device.draws(), vec![36]);
    }

    #[test]
    fn test_scalar_mode_change_reuploads_volume() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();
        let cells: Vec<u8> = (0..27).collect();
        image.set_cell_scalars(ScalarArray::single("cells", cells)).unwrap();

        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert_eq!(mapper.resources().uploaded_volume().unwrap().association, Association::Point);

        device.clear_calls();
        mapper.options_mut().scalar_mode = ScalarMode::UseCellData;
        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(outcome.is_rendered(), "{outcome:?}");
        assert_eq!(device.count(|c| matches!(c, DeviceCall::UploadTexture { size, .. } if size[2] > 1)), 1);
        let uploaded = mapper.resources().uploaded_volume().unwrap();
        assert_eq!(uploaded.association, Association::Cell);
        assert_eq!(uploaded.texture_size, [3, 3, 3]);
    }

    #[test]
    fn test_invalid_options_skip_without_device_calls() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        mapper.options_mut().sample_distance = 0.0;
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(matches!(
            outcome,
            RenderOutcome::Skipped(ValidationError::InvalidOptions(VolumeError::InvalidOption {
                name: "sample_distance",
                ..
            }))
        ));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_wide_float_range_uses_identity_shader_remap() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = ImageData::new([0, 3, 0, 3, 0, 3], DVec3::ONE, DVec3::ZERO).unwrap();
        let values: Vec<f32> = (0..64u8).map(|i| f32::from(i) * 2_000.0).collect();
        image.set_point_scalars(ScalarArray::single("wide", values)).unwrap();

        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(outcome.is_rendered(), "{outcome:?}");
        let program = mapper.resources().frame_resources().unwrap().program;
        assert_eq!(device.uniform(program, "shift"), Some(UniformValue::Float(0.0)));
        assert_eq!(device.uniform(program, "scale"), Some(UniformValue::Float(1.0)));
    }

    #[test]
    fn test_release_frees_everything() {
        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        let mut image = image();
        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));

        mapper.release(&mut device);
        assert_eq!(device.live_objects(), 0);
    }
}
