//! Frame-level tests of the volume mapper against the recording device.

use proptest::prelude::*;
use volcast::*;
use volcast_render::{Capability, DeviceCall, TextureTarget, UniformValue};

fn renderer() -> Renderer {
    Renderer::new(Camera::new(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO), [320, 240])
}

fn ramp(extent: [i32; 6]) -> ImageData {
    let mut image = ImageData::new(extent, DVec3::ONE, DVec3::ZERO).unwrap();
    let count = image.number_of_points();
    let values: Vec<u16> = (0..count).map(|i| (i % 1000) as u16).collect();
    image.set_point_scalars(ScalarArray::single("density", values)).unwrap();
    image
}

fn is_volume_upload(call: &DeviceCall) -> bool {
    matches!(call, DeviceCall::UploadTexture { size, .. } if size[2] > 1)
}

#[test]
fn test_volume_uploaded_once_until_modified() {
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::default();
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 7, 0, 7, 0, 7]);

    for _ in 0..3 {
        let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert!(outcome.is_rendered(), "{outcome:?}");
    }
    assert_eq!(device.draws(), vec![36, 36, 36]);
    assert_eq!(device.count(is_volume_upload), 1);

    image.modified();
    mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    assert_eq!(device.count(is_volume_upload), 2);
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn test_unit_float_volume_end_to_end() {
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::default();
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ImageData::new([0, 9, 0, 9, 0, 9], DVec3::ONE, DVec3::ZERO).unwrap();
    let values: Vec<f32> = (0..1000).map(|i| i as f32 / 999.0).collect();
    image.set_point_scalars(ScalarArray::single("unit", values)).unwrap();

    let bounds = compute_bounds(
        image.extent(),
        image.whole_extent(),
        image.spacing(),
        image.origin(),
        Association::Point,
    );
    assert_eq!(bounds, Bounds([0.0, 9.0, 0.0, 9.0, 0.0, 9.0]));

    let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    assert!(outcome.is_rendered(), "{outcome:?}");
    assert_eq!(device.count(is_volume_upload), 1);
    assert_eq!(device.draws(), vec![36]);

    let uploaded = mapper.resources().uploaded_volume().unwrap();
    assert_eq!(uploaded.bounds, bounds);
    assert_eq!(uploaded.texture_size, [10, 10, 10]);

    let program = mapper.resources().frame_resources().unwrap().program;
    assert_eq!(device.uniform(program, "shift"), Some(UniformValue::Float(0.0)));
    assert_eq!(device.uniform(program, "scale"), Some(UniformValue::Float(1.0)));
    assert_eq!(device.uniform(program, "vol_extents_min"), Some(Vec3::ZERO.into()));
    assert_eq!(device.uniform(program, "vol_extents_max"), Some(Vec3::splat(9.0).into()));
}

#[test]
fn test_transfer_function_edit_rebuilds_only_that_table() {
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::default();
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 3, 0, 3, 0, 3]);

    mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    let frame = mapper.resources().frame_resources().unwrap();
    device.clear_calls();

    volume.property.color.add_rgb_point(10.0, Vec3::new(1.0, 0.0, 0.0));
    mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    assert_eq!(device.texture_uploads(frame.color_table), 1);
    assert_eq!(device.texture_uploads(frame.opacity_table), 0);
    assert_eq!(device.texture_uploads(frame.volume_texture), 0);
    assert_eq!(device.texture_uploads(frame.noise_texture), 0);
}

#[test]
fn test_unsupported_blend_mode_touches_nothing() {
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::new(MapperOptions::new().with_blend_mode(BlendMode::Isosurface));
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 3, 0, 3, 0, 3]);

    let outcome = mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    assert!(matches!(
        outcome,
        RenderOutcome::Skipped(ValidationError::UnsupportedBlendMode(BlendMode::Isosurface))
    ));
    assert!(device.calls().is_empty());
}

#[test]
fn test_options_from_json_reach_the_shader() {
    let options = MapperOptions::from_json(r#"{ "blend_mode": "MaximumIntensity", "sample_distance": 0.25 }"#).unwrap();
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::new(options);
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 3, 0, 3, 0, 3]);

    assert!(mapper
        .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
        .is_rendered());
    let program = mapper.resources().frame_resources().unwrap().program;
    assert_eq!(device.uniform(program, "blend_mode"), Some(UniformValue::Int(1)));
    assert_eq!(device.uniform(program, "sample_distance"), Some(UniformValue::Float(0.25)));
}

#[test]
fn test_options_json_value_roundtrip() {
    let options = MapperOptions::new().with_table_width(256).with_noise_size(64);
    let value = serde_json::to_value(&options).unwrap();
    assert_eq!(value["table_width"], 256);
    assert_eq!(value["noise_size"], 64);
    let back: MapperOptions = serde_json::from_value(value).unwrap();
    assert_eq!(back, options);
}

#[test]
fn test_cell_scalars_use_zero_texture_offset() {
    let mut image = ImageData::new([0, 4, 0, 4, 0, 4], DVec3::ONE, DVec3::ZERO).unwrap();
    let values: Vec<f32> = (0..64u8).map(f32::from).collect();
    image.set_cell_scalars(ScalarArray::single("pressure", values)).unwrap();

    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::new(MapperOptions::new().with_scalar_mode(ScalarMode::UseCellData));
    let renderer = renderer();
    let mut volume = Volume::default();

    assert!(mapper
        .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
        .is_rendered());
    let frame = mapper.resources().frame_resources().unwrap();
    assert_eq!(frame.volume.association, Association::Cell);
    assert_eq!(device.texture(frame.volume_texture).unwrap().size, [4, 4, 4]);
    assert_eq!(device.uniform(frame.program, "texture_coord_offset"), Some(Vec3::ZERO.into()));
}

#[test]
fn test_render_leaves_bindings_as_found() {
    let mut device = RecordingDevice::new();
    device.active_texture(5);
    device.bind_texture(TextureTarget::D2, None);
    device.set_enabled(Capability::Blend, true);
    let before = device.bindings().clone();

    let mut mapper = VolumeMapper::default();
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 3, 0, 3, 0, 3]);
    for _ in 0..2 {
        mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
        assert_eq!(device.bindings(), &before);
    }
}

#[test]
fn test_release_frees_everything() {
    let mut device = RecordingDevice::new();
    let mut mapper = VolumeMapper::default();
    let renderer = renderer();
    let mut volume = Volume::default();
    let mut image = ramp([0, 3, 0, 3, 0, 3]);

    mapper.render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image));
    assert!(device.live_objects() > 0);
    mapper.release(&mut device);
    assert_eq!(device.live_objects(), 0);

    // Resources come back on the next frame.
    assert!(mapper
        .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
        .is_rendered());
}

proptest! {
    #[test]
    fn extents_uniforms_match_bounds(
        nx in 2i32..6, ny in 2i32..6, nz in 2i32..6,
        sx in 0.5f64..3.0, sy in 0.5f64..3.0, sz in 0.5f64..3.0,
    ) {
        let extent = [0, nx - 1, 0, ny - 1, 0, nz - 1];
        let spacing = DVec3::new(sx, sy, sz);
        let mut image = ImageData::new(extent, spacing, DVec3::ZERO).unwrap();
        let values: Vec<f32> = (0..image.number_of_points()).map(|i| i as f32).collect();
        image.set_point_scalars(ScalarArray::single("v", values)).unwrap();

        let mut device = RecordingDevice::new();
        let mut mapper = VolumeMapper::default();
        let renderer = renderer();
        let mut volume = Volume::default();
        prop_assert!(mapper
            .render(&mut device, &mut RenderRequest::new(&renderer, &mut volume, &mut image))
            .is_rendered());

        let bounds = compute_bounds(extent, extent, spacing, DVec3::ZERO, Association::Point);
        let program = mapper.resources().frame_resources().unwrap().program;
        prop_assert_eq!(
            device.uniform(program, "vol_extents_max"),
            Some(bounds.max().as_vec3().into())
        );
        prop_assert_eq!(device.draws(), vec![36]);
    }
}
