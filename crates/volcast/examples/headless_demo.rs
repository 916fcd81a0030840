//! Renders a synthetic density field with each supported blend mode and saves
//! one PNG per mode.
//!
//! Run with `cargo run -p volcast --example headless_demo`.

use volcast::*;

const SIZE: i32 = 48;

/// Two overlapping Gaussian blobs.
#[allow(clippy::cast_possible_truncation)]
fn blobs() -> Result<ImageData> {
    let mut image = ImageData::new([0, SIZE - 1, 0, SIZE - 1, 0, SIZE - 1], DVec3::ONE, DVec3::ZERO)?;
    let a = DVec3::new(16.0, 24.0, 24.0);
    let b = DVec3::new(32.0, 24.0, 20.0);
    let mut values = Vec::with_capacity(image.number_of_points());
    for z in 0..SIZE {
        for y in 0..SIZE {
            for x in 0..SIZE {
                let p = DVec3::new(f64::from(x), f64::from(y), f64::from(z));
                let density = (-(p - a).length_squared() / 60.0).exp() + 0.7 * (-(p - b).length_squared() / 40.0).exp();
                values.push(density as f32);
            }
        }
    }
    image.set_point_scalars(ScalarArray::single("density", values))?;
    Ok(image)
}

#[allow(clippy::cast_precision_loss)]
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut image = blobs()?;
    let extent = (SIZE - 1) as f32;
    let mut camera = Camera::new(Vec3::new(1.5, 1.0, 2.0) * extent, Vec3::ZERO);
    camera.look_at_box(Vec3::ZERO, Vec3::splat(extent));
    let renderer = Renderer::new(camera, [512, 512]);

    let mut property = VolumeProperty::new().with_shade(true);
    property
        .color
        .add_rgb_point(0.0, Vec3::new(0.1, 0.1, 0.4))
        .add_rgb_point(0.5, Vec3::new(0.9, 0.4, 0.1))
        .add_rgb_point(1.0, Vec3::new(1.0, 1.0, 0.8));
    property.scalar_opacity.add_point(0.05, 0.0).add_point(1.0, 0.8);
    let mut volume = Volume::new(property);

    let mut headless = HeadlessRenderer::new(512, 512)?;
    for (mode, name) in [
        (BlendMode::Composite, "composite"),
        (BlendMode::MaximumIntensity, "mip"),
        (BlendMode::MinimumIntensity, "minip"),
        (BlendMode::Additive, "additive"),
    ] {
        let mut mapper = VolumeMapper::new(MapperOptions::new().with_blend_mode(mode).with_sample_distance(0.5));
        match headless.render(&mut mapper, &mut RenderRequest::new(&renderer, &mut volume, &mut image))? {
            RenderOutcome::Rendered => {
                let filename = format!("volcast_{name}.png");
                headless.save(&filename)?;
                log::info!("{name}: drew in {:?}, saved {filename}", mapper.time_to_draw());
            }
            other => log::warn!("{name}: {other:?}"),
        }
        mapper.release(headless.device_mut());
    }
    Ok(())
}
