//! GPU lookup tables sampled from the volume's transfer functions.
//!
//! One color table and a set of opacity tables keyed by level. Each table
//! remembers what it was built from and only re-samples when its function,
//! the scalar range or (for opacity) the compositing parameters change.

use volcast_core::{
    correct_opacity, BlendMode, BuildMarker, ColorTransferFunction, PiecewiseFunction, PixelFormat,
    ScalarType, TextureFormat, VolumeError,
};

use crate::binding::TextureUnitGuard;
use crate::device::{
    Filter, GpuDevice, SamplerState, TextureHandle, TextureTarget, TextureUpload, Wrap,
};
use crate::error::{RenderError, RenderResult};

/// Texture unit the color table is bound to.
pub const COLOR_TABLE_UNIT: u32 = 1;
/// Texture unit the opacity table is bound to.
pub const OPACITY_TABLE_UNIT: u32 = 2;

fn sampler_for(linear: bool) -> SamplerState {
    let filter = if linear { Filter::Linear } else { Filter::Nearest };
    SamplerState::new(Wrap::ClampToEdge, filter)
}

/// Rejects component layouts the tables cannot express.
pub fn check_layout(components: usize, independent: bool) -> Result<(), VolumeError> {
    if independent && components != 1 {
        return Err(VolumeError::UnsupportedComponentLayout {
            components,
            independent,
        });
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn upload_table<D: GpuDevice + ?Sized>(
    device: &mut D,
    unit: u32,
    texture: TextureHandle,
    pixel_format: PixelFormat,
    values: &[f32],
    linear: bool,
) -> RenderResult<()> {
    let width = (values.len() / pixel_format.channels()) as u32;
    let internal_format = match pixel_format {
        PixelFormat::Red => TextureFormat::R32Float,
        PixelFormat::Rgb | PixelFormat::Rgba => TextureFormat::Rgb32Float,
    };

    let mut device = TextureUnitGuard::new(device);
    device.active_texture(unit);
    device.bind_texture(TextureTarget::D1, Some(texture));
    device.upload_texture(
        texture,
        &TextureUpload {
            size: [width, 1, 1],
            internal_format,
            pixel_format,
            transfer_type: ScalarType::Float32,
            data: bytemuck::cast_slice(values),
        },
    )?;
    device.set_sampler(texture, sampler_for(linear))
}

/// The color lookup table.
#[derive(Debug)]
pub struct ColorTable {
    texture: TextureHandle,
    width: usize,
    marker: BuildMarker,
    range: Option<(f64, f64)>,
    linear: bool,
}

impl ColorTable {
    /// Creates the (empty) table texture.
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, width: usize) -> Self {
        Self {
            texture: device.create_texture(TextureTarget::D1),
            width: width.max(2),
            marker: BuildMarker::new(),
            range: None,
            linear: true,
        }
    }

    #[must_use]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Brings the table up to date with `function` over `range`.
    ///
    /// Seeds `function` with a default ramp when it has fewer than two points.
    /// Returns whether the table was re-sampled.
    pub fn refresh<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut ColorTransferFunction,
        range: (f64, f64),
        linear: bool,
    ) -> RenderResult<bool> {
        if function.seed_defaults(range) {
            log::debug!("seeded default color ramp over {range:?}");
        }

        if self.marker.is_stale(function.mtime()) || self.range != Some(range) {
            let values: Vec<f32> = function
                .table(range, self.width)
                .iter()
                .flat_map(|c| c.to_array())
                .collect();
            upload_table(device, COLOR_TABLE_UNIT, self.texture, PixelFormat::Rgb, &values, linear)?;
            self.marker.mark_built();
            self.range = Some(range);
            self.linear = linear;
            log::debug!("rebuilt color table ({} entries)", self.width);
            return Ok(true);
        }

        if self.linear != linear {
            device.set_sampler(self.texture, sampler_for(linear))?;
            self.linear = linear;
        }
        Ok(false)
    }

    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        device.delete_texture(self.texture);
        self.marker.invalidate();
        self.range = None;
    }
}

/// Parameters an opacity table is sampled with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityParams {
    pub blend_mode: BlendMode,
    pub sample_distance: f64,
    pub unit_distance: f64,
    pub range: (f64, f64),
    pub linear: bool,
}

impl OpacityParams {
    /// Whether a table built with `self` must be re-sampled for `next`.
    fn needs_rebuild(&self, next: &OpacityParams) -> bool {
        if self.range != next.range || self.blend_mode != next.blend_mode {
            return true;
        }
        next.blend_mode == BlendMode::Composite
            && (self.sample_distance != next.sample_distance || self.unit_distance != next.unit_distance)
    }
}

/// One opacity lookup table.
#[derive(Debug)]
pub struct OpacityTable {
    texture: TextureHandle,
    width: usize,
    marker: BuildMarker,
    built_with: Option<OpacityParams>,
}

impl OpacityTable {
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, width: usize) -> Self {
        Self {
            texture: device.create_texture(TextureTarget::D1),
            width: width.max(2),
            marker: BuildMarker::new(),
            built_with: None,
        }
    }

    #[must_use]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Brings the table up to date. In composite mode the sampled opacities
    /// are corrected from the unit distance to the sample distance.
    ///
    /// Returns whether the table was re-sampled.
    pub fn refresh<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut PiecewiseFunction,
        params: OpacityParams,
    ) -> RenderResult<bool> {
        if function.seed_defaults(params.range) {
            log::debug!("seeded default opacity ramp over {:?}", params.range);
        }

        let rebuild = self.marker.is_stale(function.mtime())
            || self.built_with.map_or(true, |built| built.needs_rebuild(&params));

        if rebuild {
            let mut values = function.table(params.range, self.width);
            if params.blend_mode == BlendMode::Composite {
                for v in &mut values {
                    *v = correct_opacity(*v, params.sample_distance, params.unit_distance);
                }
            }
            upload_table(
                device,
                OPACITY_TABLE_UNIT,
                self.texture,
                PixelFormat::Red,
                &values,
                params.linear,
            )?;
            self.marker.mark_built();
            self.built_with = Some(params);
            log::debug!("rebuilt opacity table ({:?})", params.blend_mode);
            return Ok(true);
        }

        if let Some(built) = self.built_with.as_mut() {
            if built.linear != params.linear {
                device.set_sampler(self.texture, sampler_for(params.linear))?;
            }
            *built = params;
        }
        Ok(false)
    }

    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        device.delete_texture(self.texture);
        self.marker.invalidate();
        self.built_with = None;
    }
}

/// Opacity tables indexed by level.
#[derive(Debug)]
pub struct OpacityTables {
    tables: Vec<OpacityTable>,
}

impl OpacityTables {
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, levels: usize, width: usize) -> Self {
        Self {
            tables: (0..levels).map(|_| OpacityTable::new(device, width)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn level(&self, level: usize) -> RenderResult<&OpacityTable> {
        self.tables.get(level).ok_or(RenderError::InvalidOpacityLevel {
            level,
            count: self.tables.len(),
        })
    }

    pub fn level_mut(&mut self, level: usize) -> RenderResult<&mut OpacityTable> {
        let count = self.tables.len();
        self.tables
            .get_mut(level)
            .ok_or(RenderError::InvalidOpacityLevel { level, count })
    }

    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for table in &mut self.tables {
            table.release(device);
        }
    }
}

/// The color table plus the opacity tables of a volume.
#[derive(Debug)]
pub struct TransferFunctionTables {
    color: ColorTable,
    opacity: OpacityTables,
}

impl TransferFunctionTables {
    /// Creates one color table and `opacity_levels` opacity tables.
    pub fn new<D: GpuDevice + ?Sized>(device: &mut D, width: usize, opacity_levels: usize) -> Self {
        Self {
            color: ColorTable::new(device, width),
            opacity: OpacityTables::new(device, opacity_levels, width),
        }
    }

    #[must_use]
    pub fn color(&self) -> &ColorTable {
        &self.color
    }

    #[must_use]
    pub fn opacity(&self) -> &OpacityTables {
        &self.opacity
    }

    pub fn refresh_color<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut ColorTransferFunction,
        range: (f64, f64),
        linear: bool,
        components: usize,
        independent: bool,
    ) -> RenderResult<bool> {
        check_layout(components, independent)?;
        self.color.refresh(device, function, range, linear)
    }

    pub fn refresh_opacity<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        function: &mut PiecewiseFunction,
        params: OpacityParams,
        level: usize,
        (components, independent): (usize, bool),
    ) -> RenderResult<bool> {
        check_layout(components, independent)?;
        self.opacity.level_mut(level)?.refresh(device, function, params)
    }

    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        self.color.release(device);
        self.opacity.release(device);
    }
}
