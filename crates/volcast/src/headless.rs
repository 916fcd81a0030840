//! Rendering volumes without a window.
//!
//! [`HeadlessRenderer`] owns a surface-less wgpu device and an offscreen
//! target. Each [`HeadlessRenderer::render`] clears the target and runs one
//! mapper frame into it; the pixels can then be read back or saved. Useful for
//! integration tests, batch processing and automated screenshots.

use pollster::FutureExt;
use volcast_render::{
    save_image, OffscreenTarget, RenderError, RenderOutcome, RenderRequest, ScreenshotError, VolumeMapper,
    VolumeResources, WgpuDevice,
};

/// Errors from headless rendering.
#[derive(Debug, thiserror::Error)]
pub enum HeadlessError {
    /// Device creation, drawing or readback failed.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Writing the captured frame failed.
    #[error("failed to save image: {0}")]
    Screenshot(#[from] ScreenshotError),
}

/// A surface-less device plus the target frames are drawn into.
pub struct HeadlessRenderer {
    device: WgpuDevice,
    target: OffscreenTarget,
    background: wgpu::Color,
}

impl HeadlessRenderer {
    /// Creates a headless device and a `width x height` offscreen target.
    ///
    /// # Example
    /// ```no_run
    /// let renderer = volcast::HeadlessRenderer::new(640, 480).unwrap();
    /// assert_eq!(renderer.size(), [640, 480]);
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self, HeadlessError> {
        let mut device = WgpuDevice::new_headless().block_on()?;
        let target = OffscreenTarget::new(device.device(), width, height);
        device.set_render_target(Some(target.target()));
        log::info!("headless renderer ready at {}x{}", target.width(), target.height());
        Ok(Self {
            device,
            target,
            background: wgpu::Color::BLACK,
        })
    }

    /// Sets the color the target is cleared to before each frame.
    #[must_use]
    pub fn with_background(mut self, background: wgpu::Color) -> Self {
        self.background = background;
        self
    }

    #[must_use]
    pub fn size(&self) -> [u32; 2] {
        [self.target.width(), self.target.height()]
    }

    pub fn device(&self) -> &WgpuDevice {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut WgpuDevice {
        &mut self.device
    }

    /// Clears the target and renders one frame of `request` into it.
    pub fn render<R: VolumeResources>(
        &mut self,
        mapper: &mut VolumeMapper<R>,
        request: &mut RenderRequest<'_>,
    ) -> Result<RenderOutcome, HeadlessError> {
        self.device.clear_target(self.background)?;
        Ok(mapper.render(&mut self.device, request))
    }

    /// Reads the target back as tightly packed RGBA8 rows, top row first.
    pub fn read_pixels(&self) -> Result<Vec<u8>, HeadlessError> {
        Ok(self.target.read_pixels(&self.device)?)
    }

    /// Saves the target to a `.png`, `.jpg` or `.jpeg` file.
    pub fn save(&self, filename: &str) -> Result<(), HeadlessError> {
        let pixels = self.read_pixels()?;
        save_image(filename, &pixels, self.target.width(), self.target.height())?;
        Ok(())
    }
}
