use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture, TextureError};
use winit::window::Window;

use super::FrameBuffer;

/// Owns the pixel buffer shown in the window.
///
/// The buffer keeps the scene's display size for the whole run and persists between
/// frames, so the controller only has to repaint what changed. Window resizes only
/// rescale the surface.
pub struct Renderer {
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = Pixels::new(width, height, surface)?;
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), TextureError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)
    }

    /// Drawing surface over the persistent buffer.
    pub fn frame_target(&mut self) -> Option<FrameBuffer<'_>> {
        FrameBuffer::new(self.pixels.frame_mut(), self.width, self.height)
    }

    pub fn present(&self) -> Result<(), Error> {
        self.pixels.render()
    }
}
