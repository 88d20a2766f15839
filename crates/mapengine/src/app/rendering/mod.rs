mod renderer;
mod target;
pub mod text;

pub use renderer::Renderer;
pub use target::{FrameBuffer, PixelRect, RenderTarget};
