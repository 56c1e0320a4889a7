/// Swapchain trait - for window presentation

use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat};

/// Swapchain for presenting rendered images to a window
///
/// The window itself is owned by the caller; the swapchain only knows its
/// surface and current pixel size.
pub trait Swapchain: Send + Sync {
    /// Acquire the next available back-buffer index
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Present the back buffer at `image_index`
    ///
    /// The back buffer must be in the `PRESENT` state.
    fn present(&mut self, image_index: u32) -> Result<()>;

    /// Recreate the back buffers at a new size
    ///
    /// The GPU must be idle. Back buffers returned by an earlier
    /// `back_buffers` call are invalid afterwards.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    /// Native textures wrapping the current back buffers, in image-index order
    fn back_buffers(&self) -> Result<Vec<Box<dyn Texture>>>;

    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Width of the back buffers in pixels
    fn width(&self) -> u32;

    /// Height of the back buffers in pixels
    fn height(&self) -> u32;

    /// Pixel format of the back buffers
    fn format(&self) -> TextureFormat;
}
