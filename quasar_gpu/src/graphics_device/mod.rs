/// Graphics device module - native-API abstraction traits and types

// Module declarations
pub mod graphics_device;
pub mod texture;
pub mod buffer;
pub mod pipeline;
pub mod command_list;
pub mod queue;
pub mod swapchain;
pub mod descriptor;
pub mod resource_state;
pub mod view;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use texture::*;
pub use buffer::*;
pub use pipeline::*;
pub use command_list::*;
pub use queue::*;
pub use swapchain::*;
pub use descriptor::*;
pub use resource_state::*;
pub use view::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
