/*!
# Quasar GPU - Vulkan Backend

Vulkan 1.3 implementation of the `quasar_gpu` native device traits.

Built on `ash` for the API bindings and `gpu-allocator` for memory. Uses
dynamic rendering, synchronization2 and timeline semaphores; descriptor heaps
are emulated on top of update-after-bind descriptor sets so bindless indices
work the same way they do on heap-based APIs.

Shaders are loaded as precompiled SPIR-V and reflected with `spirq`.
Validation layer support is compiled in with the `vulkan-validation` feature.

# Example

```no_run
use quasar_gpu::quasar::{Backend, Config};
use quasar_gpu_vulkan::{SpirvShaderCompiler, VulkanConfig, VulkanDevice};
# fn run(window: &winit::window::Window) -> quasar_gpu::quasar::Result<()> {
let size = window.inner_size();
let device = VulkanDevice::new(window, VulkanConfig::default())?;
let swapchain = device.create_swapchain(window, size.width, size.height)?;
let compiler = SpirvShaderCompiler::new("shaders");
let mut backend = Backend::new(Box::new(device), Box::new(compiler), Some(Box::new(swapchain)), Config::default())?;
backend.begin_frame()?;
backend.end_frame()?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_config;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_descriptor_heap;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_queue;
mod vulkan_swapchain;
mod vulkan_shader_compiler;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::VulkanDevice;
pub use vulkan_config::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats, VulkanConfig};
pub use vulkan_buffer::Buffer as VulkanBuffer;
pub use vulkan_texture::Texture as VulkanTexture;
pub use vulkan_descriptor_heap::DescriptorHeap as VulkanDescriptorHeap;
pub use vulkan_pipeline::Pipeline as VulkanPipeline;
pub use vulkan_command_list::CommandList as VulkanCommandList;
pub use vulkan_queue::CommandQueue as VulkanCommandQueue;
pub use vulkan_swapchain::Swapchain as VulkanSwapchain;
pub use vulkan_shader_compiler::SpirvShaderCompiler;

#[cfg(feature = "vulkan-validation")]
pub use debug::print_validation_stats_report;
