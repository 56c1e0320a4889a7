/// Texture - Vulkan implementation of the Texture trait

use quasar_gpu::quasar::{Error, Result};
use quasar_gpu::quasar::device::{Texture as DeviceTexture, TextureDesc, TextureInfo};
use quasar_gpu::{engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{texture_format_to_vk, texture_usage_to_vk};

/// Vulkan texture implementation
///
/// Views are not part of the texture: they are created per descriptor slot
/// by `GraphicsDevice::create_view`.
pub struct Texture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) format: vk::Format,
    /// `None` for swapchain images, which the swapchain owns
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
}

impl Texture {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        let format = texture_format_to_vk(desc.format);
        let info = desc.info();

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(desc.mip_levels.max(1))
                .array_layers(desc.array_layers.max(1))
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_create_info, None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create texture image '{}': {:?}", desc.name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocated = ctx.lock_allocator().and_then(|mut allocator| {
                allocator.allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("quasar::vulkan", "Out of GPU memory for texture '{}' ({}x{}, layers: {}, {:.2} MB)",
                        desc.name, desc.width, desc.height, desc.array_layers, size_mb);
                    Error::OutOfMemory
                })
            });
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let (memory, memory_offset) = (allocation.memory(), allocation.offset());
            let texture = Self {
                ctx,
                image,
                format,
                allocation: Some(allocation),
                owns_image: true,
                info,
            };
            texture.ctx.device.bind_image_memory(image, memory, memory_offset)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to bind texture image memory: {:?}", e))?;
            Ok(texture)
        }
    }

    /// Wrap an image owned by someone else (swapchain back buffers)
    pub(crate) fn borrowed(ctx: Arc<GpuContext>, image: vk::Image, format: vk::Format, info: TextureInfo) -> Self {
        Self {
            ctx,
            image,
            format,
            allocation: None,
            owns_image: false,
            info,
        }
    }
}

impl DeviceTexture for Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if !self.owns_image {
            return;
        }
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
