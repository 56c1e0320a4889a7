/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Back buffers are handed out as non-owning textures. Every image is kept
/// in `PRESENT_SRC_KHR` outside of a frame, matching the `PRESENT` state the
/// core tracks for back buffers.

use quasar_gpu::quasar::{Error, Result, FRAMES_IN_FLIGHT};
use quasar_gpu::quasar::device::{Swapchain as DeviceSwapchain, Texture as DeviceTexture, TextureFormat, TextureInfo, TextureUsage};
use quasar_gpu::{engine_bail, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::vk_to_texture_format;
use crate::vulkan_texture::Texture;

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    format: TextureFormat,
    extent: vk::Extent2D,

    /// One semaphore per frame in flight (for acquire)
    image_available_semaphores: Vec<vk::Semaphore>,
    /// One semaphore per swapchain image (for present)
    render_finished_semaphores: Vec<vk::Semaphore>,
    current_frame: usize,
}

impl Swapchain {
    /// Create a swapchain for a surface the device can present to
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if ctx.present_queue.is_none() {
            unsafe { surface_loader.destroy_surface(surface, None); }
            engine_bail!(InitializationFailed => "quasar::vulkan", "Device has no queue able to present to this window");
        }

        let surface_formats = unsafe {
            surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
        };
        let surface_format = match surface_formats.as_deref() {
            Ok(formats) => choose_surface_format(formats),
            Err(e) => {
                engine_error!("quasar::vulkan", "Failed to query surface formats: {:?}", e);
                None
            }
        };
        let (surface_format, format) = match surface_format {
            Some(chosen) => chosen,
            None => {
                unsafe { surface_loader.destroy_surface(surface, None); }
                engine_bail!(InitializationFailed => "quasar::vulkan", "Surface offers no supported 8-bit RGBA format");
            }
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let mut created = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            surface_format,
            format,
            extent: vk::Extent2D { width, height },
            image_available_semaphores: Vec::new(),
            render_finished_semaphores: Vec::new(),
            current_frame: 0,
        };

        // From here on Drop cleans up whatever was created
        for _ in 0..FRAMES_IN_FLIGHT {
            let semaphore = created.create_semaphore()?;
            created.image_available_semaphores.push(semaphore);
        }
        created.build(width, height)?;

        engine_info!("quasar::vulkan", "Swapchain created: {}x{}, {} images, {:?}",
            created.extent.width, created.extent.height, created.images.len(), created.format);
        Ok(created)
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe {
            self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create semaphore: {:?}", e))
        }
    }

    /// (Re)create the native swapchain and move its images to PRESENT_SRC_KHR
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
                .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get surface capabilities: {:?}", e))?
        };

        let extent = choose_extent(&capabilities, width, height);
        let image_count = if capabilities.max_image_count > 0 {
            (capabilities.min_image_count + 1).min(capabilities.max_image_count)
        } else {
            capabilities.min_image_count + 1
        };

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        unsafe {
            let swapchain = self.swapchain_loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to create swapchain: {:?}", e))?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self.swapchain_loader.get_swapchain_images(swapchain)
                .map_err(|e| engine_err!(InitializationFailed => "quasar::vulkan", "Failed to get swapchain images: {:?}", e))?;
        }

        while self.render_finished_semaphores.len() < self.images.len() {
            let semaphore = self.create_semaphore()?;
            self.render_finished_semaphores.push(semaphore);
        }
        while self.render_finished_semaphores.len() > self.images.len() {
            if let Some(semaphore) = self.render_finished_semaphores.pop() {
                unsafe { self.ctx.device.destroy_semaphore(semaphore, None); }
            }
        }

        let images = self.images.clone();
        self.ctx.one_shot(|device, command_buffer| {
            let barriers: Vec<vk::ImageMemoryBarrier2> = images
                .iter()
                .map(|&image| {
                    vk::ImageMemoryBarrier2::default()
                        .src_stage_mask(vk::PipelineStageFlags2::NONE)
                        .src_access_mask(vk::AccessFlags2::NONE)
                        .dst_stage_mask(vk::PipelineStageFlags2::NONE)
                        .dst_access_mask(vk::AccessFlags2::NONE)
                        .old_layout(vk::ImageLayout::UNDEFINED)
                        .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                })
                .collect();
            let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
            unsafe { device.cmd_pipeline_barrier2(command_buffer, &dependency); }
        })
    }
}

/// Prefer sRGB BGRA/RGBA, then their UNORM variants
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, TextureFormat)> {
    const PREFERRED: [vk::Format; 4] = [
        vk::Format::B8G8R8A8_SRGB,
        vk::Format::R8G8B8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM,
        vk::Format::R8G8B8A8_UNORM,
    ];
    PREFERRED.iter().find_map(|&wanted| {
        formats
            .iter()
            .find(|f| f.format == wanted)
            .and_then(|f| vk_to_texture_format(f.format).map(|format| (*f, format)))
    })
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    }
}

impl DeviceSwapchain for Swapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let image_available = self.image_available_semaphores[self.current_frame];
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
                .map_err(|e| {
                    if e == vk::Result::ERROR_OUT_OF_DATE_KHR {
                        engine_err!(InvalidState => "quasar::vulkan", "Swapchain out of date during acquire")
                    } else {
                        engine_err!("quasar::vulkan", "Failed to acquire next swapchain image: {:?}", e)
                    }
                })?
        };
        if suboptimal {
            engine_warn!("quasar::vulkan", "Swapchain is suboptimal for the surface");
        }

        let mut sync = self.ctx.present_sync.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "Present sync mutex poisoned"))?;
        sync.wait = Some(image_available);
        sync.signal = Some(self.render_finished_semaphores[image_index as usize]);
        Ok(image_index)
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        let wait = match self.render_finished_semaphores.get(image_index as usize) {
            Some(&semaphore) => semaphore,
            None => engine_bail!(InvalidState => "quasar::vulkan",
                "Present of image {} (swapchain has {})", image_index, self.images.len()),
        };
        let present_queue = match self.ctx.present_queue {
            Some(index) => &self.ctx.queues[index],
            None => engine_bail!(InvalidState => "quasar::vulkan", "Device has no present queue"),
        };

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let queue = present_queue.handle.lock()
                .map_err(|_| engine_err!("quasar::vulkan", "Present queue mutex poisoned"))?;
            unsafe { self.swapchain_loader.queue_present(*queue, &present_info) }
        };
        self.current_frame = (self.current_frame + 1) % self.image_available_semaphores.len();

        match result {
            Ok(false) => Ok(()),
            Ok(true) => {
                engine_warn!("quasar::vulkan", "Swapchain is suboptimal for the surface");
                Ok(())
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Err(engine_err!(InvalidState => "quasar::vulkan", "Swapchain out of date during present"))
            }
            Err(e) => Err(engine_err!("quasar::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.ctx.wait_idle()?;
        self.build(width, height)?;
        // Leftover acquire/present links refer to the old images
        if let Ok(mut sync) = self.ctx.present_sync.lock() {
            *sync = Default::default();
        }
        engine_info!("quasar::vulkan", "Swapchain resized to {}x{} ({} images)",
            self.extent.width, self.extent.height, self.images.len());
        Ok(())
    }

    fn back_buffers(&self) -> Result<Vec<Box<dyn DeviceTexture>>> {
        if self.images.is_empty() {
            return Err(Error::InvalidState("Swapchain has no images".to_string()));
        }
        let info = TextureInfo {
            width: self.extent.width,
            height: self.extent.height,
            array_layers: 1,
            mip_levels: 1,
            format: self.format,
            usage: TextureUsage::RENDER_TARGET,
        };
        Ok(self.images
            .iter()
            .map(|&image| {
                Box::new(Texture::borrowed(self.ctx.clone(), image, self.surface_format.format, info.clone()))
                    as Box<dyn DeviceTexture>
            })
            .collect())
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            for &semaphore in self.image_available_semaphores.iter().chain(&self.render_finished_semaphores) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
