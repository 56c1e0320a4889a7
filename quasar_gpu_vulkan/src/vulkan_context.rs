/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything the native objects need after creation:
/// - Device and instance (destroyed when the last object lets go)
/// - Allocator for memory management
/// - Device queues, shared by the command queues of the same family
/// - Command pool for one-shot setup work
/// - Descriptor registry resolving descriptor handles to heap slots
/// - Bindless set layout and the static sampler cache

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use quasar_gpu::quasar::{Error, Result};
use quasar_gpu::quasar::device::QueueType;
use quasar_gpu::{engine_err, engine_error};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_descriptor_heap::DescriptorRegistry;
use crate::vulkan_sampler::SamplerCache;

/// One native queue and the family it belongs to
pub(crate) struct DeviceQueue {
    pub family: u32,
    /// Submission to a `vk::Queue` must be externally synchronized
    pub handle: Mutex<vk::Queue>,
}

/// Binary semaphores linking the next graphics submission to the swapchain
#[derive(Default)]
pub(crate) struct PresentSync {
    /// Signaled by image acquisition, waited on by the submission
    pub wait: Option<vk::Semaphore>,
    /// Signaled by the submission, waited on by present
    pub signal: Option<vk::Semaphore>,
}

/// Shared GPU context for all Vulkan objects.
///
/// Every buffer, texture, pipeline, queue and command list holds an `Arc`
/// to it, so the device outlives everything created from it.
pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Distinct native queues, indexed by `queue_slots`
    pub(crate) queues: Vec<DeviceQueue>,
    /// Graphics, compute, copy
    pub(crate) queue_slots: [usize; 3],
    /// Queue able to present to the window surface, if any
    pub(crate) present_queue: Option<usize>,

    /// Reusable pool for one-shot setup work (TRANSIENT + RESET_COMMAND_BUFFER)
    pub(crate) upload_command_pool: Mutex<vk::CommandPool>,

    /// Layout of the bindless set every pipeline layout carries
    pub(crate) bindless_layout: vk::DescriptorSetLayout,
    pub(crate) max_bindless_descriptors: u32,

    pub(crate) descriptors: DescriptorRegistry,
    pub(crate) samplers: Mutex<SamplerCache>,
    pub(crate) present_sync: Mutex<PresentSync>,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    pub(crate) fn queue(&self, queue_type: QueueType) -> &DeviceQueue {
        let slot = match queue_type {
            QueueType::Graphics => self.queue_slots[0],
            QueueType::Compute => self.queue_slots[1],
            QueueType::Copy => self.queue_slots[2],
        };
        &self.queues[slot]
    }

    pub(crate) fn lock_allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "GPU allocator mutex poisoned"))
    }

    /// Record and run a command buffer on the graphics queue, blocking until it completes
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = self.upload_command_pool.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "Upload command pool mutex poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self.device.allocate_command_buffers(&allocate_info)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let result = self.run_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn run_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to begin one-shot command buffer: {:?}", e))?;
        record(&self.device, command_buffer);
        self.device.end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to end one-shot command buffer: {:?}", e))?;

        let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to create one-shot fence: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let submitted = {
            let queue = self.queue(QueueType::Graphics).handle.lock()
                .map_err(|_| engine_err!("quasar::vulkan", "Graphics queue mutex poisoned"))?;
            self.device.queue_submit(*queue, &[submit_info], fence)
        };
        let result = submitted
            .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX))
            .map_err(|e| engine_err!("quasar::vulkan", "One-shot submission failed: {:?}", e));
        self.device.destroy_fence(fence, None);
        result
    }

    pub(crate) fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle().map_err(|e| {
                engine_error!("quasar::vulkan", "vkDeviceWaitIdle failed: {:?}", e);
                Error::BackendError(format!("Device wait idle failed: {:?}", e))
            })
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            match self.samplers.get_mut() {
                Ok(cache) => cache.destroy_all(&self.device),
                Err(poisoned) => poisoned.into_inner().destroy_all(&self.device),
            }

            self.device.destroy_descriptor_set_layout(self.bindless_layout, None);
            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // Allocator must release its memory blocks while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
