/// Buffer - Vulkan implementation of the Buffer trait

use quasar_gpu::quasar::{Error, Result};
use quasar_gpu::quasar::device::{Buffer as DeviceBuffer, BufferDesc};
use quasar_gpu::{engine_bail, engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{buffer_usage_to_vk, memory_location};

/// Vulkan buffer implementation
///
/// Upload, dynamic and readback buffers live in host-visible memory that
/// gpu-allocator keeps persistently mapped.
pub struct Buffer {
    /// Shared GPU context (device, allocator, queues)
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    desc: BufferDesc,
    device_address: u64,
}

impl Buffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.flags))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("quasar::vulkan",
                    "Failed to create buffer '{}' of {} bytes: {:?}", desc.name, desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocated = ctx.lock_allocator().and_then(|mut allocator| {
                allocator.allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: memory_location(desc.usage),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("quasar::vulkan", "Out of GPU memory for buffer '{}' ({:.2} MB)", desc.name, size_mb);
                    Error::OutOfMemory
                })
            });
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // From here on Drop releases both the buffer and its memory
            let mut created = Self {
                device_address: 0,
                buffer,
                desc: desc.clone(),
                allocation: None,
                ctx,
            };
            let (memory, memory_offset) = (allocation.memory(), allocation.offset());
            created.allocation = Some(allocation);
            created.ctx.device.bind_buffer_memory(buffer, memory, memory_offset)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to bind buffer memory: {:?}", e))?;

            let address_info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            created.device_address = created.ctx.device.get_buffer_device_address(&address_info);
            Ok(created)
        }
    }

    fn mapped_range(&self, offset: u64, len: usize) -> Result<*mut u8> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.desc.size) {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "Range {}..{} outside buffer '{}' ({} bytes)", offset, offset + len as u64, self.desc.name, self.desc.size);
        }
        let mapped = self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr());
        match mapped {
            Some(ptr) => Ok(unsafe { (ptr.as_ptr() as *mut u8).add(offset as usize) }),
            None => engine_bail!(InvalidState => "quasar::vulkan",
                "Buffer '{}' is not CPU-accessible", self.desc.name),
        }
    }
}

impl DeviceBuffer for Buffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn gpu_address(&self) -> u64 {
        self.device_address
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let dst = self.mapped_range(offset, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let src = self.mapped_range(offset, out.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
