/// GraphicsDevice trait - factory for native GPU objects

use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, CommandQueue, CpuDescriptorHandle, DescriptorHeap,
    DescriptorHeapDesc, NativePipelineDesc, Pipeline, QueueType, ResourceRef, Texture,
    TextureDesc, ViewDesc,
};

/// Native graphics device
///
/// Implemented once per native API (Vulkan, mock device for tests). Every
/// object it creates is destroyed when dropped; the core guarantees the GPU
/// no longer uses an object when it drops it.
pub trait GraphicsDevice: Send + Sync {
    /// Create a buffer of exactly `desc.size` bytes
    ///
    /// Upload, dynamic and readback buffers are persistently mapped.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Box<dyn Buffer>>;

    /// Create a texture in the `COMMON` state
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Box<dyn Texture>>;

    fn create_descriptor_heap(&mut self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>>;

    /// Write a view of `resource` into the slot at `dest`
    ///
    /// # Arguments
    ///
    /// * `resource` - Buffer or texture to view
    /// * `view` - View kind and buffer range
    /// * `dest` - Destination slot (CPU handle of any heap)
    fn create_view(&mut self, resource: ResourceRef<'_>, view: &ViewDesc, dest: CpuDescriptorHandle) -> Result<()>;

    /// Copy `count` consecutive slots from `src` to `dest`
    fn copy_descriptors(&mut self, dest: CpuDescriptorHandle, src: CpuDescriptorHandle, count: u32) -> Result<()>;

    /// Clear the slot at `dest` and release anything the backend created for it
    fn release_view(&mut self, dest: CpuDescriptorHandle) -> Result<()>;

    fn create_pipeline(&mut self, desc: &NativePipelineDesc<'_>) -> Result<Box<dyn Pipeline>>;

    fn create_command_list(&mut self, queue: QueueType) -> Result<Box<dyn CommandList>>;

    /// Create the queue of the given type, its fence starts at 0
    fn create_queue(&mut self, queue: QueueType) -> Result<Box<dyn CommandQueue>>;

    /// Block until the whole device is idle
    fn wait_idle(&self) -> Result<()>;
}
