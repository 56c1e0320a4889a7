/// Native descriptor heaps and descriptor handles

use std::any::Any;

/// CPU-side address of a descriptor slot (0 = null)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CpuDescriptorHandle(pub u64);

/// GPU-side address of a descriptor slot in a shader-visible heap (0 = null)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct GpuDescriptorHandle(pub u64);

impl CpuDescriptorHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Handle of the slot `index` positions after this one
    pub fn offset(&self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

impl GpuDescriptorHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn offset(&self, index: u32, increment: u32) -> Self {
        Self(self.0 + index as u64 * increment as u64)
    }
}

/// Kind of descriptors a heap stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapType {
    /// Constant-buffer, shader-resource and unordered-access views
    CbvSrvUav,
    /// Render-target views
    RenderTarget,
    /// Depth-stencil views
    DepthStencil,
}

/// Descriptor for creating a native descriptor heap
#[derive(Debug, Clone)]
pub struct DescriptorHeapDesc {
    pub name: String,
    pub heap_type: DescriptorHeapType,
    pub capacity: u32,
    /// Shader-visible heaps can be bound to command lists and have GPU handles
    pub shader_visible: bool,
}

/// Native descriptor heap
///
/// Slots are written with [`GraphicsDevice::create_view`](crate::graphics_device::GraphicsDevice::create_view)
/// and [`GraphicsDevice::copy_descriptors`](crate::graphics_device::GraphicsDevice::copy_descriptors).
pub trait DescriptorHeap: Send + Sync {
    fn desc(&self) -> &DescriptorHeapDesc;

    /// CPU handle of slot 0, never null
    fn cpu_start(&self) -> CpuDescriptorHandle;

    /// GPU handle of slot 0, null for CPU-only heaps
    fn gpu_start(&self) -> GpuDescriptorHandle;

    /// Distance in handle units between two consecutive slots
    fn increment(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
