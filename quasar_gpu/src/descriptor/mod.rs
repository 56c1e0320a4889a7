/// Descriptor allocators - staging heaps, per-frame render-pass heaps

pub mod staging_heap;
pub mod render_pass_heap;
pub mod bindless;

pub use staging_heap::*;
pub use render_pass_heap::*;
pub use bindless::*;

use crate::graphics_device::{CpuDescriptorHandle, GpuDescriptorHandle};

/// A slot of a descriptor heap
///
/// `gpu` is non-null only for slots of shader-visible heaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Descriptor {
    pub cpu: CpuDescriptorHandle,
    pub gpu: GpuDescriptorHandle,
    pub heap_index: u32,
}

impl Descriptor {
    /// A descriptor is valid iff its CPU handle is non-zero
    pub fn is_valid(&self) -> bool {
        !self.cpu.is_null()
    }

    pub fn is_shader_visible(&self) -> bool {
        !self.gpu.is_null()
    }
}
