/// Shader-visible heap of one frame in flight
///
/// Layout: `[0, num_reserved)` is the bindless table (slot `i` holds the
/// shader-resource view of the resource whose bindless index is `i`, the
/// same in every frame's copy), `[num_reserved, num_reserved + num_transient)`
/// is bump-allocated for descriptor tables and reset at the start of the
/// frame's turn.

use std::sync::Mutex;
use crate::error::Result;
use crate::graphics_device::{DescriptorHeap, DescriptorHeapDesc, DescriptorHeapType, GraphicsDevice};
use crate::descriptor::Descriptor;

pub struct RenderPassDescriptorHeap {
    heap: Box<dyn DescriptorHeap>,
    heap_index: u32,
    num_reserved: u32,
    num_transient: u32,
    transient_cursor: Mutex<u32>,
}

impl RenderPassDescriptorHeap {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        num_reserved: u32,
        num_transient: u32,
        heap_index: u32,
    ) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc {
            name: name.to_string(),
            heap_type: DescriptorHeapType::CbvSrvUav,
            capacity: num_reserved + num_transient,
            shader_visible: true,
        })?;
        Ok(Self {
            heap,
            heap_index,
            num_reserved,
            num_transient,
            transient_cursor: Mutex::new(0),
        })
    }

    /// Slot `index` of the bindless prefix
    pub fn reserved_descriptor(&self, index: u32) -> Result<Descriptor> {
        if index >= self.num_reserved {
            crate::engine_bail!(CapacityExceeded => "quasar::RenderPassDescriptorHeap",
                "Bindless index {} outside reserved region ({})", index, self.num_reserved);
        }
        Ok(self.descriptor_at(index))
    }

    /// Start a new frame: every transient block handed out before is forgotten
    pub fn reset(&self) {
        if let Ok(mut cursor) = self.transient_cursor.lock() {
            *cursor = 0;
        }
    }

    /// First slot of a fresh contiguous block of `count` transient slots
    pub fn get_user_descriptor_block_start(&self, count: u32) -> Result<Descriptor> {
        let mut cursor = self.transient_cursor.lock()
            .map_err(|_| crate::engine_err!("quasar::RenderPassDescriptorHeap", "Heap mutex poisoned"))?;

        let end = match (*cursor).checked_add(count) {
            Some(end) if end <= self.num_transient => end,
            _ => crate::engine_bail!(CapacityExceeded => "quasar::RenderPassDescriptorHeap",
                "Transient region of '{}' overflow: {} used + {} requested > {}",
                self.heap.desc().name, *cursor, count, self.num_transient),
        };
        let start = self.num_reserved + *cursor;
        *cursor = end;
        Ok(self.descriptor_at(start))
    }

    fn descriptor_at(&self, slot: u32) -> Descriptor {
        let increment = self.heap.increment();
        Descriptor {
            cpu: self.heap.cpu_start().offset(slot, increment),
            gpu: self.heap.gpu_start().offset(slot, increment),
            heap_index: self.heap_index,
        }
    }

    /// Transient slots handed out since the last reset
    pub fn transient_used(&self) -> u32 {
        self.transient_cursor.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn num_reserved(&self) -> u32 {
        self.num_reserved
    }

    pub fn num_transient(&self) -> u32 {
        self.num_transient
    }

    pub fn increment(&self) -> u32 {
        self.heap.increment()
    }

    /// Native heap, bound to command lists
    pub fn native(&self) -> &dyn DescriptorHeap {
        self.heap.as_ref()
    }
}

#[cfg(test)]
#[path = "render_pass_heap_tests.rs"]
mod tests;
