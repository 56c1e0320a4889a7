/// CPU-only descriptor heap with stable per-resource slots

use std::sync::Mutex;
use crate::error::Result;
use crate::graphics_device::{DescriptorHeap, DescriptorHeapDesc, DescriptorHeapType, GraphicsDevice};
use crate::descriptor::Descriptor;

struct StagingState {
    /// Slots handed out at least once
    next_unused: u32,
    free_list: Vec<u32>,
    active: u32,
}

/// Staging heap: one descriptor per resource view, alive as long as the resource
///
/// New slots come from the never-used tail first, then from the back of the
/// free list. Allocate and free are serialized by an internal mutex.
pub struct StagingDescriptorHeap {
    heap: Box<dyn DescriptorHeap>,
    heap_index: u32,
    state: Mutex<StagingState>,
}

impl StagingDescriptorHeap {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        name: &str,
        heap_type: DescriptorHeapType,
        capacity: u32,
        heap_index: u32,
    ) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc {
            name: name.to_string(),
            heap_type,
            capacity,
            shader_visible: false,
        })?;
        Ok(Self {
            heap,
            heap_index,
            state: Mutex::new(StagingState {
                next_unused: 0,
                free_list: Vec::new(),
                active: 0,
            }),
        })
    }

    pub fn get_new_descriptor(&self) -> Result<Descriptor> {
        let mut state = self.state.lock()
            .map_err(|_| crate::engine_err!("quasar::StagingDescriptorHeap", "Heap mutex poisoned"))?;

        let slot = if state.next_unused < self.capacity() {
            state.next_unused += 1;
            state.next_unused - 1
        } else if let Some(slot) = state.free_list.pop() {
            slot
        } else {
            crate::engine_bail!(CapacityExceeded => "quasar::StagingDescriptorHeap",
                "'{}' exhausted ({} descriptors)", self.heap.desc().name, self.capacity());
        };
        state.active += 1;

        Ok(Descriptor {
            cpu: self.heap.cpu_start().offset(slot, self.heap.increment()),
            gpu: crate::graphics_device::GpuDescriptorHandle::NULL,
            heap_index: self.heap_index,
        })
    }

    pub fn free_descriptor(&self, descriptor: Descriptor) -> Result<()> {
        let mut state = self.state.lock()
            .map_err(|_| crate::engine_err!("quasar::StagingDescriptorHeap", "Heap mutex poisoned"))?;

        if state.active == 0 {
            crate::engine_bail!(InvalidHandle => "quasar::StagingDescriptorHeap",
                "'{}' freed with no active descriptors (double free)", self.heap.desc().name);
        }
        let slot = self.slot_of(&descriptor)?;
        state.active -= 1;
        state.free_list.push(slot);
        Ok(())
    }

    fn slot_of(&self, descriptor: &Descriptor) -> Result<u32> {
        let start = self.heap.cpu_start().0;
        let increment = self.heap.increment() as u64;
        if descriptor.heap_index != self.heap_index
            || descriptor.cpu.0 < start
            || (descriptor.cpu.0 - start) % increment != 0
            || (descriptor.cpu.0 - start) / increment >= self.capacity() as u64
        {
            crate::engine_bail!(InvalidHandle => "quasar::StagingDescriptorHeap",
                "Descriptor {:?} does not belong to '{}'", descriptor.cpu, self.heap.desc().name);
        }
        Ok(((descriptor.cpu.0 - start) / increment) as u32)
    }

    pub fn active_count(&self) -> u32 {
        self.state.lock().map(|s| s.active).unwrap_or(0)
    }

    pub fn capacity(&self) -> u32 {
        self.heap.desc().capacity
    }

    pub fn heap_type(&self) -> DescriptorHeapType {
        self.heap.desc().heap_type
    }
}

#[cfg(test)]
#[path = "staging_heap_tests.rs"]
mod tests;
