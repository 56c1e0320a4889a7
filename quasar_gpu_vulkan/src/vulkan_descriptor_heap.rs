/// DescriptorHeap - descriptor slots emulated on top of Vulkan
///
/// Vulkan has no descriptor heaps. A heap here is a CPU-side array of
/// [`DescriptorSlot`]s; descriptor handles encode `(heap_id << 32) | slot`
/// so any handle can be resolved back to its heap through the
/// [`DescriptorRegistry`] of the GPU context.
///
/// Shader-visible CBV/SRV/UAV heaps also own one bindless descriptor set.
/// Every slot write is mirrored into array element `slot` of that set, which
/// is what shaders index with a bindless index.

use ash::vk;
use quasar_gpu::quasar::Result;
use quasar_gpu::quasar::device::{
    CpuDescriptorHandle, DescriptorHeap as DeviceDescriptorHeap, DescriptorHeapDesc,
    DescriptorHeapType, GpuDescriptorHandle, ViewKind,
};
use quasar_gpu::{engine_bail, engine_debug, engine_err};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::vulkan_context::GpuContext;

/// Bindings of the global bindless set layout
pub(crate) const BINDLESS_SAMPLED_IMAGE_BINDING: u32 = 0;
pub(crate) const BINDLESS_STORAGE_IMAGE_BINDING: u32 = 1;
pub(crate) const BINDLESS_STORAGE_BUFFER_BINDING: u32 = 2;

// ===== HANDLE ENCODING =====

pub(crate) fn encode_handle(heap_id: u32, slot: u32) -> u64 {
    ((heap_id as u64) << 32) | slot as u64
}

pub(crate) fn decode_handle(handle: u64) -> (u32, u32) {
    ((handle >> 32) as u32, handle as u32)
}

// ===== SLOTS =====

/// Content of one descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DescriptorSlot {
    Empty,
    Buffer {
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
        kind: ViewKind,
    },
    Image {
        image: vk::Image,
        view: vk::ImageView,
        kind: ViewKind,
        /// The slot created `view` and destroys it when overwritten
        owned: bool,
    },
}

impl DescriptorSlot {
    /// Same descriptor without ownership of the image view
    pub(crate) fn borrowed(&self) -> Self {
        match *self {
            DescriptorSlot::Image { image, view, kind, .. } => DescriptorSlot::Image { image, view, kind, owned: false },
            other => other,
        }
    }

    fn owned_view(&self) -> Option<vk::ImageView> {
        match *self {
            DescriptorSlot::Image { view, owned: true, .. } => Some(view),
            _ => None,
        }
    }
}

/// Binding and descriptor type a slot occupies in the bindless set
pub(crate) fn bindless_target(slot: &DescriptorSlot) -> Option<(u32, vk::DescriptorType)> {
    match slot {
        DescriptorSlot::Image { kind: ViewKind::ShaderResource, .. } => {
            Some((BINDLESS_SAMPLED_IMAGE_BINDING, vk::DescriptorType::SAMPLED_IMAGE))
        }
        DescriptorSlot::Image { kind: ViewKind::UnorderedAccess, .. } => {
            Some((BINDLESS_STORAGE_IMAGE_BINDING, vk::DescriptorType::STORAGE_IMAGE))
        }
        DescriptorSlot::Buffer { kind: ViewKind::ShaderResource | ViewKind::UnorderedAccess, .. } => {
            Some((BINDLESS_STORAGE_BUFFER_BINDING, vk::DescriptorType::STORAGE_BUFFER))
        }
        _ => None,
    }
}

// ===== HEAP STORAGE =====

/// Bindless set of a shader-visible heap
pub(crate) struct BindlessSet {
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
}

/// Slots of one heap, shared between the heap object and the registry
pub(crate) struct HeapStorage {
    pub id: u32,
    pub desc: DescriptorHeapDesc,
    slots: Mutex<Vec<DescriptorSlot>>,
    pub bindless: Option<BindlessSet>,
}

impl HeapStorage {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<DescriptorSlot>>> {
        self.slots.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "Descriptor heap '{}' mutex poisoned", self.desc.name))
    }

    /// Borrowed copy of the slot at `index`
    pub(crate) fn slot(&self, index: u32) -> Result<DescriptorSlot> {
        let slots = self.lock()?;
        match slots.get(index as usize) {
            Some(slot) => Ok(slot.borrowed()),
            None => engine_bail!(InvalidHandle => "quasar::vulkan",
                "Slot {} outside descriptor heap '{}' ({} slots)", index, self.desc.name, slots.len()),
        }
    }

    /// Replace the slot at `index`, destroying the image view it owned
    pub(crate) fn store(&self, device: &ash::Device, index: u32, content: DescriptorSlot) -> Result<()> {
        let previous = {
            let mut slots = self.lock()?;
            let capacity = slots.len();
            match slots.get_mut(index as usize) {
                Some(slot) => std::mem::replace(slot, content),
                None => engine_bail!(InvalidHandle => "quasar::vulkan",
                    "Slot {} outside descriptor heap '{}' ({} slots)", index, self.desc.name, capacity),
            }
        };

        if let Some(view) = previous.owned_view() {
            unsafe { device.destroy_image_view(view, None); }
        }
        if let Some(bindless) = &self.bindless {
            write_bindless(device, bindless.set, index, &content);
        }
        Ok(())
    }

    fn destroy(&self, device: &ash::Device) {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        for slot in slots.drain(..) {
            if let Some(view) = slot.owned_view() {
                unsafe { device.destroy_image_view(view, None); }
            }
        }
        if let Some(bindless) = &self.bindless {
            // Sets are freed with their pool
            unsafe { device.destroy_descriptor_pool(bindless.pool, None); }
        }
    }
}

/// Mirror a slot into array element `index` of a bindless set
fn write_bindless(device: &ash::Device, set: vk::DescriptorSet, index: u32, content: &DescriptorSlot) {
    let (binding, descriptor_type) = match bindless_target(content) {
        Some(target) => target,
        // Cleared and non-shader slots keep their stale element, partially bound sets allow it
        None => return,
    };

    let mut image_infos = [vk::DescriptorImageInfo::default()];
    let mut buffer_infos = [vk::DescriptorBufferInfo::default()];
    let mut write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(index)
        .descriptor_type(descriptor_type);

    match *content {
        DescriptorSlot::Image { view, kind, .. } => {
            image_infos[0] = vk::DescriptorImageInfo::default()
                .image_view(view)
                .image_layout(crate::vulkan_format::view_image_layout(kind));
            write = write.image_info(&image_infos);
        }
        DescriptorSlot::Buffer { buffer, offset, range, .. } => {
            buffer_infos[0] = vk::DescriptorBufferInfo::default()
                .buffer(buffer)
                .offset(offset)
                .range(range);
            write = write.buffer_info(&buffer_infos);
        }
        DescriptorSlot::Empty => return,
    }

    unsafe { device.update_descriptor_sets(&[write], &[]); }
}

// ===== REGISTRY =====

/// Maps heap ids to live heaps
pub(crate) struct DescriptorRegistry {
    heaps: Mutex<FxHashMap<u32, Weak<HeapStorage>>>,
    next_id: AtomicU32,
}

impl DescriptorRegistry {
    pub(crate) fn new() -> Self {
        Self {
            heaps: Mutex::new(FxHashMap::default()),
            // Id 0 would make slot 0 of the first heap a null handle
            next_id: AtomicU32::new(1),
        }
    }

    fn allocate_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, storage: &Arc<HeapStorage>) -> Result<()> {
        let mut heaps = self.heaps.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "Descriptor registry mutex poisoned"))?;
        heaps.insert(storage.id, Arc::downgrade(storage));
        Ok(())
    }

    fn unregister(&self, id: u32) {
        let mut heaps = match self.heaps.lock() {
            Ok(heaps) => heaps,
            Err(poisoned) => poisoned.into_inner(),
        };
        heaps.remove(&id);
    }

    /// Heap and slot index behind a descriptor handle
    pub(crate) fn resolve(&self, handle: u64) -> Result<(Arc<HeapStorage>, u32)> {
        let (id, slot) = decode_handle(handle);
        let heaps = self.heaps.lock()
            .map_err(|_| engine_err!("quasar::vulkan", "Descriptor registry mutex poisoned"))?;
        match heaps.get(&id).and_then(Weak::upgrade) {
            Some(storage) => Ok((storage, slot)),
            None => engine_bail!(InvalidHandle => "quasar::vulkan",
                "Descriptor handle {:#x} does not belong to a live heap", handle),
        }
    }

    /// Borrowed copy of the slot behind a handle
    pub(crate) fn read(&self, handle: u64) -> Result<DescriptorSlot> {
        let (storage, slot) = self.resolve(handle)?;
        storage.slot(slot)
    }
}

// ===== DESCRIPTOR HEAP =====

/// Vulkan descriptor heap implementation
pub struct DescriptorHeap {
    ctx: Arc<GpuContext>,
    pub(crate) storage: Arc<HeapStorage>,
}

impl DescriptorHeap {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &DescriptorHeapDesc) -> Result<Self> {
        if desc.capacity == 0 {
            engine_bail!(InvalidResource => "quasar::vulkan", "Descriptor heap '{}' has no slots", desc.name);
        }

        let bindless = if desc.shader_visible && desc.heap_type == DescriptorHeapType::CbvSrvUav {
            if desc.capacity > ctx.max_bindless_descriptors {
                engine_bail!(CapacityExceeded => "quasar::vulkan",
                    "Shader-visible heap '{}' needs {} slots, the bindless set holds {}",
                    desc.name, desc.capacity, ctx.max_bindless_descriptors);
            }
            Some(create_bindless_set(&ctx, &desc.name)?)
        } else {
            None
        };

        let storage = Arc::new(HeapStorage {
            id: ctx.descriptors.allocate_id(),
            desc: desc.clone(),
            slots: Mutex::new(vec![DescriptorSlot::Empty; desc.capacity as usize]),
            bindless,
        });
        if let Err(e) = ctx.descriptors.register(&storage) {
            storage.destroy(&ctx.device);
            return Err(e);
        }

        engine_debug!("quasar::vulkan", "Descriptor heap '{}' created (id {}, {} slots, shader visible: {})",
            desc.name, storage.id, desc.capacity, storage.bindless.is_some());

        Ok(Self { ctx, storage })
    }
}

fn create_bindless_set(ctx: &GpuContext, name: &str) -> Result<BindlessSet> {
    let count = ctx.max_bindless_descriptors;
    let pool_sizes = [
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: count },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_IMAGE, descriptor_count: count },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_BUFFER, descriptor_count: count },
    ];
    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
        .max_sets(1)
        .pool_sizes(&pool_sizes);

    unsafe {
        let pool = ctx.device.create_descriptor_pool(&pool_info, None)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to create bindless pool for '{}': {:?}", name, e))?;

        let layouts = [ctx.bindless_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        match ctx.device.allocate_descriptor_sets(&allocate_info) {
            Ok(sets) => Ok(BindlessSet { pool, set: sets[0] }),
            Err(e) => {
                ctx.device.destroy_descriptor_pool(pool, None);
                Err(engine_err!("quasar::vulkan", "Failed to allocate bindless set for '{}': {:?}", name, e))
            }
        }
    }
}

impl DeviceDescriptorHeap for DescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.storage.desc
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle(encode_handle(self.storage.id, 0))
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        if self.storage.desc.shader_visible {
            GpuDescriptorHandle(encode_handle(self.storage.id, 0))
        } else {
            GpuDescriptorHandle::NULL
        }
    }

    fn increment(&self) -> u32 {
        1
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for DescriptorHeap {
    fn drop(&mut self) {
        self.ctx.descriptors.unregister(self.storage.id);
        self.storage.destroy(&self.ctx.device);
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_heap_tests.rs"]
mod tests;
