/// Backend context: owns the device, queues, heaps and every resource record
///
/// One `Backend` is one GPU context. Nothing in the core is process-wide
/// except the logger, so several contexts can coexist and teardown order is
/// the drop order of this struct.

use std::sync::mpsc::{channel, Receiver, Sender};
use winit::dpi::PhysicalSize;

use crate::command::{BarrierBatch, BarrierRequest};
use crate::config::Config;
use crate::descriptor::{BindlessAllocator, Descriptor, RenderPassDescriptorHeap, StagingDescriptorHeap};
use crate::error::Result;
use crate::frame::{FrameAllocator, FramePipeliner};
use crate::graphics_device::{
    BufferFlags, CommandList, CommandQueue, DescriptorHeapType, GraphicsDevice, NativeBarrier, QueueType,
    ResourceRef, ResourceState, Swapchain, ViewDesc, ViewKind,
};
use crate::resource::{
    AnyHandle, BufferRecord, BufferTag, PipelineRecord, PipelineTag, ResourceHandle, ResourceTable,
    TextureHandle, TextureRecord, TextureTag, TextureViews,
};
use crate::shader::{SamplerRegistry, ShaderCompiler, StaticSampler};
use crate::upload::{PlacedCopy, UploadManager};
use crate::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};

use super::backend_recording::{ActivePass, PassKind};

/// Heap indices stored in every [`Descriptor`]
pub(crate) const STAGING_HEAP: u32 = 0;
pub(crate) const RENDER_TARGET_HEAP: u32 = 1;
pub(crate) const DEPTH_STENCIL_HEAP: u32 = 2;
pub(crate) const FIRST_FRAME_HEAP: u32 = 3;

/// GPU context
///
/// Fields are dropped in declaration order: resource records first, the
/// device last.
pub struct Backend {
    pub(crate) config: Config,
    pub(crate) frames: FramePipeliner,
    pub(crate) barriers: BarrierBatch,
    pub(crate) pass: Option<ActivePass>,

    pub(crate) buffers: ResourceTable<BufferTag, BufferRecord>,
    pub(crate) textures: ResourceTable<TextureTag, TextureRecord>,
    pub(crate) pipelines: ResourceTable<PipelineTag, PipelineRecord>,
    pub(crate) uploads: UploadManager,
    pub(crate) frame_allocators: Vec<FrameAllocator>,

    pub(crate) staging_heap: StagingDescriptorHeap,
    pub(crate) render_target_heap: StagingDescriptorHeap,
    pub(crate) depth_stencil_heap: StagingDescriptorHeap,
    pub(crate) frame_heaps: Vec<RenderPassDescriptorHeap>,
    pub(crate) bindless: BindlessAllocator,

    pub(crate) command_lists: Vec<Box<dyn CommandList>>,
    /// Graphics queue first
    pub(crate) queues: Vec<Box<dyn CommandQueue>>,
    pub(crate) swapchain: Option<Box<dyn Swapchain>>,
    pub(crate) back_buffers: Vec<TextureHandle>,
    pub(crate) current_image: u32,
    resize_sender: Sender<PhysicalSize<u32>>,
    resize_receiver: Receiver<PhysicalSize<u32>>,

    pub(crate) samplers: SamplerRegistry,
    pub(crate) compiler: Box<dyn ShaderCompiler>,
    pub(crate) device: Box<dyn GraphicsDevice>,
}

impl Backend {
    /// Create a context on `device`
    ///
    /// # Arguments
    ///
    /// * `device` - Native device every object is created on
    /// * `compiler` - Shader compiler used for pipeline creation and reloads
    /// * `swapchain` - Presentation target, `None` for headless contexts
    /// * `config` - Capacities and policies, validated first
    pub fn new(
        mut device: Box<dyn GraphicsDevice>,
        compiler: Box<dyn ShaderCompiler>,
        swapchain: Option<Box<dyn Swapchain>>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let frames_in_flight = config.frames_in_flight;

        let staging_heap = StagingDescriptorHeap::new(
            device.as_mut(), "staging_cbv_srv_uav", DescriptorHeapType::CbvSrvUav,
            config.staging_descriptor_capacity, STAGING_HEAP,
        )?;
        let render_target_heap = StagingDescriptorHeap::new(
            device.as_mut(), "staging_rtv", DescriptorHeapType::RenderTarget,
            config.render_target_descriptor_capacity, RENDER_TARGET_HEAP,
        )?;
        let depth_stencil_heap = StagingDescriptorHeap::new(
            device.as_mut(), "staging_dsv", DescriptorHeapType::DepthStencil,
            config.depth_stencil_descriptor_capacity, DEPTH_STENCIL_HEAP,
        )?;

        let mut frame_heaps = Vec::with_capacity(frames_in_flight);
        let mut frame_allocators = Vec::with_capacity(frames_in_flight);
        let mut command_lists = Vec::with_capacity(frames_in_flight);
        for slot in 0..frames_in_flight {
            frame_heaps.push(RenderPassDescriptorHeap::new(
                device.as_mut(),
                &format!("render_pass_heap_{}", slot),
                config.num_reserved_descriptors,
                config.num_transient_descriptors,
                FIRST_FRAME_HEAP + slot as u32,
            )?);
            frame_allocators.push(FrameAllocator::new(
                device.as_mut(),
                &format!("frame_allocator_{}", slot),
                config.frame_allocator_size,
            )?);
            command_lists.push(device.create_command_list(QueueType::Graphics)?);
        }

        let queues = vec![
            device.create_queue(QueueType::Graphics)?,
            device.create_queue(QueueType::Compute)?,
            device.create_queue(QueueType::Copy)?,
        ];
        let uploads = UploadManager::new(device.as_mut(), config.upload_heap_size, frames_in_flight)?;
        let (resize_sender, resize_receiver) = channel();

        let mut backend = Self {
            frames: FramePipeliner::new(frames_in_flight),
            barriers: BarrierBatch::new(config.max_barrier_batch),
            pass: None,
            buffers: ResourceTable::new("buffer", config.max_buffers),
            textures: ResourceTable::new("texture", config.max_textures),
            pipelines: ResourceTable::new("pipeline", config.max_pipelines),
            uploads,
            frame_allocators,
            staging_heap,
            render_target_heap,
            depth_stencil_heap,
            frame_heaps,
            bindless: BindlessAllocator::new(config.num_reserved_descriptors),
            command_lists,
            queues,
            swapchain,
            back_buffers: Vec::new(),
            current_image: 0,
            resize_sender,
            resize_receiver,
            samplers: SamplerRegistry::with_defaults(),
            compiler,
            device,
            config,
        };

        if backend.swapchain.is_some() {
            backend.register_back_buffers()?;
        }

        engine_info!("quasar::Backend",
            "Backend created ({} frames in flight, {} bindless / {} transient descriptors, {} back buffers)",
            frames_in_flight, backend.config.num_reserved_descriptors,
            backend.config.num_transient_descriptors, backend.back_buffers.len());
        Ok(backend)
    }

    // ===== FRAME PROGRESSION =====

    /// Start recording the next frame, returns its slot
    ///
    /// Applies a pending resize, waits for the fence of the slot's previous
    /// frame on every queue, runs the slot's deferred destructions, resets its
    /// transient allocators and records the queued uploads that fit.
    pub fn begin_frame(&mut self) -> Result<usize> {
        self.apply_pending_resize()?;

        let queues = &self.queues;
        let slot = self.frames.begin_frame(|fence| {
            for queue in queues {
                queue.wait_for_value(fence)?;
            }
            Ok(())
        })?;

        self.process_destructions(slot)?;

        let completed = self.queues[0].completed_value()?;
        for resource in self.uploads.retire(completed) {
            self.set_ready(resource);
        }

        self.frame_heaps[slot].reset();
        self.frame_allocators[slot].reset();

        let list = &mut self.command_lists[slot];
        list.begin()?;
        list.set_descriptor_heap(self.frame_heaps[slot].native())?;

        if let Some(swapchain) = self.swapchain.as_mut() {
            self.current_image = swapchain.acquire_next_image()?;
        }

        self.record_uploads(slot)?;
        Ok(slot)
    }

    /// Submit the frame, present, and signal every queue's fence
    pub fn end_frame(&mut self) -> Result<()> {
        self.require_recording()?;
        if self.pass.is_some() {
            engine_bail!(InvalidState => "quasar::Backend", "end_frame with a pass still open");
        }
        let slot = self.frames.current_slot();

        if self.swapchain.is_some() {
            let back_buffer = self.back_buffer()?;
            self.add_barrier(back_buffer, ResourceState::PRESENT)?;
        }
        self.flush_barriers()?;

        self.command_lists[slot].end()?;
        self.queues[0].submit(&[self.command_lists[slot].as_ref()])?;
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.present(self.current_image)?;
        }

        let fence = self.frames.next_fence_value();
        for queue in &mut self.queues {
            queue.signal(fence)?;
        }
        self.frames.end_frame(fence)?;
        self.uploads.commit(fence);
        Ok(())
    }

    /// Slot of the frame being recorded (or last recorded)
    pub fn current_slot(&self) -> usize {
        self.frames.current_slot()
    }

    /// Frames begun since creation
    pub fn frame_count(&self) -> u64 {
        self.frames.frame_count()
    }

    /// Block until every queue has finished all submitted work
    pub fn wait_for_idle(&mut self) -> Result<()> {
        for queue in &self.queues {
            queue.wait_idle()?;
        }
        self.frames.mark_all_fenced();
        Ok(())
    }

    /// Signal a fresh fence value on every queue and wait for it
    pub fn flush_gpu(&mut self) -> Result<()> {
        let fence = self.frames.next_fence_value();
        for queue in &mut self.queues {
            queue.signal(fence)?;
        }
        for queue in &self.queues {
            queue.wait_for_value(fence)?;
        }
        self.frames.mark_all_fenced();
        engine_debug!("quasar::Backend", "GPU flushed at fence {}", fence);
        Ok(())
    }

    pub(crate) fn require_recording(&self) -> Result<()> {
        if !self.frames.is_recording() {
            engine_bail!(InvalidState => "quasar::Backend", "No frame is being recorded");
        }
        Ok(())
    }

    /// Slot a CPU write lands in: the recording frame, else the next one
    pub(crate) fn write_slot(&self) -> usize {
        if self.frames.is_recording() {
            self.frames.current_slot()
        } else {
            self.frames.next_slot()
        }
    }

    // ===== DEFERRED DESTRUCTION =====

    fn process_destructions(&mut self, slot: usize) -> Result<()> {
        for handle in self.frames.take_destructions(slot) {
            self.destroy_now(handle)?;
        }
        Ok(())
    }

    /// Physically destroy a resource, its descriptors and bindless slot
    pub(crate) fn destroy_now(&mut self, handle: AnyHandle) -> Result<()> {
        match handle {
            AnyHandle::Buffer(h) => {
                let record = self.buffers.remove(h)?;
                let views = &record.views;
                for descriptor in views.constant.iter().chain(&views.shader_resource).chain(&views.unordered_access) {
                    self.release_descriptor(*descriptor)?;
                }
                if let Some(index) = record.bindless {
                    self.release_bindless(index)?;
                }
                self.uploads.discard(ResourceHandle::Buffer(h));
                self.barriers.forget(ResourceHandle::Buffer(h));
                engine_debug!("quasar::Backend", "Buffer '{}' destroyed", record.desc.name);
            }
            AnyHandle::Texture(h) => {
                let record = self.textures.remove(h)?;
                self.release_texture_views(&record.views)?;
                if let Some(index) = record.bindless {
                    self.release_bindless(index)?;
                }
                self.uploads.discard(ResourceHandle::Texture(h));
                self.barriers.forget(ResourceHandle::Texture(h));
                engine_debug!("quasar::Backend", "Texture '{}' destroyed", record.name);
            }
            AnyHandle::Pipeline(h) => {
                let record = self.pipelines.remove(h)?;
                engine_debug!("quasar::Backend", "Pipeline '{}' destroyed", record.name);
            }
        }
        Ok(())
    }

    pub(crate) fn release_texture_views(&mut self, views: &TextureViews) -> Result<()> {
        let all = [views.shader_resource, views.unordered_access, views.render_target, views.depth_stencil];
        for descriptor in all.into_iter().flatten() {
            self.release_descriptor(descriptor)?;
        }
        Ok(())
    }

    /// Clear a staging slot and give it back to its heap
    pub(crate) fn release_descriptor(&mut self, descriptor: Descriptor) -> Result<()> {
        self.device.release_view(descriptor.cpu)?;
        self.staging_heap_for(descriptor.heap_index)?.free_descriptor(descriptor)
    }

    /// Clear a bindless slot in every frame's heap and free the index
    pub(crate) fn release_bindless(&mut self, index: u32) -> Result<()> {
        for heap in &self.frame_heaps {
            self.device.release_view(heap.reserved_descriptor(index)?.cpu)?;
        }
        self.bindless.free(index)
    }

    pub(crate) fn staging_heap_for(&self, heap_index: u32) -> Result<&StagingDescriptorHeap> {
        match heap_index {
            STAGING_HEAP => Ok(&self.staging_heap),
            RENDER_TARGET_HEAP => Ok(&self.render_target_heap),
            DEPTH_STENCIL_HEAP => Ok(&self.depth_stencil_heap),
            other => engine_bail!(InvalidHandle => "quasar::Backend",
                "Descriptor of heap {} is not a staging descriptor", other),
        }
    }

    // ===== BARRIERS =====

    /// Queue a transition of `resource` to `new_state`
    ///
    /// Same-state requests are dropped, except `UNORDERED_ACCESS` which
    /// always queues an unordered-access barrier. A full batch is flushed
    /// first. Not allowed while a render pass is open: declare the state in
    /// the pass's [`RenderPassDesc`](super::RenderPassDesc) instead.
    pub fn add_barrier(&mut self, resource: impl Into<ResourceHandle>, new_state: ResourceState) -> Result<()> {
        self.require_recording()?;
        let resource = resource.into();
        if self.in_render_pass() {
            engine_bail!(InvalidState => "quasar::Backend",
                "Barrier on {:?} inside a render pass", resource);
        }
        let current = self.state_of(resource)?;
        let barrier = match BarrierRequest::for_transition(resource, current, new_state) {
            Some(barrier) => barrier,
            None => return Ok(()),
        };
        if let Some(full) = self.barriers.push(barrier) {
            self.submit_barriers(&full)?;
        }
        self.set_state(resource, new_state)
    }

    /// Submit every queued barrier in one call
    pub fn flush_barriers(&mut self) -> Result<()> {
        self.require_recording()?;
        let batch = self.barriers.take();
        if batch.is_empty() {
            return Ok(());
        }
        self.submit_barriers(&batch)
    }

    /// Transition unless the resource already is in a state covering `state`
    ///
    /// Inside a render pass nothing can be transitioned, the resource must
    /// already be in a covering state.
    pub(crate) fn require_state(&mut self, resource: ResourceHandle, state: ResourceState) -> Result<()> {
        let current = self.state_of(resource)?;
        if current == state || (!current.is_write() && current.contains(state)) {
            return Ok(());
        }
        if self.in_render_pass() {
            engine_bail!(InvalidState => "quasar::Backend",
                "'{}' is in {:?} but {:?} is needed, declare it in the RenderPassDesc",
                self.resource_name(resource)?, current, state);
        }
        self.add_barrier(resource, state)
    }

    pub(crate) fn in_render_pass(&self) -> bool {
        matches!(&self.pass, Some(pass) if pass.kind == PassKind::Graphics)
    }

    fn submit_barriers(&mut self, batch: &[BarrierRequest]) -> Result<()> {
        let slot = self.frames.current_slot();
        let natives = batch
            .iter()
            .map(|barrier| {
                Ok(match *barrier {
                    BarrierRequest::Transition { resource, before, after } => NativeBarrier::Transition {
                        resource: native_ref(&self.buffers, &self.textures, resource)?,
                        before,
                        after,
                    },
                    BarrierRequest::UnorderedAccess { resource } => NativeBarrier::UnorderedAccess {
                        resource: native_ref(&self.buffers, &self.textures, resource)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.command_lists[slot].resource_barriers(&natives)
    }

    pub(crate) fn state_of(&self, resource: ResourceHandle) -> Result<ResourceState> {
        Ok(match resource {
            ResourceHandle::Buffer(h) => self.buffers.get(h)?.state,
            ResourceHandle::Texture(h) => self.textures.get(h)?.state,
        })
    }

    fn resource_name(&self, resource: ResourceHandle) -> Result<&str> {
        Ok(match resource {
            ResourceHandle::Buffer(h) => &self.buffers.get(h)?.desc.name,
            ResourceHandle::Texture(h) => &self.textures.get(h)?.name,
        })
    }

    fn set_state(&mut self, resource: ResourceHandle, state: ResourceState) -> Result<()> {
        match resource {
            ResourceHandle::Buffer(h) => self.buffers.get_mut(h)?.state = state,
            ResourceHandle::Texture(h) => self.textures.get_mut(h)?.state = state,
        }
        Ok(())
    }

    fn set_ready(&mut self, resource: ResourceHandle) {
        match resource {
            ResourceHandle::Buffer(h) => {
                if let Ok(record) = self.buffers.get_mut(h) {
                    record.ready = true;
                }
            }
            ResourceHandle::Texture(h) => {
                if let Ok(record) = self.textures.get_mut(h) {
                    record.ready = true;
                }
            }
        }
    }

    // ===== UPLOADS =====

    /// Record copies for the queued uploads that fit in this slot's heap
    fn record_uploads(&mut self, slot: usize) -> Result<()> {
        let placed = self.uploads.process(slot)?;
        if placed.is_empty() {
            return Ok(());
        }
        for copy in &placed {
            self.add_barrier(copy.resource(), ResourceState::COPY_DEST)?;
        }
        self.flush_barriers()?;

        let heap = self.uploads.heap(slot);
        let list = &mut self.command_lists[slot];
        for copy in &placed {
            match copy {
                PlacedCopy::Buffer { handle, dst_offset, src_offset, size } => {
                    let record = self.buffers.get(*handle)?;
                    list.copy_buffer_region(record.native.as_ref(), *dst_offset, heap, *src_offset, *size)?;
                }
                PlacedCopy::Texture { handle, footprints } => {
                    let record = self.textures.get(*handle)?;
                    for footprint in footprints {
                        list.copy_buffer_to_texture(record.native.as_ref(), heap, footprint)?;
                    }
                }
            }
        }

        for copy in &placed {
            let resting = self.resting_state(copy.resource())?;
            self.add_barrier(copy.resource(), resting)?;
        }
        Ok(())
    }

    /// State a resource returns to after an upload
    fn resting_state(&self, resource: ResourceHandle) -> Result<ResourceState> {
        Ok(match resource {
            ResourceHandle::Buffer(h) => {
                let flags = self.buffers.get(h)?.desc.flags;
                let mut state = ResourceState::empty();
                if flags.intersects(BufferFlags::VERTEX | BufferFlags::CONSTANT) {
                    state |= ResourceState::VERTEX_AND_CONSTANT_BUFFER;
                }
                if flags.contains(BufferFlags::INDEX) {
                    state |= ResourceState::INDEX_BUFFER;
                }
                if flags.intersects(BufferFlags::SHADER_RESOURCE | BufferFlags::UNORDERED_ACCESS) {
                    state |= ResourceState::ALL_SHADER_RESOURCE;
                }
                if flags.contains(BufferFlags::INDIRECT) {
                    state |= ResourceState::INDIRECT_ARGUMENT;
                }
                if state.is_empty() { ResourceState::GENERIC_READ } else { state }
            }
            ResourceHandle::Texture(_) => ResourceState::ALL_SHADER_RESOURCE,
        })
    }

    // ===== SWAPCHAIN =====

    /// Sender the window layer pushes new surface sizes into
    ///
    /// The channel is drained at the next [`begin_frame`](Self::begin_frame);
    /// only the last size is applied.
    pub fn resize_sender(&self) -> Sender<PhysicalSize<u32>> {
        self.resize_sender.clone()
    }

    fn apply_pending_resize(&mut self) -> Result<()> {
        let mut latest = None;
        while let Ok(size) = self.resize_receiver.try_recv() {
            latest = Some(size);
        }
        match latest {
            Some(size) => self.resize(size.width, size.height),
            None => Ok(()),
        }
    }

    /// Idle the GPU and recreate the back buffers at a new size
    ///
    /// Back-buffer handles stay valid; their render-target descriptors are
    /// rewritten in place. A zero size (minimized window) is ignored. If the
    /// swapchain fails to resize, the old back buffers and views are kept.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.swapchain.is_none() {
            engine_bail!(InvalidState => "quasar::Backend", "resize on a context without swapchain");
        }
        if self.frames.is_recording() {
            engine_bail!(InvalidState => "quasar::Backend", "resize while a frame is being recorded");
        }
        if width == 0 || height == 0 {
            engine_debug!("quasar::Backend", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.wait_for_idle()?;
        if let Some(swapchain) = self.swapchain.as_mut() {
            swapchain.resize(width, height)?;
        }
        // Old views stay usable until the new images exist
        for &handle in &self.back_buffers {
            if let Some(rtv) = self.textures.get(handle)?.views.render_target {
                self.device.release_view(rtv.cpu)?;
            }
        }
        self.register_back_buffers()?;
        self.current_image = 0;

        engine_info!("quasar::Backend", "Resized to {}x{}", width, height);
        Ok(())
    }

    /// Wrap the swapchain images in texture records, reusing existing handles
    fn register_back_buffers(&mut self) -> Result<()> {
        let natives = match self.swapchain.as_ref() {
            Some(swapchain) => swapchain.back_buffers()?,
            None => return Ok(()),
        };

        while self.back_buffers.len() > natives.len() {
            if let Some(handle) = self.back_buffers.pop() {
                let record = self.textures.remove(handle)?;
                if let Some(rtv) = record.views.render_target {
                    self.render_target_heap.free_descriptor(rtv)?;
                }
            }
        }

        let view = ViewDesc::texture(ViewKind::RenderTarget);
        for (index, native) in natives.into_iter().enumerate() {
            match self.back_buffers.get(index).copied() {
                Some(handle) => {
                    let record = self.textures.get_mut(handle)?;
                    let rtv = match record.views.render_target {
                        Some(rtv) => rtv,
                        None => engine_bail!(InvalidState => "quasar::Backend",
                            "Back buffer {} lost its render-target view", index),
                    };
                    record.native = native;
                    record.state = ResourceState::PRESENT;
                    self.device.create_view(ResourceRef::Texture(record.native.as_ref()), &view, rtv.cpu)?;
                }
                None => {
                    let rtv = self.render_target_heap.get_new_descriptor()?;
                    self.device.create_view(ResourceRef::Texture(native.as_ref()), &view, rtv.cpu)?;
                    let handle = self.textures.insert(TextureRecord {
                        native,
                        name: format!("back_buffer_{}", index),
                        state: ResourceState::PRESENT,
                        ready: true,
                        views: TextureViews { render_target: Some(rtv), ..Default::default() },
                        bindless: None,
                        swapchain_image: true,
                        retiring: false,
                    })?;
                    self.back_buffers.push(handle);
                }
            }
        }
        Ok(())
    }

    /// Back buffer acquired for the current frame
    pub fn back_buffer(&self) -> Result<TextureHandle> {
        match self.back_buffers.get(self.current_image as usize) {
            Some(&handle) => Ok(handle),
            None => engine_bail!(InvalidState => "quasar::Backend", "Context has no swapchain"),
        }
    }

    /// Current back-buffer size, `None` for headless contexts
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.swapchain.as_ref().map(|s| (s.width(), s.height()))
    }

    // ===== SAMPLERS =====

    /// Add a static sampler for pipelines created from now on
    pub fn register_sampler(&mut self, sampler: StaticSampler) -> Result<u32> {
        self.samplers.register(sampler)
    }

    pub fn samplers(&self) -> &SamplerRegistry {
        &self.samplers
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_idle() {
            engine_error!("quasar::Backend", "Teardown wait failed: {}", e);
        }
        for slot in 0..self.frames.frames_in_flight() {
            for handle in self.frames.take_destructions(slot) {
                if let Err(e) = self.destroy_now(handle) {
                    engine_warn!("quasar::Backend", "Teardown of {:?} failed: {}", handle, e);
                }
            }
        }
        engine_info!("quasar::Backend", "Backend destroyed ({} buffers, {} textures, {} pipelines still alive)",
            self.buffers.len(), self.textures.len() - self.back_buffers.len() as u32, self.pipelines.len());
    }
}

/// Native resource behind a handle, borrowed from the record tables
pub(crate) fn native_ref<'a>(
    buffers: &'a ResourceTable<BufferTag, BufferRecord>,
    textures: &'a ResourceTable<TextureTag, TextureRecord>,
    resource: ResourceHandle,
) -> Result<ResourceRef<'a>> {
    Ok(match resource {
        ResourceHandle::Buffer(h) => ResourceRef::Buffer(buffers.get(h)?.native.as_ref()),
        ResourceHandle::Texture(h) => ResourceRef::Texture(textures.get(h)?.native.as_ref()),
    })
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
