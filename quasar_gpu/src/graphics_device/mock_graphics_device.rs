/// Mock graphics device for unit tests (no GPU required)
///
/// Every native call is appended to a shared [`MockState`] so tests can
/// assert exact barrier batches, fence signals/waits and the moment each
/// native object is dropped. The mock "GPU" executes copies at record time;
/// fences complete on signal unless `auto_complete` is turned off, in which
/// case they complete when waited on.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;
use crate::engine_bail;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, CommandQueue, CpuDescriptorHandle,
    DescriptorHeap, DescriptorHeapDesc, GpuDescriptorHandle, GraphicsDevice, IndexType,
    NativeBarrier, NativePipelineDesc, Pipeline, QueueType, Rect2D, RenderPassBegin, ResourceRef,
    ResourceState, Swapchain, Texture, TextureCopyFootprint, TextureDesc, TextureFormat,
    TextureInfo, TextureUsage, ViewDesc, ViewKind, Viewport,
};
use crate::shader::{CompiledShader, ShaderCompiler, ShaderReflection, ShaderSource};

// ============================================================================
// Recorded events
// ============================================================================

/// Device-level event
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    BufferCreated { id: u64, name: String },
    BufferDropped { id: u64, name: String },
    TextureCreated { id: u64, name: String },
    TextureDropped { id: u64, name: String },
    PipelineCreated { id: u64, name: String },
    PipelineDropped { id: u64, name: String },
    ViewCreated { dest: u64, kind: ViewKind, resource: String },
    ViewReleased { dest: u64 },
    DescriptorsCopied { dest: u64, src: u64, count: u32 },
    Submitted { queue: QueueType, lists: usize },
    Signaled { queue: QueueType, value: u64 },
    Waited { queue: QueueType, value: u64 },
    QueueIdle { queue: QueueType },
    DeviceIdle,
    Acquired { image: u32 },
    Presented { image: u32 },
    SwapchainResized { width: u32, height: u32 },
}

/// Barrier as recorded by the mock command list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBarrier {
    Transition { resource: String, before: ResourceState, after: ResourceState },
    UnorderedAccess { resource: String },
}

/// Command-list-level command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Begin,
    End,
    Barriers(Vec<MockBarrier>),
    SetDescriptorHeap { heap: String },
    SetPipeline { name: String },
    BeginRenderPass { color: Vec<String>, depth: Option<String>, clears: usize },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    SetConstantBuffer { parameter: u32, buffer: String, offset: u64, size: u64 },
    SetDescriptorTable { parameter: u32, base: u64 },
    SetPushConstants { parameter: u32, data: Vec<u8> },
    BindVertexBuffer { slot: u32, buffer: String, offset: u64, stride: u32 },
    BindIndexBuffer { buffer: String, offset: u64, index_type: IndexType },
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
    CopyBuffer { dst: String, dst_offset: u64, src: String, src_offset: u64, size: u64 },
    CopyBufferToTexture { dst: String, src: String, footprint: TextureCopyFootprint },
}

/// Content of a mock descriptor slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSlot {
    pub resource: String,
    pub view: ViewDesc,
}

/// Shared mock state
pub struct MockState {
    pub events: Vec<MockEvent>,
    pub commands: Vec<MockCommand>,
    pub heaps: Vec<(DescriptorHeapDesc, Vec<Option<MockSlot>>)>,
    pub signaled: HashMap<QueueType, u64>,
    pub completed: HashMap<QueueType, u64>,
    /// Fences complete as soon as they are signaled
    pub auto_complete: bool,
    /// Next swapchain resize fails (surface lost)
    pub fail_swapchain_resize: bool,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Decode a handle into (heap, slot)
    fn locate(&self, handle: u64) -> Option<(usize, usize)> {
        let heap = (handle >> 32).checked_sub(1)? as usize;
        let slot = (handle & 0xFFFF_FFFF) as usize;
        let (_, slots) = self.heaps.get(heap)?;
        (slot < slots.len()).then_some((heap, slot))
    }

    /// Content of the slot at `handle`
    pub fn slot(&self, handle: u64) -> Option<&MockSlot> {
        let (heap, slot) = self.locate(handle)?;
        self.heaps[heap].1[slot].as_ref()
    }

    pub fn count_events(&self, predicate: impl Fn(&MockEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    pub fn position(&self, predicate: impl Fn(&MockEvent) -> bool) -> Option<usize> {
        self.events.iter().position(predicate)
    }

    /// All barriers recorded so far, batch by batch
    pub fn barrier_batches(&self) -> Vec<Vec<MockBarrier>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                MockCommand::Barriers(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.events.clear();
        self.commands.clear();
    }
}

pub type SharedMockState = Arc<Mutex<MockState>>;

fn lock(state: &SharedMockState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap()
}

fn resource_name(resource: &ResourceRef<'_>) -> String {
    match resource {
        ResourceRef::Buffer(b) => b.desc().name.clone(),
        ResourceRef::Texture(t) => texture_name(*t),
    }
}

fn texture_name(texture: &dyn Texture) -> String {
    texture
        .as_any()
        .downcast_ref::<MockTexture>()
        .map(|t| t.name.clone())
        .unwrap_or_default()
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub id: u64,
    pub desc: BufferDesc,
    pub data: Mutex<Vec<u8>>,
    state: SharedMockState,
}

impl MockBuffer {
    /// Current contents (what the GPU would read)
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    fn copy_in(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut bytes = self.data.lock().unwrap();
        let end = offset as usize + data.len();
        if end > bytes.len() {
            engine_bail!("quasar::mock", "Write of {} bytes at {} overflows '{}' ({} bytes)",
                data.len(), offset, self.desc.name, bytes.len());
        }
        bytes[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

impl Buffer for MockBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn gpu_address(&self) -> u64 {
        self.id << 32
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.desc.usage.is_cpu_writable() {
            engine_bail!("quasar::mock", "Buffer '{}' is not CPU writable", self.desc.name);
        }
        self.copy_in(offset, data)
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let bytes = self.data.lock().unwrap();
        let end = offset as usize + out.len();
        if end > bytes.len() {
            engine_bail!("quasar::mock", "Read past the end of '{}'", self.desc.name);
        }
        out.copy_from_slice(&bytes[offset as usize..end]);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        let (id, name) = (self.id, self.desc.name.clone());
        lock(&self.state).events.push(MockEvent::BufferDropped { id, name });
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub id: u64,
    pub name: String,
    pub info: TextureInfo,
    /// Bytes written by buffer -> texture copies, per (layer, mip)
    pub uploads: Mutex<Vec<(u32, u32, Vec<u8>)>>,
    owned: bool,
    state: SharedMockState,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockTexture {
    fn drop(&mut self) {
        if self.owned {
            let (id, name) = (self.id, self.name.clone());
            lock(&self.state).events.push(MockEvent::TextureDropped { id, name });
        }
    }
}

// ============================================================================
// Mock Heap / Pipeline
// ============================================================================

pub struct MockDescriptorHeap {
    pub desc: DescriptorHeapDesc,
    index: u64,
}

impl DescriptorHeap for MockDescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle((self.index + 1) << 32)
    }

    fn gpu_start(&self) -> GpuDescriptorHandle {
        if self.desc.shader_visible {
            GpuDescriptorHandle((self.index + 1) << 32)
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

pub struct MockPipeline {
    pub id: u64,
    pub name: String,
    pub compute: bool,
    state: SharedMockState,
}

impl Pipeline for MockPipeline {
    fn is_compute(&self) -> bool {
        self.compute
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        let (id, name) = (self.id, self.name.clone());
        lock(&self.state).events.push(MockEvent::PipelineDropped { id, name });
    }
}

// ============================================================================
// Mock Command List
// ============================================================================

pub struct MockCommandList {
    pub queue: QueueType,
    pub recording: bool,
    pub in_render_pass: bool,
    state: SharedMockState,
}

impl MockCommandList {
    fn record(&mut self, command: MockCommand) -> Result<()> {
        if !self.recording {
            engine_bail!(InvalidState => "quasar::mock", "{:?} recorded outside begin/end", command);
        }
        lock(&self.state).commands.push(command);
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            engine_bail!(InvalidState => "quasar::mock", "Command list already recording");
        }
        self.recording = true;
        self.in_render_pass = false;
        lock(&self.state).commands.push(MockCommand::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record(MockCommand::End)?;
        self.recording = false;
        Ok(())
    }

    fn resource_barriers(&mut self, barriers: &[NativeBarrier<'_>]) -> Result<()> {
        if self.in_render_pass {
            engine_bail!(InvalidState => "quasar::mock", "{} barriers recorded inside a render pass", barriers.len());
        }
        let batch = barriers
            .iter()
            .map(|b| match b {
                NativeBarrier::Transition { resource, before, after } => MockBarrier::Transition {
                    resource: resource_name(resource),
                    before: *before,
                    after: *after,
                },
                NativeBarrier::UnorderedAccess { resource } => MockBarrier::UnorderedAccess {
                    resource: resource_name(resource),
                },
            })
            .collect();
        self.record(MockCommand::Barriers(batch))
    }

    fn set_descriptor_heap(&mut self, heap: &dyn DescriptorHeap) -> Result<()> {
        self.record(MockCommand::SetDescriptorHeap { heap: heap.desc().name.clone() })
    }

    fn set_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        let name = pipeline
            .as_any()
            .downcast_ref::<MockPipeline>()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        self.record(MockCommand::SetPipeline { name })
    }

    fn begin_render_pass(&mut self, begin: &RenderPassBegin<'_>) -> Result<()> {
        let clears = begin.color_attachments.iter().filter(|c| c.clear.is_some()).count()
            + begin.depth_attachment.iter().filter(|d| d.clear.is_some()).count();
        self.record(MockCommand::BeginRenderPass {
            color: begin.color_attachments.iter().map(|c| texture_name(c.texture)).collect(),
            depth: begin.depth_attachment.as_ref().map(|d| texture_name(d.texture)),
            clears,
        })?;
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record(MockCommand::EndRenderPass)?;
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(MockCommand::SetViewport(viewport))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(MockCommand::SetScissor(scissor))
    }

    fn set_constant_buffer(&mut self, parameter: u32, buffer: &dyn Buffer, offset: u64, size: u64) -> Result<()> {
        self.record(MockCommand::SetConstantBuffer {
            parameter,
            buffer: buffer.desc().name.clone(),
            offset,
            size,
        })
    }

    fn set_descriptor_table(&mut self, parameter: u32, base: GpuDescriptorHandle) -> Result<()> {
        self.record(MockCommand::SetDescriptorTable { parameter, base: base.0 })
    }

    fn set_push_constants(&mut self, parameter: u32, data: &[u8]) -> Result<()> {
        self.record(MockCommand::SetPushConstants { parameter, data: data.to_vec() })
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, offset: u64, stride: u32) -> Result<()> {
        self.record(MockCommand::BindVertexBuffer { slot, buffer: buffer.desc().name.clone(), offset, stride })
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.record(MockCommand::BindIndexBuffer { buffer: buffer.desc().name.clone(), offset, index_type })
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) -> Result<()> {
        self.record(MockCommand::Draw { vertex_count, instance_count })
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, _first_index: u32, _vertex_offset: i32, _first_instance: u32) -> Result<()> {
        self.record(MockCommand::DrawIndexed { index_count, instance_count })
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(MockCommand::Dispatch { x, y, z })
    }

    fn copy_buffer_region(&mut self, dst: &dyn Buffer, dst_offset: u64, src: &dyn Buffer, src_offset: u64, size: u64) -> Result<()> {
        self.record(MockCommand::CopyBuffer {
            dst: dst.desc().name.clone(),
            dst_offset,
            src: src.desc().name.clone(),
            src_offset,
            size,
        })?;
        let mut bytes = vec![0u8; size as usize];
        src.read(src_offset, &mut bytes)?;
        match dst.as_any().downcast_ref::<MockBuffer>() {
            Some(dst) => dst.copy_in(dst_offset, &bytes),
            None => engine_bail!("quasar::mock", "Copy destination is not a mock buffer"),
        }
    }

    fn copy_buffer_to_texture(&mut self, dst: &dyn Texture, src: &dyn Buffer, footprint: &TextureCopyFootprint) -> Result<()> {
        self.record(MockCommand::CopyBufferToTexture {
            dst: texture_name(dst),
            src: src.desc().name.clone(),
            footprint: *footprint,
        })?;
        let texture = match dst.as_any().downcast_ref::<MockTexture>() {
            Some(texture) => texture,
            None => engine_bail!("quasar::mock", "Copy destination is not a mock texture"),
        };
        // Strip the row padding back off
        let row_bytes = footprint.width as u64 * texture.info.format.bytes_per_pixel() as u64;
        let mut packed = Vec::with_capacity((row_bytes * footprint.height as u64) as usize);
        let mut row = vec![0u8; row_bytes as usize];
        for y in 0..footprint.height as u64 {
            src.read(footprint.offset + y * footprint.row_pitch, &mut row)?;
            packed.extend_from_slice(&row);
        }
        texture.uploads.lock().unwrap().push((footprint.array_layer, footprint.mip_level, packed));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Queue
// ============================================================================

pub struct MockQueue {
    pub queue_type: QueueType,
    state: SharedMockState,
}

impl CommandQueue for MockQueue {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn submit(&mut self, command_lists: &[&dyn CommandList]) -> Result<()> {
        for list in command_lists {
            if let Some(list) = list.as_any().downcast_ref::<MockCommandList>() {
                if list.recording {
                    engine_bail!(InvalidState => "quasar::mock", "Submitting a command list that is still recording");
                }
            }
        }
        lock(&self.state).events.push(MockEvent::Submitted { queue: self.queue_type, lists: command_lists.len() });
        Ok(())
    }

    fn signal(&mut self, value: u64) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Signaled { queue: self.queue_type, value });
        state.signaled.insert(self.queue_type, value);
        if state.auto_complete {
            state.completed.insert(self.queue_type, value);
        }
        Ok(())
    }

    fn completed_value(&self) -> Result<u64> {
        Ok(lock(&self.state).completed.get(&self.queue_type).copied().unwrap_or(0))
    }

    fn wait_for_value(&self, value: u64) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::Waited { queue: self.queue_type, value });
        let signaled = state.signaled.get(&self.queue_type).copied().unwrap_or(0);
        if signaled < value {
            engine_bail!("quasar::mock", "Waiting for fence value {} never signaled (last {})", value, signaled);
        }
        let completed = state.completed.entry(self.queue_type).or_insert(0);
        *completed = (*completed).max(value);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::QueueIdle { queue: self.queue_type });
        let signaled = state.signaled.get(&self.queue_type).copied().unwrap_or(0);
        state.completed.insert(self.queue_type, signaled);
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub width: u32,
    pub height: u32,
    pub images: u32,
    next_image: u32,
    state: SharedMockState,
}

impl MockSwapchain {
    pub fn new(device: &MockGraphicsDevice, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            images: 2,
            next_image: 0,
            state: device.state(),
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.images;
        lock(&self.state).events.push(MockEvent::Acquired { image });
        Ok(image)
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        lock(&self.state).events.push(MockEvent::Presented { image: image_index });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if std::mem::take(&mut lock(&self.state).fail_swapchain_resize) {
            engine_bail!("quasar::mock", "Surface lost while resizing to {}x{}", width, height);
        }
        self.width = width;
        self.height = height;
        self.next_image = 0;
        lock(&self.state).events.push(MockEvent::SwapchainResized { width, height });
        Ok(())
    }

    fn back_buffers(&self) -> Result<Vec<Box<dyn Texture>>> {
        let mut state = lock(&self.state);
        let mut textures: Vec<Box<dyn Texture>> = Vec::new();
        for i in 0..self.images {
            let id = state.next_id();
            textures.push(Box::new(MockTexture {
                id,
                name: format!("back_buffer_{}", i),
                info: TextureInfo {
                    width: self.width,
                    height: self.height,
                    array_layers: 1,
                    mip_levels: 1,
                    format: TextureFormat::B8G8R8A8_UNORM,
                    usage: TextureUsage::RENDER_TARGET,
                },
                uploads: Mutex::new(Vec::new()),
                owned: false,
                state: self.state.clone(),
            }));
        }
        Ok(textures)
    }

    fn image_count(&self) -> usize {
        self.images as usize
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_UNORM
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    state: SharedMockState,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                events: Vec::new(),
                commands: Vec::new(),
                heaps: Vec::new(),
                signaled: HashMap::new(),
                completed: HashMap::new(),
                auto_complete: true,
                fail_swapchain_resize: false,
                next_id: 0,
            })),
        }
    }

    /// Shared state, keep a clone before boxing the device
    pub fn state(&self) -> SharedMockState {
        self.state.clone()
    }

    fn check_slot(state: &MockState, handle: CpuDescriptorHandle) -> Result<(usize, usize)> {
        match state.locate(handle.0) {
            Some(location) => Ok(location),
            None => engine_bail!(InvalidHandle => "quasar::mock", "Descriptor handle {:#x} is not a heap slot", handle.0),
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<Box<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!("quasar::mock", "Buffer '{}' has zero size", desc.name);
        }
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id();
            state.events.push(MockEvent::BufferCreated { id, name: desc.name.clone() });
            id
        };
        Ok(Box::new(MockBuffer {
            id,
            desc: desc.clone(),
            data: Mutex::new(vec![0u8; desc.size as usize]),
            state: self.state.clone(),
        }))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Box<dyn Texture>> {
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id();
            state.events.push(MockEvent::TextureCreated { id, name: desc.name.clone() });
            id
        };
        Ok(Box::new(MockTexture {
            id,
            name: desc.name.clone(),
            info: desc.info(),
            uploads: Mutex::new(Vec::new()),
            owned: true,
            state: self.state.clone(),
        }))
    }

    fn create_descriptor_heap(&mut self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>> {
        let mut state = lock(&self.state);
        state.heaps.push((desc.clone(), vec![None; desc.capacity as usize]));
        Ok(Box::new(MockDescriptorHeap {
            desc: desc.clone(),
            index: state.heaps.len() as u64 - 1,
        }))
    }

    fn create_view(&mut self, resource: ResourceRef<'_>, view: &ViewDesc, dest: CpuDescriptorHandle) -> Result<()> {
        let mut state = lock(&self.state);
        let (heap, slot) = Self::check_slot(&state, dest)?;
        let name = resource_name(&resource);
        state.heaps[heap].1[slot] = Some(MockSlot { resource: name.clone(), view: *view });
        state.events.push(MockEvent::ViewCreated { dest: dest.0, kind: view.kind, resource: name });
        Ok(())
    }

    fn copy_descriptors(&mut self, dest: CpuDescriptorHandle, src: CpuDescriptorHandle, count: u32) -> Result<()> {
        let mut state = lock(&self.state);
        for i in 0..count {
            let (src_heap, src_slot) = Self::check_slot(&state, src.offset(i, 1))?;
            let (dst_heap, dst_slot) = Self::check_slot(&state, dest.offset(i, 1))?;
            let content = state.heaps[src_heap].1[src_slot].clone();
            state.heaps[dst_heap].1[dst_slot] = content;
        }
        state.events.push(MockEvent::DescriptorsCopied { dest: dest.0, src: src.0, count });
        Ok(())
    }

    fn release_view(&mut self, dest: CpuDescriptorHandle) -> Result<()> {
        let mut state = lock(&self.state);
        let (heap, slot) = Self::check_slot(&state, dest)?;
        state.heaps[heap].1[slot] = None;
        state.events.push(MockEvent::ViewReleased { dest: dest.0 });
        Ok(())
    }

    fn create_pipeline(&mut self, desc: &NativePipelineDesc<'_>) -> Result<Box<dyn Pipeline>> {
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id();
            state.events.push(MockEvent::PipelineCreated { id, name: desc.name.to_string() });
            id
        };
        Ok(Box::new(MockPipeline {
            id,
            name: desc.name.to_string(),
            compute: desc.graphics.is_none(),
            state: self.state.clone(),
        }))
    }

    fn create_command_list(&mut self, queue: QueueType) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList {
            queue,
            recording: false,
            in_render_pass: false,
            state: self.state.clone(),
        }))
    }

    fn create_queue(&mut self, queue: QueueType) -> Result<Box<dyn CommandQueue>> {
        Ok(Box::new(MockQueue {
            queue_type: queue,
            state: self.state.clone(),
        }))
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(MockEvent::DeviceIdle);
        let signaled = state.signaled.clone();
        state.completed.extend(signaled);
        Ok(())
    }
}

// ============================================================================
// Mock Shader Compiler
// ============================================================================

/// Compiler answering from a table of canned reflections
///
/// `set_shader` / `set_error` can be called between compilations to
/// simulate editing a shader on disk.
#[derive(Clone, Default)]
pub struct MockShaderCompiler {
    pub shaders: Arc<Mutex<HashMap<String, std::result::Result<ShaderReflection, String>>>>,
    /// Remaining forced failures per path
    pub failures: Arc<Mutex<HashMap<String, u32>>>,
    pub compile_count: Arc<Mutex<u32>>,
}

impl MockShaderCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_shader(&self, path: &str, reflection: ShaderReflection) {
        self.shaders.lock().unwrap().insert(path.to_string(), Ok(reflection));
    }

    pub fn set_error(&self, path: &str, message: &str) {
        self.shaders.lock().unwrap().insert(path.to_string(), Err(message.to_string()));
    }

    /// Fail the next `times` compilations of `path`
    pub fn fail_times(&self, path: &str, times: u32) {
        self.failures.lock().unwrap().insert(path.to_string(), times);
    }

    pub fn compiles(&self) -> u32 {
        *self.compile_count.lock().unwrap()
    }
}

impl ShaderCompiler for MockShaderCompiler {
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader> {
        let count = {
            let mut count = self.compile_count.lock().unwrap();
            *count += 1;
            *count
        };
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&source.path) {
            if *remaining > 0 {
                *remaining -= 1;
                engine_bail!(ShaderCompilationFailed => "quasar::mock", "{}: forced failure", source.path);
            }
        }
        match self.shaders.lock().unwrap().get(&source.path) {
            Some(Ok(reflection)) => {
                let mut reflection = reflection.clone();
                reflection.stage = source.stage;
                Ok(CompiledShader {
                    bytecode: format!("{}#{}", source.path, count).into_bytes(),
                    reflection,
                })
            }
            Some(Err(message)) => {
                engine_bail!(ShaderCompilationFailed => "quasar::mock", "{}: {}", source.path, message)
            }
            None => engine_bail!(ShaderCompilationFailed => "quasar::mock", "{}: file not found", source.path),
        }
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
