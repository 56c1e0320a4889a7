/// Command recording: passes, bindings, draws and dispatches
///
/// Bindings are validated against the layout of the pipeline bound by the
/// open pass. Table entries are collected from the resources' staging
/// descriptors and copied into a fresh transient block of the frame heap
/// right before the next draw or dispatch.

use bytemuck::Pod;

use crate::config::{align_up, CONSTANT_BUFFER_ALIGNMENT, INVALID_PARAMETER};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::graphics_device::{
    BufferFlags, ClearValue, ColorAttachment, DepthAttachment, IndexType, Rect2D, RenderPassBegin,
    ResourceState, ViewKind, Viewport,
};
use crate::resource::{view_for_slot, BufferHandle, PipelineHandle, ResourceHandle, TextureHandle};
use crate::shader::{ParameterKind, ProxyBinding, ProxyEntry};
use crate::{engine_bail, engine_trace};

use super::backend::Backend;

// ===== PASS DESCRIPTION =====

/// Color attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTarget {
    pub texture: TextureHandle,
    /// `None` keeps the previous contents
    pub clear: Option<[f32; 4]>,
    /// State to move the texture to when the pass ends
    pub next_state: Option<ResourceState>,
}

impl ColorTarget {
    pub fn new(texture: TextureHandle) -> Self {
        Self { texture, clear: None, next_state: None }
    }

    pub fn with_clear(mut self, color: [f32; 4]) -> Self {
        self.clear = Some(color);
        self
    }

    pub fn with_next_state(mut self, state: ResourceState) -> Self {
        self.next_state = Some(state);
        self
    }
}

/// Depth attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthTarget {
    pub texture: TextureHandle,
    /// (depth, stencil)
    pub clear: Option<(f32, u32)>,
    pub next_state: Option<ResourceState>,
}

impl DepthTarget {
    pub fn new(texture: TextureHandle) -> Self {
        Self { texture, clear: None, next_state: None }
    }

    pub fn with_clear(mut self, depth: f32, stencil: u32) -> Self {
        self.clear = Some((depth, stencil));
        self
    }

    pub fn with_next_state(mut self, state: ResourceState) -> Self {
        self.next_state = Some(state);
        self
    }
}

/// Targets of a render pass and the states its draws read resources in
///
/// No barrier can be recorded once the pass has begun, so every resource
/// the draws bind in a state it is not already in must be listed in
/// `resources`; the transitions are flushed before the pass begins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDesc {
    pub color: Vec<ColorTarget>,
    pub depth: Option<DepthTarget>,
    pub resources: Vec<(ResourceHandle, ResourceState)>,
}

impl RenderPassDesc {
    pub fn new(color: Vec<ColorTarget>) -> Self {
        Self { color, depth: None, resources: Vec::new() }
    }

    pub fn with_depth(mut self, depth: DepthTarget) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Move `resource` to `state` before the pass begins
    pub fn with_resource(mut self, resource: impl Into<ResourceHandle>, state: ResourceState) -> Self {
        self.resources.push((resource.into(), state));
        self
    }
}

// ===== ACTIVE PASS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassKind {
    Graphics,
    Compute,
}

/// Pass being recorded
pub(crate) struct ActivePass {
    pub kind: PassKind,
    pub pipeline: PipelineHandle,
    /// Transitions applied by `end_render_pass`
    pub next_states: Vec<(ResourceHandle, ResourceState)>,
    /// Staging descriptor of each table slot
    pub table: Vec<Option<Descriptor>>,
    pub table_dirty: bool,
}

impl Backend {
    // ===== PASSES =====

    /// Transition the targets, begin the native pass and bind `pipeline`
    ///
    /// Viewport and scissor cover the first target.
    pub fn begin_render_pass(&mut self, pipeline: PipelineHandle, desc: &RenderPassDesc) -> Result<()> {
        self.require_recording()?;
        if self.pass.is_some() {
            engine_bail!(InvalidState => "quasar::Backend", "begin_render_pass with a pass already open");
        }
        let (table_size, name) = {
            let record = self.pipelines.get(pipeline)?;
            if record.is_compute() {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "'{}' is a compute pipeline, use begin_compute_pass", record.name);
            }
            (record.layout.table_size(), record.name.clone())
        };
        if desc.color.is_empty() && desc.depth.is_none() {
            engine_bail!(InvalidResource => "quasar::Backend", "Render pass for '{}' has no target", name);
        }
        for target in &desc.color {
            let record = self.textures.get(target.texture)?;
            if record.views.render_target.is_none() {
                engine_bail!(InvalidResource => "quasar::Backend", "'{}' is not a render target", record.name);
            }
        }
        if let Some(depth) = &desc.depth {
            let record = self.textures.get(depth.texture)?;
            if record.views.depth_stencil.is_none() {
                engine_bail!(InvalidResource => "quasar::Backend", "'{}' is not a depth-stencil target", record.name);
            }
        }
        for &(resource, state) in &desc.resources {
            self.state_of(resource)?;
            let is_target = desc.color.iter().any(|t| ResourceHandle::from(t.texture) == resource)
                || desc.depth.is_some_and(|d| ResourceHandle::from(d.texture) == resource);
            if is_target || state.intersects(ResourceState::RENDER_TARGET | ResourceState::DEPTH_WRITE) {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "Render pass for '{}' declares {:?} in {:?}, targets go in color/depth", name, resource, state);
            }
        }

        for target in &desc.color {
            self.add_barrier(target.texture, ResourceState::RENDER_TARGET)?;
        }
        if let Some(depth) = &desc.depth {
            self.add_barrier(depth.texture, ResourceState::DEPTH_WRITE)?;
        }
        for &(resource, state) in &desc.resources {
            self.require_state(resource, state)?;
        }
        self.flush_barriers()?;

        let slot = self.frames.current_slot();
        let textures = &self.textures;
        let mut color_attachments = Vec::with_capacity(desc.color.len());
        for target in &desc.color {
            let record = textures.get(target.texture)?;
            color_attachments.push(ColorAttachment {
                texture: record.native.as_ref(),
                view: record.views.render_target.map(|d| d.cpu).unwrap_or_default(),
                clear: target.clear.map(ClearValue::Color),
            });
        }
        let depth_attachment = match &desc.depth {
            Some(depth) => {
                let record = textures.get(depth.texture)?;
                Some(DepthAttachment {
                    texture: record.native.as_ref(),
                    view: record.views.depth_stencil.map(|d| d.cpu).unwrap_or_default(),
                    clear: depth.clear.map(|(depth, stencil)| ClearValue::DepthStencil { depth, stencil }),
                })
            }
            None => None,
        };
        let info = match (color_attachments.first(), &depth_attachment) {
            (Some(color), _) => color.texture.info(),
            (None, Some(depth)) => depth.texture.info(),
            (None, None) => engine_bail!(InvalidResource => "quasar::Backend", "Render pass has no target"),
        };
        let (width, height) = (info.width, info.height);
        let begin = RenderPassBegin {
            color_attachments,
            depth_attachment,
            render_area: Rect2D::from_size(width, height),
        };

        let list = &mut self.command_lists[slot];
        list.begin_render_pass(&begin)?;
        list.set_pipeline(self.pipelines.get(pipeline)?.native.as_ref())?;
        list.set_viewport(Viewport::from_size(width, height))?;
        list.set_scissor(Rect2D::from_size(width, height))?;

        let mut next_states: Vec<(ResourceHandle, ResourceState)> = desc
            .color
            .iter()
            .filter_map(|t| t.next_state.map(|s| (t.texture.into(), s)))
            .collect();
        if let Some(depth) = &desc.depth {
            if let Some(state) = depth.next_state {
                next_states.push((depth.texture.into(), state));
            }
        }

        self.pass = Some(ActivePass {
            kind: PassKind::Graphics,
            pipeline,
            next_states,
            table: vec![None; table_size as usize],
            table_dirty: table_size > 0,
        });
        engine_trace!("quasar::Backend", "Render pass '{}' begun ({}x{})", name, width, height);
        Ok(())
    }

    /// End the native pass and queue the targets' declared next-state transitions
    pub fn end_render_pass(&mut self) -> Result<()> {
        let pass = self.take_pass(PassKind::Graphics)?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].end_render_pass()?;
        for (resource, state) in pass.next_states {
            self.add_barrier(resource, state)?;
        }
        Ok(())
    }

    pub fn begin_compute_pass(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.require_recording()?;
        if self.pass.is_some() {
            engine_bail!(InvalidState => "quasar::Backend", "begin_compute_pass with a pass already open");
        }
        let slot = self.frames.current_slot();
        let record = self.pipelines.get(pipeline)?;
        if !record.is_compute() {
            engine_bail!(InvalidResource => "quasar::Backend",
                "'{}' is a graphics pipeline, use begin_render_pass", record.name);
        }
        let table_size = record.layout.table_size();
        self.command_lists[slot].set_pipeline(record.native.as_ref())?;

        self.pass = Some(ActivePass {
            kind: PassKind::Compute,
            pipeline,
            next_states: Vec::new(),
            table: vec![None; table_size as usize],
            table_dirty: table_size > 0,
        });
        Ok(())
    }

    pub fn end_compute_pass(&mut self) -> Result<()> {
        self.take_pass(PassKind::Compute).map(|_| ())
    }

    fn take_pass(&mut self, kind: PassKind) -> Result<ActivePass> {
        match self.pass.take() {
            Some(pass) if pass.kind == kind => Ok(pass),
            Some(pass) => {
                let open = pass.kind;
                self.pass = Some(pass);
                engine_bail!(InvalidState => "quasar::Backend", "Ending a {:?} pass while a {:?} pass is open", kind, open)
            }
            None => engine_bail!(InvalidState => "quasar::Backend", "No {:?} pass is open", kind),
        }
    }

    fn active_pass(&self, kind: Option<PassKind>) -> Result<&ActivePass> {
        match &self.pass {
            Some(pass) if kind.is_none_or(|k| k == pass.kind) => Ok(pass),
            Some(pass) => engine_bail!(InvalidState => "quasar::Backend",
                "Operation needs a {:?} pass, a {:?} pass is open", kind, pass.kind),
            None => engine_bail!(InvalidState => "quasar::Backend", "No pass is open"),
        }
    }

    /// Layout entry of `proxy` in the open pass's pipeline
    fn pass_entry(&self, proxy: u32) -> Result<(ProxyEntry, PassKind)> {
        let pass = self.active_pass(None)?;
        let record = self.pipelines.get(pass.pipeline)?;
        match record.layout.entry(proxy) {
            Some(entry) => Ok((entry.clone(), pass.kind)),
            None => engine_bail!(InvalidBinding => "quasar::Backend",
                "Proxy {} is not declared by pipeline '{}'", proxy, record.name),
        }
    }

    fn set_table_entry(&mut self, offset: u32, descriptor: Descriptor) -> Result<()> {
        match self.pass.as_mut() {
            Some(pass) => {
                pass.table[offset as usize] = Some(descriptor);
                pass.table_dirty = true;
                Ok(())
            }
            None => engine_bail!(InvalidState => "quasar::Backend", "No pass is open"),
        }
    }

    // ===== BINDINGS =====

    /// Bind a buffer to a constant-buffer or table binding
    pub fn bind_buffer(&mut self, proxy: u32, handle: BufferHandle) -> Result<()> {
        let (entry, kind) = self.pass_entry(proxy)?;
        let slot = self.frames.current_slot();
        match entry.binding {
            ProxyBinding::ConstantBuffer => {
                let (offset, size) = {
                    let record = self.buffers.get(handle)?;
                    if !record.desc.flags.contains(BufferFlags::CONSTANT) {
                        engine_bail!(InvalidBinding => "quasar::Backend",
                            "'{}' bound to constant buffer '{}' without the CONSTANT flag", record.desc.name, entry.name);
                    }
                    (record.region_offset(slot), align_up(record.desc.size, CONSTANT_BUFFER_ALIGNMENT))
                };
                self.require_state(handle.into(), ResourceState::VERTEX_AND_CONSTANT_BUFFER)?;
                let record = self.buffers.get(handle)?;
                self.command_lists[slot].set_constant_buffer(entry.parameter, record.native.as_ref(), offset, size)
            }
            ProxyBinding::TableEntry { view, offset } => {
                let descriptor = {
                    let record = self.buffers.get(handle)?;
                    if entry.kind.is_texture() {
                        engine_bail!(InvalidBinding => "quasar::Backend",
                            "Buffer '{}' bound to texture binding '{}'", record.desc.name, entry.name);
                    }
                    let views = match view {
                        ViewKind::ShaderResource => &record.views.shader_resource,
                        _ => &record.views.unordered_access,
                    };
                    match view_for_slot(views, slot) {
                        Some(descriptor) => descriptor,
                        None => engine_bail!(InvalidBinding => "quasar::Backend",
                            "Buffer '{}' has no {:?} view for binding '{}'", record.desc.name, view, entry.name),
                    }
                };
                self.require_state(handle.into(), Self::view_state(view, kind))?;
                self.set_table_entry(offset, descriptor)
            }
            ProxyBinding::PushConstants => engine_bail!(InvalidBinding => "quasar::Backend",
                "'{}' is the push-constant block, use set_push_constants", entry.name),
        }
    }

    /// Bind a texture to a table binding
    pub fn bind_texture(&mut self, proxy: u32, handle: TextureHandle) -> Result<()> {
        let (entry, kind) = self.pass_entry(proxy)?;
        let (view, offset) = match entry.binding {
            ProxyBinding::TableEntry { view, offset } if entry.kind.is_texture() => (view, offset),
            _ => engine_bail!(InvalidBinding => "quasar::Backend",
                "'{}' ({:?}) cannot take a texture", entry.name, entry.kind),
        };
        let descriptor = {
            let record = self.textures.get(handle)?;
            let descriptor = match view {
                ViewKind::ShaderResource => record.views.shader_resource,
                _ => record.views.unordered_access,
            };
            match descriptor {
                Some(descriptor) => descriptor,
                None => engine_bail!(InvalidBinding => "quasar::Backend",
                    "Texture '{}' has no {:?} view for binding '{}'", record.name, view, entry.name),
            }
        };
        self.require_state(handle.into(), Self::view_state(view, kind))?;
        self.set_table_entry(offset, descriptor)
    }

    fn view_state(view: ViewKind, kind: PassKind) -> ResourceState {
        match (view, kind) {
            (ViewKind::UnorderedAccess, _) => ResourceState::UNORDERED_ACCESS,
            (_, PassKind::Compute) => ResourceState::NON_PIXEL_SHADER_RESOURCE,
            (_, PassKind::Graphics) => ResourceState::ALL_SHADER_RESOURCE,
        }
    }

    /// Copy `data` into the frame allocator and bind it as a constant buffer
    pub fn bind_constants(&mut self, proxy: u32, data: &[u8]) -> Result<()> {
        let (entry, _) = self.pass_entry(proxy)?;
        let declared = match self.binding_parameter_size(&entry) {
            Some(size) => size,
            None => engine_bail!(InvalidBinding => "quasar::Backend",
                "'{}' is not a constant buffer binding", entry.name),
        };
        if data.is_empty() || data.len() as u64 > align_up(declared as u64, CONSTANT_BUFFER_ALIGNMENT) {
            engine_bail!(InvalidBinding => "quasar::Backend",
                "{} bytes bound to '{}' declared with {} bytes", data.len(), entry.name, declared);
        }
        let slot = self.frames.current_slot();
        let offset = self.frame_allocators[slot].allocate(data)?;
        let size = align_up(data.len() as u64, CONSTANT_BUFFER_ALIGNMENT);
        let allocator = &self.frame_allocators[slot];
        self.command_lists[slot].set_constant_buffer(entry.parameter, allocator.buffer(), offset, size)
    }

    fn binding_parameter_size(&self, entry: &ProxyEntry) -> Option<u32> {
        if entry.binding != ProxyBinding::ConstantBuffer {
            return None;
        }
        let pass = self.pass.as_ref()?;
        let record = self.pipelines.get(pass.pipeline).ok()?;
        match record.layout.parameters().get(entry.parameter as usize)?.kind {
            ParameterKind::ConstantBuffer { size } => Some(size),
            _ => None,
        }
    }

    /// Upload the push-constant block of the bound pipeline
    pub fn set_push_constants(&mut self, data: &[u8]) -> Result<()> {
        let (parameter, size, name) = {
            let pass = self.active_pass(None)?;
            let record = self.pipelines.get(pass.pipeline)?;
            (record.layout.push_constant_parameter(), record.layout.push_constant_size(), record.name.clone())
        };
        if parameter == INVALID_PARAMETER {
            engine_bail!(InvalidBinding => "quasar::Backend", "Pipeline '{}' declares no push constants", name);
        }
        if data.len() as u32 > size || data.len() % 4 != 0 {
            engine_bail!(InvalidBinding => "quasar::Backend",
                "{} bytes of push constants for '{}' (block is {} bytes, 4-byte multiples)", data.len(), name, size);
        }
        let slot = self.frames.current_slot();
        self.command_lists[slot].set_push_constants(parameter, data)
    }

    /// [`bind_constants`](Self::bind_constants) for a plain-old-data value
    pub fn bind_value<T: Pod>(&mut self, proxy: u32, value: &T) -> Result<()> {
        self.bind_constants(proxy, bytemuck::bytes_of(value))
    }

    /// [`set_push_constants`](Self::set_push_constants) for a plain-old-data value
    pub fn push_value<T: Pod>(&mut self, value: &T) -> Result<()> {
        self.set_push_constants(bytemuck::bytes_of(value))
    }

    /// Bind a vertex buffer; the stride comes from the buffer descriptor
    pub fn set_vertex_buffer(&mut self, binding: u32, handle: BufferHandle) -> Result<()> {
        self.active_pass(Some(PassKind::Graphics))?;
        let slot = self.frames.current_slot();
        {
            let record = self.buffers.get(handle)?;
            if !record.desc.flags.contains(BufferFlags::VERTEX) || record.desc.stride == 0 {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "'{}' is not a vertex buffer (needs the VERTEX flag and a stride)", record.desc.name);
            }
        }
        self.require_state(handle.into(), ResourceState::VERTEX_AND_CONSTANT_BUFFER)?;
        let record = self.buffers.get(handle)?;
        self.command_lists[slot].bind_vertex_buffer(
            binding,
            record.native.as_ref(),
            record.region_offset(slot),
            record.desc.stride,
        )
    }

    pub fn set_index_buffer(&mut self, handle: BufferHandle, index_type: IndexType) -> Result<()> {
        self.active_pass(Some(PassKind::Graphics))?;
        let slot = self.frames.current_slot();
        if !self.buffers.get(handle)?.desc.flags.contains(BufferFlags::INDEX) {
            engine_bail!(InvalidResource => "quasar::Backend",
                "'{}' is not an index buffer", self.buffers.get(handle)?.desc.name);
        }
        self.require_state(handle.into(), ResourceState::INDEX_BUFFER)?;
        let record = self.buffers.get(handle)?;
        self.command_lists[slot].bind_index_buffer(record.native.as_ref(), record.region_offset(slot), index_type)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.active_pass(Some(PassKind::Graphics))?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].set_viewport(viewport)
    }

    pub fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.active_pass(Some(PassKind::Graphics))?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].set_scissor(scissor)
    }

    // ===== DRAWS =====

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.prepare(PassKind::Graphics)?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].draw(vertex_count, instance_count, 0, 0)
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.prepare(PassKind::Graphics)?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].draw_indexed(index_count, instance_count, first_index, vertex_offset, 0)
    }

    pub fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.prepare(PassKind::Compute)?;
        let slot = self.frames.current_slot();
        self.command_lists[slot].dispatch(group_count_x, group_count_y, group_count_z)
    }

    /// Flush barriers and materialize the descriptor table if it changed
    fn prepare(&mut self, kind: PassKind) -> Result<()> {
        let (pipeline, table) = {
            let pass = self.active_pass(Some(kind))?;
            (pass.pipeline, pass.table_dirty.then(|| pass.table.clone()))
        };
        self.flush_barriers()?;
        let table = match table {
            Some(table) => table,
            None => return Ok(()),
        };

        let record = self.pipelines.get(pipeline)?;
        let mut sources = Vec::with_capacity(table.len());
        for (offset, descriptor) in table.iter().enumerate() {
            match descriptor {
                Some(descriptor) => sources.push(*descriptor),
                None => {
                    let proxy = record.layout.table_entries()[offset];
                    engine_bail!(InvalidBinding => "quasar::Backend", "'{}' of pipeline '{}' is not bound",
                        record.layout.name(proxy).unwrap_or("?"), record.name);
                }
            }
        }
        let parameter = record.layout.descriptor_table_parameter();

        let slot = self.frames.current_slot();
        let heap = &self.frame_heaps[slot];
        let block = heap.get_user_descriptor_block_start(sources.len() as u32)?;
        for (i, source) in sources.iter().enumerate() {
            self.device.copy_descriptors(block.cpu.offset(i as u32, heap.increment()), source.cpu, 1)?;
        }
        self.command_lists[slot].set_descriptor_table(parameter, block.gpu)?;

        if let Some(pass) = self.pass.as_mut() {
            pass.table_dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "backend_recording_tests.rs"]
mod tests;
