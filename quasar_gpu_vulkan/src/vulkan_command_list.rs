/// CommandList - Vulkan implementation of the CommandList trait

use quasar_gpu::quasar::{Result, BINDLESS_REGISTER_SPACE};
use quasar_gpu::quasar::device::{
    Buffer as DeviceBuffer, ClearValue, CommandList as DeviceCommandList,
    DescriptorHeap as DeviceDescriptorHeap, GpuDescriptorHandle, IndexType, NativeBarrier,
    Pipeline as DevicePipeline, QueueType, Rect2D, RenderPassBegin, ResourceRef, ResourceState,
    Texture as DeviceTexture, TextureCopyFootprint, ViewKind, Viewport,
};
use quasar_gpu::{engine_bail, engine_err, engine_error, engine_trace};
use ash::vk;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_heap::{DescriptorHeap, DescriptorSlot};
use crate::vulkan_format::{aspect_mask, index_type_to_vk, state_to_layout, state_to_sync, view_image_layout};
use crate::vulkan_pipeline::{DrawSet, ParameterSlot, Pipeline};
use crate::vulkan_texture::Texture;

/// Sets one per-list descriptor pool can hold
const SETS_PER_POOL: u32 = 256;

/// Pipeline state copied out of the bound pipeline
struct BoundPipeline {
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
    parameters: Vec<ParameterSlot>,
    draw_sets: Vec<DrawSet>,
}

/// Constant buffer range bound to a parameter
#[derive(Clone, Copy)]
struct BoundConstants {
    buffer: vk::Buffer,
    offset: u64,
    size: u64,
}

/// Resolved descriptor waiting to be written into a per-draw set
enum PendingInfo {
    Image(vk::DescriptorImageInfo),
    Buffer(vk::DescriptorBufferInfo),
}

/// Vulkan command list implementation
///
/// Records commands into one primary command buffer. Constant buffers and
/// descriptor tables are not Vulkan objects: they are gathered while
/// recording and written into descriptor sets allocated from per-list pools
/// right before each draw or dispatch that needs them.
pub struct CommandList {
    ctx: Arc<GpuContext>,
    queue_type: QueueType,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
    /// Pools for per-draw sets, reset by `begin`
    descriptor_pools: Vec<vk::DescriptorPool>,
    pool_cursor: usize,
    /// Bindless set of the bound shader-visible heap
    bindless_set: Option<vk::DescriptorSet>,
    pipeline: Option<BoundPipeline>,
    constants: FxHashMap<u32, BoundConstants>,
    table_base: Option<GpuDescriptorHandle>,
    sets_dirty: bool,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue_type: QueueType) -> Result<Self> {
        let family = ctx.queue(queue_type).family;
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx.device.create_command_pool(&pool_info, None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_bail!("quasar::vulkan", "Failed to allocate command buffer: {:?}", e);
                }
            };

            Ok(Self {
                ctx,
                queue_type,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_render_pass: false,
                descriptor_pools: Vec::new(),
                pool_cursor: 0,
                bindless_set: None,
                pipeline: None,
                constants: FxHashMap::default(),
                table_base: None,
                sets_dirty: false,
            })
        }
    }

    pub(crate) fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.is_recording {
            engine_bail!(InvalidState => "quasar::vulkan", "Command list is not recording");
        }
        Ok(())
    }

    fn bound_pipeline(&self) -> Result<&BoundPipeline> {
        match &self.pipeline {
            Some(pipeline) => Ok(pipeline),
            None => engine_bail!(InvalidState => "quasar::vulkan", "No pipeline bound"),
        }
    }

    fn parameter(&self, parameter: u32) -> Result<&ParameterSlot> {
        let pipeline = self.bound_pipeline()?;
        match pipeline.parameters.get(parameter as usize) {
            Some(slot) => Ok(slot),
            None => engine_bail!(InvalidBinding => "quasar::vulkan",
                "Parameter {} outside the bound pipeline layout ({} parameters)", parameter, pipeline.parameters.len()),
        }
    }

    fn bind_bindless_set(&self) {
        if let (Some(set), Some(pipeline)) = (self.bindless_set, &self.pipeline) {
            unsafe {
                self.ctx.device.cmd_bind_descriptor_sets(
                    self.command_buffer,
                    pipeline.bind_point,
                    pipeline.layout,
                    BINDLESS_REGISTER_SPACE,
                    &[set],
                    &[],
                );
            }
        }
    }

    // ===== PER-DRAW SETS =====

    fn allocate_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        loop {
            let fresh = self.pool_cursor == self.descriptor_pools.len();
            if fresh {
                let pool = create_draw_pool(&self.ctx.device)?;
                self.descriptor_pools.push(pool);
            }
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(self.descriptor_pools[self.pool_cursor])
                .set_layouts(&layouts);
            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) if !fresh => {
                    // Pool full, move to the next one
                    self.pool_cursor += 1;
                }
                Err(e) => engine_bail!("quasar::vulkan", "Failed to allocate descriptor set: {:?}", e),
            }
        }
    }

    /// Write and bind the pipeline's sets if any binding changed since the last draw
    fn flush_sets(&mut self) -> Result<()> {
        if !self.sets_dirty {
            return Ok(());
        }
        let (draw_sets, layout, bind_point) = {
            let pipeline = self.bound_pipeline()?;
            (pipeline.draw_sets.clone(), pipeline.layout, pipeline.bind_point)
        };

        for draw_set in draw_sets {
            let pending = self.gather_set(draw_set.set)?;
            let set = self.allocate_set(draw_set.layout)?;

            let writes: Vec<vk::WriteDescriptorSet> = pending
                .iter()
                .map(|(binding, ty, info)| {
                    let write = vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .descriptor_type(*ty);
                    match info {
                        PendingInfo::Image(image) => write.image_info(std::slice::from_ref(image)),
                        PendingInfo::Buffer(buffer) => write.buffer_info(std::slice::from_ref(buffer)),
                    }
                })
                .collect();

            unsafe {
                self.ctx.device.update_descriptor_sets(&writes, &[]);
                self.ctx.device.cmd_bind_descriptor_sets(self.command_buffer, bind_point, layout, draw_set.set, &[set], &[]);
            }
        }

        self.sets_dirty = false;
        Ok(())
    }

    /// Descriptors of every constant buffer and table entry living in `set`
    fn gather_set(&self, set: u32) -> Result<Vec<(u32, vk::DescriptorType, PendingInfo)>> {
        let pipeline = self.bound_pipeline()?;
        let mut pending = Vec::new();

        for (index, slot) in pipeline.parameters.iter().enumerate() {
            match slot {
                ParameterSlot::Constant { set: s, binding } if *s == set => {
                    let bound = match self.constants.get(&(index as u32)) {
                        Some(bound) => *bound,
                        None => engine_bail!(InvalidBinding => "quasar::vulkan",
                            "Constant buffer parameter {} is not bound", index),
                    };
                    let info = vk::DescriptorBufferInfo::default()
                        .buffer(bound.buffer)
                        .offset(bound.offset)
                        .range(bound.size);
                    pending.push((*binding, vk::DescriptorType::UNIFORM_BUFFER, PendingInfo::Buffer(info)));
                }
                ParameterSlot::Table { set: s, entries } if *s == set && !entries.is_empty() => {
                    let base = match self.table_base {
                        Some(base) => base,
                        None => engine_bail!(InvalidBinding => "quasar::vulkan",
                            "Descriptor table parameter {} is not bound", index),
                    };
                    for entry in entries {
                        let slot = self.ctx.descriptors.read(base.offset(entry.offset, 1).0)?;
                        let info = table_info(&slot, entry.ty).ok_or_else(|| {
                            engine_err!(InvalidBinding => "quasar::vulkan",
                                "Table slot {} holds {:?}, binding {} expects {:?}", entry.offset, slot, entry.binding, entry.ty)
                        })?;
                        pending.push((entry.binding, entry.ty, info));
                    }
                }
                _ => {}
            }
        }
        Ok(pending)
    }

    // ===== BARRIERS =====

    fn texture_barrier(texture: &Texture, before: ResourceState, after: ResourceState) -> vk::ImageMemoryBarrier2<'static> {
        let (src_stage, src_access) = state_to_sync(before);
        let (dst_stage, dst_access) = state_to_sync(after);
        let format = texture.info().format;
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access)
            .old_layout(state_to_layout(before, true))
            .new_layout(state_to_layout(after, false))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(format, false),
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }

    fn buffer_barrier(buffer: &Buffer, before: ResourceState, after: ResourceState) -> vk::BufferMemoryBarrier2<'static> {
        let (src_stage, src_access) = state_to_sync(before);
        let (dst_stage, dst_access) = state_to_sync(after);
        vk::BufferMemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
    }
}

/// Descriptor info for a table slot, `None` if the slot cannot fill a binding of type `ty`
fn table_info(slot: &DescriptorSlot, ty: vk::DescriptorType) -> Option<PendingInfo> {
    match (*slot, ty) {
        (DescriptorSlot::Image { view, kind: ViewKind::ShaderResource, .. }, vk::DescriptorType::SAMPLED_IMAGE)
        | (DescriptorSlot::Image { view, kind: ViewKind::UnorderedAccess, .. }, vk::DescriptorType::STORAGE_IMAGE) => {
            let kind = if ty == vk::DescriptorType::STORAGE_IMAGE { ViewKind::UnorderedAccess } else { ViewKind::ShaderResource };
            Some(PendingInfo::Image(
                vk::DescriptorImageInfo::default()
                    .image_view(view)
                    .image_layout(view_image_layout(kind)),
            ))
        }
        (DescriptorSlot::Buffer { buffer, offset, range, kind: ViewKind::ShaderResource | ViewKind::UnorderedAccess }, vk::DescriptorType::STORAGE_BUFFER)
        | (DescriptorSlot::Buffer { buffer, offset, range, kind: ViewKind::ConstantBuffer }, vk::DescriptorType::UNIFORM_BUFFER) => {
            Some(PendingInfo::Buffer(
                vk::DescriptorBufferInfo::default()
                    .buffer(buffer)
                    .offset(offset)
                    .range(range),
            ))
        }
        _ => None,
    }
}

/// Layout transitions and pipeline barriers are invalid inside a dynamic
/// rendering instance
fn check_barrier_placement(in_render_pass: bool, barriers: &[NativeBarrier<'_>]) -> Result<()> {
    if !in_render_pass {
        return Ok(());
    }
    let layout_transitions = barriers
        .iter()
        .filter(|b| matches!(b, NativeBarrier::Transition { resource: ResourceRef::Texture(_), .. }))
        .count();
    engine_bail!(InvalidState => "quasar::vulkan",
        "{} barriers ({} image layout transitions) recorded inside a render pass",
        barriers.len(), layout_transitions)
}

fn create_draw_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize { ty: vk::DescriptorType::UNIFORM_BUFFER, descriptor_count: SETS_PER_POOL * 4 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLED_IMAGE, descriptor_count: SETS_PER_POOL * 4 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_IMAGE, descriptor_count: SETS_PER_POOL },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::STORAGE_BUFFER, descriptor_count: SETS_PER_POOL * 2 },
        vk::DescriptorPoolSize { ty: vk::DescriptorType::SAMPLER, descriptor_count: SETS_PER_POOL },
    ];
    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(SETS_PER_POOL)
        .pool_sizes(&pool_sizes);
    unsafe {
        device.create_descriptor_pool(&pool_info, None)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to create per-draw descriptor pool: {:?}", e))
    }
}

pub(crate) fn downcast_buffer(buffer: &dyn DeviceBuffer) -> Result<&Buffer> {
    buffer.as_any().downcast_ref::<Buffer>().ok_or_else(|| {
        engine_err!(InvalidResource => "quasar::vulkan", "Buffer '{}' was not created by the Vulkan device", buffer.desc().name)
    })
}

pub(crate) fn downcast_texture(texture: &dyn DeviceTexture) -> Result<&Texture> {
    texture.as_any().downcast_ref::<Texture>().ok_or_else(|| {
        engine_err!(InvalidResource => "quasar::vulkan", "Texture was not created by the Vulkan device")
    })
}

fn to_vk_rect(rect: Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D { width: rect.width, height: rect.height },
    }
}

fn to_vk_clear(clear: ClearValue) -> vk::ClearValue {
    match clear {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

impl DeviceCommandList for CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!(InvalidState => "quasar::vulkan", "Command list already recording");
        }

        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to reset command buffer: {:?}", e))?;
            for pool in &self.descriptor_pools {
                self.ctx.device.reset_descriptor_pool(*pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| engine_err!("quasar::vulkan", "Failed to reset descriptor pool: {:?}", e))?;
            }

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }

        self.pool_cursor = 0;
        self.bindless_set = None;
        self.pipeline = None;
        self.constants.clear();
        self.table_base = None;
        self.sets_dirty = false;
        self.in_render_pass = false;
        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "Command list ended inside a render pass");
        }
        unsafe {
            self.ctx.device.end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn resource_barriers(&mut self, barriers: &[NativeBarrier<'_>]) -> Result<()> {
        self.ensure_recording()?;
        if barriers.is_empty() {
            return Ok(());
        }
        check_barrier_placement(self.in_render_pass, barriers)?;

        let mut memory_barriers = Vec::new();
        let mut buffer_barriers = Vec::new();
        let mut image_barriers = Vec::new();

        for barrier in barriers {
            match *barrier {
                NativeBarrier::Transition { resource: ResourceRef::Buffer(buffer), before, after } => {
                    buffer_barriers.push(Self::buffer_barrier(downcast_buffer(buffer)?, before, after));
                }
                NativeBarrier::Transition { resource: ResourceRef::Texture(texture), before, after } => {
                    image_barriers.push(Self::texture_barrier(downcast_texture(texture)?, before, after));
                }
                NativeBarrier::UnorderedAccess { resource: ResourceRef::Buffer(_) } => {
                    let (stage, access) = state_to_sync(ResourceState::UNORDERED_ACCESS);
                    memory_barriers.push(
                        vk::MemoryBarrier2::default()
                            .src_stage_mask(stage)
                            .src_access_mask(access)
                            .dst_stage_mask(stage)
                            .dst_access_mask(access),
                    );
                }
                NativeBarrier::UnorderedAccess { resource: ResourceRef::Texture(texture) } => {
                    let uav = ResourceState::UNORDERED_ACCESS;
                    image_barriers.push(Self::texture_barrier(downcast_texture(texture)?, uav, uav));
                }
            }
        }

        let dependency = vk::DependencyInfo::default()
            .memory_barriers(&memory_barriers)
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(self.command_buffer, &dependency);
        }
        engine_trace!("quasar::vulkan", "{} barriers recorded", barriers.len());
        Ok(())
    }

    fn set_descriptor_heap(&mut self, heap: &dyn DeviceDescriptorHeap) -> Result<()> {
        self.ensure_recording()?;
        let heap = heap.as_any().downcast_ref::<DescriptorHeap>().ok_or_else(|| {
            engine_err!(InvalidResource => "quasar::vulkan", "Descriptor heap was not created by the Vulkan device")
        })?;
        let bindless = match &heap.storage.bindless {
            Some(bindless) => bindless.set,
            None => engine_bail!(InvalidResource => "quasar::vulkan",
                "Descriptor heap '{}' is not shader visible", heap.storage.desc.name),
        };
        self.bindless_set = Some(bindless);
        self.bind_bindless_set();
        Ok(())
    }

    fn set_pipeline(&mut self, pipeline: &dyn DevicePipeline) -> Result<()> {
        self.ensure_recording()?;
        let pipeline = pipeline.as_any().downcast_ref::<Pipeline>().ok_or_else(|| {
            engine_err!(InvalidResource => "quasar::vulkan", "Pipeline was not created by the Vulkan device")
        })?;

        unsafe {
            self.ctx.device.cmd_bind_pipeline(self.command_buffer, pipeline.bind_point, pipeline.pipeline);
        }
        self.pipeline = Some(BoundPipeline {
            layout: pipeline.layout,
            bind_point: pipeline.bind_point,
            parameters: pipeline.parameters.clone(),
            draw_sets: pipeline.draw_sets.clone(),
        });
        self.constants.clear();
        self.table_base = None;
        self.sets_dirty = true;
        self.bind_bindless_set();
        Ok(())
    }

    fn begin_render_pass(&mut self, begin: &RenderPassBegin<'_>) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "Render pass already active");
        }

        let mut color_attachments = Vec::with_capacity(begin.color_attachments.len());
        for attachment in &begin.color_attachments {
            let view = match self.ctx.descriptors.read(attachment.view.0)? {
                DescriptorSlot::Image { view, kind: ViewKind::RenderTarget, .. } => view,
                other => engine_bail!(InvalidResource => "quasar::vulkan",
                    "Color attachment descriptor holds {:?}, not a render-target view", other),
            };
            let mut info = vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .store_op(vk::AttachmentStoreOp::STORE);
            info = match attachment.clear {
                Some(clear) => info.load_op(vk::AttachmentLoadOp::CLEAR).clear_value(to_vk_clear(clear)),
                None => info.load_op(vk::AttachmentLoadOp::LOAD),
            };
            color_attachments.push(info);
        }

        let mut depth_attachment = None;
        let mut has_stencil = false;
        if let Some(attachment) = &begin.depth_attachment {
            let view = match self.ctx.descriptors.read(attachment.view.0)? {
                DescriptorSlot::Image { view, kind: ViewKind::DepthStencil, .. } => view,
                other => engine_bail!(InvalidResource => "quasar::vulkan",
                    "Depth attachment descriptor holds {:?}, not a depth-stencil view", other),
            };
            has_stencil = attachment.texture.info().format.has_stencil();
            let mut info = vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .store_op(vk::AttachmentStoreOp::STORE);
            info = match attachment.clear {
                Some(clear) => info.load_op(vk::AttachmentLoadOp::CLEAR).clear_value(to_vk_clear(clear)),
                None => info.load_op(vk::AttachmentLoadOp::LOAD),
            };
            depth_attachment = Some(info);
        }

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(to_vk_rect(begin.render_area))
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = &depth_attachment {
            rendering_info = rendering_info.depth_attachment(depth);
            if has_stencil {
                rendering_info = rendering_info.stencil_attachment(depth);
            }
        }

        unsafe {
            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "No render pass active");
        }
        unsafe {
            self.ctx.device.cmd_end_rendering(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;
        let native = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[native]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording()?;
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[to_vk_rect(scissor)]);
        }
        Ok(())
    }

    fn set_constant_buffer(&mut self, parameter: u32, buffer: &dyn DeviceBuffer, offset: u64, size: u64) -> Result<()> {
        self.ensure_recording()?;
        if !matches!(self.parameter(parameter)?, ParameterSlot::Constant { .. }) {
            engine_bail!(InvalidBinding => "quasar::vulkan", "Parameter {} is not a constant buffer", parameter);
        }
        let native = downcast_buffer(buffer)?;
        self.constants.insert(parameter, BoundConstants { buffer: native.buffer, offset, size });
        self.sets_dirty = true;
        Ok(())
    }

    fn set_descriptor_table(&mut self, parameter: u32, base: GpuDescriptorHandle) -> Result<()> {
        self.ensure_recording()?;
        if !matches!(self.parameter(parameter)?, ParameterSlot::Table { .. }) {
            engine_bail!(InvalidBinding => "quasar::vulkan", "Parameter {} is not a descriptor table", parameter);
        }
        if base.is_null() {
            engine_bail!(InvalidHandle => "quasar::vulkan", "Descriptor table base is a null handle");
        }
        self.table_base = Some(base);
        self.sets_dirty = true;
        Ok(())
    }

    fn set_push_constants(&mut self, parameter: u32, data: &[u8]) -> Result<()> {
        self.ensure_recording()?;
        let (stages, size) = match self.parameter(parameter)? {
            ParameterSlot::Push { stages, size } => (*stages, *size),
            _ => engine_bail!(InvalidBinding => "quasar::vulkan", "Parameter {} is not a push-constant block", parameter),
        };
        if data.len() > size as usize {
            engine_bail!(InvalidBinding => "quasar::vulkan",
                "{} bytes of push constants for a {}-byte block", data.len(), size);
        }
        let layout = self.bound_pipeline()?.layout;
        unsafe {
            self.ctx.device.cmd_push_constants(self.command_buffer, layout, stages, 0, data);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &dyn DeviceBuffer, offset: u64, _stride: u32) -> Result<()> {
        self.ensure_recording()?;
        // The stride is part of the pipeline's vertex input state
        let native = downcast_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, slot, &[native.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording()?;
        let native = downcast_buffer(buffer)?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(self.command_buffer, native.buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "Draw outside a render pass");
        }
        self.flush_sets()?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "Draw outside a render pass");
        }
        self.flush_sets()?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!(InvalidState => "quasar::vulkan", "Dispatch inside a render pass");
        }
        self.flush_sets()?;
        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, group_count_x, group_count_y, group_count_z);
        }
        Ok(())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &dyn DeviceBuffer,
        dst_offset: u64,
        src: &dyn DeviceBuffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.ensure_recording()?;
        let (dst, src) = (downcast_buffer(dst)?, downcast_buffer(src)?);
        let region = vk::BufferCopy { src_offset, dst_offset, size };
        unsafe {
            self.ctx.device.cmd_copy_buffer(self.command_buffer, src.buffer, dst.buffer, &[region]);
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &dyn DeviceTexture,
        src: &dyn DeviceBuffer,
        footprint: &TextureCopyFootprint,
    ) -> Result<()> {
        self.ensure_recording()?;
        let (texture, buffer) = (downcast_texture(dst)?, downcast_buffer(src)?);
        let format = texture.info().format;
        let texel_size = format.bytes_per_pixel() as u64;
        if footprint.row_pitch % texel_size != 0 {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "Row pitch {} is not a multiple of the {}-byte texel", footprint.row_pitch, texel_size);
        }

        let region = vk::BufferImageCopy::default()
            .buffer_offset(footprint.offset)
            .buffer_row_length((footprint.row_pitch / texel_size) as u32)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: aspect_mask(format, true),
                mip_level: footprint.mip_level,
                base_array_layer: footprint.array_layer,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D { width: footprint.width, height: footprint.height, depth: 1 });

        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                buffer.buffer,
                texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            for pool in self.descriptor_pools.drain(..) {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
            // Frees the command buffer as well
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
        if self.is_recording {
            engine_error!("quasar::vulkan", "Command list dropped while recording");
        }
    }
}

pub(crate) fn downcast_command_list(list: &dyn DeviceCommandList) -> Result<&CommandList> {
    list.as_any().downcast_ref::<CommandList>().ok_or_else(|| {
        engine_err!(InvalidResource => "quasar::vulkan", "Command list was not created by the Vulkan device")
    })
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
