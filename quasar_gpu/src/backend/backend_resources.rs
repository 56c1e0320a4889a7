/// Resource creation, update and deferred destruction

use crate::config::{align_up, CONSTANT_BUFFER_ALIGNMENT};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::graphics_device::{
    Buffer, BufferDesc, BufferFlags, BufferUsage, GraphicsState, NativePipelineDesc, Pipeline,
    ResourceRef, ResourceState, StageBytecode, Texture, TextureDesc, TextureUsage, VertexLayout, ViewDesc,
    ViewKind,
};
use crate::resource::{
    view_for_slot, AnyHandle, BufferHandle, BufferRecord, BufferViews, PipelineHandle,
    PipelineRecord, ResourceHandle, TextureHandle, TextureRecord, TextureViews,
};
use crate::shader::{BindingLayout, CompiledShader, ShaderSource, ShaderStage};
use crate::{engine_bail, engine_debug, engine_info, engine_warn};

use super::backend::{Backend, DEPTH_STENCIL_HEAP, RENDER_TARGET_HEAP, STAGING_HEAP};

/// Pipeline creation parameters
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub name: String,
    pub stages: Vec<ShaderSource>,
    /// `None` for compute pipelines
    pub graphics: Option<GraphicsState>,
}

impl PipelineDesc {
    pub fn graphics(name: &str, stages: Vec<ShaderSource>, state: GraphicsState) -> Self {
        Self {
            name: name.to_string(),
            stages,
            graphics: Some(state),
        }
    }

    pub fn compute(name: &str, source: ShaderSource) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![source],
            graphics: None,
        }
    }
}

/// Result of [`Backend::reload_shaders`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// New bytecode, same binding layout (proxies unchanged)
    Reloaded,
    /// New bytecode and a different layout; proxies must be looked up again
    LayoutRebuilt,
    /// Compilation or layout derivation failed, the previous state is kept
    KeptPrevious,
}

impl Backend {
    // ===== BUFFERS =====

    /// Create a buffer, optionally with initial contents
    ///
    /// Static buffers receive `initial_data` through the upload subsystem and
    /// are not ready until the copy retires. CPU-writable buffers are written
    /// directly (every region of a dynamic buffer).
    pub fn create_buffer(&mut self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferHandle> {
        self.validate_buffer(desc, initial_data)?;

        let regions = if desc.usage == BufferUsage::Dynamic { self.frames.frames_in_flight() as u32 } else { 1 };
        let region_stride = if regions > 1 { align_up(desc.size, CONSTANT_BUFFER_ALIGNMENT) } else { 0 };
        let native_size = if regions > 1 {
            region_stride * regions as u64
        } else if desc.flags.contains(BufferFlags::CONSTANT) {
            align_up(desc.size, CONSTANT_BUFFER_ALIGNMENT)
        } else {
            desc.size
        };
        let native = self.device.create_buffer(&BufferDesc { size: native_size, ..desc.clone() })?;

        let mut created = Vec::new();
        let views = match self.create_buffer_views(native.as_ref(), desc, regions, region_stride, &mut created) {
            Ok(views) => views,
            Err(e) => {
                self.discard_views(&created);
                return Err(e);
            }
        };
        let bindless = if views.shader_resource.is_empty() {
            None
        } else {
            match self.publish_bindless(&views.shader_resource) {
                Ok(index) => Some(index),
                Err(e) => {
                    self.discard_views(&created);
                    return Err(e);
                }
            }
        };

        let state = match desc.usage {
            BufferUsage::Static => ResourceState::COMMON,
            BufferUsage::Dynamic | BufferUsage::Upload => ResourceState::GENERIC_READ,
            BufferUsage::Readback => ResourceState::COPY_DEST,
        };
        let ready = match desc.usage {
            BufferUsage::Static => initial_data.is_none() && desc.flags.contains(BufferFlags::UNORDERED_ACCESS),
            _ => true,
        };

        if desc.usage.is_cpu_writable() {
            if let Some(data) = initial_data {
                for region in 0..regions as u64 {
                    native.write(region * region_stride, data)?;
                }
            }
        }

        let record = BufferRecord {
            native,
            desc: desc.clone(),
            region_stride,
            regions,
            state,
            ready,
            views,
            bindless,
            retiring: false,
        };
        let handle = match self.buffers.insert(record) {
            Ok(handle) => handle,
            Err(e) => {
                self.discard_views(&created);
                if let Some(index) = bindless {
                    self.discard_bindless(index);
                }
                return Err(e);
            }
        };

        if desc.usage == BufferUsage::Static {
            if let Some(data) = initial_data {
                if let Err(e) = self.uploads.queue_buffer_upload(handle, 0, data.to_vec()) {
                    self.destroy_now(AnyHandle::Buffer(handle))?;
                    return Err(e);
                }
            }
        }

        engine_debug!("quasar::Backend", "Buffer '{}' created ({} bytes x {} regions, {:?}, bindless {:?})",
            desc.name, desc.size, regions, desc.usage, bindless);
        Ok(handle)
    }

    fn validate_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<()> {
        if desc.size == 0 {
            engine_bail!(InvalidResource => "quasar::Backend", "Buffer '{}' has zero size", desc.name);
        }
        if desc.flags.contains(BufferFlags::UNORDERED_ACCESS) && desc.usage != BufferUsage::Static {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Buffer '{}': unordered access requires static usage (got {:?})", desc.name, desc.usage);
        }
        if let Some(data) = initial_data {
            if desc.usage == BufferUsage::Readback {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "Readback buffer '{}' cannot have initial data", desc.name);
            }
            if data.len() as u64 > desc.size {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "Initial data of '{}' is {} bytes, buffer holds {}", desc.name, data.len(), desc.size);
            }
        }
        if self.buffers.available() == 0 {
            engine_bail!(CapacityExceeded => "quasar::Backend",
                "Buffer pool exhausted ({} buffers)", self.config.max_buffers);
        }
        Ok(())
    }

    fn create_buffer_views(
        &mut self,
        native: &dyn Buffer,
        desc: &BufferDesc,
        regions: u32,
        region_stride: u64,
        created: &mut Vec<Descriptor>,
    ) -> Result<BufferViews> {
        let mut views = BufferViews::default();
        for region in 0..regions as u64 {
            let offset = region * region_stride;
            if desc.flags.contains(BufferFlags::CONSTANT) {
                let size = align_up(desc.size, CONSTANT_BUFFER_ALIGNMENT);
                let view = ViewDesc::buffer(ViewKind::ConstantBuffer, offset, size, 0);
                views.constant.push(self.write_view(STAGING_HEAP, ResourceRef::Buffer(native), view, created)?);
            }
            if desc.flags.contains(BufferFlags::SHADER_RESOURCE) {
                let view = ViewDesc::buffer(ViewKind::ShaderResource, offset, desc.size, desc.stride);
                views.shader_resource.push(self.write_view(STAGING_HEAP, ResourceRef::Buffer(native), view, created)?);
            }
            if desc.flags.contains(BufferFlags::UNORDERED_ACCESS) {
                let view = ViewDesc::buffer(ViewKind::UnorderedAccess, offset, desc.size, desc.stride);
                views.unordered_access.push(self.write_view(STAGING_HEAP, ResourceRef::Buffer(native), view, created)?);
            }
        }
        Ok(views)
    }

    /// Write new data into a buffer
    ///
    /// Static buffers queue an upload, dynamic buffers write the region of
    /// the frame being recorded (or the next one between frames), upload
    /// buffers are written in place.
    ///
    /// Between frames the next slot may still be read by the GPU; a dynamic
    /// write first waits for that slot's fence on every queue.
    pub fn update_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let slot = self.write_slot();
        let record = self.buffers.get(handle)?;
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > record.desc.size) {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Update of '{}' at {}..{} exceeds its {} bytes",
                record.desc.name, offset, offset.saturating_add(data.len() as u64), record.desc.size);
        }
        match record.desc.usage {
            BufferUsage::Static => self.uploads.queue_buffer_upload(handle, offset, data.to_vec()),
            BufferUsage::Dynamic => {
                if !self.frames.is_recording() {
                    let queues = &self.queues;
                    self.frames.wait_slot(slot, |fence| {
                        for queue in queues {
                            queue.wait_for_value(fence)?;
                        }
                        Ok(())
                    })?;
                }
                record.native.write(record.region_offset(slot) + offset, data)
            }
            BufferUsage::Upload => record.native.write(offset, data),
            BufferUsage::Readback => engine_bail!(InvalidResource => "quasar::Backend",
                "Readback buffer '{}' cannot be written by the CPU", record.desc.name),
        }
    }

    /// Copy the contents of a readback buffer into `out`
    pub fn read_buffer(&self, handle: BufferHandle, offset: u64, out: &mut [u8]) -> Result<()> {
        let record = self.buffers.get(handle)?;
        if record.desc.usage != BufferUsage::Readback {
            engine_bail!(InvalidResource => "quasar::Backend",
                "'{}' is not a readback buffer ({:?})", record.desc.name, record.desc.usage);
        }
        if offset + out.len() as u64 > record.desc.size {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Read of '{}' at {}..{} exceeds its {} bytes",
                record.desc.name, offset, offset + out.len() as u64, record.desc.size);
        }
        record.native.read(offset, out)
    }

    /// Request destruction, performed when the current slot comes around again
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        let record = self.buffers.get_mut(handle)?;
        if record.retiring {
            engine_bail!(InvalidHandle => "quasar::Backend", "Buffer '{}' destroyed twice", record.desc.name);
        }
        record.retiring = true;
        self.frames.defer_destruction(AnyHandle::Buffer(handle));
        Ok(())
    }

    // ===== TEXTURES =====

    /// Create a texture, optionally with the tightly packed mip 0 of every layer
    ///
    /// Sampled textures get a bindless slot. A sampled texture that is not
    /// also written by the GPU stays not ready until its first upload retires.
    pub fn create_texture(&mut self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<TextureHandle> {
        self.validate_texture(desc, initial_data)?;
        let native = self.device.create_texture(desc)?;

        let mut created = Vec::new();
        let views = match self.create_texture_views(native.as_ref(), desc.usage, &mut created) {
            Ok(views) => views,
            Err(e) => {
                self.discard_views(&created);
                return Err(e);
            }
        };
        let bindless = match views.shader_resource {
            Some(srv) => match self.publish_bindless(&[srv]) {
                Ok(index) => Some(index),
                Err(e) => {
                    self.discard_views(&created);
                    return Err(e);
                }
            },
            None => None,
        };

        let gpu_written = desc.usage.intersects(
            TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL | TextureUsage::STORAGE,
        );
        let ready = initial_data.is_none() && (gpu_written || !desc.usage.contains(TextureUsage::SAMPLED));
        let info = native.info().clone();

        let record = TextureRecord {
            native,
            name: desc.name.clone(),
            state: ResourceState::COMMON,
            ready,
            views,
            bindless,
            swapchain_image: false,
            retiring: false,
        };
        let handle = match self.textures.insert(record) {
            Ok(handle) => handle,
            Err(e) => {
                self.discard_views(&created);
                if let Some(index) = bindless {
                    self.discard_bindless(index);
                }
                return Err(e);
            }
        };

        if let Some(data) = initial_data {
            if let Err(e) = self.uploads.queue_texture_upload(handle, &info, data.to_vec()) {
                self.destroy_now(AnyHandle::Texture(handle))?;
                return Err(e);
            }
        }

        engine_debug!("quasar::Backend", "Texture '{}' created ({}x{}x{} {:?}, bindless {:?})",
            desc.name, desc.width, desc.height, desc.array_layers, desc.format, bindless);
        Ok(handle)
    }

    fn validate_texture(&self, desc: &TextureDesc, initial_data: Option<&[u8]>) -> Result<()> {
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 || desc.mip_levels == 0 {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Texture '{}' has a zero dimension ({}x{}, {} layers, {} mips)",
                desc.name, desc.width, desc.height, desc.array_layers, desc.mip_levels);
        }
        if desc.usage.is_empty() {
            engine_bail!(InvalidResource => "quasar::Backend", "Texture '{}' has no usage", desc.name);
        }
        let depth_usage = desc.usage.contains(TextureUsage::DEPTH_STENCIL);
        if depth_usage != desc.format.is_depth() {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Texture '{}': depth-stencil usage and format {:?} do not match", desc.name, desc.format);
        }
        if depth_usage && desc.usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::STORAGE) {
            engine_bail!(InvalidResource => "quasar::Backend",
                "Depth texture '{}' cannot be a render target or storage image", desc.name);
        }
        if let Some(data) = initial_data {
            if data.len() as u64 != desc.info().mip0_size() {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "Initial data of '{}' is {} bytes, mip 0 needs {}", desc.name, data.len(), desc.info().mip0_size());
            }
        }
        if self.textures.available() == 0 {
            engine_bail!(CapacityExceeded => "quasar::Backend",
                "Texture pool exhausted ({} textures)", self.config.max_textures);
        }
        Ok(())
    }

    fn create_texture_views(
        &mut self,
        native: &dyn Texture,
        usage: TextureUsage,
        created: &mut Vec<Descriptor>,
    ) -> Result<TextureViews> {
        let resource = ResourceRef::Texture(native);
        let mut views = TextureViews::default();
        if usage.contains(TextureUsage::SAMPLED) {
            let view = ViewDesc::texture(ViewKind::ShaderResource);
            views.shader_resource = Some(self.write_view(STAGING_HEAP, resource, view, created)?);
        }
        if usage.contains(TextureUsage::STORAGE) {
            let view = ViewDesc::texture(ViewKind::UnorderedAccess);
            views.unordered_access = Some(self.write_view(STAGING_HEAP, resource, view, created)?);
        }
        if usage.contains(TextureUsage::RENDER_TARGET) {
            let view = ViewDesc::texture(ViewKind::RenderTarget);
            views.render_target = Some(self.write_view(RENDER_TARGET_HEAP, resource, view, created)?);
        }
        if usage.contains(TextureUsage::DEPTH_STENCIL) {
            let view = ViewDesc::texture(ViewKind::DepthStencil);
            views.depth_stencil = Some(self.write_view(DEPTH_STENCIL_HEAP, resource, view, created)?);
        }
        Ok(views)
    }

    /// Queue new contents for mip 0 of every layer
    pub fn update_texture(&mut self, handle: TextureHandle, data: &[u8]) -> Result<()> {
        let record = self.textures.get(handle)?;
        if record.swapchain_image {
            engine_bail!(InvalidResource => "quasar::Backend", "Back buffer '{}' cannot be uploaded to", record.name);
        }
        let info = record.native.info().clone();
        self.uploads.queue_texture_upload(handle, &info, data.to_vec())
    }

    /// Request destruction, performed when the current slot comes around again
    pub fn destroy_texture(&mut self, handle: TextureHandle) -> Result<()> {
        let record = self.textures.get_mut(handle)?;
        if record.swapchain_image {
            engine_bail!(InvalidHandle => "quasar::Backend", "'{}' belongs to the swapchain", record.name);
        }
        if record.retiring {
            engine_bail!(InvalidHandle => "quasar::Backend", "Texture '{}' destroyed twice", record.name);
        }
        record.retiring = true;
        self.frames.defer_destruction(AnyHandle::Texture(handle));
        Ok(())
    }

    // ===== PIPELINES =====

    /// Compile every stage, derive the binding layout and build the native pipeline
    ///
    /// A failing compilation is retried per `Config::shader_load_retry`.
    pub fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        self.validate_pipeline(desc)?;

        let compiled = desc
            .stages
            .iter()
            .map(|source| self.compile_with_retry(source))
            .collect::<Result<Vec<_>>>()?;
        let layout = self.build_layout(&compiled)?;
        let native = self.build_native(&desc.name, &desc.stages, &compiled, &layout, desc.graphics.as_ref())?;

        let proxies = layout.proxies().len();
        let handle = self.pipelines.insert(PipelineRecord {
            name: desc.name.clone(),
            native,
            sources: desc.stages.clone(),
            compiled,
            layout,
            graphics: desc.graphics.clone(),
            retiring: false,
        })?;

        engine_info!("quasar::Backend", "Pipeline '{}' created ({} stages, {} bindings)",
            desc.name, desc.stages.len(), proxies);
        Ok(handle)
    }

    fn validate_pipeline(&self, desc: &PipelineDesc) -> Result<()> {
        let has = |stage: ShaderStage| desc.stages.iter().any(|s| s.stage == stage);
        match desc.graphics {
            Some(_) => {
                if !has(ShaderStage::Vertex) || has(ShaderStage::Compute) {
                    engine_bail!(InvalidResource => "quasar::Backend",
                        "Graphics pipeline '{}' needs a vertex stage and no compute stage", desc.name);
                }
            }
            None => {
                if desc.stages.len() != 1 || !has(ShaderStage::Compute) {
                    engine_bail!(InvalidResource => "quasar::Backend",
                        "Compute pipeline '{}' needs exactly one compute stage", desc.name);
                }
            }
        }
        for (i, source) in desc.stages.iter().enumerate() {
            if desc.stages[..i].iter().any(|s| s.stage == source.stage) {
                engine_bail!(InvalidResource => "quasar::Backend",
                    "Pipeline '{}' has two {:?} stages", desc.name, source.stage);
            }
        }
        if self.pipelines.available() == 0 {
            engine_bail!(CapacityExceeded => "quasar::Backend",
                "Pipeline pool exhausted ({} pipelines)", self.config.max_pipelines);
        }
        Ok(())
    }

    fn compile_with_retry(&self, source: &ShaderSource) -> Result<CompiledShader> {
        let retry = self.config.shader_load_retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.compiler.compile(source) {
                Ok(compiled) => return Ok(compiled),
                Err(Error::ShaderCompilationFailed(message)) => {
                    if retry.max_attempts.is_some_and(|max| attempt >= max) {
                        engine_bail!(ShaderCompilationFailed => "quasar::Backend",
                            "'{}' still fails after {} attempts: {}", source.path, attempt, message);
                    }
                    engine_warn!("quasar::Backend", "'{}' failed to compile (attempt {}), retrying in {:?}: {}",
                        source.path, attempt, retry.interval, message);
                    std::thread::sleep(retry.interval);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn build_layout(&self, compiled: &[CompiledShader]) -> Result<BindingLayout> {
        let reflections: Vec<_> = compiled.iter().map(|c| &c.reflection).collect();
        BindingLayout::build(&reflections, &self.samplers)
    }

    fn build_native(
        &mut self,
        name: &str,
        sources: &[ShaderSource],
        compiled: &[CompiledShader],
        layout: &BindingLayout,
        graphics: Option<&GraphicsState>,
    ) -> Result<Box<dyn Pipeline>> {
        let vertex_layout = match graphics {
            Some(GraphicsState { vertex_layout: Some(explicit), .. }) => explicit.clone(),
            Some(_) => compiled
                .iter()
                .find(|c| c.reflection.stage == ShaderStage::Vertex)
                .map(|c| VertexLayout::from_input_elements(&c.reflection.input_elements))
                .unwrap_or_default(),
            None => VertexLayout::default(),
        };
        let stages = sources
            .iter()
            .zip(compiled)
            .map(|(source, compiled)| StageBytecode {
                stage: source.stage,
                entry_point: &source.entry_point,
                bytecode: &compiled.bytecode,
            })
            .collect();

        self.device.create_pipeline(&NativePipelineDesc {
            name,
            stages,
            layout,
            static_samplers: self.samplers.samplers(),
            graphics: graphics.cloned(),
            vertex_layout,
        })
    }

    /// Recompile a pipeline's shaders and rebuild it in place
    ///
    /// Idles the GPU first. A compile or layout failure keeps the previous
    /// bytecode, layout and native pipeline and is reported as
    /// [`ReloadOutcome::KeptPrevious`].
    pub fn reload_shaders(&mut self, handle: PipelineHandle) -> Result<ReloadOutcome> {
        if self.frames.is_recording() {
            engine_bail!(InvalidState => "quasar::Backend", "reload_shaders while a frame is being recorded");
        }
        let (name, sources, graphics) = {
            let record = self.pipelines.get(handle)?;
            (record.name.clone(), record.sources.clone(), record.graphics.clone())
        };
        self.flush_gpu()?;

        let compiled = match sources.iter().map(|s| self.compiler.compile(s)).collect::<Result<Vec<_>>>() {
            Ok(compiled) => compiled,
            Err(Error::ShaderCompilationFailed(message)) => {
                engine_warn!("quasar::Backend", "Reload of '{}' failed, keeping previous shaders: {}", name, message);
                return Ok(ReloadOutcome::KeptPrevious);
            }
            Err(e) => return Err(e),
        };
        let layout = match self.build_layout(&compiled) {
            Ok(layout) => layout,
            Err(Error::InvalidBinding(message)) => {
                engine_warn!("quasar::Backend", "Reload of '{}' has an invalid layout, keeping previous shaders: {}", name, message);
                return Ok(ReloadOutcome::KeptPrevious);
            }
            Err(e) => return Err(e),
        };
        let native = self.build_native(&name, &sources, &compiled, &layout, graphics.as_ref())?;

        let record = self.pipelines.get_mut(handle)?;
        let outcome = if record.layout == layout { ReloadOutcome::Reloaded } else { ReloadOutcome::LayoutRebuilt };
        record.native = native;
        record.compiled = compiled;
        record.layout = layout;

        engine_info!("quasar::Backend", "Pipeline '{}' reloaded ({:?})", name, outcome);
        Ok(outcome)
    }

    /// Request destruction, performed when the current slot comes around again
    pub fn destroy_pipeline(&mut self, handle: PipelineHandle) -> Result<()> {
        let record = self.pipelines.get_mut(handle)?;
        if record.retiring {
            engine_bail!(InvalidHandle => "quasar::Backend", "Pipeline '{}' destroyed twice", record.name);
        }
        record.retiring = true;
        self.frames.defer_destruction(AnyHandle::Pipeline(handle));
        Ok(())
    }

    // ===== QUERIES =====

    /// Proxy of the binding called `name` in the pipeline's layout
    pub fn proxy(&self, pipeline: PipelineHandle, name: &str) -> Result<Option<u32>> {
        Ok(self.pipelines.get(pipeline)?.layout.proxy(name))
    }

    pub fn binding_layout(&self, pipeline: PipelineHandle) -> Result<&BindingLayout> {
        Ok(&self.pipelines.get(pipeline)?.layout)
    }

    /// Stable index of the resource in the bindless table
    pub fn get_bindless_index(&self, resource: impl Into<ResourceHandle>) -> Result<u32> {
        let (name, bindless) = match resource.into() {
            ResourceHandle::Buffer(h) => {
                let record = self.buffers.get(h)?;
                (record.desc.name.as_str(), record.bindless)
            }
            ResourceHandle::Texture(h) => {
                let record = self.textures.get(h)?;
                (record.name.as_str(), record.bindless)
            }
        };
        match bindless {
            Some(index) => Ok(index),
            None => engine_bail!(InvalidResource => "quasar::Backend", "'{}' has no shader-resource view", name),
        }
    }

    /// False while the resource's initial upload has not retired
    pub fn get_is_ready(&self, resource: impl Into<ResourceHandle>) -> Result<bool> {
        Ok(match resource.into() {
            ResourceHandle::Buffer(h) => self.buffers.get(h)?.ready,
            ResourceHandle::Texture(h) => self.textures.get(h)?.ready,
        })
    }

    /// State the resource will be in once the queued barriers execute
    pub fn resource_state(&self, resource: impl Into<ResourceHandle>) -> Result<ResourceState> {
        self.state_of(resource.into())
    }

    // ===== DESCRIPTORS =====

    /// Allocate a staging slot in `heap_index` and write a view into it
    fn write_view(
        &mut self,
        heap_index: u32,
        resource: ResourceRef<'_>,
        view: ViewDesc,
        created: &mut Vec<Descriptor>,
    ) -> Result<Descriptor> {
        let descriptor = self.staging_heap_for(heap_index)?.get_new_descriptor()?;
        created.push(descriptor);
        self.device.create_view(resource, &view, descriptor.cpu)?;
        Ok(descriptor)
    }

    /// Allocate a bindless index and mirror the views into every frame heap
    ///
    /// Frame heap `f` receives `sources[f % sources.len()]`.
    fn publish_bindless(&mut self, sources: &[Descriptor]) -> Result<u32> {
        let index = self.bindless.allocate()?;
        for slot in 0..self.frame_heaps.len() {
            let copied = match view_for_slot(sources, slot) {
                Some(source) => self.frame_heaps[slot]
                    .reserved_descriptor(index)
                    .and_then(|dest| self.device.copy_descriptors(dest.cpu, source.cpu, 1)),
                None => Err(crate::engine_err!(InvalidResource => "quasar::Backend",
                    "No shader-resource view to publish")),
            };
            if let Err(e) = copied {
                self.discard_bindless(index);
                return Err(e);
            }
        }
        Ok(index)
    }

    fn discard_views(&mut self, created: &[Descriptor]) {
        for descriptor in created {
            if let Err(e) = self.release_descriptor(*descriptor) {
                engine_warn!("quasar::Backend", "Rollback of descriptor {:?} failed: {}", descriptor.cpu, e);
            }
        }
    }

    fn discard_bindless(&mut self, index: u32) {
        if let Err(e) = self.release_bindless(index) {
            engine_warn!("quasar::Backend", "Rollback of bindless slot {} failed: {}", index, e);
        }
    }
}

#[cfg(test)]
#[path = "backend_resources_tests.rs"]
mod tests;
