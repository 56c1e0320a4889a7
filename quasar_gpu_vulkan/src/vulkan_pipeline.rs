/// Pipeline - Vulkan implementation of the Pipeline trait
///
/// The binding layout maps onto Vulkan as follows:
///
/// - register space -> descriptor set, register -> binding
/// - set `BINDLESS_REGISTER_SPACE` is always the global bindless layout
/// - push-constant parameter -> push constant range at offset 0
/// - constant buffers -> UNIFORM_BUFFER bindings written at draw time
/// - descriptor table entries -> typed bindings written at draw time from
///   the heap block the table points at
/// - samplers -> immutable SAMPLER bindings

use ash::vk;
use quasar_gpu::quasar::{Result, BINDLESS_REGISTER_SPACE};
use quasar_gpu::quasar::device::{NativePipelineDesc, Pipeline as DevicePipeline};
use quasar_gpu::quasar::shader::{BindingLayout, ParameterKind, ShaderStage, StaticSampler};
use quasar_gpu::{engine_bail, engine_debug, engine_err};
use std::any::Any;
use std::collections::BTreeMap;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, buffer_format_to_vk, compare_op_to_vk, cull_mode_to_vk,
    front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk, resource_kind_to_descriptor,
    stage_flags_to_vk, stage_to_vk, texture_format_to_vk, topology_to_vk,
};

// ===== BINDING PLAN =====

/// One binding of a per-pipeline descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
    /// Index into the static sampler table for immutable samplers
    pub sampler: Option<u32>,
}

/// One descriptor-table entry and where it lands in its set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableBinding {
    pub offset: u32,
    pub binding: u32,
    pub ty: vk::DescriptorType,
}

/// How a layout parameter is bound on the command list
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParameterSlot {
    Push { stages: vk::ShaderStageFlags, size: u32 },
    Constant { set: u32, binding: u32 },
    Table { set: u32, entries: Vec<TableBinding> },
}

/// Vulkan shape of a binding layout, before any object is created
#[derive(Debug, Default)]
pub(crate) struct BindingPlan {
    pub sets: BTreeMap<u32, Vec<PlannedBinding>>,
    pub parameters: Vec<ParameterSlot>,
    pub push_range: Option<vk::PushConstantRange>,
}

impl BindingPlan {
    pub(crate) fn build(layout: &BindingLayout) -> Result<Self> {
        let mut plan = Self::default();

        for (index, parameter) in layout.parameters().iter().enumerate() {
            let stages = stage_flags_to_vk(parameter.visibility);
            let slot = match parameter.kind {
                ParameterKind::PushConstants { size } => {
                    plan.push_range = Some(vk::PushConstantRange { stage_flags: stages, offset: 0, size });
                    ParameterSlot::Push { stages, size }
                }
                ParameterKind::ConstantBuffer { .. } => {
                    plan.add(parameter.space, PlannedBinding {
                        binding: parameter.register,
                        ty: vk::DescriptorType::UNIFORM_BUFFER,
                        stages,
                        sampler: None,
                    })?;
                    ParameterSlot::Constant { set: parameter.space, binding: parameter.register }
                }
                ParameterKind::DescriptorTable { .. } => {
                    let mut entries = Vec::with_capacity(layout.table_entries().len());
                    for (offset, &proxy) in layout.table_entries().iter().enumerate() {
                        let entry = match layout.entry(proxy) {
                            Some(entry) => entry,
                            None => engine_bail!(InvalidBinding => "quasar::vulkan",
                                "Descriptor table of parameter {} names unknown proxy {}", index, proxy),
                        };
                        let ty = match resource_kind_to_descriptor(&entry.kind) {
                            Some(ty) => ty,
                            None => engine_bail!(InvalidBinding => "quasar::vulkan",
                                "'{}' of type {:?} has no Vulkan descriptor type", entry.name, entry.kind),
                        };
                        plan.add(parameter.space, PlannedBinding { binding: entry.register, ty, stages, sampler: None })?;
                        entries.push(TableBinding { offset: offset as u32, binding: entry.register, ty });
                    }
                    ParameterSlot::Table { set: parameter.space, entries }
                }
            };
            plan.parameters.push(slot);
        }

        for sampler in layout.samplers() {
            plan.add(sampler.space, PlannedBinding {
                binding: sampler.register,
                ty: vk::DescriptorType::SAMPLER,
                stages: stage_flags_to_vk(sampler.visibility),
                sampler: Some(sampler.sampler_index),
            })?;
        }

        Ok(plan)
    }

    fn add(&mut self, set: u32, binding: PlannedBinding) -> Result<()> {
        if set == BINDLESS_REGISTER_SPACE {
            engine_bail!(InvalidBinding => "quasar::vulkan",
                "Binding {} uses space {}, reserved for the bindless set", binding.binding, set);
        }
        let bindings = self.sets.entry(set).or_default();
        if bindings.iter().any(|b| b.binding == binding.binding) {
            engine_bail!(InvalidBinding => "quasar::vulkan",
                "Binding {} of set {} is declared twice", binding.binding, set);
        }
        bindings.push(binding);
        Ok(())
    }

    /// Number of sets in the pipeline layout, the bindless set included
    pub(crate) fn set_count(&self) -> u32 {
        let highest = self.sets.keys().next_back().copied().unwrap_or(0);
        highest.max(BINDLESS_REGISTER_SPACE) + 1
    }
}

/// A per-pipeline set written and bound before each draw
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrawSet {
    pub set: u32,
    pub layout: vk::DescriptorSetLayout,
}

// ===== PIPELINE =====

/// Vulkan pipeline implementation
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) bind_point: vk::PipelineBindPoint,
    pub(crate) parameters: Vec<ParameterSlot>,
    pub(crate) draw_sets: Vec<DrawSet>,
    /// Set layouts owned by this pipeline (the bindless layout is not)
    owned_set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl Pipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &NativePipelineDesc<'_>) -> Result<Self> {
        let plan = BindingPlan::build(desc.layout)?;

        let mut pipeline = Self {
            ctx,
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            bind_point: if desc.graphics.is_some() {
                vk::PipelineBindPoint::GRAPHICS
            } else {
                vk::PipelineBindPoint::COMPUTE
            },
            parameters: plan.parameters.clone(),
            draw_sets: Vec::new(),
            owned_set_layouts: Vec::new(),
        };

        // Partially built objects are released by Drop on error
        pipeline.create_layout(&plan, desc.static_samplers, desc.name)?;

        let modules = pipeline.create_modules(desc)?;
        let created = if desc.graphics.is_some() {
            pipeline.create_graphics(desc, &modules)
        } else {
            pipeline.create_compute(desc, &modules)
        };
        unsafe {
            for (_, module, _) in &modules {
                pipeline.ctx.device.destroy_shader_module(*module, None);
            }
        }
        pipeline.pipeline = created?;

        engine_debug!("quasar::vulkan", "Pipeline '{}' created ({} sets, {} parameters)",
            desc.name, plan.set_count(), pipeline.parameters.len());
        Ok(pipeline)
    }

    fn create_layout(&mut self, plan: &BindingPlan, static_samplers: &[StaticSampler], name: &str) -> Result<()> {
        let device = &self.ctx.device;
        let mut set_layouts = Vec::with_capacity(plan.set_count() as usize);

        for set in 0..plan.set_count() {
            if set == BINDLESS_REGISTER_SPACE {
                set_layouts.push(self.ctx.bindless_layout);
                continue;
            }

            let planned = plan.sets.get(&set).map(Vec::as_slice).unwrap_or(&[]);
            let mut immutable = Vec::with_capacity(planned.len());
            for binding in planned {
                let samplers = match binding.sampler {
                    Some(index) => {
                        let sampler = match static_samplers.get(index as usize) {
                            Some(sampler) => sampler,
                            None => engine_bail!(InvalidBinding => "quasar::vulkan",
                                "Pipeline '{}' uses static sampler {} of {}", name, index, static_samplers.len()),
                        };
                        let mut cache = self.ctx.samplers.lock()
                            .map_err(|_| engine_err!("quasar::vulkan", "Sampler cache mutex poisoned"))?;
                        let native = cache.get_or_create(device, sampler)?;
                        engine_debug!("quasar::vulkan", "{} static samplers cached", cache.len());
                        vec![native]
                    }
                    None => Vec::new(),
                };
                immutable.push(samplers);
            }

            let bindings: Vec<vk::DescriptorSetLayoutBinding> = planned
                .iter()
                .zip(&immutable)
                .map(|(binding, samplers)| {
                    let layout_binding = vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.binding)
                        .descriptor_type(binding.ty)
                        .descriptor_count(1)
                        .stage_flags(binding.stages);
                    if samplers.is_empty() {
                        layout_binding
                    } else {
                        layout_binding.immutable_samplers(samplers)
                    }
                })
                .collect();

            let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let set_layout = unsafe {
                device.create_descriptor_set_layout(&layout_info, None)
                    .map_err(|e| engine_err!("quasar::vulkan", "Failed to create set layout {} of '{}': {:?}", set, name, e))?
            };
            self.owned_set_layouts.push(set_layout);
            set_layouts.push(set_layout);
            if !planned.is_empty() {
                self.draw_sets.push(DrawSet { set, layout: set_layout });
            }
        }

        let push_ranges: Vec<vk::PushConstantRange> = plan.push_range.into_iter().collect();
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_ranges);

        self.layout = unsafe {
            device.create_pipeline_layout(&layout_info, None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create pipeline layout of '{}': {:?}", name, e))?
        };
        Ok(())
    }

    fn create_modules(&self, desc: &NativePipelineDesc<'_>) -> Result<Vec<(ShaderStage, vk::ShaderModule, CString)>> {
        let mut modules = Vec::with_capacity(desc.stages.len());
        for stage in &desc.stages {
            let created = create_module(&self.ctx.device, stage.bytecode, desc.name).and_then(|module| {
                match CString::new(stage.entry_point) {
                    Ok(entry) => Ok((stage.stage, module, entry)),
                    Err(_) => {
                        unsafe { self.ctx.device.destroy_shader_module(module, None); }
                        Err(engine_err!(InvalidResource => "quasar::vulkan",
                            "Entry point '{}' of '{}' contains a NUL byte", stage.entry_point, desc.name))
                    }
                }
            });
            match created {
                Ok(module) => modules.push(module),
                Err(e) => {
                    for (_, module, _) in &modules {
                        unsafe { self.ctx.device.destroy_shader_module(*module, None); }
                    }
                    return Err(e);
                }
            }
        }
        Ok(modules)
    }

    fn create_graphics(&self, desc: &NativePipelineDesc<'_>, modules: &[(ShaderStage, vk::ShaderModule, CString)]) -> Result<vk::Pipeline> {
        let state = match &desc.graphics {
            Some(state) => state,
            None => engine_bail!(InvalidState => "quasar::vulkan", "'{}' is not a graphics pipeline", desc.name),
        };

        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .map(|(stage, module, entry)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage_to_vk(*stage))
                    .module(*module)
                    .name(entry)
            })
            .collect();

        // Vertex input state
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc.vertex_layout.bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: input_rate_to_vk(binding.input_rate),
            })
            .collect();

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc.vertex_layout.attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(state.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(state.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(state.rasterization.cull_mode))
            .front_face(front_face_to_vk(state.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth.test_enable)
            .depth_write_enable(state.depth.write_enable)
            .depth_compare_op(compare_op_to_vk(state.depth.compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend = &state.color_blend;
        let color_blend_attachment = {
            let mut attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(blend.blend_enable);
            if blend.blend_enable {
                attachment = attachment
                    .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
                    .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
                    .color_blend_op(blend_op_to_vk(blend.color_blend_op))
                    .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
                    .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
                    .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op));
            }
            attachment
        };
        let blend_attachments = vec![color_blend_attachment; state.color_formats.len()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        // Dynamic rendering: attachment formats replace the render pass
        let color_formats: Vec<vk::Format> = state.color_formats.iter().map(|f| texture_format_to_vk(*f)).collect();
        let depth_format = state.depth_format.map(texture_format_to_vk).unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = match state.depth_format {
            Some(format) if format.has_stencil() => depth_format,
            _ => vk::Format::UNDEFINED,
        };
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering_info);

        let pipelines = unsafe {
            self.ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e.1))?
        };
        Ok(pipelines[0])
    }

    fn create_compute(&self, desc: &NativePipelineDesc<'_>, modules: &[(ShaderStage, vk::ShaderModule, CString)]) -> Result<vk::Pipeline> {
        let (stage, module, entry) = match modules {
            [single] => single,
            _ => engine_bail!(InvalidResource => "quasar::vulkan",
                "Compute pipeline '{}' needs exactly one stage (got {})", desc.name, modules.len()),
        };
        if *stage != ShaderStage::Compute {
            engine_bail!(InvalidResource => "quasar::vulkan",
                "Compute pipeline '{}' was given a {:?} stage", desc.name, stage);
        }

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(*module)
            .name(entry);
        let pipeline_info = vk::ComputePipelineCreateInfo::default()
            .stage(stage_info)
            .layout(self.layout);

        let pipelines = unsafe {
            self.ctx.device.create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|e| engine_err!("quasar::vulkan", "Failed to create compute pipeline '{}': {:?}", desc.name, e.1))?
        };
        Ok(pipelines[0])
    }
}

/// SPIR-V words must be 4-byte aligned, the copy takes care of it
fn create_module(device: &ash::Device, bytecode: &[u8], name: &str) -> Result<vk::ShaderModule> {
    if bytecode.is_empty() || bytecode.len() % 4 != 0 {
        engine_bail!(InvalidResource => "quasar::vulkan",
            "SPIR-V of '{}' is {} bytes, not a whole number of words", name, bytecode.len());
    }
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(bytecode);
    let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
    unsafe {
        device.create_shader_module(&create_info, None)
            .map_err(|e| engine_err!("quasar::vulkan", "Failed to create shader module for '{}': {:?}", name, e))
    }
}

impl DevicePipeline for Pipeline {
    fn is_compute(&self) -> bool {
        self.bind_point == vk::PipelineBindPoint::COMPUTE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.ctx.device.destroy_pipeline(self.pipeline, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                self.ctx.device.destroy_pipeline_layout(self.layout, None);
            }
            for layout in self.owned_set_layouts.drain(..) {
                self.ctx.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
