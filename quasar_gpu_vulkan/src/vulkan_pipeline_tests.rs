//! Unit tests for the binding layout -> Vulkan set mapping (no GPU required)

use super::*;
use quasar_gpu::quasar::PUSH_CONSTANT_REGISTER;
use quasar_gpu::quasar::shader::{ReflectedResource, ResourceKind, SamplerRegistry, ShaderReflection};

fn resource(name: &str, kind: ResourceKind, register: u32, space: u32, size: u32) -> ReflectedResource {
    ReflectedResource {
        name: name.to_string(),
        kind,
        register,
        space,
        count: 1,
        size,
    }
}

fn layout(stages: &[ShaderReflection]) -> BindingLayout {
    let refs: Vec<&ShaderReflection> = stages.iter().collect();
    BindingLayout::build(&refs, &SamplerRegistry::with_defaults()).unwrap()
}

fn forward_layout() -> BindingLayout {
    let vertex = ShaderReflection::new(ShaderStage::Vertex)
        .with_resource(resource("draw", ResourceKind::ConstantBuffer, PUSH_CONSTANT_REGISTER, 0, 16))
        .with_resource(resource("camera", ResourceKind::ConstantBuffer, 0, 0, 128));
    let pixel = ShaderReflection::new(ShaderStage::Pixel)
        .with_resource(resource("albedo", ResourceKind::Texture, 1, 0, 0))
        .with_resource(resource("lights", ResourceKind::StructuredBuffer, 2, 0, 0))
        .with_resource(resource("linear_wrap", ResourceKind::Sampler, 3, 0, 0))
        .with_resource(resource("bindless_textures", ResourceKind::Texture, 0, BINDLESS_REGISTER_SPACE, 0));
    layout(&[vertex, pixel])
}

// ============================================================================
// PARAMETERS
// ============================================================================

#[test]
fn test_push_constants_become_a_range() {
    let plan = BindingPlan::build(&forward_layout()).unwrap();
    let range = plan.push_range.unwrap();
    assert_eq!(range.offset, 0);
    assert_eq!(range.size, 16);
    assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    assert!(plan.parameters.contains(&ParameterSlot::Push { stages: vk::ShaderStageFlags::VERTEX, size: 16 }));
}

#[test]
fn test_constant_buffer_parameter_maps_to_set_and_binding() {
    let plan = BindingPlan::build(&forward_layout()).unwrap();
    assert!(plan.parameters.contains(&ParameterSlot::Constant { set: 0, binding: 0 }));
    let uniform = plan.sets[&0].iter().find(|b| b.binding == 0).unwrap();
    assert_eq!(uniform.ty, vk::DescriptorType::UNIFORM_BUFFER);
}

#[test]
fn test_table_entries_keep_slot_order() {
    let layout = forward_layout();
    let plan = BindingPlan::build(&layout).unwrap();
    let table = plan.parameters.iter().find_map(|p| match p {
        ParameterSlot::Table { set, entries } => Some((*set, entries.clone())),
        _ => None,
    });
    let (set, entries) = table.unwrap();
    assert_eq!(set, 0);
    assert_eq!(entries, vec![
        TableBinding { offset: 0, binding: 1, ty: vk::DescriptorType::SAMPLED_IMAGE },
        TableBinding { offset: 1, binding: 2, ty: vk::DescriptorType::STORAGE_BUFFER },
    ]);
    assert_eq!(plan.parameters.len(), layout.parameters().len());
}

#[test]
fn test_samplers_are_immutable_bindings() {
    let plan = BindingPlan::build(&forward_layout()).unwrap();
    let sampler = plan.sets[&0].iter().find(|b| b.ty == vk::DescriptorType::SAMPLER).unwrap();
    assert_eq!(sampler.binding, 3);
    assert_eq!(sampler.stages, vk::ShaderStageFlags::FRAGMENT);
    let registry = SamplerRegistry::with_defaults();
    assert_eq!(sampler.sampler, registry.index_of("linear_wrap"));
}

// ============================================================================
// SETS
// ============================================================================

#[test]
fn test_bindless_space_is_never_planned() {
    let plan = BindingPlan::build(&forward_layout()).unwrap();
    assert!(!plan.sets.contains_key(&BINDLESS_REGISTER_SPACE));
    assert_eq!(plan.set_count(), BINDLESS_REGISTER_SPACE + 1);
}

#[test]
fn test_set_count_covers_highest_space() {
    let compute = ShaderReflection::new(ShaderStage::Compute)
        .with_resource(resource("params", ResourceKind::ConstantBuffer, 0, 3, 64))
        .with_resource(resource("output", ResourceKind::RwTexture, 0, 2, 0));
    let plan = BindingPlan::build(&layout(&[compute])).unwrap();
    assert_eq!(plan.set_count(), 4);
    assert_eq!(plan.sets[&2][0].ty, vk::DescriptorType::STORAGE_IMAGE);
    assert_eq!(plan.sets[&3][0].stages, vk::ShaderStageFlags::COMPUTE);
}

#[test]
fn test_empty_layout_still_has_bindless_set() {
    let plan = BindingPlan::build(&layout(&[ShaderReflection::new(ShaderStage::Compute)])).unwrap();
    assert!(plan.sets.is_empty());
    assert!(plan.parameters.is_empty());
    assert!(plan.push_range.is_none());
    assert_eq!(plan.set_count(), 2);
}

#[test]
fn test_binding_collision_is_rejected() {
    let pixel = ShaderReflection::new(ShaderStage::Pixel)
        .with_resource(resource("material", ResourceKind::ConstantBuffer, 0, 0, 64))
        .with_resource(resource("albedo", ResourceKind::Texture, 0, 0, 0));
    let result = BindingPlan::build(&layout(&[pixel]));
    assert!(matches!(result, Err(quasar_gpu::quasar::Error::InvalidBinding(_))));
}

#[test]
fn test_shared_binding_widens_stages() {
    let vertex = ShaderReflection::new(ShaderStage::Vertex)
        .with_resource(resource("camera", ResourceKind::ConstantBuffer, 0, 0, 64));
    let pixel = ShaderReflection::new(ShaderStage::Pixel)
        .with_resource(resource("camera", ResourceKind::ConstantBuffer, 0, 0, 64));
    let plan = BindingPlan::build(&layout(&[vertex, pixel])).unwrap();
    assert_eq!(plan.sets[&0].len(), 1);
    assert_eq!(plan.sets[&0][0].stages, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
}
