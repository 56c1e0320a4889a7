//! Unit tests for the Vulkan conversion functions
//!
//! Pure mappings only, no GPU required.

use super::*;

// ============================================================================
// FORMATS
// ============================================================================

#[test]
fn test_texture_format_round_trips_for_surface_formats() {
    for format in [
        TextureFormat::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM,
    ] {
        assert_eq!(vk_to_texture_format(texture_format_to_vk(format)), Some(format));
    }
}

#[test]
fn test_depth_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::D32_FLOAT), vk::Format::D32_SFLOAT);
    assert_eq!(texture_format_to_vk(TextureFormat::D24_UNORM_S8_UINT), vk::Format::D24_UNORM_S8_UINT);
    assert_eq!(vk_to_texture_format(vk::Format::D32_SFLOAT), None);
}

#[test]
fn test_buffer_formats() {
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32B32_SFLOAT), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32_SINT), vk::Format::R32G32_SINT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R32G32B32A32_UINT), vk::Format::R32G32B32A32_UINT);
    assert_eq!(buffer_format_to_vk(BufferFormat::R8G8B8A8_UNORM), vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_aspect_masks() {
    assert_eq!(aspect_mask(TextureFormat::R8G8B8A8_UNORM, false), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(TextureFormat::D32_FLOAT, false), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(TextureFormat::D24_UNORM_S8_UINT, false),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    // Sampling a depth-stencil texture reads depth only
    assert_eq!(aspect_mask(TextureFormat::D24_UNORM_S8_UINT, true), vk::ImageAspectFlags::DEPTH);
}

// ============================================================================
// USAGE
// ============================================================================

#[test]
fn test_buffer_usage_flags() {
    let usage = buffer_usage_to_vk(BufferFlags::VERTEX | BufferFlags::SHADER_RESOURCE);
    assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_DST));
    assert!(!usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));

    let constant = buffer_usage_to_vk(BufferFlags::CONSTANT);
    assert!(constant.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));
}

#[test]
fn test_memory_locations() {
    assert_eq!(memory_location(BufferUsage::Static), gpu_allocator::MemoryLocation::GpuOnly);
    assert_eq!(memory_location(BufferUsage::Dynamic), gpu_allocator::MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(BufferUsage::Upload), gpu_allocator::MemoryLocation::CpuToGpu);
    assert_eq!(memory_location(BufferUsage::Readback), gpu_allocator::MemoryLocation::GpuToCpu);
}

#[test]
fn test_texture_usage_flags() {
    let flags = texture_usage_to_vk(TextureUsage::SAMPLED | TextureUsage::RENDER_TARGET);
    assert!(flags.contains(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::COLOR_ATTACHMENT));
    assert!(!flags.contains(vk::ImageUsageFlags::STORAGE));

    let depth = texture_usage_to_vk(TextureUsage::DEPTH_STENCIL);
    assert!(depth.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT));
}

// ============================================================================
// RESOURCE STATES
// ============================================================================

#[test]
fn test_single_state_layouts() {
    assert_eq!(state_to_layout(ResourceState::RENDER_TARGET, false), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(state_to_layout(ResourceState::DEPTH_WRITE, false), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    assert_eq!(state_to_layout(ResourceState::COPY_DEST, false), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(state_to_layout(ResourceState::COPY_SOURCE, false), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(state_to_layout(ResourceState::PRESENT, true), vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(state_to_layout(ResourceState::UNORDERED_ACCESS, false), vk::ImageLayout::GENERAL);
}

#[test]
fn test_shader_resource_layouts() {
    assert_eq!(
        state_to_layout(ResourceState::PIXEL_SHADER_RESOURCE, false),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
    assert_eq!(
        state_to_layout(ResourceState::ALL_SHADER_RESOURCE, false),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    );
    assert_eq!(
        state_to_layout(ResourceState::DEPTH_READ | ResourceState::PIXEL_SHADER_RESOURCE, false),
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    );
    // Mixed read states fall back to GENERAL
    assert_eq!(
        state_to_layout(ResourceState::PIXEL_SHADER_RESOURCE | ResourceState::COPY_SOURCE, false),
        vk::ImageLayout::GENERAL
    );
}

#[test]
fn test_common_discards_as_source() {
    assert_eq!(state_to_layout(ResourceState::COMMON, true), vk::ImageLayout::UNDEFINED);
    assert_eq!(state_to_layout(ResourceState::COMMON, false), vk::ImageLayout::GENERAL);
}

#[test]
fn test_state_sync_scopes() {
    let (stages, access) = state_to_sync(ResourceState::COPY_DEST);
    assert_eq!(stages, vk::PipelineStageFlags2::ALL_TRANSFER);
    assert_eq!(access, vk::AccessFlags2::TRANSFER_WRITE);

    let (stages, access) = state_to_sync(ResourceState::PIXEL_SHADER_RESOURCE);
    assert_eq!(stages, vk::PipelineStageFlags2::FRAGMENT_SHADER);
    assert!(access.contains(vk::AccessFlags2::SHADER_SAMPLED_READ));

    let (stages, access) = state_to_sync(ResourceState::DEPTH_READ);
    assert!(stages.contains(vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS));
    assert!(!access.contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE));

    assert_eq!(state_to_sync(ResourceState::PRESENT), (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE));
    assert_eq!(state_to_sync(ResourceState::COMMON), (vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE));
}

#[test]
fn test_generic_read_covers_every_read_scope() {
    let (_, access) = state_to_sync(ResourceState::GENERIC_READ);
    assert!(access.contains(vk::AccessFlags2::INDEX_READ));
    assert!(access.contains(vk::AccessFlags2::UNIFORM_READ));
    assert!(access.contains(vk::AccessFlags2::TRANSFER_READ));
    assert!(access.contains(vk::AccessFlags2::INDIRECT_COMMAND_READ));
    assert!(!access.contains(vk::AccessFlags2::TRANSFER_WRITE));
}

// ============================================================================
// DESCRIPTORS AND PIPELINE STATE
// ============================================================================

#[test]
fn test_resource_kind_descriptor_types() {
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::ConstantBuffer), Some(vk::DescriptorType::UNIFORM_BUFFER));
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::Texture), Some(vk::DescriptorType::SAMPLED_IMAGE));
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::RwTexture), Some(vk::DescriptorType::STORAGE_IMAGE));
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::ByteAddressBuffer), Some(vk::DescriptorType::STORAGE_BUFFER));
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::Sampler), Some(vk::DescriptorType::SAMPLER));
    assert_eq!(resource_kind_to_descriptor(&ResourceKind::Unknown("accel".to_string())), None);
}

#[test]
fn test_stage_flags() {
    assert_eq!(stage_to_vk(ShaderStage::Pixel), vk::ShaderStageFlags::FRAGMENT);
    assert_eq!(
        stage_flags_to_vk(ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(stage_flags_to_vk(ShaderStageFlags::empty()), vk::ShaderStageFlags::empty());
}

#[test]
fn test_sampler_modes() {
    assert_eq!(filter_to_vk(Filter::Point), (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST));
    assert_eq!(filter_to_vk(Filter::Anisotropic).0, vk::Filter::LINEAR);
    assert_eq!(address_mode_to_vk(AddressMode::Mirror), vk::SamplerAddressMode::MIRRORED_REPEAT);
    assert_eq!(address_mode_to_vk(AddressMode::Border), vk::SamplerAddressMode::CLAMP_TO_BORDER);
}

#[test]
fn test_pipeline_state_mappings() {
    assert_eq!(topology_to_vk(PrimitiveTopology::LineList), vk::PrimitiveTopology::LINE_LIST);
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
    assert_eq!(front_face_to_vk(FrontFace::Clockwise), vk::FrontFace::CLOCKWISE);
    assert_eq!(compare_op_to_vk(CompareOp::GreaterOrEqual), vk::CompareOp::GREATER_OR_EQUAL);
    assert_eq!(blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_op_to_vk(BlendOp::ReverseSubtract), vk::BlendOp::REVERSE_SUBTRACT);
    assert_eq!(index_type_to_vk(IndexType::U16), vk::IndexType::UINT16);
}
