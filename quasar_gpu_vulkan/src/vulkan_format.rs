/// Conversions between core types and Vulkan enums
///
/// Everything in here is a pure function so it can be tested without a device.

use ash::vk;
use quasar_gpu::quasar::device::{
    BlendFactor, BlendOp, BufferFlags, BufferFormat, BufferUsage, CompareOp, CullMode, FrontFace,
    IndexType, PolygonMode, PrimitiveTopology, ResourceState, TextureFormat, TextureUsage,
    VertexInputRate, ViewKind,
};
use quasar_gpu::quasar::shader::{AddressMode, Filter, ResourceKind, ShaderStage, ShaderStageFlags};

// ===== FORMATS =====

pub(crate) fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32_UINT => vk::Format::R32_UINT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
    }
}

/// Surface formats the swapchain can expose, `None` for anything else
pub(crate) fn vk_to_texture_format(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::R8G8B8A8_SRGB => Some(TextureFormat::R8G8B8A8_SRGB),
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::R8G8B8A8_UNORM),
        vk::Format::B8G8R8A8_SRGB => Some(TextureFormat::B8G8R8A8_SRGB),
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::B8G8R8A8_UNORM),
        vk::Format::R16G16B16A16_SFLOAT => Some(TextureFormat::R16G16B16A16_SFLOAT),
        _ => None,
    }
}

/// Convert BufferFormat (vertex attributes) to Vulkan format
pub(crate) fn buffer_format_to_vk(format: BufferFormat) -> vk::Format {
    match format {
        BufferFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        BufferFormat::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        BufferFormat::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        BufferFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        BufferFormat::R32_SINT => vk::Format::R32_SINT,
        BufferFormat::R32G32_SINT => vk::Format::R32G32_SINT,
        BufferFormat::R32G32B32_SINT => vk::Format::R32G32B32_SINT,
        BufferFormat::R32G32B32A32_SINT => vk::Format::R32G32B32A32_SINT,
        BufferFormat::R32_UINT => vk::Format::R32_UINT,
        BufferFormat::R32G32_UINT => vk::Format::R32G32_UINT,
        BufferFormat::R32G32B32_UINT => vk::Format::R32G32B32_UINT,
        BufferFormat::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,
        BufferFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

/// Aspect of a whole texture, `for_sampling` drops stencil from depth formats
pub(crate) fn aspect_mask(format: TextureFormat, for_sampling: bool) -> vk::ImageAspectFlags {
    if !format.is_depth() {
        vk::ImageAspectFlags::COLOR
    } else if format.has_stencil() && !for_sampling {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    }
}

// ===== USAGE =====

pub(crate) fn buffer_usage_to_vk(flags: BufferFlags) -> vk::BufferUsageFlags {
    let mut usage = vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
        | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    if flags.contains(BufferFlags::VERTEX) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if flags.contains(BufferFlags::INDEX) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if flags.contains(BufferFlags::CONSTANT) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if flags.intersects(BufferFlags::SHADER_RESOURCE | BufferFlags::UNORDERED_ACCESS) {
        usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if flags.contains(BufferFlags::INDIRECT) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    usage
}

pub(crate) fn memory_location(usage: BufferUsage) -> gpu_allocator::MemoryLocation {
    match usage {
        BufferUsage::Static => gpu_allocator::MemoryLocation::GpuOnly,
        BufferUsage::Dynamic | BufferUsage::Upload => gpu_allocator::MemoryLocation::CpuToGpu,
        BufferUsage::Readback => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub(crate) fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

// ===== RESOURCE STATES =====

/// Pipeline stages and accesses covered by a resource state
pub(crate) fn state_to_sync(state: ResourceState) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    let all_shaders = vk::PipelineStageFlags2::VERTEX_SHADER
        | vk::PipelineStageFlags2::FRAGMENT_SHADER
        | vk::PipelineStageFlags2::COMPUTE_SHADER;

    let mut stages = vk::PipelineStageFlags2::NONE;
    let mut access = vk::AccessFlags2::NONE;

    if state.contains(ResourceState::VERTEX_AND_CONSTANT_BUFFER) {
        stages |= vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT | all_shaders;
        access |= vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::UNIFORM_READ;
    }
    if state.contains(ResourceState::INDEX_BUFFER) {
        stages |= vk::PipelineStageFlags2::INDEX_INPUT;
        access |= vk::AccessFlags2::INDEX_READ;
    }
    if state.contains(ResourceState::RENDER_TARGET) {
        stages |= vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT;
        access |= vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        stages |= all_shaders;
        access |= vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE;
    }
    if state.intersects(ResourceState::DEPTH_WRITE | ResourceState::DEPTH_READ) {
        stages |= vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
        access |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
        if state.contains(ResourceState::DEPTH_WRITE) {
            access |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }
    }
    if state.contains(ResourceState::NON_PIXEL_SHADER_RESOURCE) {
        stages |= vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER;
        access |= vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ;
    }
    if state.contains(ResourceState::PIXEL_SHADER_RESOURCE) {
        stages |= vk::PipelineStageFlags2::FRAGMENT_SHADER;
        access |= vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ;
    }
    if state.contains(ResourceState::INDIRECT_ARGUMENT) {
        stages |= vk::PipelineStageFlags2::DRAW_INDIRECT;
        access |= vk::AccessFlags2::INDIRECT_COMMAND_READ;
    }
    if state.contains(ResourceState::COPY_DEST) {
        stages |= vk::PipelineStageFlags2::ALL_TRANSFER;
        access |= vk::AccessFlags2::TRANSFER_WRITE;
    }
    if state.contains(ResourceState::COPY_SOURCE) {
        stages |= vk::PipelineStageFlags2::ALL_TRANSFER;
        access |= vk::AccessFlags2::TRANSFER_READ;
    }
    // PRESENT and COMMON synchronize through semaphores and fences
    (stages, access)
}

/// Image layout for a texture in `state`
///
/// `COMMON` as a source state means the texture has never been used, its
/// contents are discarded.
pub(crate) fn state_to_layout(state: ResourceState, is_source: bool) -> vk::ImageLayout {
    if state == ResourceState::COMMON {
        return if is_source { vk::ImageLayout::UNDEFINED } else { vk::ImageLayout::GENERAL };
    }
    if state == ResourceState::PRESENT {
        return vk::ImageLayout::PRESENT_SRC_KHR;
    }
    if state == ResourceState::RENDER_TARGET {
        return vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
    }
    if state == ResourceState::DEPTH_WRITE {
        return vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
    }
    if state == ResourceState::COPY_DEST {
        return vk::ImageLayout::TRANSFER_DST_OPTIMAL;
    }
    if state == ResourceState::COPY_SOURCE {
        return vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        return vk::ImageLayout::GENERAL;
    }
    if state.contains(ResourceState::DEPTH_READ)
        && ResourceState::DEPTH_READ.union(ResourceState::ALL_SHADER_RESOURCE).contains(state)
    {
        return vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL;
    }
    if ResourceState::ALL_SHADER_RESOURCE.contains(state) {
        return vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
    }
    vk::ImageLayout::GENERAL
}

// ===== DESCRIPTORS =====

/// Descriptor type of a reflected resource inside a pipeline set
pub(crate) fn resource_kind_to_descriptor(kind: &ResourceKind) -> Option<vk::DescriptorType> {
    match kind {
        ResourceKind::ConstantBuffer => Some(vk::DescriptorType::UNIFORM_BUFFER),
        ResourceKind::Texture => Some(vk::DescriptorType::SAMPLED_IMAGE),
        ResourceKind::RwTexture => Some(vk::DescriptorType::STORAGE_IMAGE),
        ResourceKind::StructuredBuffer
        | ResourceKind::ByteAddressBuffer
        | ResourceKind::RwStructuredBuffer
        | ResourceKind::RwByteAddressBuffer => Some(vk::DescriptorType::STORAGE_BUFFER),
        ResourceKind::Sampler => Some(vk::DescriptorType::SAMPLER),
        ResourceKind::Unknown(_) => None,
    }
}

/// Layout images are expected in when read through a view
pub(crate) fn view_image_layout(kind: ViewKind) -> vk::ImageLayout {
    match kind {
        ViewKind::UnorderedAccess => vk::ImageLayout::GENERAL,
        ViewKind::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ViewKind::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ViewKind::ShaderResource | ViewKind::ConstantBuffer => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

pub(crate) fn stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub(crate) fn stage_flags_to_vk(flags: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut vk_flags = vk::ShaderStageFlags::empty();
    if flags.contains(ShaderStageFlags::VERTEX) { vk_flags |= vk::ShaderStageFlags::VERTEX; }
    if flags.contains(ShaderStageFlags::PIXEL) { vk_flags |= vk::ShaderStageFlags::FRAGMENT; }
    if flags.contains(ShaderStageFlags::COMPUTE) { vk_flags |= vk::ShaderStageFlags::COMPUTE; }
    vk_flags
}

// ===== SAMPLERS =====

pub(crate) fn filter_to_vk(filter: Filter) -> (vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        Filter::Point => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::Linear | Filter::Anisotropic => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    }
}

pub(crate) fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

// ===== PIPELINE STATE =====

pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub(crate) fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
    }
}

pub(crate) fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

pub(crate) fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
