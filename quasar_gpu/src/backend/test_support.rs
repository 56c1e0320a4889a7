/// Shared fixtures for the backend tests: a mock-device context plus a
/// small set of canned shaders

use std::time::Duration;

use crate::config::{Config, ShaderLoadRetry, PUSH_CONSTANT_REGISTER};
use crate::graphics_device::mock_graphics_device::{
    MockBuffer, MockGraphicsDevice, MockShaderCompiler, MockSwapchain, SharedMockState,
};
use crate::graphics_device::{
    BufferDesc, BufferFlags, BufferFormat, BufferUsage, GraphicsState, TextureDesc, TextureFormat,
    TextureUsage,
};
use crate::resource::BufferHandle;
use crate::shader::{InputElement, ReflectedResource, ResourceKind, ShaderReflection, ShaderSource, ShaderStage};

use super::{Backend, PipelineDesc};

pub const MESH_VS: &str = "shaders/mesh.vert.hlsl";
pub const MESH_PS: &str = "shaders/mesh.frag.hlsl";
pub const BLUR_CS: &str = "shaders/blur.comp.hlsl";

pub struct TestContext {
    pub backend: Backend,
    pub state: SharedMockState,
    pub compiler: MockShaderCompiler,
}

/// Small capacities so exhaustion is cheap to reach
pub fn test_config() -> Config {
    Config::default()
        .with_pool_capacities(32, 32, 8)
        .with_descriptor_capacities(8, 32)
        .with_staging_capacity(64)
        .with_barrier_batch(4)
        .with_upload_heap_size(4096)
        .with_frame_allocator_size(4096)
        .with_shader_load_retry(ShaderLoadRetry {
            max_attempts: Some(3),
            interval: Duration::ZERO,
        })
}

pub fn headless() -> TestContext {
    headless_with(test_config())
}

pub fn headless_with(config: Config) -> TestContext {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    let compiler = canned_compiler();
    let backend = Backend::new(Box::new(device), Box::new(compiler.clone()), None, config).unwrap();
    TestContext { backend, state, compiler }
}

pub fn windowed(width: u32, height: u32) -> TestContext {
    let device = MockGraphicsDevice::new();
    let state = device.state();
    let swapchain = MockSwapchain::new(&device, width, height);
    let compiler = canned_compiler();
    let backend = Backend::new(
        Box::new(device),
        Box::new(compiler.clone()),
        Some(Box::new(swapchain)),
        test_config(),
    )
    .unwrap();
    TestContext { backend, state, compiler }
}

fn resource(name: &str, kind: ResourceKind, register: u32, size: u32) -> ReflectedResource {
    ReflectedResource {
        name: name.to_string(),
        kind,
        register,
        space: 0,
        count: 1,
        size,
    }
}

pub fn mesh_vertex_reflection() -> ShaderReflection {
    let mut reflection = ShaderReflection::new(ShaderStage::Vertex)
        .with_resource(resource("Globals", ResourceKind::ConstantBuffer, 0, 64))
        .with_resource(resource("DrawData", ResourceKind::ConstantBuffer, PUSH_CONSTANT_REGISTER, 16));
    reflection.input_elements = vec![
        InputElement { semantic: "POSITION".to_string(), semantic_index: 0, location: 0, format: BufferFormat::R32G32B32_SFLOAT },
        InputElement { semantic: "TEXCOORD".to_string(), semantic_index: 0, location: 1, format: BufferFormat::R32G32_SFLOAT },
    ];
    reflection
}

pub fn mesh_pixel_reflection() -> ShaderReflection {
    ShaderReflection::new(ShaderStage::Pixel)
        .with_resource(resource("Globals", ResourceKind::ConstantBuffer, 0, 64))
        .with_resource(resource("albedo", ResourceKind::Texture, 0, 0))
        .with_resource(resource("linear_wrap", ResourceKind::Sampler, 0, 0))
}

pub fn blur_reflection() -> ShaderReflection {
    ShaderReflection::new(ShaderStage::Compute)
        .with_resource(resource("Params", ResourceKind::ConstantBuffer, 0, 16))
        .with_resource(resource("input", ResourceKind::Texture, 0, 0))
        .with_resource(resource("output", ResourceKind::RwTexture, 0, 0))
}

fn canned_compiler() -> MockShaderCompiler {
    let compiler = MockShaderCompiler::new();
    compiler.set_shader(MESH_VS, mesh_vertex_reflection());
    compiler.set_shader(MESH_PS, mesh_pixel_reflection());
    compiler.set_shader(BLUR_CS, blur_reflection());
    compiler
}

pub fn mesh_pipeline() -> PipelineDesc {
    PipelineDesc::graphics(
        "mesh",
        vec![
            ShaderSource::new(MESH_VS, "main", ShaderStage::Vertex),
            ShaderSource::new(MESH_PS, "main", ShaderStage::Pixel),
        ],
        GraphicsState {
            color_formats: vec![TextureFormat::R8G8B8A8_UNORM],
            ..GraphicsState::default()
        },
    )
}

pub fn blur_pipeline() -> PipelineDesc {
    PipelineDesc::compute("blur", ShaderSource::new(BLUR_CS, "main", ShaderStage::Compute))
}

pub fn sampled_texture(name: &str) -> TextureDesc {
    TextureDesc::new_2d(name, 4, 4, TextureFormat::R8G8B8A8_UNORM, TextureUsage::SAMPLED)
}

pub fn render_target(name: &str) -> TextureDesc {
    TextureDesc::new_2d(name, 64, 32, TextureFormat::R8G8B8A8_UNORM, TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED)
}

pub fn constant_buffer(name: &str, usage: BufferUsage) -> BufferDesc {
    BufferDesc::new(name, 64, usage, BufferFlags::CONSTANT)
}

/// Bytes the mock GPU sees in a buffer
pub fn gpu_contents(backend: &Backend, handle: BufferHandle) -> Vec<u8> {
    backend
        .buffers
        .get(handle)
        .unwrap()
        .native
        .as_any()
        .downcast_ref::<MockBuffer>()
        .unwrap()
        .contents()
}
