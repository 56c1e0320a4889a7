/// Shader compiler contract and reflection data

use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::{BufferFormat, ViewKind};

/// Pipeline stage a shader runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

bitflags! {
    /// Set of stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

impl ShaderStage {
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Pixel => ShaderStageFlags::PIXEL,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

/// Identifies a shader to compile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSource {
    /// Source file path or any identifier the compiler understands
    pub path: String,
    pub entry_point: String,
    pub stage: ShaderStage,
}

impl ShaderSource {
    pub fn new(path: &str, entry_point: &str, stage: ShaderStage) -> Self {
        Self {
            path: path.to_string(),
            entry_point: entry_point.to_string(),
            stage,
        }
    }
}

/// Resource type as reported by reflection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ConstantBuffer,
    Texture,
    StructuredBuffer,
    ByteAddressBuffer,
    RwTexture,
    RwStructuredBuffer,
    RwByteAddressBuffer,
    Sampler,
    /// Anything the compiler reported that the core has no binding for
    Unknown(String),
}

impl ResourceKind {
    /// View written into the descriptor table for this kind
    pub fn table_view(&self) -> Option<ViewKind> {
        match self {
            ResourceKind::Texture | ResourceKind::StructuredBuffer | ResourceKind::ByteAddressBuffer => {
                Some(ViewKind::ShaderResource)
            }
            ResourceKind::RwTexture | ResourceKind::RwStructuredBuffer | ResourceKind::RwByteAddressBuffer => {
                Some(ViewKind::UnorderedAccess)
            }
            _ => None,
        }
    }

    pub fn is_texture(&self) -> bool {
        matches!(self, ResourceKind::Texture | ResourceKind::RwTexture)
    }
}

/// One bound resource of a compiled shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedResource {
    pub name: String,
    pub kind: ResourceKind,
    /// Register (binding) number
    pub register: u32,
    /// Register space (descriptor set)
    pub space: u32,
    /// Array size, 0 for unbounded arrays
    pub count: u32,
    /// Byte size for constant buffers, 0 otherwise
    pub size: u32,
}

/// One element of a vertex shader's input signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub location: u32,
    pub format: BufferFormat,
}

/// Reflection data of one compiled stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderReflection {
    pub stage: ShaderStage,
    pub resources: Vec<ReflectedResource>,
    /// Empty for non-vertex stages
    pub input_elements: Vec<InputElement>,
}

impl ShaderReflection {
    /// Reflection with no bound resources
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            stage,
            resources: Vec::new(),
            input_elements: Vec::new(),
        }
    }

    pub fn with_resource(mut self, resource: ReflectedResource) -> Self {
        self.resources.push(resource);
        self
    }
}

/// Bytecode plus reflection of one stage
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub bytecode: Vec<u8>,
    pub reflection: ShaderReflection,
}

/// External shader compiler/reflector
///
/// Called once per stage when a pipeline is created and again on every
/// reload. A compile error is reported as `Error::ShaderCompilationFailed`.
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader>;
}
