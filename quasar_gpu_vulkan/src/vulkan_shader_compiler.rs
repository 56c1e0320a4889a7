/// SpirvShaderCompiler - loads precompiled SPIR-V and reflects it with spirq
///
/// Shader sources are `.spv` files produced offline (DXC with `-spirv`, or
/// glslang). A source path is resolved against the compiler's root directory.
/// Register spaces map to descriptor sets and registers to bindings, so the
/// reflection comes back in the same terms the binding layout builder uses.

use quasar_gpu::quasar::{Result, PUSH_CONSTANT_REGISTER};
use quasar_gpu::quasar::device::BufferFormat;
use quasar_gpu::quasar::shader::{
    CompiledShader, InputElement, ReflectedResource, ResourceKind, ShaderCompiler, ShaderReflection,
    ShaderSource, ShaderStage,
};
use quasar_gpu::{engine_bail_warn, engine_debug, engine_warn_err};
use std::path::{Path, PathBuf};

/// Shader compiler reading SPIR-V modules from disk
pub struct SpirvShaderCompiler {
    root: PathBuf,
}

impl SpirvShaderCompiler {
    /// Resolve shader paths relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ShaderCompiler for SpirvShaderCompiler {
    fn compile(&self, source: &ShaderSource) -> Result<CompiledShader> {
        let path = self.resolve(&source.path);
        // Read every time: reloads must see the file as it is now
        let bytecode = std::fs::read(&path).map_err(|e| {
            engine_warn_err!(ShaderCompilationFailed => "quasar::vulkan",
                "Cannot read shader '{}': {}", path.display(), e)
        })?;

        let words = spirv_words(&bytecode)?;
        let reflection = reflect_spirv(&words, &source.entry_point, source.stage)?;

        engine_debug!("quasar::vulkan", "Loaded {:?} shader '{}' ({} bytes, {} resources)",
            source.stage, source.path, bytecode.len(), reflection.resources.len());

        Ok(CompiledShader { bytecode, reflection })
    }
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Reinterpret a SPIR-V byte stream as words, checking size and magic
pub(crate) fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 || bytes.len() < 20 {
        engine_bail_warn!(ShaderCompilationFailed => "quasar::vulkan",
            "SPIR-V module has an invalid size ({} bytes)", bytes.len());
    }
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(bytes);
    if words[0] != SPIRV_MAGIC {
        engine_bail_warn!(ShaderCompilationFailed => "quasar::vulkan",
            "Not a SPIR-V module (magic {:#010x})", words[0]);
    }
    Ok(words)
}

/// Reflect the resources and vertex inputs of one entry point
pub(crate) fn reflect_spirv(words: &[u32], entry_point: &str, stage: ShaderStage) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(words)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_warn_err!(ShaderCompilationFailed => "quasar::vulkan",
            "SPIR-V reflection failed: {:?}", e))?;

    let entry = match entry_points.iter().find(|ep| ep.name == entry_point) {
        Some(entry) => entry,
        None => engine_bail_warn!(ShaderCompilationFailed => "quasar::vulkan",
            "Entry point '{}' not found in SPIR-V module", entry_point),
    };

    let mut reflection = ShaderReflection::new(stage);
    for var in entry.vars.iter() {
        match var {
            spirq::var::Variable::Descriptor { name, desc_bind, desc_ty, ty, nbind } => {
                let kind = resource_kind(desc_ty);
                let size = match kind {
                    ResourceKind::ConstantBuffer => ty.nbyte().unwrap_or(0) as u32,
                    _ => 0,
                };
                reflection.resources.push(ReflectedResource {
                    name: name.clone().unwrap_or_default(),
                    kind,
                    register: desc_bind.bind(),
                    space: desc_bind.set(),
                    count: *nbind,
                    size,
                });
            }
            spirq::var::Variable::PushConstant { name, ty } => {
                reflection.resources.push(ReflectedResource {
                    name: name.clone().unwrap_or_default(),
                    kind: ResourceKind::ConstantBuffer,
                    register: PUSH_CONSTANT_REGISTER,
                    space: 0,
                    count: 1,
                    size: ty.nbyte().unwrap_or(0) as u32,
                });
            }
            spirq::var::Variable::Input { name, location, ty } if stage == ShaderStage::Vertex => {
                let name = name.clone().unwrap_or_default();
                let format = match input_format(ty) {
                    Some(format) => format,
                    None => engine_bail_warn!(ShaderCompilationFailed => "quasar::vulkan",
                        "Vertex input '{}' has an unsupported type", name),
                };
                let (semantic, semantic_index) = split_semantic(&name);
                reflection.input_elements.push(InputElement {
                    semantic,
                    semantic_index,
                    location: location.loc(),
                    format,
                });
            }
            _ => {}
        }
    }
    reflection.resources.sort_by_key(|r| (r.space, r.register));
    reflection.input_elements.sort_by_key(|e| e.location);
    Ok(reflection)
}

pub(crate) fn resource_kind(desc_ty: &spirq::ty::DescriptorType) -> ResourceKind {
    use spirq::ty::{AccessType, DescriptorType};
    match desc_ty {
        DescriptorType::UniformBuffer() => ResourceKind::ConstantBuffer,
        DescriptorType::StorageBuffer(AccessType::ReadOnly) => ResourceKind::StructuredBuffer,
        DescriptorType::StorageBuffer(_) => ResourceKind::RwStructuredBuffer,
        DescriptorType::SampledImage() => ResourceKind::Texture,
        DescriptorType::StorageImage(_) => ResourceKind::RwTexture,
        DescriptorType::Sampler() => ResourceKind::Sampler,
        other => ResourceKind::Unknown(format!("{:?}", other)),
    }
}

pub(crate) fn input_format(ty: &spirq::ty::Type) -> Option<BufferFormat> {
    use spirq::ty::{ScalarType, Type};
    let (scalar, count) = match ty {
        Type::Scalar(scalar) => (scalar, 1),
        Type::Vector(vector) => (&vector.scalar_ty, vector.nscalar),
        _ => return None,
    };
    let format = match (scalar, count) {
        (ScalarType::Float { bits: 32 }, 1) => BufferFormat::R32_SFLOAT,
        (ScalarType::Float { bits: 32 }, 2) => BufferFormat::R32G32_SFLOAT,
        (ScalarType::Float { bits: 32 }, 3) => BufferFormat::R32G32B32_SFLOAT,
        (ScalarType::Float { bits: 32 }, 4) => BufferFormat::R32G32B32A32_SFLOAT,
        (ScalarType::Integer { bits: 32, is_signed: true }, 1) => BufferFormat::R32_SINT,
        (ScalarType::Integer { bits: 32, is_signed: true }, 2) => BufferFormat::R32G32_SINT,
        (ScalarType::Integer { bits: 32, is_signed: true }, 3) => BufferFormat::R32G32B32_SINT,
        (ScalarType::Integer { bits: 32, is_signed: true }, 4) => BufferFormat::R32G32B32A32_SINT,
        (ScalarType::Integer { bits: 32, is_signed: false }, 1) => BufferFormat::R32_UINT,
        (ScalarType::Integer { bits: 32, is_signed: false }, 2) => BufferFormat::R32G32_UINT,
        (ScalarType::Integer { bits: 32, is_signed: false }, 3) => BufferFormat::R32G32B32_UINT,
        (ScalarType::Integer { bits: 32, is_signed: false }, 4) => BufferFormat::R32G32B32A32_UINT,
        _ => return None,
    };
    Some(format)
}

/// `in.var.TEXCOORD1` -> (`TEXCOORD`, 1)
pub(crate) fn split_semantic(name: &str) -> (String, u32) {
    let name = name.strip_prefix("in.var.").unwrap_or(name);
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (semantic, index) = name.split_at(name.len() - digits);
    (semantic.to_string(), index.parse().unwrap_or(0))
}

#[cfg(test)]
#[path = "vulkan_shader_compiler_tests.rs"]
mod tests;
