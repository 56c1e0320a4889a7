/// Pipeline trait, fixed-function state and native pipeline descriptor

use std::any::Any;
use crate::graphics_device::{BufferFormat, TextureFormat};
use crate::shader::{BindingLayout, InputElement, ShaderStage, StaticSampler};

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 16-bit indices (max 65535 vertices)
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Vertex input rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Binding index
    pub binding: u32,
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex binding description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    /// Stride in bytes between consecutive elements
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Tightly packed, single-binding layout from a vertex shader's input signature
    pub fn from_input_elements(elements: &[InputElement]) -> Self {
        if elements.is_empty() {
            return Self::default();
        }

        let mut attributes = Vec::with_capacity(elements.len());
        let mut offset = 0;
        for element in elements {
            attributes.push(VertexAttribute {
                location: element.location,
                binding: 0,
                format: element.format,
                offset,
            });
            offset += element.format.size_bytes();
        }

        Self {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: offset,
                input_rate: VertexInputRate::Vertex,
            }],
            attributes,
        }
    }
}

// ===== RASTERIZATION =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Rasterization fixed-function state
#[derive(Debug, Clone, Copy)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
        }
    }
}

// ===== DEPTH =====

/// Comparison operator for depth tests and comparison samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enable: true,
            write_enable: true,
            compare_op: CompareOp::Less,
        }
    }
}

// ===== COLOR BLEND =====

/// Blend factor for color blending equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Color blending state, shared by every color target
#[derive(Debug, Clone, Copy)]
pub struct ColorBlendState {
    pub blend_enable: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl Default for ColorBlendState {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

impl ColorBlendState {
    /// Classic `src * a + dst * (1 - a)` blending
    pub fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}

// ===== GRAPHICS STATE =====

/// Fixed-function state and attachment formats of a graphics pipeline
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub color_blend: ColorBlendState,
    /// `None` derives the layout from the vertex shader's input signature
    pub vertex_layout: Option<VertexLayout>,
    pub color_formats: Vec<TextureFormat>,
    pub depth_format: Option<TextureFormat>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth: DepthState::default(),
            color_blend: ColorBlendState::default(),
            vertex_layout: None,
            color_formats: Vec::new(),
            depth_format: None,
        }
    }
}

// ===== NATIVE PIPELINE DESCRIPTOR =====

/// Compiled bytecode of one stage
#[derive(Debug, Clone, Copy)]
pub struct StageBytecode<'a> {
    pub stage: ShaderStage,
    pub entry_point: &'a str,
    pub bytecode: &'a [u8],
}

/// Everything a backend needs to build a native pipeline
pub struct NativePipelineDesc<'a> {
    pub name: &'a str,
    pub stages: Vec<StageBytecode<'a>>,
    pub layout: &'a BindingLayout,
    /// Global sampler table, `layout.samplers()` index into it
    pub static_samplers: &'a [StaticSampler],
    /// `None` for compute pipelines
    pub graphics: Option<GraphicsState>,
    /// Resolved vertex input layout (empty for compute)
    pub vertex_layout: VertexLayout,
}

/// Pipeline resource trait
///
/// Implemented by backend-specific pipeline types (e.g., VulkanPipeline).
/// The native pipeline is destroyed when dropped.
pub trait Pipeline: Send + Sync {
    fn is_compute(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
