/// Backend-side records of buffers, textures and pipelines

use crate::descriptor::Descriptor;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, GraphicsState, Pipeline, ResourceState, Texture,
};
use crate::shader::{BindingLayout, CompiledShader, ShaderSource};

// ===== BUFFER =====

/// Views of one buffer
///
/// Each list holds one descriptor per region: a single entry for ordinary
/// buffers, one per frame in flight for dynamic buffers.
#[derive(Debug, Clone, Default)]
pub struct BufferViews {
    pub constant: Vec<Descriptor>,
    pub shader_resource: Vec<Descriptor>,
    pub unordered_access: Vec<Descriptor>,
}

pub struct BufferRecord {
    pub native: Box<dyn Buffer>,
    /// Descriptor as requested (size of one region)
    pub desc: BufferDesc,
    /// Distance between two regions, 0 for single-region buffers
    pub region_stride: u64,
    pub regions: u32,
    pub state: ResourceState,
    pub ready: bool,
    pub views: BufferViews,
    pub bindless: Option<u32>,
    /// Destruction already requested
    pub retiring: bool,
}

impl BufferRecord {
    /// Region used by the frame in `slot`
    pub fn region(&self, slot: usize) -> u32 {
        slot as u32 % self.regions
    }

    /// Byte offset of the region used by the frame in `slot`
    pub fn region_offset(&self, slot: usize) -> u64 {
        self.region(slot) as u64 * self.region_stride
    }

    pub fn is_dynamic(&self) -> bool {
        self.desc.usage == BufferUsage::Dynamic
    }
}

/// Descriptor of `views` matching the frame in `slot`
pub fn view_for_slot(views: &[Descriptor], slot: usize) -> Option<Descriptor> {
    if views.is_empty() {
        None
    } else {
        Some(views[slot % views.len()])
    }
}

// ===== TEXTURE =====

#[derive(Debug, Clone, Copy, Default)]
pub struct TextureViews {
    pub shader_resource: Option<Descriptor>,
    pub unordered_access: Option<Descriptor>,
    pub render_target: Option<Descriptor>,
    pub depth_stencil: Option<Descriptor>,
}

pub struct TextureRecord {
    pub native: Box<dyn Texture>,
    pub name: String,
    pub state: ResourceState,
    pub ready: bool,
    pub views: TextureViews,
    pub bindless: Option<u32>,
    /// Back buffers belong to the swapchain and cannot be destroyed by callers
    pub swapchain_image: bool,
    pub retiring: bool,
}

// ===== PIPELINE =====

pub struct PipelineRecord {
    pub name: String,
    pub native: Box<dyn Pipeline>,
    pub sources: Vec<ShaderSource>,
    /// Bytecode the native pipeline was built from, kept authoritative
    /// until a reload succeeds
    pub compiled: Vec<CompiledShader>,
    pub layout: BindingLayout,
    /// `None` for compute pipelines
    pub graphics: Option<GraphicsState>,
    pub retiring: bool,
}

impl PipelineRecord {
    pub fn is_compute(&self) -> bool {
        self.graphics.is_none()
    }
}
