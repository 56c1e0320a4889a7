/// CommandList trait - for recording native GPU commands

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, CpuDescriptorHandle, DescriptorHeap, GpuDescriptorHandle, IndexType,
    Pipeline, ResourceRef, ResourceState, Texture,
};

/// Native barrier, as submitted by the barrier batch
#[derive(Clone, Copy)]
pub enum NativeBarrier<'a> {
    /// State transition of a whole resource
    Transition {
        resource: ResourceRef<'a>,
        before: ResourceState,
        after: ResourceState,
    },
    /// Ordering between two unordered-access passes on the same resource
    UnorderedAccess { resource: ResourceRef<'a> },
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

/// Color attachment of a native render pass
pub struct ColorAttachment<'a> {
    pub texture: &'a dyn Texture,
    /// Render-target view
    pub view: CpuDescriptorHandle,
    /// `None` loads the previous contents
    pub clear: Option<ClearValue>,
}

/// Depth attachment of a native render pass
pub struct DepthAttachment<'a> {
    pub texture: &'a dyn Texture,
    /// Depth-stencil view
    pub view: CpuDescriptorHandle,
    pub clear: Option<ClearValue>,
}

/// Native render pass begin parameters
pub struct RenderPassBegin<'a> {
    pub color_attachments: Vec<ColorAttachment<'a>>,
    pub depth_attachment: Option<DepthAttachment<'a>>,
    pub render_area: Rect2D,
}

/// Placement of one texture subresource inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyFootprint {
    /// Byte offset of the first row in the source buffer
    pub offset: u64,
    /// Aligned distance between two rows in bytes
    pub row_pitch: u64,
    pub width: u32,
    pub height: u32,
    pub array_layer: u32,
    pub mip_level: u32,
}

/// Command list for recording native commands
///
/// Commands are recorded between `begin` and `end`, then submitted with
/// [`CommandQueue::submit`](crate::graphics_device::CommandQueue::submit).
/// Recording is not thread-safe.
pub trait CommandList: Send + Sync {
    /// Reset the list and start recording (the previous submission must have completed)
    fn begin(&mut self) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    /// Submit a batch of barriers in one call
    fn resource_barriers(&mut self, barriers: &[NativeBarrier<'_>]) -> Result<()>;

    /// Bind the shader-visible heap used by descriptor tables and bindless access
    fn set_descriptor_heap(&mut self, heap: &dyn DescriptorHeap) -> Result<()>;

    fn set_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    fn begin_render_pass(&mut self, begin: &RenderPassBegin<'_>) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a constant buffer range directly to a layout parameter
    ///
    /// # Arguments
    ///
    /// * `parameter` - Parameter index in the bound pipeline's layout
    /// * `buffer` - Buffer holding the constants
    /// * `offset` - Byte offset of the constants (256-byte aligned)
    /// * `size` - Size in bytes
    fn set_constant_buffer(&mut self, parameter: u32, buffer: &dyn Buffer, offset: u64, size: u64) -> Result<()>;

    /// Point the pipeline's descriptor table at a block of the bound heap
    fn set_descriptor_table(&mut self, parameter: u32, base: GpuDescriptorHandle) -> Result<()>;

    /// Upload push constants for the parameter
    fn set_push_constants(&mut self, parameter: u32, data: &[u8]) -> Result<()>;

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, offset: u64, stride: u32) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()>;

    fn copy_buffer_region(
        &mut self,
        dst: &dyn Buffer,
        dst_offset: u64,
        src: &dyn Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()>;

    fn copy_buffer_to_texture(
        &mut self,
        dst: &dyn Texture,
        src: &dyn Buffer,
        footprint: &TextureCopyFootprint,
    ) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with a [0, 1] depth range
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}
