/// Resource views and native resource references

use crate::graphics_device::{Buffer, Texture};

/// Borrowed native resource, used for views, barriers and copies
#[derive(Clone, Copy)]
pub enum ResourceRef<'a> {
    Buffer(&'a dyn Buffer),
    Texture(&'a dyn Texture),
}

/// Interpretation of a resource written into a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

/// View parameters
///
/// `offset`, `size` and `stride` only apply to buffer views. A `stride` of
/// zero describes a raw (byte-address) buffer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDesc {
    pub kind: ViewKind,
    pub offset: u64,
    pub size: u64,
    pub stride: u32,
}

impl ViewDesc {
    /// View over a buffer range
    pub fn buffer(kind: ViewKind, offset: u64, size: u64, stride: u32) -> Self {
        Self { kind, offset, size, stride }
    }

    /// View over a whole texture
    pub fn texture(kind: ViewKind) -> Self {
        Self { kind, offset: 0, size: 0, stride: 0 }
    }
}
