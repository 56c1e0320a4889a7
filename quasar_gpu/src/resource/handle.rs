/// Typed resource handles
///
/// A handle is a bare pool index tagged with the kind of resource it names.
/// It carries no ownership: the backend owns the record, the handle is valid
/// from `create_*` until the deferred destruction it requested has run.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Tag types, never instantiated
pub enum BufferTag {}
pub enum TextureTag {}
pub enum PipelineTag {}

pub struct Handle<T> {
    index: u32,
    _tag: PhantomData<fn() -> T>,
}

pub type BufferHandle = Handle<BufferTag>;
pub type TextureHandle = Handle<TextureTag>;
pub type PipelineHandle = Handle<PipelineTag>;

impl<T> Handle<T> {
    pub(crate) fn from_index(index: u32) -> Self {
        Self { index, _tag: PhantomData }
    }

    /// Pool index (meaningless across resource kinds)
    pub fn index(&self) -> u32 {
        self.index
    }
}

// Manual impls: derives would require the tag types to implement them

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        write!(f, "{}({})", kind.trim_end_matches("Tag"), self.index)
    }
}

// ===== RESOURCE HANDLE =====

/// Buffer or texture, the targets of barriers and uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceHandle {
    Buffer(BufferHandle),
    Texture(TextureHandle),
}

impl From<BufferHandle> for ResourceHandle {
    fn from(handle: BufferHandle) -> Self {
        ResourceHandle::Buffer(handle)
    }
}

impl From<TextureHandle> for ResourceHandle {
    fn from(handle: TextureHandle) -> Self {
        ResourceHandle::Texture(handle)
    }
}

// ===== ANY HANDLE =====

/// Any destroyable object, as queued for deferred destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    Buffer(BufferHandle),
    Texture(TextureHandle),
    Pipeline(PipelineHandle),
}

impl From<ResourceHandle> for AnyHandle {
    fn from(handle: ResourceHandle) -> Self {
        match handle {
            ResourceHandle::Buffer(h) => AnyHandle::Buffer(h),
            ResourceHandle::Texture(h) => AnyHandle::Texture(h),
        }
    }
}

impl From<PipelineHandle> for AnyHandle {
    fn from(handle: PipelineHandle) -> Self {
        AnyHandle::Pipeline(handle)
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
