/// Buffer trait and buffer descriptor

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;

/// Memory class of a buffer, decides CPU mapping behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// GPU-only memory, filled through the upload subsystem
    Static,
    /// CPU-written every frame, one region per frame in flight
    Dynamic,
    /// CPU-written staging memory (upload heaps, frame allocators)
    Upload,
    /// GPU-written, CPU-read memory
    Readback,
}

impl BufferUsage {
    /// True if the CPU can write the buffer through a mapping
    pub fn is_cpu_writable(&self) -> bool {
        matches!(self, BufferUsage::Dynamic | BufferUsage::Upload)
    }
}

bitflags! {
    /// Views and bind points a buffer may be used with
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const INDIRECT = 1 << 5;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes (per frame region for dynamic buffers)
    pub size: u64,
    /// Element stride for structured views, 0 for raw views
    pub stride: u32,
    pub usage: BufferUsage,
    pub flags: BufferFlags,
}

impl BufferDesc {
    pub fn new(name: &str, size: u64, usage: BufferUsage, flags: BufferFlags) -> Self {
        Self {
            name: name.to_string(),
            size,
            stride: 0,
            usage,
            flags,
        }
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }
}

/// Buffer data format for vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_SINT,
    R32G32_SINT,
    R32G32B32_SINT,
    R32G32B32A32_SINT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_SINT | BufferFormat::R32_UINT => 4,
            BufferFormat::R8G8B8A8_UNORM => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_SINT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT | BufferFormat::R32G32B32_SINT | BufferFormat::R32G32B32_UINT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_SINT | BufferFormat::R32G32B32A32_UINT => 16,
        }
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The native buffer is destroyed when dropped.
pub trait Buffer: Send + Sync {
    /// Descriptor the buffer was created with (`size` is the full native size)
    fn desc(&self) -> &BufferDesc;

    /// GPU virtual address of byte 0 (0 if the backend has none)
    fn gpu_address(&self) -> u64;

    /// Write through the persistent mapping
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read through the persistent mapping (readback and upload memory only)
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
