/// Per-frame linear allocator for constant data
///
/// One instance per frame slot, backed by an upload buffer. Allocations are
/// 256-byte aligned so any of them can be bound as a constant buffer. The
/// cursor only grows during a frame and is reset once, at the start of the
/// slot's next turn.

use crate::config::{align_up, CONSTANT_BUFFER_ALIGNMENT};
use crate::error::Result;
use crate::graphics_device::{Buffer, BufferDesc, BufferFlags, BufferUsage, GraphicsDevice};

pub struct FrameAllocator {
    buffer: Box<dyn Buffer>,
    cursor: u64,
}

impl FrameAllocator {
    pub fn new(device: &mut dyn GraphicsDevice, name: &str, size: u64) -> Result<Self> {
        let buffer = device.create_buffer(&BufferDesc::new(
            name,
            size,
            BufferUsage::Upload,
            BufferFlags::CONSTANT,
        ))?;
        Ok(Self { buffer, cursor: 0 })
    }

    /// Copy `data` into the next free aligned range, returns its offset
    pub fn allocate(&mut self, data: &[u8]) -> Result<u64> {
        let offset = align_up(self.cursor, CONSTANT_BUFFER_ALIGNMENT);
        let end = offset + data.len() as u64;
        if end > self.capacity() {
            crate::engine_bail!(CapacityExceeded => "quasar::FrameAllocator",
                "'{}' full: {} bytes requested at {} of {}",
                self.buffer.desc().name, data.len(), offset, self.capacity());
        }
        self.buffer.write(offset, data)?;
        self.cursor = end;
        Ok(offset)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Bytes consumed since the last reset, padding included
    pub fn used(&self) -> u64 {
        self.cursor
    }

    pub fn capacity(&self) -> u64 {
        self.buffer.desc().size
    }

    pub fn buffer(&self) -> &dyn Buffer {
        self.buffer.as_ref()
    }
}

#[cfg(test)]
#[path = "frame_allocator_tests.rs"]
mod tests;
