/// Bindless slot allocator
///
/// Hands out indices into the reserved prefix of the render-pass heaps. An
/// index is owned by one resource for its whole lifetime and written into
/// every frame's heap at the same position.

use crate::error::Result;
use crate::utils::HandlePool;

pub struct BindlessAllocator {
    pool: HandlePool,
}

impl BindlessAllocator {
    /// Allocator over `0..num_reserved`
    pub fn new(num_reserved: u32) -> Self {
        Self {
            pool: HandlePool::new("bindless", num_reserved),
        }
    }

    pub fn allocate(&mut self) -> Result<u32> {
        self.pool.acquire()
    }

    pub fn free(&mut self, index: u32) -> Result<()> {
        self.pool.free(index)
    }

    /// Indices currently owned by a resource
    pub fn allocated(&self) -> u32 {
        self.pool.len()
    }

    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }
}

#[cfg(test)]
#[path = "bindless_tests.rs"]
mod tests;
