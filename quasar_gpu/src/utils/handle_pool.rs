/// Fixed-capacity pool of `u32` indices.
///
/// The free list is seeded with `0..capacity` at construction and consumed
/// from a "used" cursor: `acquire` takes the entry at the cursor and advances
/// it, `free` steps the cursor back and stores the returned index there. The
/// last freed index is therefore the first reused (LIFO). Both operations
/// are O(1) and never allocate.
///
/// Indices carry no generation: a freed index may be handed out again on the
/// next `acquire`.
///
/// # Example
///
/// ```ignore
/// let mut pool = HandlePool::new("buffer", 4);
/// let a = pool.acquire()?;  // 0
/// let b = pool.acquire()?;  // 1
/// pool.free(a)?;            // 0 is available again
/// let c = pool.acquire()?;  // 0 (recycled)
/// ```
pub struct HandlePool {
    name: &'static str,
    free_list: Vec<u32>,
    live: Vec<bool>,
    used: usize,
}

impl HandlePool {
    /// Create a pool handing out indices `0..capacity`
    pub fn new(name: &'static str, capacity: u32) -> Self {
        Self {
            name,
            free_list: (0..capacity).collect(),
            live: vec![false; capacity as usize],
            used: 0,
        }
    }

    /// Take an index out of the pool
    pub fn acquire(&mut self) -> crate::error::Result<u32> {
        if self.used == self.free_list.len() {
            crate::engine_bail!(CapacityExceeded => "quasar::HandlePool",
                "{} pool exhausted (capacity {})", self.name, self.free_list.len());
        }
        let index = self.free_list[self.used];
        self.used += 1;
        self.live[index as usize] = true;
        Ok(index)
    }

    /// Return a live index to the pool
    pub fn free(&mut self, index: u32) -> crate::error::Result<()> {
        if !self.is_live(index) {
            crate::engine_bail!(InvalidHandle => "quasar::HandlePool",
                "freeing {} index {} which is not live", self.name, index);
        }
        self.live[index as usize] = false;
        self.used -= 1;
        self.free_list[self.used] = index;
        Ok(())
    }

    /// Whether `index` is currently acquired
    pub fn is_live(&self, index: u32) -> bool {
        self.live.get(index as usize).copied().unwrap_or(false)
    }

    /// Number of currently acquired indices
    pub fn len(&self) -> u32 {
        self.used as u32
    }

    /// Whether no index is currently acquired
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> u32 {
        self.free_list.len() as u32
    }

    /// Indices left before `acquire` fails
    pub fn available(&self) -> u32 {
        self.capacity() - self.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "handle_pool_tests.rs"]
mod tests;
