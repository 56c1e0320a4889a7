/// Frame pipelining - per-slot fences, deferred destruction, linear allocators

pub mod frame_pipeliner;
pub mod frame_allocator;

pub use frame_pipeliner::*;
pub use frame_allocator::*;
