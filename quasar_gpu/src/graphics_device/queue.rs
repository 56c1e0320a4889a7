/// CommandQueue trait - submission and fence signaling

use crate::error::Result;
use crate::graphics_device::CommandList;

/// Native queue families used by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Copy,
}

/// GPU queue with an attached monotonically increasing fence
pub trait CommandQueue: Send + Sync {
    fn queue_type(&self) -> QueueType;

    /// Submit recorded command lists in order
    fn submit(&mut self, command_lists: &[&dyn CommandList]) -> Result<()>;

    /// Signal the queue fence with `value` once all prior submissions complete
    fn signal(&mut self, value: u64) -> Result<()>;

    /// Last fence value the GPU has reached
    fn completed_value(&self) -> Result<u64>;

    /// Block the calling thread until the fence reaches `value`
    fn wait_for_value(&self, value: u64) -> Result<()>;

    /// Block until every submission on this queue has completed
    fn wait_idle(&self) -> Result<()>;
}
