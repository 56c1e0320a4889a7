/// Barrier batching
///
/// Transitions are decided against the resource's tracked state and queued;
/// the queue is handed to the native command list in one call when it is
/// flushed. A full queue is flushed before the next barrier is added.

use crate::graphics_device::ResourceState;
use crate::resource::ResourceHandle;

/// A queued barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierRequest {
    Transition {
        resource: ResourceHandle,
        before: ResourceState,
        after: ResourceState,
    },
    /// Same-state unordered-access synchronization
    UnorderedAccess { resource: ResourceHandle },
}

impl BarrierRequest {
    /// Barrier needed to move `resource` from `current` to `new_state`
    ///
    /// Returns `None` when the resource already is in `new_state`, unless
    /// that state is `UNORDERED_ACCESS`: two consecutive unordered-access
    /// uses still need a barrier between them.
    pub fn for_transition(
        resource: ResourceHandle,
        current: ResourceState,
        new_state: ResourceState,
    ) -> Option<Self> {
        if current != new_state {
            Some(BarrierRequest::Transition { resource, before: current, after: new_state })
        } else if new_state == ResourceState::UNORDERED_ACCESS {
            Some(BarrierRequest::UnorderedAccess { resource })
        } else {
            None
        }
    }

    pub fn resource(&self) -> ResourceHandle {
        match self {
            BarrierRequest::Transition { resource, .. } => *resource,
            BarrierRequest::UnorderedAccess { resource } => *resource,
        }
    }
}

/// Fixed-capacity barrier queue
pub struct BarrierBatch {
    pending: Vec<BarrierRequest>,
    capacity: usize,
}

impl BarrierBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue a barrier
    ///
    /// If the queue is full, its current content is returned and must be
    /// submitted before anything recorded after this call.
    #[must_use]
    pub fn push(&mut self, barrier: BarrierRequest) -> Option<Vec<BarrierRequest>> {
        let overflow = if self.is_full() { Some(self.take()) } else { None };
        self.pending.push(barrier);
        overflow
    }

    /// Empty the queue, returning the batch to submit
    pub fn take(&mut self) -> Vec<BarrierRequest> {
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity))
    }

    /// Drop every queued barrier touching `resource`
    pub fn forget(&mut self, resource: ResourceHandle) {
        self.pending.retain(|b| b.resource() != resource);
    }

    pub fn pending(&self) -> &[BarrierRequest] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
