use super::*;
use crate::resource::{BufferHandle, TextureHandle};

fn texture(index: u32) -> ResourceHandle {
    ResourceHandle::Texture(TextureHandle::from_index(index))
}

// ============================================================================
// Transition decisions
// ============================================================================

#[test]
fn test_same_state_is_no_op() {
    let barrier = BarrierRequest::for_transition(
        texture(0),
        ResourceState::PIXEL_SHADER_RESOURCE,
        ResourceState::PIXEL_SHADER_RESOURCE,
    );
    assert_eq!(barrier, None);
}

#[test]
fn test_same_unordered_access_state_still_synchronizes() {
    let barrier = BarrierRequest::for_transition(
        texture(0),
        ResourceState::UNORDERED_ACCESS,
        ResourceState::UNORDERED_ACCESS,
    );
    assert_eq!(barrier, Some(BarrierRequest::UnorderedAccess { resource: texture(0) }));
}

#[test]
fn test_state_change_is_a_transition() {
    let buffer = ResourceHandle::Buffer(BufferHandle::from_index(2));
    let barrier = BarrierRequest::for_transition(buffer, ResourceState::COPY_DEST, ResourceState::UNORDERED_ACCESS);

    assert_eq!(
        barrier,
        Some(BarrierRequest::Transition {
            resource: buffer,
            before: ResourceState::COPY_DEST,
            after: ResourceState::UNORDERED_ACCESS,
        })
    );
    assert_eq!(barrier.unwrap().resource(), buffer);
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_batch_accumulates_until_full() {
    let mut batch = BarrierBatch::new(3);
    for i in 0..3 {
        assert!(batch.push(BarrierRequest::UnorderedAccess { resource: texture(i) }).is_none());
    }
    assert!(batch.is_full());
    assert_eq!(batch.len(), 3);
}

#[test]
fn test_full_batch_is_flushed_before_new_barrier() {
    let mut batch = BarrierBatch::new(2);
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(0) });
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(1) });

    let flushed = batch.push(BarrierRequest::UnorderedAccess { resource: texture(2) }).unwrap();

    assert_eq!(flushed.len(), 2);
    assert_eq!(flushed[0].resource(), texture(0));
    assert_eq!(batch.pending(), &[BarrierRequest::UnorderedAccess { resource: texture(2) }]);
}

#[test]
fn test_take_empties_the_queue() {
    let mut batch = BarrierBatch::new(4);
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(0) });

    assert_eq!(batch.take().len(), 1);
    assert!(batch.is_empty());
    assert!(batch.take().is_empty());
    assert_eq!(batch.capacity(), 4);
}

#[test]
fn test_forget_drops_barriers_of_one_resource() {
    let mut batch = BarrierBatch::new(4);
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(0) });
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(1) });
    let _ = batch.push(BarrierRequest::UnorderedAccess { resource: texture(0) });

    batch.forget(texture(0));
    assert_eq!(batch.pending(), &[BarrierRequest::UnorderedAccess { resource: texture(1) }]);
}
