use super::*;
use crate::error::Error;
use crate::resource::{BufferHandle, PipelineHandle};
use std::cell::RefCell;

fn run_frame(frames: &mut FramePipeliner, waits: &RefCell<Vec<u64>>) -> usize {
    let slot = frames.begin_frame(|v| {
        waits.borrow_mut().push(v);
        Ok(())
    }).unwrap();
    let fence = frames.next_fence_value();
    frames.end_frame(fence).unwrap();
    slot
}

// ============================================================================
// Slot rotation and fence waits
// ============================================================================

#[test]
fn test_slots_rotate() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());

    let slots: Vec<usize> = (0..5).map(|_| run_frame(&mut frames, &waits)).collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0]);
}

#[test]
fn test_wait_uses_fence_of_n_frames_ago() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());

    for _ in 0..5 {
        run_frame(&mut frames, &waits);
    }
    // Frames 0 and 1 have nothing to wait for, frame F waits for frame F-2
    assert_eq!(*waits.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_slot_states() {
    let mut frames = FramePipeliner::new(2);
    assert_eq!(frames.slot_state(0), FrameState::Fenced);

    let slot = frames.begin_frame(|_| Ok(())).unwrap();
    assert_eq!(frames.slot_state(slot), FrameState::Recording);
    assert!(frames.is_recording());

    let fence = frames.next_fence_value();
    frames.end_frame(fence).unwrap();
    assert_eq!(frames.slot_state(slot), FrameState::Submitted);
    assert_eq!(frames.fence_value(slot), fence);

    frames.mark_all_fenced();
    assert_eq!(frames.slot_state(slot), FrameState::Fenced);
}

#[test]
fn test_wait_slot_between_frames() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());
    run_frame(&mut frames, &waits);
    run_frame(&mut frames, &waits);

    let slot = frames.next_slot();
    assert_eq!(slot, 0);
    assert_eq!(frames.slot_state(slot), FrameState::Submitted);
    frames.wait_slot(slot, |v| {
        waits.borrow_mut().push(v);
        Ok(())
    }).unwrap();
    assert_eq!(frames.slot_state(slot), FrameState::Fenced);
    assert_eq!(*waits.borrow(), vec![1]);

    // Already fenced, the next frame does not wait again
    run_frame(&mut frames, &waits);
    assert_eq!(*waits.borrow(), vec![1]);
}

#[test]
fn test_wait_slot_failure_keeps_slot_submitted() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());
    run_frame(&mut frames, &waits);

    let result = frames.wait_slot(0, |_| Err(Error::BackendError("device lost".to_string())));
    assert!(result.is_err());
    assert_eq!(frames.slot_state(0), FrameState::Submitted);
}

#[test]
fn test_begin_twice_fails() {
    let mut frames = FramePipeliner::new(2);
    frames.begin_frame(|_| Ok(())).unwrap();

    assert!(matches!(frames.begin_frame(|_| Ok(())), Err(Error::InvalidState(_))));
    assert_eq!(frames.frame_count(), 1);
}

#[test]
fn test_end_without_begin_fails() {
    let mut frames = FramePipeliner::new(2);
    assert!(matches!(frames.end_frame(1), Err(Error::InvalidState(_))));
}

#[test]
fn test_failed_wait_leaves_slot_submitted() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());
    run_frame(&mut frames, &waits);
    run_frame(&mut frames, &waits);

    let result = frames.begin_frame(|_| Err(Error::BackendError("device lost".to_string())));
    assert!(result.is_err());
    assert_eq!(frames.slot_state(0), FrameState::Submitted);
    assert_eq!(frames.frame_count(), 2);
}

// ============================================================================
// Deferred destruction
// ============================================================================

#[test]
fn test_destruction_returns_after_n_frames() {
    let mut frames = FramePipeliner::new(2);
    let waits = RefCell::new(Vec::new());
    let handle = AnyHandle::Buffer(BufferHandle::from_index(4));

    // Frame 0 (slot 0) requests the destruction
    let slot = frames.begin_frame(|_| Ok(())).unwrap();
    frames.defer_destruction(handle);
    let fence = frames.next_fence_value();
    frames.end_frame(fence).unwrap();

    // Frame 1 runs on the other slot and must not see it
    let other = run_frame(&mut frames, &waits);
    assert_ne!(other, slot);
    assert!(frames.take_destructions(other).is_empty());

    // Frame 2 reuses slot 0 after waiting for frame 0's fence
    let reused = frames.begin_frame(|v| {
        waits.borrow_mut().push(v);
        Ok(())
    }).unwrap();
    assert_eq!(reused, slot);
    assert_eq!(*waits.borrow(), vec![fence]);
    assert_eq!(frames.take_destructions(reused), vec![handle]);
    assert_eq!(frames.pending_destructions(), 0);
}

#[test]
fn test_destruction_before_first_frame_goes_to_last_slot() {
    let mut frames = FramePipeliner::new(2);
    frames.defer_destruction(AnyHandle::Pipeline(PipelineHandle::from_index(0)));

    assert_eq!(frames.current_slot(), 1);
    assert_eq!(frames.take_destructions(1).len(), 1);
}

#[test]
fn test_fence_values_strictly_increase() {
    let mut frames = FramePipeliner::new(2);
    let a = frames.next_fence_value();
    let b = frames.next_fence_value();
    assert!(b > a);
    assert_eq!(frames.last_fence_value(), b);

    frames.begin_frame(|_| Ok(())).unwrap();
    frames.end_frame(b).unwrap();
    frames.begin_frame(|_| Ok(())).unwrap();
    frames.end_frame(b + 1).unwrap();
    frames.begin_frame(|_| Ok(())).unwrap();
    assert!(matches!(frames.end_frame(b), Err(Error::InvalidState(_))));
}
