/// N-buffered frame bookkeeping
///
/// Frame `F` records into slot `F % N`. Before a slot is reused, the fence
/// value signaled at the end of its previous frame must be reached; that wait
/// is the only CPU/GPU synchronization of normal frame progression and bounds
/// the CPU lead to N frames. Destruction requests are queued on the slot of
/// the frame that issued them and handed back when that slot comes around
/// again, right after its fence wait.

use crate::error::Result;
use crate::resource::AnyHandle;

/// Lifecycle of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Commands are being recorded
    Recording,
    /// Submitted, its fence may not have been reached yet
    Submitted,
    /// Fence reached (or never used), free for recording
    Fenced,
}

struct FrameSlot {
    state: FrameState,
    /// Value signaled at the end of the slot's last frame, 0 if none
    fence_value: u64,
    destructions: Vec<AnyHandle>,
}

pub struct FramePipeliner {
    slots: Vec<FrameSlot>,
    /// Frames begun so far
    frame_count: u64,
    last_fence_value: u64,
}

impl FramePipeliner {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: (0..frames_in_flight)
                .map(|_| FrameSlot {
                    state: FrameState::Fenced,
                    fence_value: 0,
                    destructions: Vec::new(),
                })
                .collect(),
            frame_count: 0,
            last_fence_value: 0,
        }
    }

    /// Advance to the next slot
    ///
    /// `wait` is called with the slot's previous fence value if that frame
    /// was submitted; it must block until every queue has reached it.
    pub fn begin_frame(&mut self, wait: impl FnOnce(u64) -> Result<()>) -> Result<usize> {
        if self.is_recording() {
            crate::engine_bail!(InvalidState => "quasar::FramePipeliner",
                "begin_frame called twice without end_frame (slot {})", self.current_slot());
        }
        let slot = self.next_slot();
        self.wait_slot(slot, wait)?;

        self.slots[slot].state = FrameState::Recording;
        self.frame_count += 1;
        Ok(slot)
    }

    /// Block until the last frame submitted from `slot` has completed
    ///
    /// No-op unless the slot is `Submitted`; afterwards it is `Fenced` and
    /// its memory regions may be written from the CPU.
    pub fn wait_slot(&mut self, slot: usize, wait: impl FnOnce(u64) -> Result<()>) -> Result<()> {
        if self.slots[slot].state == FrameState::Submitted {
            let fence = self.slots[slot].fence_value;
            crate::engine_trace!("quasar::FramePipeliner", "Slot {} waits for fence {}", slot, fence);
            wait(fence)?;
            self.slots[slot].state = FrameState::Fenced;
        }
        Ok(())
    }

    /// Slot the next `begin_frame` will record into
    pub fn next_slot(&self) -> usize {
        (self.frame_count % self.slots.len() as u64) as usize
    }

    /// Close the recording slot; its work completes when `fence_value` is reached
    pub fn end_frame(&mut self, fence_value: u64) -> Result<()> {
        if !self.is_recording() {
            crate::engine_bail!(InvalidState => "quasar::FramePipeliner", "end_frame without begin_frame");
        }
        if fence_value <= self.slots[self.current_slot()].fence_value {
            crate::engine_bail!(InvalidState => "quasar::FramePipeliner",
                "Fence value {} does not increase", fence_value);
        }
        let slot = self.current_slot();
        self.slots[slot].state = FrameState::Submitted;
        self.slots[slot].fence_value = fence_value;
        Ok(())
    }

    /// Hand out the next fence value, strictly increasing
    pub fn next_fence_value(&mut self) -> u64 {
        self.last_fence_value += 1;
        self.last_fence_value
    }

    pub fn last_fence_value(&self) -> u64 {
        self.last_fence_value
    }

    /// Every submitted slot is known complete (after a full idle wait)
    pub fn mark_all_fenced(&mut self) {
        for slot in &mut self.slots {
            if slot.state == FrameState::Submitted {
                slot.state = FrameState::Fenced;
            }
        }
    }

    /// Queue `handle` for destruction when the current slot is reused
    pub fn defer_destruction(&mut self, handle: AnyHandle) {
        let slot = self.current_slot();
        crate::engine_debug!("quasar::FramePipeliner",
            "{:?} destruction deferred to slot {} (frame {})", handle, slot,
            self.frame_count + self.slots.len() as u64 - 1);
        self.slots[slot].destructions.push(handle);
    }

    /// Take the destruction queue of `slot`
    pub fn take_destructions(&mut self, slot: usize) -> Vec<AnyHandle> {
        std::mem::take(&mut self.slots[slot].destructions)
    }

    pub fn pending_destructions(&self) -> usize {
        self.slots.iter().map(|s| s.destructions.len()).sum()
    }

    /// Slot of the frame being recorded, or of the last frame begun
    ///
    /// Before the first frame this is the last slot, so that requests issued
    /// then are processed before the first frame reusing it.
    pub fn current_slot(&self) -> usize {
        let n = self.slots.len() as u64;
        ((self.frame_count + n - 1) % n) as usize
    }

    pub fn is_recording(&self) -> bool {
        self.frame_count > 0 && self.slots[self.current_slot()].state == FrameState::Recording
    }

    pub fn slot_state(&self, slot: usize) -> FrameState {
        self.slots[slot].state
    }

    pub fn fence_value(&self, slot: usize) -> u64 {
        self.slots[slot].fence_value
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
#[path = "frame_pipeliner_tests.rs"]
mod tests;
