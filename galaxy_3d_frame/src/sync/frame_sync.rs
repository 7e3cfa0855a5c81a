/// FrameSync - ring of per-frame synchronization objects
///
/// One slot per frame in flight. Each slot holds:
/// - `in_flight`: fence signaled when the slot's submission completes
///   (created signaled so the first wait passes)
/// - `image_available`: semaphore signaled by acquire
/// - `render_finished`: semaphore signaled by submit and waited on by present
///
/// The ring index advances exactly once per submitted frame.

use std::sync::Arc;

use crate::device::DeviceContext;
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::sync::{Fence, Semaphore};

/// Synchronization objects of one frame slot
pub struct FrameSlot {
    pub in_flight: Fence,
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
}

/// Fixed-size ring of frame slots
pub struct FrameSync {
    slots: Vec<FrameSlot>,
    index: usize,
}

impl FrameSync {
    /// Create `frames` slots
    pub fn new(ctx: &Arc<DeviceContext>, frames: usize) -> Result<Self> {
        if frames == 0 {
            return Err(Error::contract("FrameSync", "frame count must be at least 1"));
        }

        let slots = (0..frames)
            .map(|_| {
                Ok(FrameSlot {
                    in_flight: Fence::new(ctx.clone(), true)?,
                    image_available: Semaphore::new(ctx.clone())?,
                    render_finished: Semaphore::new(ctx.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        engine_debug!("galaxy3d::FrameSync", "Created {} frame slots", frames);

        Ok(Self { slots, index: 0 })
    }

    /// Slot of the frame being built
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.index]
    }

    /// Index of the current slot
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of slots (frames in flight)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move to the next slot; call once per submitted frame
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.slots.len();
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
