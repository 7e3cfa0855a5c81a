/// Fence - owned CPU-GPU synchronization primitive

use std::sync::Arc;

use crate::device::{DeviceContext, FenceHandle};
use crate::error::Result;

/// Effectively infinite timeout used by every frame-loop wait
pub const INFINITE_TIMEOUT: u64 = u64::MAX;

/// Fence owning its native handle, destroyed on drop
pub struct Fence {
    ctx: Arc<DeviceContext>,
    handle: FenceHandle,
}

impl Fence {
    /// Create a fence
    ///
    /// # Arguments
    ///
    /// * `signaled` - Start signaled, for fences waited on before their first submission
    pub fn new(ctx: Arc<DeviceContext>, signaled: bool) -> Result<Self> {
        let handle = ctx.device().create_fence(signaled)?;
        Ok(Self { ctx, handle })
    }

    pub fn handle(&self) -> FenceHandle {
        self.handle
    }

    /// Block until signaled
    pub fn wait(&self) -> Result<()> {
        self.ctx.device().wait_for_fences(&[self.handle], INFINITE_TIMEOUT)
    }

    /// Return to the unsignaled state
    pub fn reset(&self) -> Result<()> {
        self.ctx.device().reset_fences(&[self.handle])
    }

    pub fn is_signaled(&self) -> Result<bool> {
        self.ctx.device().fence_status(self.handle)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.ctx.device().destroy_fence(self.handle);
    }
}
