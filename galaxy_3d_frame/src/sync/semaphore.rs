/// Semaphore - owned GPU-GPU synchronization primitive

use std::sync::Arc;

use crate::device::{DeviceContext, SemaphoreHandle};
use crate::error::Result;

/// Binary semaphore owning its native handle, destroyed on drop
pub struct Semaphore {
    ctx: Arc<DeviceContext>,
    handle: SemaphoreHandle,
}

impl Semaphore {
    pub fn new(ctx: Arc<DeviceContext>) -> Result<Self> {
        let handle = ctx.device().create_semaphore()?;
        Ok(Self { ctx, handle })
    }

    pub fn handle(&self) -> SemaphoreHandle {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.ctx.device().destroy_semaphore(self.handle);
    }
}
