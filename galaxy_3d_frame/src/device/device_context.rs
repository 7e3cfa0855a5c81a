/// DeviceContext - explicitly shared device state for every frame-core object
///
/// Built once at startup and passed (as `Arc<DeviceContext>`) to every
/// component at construction time. Holds:
/// - the graphics device behind the downward contract
/// - the graphics and present queues, resolved once
/// - one command pool per recording thread

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::device::graphics_device::GraphicsDevice;
use crate::device::types::{CommandPoolHandle, QueueFamilies, QueueHandle};
use crate::error::Result;
use crate::{engine_debug, engine_info, engine_warn};

/// Queues resolved at context creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queues {
    pub families: QueueFamilies,
    pub graphics: QueueHandle,
    pub present: QueueHandle,
}

/// Shared device context
pub struct DeviceContext {
    device: Arc<dyn GraphicsDevice>,
    queues: Queues,
    validation_enabled: bool,
    /// Command pools are not thread-safe: one per recording thread
    command_pools: Mutex<FxHashMap<ThreadId, CommandPoolHandle>>,
}

impl DeviceContext {
    /// Create the context and resolve the queues
    ///
    /// # Arguments
    ///
    /// * `device` - Graphics device (backend or mock)
    /// * `config` - Startup configuration (validated here)
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &Config) -> Result<Arc<Self>> {
        config.validate()?;

        let families = device.queue_families();
        let graphics = device.queue(families.graphics, 0)?;
        let present = if families.is_unified() {
            graphics
        } else {
            device.queue(families.present, 0)?
        };

        engine_info!(
            "galaxy3d::DeviceContext",
            "Queues resolved: graphics family {}, present family {}{}",
            families.graphics,
            families.present,
            if families.is_unified() { " (shared)" } else { "" }
        );

        Ok(Arc::new(Self {
            device,
            queues: Queues { families, graphics, present },
            validation_enabled: config.enable_validation,
            command_pools: Mutex::new(FxHashMap::default()),
        }))
    }

    /// Graphics device
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Queues resolved at creation
    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn graphics_queue(&self) -> QueueHandle {
        self.queues.graphics
    }

    pub fn present_queue(&self) -> QueueHandle {
        self.queues.present
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Command pool owned by the calling thread, created on first use
    pub fn command_pool_for_current_thread(&self) -> Result<CommandPoolHandle> {
        let id = thread::current().id();
        let mut pools = self
            .command_pools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pool) = pools.get(&id) {
            return Ok(*pool);
        }

        let pool = self.device.create_command_pool(self.queues.families.graphics)?;
        engine_debug!("galaxy3d::DeviceContext", "Command pool created for thread {:?}", id);
        pools.insert(id, pool);
        Ok(pool)
    }

    /// Number of threads that own a command pool
    pub fn command_pool_count(&self) -> usize {
        self.command_pools
            .lock()
            .map(|pools| pools.len())
            .unwrap_or(0)
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_warn!("galaxy3d::DeviceContext", "wait_idle failed during teardown: {}", e);
        }
        let pools = self
            .command_pools
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, pool) in pools.drain() {
            self.device.destroy_command_pool(pool);
        }
    }
}

#[cfg(test)]
#[path = "device_context_tests.rs"]
mod tests;
