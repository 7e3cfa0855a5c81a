/// DescriptorAllocator - descriptor set allocation with pool rotation
///
/// Sets come from a "current" pool. When that pool reports fragmentation or
/// exhaustion, the allocator moves to a pool from the free list (or creates a
/// new one) and retries exactly once; a second failure is escalated.
///
/// Pools are never destroyed while the allocator lives. `reset_pools` resets
/// every used pool and returns it to the free list. The caller must make sure
/// no pending GPU work still references a set from those pools.

use std::sync::Arc;

use crate::config::DescriptorPoolConfig;
use crate::device::{
    DescriptorPoolHandle, DescriptorPoolSize, DescriptorSetHandle, DescriptorSetLayoutHandle,
    DeviceContext,
};
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error, engine_info};

/// Descriptor set allocator
pub struct DescriptorAllocator {
    ctx: Arc<DeviceContext>,
    config: DescriptorPoolConfig,
    current: Option<DescriptorPoolHandle>,
    /// Pools handed out since the last reset (includes `current`)
    used: Vec<DescriptorPoolHandle>,
    /// Reset pools ready for reuse
    free: Vec<DescriptorPoolHandle>,
    pools_created: usize,
}

impl DescriptorAllocator {
    /// Create an allocator; no pool is created until the first allocation
    pub fn new(ctx: Arc<DeviceContext>, config: DescriptorPoolConfig) -> Self {
        Self {
            ctx,
            config,
            current: None,
            used: Vec::new(),
            free: Vec::new(),
            pools_created: 0,
        }
    }

    /// Allocate one set with `layout`
    pub fn allocate(&mut self, layout: DescriptorSetLayoutHandle) -> Result<DescriptorSetHandle> {
        let pool = match self.current {
            Some(pool) => pool,
            None => self.rotate()?,
        };

        match self.ctx.device().allocate_descriptor_set(pool, layout) {
            Ok(set) => return Ok(set),
            Err(e) if e.is_transient() => {
                engine_debug!("galaxy3d::DescriptorAllocator", "Pool {:?} unusable ({}), rotating", pool, e);
            }
            Err(e) => return Err(e),
        }

        let pool = self.rotate()?;
        self.ctx.device().allocate_descriptor_set(pool, layout).map_err(|e| {
            engine_error!(
                "galaxy3d::DescriptorAllocator",
                "Allocation failed again after pool rotation: {}",
                e
            );
            Error::DescriptorAllocationFailed(format!(
                "allocation failed after rotating to a fresh pool: {}",
                e
            ))
        })
    }

    /// Make a reset or new pool current
    fn rotate(&mut self) -> Result<DescriptorPoolHandle> {
        let pool = match self.free.pop() {
            Some(pool) => pool,
            None => self.create_pool()?,
        };
        self.used.push(pool);
        self.current = Some(pool);
        Ok(pool)
    }

    fn create_pool(&mut self) -> Result<DescriptorPoolHandle> {
        if let Some(max_pools) = self.config.max_pools {
            if self.pools_created >= max_pools {
                engine_error!(
                    "galaxy3d::DescriptorAllocator",
                    "Descriptor pool limit reached ({} pools)",
                    max_pools
                );
                return Err(Error::DescriptorPoolLimit { max_pools });
            }
        }

        let sizes = pool_sizes(&self.config);
        let pool = self.ctx.device().create_descriptor_pool(self.config.sets_per_pool, &sizes)?;
        self.pools_created += 1;
        engine_info!(
            "galaxy3d::DescriptorAllocator",
            "Created descriptor pool {:?} ({} total)",
            pool,
            self.pools_created
        );
        Ok(pool)
    }

    /// Reset every used pool and move it to the free list
    pub fn reset_pools(&mut self) -> Result<()> {
        for pool in self.used.drain(..) {
            self.ctx.device().reset_descriptor_pool(pool)?;
            self.free.push(pool);
        }
        self.current = None;
        Ok(())
    }

    /// Pools owned by the allocator (used and free)
    pub fn pool_count(&self) -> usize {
        self.used.len() + self.free.len()
    }

    pub fn free_pool_count(&self) -> usize {
        self.free.len()
    }

    /// Pools created over the allocator's lifetime
    pub fn pools_created(&self) -> usize {
        self.pools_created
    }
}

/// Per-type descriptor counts of one pool: each ratio scaled by `sets_per_pool`
pub fn pool_sizes(config: &DescriptorPoolConfig) -> Vec<DescriptorPoolSize> {
    config
        .pool_ratios
        .iter()
        .map(|&(descriptor_type, ratio)| DescriptorPoolSize {
            descriptor_type,
            count: ((ratio * config.sets_per_pool as f32).ceil() as u32).max(1),
        })
        .collect()
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.used.drain(..).chain(self.free.drain(..)) {
            self.ctx.device().destroy_descriptor_pool(pool);
        }
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
