/// DescriptorLayoutCache - structural deduplication of descriptor set layouts
///
/// The key is the canonical (sorted) binding list, so two binding lists that
/// differ only in declaration order share one native layout. Layouts live as
/// long as the cache.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::device::{DescriptorBinding, DescriptorSetLayoutHandle, DeviceContext};
use crate::engine_debug;
use crate::error::Result;

/// Cache of descriptor set layouts keyed by their sorted bindings
pub struct DescriptorLayoutCache {
    ctx: Arc<DeviceContext>,
    layouts: FxHashMap<Vec<DescriptorBinding>, DescriptorSetLayoutHandle>,
}

impl DescriptorLayoutCache {
    pub fn new(ctx: Arc<DeviceContext>) -> Self {
        Self {
            ctx,
            layouts: FxHashMap::default(),
        }
    }

    /// Return the layout for `bindings`, creating it on first request
    ///
    /// # Arguments
    ///
    /// * `bindings` - Bindings in any order; `(binding, type, count, stages)` is the identity
    pub fn create_descriptor_layout(&mut self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let key = canonicalize(bindings);
        if let Some(&layout) = self.layouts.get(&key) {
            return Ok(layout);
        }

        let layout = self.ctx.device().create_descriptor_set_layout(&key)?;
        engine_debug!(
            "galaxy3d::DescriptorLayoutCache",
            "Created layout {:?} with {} bindings ({} cached)",
            layout,
            key.len(),
            self.layouts.len() + 1
        );
        self.layouts.insert(key, layout);
        Ok(layout)
    }

    /// Number of distinct layouts created
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Sort by binding index; already-sorted input is copied as is
fn canonicalize(bindings: &[DescriptorBinding]) -> Vec<DescriptorBinding> {
    let mut key = bindings.to_vec();
    if !key.windows(2).all(|pair| pair[0] <= pair[1]) {
        key.sort_unstable();
    }
    key
}

impl Drop for DescriptorLayoutCache {
    fn drop(&mut self) {
        for (_, layout) in self.layouts.drain() {
            self.ctx.device().destroy_descriptor_set_layout(layout);
        }
    }
}

#[cfg(test)]
#[path = "layout_cache_tests.rs"]
mod tests;
