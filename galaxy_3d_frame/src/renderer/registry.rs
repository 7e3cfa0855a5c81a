/// SubrenderRegistry - ordered, named collection of subrenders
///
/// Uses a SlotMap for stable keys. Iteration follows registration order,
/// which is also the recording order inside a subpass.

use slotmap::{new_key_type, SlotMap};

use crate::error::{Error, Result};
use crate::pipeline::PipelineStage;
use crate::renderer::Subrender;
use crate::engine_debug;

new_key_type! {
    /// Stable key of a registered subrender
    pub struct SubrenderKey;
}

/// Where a subrender is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubrenderLifecycle {
    /// Registered, GPU objects not built yet
    Registered,
    /// Built and recorded every frame
    Initialized,
    /// GPU objects dropped (before recreation or shutdown)
    CleanedUp,
}

pub(crate) struct SubrenderEntry {
    pub(crate) name: String,
    pub(crate) stage: PipelineStage,
    pub(crate) lifecycle: SubrenderLifecycle,
    pub(crate) subrender: Box<dyn Subrender>,
}

/// Registry of subrenders
pub struct SubrenderRegistry {
    entries: SlotMap<SubrenderKey, SubrenderEntry>,
    order: Vec<SubrenderKey>,
}

impl SubrenderRegistry {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Register `subrender` under a unique `name` at `stage`
    pub fn register(
        &mut self,
        name: &str,
        stage: PipelineStage,
        subrender: Box<dyn Subrender>,
    ) -> Result<SubrenderKey> {
        if self.find(name).is_some() {
            return Err(Error::contract(
                "SubrenderRegistry",
                format!("subrender '{}' is already registered", name),
            ));
        }
        let key = self.entries.insert(SubrenderEntry {
            name: name.to_string(),
            stage,
            lifecycle: SubrenderLifecycle::Registered,
            subrender,
        });
        self.order.push(key);

        engine_debug!(
            "galaxy3d::SubrenderRegistry",
            "Registered subrender '{}' at pass {} subpass {}",
            name,
            stage.render_pass,
            stage.subpass
        );
        Ok(key)
    }

    /// Unregister and return the subrender, cleaning it up if it was initialized
    pub fn remove(&mut self, key: SubrenderKey) -> Result<Box<dyn Subrender>> {
        let mut entry = self.entries.remove(key).ok_or_else(|| {
            Error::contract("SubrenderRegistry", format!("unknown subrender key {:?}", key))
        })?;
        self.order.retain(|k| *k != key);
        if entry.lifecycle == SubrenderLifecycle::Initialized {
            entry.subrender.cleanup();
        }
        Ok(entry.subrender)
    }

    /// Key of the subrender registered as `name`
    pub fn find(&self, name: &str) -> Option<SubrenderKey> {
        self.order
            .iter()
            .copied()
            .find(|key| self.entries[*key].name == name)
    }

    pub fn lifecycle(&self, key: SubrenderKey) -> Option<SubrenderLifecycle> {
        self.entries.get(key).map(|e| e.lifecycle)
    }

    pub fn stage(&self, key: SubrenderKey) -> Option<PipelineStage> {
        self.entries.get(key).map(|e| e.stage)
    }

    pub fn name(&self, key: SubrenderKey) -> Option<&str> {
        self.entries.get(key).map(|e| e.name.as_str())
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|key| self.entries[*key].name.as_str()).collect()
    }

    /// Keys in registration order
    pub fn keys(&self) -> &[SubrenderKey] {
        &self.order
    }

    /// Keys registered at `stage`, in registration order
    pub fn keys_for_stage(&self, stage: PipelineStage) -> Vec<SubrenderKey> {
        self.order
            .iter()
            .copied()
            .filter(|key| self.entries[*key].stage == stage)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn entry_mut(&mut self, key: SubrenderKey) -> Option<&mut SubrenderEntry> {
        self.entries.get_mut(key)
    }

    /// Clean up every initialized subrender, in reverse registration order
    pub(crate) fn cleanup_all(&mut self) {
        for key in self.order.iter().rev() {
            let entry = &mut self.entries[*key];
            if entry.lifecycle == SubrenderLifecycle::Initialized {
                entry.subrender.cleanup();
                entry.lifecycle = SubrenderLifecycle::CleanedUp;
            }
        }
    }
}

impl Default for SubrenderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
