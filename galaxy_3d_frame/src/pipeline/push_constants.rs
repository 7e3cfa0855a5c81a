/// Push constant blocks declared on a pipeline
///
/// Blocks are laid out back to back in declaration order, each starting on a
/// 4-byte boundary. The layout is frozen once the pipeline is initialized.

use crate::device::{PushConstantRange, ShaderStageFlags};
use crate::engine_warn;
use crate::error::{Error, Result};

/// Push constant space every device guarantees
pub const GUARANTEED_PUSH_CONSTANT_BYTES: u32 = 128;

/// One push constant block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantBlock {
    pub binding: u32,
    pub offset: u32,
    pub size: u32,
    pub stages: ShaderStageFlags,
}

/// Push constant blocks of one pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushConstants {
    blocks: Vec<PushConstantBlock>,
    total_size: u32,
}

impl PushConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block of `size` bytes visible to `stages`
    pub fn add(&mut self, binding: u32, size: u32, stages: ShaderStageFlags) -> Result<()> {
        if self.blocks.iter().any(|b| b.binding == binding) {
            return Err(Error::contract(
                "Pipeline",
                format!("push constant binding {} declared twice", binding),
            ));
        }
        if size == 0 || size % 4 != 0 {
            return Err(Error::contract(
                "Pipeline",
                format!("push constant size {} must be a non-zero multiple of 4", size),
            ));
        }
        if stages.is_empty() {
            return Err(Error::contract("Pipeline", "push constant block with no stages"));
        }

        let offset = self.total_size;
        self.total_size = offset.checked_add(size).ok_or_else(|| {
            Error::contract(
                "Pipeline",
                format!("push constant block {} of {} bytes overflows the push range", binding, size),
            )
        })?;
        if self.total_size > GUARANTEED_PUSH_CONSTANT_BYTES {
            engine_warn!(
                "galaxy3d::Pipeline",
                "Push constants use {} bytes; only {} are guaranteed",
                self.total_size,
                GUARANTEED_PUSH_CONSTANT_BYTES
            );
        }
        self.blocks.push(PushConstantBlock { binding, offset, size, stages });
        Ok(())
    }

    /// Block declared with `binding`
    pub fn block(&self, binding: u32) -> Result<&PushConstantBlock> {
        self.blocks.iter().find(|b| b.binding == binding).ok_or_else(|| {
            Error::contract("Pipeline", format!("no push constant block with binding {}", binding))
        })
    }

    /// Ranges for the pipeline layout
    pub fn ranges(&self) -> Vec<PushConstantRange> {
        self.blocks
            .iter()
            .map(|b| PushConstantRange {
                stages: b.stages,
                offset: b.offset,
                size: b.size,
            })
            .collect()
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
#[path = "push_constants_tests.rs"]
mod tests;
