//! Startup configuration
//!
//! Resolved once when the device context and renderer are built. Frames-in-flight
//! and validation toggling are the only knobs that reach the frame loop; the
//! descriptor pool sizing feeds [`DescriptorAllocator`](crate::descriptor::DescriptorAllocator).

use crate::device::DescriptorType;
use crate::error::{Error, Result};

/// Severity threshold of validation-layer messages forwarded to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything including verbose info
    All,
}

/// Sizing policy of descriptor pools
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorPoolConfig {
    /// Maximum sets per pool; every ratio below is scaled by this multiplier
    pub sets_per_pool: u32,
    /// Descriptors of each type per set
    pub pool_ratios: Vec<(DescriptorType, f32)>,
    /// Hard cap on the number of pools (None = unbounded)
    pub max_pools: Option<usize>,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            sets_per_pool: 1000,
            pool_ratios: vec![
                (DescriptorType::Sampler, 0.5),
                (DescriptorType::CombinedImageSampler, 4.0),
                (DescriptorType::SampledImage, 4.0),
                (DescriptorType::StorageImage, 1.0),
                (DescriptorType::UniformBuffer, 2.0),
                (DescriptorType::StorageBuffer, 2.0),
                (DescriptorType::UniformBufferDynamic, 1.0),
                (DescriptorType::StorageBufferDynamic, 1.0),
                (DescriptorType::InputAttachment, 0.5),
            ],
            max_pools: None,
        }
    }
}

/// Frame core configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Requested frames in flight (clamped to the swapchain image count)
    pub frames_in_flight: usize,
    /// Enable the backend validation layer
    pub enable_validation: bool,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Validation message threshold
    pub debug_severity: DebugSeverity,
    /// Descriptor pool sizing
    pub descriptor_pool: DescriptorPoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            app_name: "Galaxy3D Application".to_string(),
            app_version: (1, 0, 0),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            descriptor_pool: DescriptorPoolConfig::default(),
        }
    }
}

impl Config {
    /// Reject configurations the frame loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.descriptor_pool.sets_per_pool == 0 {
            return Err(Error::InitializationFailed(
                "descriptor_pool.sets_per_pool must be at least 1".to_string(),
            ));
        }
        if self.descriptor_pool.max_pools == Some(0) {
            return Err(Error::InitializationFailed(
                "descriptor_pool.max_pools must allow at least one pool".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
