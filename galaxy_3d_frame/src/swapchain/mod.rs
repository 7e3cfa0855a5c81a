/// Swapchain module - negotiation and lifecycle of the presentable image chain

pub mod negotiation;
pub mod swapchain;

pub use negotiation::*;
pub use swapchain::*;
