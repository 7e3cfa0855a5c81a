/// Subrender trait - one unit of drawing work bound to a render pass stage
///
/// A subrender owns its pipelines, descriptor sets and per-frame buffers.
/// The renderer drives it through three calls:
/// - `initialize`: build GPU objects against the current swapchain and pass
/// - `render`: record commands for one frame inside its subpass
/// - `cleanup`: drop every GPU object before a recreation or shutdown
///
/// `initialize` runs again after each swapchain recreation, so it must not
/// assume it is only called once.

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::descriptor::{DescriptorAllocator, DescriptorLayoutCache};
use crate::device::DeviceContext;
use crate::error::Result;
use crate::pipeline::PipelineStage;
use crate::render_graph::RenderPass;
use crate::swapchain::Swapchain;

/// Everything a subrender may touch while building its GPU objects
pub struct SubrenderInit<'a> {
    pub ctx: &'a Arc<DeviceContext>,
    pub swapchain: &'a Swapchain,
    /// Render pass selected by `stage.render_pass`
    pub render_pass: &'a RenderPass,
    pub layout_cache: &'a mut DescriptorLayoutCache,
    /// Sets allocated here are released by the pool reset of the next
    /// recreation; drop them in `cleanup`
    pub descriptor_allocator: &'a mut DescriptorAllocator,
    pub stage: PipelineStage,
    /// Number of per-frame copies to keep (uniform rings, per-frame sets)
    pub frames_in_flight: usize,
}

/// Per-frame view handed to `Subrender::render`
pub struct FrameContext<'a> {
    pub ctx: &'a Arc<DeviceContext>,
    pub swapchain: &'a Swapchain,
    pub render_pass: &'a RenderPass,
    /// Frame slot in `0..frames_in_flight`
    pub frame_index: usize,
    /// Swapchain image being rendered
    pub image_index: u32,
}

/// Unit of drawing work registered with the renderer
pub trait Subrender: Send {
    fn initialize(&mut self, init: &mut SubrenderInit<'_>) -> Result<()>;

    /// Record this subrender's commands; the pass and subpass are already begun
    fn render(&mut self, cmd: &mut CommandBuffer, frame: &FrameContext<'_>) -> Result<()>;

    fn cleanup(&mut self);
}
