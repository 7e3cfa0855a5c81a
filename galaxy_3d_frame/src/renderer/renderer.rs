/// Renderer - frame-pacing loop and swapchain recreation path
///
/// Owns the swapchain, the render passes, one command buffer and one
/// sync slot per frame in flight, the descriptor allocator and layout cache,
/// and the subrender registry. Each `render_frame` call:
///
/// 1. waits the slot fence and acquires an image (out of date: recreate, skip)
/// 2. waits whichever earlier frame still uses that image
/// 3. records every pass, subpass by subpass, with the subrenders of each stage
/// 4. submits, presents, and advances the slot ring once
///
/// No global state: everything is reached through the renderer or its
/// `Arc<DeviceContext>`.

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::config::Config;
use crate::descriptor::{DescriptorAllocator, DescriptorLayoutCache};
use crate::device::{DeviceContext, SwapchainStatus, WindowSurface};
use crate::engine_contract;
use crate::error::{Error, Result};
use crate::pipeline::PipelineStage;
use crate::render_graph::RenderPass;
use crate::renderer::{FrameContext, SubrenderInit, SubrenderLifecycle, SubrenderRegistry};
use crate::swapchain::Swapchain;
use crate::sync::FrameSync;
use crate::{engine_debug, engine_info, engine_warn};

/// Counters accumulated since the renderer was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_submitted: u64,
    /// Frames dropped because the acquired image was out of date
    pub frames_skipped: u64,
    pub swapchain_recreations: u64,
    pub descriptor_pools_created: usize,
}

/// Outcome of one `render_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Nothing was submitted; the swapchain was recreated instead
    Skipped,
}

/// Frame renderer
pub struct Renderer {
    // Field order is drop order: subrenders release pipelines before the
    // layout cache, passes release framebuffers before the swapchain views.
    registry: SubrenderRegistry,
    render_passes: Vec<RenderPass>,
    command_buffers: Vec<CommandBuffer>,
    frame_sync: FrameSync,
    descriptor_allocator: DescriptorAllocator,
    layout_cache: DescriptorLayoutCache,
    swapchain: Swapchain,
    surface: Arc<dyn WindowSurface>,
    ctx: Arc<DeviceContext>,
    framebuffer_resized: bool,
    initialized: bool,
    shut_down: bool,
    stats: FrameStats,
}

impl Renderer {
    /// Create the swapchain and the per-frame objects
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context
    /// * `surface` - Window backing the presentation surface
    /// * `config` - Frames in flight and descriptor pool sizing
    pub fn new(ctx: Arc<DeviceContext>, surface: Arc<dyn WindowSurface>, config: &Config) -> Result<Self> {
        config.validate()?;

        let swapchain = Swapchain::new(ctx.clone(), surface.as_ref(), config.frames_in_flight)?;
        let frames = swapchain.frames_in_flight();
        let frame_sync = FrameSync::new(&ctx, frames)?;
        let command_buffers = create_command_buffers(&ctx, frames)?;

        engine_info!(
            "galaxy3d::Renderer",
            "Renderer created: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            frames
        );

        Ok(Self {
            registry: SubrenderRegistry::new(),
            render_passes: Vec::new(),
            command_buffers,
            frame_sync,
            descriptor_allocator: DescriptorAllocator::new(ctx.clone(), config.descriptor_pool.clone()),
            layout_cache: DescriptorLayoutCache::new(ctx.clone()),
            swapchain,
            surface,
            ctx,
            framebuffer_resized: false,
            initialized: false,
            shut_down: false,
            stats: FrameStats::default(),
        })
    }

    /// Append a render pass; its index is the `render_pass` of a `PipelineStage`
    ///
    /// Passes are recorded in the order they were added.
    pub fn add_render_pass(&mut self, render_pass: RenderPass) -> Result<usize> {
        if self.initialized {
            return Err(engine_contract!(
                "Renderer",
                "add_render_pass() after initialize(); the pass list is frozen"
            ));
        }
        self.render_passes.push(render_pass);
        Ok(self.render_passes.len() - 1)
    }

    /// Build the render passes, then every registered subrender
    pub fn initialize(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(engine_contract!("Renderer", "initialize() after shutdown()"));
        }
        if self.initialized {
            return Err(engine_contract!("Renderer", "initialize() called twice"));
        }
        if self.render_passes.is_empty() {
            return Err(engine_contract!("Renderer", "initialize() without any render pass"));
        }

        for render_pass in &mut self.render_passes {
            render_pass.initialize(self.ctx.clone(), &self.swapchain)?;
        }
        self.initialized = true;
        self.initialize_subrenders()?;

        engine_info!(
            "galaxy3d::Renderer",
            "Initialized {} render pass(es), {} subrender(s)",
            self.render_passes.len(),
            self.registry.len()
        );
        Ok(())
    }

    /// Initialize every subrender that is not currently initialized
    fn initialize_subrenders(&mut self) -> Result<()> {
        let keys = self.registry.keys().to_vec();
        for key in keys {
            let Some(entry) = self.registry.entry_mut(key) else {
                continue;
            };
            if entry.lifecycle == SubrenderLifecycle::Initialized {
                continue;
            }

            let stage = entry.stage;
            let render_pass = self.render_passes.get(stage.render_pass).ok_or_else(|| {
                Error::contract(
                    "Renderer",
                    format!(
                        "subrender '{}' targets render pass {} ({} passes)",
                        entry.name,
                        stage.render_pass,
                        self.render_passes.len()
                    ),
                )
            })?;
            if stage.subpass as usize >= render_pass.subpasses().len() {
                return Err(Error::contract(
                    "Renderer",
                    format!(
                        "subrender '{}' targets subpass {} of pass {} ({} subpasses)",
                        entry.name,
                        stage.subpass,
                        stage.render_pass,
                        render_pass.subpasses().len()
                    ),
                ));
            }

            let mut init = SubrenderInit {
                ctx: &self.ctx,
                swapchain: &self.swapchain,
                render_pass,
                layout_cache: &mut self.layout_cache,
                descriptor_allocator: &mut self.descriptor_allocator,
                stage,
                frames_in_flight: self.frame_sync.len(),
            };
            entry.subrender.initialize(&mut init)?;
            entry.lifecycle = SubrenderLifecycle::Initialized;
            engine_debug!("galaxy3d::Renderer", "Subrender '{}' initialized", entry.name);
        }
        Ok(())
    }

    /// Render and present one frame
    pub fn render_frame(&mut self) -> Result<FrameStatus> {
        if self.shut_down {
            return Err(engine_contract!("Renderer", "render_frame() after shutdown()"));
        }
        if !self.initialized {
            return Err(engine_contract!("Renderer", "render_frame() before initialize()"));
        }
        if self.framebuffer_resized {
            self.recreate()?;
        }
        // Subrenders registered since the last frame
        self.initialize_subrenders()?;

        let frame_index = self.frame_sync.index();
        let slot = self.frame_sync.current();

        let acquired = self.swapchain.acquire_next_image(&slot.in_flight, &slot.image_available)?;
        if acquired == SwapchainStatus::OutOfDate {
            engine_debug!("galaxy3d::Renderer", "Acquired image out of date; frame skipped");
            self.stats.frames_skipped += 1;
            self.recreate()?;
            return Ok(FrameStatus::Skipped);
        }

        let image_index = self.swapchain.active_image_index();
        self.swapchain.wait_for_image(image_index, &slot.in_flight)?;

        let cmd = &mut self.command_buffers[frame_index];
        cmd.begin()?;
        for (pass_index, render_pass) in self.render_passes.iter().enumerate() {
            render_pass.begin(cmd, image_index)?;
            let frame = FrameContext {
                ctx: &self.ctx,
                swapchain: &self.swapchain,
                render_pass,
                frame_index,
                image_index,
            };
            for subpass in 0..render_pass.subpasses().len() as u32 {
                if subpass > 0 {
                    render_pass.next_subpass(cmd)?;
                }
                for key in self.registry.keys_for_stage(PipelineStage::new(pass_index, subpass)) {
                    if let Some(entry) = self.registry.entry_mut(key) {
                        if entry.lifecycle == SubrenderLifecycle::Initialized {
                            entry.subrender.render(cmd, &frame)?;
                        }
                    }
                }
            }
            render_pass.end(cmd)?;
        }

        cmd.submit(
            Some(&slot.in_flight),
            Some(&slot.image_available),
            Some(&slot.render_finished),
        )?;
        let presented = self
            .swapchain
            .present_to_queue(self.ctx.present_queue(), &slot.render_finished)?;

        self.frame_sync.advance();
        self.stats.frames_submitted += 1;

        if acquired.needs_recreate() || presented.needs_recreate() || self.framebuffer_resized {
            engine_debug!(
                "galaxy3d::Renderer",
                "Recreating after present (acquire {:?}, present {:?}, resized {})",
                acquired,
                presented,
                self.framebuffer_resized
            );
            self.recreate()?;
        }
        Ok(FrameStatus::Presented)
    }

    /// Record that the window framebuffer changed size
    ///
    /// Recreation happens on the next frame boundary, not here.
    pub fn notify_resize(&mut self, width: u32, height: u32) {
        engine_debug!("galaxy3d::Renderer", "Resize notified: {}x{}", width, height);
        self.framebuffer_resized = true;
    }

    /// Rebuild everything derived from the swapchain
    ///
    /// Blocks while the window is minimized. Subrenders are cleaned up and
    /// initialized again, and descriptor pools are reset in between.
    pub fn recreate(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(engine_contract!("Renderer", "recreate() after shutdown()"));
        }
        self.ctx.wait_idle()?;
        self.registry.cleanup_all();

        self.swapchain.recreate(self.surface.as_ref())?;
        for render_pass in &mut self.render_passes {
            if render_pass.is_initialized() {
                render_pass.recreate(&self.swapchain)?;
            }
        }

        let frames = self.swapchain.frames_in_flight();
        if frames != self.frame_sync.len() {
            engine_info!(
                "galaxy3d::Renderer",
                "Frames in flight {} -> {}; rebuilding frame sync",
                self.frame_sync.len(),
                frames
            );
            self.command_buffers.clear();
            self.frame_sync = FrameSync::new(&self.ctx, frames)?;
            self.command_buffers = create_command_buffers(&self.ctx, frames)?;
        }

        self.descriptor_allocator.reset_pools()?;
        if self.initialized {
            self.initialize_subrenders()?;
        }

        self.framebuffer_resized = false;
        self.stats.swapchain_recreations += 1;

        let extent = self.swapchain.extent();
        engine_info!(
            "galaxy3d::Renderer",
            "Swapchain recreated: {}x{}, {} images",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }

    /// Wait for the GPU and clean up every subrender
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        if let Err(e) = self.ctx.wait_idle() {
            engine_warn!("galaxy3d::Renderer", "wait_idle failed during shutdown: {}", e);
        }
        self.registry.cleanup_all();
        self.shut_down = true;
        engine_info!(
            "galaxy3d::Renderer",
            "Renderer shut down after {} frames",
            self.stats.frames_submitted
        );
    }

    // ===== ACCESSORS =====

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            descriptor_pools_created: self.descriptor_allocator.pools_created(),
            ..self.stats
        }
    }

    pub fn ctx(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn render_pass(&self, index: usize) -> Option<&RenderPass> {
        self.render_passes.get(index)
    }

    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    pub fn registry(&self) -> &SubrenderRegistry {
        &self.registry
    }

    /// Register or remove subrenders; new ones are initialized on the next frame
    pub fn registry_mut(&mut self) -> &mut SubrenderRegistry {
        &mut self.registry
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frame_sync.len()
    }

    /// Slot of the next frame to be rendered
    pub fn frame_index(&self) -> usize {
        self.frame_sync.index()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_resize_pending(&self) -> bool {
        self.framebuffer_resized
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn create_command_buffers(ctx: &Arc<DeviceContext>, frames: usize) -> Result<Vec<CommandBuffer>> {
    (0..frames)
        .map(|_| CommandBuffer::new(ctx.clone(), false))
        .collect()
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
