/// Swapchain - presentable image chain and its lifecycle
///
/// Negotiates format, present mode, extent and image count with the surface,
/// owns one view per image and tracks which frame fence last used each image.
/// Recreation re-derives everything from the surface; nothing survives a
/// resize except the requested frames-in-flight count.

use std::sync::Arc;

use crate::device::{
    DeviceContext, Extent2D, FenceHandle, Format, ImageAspect, ImageHandle, ImageViewHandle,
    PresentMode, QueueHandle, SurfaceFormat, SwapchainCreateInfo, SwapchainHandle,
    SwapchainStatus, WindowSurface,
};
use crate::error::{Error, Result};
use crate::swapchain::negotiation::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    clamp_frames_in_flight,
};
use crate::sync::{Fence, Semaphore, INFINITE_TIMEOUT};
use crate::{engine_contract, engine_info, engine_warn};

/// Native objects produced by one negotiation round
struct Chain {
    handle: SwapchainHandle,
    images: Vec<ImageHandle>,
    views: Vec<ImageViewHandle>,
    surface_format: SurfaceFormat,
    extent: Extent2D,
    present_mode: PresentMode,
}

/// Swapchain
pub struct Swapchain {
    ctx: Arc<DeviceContext>,
    chain: Chain,
    /// Fence of the frame that last rendered into each image
    images_in_flight: Vec<Option<FenceHandle>>,
    requested_frames_in_flight: usize,
    frames_in_flight: usize,
    active_image: u32,
}

impl Swapchain {
    /// Create the swapchain
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context
    /// * `surface` - Window backing the presentation surface
    /// * `requested_frames_in_flight` - Clamped to the achieved image count
    pub fn new(
        ctx: Arc<DeviceContext>,
        surface: &dyn WindowSurface,
        requested_frames_in_flight: usize,
    ) -> Result<Self> {
        if requested_frames_in_flight == 0 {
            return Err(engine_contract!("Swapchain", "frames in flight must be at least 1"));
        }

        let chain = Self::build(&ctx, surface, SwapchainHandle::NULL)?;
        let image_count = chain.images.len();
        let frames_in_flight = clamp_frames_in_flight(requested_frames_in_flight, image_count);
        if frames_in_flight < requested_frames_in_flight {
            engine_warn!(
                "galaxy3d::Swapchain",
                "Requested {} frames in flight but only {} images; using {}",
                requested_frames_in_flight,
                image_count,
                frames_in_flight
            );
        }

        Ok(Self {
            ctx,
            chain,
            images_in_flight: vec![None; image_count],
            requested_frames_in_flight,
            frames_in_flight,
            active_image: 0,
        })
    }

    /// Wait until the surface is non-zero, then return its capabilities-derived extent
    fn wait_for_surface(ctx: &DeviceContext, surface: &dyn WindowSurface) -> Result<Extent2D> {
        loop {
            let size = surface.framebuffer_size();
            if !size.is_zero() {
                let capabilities = ctx.device().surface_capabilities()?;
                let extent = choose_extent(&capabilities, size);
                if !extent.is_zero() {
                    return Ok(extent);
                }
            }
            surface.wait_events();
        }
    }

    fn build(ctx: &DeviceContext, surface: &dyn WindowSurface, old: SwapchainHandle) -> Result<Chain> {
        Self::wait_for_surface(ctx, surface)?;

        let device = ctx.device();
        let capabilities = device.surface_capabilities()?;
        let surface_format = choose_surface_format(&capabilities.formats)?;
        let present_mode = choose_present_mode(&capabilities.present_modes);
        let extent = choose_extent(&capabilities, surface.framebuffer_size());
        let min_image_count = choose_image_count(&capabilities);

        let handle = device.create_swapchain(&SwapchainCreateInfo {
            min_image_count,
            surface_format,
            extent,
            present_mode,
            old_swapchain: old,
        })?;

        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                device.destroy_swapchain(handle);
                return Err(e);
            }
        };

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            match device.create_image_view(image, surface_format.format, ImageAspect::Color) {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in views {
                        device.destroy_image_view(view);
                    }
                    device.destroy_swapchain(handle);
                    return Err(e);
                }
            }
        }

        engine_info!(
            "galaxy3d::Swapchain",
            "Created {}x{} swapchain: {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            images.len(),
            surface_format.format,
            present_mode
        );

        Ok(Chain { handle, images, views, surface_format, extent, present_mode })
    }

    fn destroy_views(&mut self) {
        for view in self.chain.views.drain(..) {
            self.ctx.device().destroy_image_view(view);
        }
    }

    /// Rebuild after a resize or an out-of-date result
    ///
    /// Blocks while the window is minimized, then waits for the device to go
    /// idle before touching any image still referenced by in-flight work.
    pub fn recreate(&mut self, surface: &dyn WindowSurface) -> Result<()> {
        Self::wait_for_surface(&self.ctx, surface)?;
        self.ctx.wait_idle()?;

        self.destroy_views();
        let old = self.chain.handle;
        let chain = match Self::build(&self.ctx, surface, old) {
            Ok(chain) => chain,
            Err(e) => {
                self.ctx.device().destroy_swapchain(old);
                self.chain.handle = SwapchainHandle::NULL;
                self.chain.images.clear();
                return Err(e);
            }
        };
        self.ctx.device().destroy_swapchain(old);

        let image_count = chain.images.len();
        self.chain = chain;
        self.images_in_flight = vec![None; image_count];
        self.frames_in_flight = clamp_frames_in_flight(self.requested_frames_in_flight, image_count);
        self.active_image = 0;
        Ok(())
    }

    /// Wait on `fence`, then acquire the next image signaling `semaphore`
    ///
    /// The fence wait bounds how far the CPU can run ahead of the GPU.
    pub fn acquire_next_image(&mut self, fence: &Fence, semaphore: &Semaphore) -> Result<SwapchainStatus> {
        if self.chain.handle.is_null() {
            return Err(engine_contract!("Swapchain", "acquire_next_image() after a failed recreate"));
        }
        fence.wait()?;

        let (index, status) = self.ctx.device().acquire_next_image(
            self.chain.handle,
            INFINITE_TIMEOUT,
            semaphore.handle(),
        )?;
        if status != SwapchainStatus::OutOfDate {
            self.active_image = index;
        }
        Ok(status)
    }

    /// Present the active image once `wait` is signaled
    pub fn present_to_queue(&self, queue: QueueHandle, wait: &Semaphore) -> Result<SwapchainStatus> {
        self.ctx
            .device()
            .queue_present(queue, self.chain.handle, self.active_image, wait.handle())
    }

    /// Wait for the previous frame that rendered into `image`, then hand it to `fence`
    ///
    /// Images and frame slots differ in number, so the image may still be in
    /// use by a slot other than the current one.
    pub fn wait_for_image(&mut self, image: u32, fence: &Fence) -> Result<()> {
        let slot = match self.images_in_flight.get_mut(image as usize) {
            Some(slot) => slot,
            None => {
                return Err(Error::contract(
                    "Swapchain",
                    format!("image index {} out of range ({} images)", image, self.chain.images.len()),
                ))
            }
        };
        if let Some(previous) = *slot {
            if previous != fence.handle() {
                self.ctx.device().wait_for_fences(&[previous], INFINITE_TIMEOUT)?;
            }
        }
        *slot = Some(fence.handle());
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn handle(&self) -> SwapchainHandle {
        self.chain.handle
    }

    /// Width / height of the current extent
    pub fn aspect_ratio(&self) -> f32 {
        if self.chain.extent.height == 0 {
            return 1.0;
        }
        self.chain.extent.width as f32 / self.chain.extent.height as f32
    }

    pub fn image_count(&self) -> usize {
        self.chain.images.len()
    }

    pub fn extent(&self) -> Extent2D {
        self.chain.extent
    }

    pub fn format(&self) -> Format {
        self.chain.surface_format.format
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.chain.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.chain.present_mode
    }

    pub fn images(&self) -> &[ImageHandle] {
        &self.chain.images
    }

    pub fn image_views(&self) -> &[ImageViewHandle] {
        &self.chain.views
    }

    /// Index returned by the last successful acquire
    pub fn active_image_index(&self) -> u32 {
        self.active_image
    }

    /// Effective frames in flight (requested, clamped to the image count)
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            engine_warn!("galaxy3d::Swapchain", "wait_idle failed during teardown: {}", e);
        }
        self.destroy_views();
        if !self.chain.handle.is_null() {
            self.ctx.device().destroy_swapchain(self.chain.handle);
        }
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
