/// Swapchain parameter negotiation
///
/// Pure functions over `SurfaceCapabilities`, kept apart from the swapchain
/// object so every choice can be tested without a device.

use crate::device::{ColorSpace, Extent2D, Format, PresentMode, SurfaceCapabilities, SurfaceFormat};
use crate::engine_debug;
use crate::error::{Error, Result};

/// Preferred swapchain format
pub const PREFERRED_SURFACE_FORMAT: SurfaceFormat = SurfaceFormat {
    format: Format::B8G8R8A8_SRGB,
    color_space: ColorSpace::SrgbNonlinear,
};

/// Pick B8G8R8A8_SRGB + sRGB-nonlinear if offered, else the first format
pub fn choose_surface_format(formats: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    if formats.contains(&PREFERRED_SURFACE_FORMAT) {
        return Ok(PREFERRED_SURFACE_FORMAT);
    }
    match formats.first() {
        Some(format) => {
            engine_debug!("galaxy3d::Swapchain", "Preferred format unavailable, using {:?}", format);
            Ok(*format)
        }
        None => Err(Error::InitializationFailed("surface reports no formats".to_string())),
    }
}

/// Pick Mailbox if offered, else Fifo (always supported)
pub fn choose_present_mode(modes: &[PresentMode]) -> PresentMode {
    if modes.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

/// Use the surface's current extent when defined, else clamp the framebuffer size
pub fn choose_extent(capabilities: &SurfaceCapabilities, framebuffer_size: Extent2D) -> Extent2D {
    if let Some(current) = capabilities.current_extent {
        return current;
    }
    Extent2D {
        width: framebuffer_size.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer_size.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// `min_image_count + 1`, clamped to the maximum (0 = unbounded)
pub fn choose_image_count(capabilities: &SurfaceCapabilities) -> u32 {
    let preferred = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Frames in flight never exceed the presentable images
pub fn clamp_frames_in_flight(requested: usize, image_count: usize) -> usize {
    requested.min(image_count).max(1)
}

#[cfg(test)]
#[path = "negotiation_tests.rs"]
mod tests;
