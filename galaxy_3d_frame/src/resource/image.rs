/// Image2d and Sampler - owned GPU images and samplers

use std::sync::Arc;

use crate::device::{
    DeviceContext, Extent2D, Format, ImageAspect, ImageDesc, ImageHandle, ImageUsage,
    ImageViewHandle, SamplerDesc, SamplerHandle,
};
use crate::error::Result;

/// Device-local 2D image with a full view
///
/// Image, memory and view share one lifetime. If view creation fails the
/// image is released before the error is returned.
pub struct Image2d {
    ctx: Arc<DeviceContext>,
    image: ImageHandle,
    view: ImageViewHandle,
    format: Format,
    extent: Extent2D,
    usage: ImageUsage,
}

impl Image2d {
    /// Create an image and its view
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context
    /// * `name` - Debug name
    /// * `extent` - Size in pixels (must be non-zero)
    /// * `format` - Pixel format; depth formats get a depth view
    /// * `usage` - Usage flags
    pub fn new(
        ctx: Arc<DeviceContext>,
        name: &str,
        extent: Extent2D,
        format: Format,
        usage: ImageUsage,
    ) -> Result<Self> {
        let device = ctx.device();
        let image = device.create_image(&ImageDesc {
            name: name.to_string(),
            extent,
            format,
            usage,
            mip_levels: 1,
            array_layers: 1,
        })?;

        let view = match device.create_image_view(image, format, ImageAspect::for_format(format)) {
            Ok(view) => view,
            Err(e) => {
                device.destroy_image(image);
                return Err(e);
            }
        };

        Ok(Self { ctx, image, view, format, extent, usage })
    }

    /// Depth attachment image
    pub fn depth(ctx: Arc<DeviceContext>, extent: Extent2D, format: Format) -> Result<Self> {
        Self::new(ctx, "depth", extent, format, ImageUsage::DEPTH_STENCIL_ATTACHMENT)
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn view(&self) -> ImageViewHandle {
        self.view
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn usage(&self) -> ImageUsage {
        self.usage
    }
}

impl Drop for Image2d {
    fn drop(&mut self) {
        let device = self.ctx.device();
        device.destroy_image_view(self.view);
        device.destroy_image(self.image);
    }
}

/// Owned sampler
pub struct Sampler {
    ctx: Arc<DeviceContext>,
    handle: SamplerHandle,
}

impl Sampler {
    pub fn new(ctx: Arc<DeviceContext>, desc: &SamplerDesc) -> Result<Self> {
        let handle = ctx.device().create_sampler(desc)?;
        Ok(Self { ctx, handle })
    }

    pub fn handle(&self) -> SamplerHandle {
        self.handle
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.ctx.device().destroy_sampler(self.handle);
    }
}
