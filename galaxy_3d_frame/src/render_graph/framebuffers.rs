/// Framebuffers - one framebuffer per swapchain image
///
/// Attachment `i` of every framebuffer is the view backing the pass's
/// attachment `i`: the per-image swapchain view, the shared depth view, or a
/// pass-owned image created here.

use std::sync::Arc;

use crate::device::{DeviceContext, Extent2D, FramebufferDesc, FramebufferHandle, ImageUsage, RenderPassHandle};
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::render_graph::{Attachment, AttachmentKind, Subpass};
use crate::resource::Image2d;
use crate::swapchain::Swapchain;

/// Framebuffers of one render pass
pub struct Framebuffers {
    ctx: Arc<DeviceContext>,
    framebuffers: Vec<FramebufferHandle>,
    /// Images backing `Image` attachments, by binding
    images: Vec<(u32, Image2d)>,
}

impl Framebuffers {
    pub(crate) fn new(
        ctx: Arc<DeviceContext>,
        render_pass: RenderPassHandle,
        attachments: &[Attachment],
        subpasses: &[Subpass],
        swapchain: &Swapchain,
        depth: Option<&Image2d>,
        extent: Extent2D,
    ) -> Result<Self> {
        let mut result = Self {
            ctx: ctx.clone(),
            framebuffers: Vec::with_capacity(swapchain.image_count()),
            images: Vec::new(),
        };

        for attachment in attachments.iter().filter(|a| a.kind() == AttachmentKind::Image) {
            let read_as_input = subpasses
                .iter()
                .any(|s| s.input_bindings().contains(&attachment.binding()));
            // Image attachments end the pass in ShaderReadOnlyOptimal, which needs SAMPLED
            let mut usage = ImageUsage::COLOR_ATTACHMENT | ImageUsage::STORAGE | ImageUsage::SAMPLED;
            if read_as_input {
                usage |= ImageUsage::INPUT_ATTACHMENT;
            }
            let image = Image2d::new(ctx.clone(), attachment.name(), extent, attachment.format(), usage)?;
            result.images.push((attachment.binding(), image));
        }

        for (index, &swapchain_view) in swapchain.image_views().iter().enumerate() {
            let mut views = Vec::with_capacity(attachments.len());
            for attachment in attachments {
                let view = match attachment.kind() {
                    AttachmentKind::Swapchain => swapchain_view,
                    AttachmentKind::Depth => match depth {
                        Some(depth) => depth.view(),
                        None => {
                            return Err(Error::contract(
                                "RenderPass",
                                format!("depth attachment '{}' has no depth image", attachment.name()),
                            ))
                        }
                    },
                    AttachmentKind::Image => match result.image(attachment.binding()) {
                        Some(image) => image.view(),
                        None => {
                            return Err(Error::contract(
                                "RenderPass",
                                format!("image attachment '{}' has no image", attachment.name()),
                            ))
                        }
                    },
                };
                views.push(view);
            }

            let framebuffer = ctx.device().create_framebuffer(&FramebufferDesc {
                render_pass,
                attachments: views,
                extent,
                layers: 1,
            })?;
            result.framebuffers.push(framebuffer);
            engine_debug!("galaxy3d::RenderPass", "Created framebuffer {} ({:?})", index, framebuffer);
        }

        Ok(result)
    }

    /// Framebuffer used with swapchain image `index`
    pub fn get(&self, index: usize) -> Option<FramebufferHandle> {
        self.framebuffers.get(index).copied()
    }

    pub fn handles(&self) -> &[FramebufferHandle] {
        &self.framebuffers
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Pass-owned image backing the `Image` attachment at `binding`
    pub fn image(&self, binding: u32) -> Option<&Image2d> {
        self.images.iter().find(|(b, _)| *b == binding).map(|(_, image)| image)
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            self.ctx.device().destroy_framebuffer(framebuffer);
        }
    }
}
