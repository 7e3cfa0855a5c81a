/// RenderPass - attachments, subpasses and their native objects
///
/// Declared once from an attachment list and a subpass list, then
/// `initialize`d against a swapchain. Initialization resolves the swapchain
/// format, creates the depth image when a depth attachment is declared,
/// builds the native pass and one framebuffer per swapchain image.
/// `recreate` throws all of that away and rebuilds it for the new swapchain.
///
/// The attachment list order is the native attachment index.

use std::sync::Arc;
use rustc_hash::FxHashSet;

use crate::command::CommandBuffer;
use crate::device::{
    AccessFlags, AttachmentDescription, AttachmentReference, ClearValue, DeviceContext, Extent2D,
    Format, FramebufferHandle, ImageLayout, ImageViewHandle, LoadOp, PipelineStageFlags, Rect2D,
    RenderPassBeginInfo, RenderPassDesc, RenderPassHandle, StoreOp, SubpassDependency,
    SubpassDescription, SubpassRef,
};
use crate::error::{Error, Result};
use crate::render_graph::{Attachment, AttachmentKind, Framebuffers, Subpass};
use crate::resource::Image2d;
use crate::swapchain::Swapchain;
use crate::{engine_contract, engine_info, engine_warn};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [Format; 5] = [
    Format::D32_SFLOAT_S8_UINT,
    Format::D32_SFLOAT,
    Format::D24_UNORM_S8_UINT,
    Format::D16_UNORM_S8_UINT,
    Format::D16_UNORM,
];

/// Objects that exist only between `initialize` and drop
struct PassResources {
    ctx: Arc<DeviceContext>,
    handle: RenderPassHandle,
    depth: Option<Image2d>,
    framebuffers: Option<Framebuffers>,
    render_area: Rect2D,
}

impl Drop for PassResources {
    fn drop(&mut self) {
        // Framebuffers reference the depth view and the pass
        drop(self.framebuffers.take());
        drop(self.depth.take());
        self.ctx.device().destroy_render_pass(self.handle);
    }
}

/// Render pass
pub struct RenderPass {
    attachments: Vec<Attachment>,
    subpasses: Vec<Subpass>,
    /// Declared render area; zero means "the swapchain extent"
    declared_area: Extent2D,
    /// Set by `initialize` and kept across failed rebuilds
    ctx: Option<Arc<DeviceContext>>,
    resources: Option<PassResources>,
}

impl RenderPass {
    /// Declare a render pass
    ///
    /// # Arguments
    ///
    /// * `attachments` - Attachments in native attachment order
    /// * `subpasses` - Subpasses in execution order, indexed `0..n`
    /// * `render_area` - Area rendered to; `Extent2D::default()` follows the swapchain
    pub fn new(attachments: Vec<Attachment>, subpasses: Vec<Subpass>, render_area: Extent2D) -> Self {
        let mut seen = FxHashSet::default();
        for attachment in &attachments {
            if !seen.insert(attachment.binding()) {
                engine_warn!(
                    "galaxy3d::RenderPass",
                    "Attachment '{}' reuses binding {}; lookups by binding are ambiguous",
                    attachment.name(),
                    attachment.binding()
                );
            }
        }

        Self {
            attachments,
            subpasses,
            declared_area: render_area,
            ctx: None,
            resources: None,
        }
    }

    /// Create the native pass, depth image and framebuffers for `swapchain`
    pub fn initialize(&mut self, ctx: Arc<DeviceContext>, swapchain: &Swapchain) -> Result<()> {
        if self.ctx.is_some() {
            return Err(engine_contract!("RenderPass", "initialize() called twice; use recreate()"));
        }
        self.resources = Some(self.build(ctx.clone(), swapchain)?);
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Rebuild every native object for a recreated swapchain
    ///
    /// A failed rebuild leaves the pass without native objects; calling
    /// `recreate` again retries it.
    pub fn recreate(&mut self, swapchain: &Swapchain) -> Result<()> {
        let ctx = match &self.ctx {
            Some(ctx) => ctx.clone(),
            None => return Err(engine_contract!("RenderPass", "recreate() before initialize()")),
        };
        // Old objects go first; on failure the pass stays empty until the next recreate
        drop(self.resources.take());
        self.resources = Some(self.build(ctx, swapchain)?);
        Ok(())
    }

    fn build(&self, ctx: Arc<DeviceContext>, swapchain: &Swapchain) -> Result<PassResources> {
        let area = if self.declared_area.is_zero() {
            swapchain.extent()
        } else {
            self.declared_area
        };

        let has_depth = self.attachments.iter().any(|a| a.kind() == AttachmentKind::Depth);
        let depth_format = if has_depth {
            Some(select_depth_format(&ctx)?)
        } else {
            None
        };

        let desc = self.native_desc(swapchain.format(), depth_format)?;
        let handle = ctx.device().create_render_pass(&desc)?;
        // From here on, dropping `resources` releases everything created so far
        let mut resources = PassResources {
            ctx: ctx.clone(),
            handle,
            depth: None,
            framebuffers: None,
            render_area: Rect2D::from_extent(area),
        };

        if let Some(format) = depth_format {
            resources.depth = Some(Image2d::depth(ctx.clone(), area, format)?);
        }

        resources.framebuffers = Some(Framebuffers::new(
            ctx,
            handle,
            &self.attachments,
            &self.subpasses,
            swapchain,
            resources.depth.as_ref(),
            area,
        )?);

        engine_info!(
            "galaxy3d::RenderPass",
            "Render pass {:?}: {} attachments, {} subpasses, {}x{}",
            handle,
            self.attachments.len(),
            self.subpasses.len(),
            area.width,
            area.height
        );

        Ok(resources)
    }

    /// Native attachment index of `binding`
    fn attachment_index(&self, binding: u32) -> Result<u32> {
        self.attachments
            .iter()
            .position(|a| a.binding() == binding)
            .map(|index| index as u32)
            .ok_or_else(|| {
                Error::contract("RenderPass", format!("no attachment with binding {}", binding))
            })
    }

    fn native_desc(&self, swapchain_format: Format, depth_format: Option<Format>) -> Result<RenderPassDesc> {
        let attachments = self
            .attachments
            .iter()
            .map(|attachment| {
                let (format, store_op, final_layout) = match attachment.kind() {
                    AttachmentKind::Swapchain => (swapchain_format, StoreOp::Store, ImageLayout::PresentSrc),
                    AttachmentKind::Depth => (
                        depth_format.unwrap_or(Format::Undefined),
                        StoreOp::DontCare,
                        ImageLayout::DepthStencilAttachmentOptimal,
                    ),
                    AttachmentKind::Image => (attachment.format(), StoreOp::Store, ImageLayout::ShaderReadOnlyOptimal),
                };
                AttachmentDescription {
                    format,
                    samples: 1,
                    load_op: LoadOp::Clear,
                    store_op,
                    stencil_load_op: LoadOp::DontCare,
                    stencil_store_op: StoreOp::DontCare,
                    initial_layout: ImageLayout::Undefined,
                    final_layout,
                }
            })
            .collect();

        let mut subpasses = Vec::with_capacity(self.subpasses.len());
        for (position, subpass) in self.subpasses.iter().enumerate() {
            if subpass.index() as usize != position {
                return Err(Error::contract(
                    "RenderPass",
                    format!("subpass at position {} declares index {}", position, subpass.index()),
                ));
            }

            let mut native = SubpassDescription::default();
            for &binding in subpass.attachment_bindings() {
                let index = self.attachment_index(binding)?;
                if self.attachments[index as usize].kind() == AttachmentKind::Depth {
                    if native.depth_attachment.is_some() {
                        return Err(Error::contract(
                            "RenderPass",
                            format!("subpass {} references more than one depth attachment", position),
                        ));
                    }
                    native.depth_attachment = Some(AttachmentReference {
                        attachment: index,
                        layout: ImageLayout::DepthStencilAttachmentOptimal,
                    });
                } else {
                    native.color_attachments.push(AttachmentReference {
                        attachment: index,
                        layout: ImageLayout::ColorAttachmentOptimal,
                    });
                }
            }
            for &binding in subpass.input_bindings() {
                native.input_attachments.push(AttachmentReference {
                    attachment: self.attachment_index(binding)?,
                    layout: ImageLayout::ShaderReadOnlyOptimal,
                });
            }
            subpasses.push(native);
        }

        Ok(RenderPassDesc {
            attachments,
            subpasses,
            dependencies: chain_dependencies(self.subpasses.len() as u32),
        })
    }

    // ===== ACCESSORS =====

    /// Attachment declared with `binding`
    pub fn get_attachment(&self, binding: u32) -> Result<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.binding() == binding)
            .ok_or_else(|| Error::contract("RenderPass", format!("no attachment with binding {}", binding)))
    }

    /// Attachment declared with `name`
    pub fn get_attachment_by_name(&self, name: &str) -> Result<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| Error::contract("RenderPass", format!("no attachment named '{}'", name)))
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn subpasses(&self) -> &[Subpass] {
        &self.subpasses
    }

    /// Color attachments written by `subpass`
    pub fn color_attachment_count(&self, subpass: u32) -> u32 {
        self.subpasses
            .get(subpass as usize)
            .map(|s| {
                s.attachment_bindings()
                    .iter()
                    .filter(|&&b| {
                        self.attachments
                            .iter()
                            .any(|a| a.binding() == b && a.kind() != AttachmentKind::Depth)
                    })
                    .count() as u32
            })
            .unwrap_or(0)
    }

    /// Whether `subpass` writes a depth attachment
    pub fn subpass_has_depth(&self, subpass: u32) -> bool {
        self.subpasses
            .get(subpass as usize)
            .map(|s| {
                s.attachment_bindings().iter().any(|&b| {
                    self.attachments
                        .iter()
                        .any(|a| a.binding() == b && a.kind() == AttachmentKind::Depth)
                })
            })
            .unwrap_or(false)
    }

    /// Whether `initialize` succeeded; stays true after a failed `recreate`
    pub fn is_initialized(&self) -> bool {
        self.ctx.is_some()
    }

    fn resources(&self, op: &str) -> Result<&PassResources> {
        match (&self.resources, &self.ctx) {
            (Some(resources), _) => Ok(resources),
            (None, Some(_)) => Err(Error::contract(
                "RenderPass",
                format!("{}() after a failed recreate(); recreate() again first", op),
            )),
            (None, None) => Err(Error::contract("RenderPass", format!("{}() before initialize()", op))),
        }
    }

    pub fn handle(&self) -> Result<RenderPassHandle> {
        Ok(self.resources("handle")?.handle)
    }

    /// Framebuffer for swapchain image `image_index`
    pub fn get_active_framebuffer(&self, image_index: u32) -> Result<FramebufferHandle> {
        let resources = self.resources("get_active_framebuffer")?;
        resources
            .framebuffers
            .as_ref()
            .and_then(|f| f.get(image_index as usize))
            .ok_or_else(|| {
                Error::contract("RenderPass", format!("no framebuffer for image {}", image_index))
            })
    }

    /// One framebuffer per swapchain image (empty before initialization)
    pub fn get_framebuffers(&self) -> &[FramebufferHandle] {
        self.resources
            .as_ref()
            .and_then(|r| r.framebuffers.as_ref())
            .map(|f| f.handles())
            .unwrap_or(&[])
    }

    /// Resolved render area (zero before initialization)
    pub fn get_render_area(&self) -> Rect2D {
        self.resources
            .as_ref()
            .map(|r| r.render_area)
            .unwrap_or_default()
    }

    pub fn depth_image(&self) -> Option<&Image2d> {
        self.resources.as_ref().and_then(|r| r.depth.as_ref())
    }

    /// View backing `binding` in the framebuffer of `image_index`
    pub fn attachment_view(&self, binding: u32, swapchain: &Swapchain, image_index: u32) -> Result<ImageViewHandle> {
        let resources = self.resources("attachment_view")?;
        let attachment = self.get_attachment(binding)?;
        let view = match attachment.kind() {
            AttachmentKind::Swapchain => swapchain.image_views().get(image_index as usize).copied(),
            AttachmentKind::Depth => resources.depth.as_ref().map(|d| d.view()),
            AttachmentKind::Image => resources
                .framebuffers
                .as_ref()
                .and_then(|f| f.image(binding))
                .map(|i| i.view()),
        };
        view.ok_or_else(|| {
            Error::contract(
                "RenderPass",
                format!("no view for binding {} and image {}", binding, image_index),
            )
        })
    }

    // ===== RECORDING =====

    /// Begin the pass on the framebuffer of `image_index`, clearing every attachment
    pub fn begin(&self, cmd: &mut CommandBuffer, image_index: u32) -> Result<()> {
        let handle = cmd.recording_handle("RenderPass::begin")?;
        let resources = self.resources("begin")?;
        let framebuffer = self.get_active_framebuffer(image_index)?;
        let clear_values: Vec<ClearValue> = self.attachments.iter().map(|a| a.clear_value()).collect();

        resources.ctx.device().cmd_begin_render_pass(
            handle,
            &RenderPassBeginInfo {
                render_pass: resources.handle,
                framebuffer,
                render_area: resources.render_area,
                clear_values,
            },
        );
        Ok(())
    }

    pub fn next_subpass(&self, cmd: &mut CommandBuffer) -> Result<()> {
        let handle = cmd.recording_handle("RenderPass::next_subpass")?;
        self.resources("next_subpass")?.ctx.device().cmd_next_subpass(handle);
        Ok(())
    }

    pub fn end(&self, cmd: &mut CommandBuffer) -> Result<()> {
        let handle = cmd.recording_handle("RenderPass::end")?;
        self.resources("end")?.ctx.device().cmd_end_render_pass(handle);
        Ok(())
    }
}

/// First depth format the device can use as an attachment
pub fn select_depth_format(ctx: &DeviceContext) -> Result<Format> {
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|&format| ctx.device().supports_depth_format(format))
        .ok_or_else(|| Error::InitializationFailed("no supported depth format".to_string()))
}

/// External -> 0 -> 1 -> ... -> n-1 -> External
///
/// The depth image is shared by every frame in flight, so the external edge
/// orders this frame's depth clear after the previous frame's depth writes.
pub fn chain_dependencies(subpass_count: u32) -> Vec<SubpassDependency> {
    let depth_stages = PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS;
    let attachment_stages = PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | depth_stages;
    let attachment_writes = AccessFlags::COLOR_ATTACHMENT_WRITE | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    let depth_access = AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;

    let mut dependencies = Vec::with_capacity(subpass_count as usize + 1);
    for index in 0..subpass_count {
        if index == 0 {
            dependencies.push(SubpassDependency {
                src_subpass: SubpassRef::External,
                dst_subpass: SubpassRef::Index(0),
                src_stage: attachment_stages,
                dst_stage: attachment_stages,
                src_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access: attachment_writes,
            });
        } else {
            dependencies.push(SubpassDependency {
                src_subpass: SubpassRef::Index(index - 1),
                dst_subpass: SubpassRef::Index(index),
                src_stage: attachment_stages,
                dst_stage: PipelineStageFlags::FRAGMENT_SHADER | depth_stages,
                src_access: AccessFlags::COLOR_ATTACHMENT_WRITE | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                dst_access: AccessFlags::INPUT_ATTACHMENT_READ | AccessFlags::SHADER_READ | depth_access,
            });
        }
    }
    if subpass_count > 0 {
        dependencies.push(SubpassDependency {
            src_subpass: SubpassRef::Index(subpass_count - 1),
            dst_subpass: SubpassRef::External,
            src_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: AccessFlags::MEMORY_READ,
        });
    }
    dependencies
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
