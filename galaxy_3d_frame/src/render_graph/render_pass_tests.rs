//! Unit tests for render_pass.rs
//!
//! Attachment lookup, native description building, depth handling,
//! framebuffer wiring and recreation against the mock device.

use std::sync::Arc;

use serial_test::serial;

use crate::command::CommandBuffer;
use crate::config::Config;
use crate::device::mock_device::{MockDevice, MockSurface};
use crate::device::*;
use crate::log::{self, CaptureLogger, LogSeverity};
use crate::render_graph::*;
use crate::swapchain::Swapchain;

struct Fixture {
    device: Arc<MockDevice>,
    ctx: Arc<DeviceContext>,
    surface: MockSurface,
    swapchain: Swapchain,
}

fn setup() -> Fixture {
    let device = Arc::new(MockDevice::new());
    let ctx = DeviceContext::new(device.clone(), &Config::default()).unwrap();
    let surface = MockSurface::new(800, 600);
    let swapchain = Swapchain::new(ctx.clone(), &surface, 2).unwrap();
    Fixture { device, ctx, surface, swapchain }
}

fn forward_pass() -> RenderPass {
    RenderPass::new(
        vec![
            Attachment::swapchain(0, "swapchain", [0.01, 0.01, 0.01, 1.0]),
            Attachment::depth(1, "depth"),
        ],
        vec![Subpass::new(0, &[0, 1])],
        Extent2D::default(),
    )
}

fn deferred_pass() -> RenderPass {
    RenderPass::new(
        vec![
            Attachment::swapchain(0, "swapchain", [0.0, 0.0, 0.0, 1.0]),
            Attachment::depth(1, "depth"),
            Attachment::image(2, "albedo", Format::R8G8B8A8_UNORM, [0.0; 4]),
            Attachment::image(3, "normals", Format::R16G16B16A16_SFLOAT, [0.0; 4]),
        ],
        vec![
            Subpass::new(0, &[1, 2, 3]),
            Subpass::new(1, &[0]).with_inputs(&[2, 3]),
        ],
        Extent2D::default(),
    )
}

// ============================================================================
// ATTACHMENT LOOKUP
// ============================================================================

#[test]
fn test_get_attachment_by_binding_and_name_agree() {
    let pass = deferred_pass();
    for _ in 0..2 {
        for attachment in pass.attachments() {
            let by_binding = pass.get_attachment(attachment.binding()).unwrap();
            let by_name = pass.get_attachment_by_name(attachment.name()).unwrap();
            assert_eq!(by_binding, attachment);
            assert_eq!(by_name, attachment);
        }
    }
}

#[test]
fn test_unknown_binding_is_violation() {
    let pass = forward_pass();
    let err = pass.get_attachment(7).unwrap_err();
    assert!(err.is_contract_violation());
    assert!(pass.get_attachment_by_name("missing").unwrap_err().is_contract_violation());
}

#[test]
#[serial]
fn test_duplicate_binding_is_flagged() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    let _pass = RenderPass::new(
        vec![
            Attachment::swapchain(0, "swapchain", [0.0; 4]),
            Attachment::image(0, "shadow", Format::R32_SFLOAT, [0.0; 4]),
        ],
        vec![Subpass::new(0, &[0])],
        Extent2D::default(),
    );

    let warned = entries
        .lock()
        .unwrap()
        .iter()
        .any(|e| e.severity == LogSeverity::Warn && e.source == "galaxy3d::RenderPass");
    log::reset_logger();
    assert!(warned);
}

// ============================================================================
// INITIALIZATION
// ============================================================================

#[test]
fn test_framebuffers_match_swapchain_images() {
    let f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    let framebuffers = pass.get_framebuffers();
    assert_eq!(framebuffers.len(), f.swapchain.image_count());

    let state = f.device.state();
    for (index, framebuffer) in framebuffers.iter().enumerate() {
        let desc = &state.framebuffer_descs[&framebuffer.raw()];
        assert_eq!(desc.attachments[0], f.swapchain.image_views()[index]);
        assert_eq!(desc.attachments[1], pass.depth_image().unwrap().view());
        assert_eq!(desc.extent, f.swapchain.extent());
    }
}

#[test]
fn test_native_layouts_and_references() {
    let f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    let state = f.device.state();
    let desc = &state.render_pass_descs[&pass.handle().unwrap().raw()];
    assert_eq!(desc.attachments[0].format, f.swapchain.format());
    assert_eq!(desc.attachments[0].final_layout, ImageLayout::PresentSrc);
    assert_eq!(desc.attachments[1].format, Format::D32_SFLOAT);
    assert_eq!(desc.attachments[1].final_layout, ImageLayout::DepthStencilAttachmentOptimal);

    let subpass = &desc.subpasses[0];
    assert_eq!(subpass.color_attachments.len(), 1);
    assert_eq!(subpass.color_attachments[0].attachment, 0);
    assert_eq!(subpass.depth_attachment.unwrap().attachment, 1);
}

#[test]
fn test_depth_format_follows_preference() {
    let f = setup();
    f.device.state().depth_formats = vec![Format::D16_UNORM, Format::D24_UNORM_S8_UINT];
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    assert_eq!(pass.depth_image().unwrap().format(), Format::D24_UNORM_S8_UINT);
}

#[test]
fn test_no_depth_format_fails_initialization() {
    let f = setup();
    f.device.state().depth_formats.clear();
    let mut pass = forward_pass();

    assert!(pass.initialize(f.ctx.clone(), &f.swapchain).is_err());
    assert!(!pass.is_initialized());
    assert_eq!(f.device.state().live_count("render_pass"), 0);
}

#[test]
fn test_depth_sized_to_declared_render_area() {
    let f = setup();
    let mut pass = RenderPass::new(
        vec![Attachment::swapchain(0, "swapchain", [0.0; 4]), Attachment::depth(1, "depth")],
        vec![Subpass::new(0, &[0, 1])],
        Extent2D::new(800, 600),
    );
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    assert_eq!(pass.depth_image().unwrap().extent(), Extent2D::new(800, 600));
    assert_eq!(pass.get_render_area(), Rect2D::from_extent(Extent2D::new(800, 600)));
}

#[test]
fn test_subpass_dependencies_are_chained() {
    let deps = chain_dependencies(2);
    assert_eq!(deps.len(), 3);
    assert_eq!(deps[0].src_subpass, SubpassRef::External);
    assert_eq!(deps[0].dst_subpass, SubpassRef::Index(0));
    assert_eq!(deps[1].src_subpass, SubpassRef::Index(0));
    assert_eq!(deps[1].dst_subpass, SubpassRef::Index(1));
    assert_eq!(deps[2].src_subpass, SubpassRef::Index(1));
    assert_eq!(deps[2].dst_subpass, SubpassRef::External);
}

#[test]
fn test_subpass_dependencies_cover_depth_writes() {
    let deps = chain_dependencies(2);

    // The previous frame's late depth writes finish before this frame clears depth
    let external = &deps[0];
    assert!(external.src_stage.contains(PipelineStageFlags::LATE_FRAGMENT_TESTS));
    assert!(external.src_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert!(external.dst_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));

    // Consecutive subpasses sharing the depth attachment are ordered too
    let inner = &deps[1];
    let depth_stages = PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS;
    assert!(inner.src_stage.contains(depth_stages | PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT));
    assert!(inner.dst_stage.contains(depth_stages | PipelineStageFlags::FRAGMENT_SHADER));
    assert!(inner.src_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert!(inner
        .dst_access
        .contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
}

#[test]
fn test_image_attachments_and_input_usage() {
    let f = setup();
    let mut pass = deferred_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    let state = f.device.state();
    let albedo = state
        .image_descs
        .values()
        .find(|d| d.name == "albedo")
        .unwrap();
    assert!(albedo.usage.contains(ImageUsage::COLOR_ATTACHMENT | ImageUsage::STORAGE | ImageUsage::INPUT_ATTACHMENT));

    let desc = &state.render_pass_descs[&pass.handle().unwrap().raw()];
    assert_eq!(desc.attachments[2].final_layout, ImageLayout::ShaderReadOnlyOptimal);
    assert_eq!(desc.subpasses[0].color_attachments.len(), 2);
    assert_eq!(desc.subpasses[1].input_attachments.len(), 2);
    assert_eq!(desc.subpasses[1].input_attachments[0].attachment, 2);
    assert_eq!(pass.color_attachment_count(0), 2);
    assert!(pass.subpass_has_depth(0));
    assert!(!pass.subpass_has_depth(1));
}

#[test]
fn test_image_attachment_without_input_use() {
    let f = setup();
    let mut pass = RenderPass::new(
        vec![
            Attachment::swapchain(0, "swapchain", [0.0; 4]),
            Attachment::image(1, "bloom", Format::R16G16B16A16_SFLOAT, [0.0; 4]),
        ],
        vec![Subpass::new(0, &[0, 1])],
        Extent2D::default(),
    );
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    let state = f.device.state();
    let bloom = state.image_descs.values().find(|d| d.name == "bloom").unwrap();
    assert!(!bloom.usage.contains(ImageUsage::INPUT_ATTACHMENT));

    // Ending in ShaderReadOnlyOptimal requires a sampled image
    let desc = &state.render_pass_descs[&pass.handle().unwrap().raw()];
    assert_eq!(desc.attachments[1].final_layout, ImageLayout::ShaderReadOnlyOptimal);
    assert!(bloom.usage.contains(ImageUsage::SAMPLED));
}

#[test]
fn test_unknown_subpass_binding_is_violation() {
    let f = setup();
    let mut pass = RenderPass::new(
        vec![Attachment::swapchain(0, "swapchain", [0.0; 4])],
        vec![Subpass::new(0, &[0, 4])],
        Extent2D::default(),
    );
    assert!(pass.initialize(f.ctx.clone(), &f.swapchain).unwrap_err().is_contract_violation());
}

#[test]
fn test_out_of_order_subpass_is_violation() {
    let f = setup();
    let mut pass = RenderPass::new(
        vec![Attachment::swapchain(0, "swapchain", [0.0; 4])],
        vec![Subpass::new(1, &[0])],
        Extent2D::default(),
    );
    assert!(pass.initialize(f.ctx.clone(), &f.swapchain).unwrap_err().is_contract_violation());
}

#[test]
fn test_accessors_before_initialize() {
    let pass = forward_pass();
    assert!(pass.get_framebuffers().is_empty());
    assert!(pass.get_active_framebuffer(0).unwrap_err().is_contract_violation());
    assert!(pass.handle().unwrap_err().is_contract_violation());
}

// ============================================================================
// RECREATION / TEARDOWN
// ============================================================================

#[test]
fn test_recreate_follows_new_extent() {
    let mut f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    f.device.set_surface_extent(Extent2D::new(1280, 720));
    f.surface.set_size(1280, 720);
    f.swapchain.recreate(&f.surface).unwrap();
    pass.recreate(&f.swapchain).unwrap();

    assert_eq!(pass.get_render_area().extent, Extent2D::new(1280, 720));
    assert_eq!(pass.depth_image().unwrap().extent(), Extent2D::new(1280, 720));

    let state = f.device.state();
    assert_eq!(state.live_count("render_pass"), 1);
    assert_eq!(state.live_count("framebuffer"), 3);
    assert_eq!(state.live_count("image"), 1);
    let first = &state.framebuffer_descs[&pass.get_framebuffers()[0].raw()];
    assert_eq!(first.attachments[0], f.swapchain.image_views()[0]);
}

#[test]
fn test_failed_recreate_can_be_retried() {
    let mut f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    let formats = std::mem::take(&mut f.device.state().depth_formats);
    f.swapchain.recreate(&f.surface).unwrap();
    assert!(pass.recreate(&f.swapchain).is_err());

    assert!(pass.is_initialized());
    assert!(pass.get_framebuffers().is_empty());
    match pass.handle().unwrap_err() {
        crate::error::Error::ContractViolation { message, .. } => {
            assert!(message.contains("failed recreate"), "{}", message)
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(f.device.state().live_count("render_pass"), 0);

    f.device.state().depth_formats = formats;
    pass.recreate(&f.swapchain).unwrap();
    assert_eq!(pass.get_framebuffers().len(), f.swapchain.image_count());
    assert_eq!(f.device.state().live_count("render_pass"), 1);
}

#[test]
fn test_recreate_before_initialize_is_violation() {
    let f = setup();
    let mut pass = forward_pass();
    assert!(pass.recreate(&f.swapchain).unwrap_err().is_contract_violation());
}

#[test]
fn test_drop_releases_everything() {
    let f = setup();
    {
        let mut pass = deferred_pass();
        pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();
    }
    let state = f.device.state();
    assert_eq!(state.live_count("render_pass"), 0);
    assert_eq!(state.live_count("framebuffer"), 0);
    assert_eq!(state.live_count("image"), 0);
    assert!(state.invalid_destroys.is_empty());
}

// ============================================================================
// RECORDING
// ============================================================================

#[test]
fn test_begin_next_end_records_commands() {
    let f = setup();
    let mut pass = deferred_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();
    let mut cmd = CommandBuffer::new(f.ctx.clone(), true).unwrap();

    pass.begin(&mut cmd, 1).unwrap();
    pass.next_subpass(&mut cmd).unwrap();
    pass.end(&mut cmd).unwrap();

    let commands = f.device.state().commands.clone();
    assert_eq!(commands, vec!["begin", "begin_render_pass(4)", "next_subpass", "end_render_pass"]);
}

#[test]
fn test_begin_requires_recording_buffer() {
    let f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();
    let mut cmd = CommandBuffer::new(f.ctx.clone(), false).unwrap();

    assert!(pass.begin(&mut cmd, 0).unwrap_err().is_contract_violation());
}

#[test]
fn test_begin_with_bad_image_index_is_violation() {
    let f = setup();
    let mut pass = forward_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();
    let mut cmd = CommandBuffer::new(f.ctx.clone(), true).unwrap();

    assert!(pass.begin(&mut cmd, 9).unwrap_err().is_contract_violation());
}

#[test]
fn test_attachment_view_resolution() {
    let f = setup();
    let mut pass = deferred_pass();
    pass.initialize(f.ctx.clone(), &f.swapchain).unwrap();

    assert_eq!(pass.attachment_view(0, &f.swapchain, 2).unwrap(), f.swapchain.image_views()[2]);
    assert_eq!(pass.attachment_view(1, &f.swapchain, 0).unwrap(), pass.depth_image().unwrap().view());
    let albedo = pass.attachment_view(2, &f.swapchain, 0).unwrap();
    assert_eq!(albedo, pass.attachment_view(2, &f.swapchain, 1).unwrap());
}
