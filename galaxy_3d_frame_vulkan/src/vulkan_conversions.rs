/// Conversions between the frame core's device types and Vulkan
///
/// Pure functions, no device required. Every enum of the device contract
/// maps to exactly one Vulkan value; the reverse direction only exists where
/// the driver reports values back (surface formats, present modes).

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_frame::galaxy3d::device::{
    AccessFlags, AddressMode, BlendMode, BufferUsage, ClearValue, ColorSpace, CullMode,
    DescriptorType, Extent2D, Filter, Format, FrontFace, ImageAspect, ImageLayout, ImageUsage,
    IndexType, LoadOp, MemoryLocation, PipelineBindPoint, PipelineStageFlags, PolygonMode,
    PresentMode, PrimitiveTopology, Rect2D, ShaderStageFlags, StoreOp, SubpassRef,
    SurfaceFormat, SwapchainStatus, VertexInputRate,
};
use galaxy_3d_frame::galaxy3d::Error;
use galaxy_3d_frame::engine_error;

// ===== HANDLES =====

/// Rebuild a Vulkan handle from the raw value stored in a contract handle
pub(crate) fn vk_handle<H: Handle>(raw: u64) -> H {
    H::from_raw(raw)
}

// ===== FORMATS =====

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::Undefined => vk::Format::UNDEFINED,
        Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        Format::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        Format::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        Format::A2B10G10R10_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::A2R10G10B10_UNORM => vk::Format::A2R10G10B10_UNORM_PACK32,
        Format::R32_SFLOAT => vk::Format::R32_SFLOAT,
        Format::R32G32_SFLOAT => vk::Format::R32G32_SFLOAT,
        Format::R32G32B32_SFLOAT => vk::Format::R32G32B32_SFLOAT,
        Format::R32_UINT => vk::Format::R32_UINT,
        Format::R32G32_UINT => vk::Format::R32G32_UINT,
        Format::R32G32B32A32_UINT => vk::Format::R32G32B32A32_UINT,
        Format::D16_UNORM => vk::Format::D16_UNORM,
        Format::D16_UNORM_S8_UINT => vk::Format::D16_UNORM_S8_UINT,
        Format::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        Format::D32_SFLOAT => vk::Format::D32_SFLOAT,
        Format::D32_SFLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

/// Format reported by the driver, if the core knows it
pub fn format_from_vk(format: vk::Format) -> Option<Format> {
    let format = match format {
        vk::Format::R8G8B8A8_SRGB => Format::R8G8B8A8_SRGB,
        vk::Format::R8G8B8A8_UNORM => Format::R8G8B8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => Format::B8G8R8A8_SRGB,
        vk::Format::B8G8R8A8_UNORM => Format::B8G8R8A8_UNORM,
        vk::Format::R16G16B16A16_SFLOAT => Format::R16G16B16A16_SFLOAT,
        vk::Format::R32G32B32A32_SFLOAT => Format::R32G32B32A32_SFLOAT,
        vk::Format::A2B10G10R10_UNORM_PACK32 => Format::A2B10G10R10_UNORM,
        vk::Format::A2R10G10B10_UNORM_PACK32 => Format::A2R10G10B10_UNORM,
        _ => return None,
    };
    Some(format)
}

/// Surface formats the core can express, plus the ones it had to skip
///
/// Order is kept, so "first offered" still means the driver's first choice
/// among the usable formats.
pub fn surface_formats_from_vk(
    formats: &[vk::SurfaceFormatKHR],
) -> (Vec<SurfaceFormat>, Vec<vk::SurfaceFormatKHR>) {
    let mut usable = Vec::with_capacity(formats.len());
    let mut skipped = Vec::new();
    for &format in formats {
        match (format_from_vk(format.format), color_space_from_vk(format.color_space)) {
            (Some(f), Some(color_space)) => usable.push(SurfaceFormat { format: f, color_space }),
            _ => skipped.push(format),
        }
    }
    (usable, skipped)
}

pub fn color_space_to_vk(color_space: ColorSpace) -> vk::ColorSpaceKHR {
    match color_space {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::ExtendedSrgbLinear => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        ColorSpace::Hdr10St2084 => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
    }
}

pub fn color_space_from_vk(color_space: vk::ColorSpaceKHR) -> Option<ColorSpace> {
    match color_space {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => Some(ColorSpace::SrgbNonlinear),
        vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT => Some(ColorSpace::ExtendedSrgbLinear),
        vk::ColorSpaceKHR::HDR10_ST2084_EXT => Some(ColorSpace::Hdr10St2084),
        _ => None,
    }
}

pub fn present_mode_to_vk(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn extent_to_vk(extent: Extent2D) -> vk::Extent2D {
    vk::Extent2D { width: extent.width, height: extent.height }
}

pub fn rect_to_vk(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.offset.x, y: rect.offset.y },
        extent: extent_to_vk(rect.extent),
    }
}

// ===== FLAGS =====

pub fn image_usage_to_vk(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    let pairs = [
        (ImageUsage::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
        (ImageUsage::TRANSFER_DST, vk::ImageUsageFlags::TRANSFER_DST),
        (ImageUsage::SAMPLED, vk::ImageUsageFlags::SAMPLED),
        (ImageUsage::STORAGE, vk::ImageUsageFlags::STORAGE),
        (ImageUsage::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
        (ImageUsage::DEPTH_STENCIL_ATTACHMENT, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT),
        (ImageUsage::INPUT_ATTACHMENT, vk::ImageUsageFlags::INPUT_ATTACHMENT),
    ];
    for (ours, theirs) in pairs {
        if usage.contains(ours) {
            flags |= theirs;
        }
    }
    flags
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    let pairs = [
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
    ];
    for (ours, theirs) in pairs {
        if usage.contains(ours) {
            flags |= theirs;
        }
    }
    flags
}

pub fn shader_stages_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    let pairs = [
        (ShaderStageFlags::VERTEX, vk::ShaderStageFlags::VERTEX),
        (ShaderStageFlags::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
        (ShaderStageFlags::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        (ShaderStageFlags::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
        (ShaderStageFlags::TESSELLATION_CONTROL, vk::ShaderStageFlags::TESSELLATION_CONTROL),
        (ShaderStageFlags::TESSELLATION_EVALUATION, vk::ShaderStageFlags::TESSELLATION_EVALUATION),
    ];
    for (ours, theirs) in pairs {
        if stages.contains(ours) {
            flags |= theirs;
        }
    }
    flags
}

pub fn pipeline_stages_to_vk(stages: PipelineStageFlags) -> vk::PipelineStageFlags {
    let mut flags = vk::PipelineStageFlags::empty();
    let pairs = [
        (PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (PipelineStageFlags::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (PipelineStageFlags::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
        (PipelineStageFlags::EARLY_FRAGMENT_TESTS, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS),
        (PipelineStageFlags::LATE_FRAGMENT_TESTS, vk::PipelineStageFlags::LATE_FRAGMENT_TESTS),
        (PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT),
        (PipelineStageFlags::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (PipelineStageFlags::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    ];
    for (ours, theirs) in pairs {
        if stages.contains(ours) {
            flags |= theirs;
        }
    }
    flags
}

pub fn access_to_vk(access: AccessFlags) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    let pairs = [
        (AccessFlags::INPUT_ATTACHMENT_READ, vk::AccessFlags::INPUT_ATTACHMENT_READ),
        (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
        (AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
        (AccessFlags::COLOR_ATTACHMENT_READ, vk::AccessFlags::COLOR_ATTACHMENT_READ),
        (AccessFlags::COLOR_ATTACHMENT_WRITE, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ),
        (AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        (AccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
    ];
    for (ours, theirs) in pairs {
        if access.contains(ours) {
            flags |= theirs;
        }
    }
    flags
}

pub fn image_aspect_to_vk(aspect: ImageAspect) -> vk::ImageAspectFlags {
    match aspect {
        ImageAspect::Color => vk::ImageAspectFlags::COLOR,
        ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        ImageAspect::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}

// ===== ENUMS =====

pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachmentOptimal => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::PresentSrc => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn load_op_to_vk(load_op: LoadOp) -> vk::AttachmentLoadOp {
    match load_op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op_to_vk(store_op: StoreOp) -> vk::AttachmentStoreOp {
    match store_op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn subpass_ref_to_vk(subpass: SubpassRef) -> u32 {
    match subpass {
        SubpassRef::External => vk::SUBPASS_EXTERNAL,
        SubpassRef::Index(index) => index,
    }
}

pub fn sample_count_to_vk(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn vertex_input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub fn bind_point_to_vk(bind_point: PipelineBindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn memory_location_to_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

/// Color blend state of one attachment for a blend preset
pub fn blend_attachment_to_vk(blend: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    let state = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);
    match blend {
        BlendMode::Opaque => state.blend_enable(false),
        BlendMode::AlphaBlend => state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD),
        BlendMode::Additive => state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE)
            .alpha_blend_op(vk::BlendOp::ADD),
    }
}

// ===== RESULTS =====

/// Map a failed Vulkan call into the error taxonomy
///
/// Pool exhaustion stays silent since the descriptor allocator recovers from
/// it; everything else is logged at the call site's `context`.
pub fn map_vk_result(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => Error::OutOfPoolMemory,
        vk::Result::ERROR_FRAGMENTED_POOL => Error::FragmentedPool,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            engine_error!("galaxy3d::vulkan", "{}: {:?}", context, result);
            Error::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => {
            engine_error!("galaxy3d::vulkan", "{}: device lost", context);
            Error::DeviceLost
        }
        other => {
            engine_error!("galaxy3d::vulkan", "{}: {:?}", context, other);
            Error::BackendError(format!("{}: {:?}", context, other))
        }
    }
}

/// Tri-state status of an acquire/present call
///
/// `ERROR_OUT_OF_DATE_KHR` is a status, not an error: the swapchain must be
/// recreated before the next frame.
pub fn swapchain_status_from_vk(
    result: std::result::Result<bool, vk::Result>,
    context: &str,
) -> std::result::Result<SwapchainStatus, Error> {
    match result {
        Ok(false) => Ok(SwapchainStatus::Ok),
        Ok(true) => Ok(SwapchainStatus::SuboptimalButUsable),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
        Err(e) => Err(map_vk_result(e, context)),
    }
}

#[cfg(test)]
#[path = "vulkan_conversions_tests.rs"]
mod tests;
