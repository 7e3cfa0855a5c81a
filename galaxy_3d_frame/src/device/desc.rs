/// Creation descriptors passed across the device contract

use crate::device::types::*;

// ===== SWAPCHAIN =====

/// Negotiated swapchain parameters handed to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainCreateInfo {
    pub min_image_count: u32,
    pub surface_format: SurfaceFormat,
    pub extent: Extent2D,
    pub present_mode: PresentMode,
    /// Previous swapchain when recreating (NULL otherwise)
    pub old_swapchain: SwapchainHandle,
}

// ===== IMAGES / BUFFERS / SAMPLERS =====

/// Descriptor for creating a 2D image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    /// Debug name (also used as allocation name)
    pub name: String,
    pub extent: Extent2D,
    pub format: Format,
    pub usage: ImageUsage,
    pub mip_levels: u32,
    pub array_layers: u32,
}

/// Aspect selected by an image view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    Color,
    Depth,
    DepthStencil,
}

impl ImageAspect {
    /// Aspect matching a format
    pub fn for_format(format: Format) -> Self {
        if format.has_stencil() {
            ImageAspect::DepthStencil
        } else if format.is_depth() {
            ImageAspect::Depth
        } else {
            ImageAspect::Color
        }
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture addressing outside 0..1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode: AddressMode,
    /// None disables anisotropic filtering
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::Repeat,
            max_anisotropy: None,
        }
    }
}

// ===== RENDER PASS =====

/// Native attachment description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentDescription {
    pub format: Format,
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

/// Reference from a subpass to an attachment index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: ImageLayout,
}

/// Native subpass description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubpassDescription {
    pub color_attachments: Vec<AttachmentReference>,
    pub depth_attachment: Option<AttachmentReference>,
    pub input_attachments: Vec<AttachmentReference>,
}

/// Subpass side of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpassRef {
    /// Work outside the render pass
    External,
    Index(u32),
}

/// Execution + memory dependency between two subpasses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubpassDependency {
    pub src_subpass: SubpassRef,
    pub dst_subpass: SubpassRef,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Descriptor for creating a native render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDesc {
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
    pub dependencies: Vec<SubpassDependency>,
}

/// Descriptor for creating a framebuffer
///
/// `attachments[i]` is bound to native attachment index `i` of `render_pass`.
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub render_pass: RenderPassHandle,
    pub attachments: Vec<ImageViewHandle>,
    pub extent: Extent2D,
    pub layers: u32,
}

/// Parameters of `cmd_begin_render_pass`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBeginInfo {
    pub render_pass: RenderPassHandle,
    pub framebuffer: FramebufferHandle,
    pub render_area: Rect2D,
    /// One entry per attachment, in attachment order
    pub clear_values: Vec<ClearValue>,
}

// ===== SUBMISSION =====

/// One queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [CommandBufferHandle],
    pub wait_semaphores: &'a [SemaphoreHandle],
    /// Same length as `wait_semaphores`
    pub wait_stages: &'a [PipelineStageFlags],
    pub signal_semaphores: &'a [SemaphoreHandle],
}

// ===== PIPELINES =====

/// Push constant byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Descriptor for creating a pipeline layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineLayoutDesc {
    /// Indexed by set number
    pub set_layouts: Vec<DescriptorSetLayoutHandle>,
    pub push_constant_ranges: Vec<PushConstantRange>,
}

/// One shader stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStageDesc {
    /// Exactly one stage bit
    pub stage: ShaderStageFlags,
    pub module: ShaderModuleHandle,
    pub entry_point: String,
}

/// Per-vertex or per-instance stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: VertexInputRate,
}

/// Vertex attribute read from a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: Format,
    pub offset: u32,
}

/// Vertex input layout of a graphics pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexInputLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

/// Polygon rasterization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

/// Depth test/write combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthMode {
    None,
    Read,
    Write,
    ReadWrite,
}

impl DepthMode {
    pub fn test_enabled(&self) -> bool {
        matches!(self, DepthMode::Read | DepthMode::ReadWrite)
    }

    pub fn write_enabled(&self) -> bool {
        matches!(self, DepthMode::Write | DepthMode::ReadWrite)
    }
}

/// Color blending preset applied to every color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    AlphaBlend,
    Additive,
}

/// Fixed-function + shader state of a native graphics pipeline
///
/// Viewport and scissor are always dynamic.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineState {
    pub stages: Vec<ShaderStageDesc>,
    pub vertex_input: VertexInputLayout,
    pub topology: PrimitiveTopology,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth: DepthMode,
    pub blend: BlendMode,
    pub samples: u32,
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub subpass: u32,
    pub color_attachment_count: u32,
}

/// State of a native compute pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ComputePipelineState {
    pub stage: ShaderStageDesc,
    pub layout: PipelineLayoutHandle,
}

// ===== REFLECTION =====

/// Descriptor binding discovered in a shader
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub name: String,
    pub binding: DescriptorBinding,
}

/// Push constant block discovered in a shader
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedPushConstant {
    pub name: String,
    pub size: u32,
    pub stages: ShaderStageFlags,
}

/// Resource interface of one shader module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
    pub push_constants: Vec<ReflectedPushConstant>,
}

impl ShaderReflection {
    /// Merge another stage's interface, OR-ing stage flags of shared bindings
    pub fn merge(&mut self, other: &ShaderReflection) {
        for incoming in &other.bindings {
            match self.bindings.iter_mut().find(|b| {
                b.set == incoming.set && b.binding.binding == incoming.binding.binding
            }) {
                Some(existing) => existing.binding.stages |= incoming.binding.stages,
                None => self.bindings.push(incoming.clone()),
            }
        }
        for incoming in &other.push_constants {
            match self.push_constants.iter_mut().find(|p| p.name == incoming.name) {
                Some(existing) => {
                    existing.stages |= incoming.stages;
                    existing.size = existing.size.max(incoming.size);
                }
                None => self.push_constants.push(incoming.clone()),
            }
        }
    }

    /// Bindings of `set`
    pub fn set_bindings(&self, set: u32) -> Vec<DescriptorBinding> {
        self.bindings.iter().filter(|b| b.set == set).map(|b| b.binding).collect()
    }

    /// Number of sets (highest set index + 1)
    pub fn set_count(&self) -> u32 {
        self.bindings.iter().map(|b| b.set + 1).max().unwrap_or(0)
    }
}

// ===== DESCRIPTOR WRITES =====

/// Resource bound to a descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DescriptorResource {
    UniformBuffer { buffer: BufferHandle, offset: u64, range: u64 },
    StorageBuffer { buffer: BufferHandle, offset: u64, range: u64 },
    CombinedImageSampler { view: ImageViewHandle, sampler: SamplerHandle },
    StorageImage { view: ImageViewHandle },
    InputAttachment { view: ImageViewHandle },
}

impl DescriptorResource {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorResource::UniformBuffer { .. } => DescriptorType::UniformBuffer,
            DescriptorResource::StorageBuffer { .. } => DescriptorType::StorageBuffer,
            DescriptorResource::CombinedImageSampler { .. } => DescriptorType::CombinedImageSampler,
            DescriptorResource::StorageImage { .. } => DescriptorType::StorageImage,
            DescriptorResource::InputAttachment { .. } => DescriptorType::InputAttachment,
        }
    }
}

/// Write of one descriptor into a set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub array_element: u32,
    pub resource: DescriptorResource,
}
