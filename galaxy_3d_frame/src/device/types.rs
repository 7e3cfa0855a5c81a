/// Plain data types shared by the device contract and the frame core
///
/// Native objects are referenced through typed `u64` handles. Backends encode
/// their own native handle in the value; the core never interprets it.

use bitflags::bitflags;

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(u64);

            impl $name {
                /// Null handle
                pub const NULL: Self = Self(0);

                /// Wrap a backend handle value
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// Backend handle value
                pub const fn raw(self) -> u64 {
                    self.0
                }

                /// Whether this is the null handle
                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_handle! {
    /// Presentable image chain
    SwapchainHandle;
    /// GPU image
    ImageHandle;
    /// View over an image
    ImageViewHandle;
    /// Texture sampler
    SamplerHandle;
    /// GPU buffer
    BufferHandle;
    /// Native render pass
    RenderPassHandle;
    /// Native framebuffer
    FramebufferHandle;
    /// Descriptor set layout
    DescriptorSetLayoutHandle;
    /// Descriptor pool
    DescriptorPoolHandle;
    /// Descriptor set
    DescriptorSetHandle;
    /// Pipeline layout
    PipelineLayoutHandle;
    /// Graphics or compute pipeline
    PipelineHandle;
    /// Compiled shader module
    ShaderModuleHandle;
    /// Command pool
    CommandPoolHandle;
    /// Command buffer
    CommandBufferHandle;
    /// CPU-GPU synchronization primitive
    FenceHandle;
    /// GPU-GPU synchronization primitive
    SemaphoreHandle;
    /// Device queue
    QueueHandle;
}

/// Pixel formats understood by the frame core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    Undefined,
    // Color formats
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    A2B10G10R10_UNORM,
    A2R10G10B10_UNORM,
    // Vertex formats
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32A32_UINT,
    // Depth/stencil formats
    D16_UNORM,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT,
    D32_SFLOAT_S8_UINT,
}

impl Format {
    /// Whether the format carries a depth component
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Whether the format carries a stencil component
    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM_S8_UINT | Format::D24_UNORM_S8_UINT | Format::D32_SFLOAT_S8_UINT
        )
    }
}

/// Surface color space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    ExtendedSrgbLinear,
    Hdr10St2084,
}

/// Format + color space pair offered by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: Format,
    pub color_space: ColorSpace,
}

/// Presentation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No vsync, may tear
    Immediate,
    /// Low-latency triple buffering
    Mailbox,
    /// Vsync queue, always supported
    Fifo,
    /// Vsync, tears when late
    FifoRelaxed,
}

/// 2D size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-sized in any dimension (minimized window, undeclared render area)
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 2D offset in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

/// Rectangle (scissor, render area)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    pub offset: Offset2D,
    pub extent: Extent2D,
}

impl Rect2D {
    /// Rectangle at the origin covering `extent`
    pub const fn from_extent(extent: Extent2D) -> Self {
        Self { offset: Offset2D { x: 0, y: 0 }, extent }
    }
}

/// Viewport transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with depth range 0..1
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Surface capabilities reported by the device/windowing collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    /// None when the surface lets the swapchain decide its size
    pub current_extent: Option<Extent2D>,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
    pub formats: Vec<SurfaceFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Queue family indices resolved once at device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub compute: Option<u32>,
}

impl QueueFamilies {
    /// Graphics and present live in the same family
    pub fn is_unified(&self) -> bool {
        self.graphics == self.present
    }
}

/// Tri-state result of acquire and present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    Ok,
    /// Still presentable, but the swapchain should be recreated soon
    SuboptimalButUsable,
    /// Unusable for this frame, full recreation required
    OutOfDate,
}

impl SwapchainStatus {
    /// Recreation is wanted after this result
    pub fn needs_recreate(&self) -> bool {
        !matches!(self, SwapchainStatus::Ok)
    }
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
    }
}

bitflags! {
    /// Shader stage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const GEOMETRY = 1 << 3;
        const TESSELLATION_CONTROL = 1 << 4;
        const TESSELLATION_EVALUATION = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::FRAGMENT.bits()
            | Self::GEOMETRY.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits();
    }
}

bitflags! {
    /// Pipeline stages used in dependencies and semaphore waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const COMPUTE_SHADER = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Memory access flags used in subpass dependencies
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INPUT_ATTACHMENT_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
        const SHADER_WRITE = 1 << 2;
        const COLOR_ATTACHMENT_READ = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 5;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 6;
        const MEMORY_READ = 1 << 7;
    }
}

/// Where an allocation lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not CPU-visible
    GpuOnly,
    /// Host-visible, persistently mapped
    CpuToGpu,
    /// Host-visible readback
    GpuToCpu,
}

/// Descriptor types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

/// One binding of a descriptor set layout
///
/// Field order makes the derived `Ord` sort by binding index first, which is
/// the canonical order of the layout cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

impl DescriptorBinding {
    pub fn new(binding: u32, descriptor_type: DescriptorType, stages: ShaderStageFlags) -> Self {
        Self { binding, descriptor_type, count: 1, stages }
    }
}

/// Number of descriptors of one type in a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub descriptor_type: DescriptorType,
    pub count: u32,
}

/// Clear value of an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Image layouts the frame core cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    ShaderReadOnlyOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    PresentSrc,
}

/// Attachment load operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Attachment store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// Which pipeline kind a bind targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    Graphics,
    Compute,
}
