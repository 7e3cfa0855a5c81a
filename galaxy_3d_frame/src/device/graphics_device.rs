/// GraphicsDevice trait - the downward contract of the frame core
///
/// Everything the core needs from the native graphics API goes through this
/// trait: capability queries, object creation/destruction, command recording,
/// submission and presentation. Implemented by backends (e.g. `VulkanDevice`)
/// and by the in-crate `MockDevice` for tests.
///
/// All methods take `&self`; implementations serialize internally where the
/// native API requires it (queues, allocator).

use crate::device::desc::*;
use crate::device::types::*;
use crate::error::Result;

/// Native graphics device
pub trait GraphicsDevice: Send + Sync {
    // ===== DEVICE / QUEUES =====

    /// Queue families selected when the device was created
    fn queue_families(&self) -> QueueFamilies;

    /// Queue `index` of `family`
    fn queue(&self, family: u32, index: u32) -> Result<QueueHandle>;

    /// Current capabilities of the presentation surface
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;

    /// Whether `format` can be used as an optimal-tiling depth attachment
    fn supports_depth_format(&self, format: Format) -> bool;

    /// Block until the whole device is idle
    fn wait_idle(&self) -> Result<()>;

    /// Block until `queue` has drained
    fn queue_wait_idle(&self, queue: QueueHandle) -> Result<()>;

    // ===== SWAPCHAIN =====

    /// Create a swapchain on the device's surface
    fn create_swapchain(&self, info: &SwapchainCreateInfo) -> Result<SwapchainHandle>;

    fn destroy_swapchain(&self, swapchain: SwapchainHandle);

    /// Presentable images, in swapchain order
    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>>;

    /// Acquire the next presentable image, signaling `semaphore` when it is ready
    ///
    /// # Returns
    ///
    /// The image index and the tri-state status. On `OutOfDate` the index is meaningless.
    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout_ns: u64,
        semaphore: SemaphoreHandle,
    ) -> Result<(u32, SwapchainStatus)>;

    /// Queue `image_index` for presentation once `wait_semaphore` is signaled
    fn queue_present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphore: SemaphoreHandle,
    ) -> Result<SwapchainStatus>;

    // ===== IMAGES / SAMPLERS =====

    /// Create a device-local image with its backing memory
    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle>;

    /// Destroy an image and free its memory
    fn destroy_image(&self, image: ImageHandle);

    fn create_image_view(&self, image: ImageHandle, format: Format, aspect: ImageAspect) -> Result<ImageViewHandle>;

    fn destroy_image_view(&self, view: ImageViewHandle);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle>;

    fn destroy_sampler(&self, sampler: SamplerHandle);

    // ===== BUFFERS =====

    /// Create a buffer with its backing memory
    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle>;

    /// Write `data` at `offset` into a host-visible buffer
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: BufferHandle);

    // ===== RENDER PASS / FRAMEBUFFER =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassHandle>;

    fn destroy_render_pass(&self, render_pass: RenderPassHandle);

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle>;

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle);

    // ===== DESCRIPTORS =====

    /// Create a set layout from bindings sorted by binding index
    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle>;

    /// Return every set of `pool` to it
    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()>;

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    /// Allocate one set from `pool`
    ///
    /// Pool exhaustion is reported as `Error::OutOfPoolMemory` or
    /// `Error::FragmentedPool` so the caller can rotate pools.
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle>;

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== SHADERS / PIPELINES =====

    /// Create a shader module from SPIR-V bytes
    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    /// Reflect the descriptor and push constant interface of SPIR-V bytes
    fn reflect_shader(&self, code: &[u8], stage: ShaderStageFlags) -> Result<ShaderReflection>;

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(&self, state: &GraphicsPipelineState) -> Result<PipelineHandle>;

    fn create_compute_pipeline(&self, state: &ComputePipelineState) -> Result<PipelineHandle>;

    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    // ===== COMMAND POOLS / BUFFERS =====

    /// Create a resettable command pool on `queue_family`
    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle>;

    fn destroy_command_pool(&self, pool: CommandPoolHandle);

    /// Allocate one primary command buffer
    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle>;

    fn free_command_buffer(&self, pool: CommandPoolHandle, cmd: CommandBufferHandle);

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()>;

    /// Submit to `queue`, signaling `fence` (if any) on completion
    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo, fence: Option<FenceHandle>) -> Result<()>;

    // ===== RECORDING =====

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, info: &RenderPassBeginInfo);

    fn cmd_next_subpass(&self, cmd: CommandBufferHandle);

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle);

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle);

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    );

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: &Viewport);

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: &Rect2D);

    fn cmd_bind_vertex_buffers(&self, cmd: CommandBufferHandle, first_binding: u32, buffers: &[BufferHandle], offsets: &[u64]);

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType);

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32);

    // ===== SYNCHRONIZATION =====

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    fn destroy_fence(&self, fence: FenceHandle);

    /// Block until every fence is signaled or `timeout_ns` elapses
    fn wait_for_fences(&self, fences: &[FenceHandle], timeout_ns: u64) -> Result<()>;

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()>;

    /// Non-blocking signaled query
    fn fence_status(&self, fence: FenceHandle) -> Result<bool>;

    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);
}
