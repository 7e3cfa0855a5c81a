/// Mock graphics device for unit tests (no GPU required)
///
/// Hands out increasing handle values and records everything the frame core
/// asks for: live objects per kind, fence states, submissions, recorded
/// commands. Acquire/present results, swapchain image counts and descriptor
/// pool capacities can be scripted to drive the recovery paths.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::device::desc::*;
use crate::device::graphics_device::GraphicsDevice;
use crate::device::surface::WindowSurface;
use crate::device::types::*;
use crate::engine_bail;
use crate::error::{Error, Result};

// ============================================================================
// Recorded data
// ============================================================================

/// One recorded `queue_submit`
#[derive(Debug, Clone, PartialEq)]
pub struct MockSubmission {
    pub queue: QueueHandle,
    pub command_buffers: Vec<CommandBufferHandle>,
    pub wait_semaphores: Vec<SemaphoreHandle>,
    pub wait_stages: Vec<PipelineStageFlags>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

/// Descriptor pool bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPool {
    pub capacity: u32,
    pub used: u32,
}

/// Mutable state of the mock device
#[derive(Debug)]
pub struct MockState {
    next_handle: u64,
    /// Live raw handles per object kind
    pub live: FxHashMap<&'static str, FxHashSet<u64>>,
    /// Objects ever created per kind
    pub created: FxHashMap<&'static str, usize>,
    /// Destroy calls on handles that were not live
    pub invalid_destroys: Vec<(&'static str, u64)>,

    // Surface / swapchain
    pub capabilities: SurfaceCapabilities,
    /// Force the number of images the "driver" returns
    pub swapchain_image_override: Option<u32>,
    pub swapchain_infos: Vec<SwapchainCreateInfo>,
    pub swapchain_images: FxHashMap<u64, Vec<ImageHandle>>,
    pub next_image: u32,
    pub acquire_script: VecDeque<SwapchainStatus>,
    pub present_script: VecDeque<SwapchainStatus>,
    pub acquired: Vec<u32>,
    pub presented: Vec<u32>,

    // Images / buffers
    pub image_descs: FxHashMap<u64, ImageDesc>,
    pub view_images: FxHashMap<u64, u64>,
    pub buffers: FxHashMap<u64, (BufferDesc, Vec<u8>)>,
    pub depth_formats: Vec<Format>,

    // Render passes / framebuffers
    pub render_pass_descs: FxHashMap<u64, RenderPassDesc>,
    pub framebuffer_descs: FxHashMap<u64, FramebufferDesc>,

    // Descriptors
    pub layout_bindings: FxHashMap<u64, Vec<DescriptorBinding>>,
    pub pools: FxHashMap<u64, MockPool>,
    /// Overrides `max_sets` of every new pool
    pub pool_capacity_override: Option<u32>,
    /// Next N allocations fail with `FragmentedPool`
    pub fragmented_failures: u32,
    pub pool_resets: usize,
    pub descriptor_writes: Vec<(DescriptorSetHandle, DescriptorWrite)>,

    // Shaders / pipelines
    pub reflections: FxHashMap<Vec<u8>, ShaderReflection>,
    pub pipeline_layout_descs: FxHashMap<u64, PipelineLayoutDesc>,
    pub graphics_pipelines: FxHashMap<u64, GraphicsPipelineState>,
    pub compute_pipelines: FxHashMap<u64, ComputePipelineState>,

    // Command buffers
    pub recording: FxHashSet<u64>,
    pub commands: Vec<String>,
    pub submissions: Vec<MockSubmission>,
    pub queue_wait_idle_calls: usize,
    pub wait_idle_calls: usize,

    // Fences
    pub fences: FxHashMap<u64, bool>,
    /// Submitted fences not yet signaled, in submission order
    pub pending_fences: Vec<u64>,
    /// Largest number of pending fences ever observed
    pub max_outstanding: usize,
    pub fence_waits: usize,
}

impl MockState {
    fn track(&mut self, kind: &'static str) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.live.entry(kind).or_default().insert(raw);
        *self.created.entry(kind).or_default() += 1;
        raw
    }

    fn untrack(&mut self, kind: &'static str, raw: u64) {
        let removed = self.live.get_mut(kind).map(|set| set.remove(&raw)).unwrap_or(false);
        if !removed {
            self.invalid_destroys.push((kind, raw));
        }
    }

    fn is_live(&self, kind: &'static str, raw: u64) -> bool {
        self.live.get(kind).map(|set| set.contains(&raw)).unwrap_or(false)
    }

    /// Live objects of `kind`
    pub fn live_count(&self, kind: &'static str) -> usize {
        self.live.get(kind).map(|set| set.len()).unwrap_or(0)
    }

    /// Objects of `kind` ever created
    pub fn created_count(&self, kind: &'static str) -> usize {
        self.created.get(kind).copied().unwrap_or(0)
    }

    fn signal_fence(&mut self, raw: u64) {
        self.pending_fences.retain(|f| *f != raw);
        if let Some(state) = self.fences.get_mut(&raw) {
            *state = true;
        }
    }

    fn signal_all(&mut self) {
        for raw in std::mem::take(&mut self.pending_fences) {
            if let Some(state) = self.fences.get_mut(&raw) {
                *state = true;
            }
        }
    }
}

// ============================================================================
// Mock device
// ============================================================================

/// Mock GraphicsDevice tracking every object without a GPU
#[derive(Debug)]
pub struct MockDevice {
    families: QueueFamilies,
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Default surface: 800x600, images 2..=3, B8G8R8A8_SRGB, FIFO + Mailbox
    pub fn new() -> Self {
        Self::with_capabilities(Self::default_capabilities())
    }

    pub fn default_capabilities() -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: Some(Extent2D::new(800, 600)),
            min_image_extent: Extent2D::new(1, 1),
            max_image_extent: Extent2D::new(4096, 4096),
            formats: vec![
                SurfaceFormat { format: Format::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonlinear },
                SurfaceFormat { format: Format::B8G8R8A8_SRGB, color_space: ColorSpace::SrgbNonlinear },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    pub fn with_capabilities(capabilities: SurfaceCapabilities) -> Self {
        Self {
            families: QueueFamilies { graphics: 0, present: 0, compute: Some(0) },
            state: Mutex::new(MockState {
                next_handle: 1,
                live: FxHashMap::default(),
                created: FxHashMap::default(),
                invalid_destroys: Vec::new(),
                capabilities,
                swapchain_image_override: None,
                swapchain_infos: Vec::new(),
                swapchain_images: FxHashMap::default(),
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                acquired: Vec::new(),
                presented: Vec::new(),
                image_descs: FxHashMap::default(),
                view_images: FxHashMap::default(),
                buffers: FxHashMap::default(),
                depth_formats: vec![Format::D32_SFLOAT, Format::D24_UNORM_S8_UINT, Format::D16_UNORM],
                render_pass_descs: FxHashMap::default(),
                framebuffer_descs: FxHashMap::default(),
                layout_bindings: FxHashMap::default(),
                pools: FxHashMap::default(),
                pool_capacity_override: None,
                fragmented_failures: 0,
                pool_resets: 0,
                descriptor_writes: Vec::new(),
                reflections: FxHashMap::default(),
                pipeline_layout_descs: FxHashMap::default(),
                graphics_pipelines: FxHashMap::default(),
                compute_pipelines: FxHashMap::default(),
                recording: FxHashSet::default(),
                commands: Vec::new(),
                submissions: Vec::new(),
                queue_wait_idle_calls: 0,
                wait_idle_calls: 0,
                fences: FxHashMap::default(),
                pending_fences: Vec::new(),
                max_outstanding: 0,
                fence_waits: 0,
            }),
        }
    }

    /// Use distinct graphics and present families
    pub fn with_families(mut self, families: QueueFamilies) -> Self {
        self.families = families;
        self
    }

    /// Lock the recorded state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Change the surface's reported current extent
    pub fn set_surface_extent(&self, extent: Extent2D) {
        self.state().capabilities.current_extent = Some(extent);
    }

    fn push_command(&self, command: String) {
        self.state().commands.push(command);
    }
}

impl GraphicsDevice for MockDevice {
    // ===== DEVICE / QUEUES =====

    fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    fn queue(&self, family: u32, index: u32) -> Result<QueueHandle> {
        Ok(QueueHandle::from_raw(1_000_000 + family as u64 * 16 + index as u64))
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(self.state().capabilities.clone())
    }

    fn supports_depth_format(&self, format: Format) -> bool {
        self.state().depth_formats.contains(&format)
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state();
        state.wait_idle_calls += 1;
        state.signal_all();
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: QueueHandle) -> Result<()> {
        let mut state = self.state();
        state.queue_wait_idle_calls += 1;
        state.signal_all();
        Ok(())
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&self, info: &SwapchainCreateInfo) -> Result<SwapchainHandle> {
        let mut state = self.state();
        if !info.old_swapchain.is_null() && !state.is_live("swapchain", info.old_swapchain.raw()) {
            engine_bail!("galaxy3d::mock", "old_swapchain {:?} is not live", info.old_swapchain);
        }
        let count = state.swapchain_image_override.unwrap_or(info.min_image_count);
        let raw = state.track("swapchain");
        let images: Vec<ImageHandle> = (0..count)
            .map(|_| {
                let image = state.next_handle;
                state.next_handle += 1;
                ImageHandle::from_raw(image)
            })
            .collect();
        state.swapchain_images.insert(raw, images);
        state.swapchain_infos.push(info.clone());
        state.next_image = 0;
        Ok(SwapchainHandle::from_raw(raw))
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        let mut state = self.state();
        state.untrack("swapchain", swapchain.raw());
        state.swapchain_images.remove(&swapchain.raw());
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        match self.state().swapchain_images.get(&swapchain.raw()) {
            Some(images) => Ok(images.clone()),
            None => Err(Error::InvalidResource(format!("unknown swapchain {:?}", swapchain))),
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        _timeout_ns: u64,
        _semaphore: SemaphoreHandle,
    ) -> Result<(u32, SwapchainStatus)> {
        let mut state = self.state();
        let status = state.acquire_script.pop_front().unwrap_or(SwapchainStatus::Ok);
        if status == SwapchainStatus::OutOfDate {
            return Ok((0, status));
        }
        let count = match state.swapchain_images.get(&swapchain.raw()) {
            Some(images) => images.len() as u32,
            None => return Err(Error::InvalidResource(format!("unknown swapchain {:?}", swapchain))),
        };
        let index = state.next_image % count;
        state.next_image += 1;
        state.acquired.push(index);
        Ok((index, status))
    }

    fn queue_present(
        &self,
        _queue: QueueHandle,
        _swapchain: SwapchainHandle,
        image_index: u32,
        _wait_semaphore: SemaphoreHandle,
    ) -> Result<SwapchainStatus> {
        let mut state = self.state();
        let status = state.present_script.pop_front().unwrap_or(SwapchainStatus::Ok);
        state.presented.push(image_index);
        Ok(status)
    }

    // ===== IMAGES / SAMPLERS =====

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        if desc.extent.is_zero() {
            engine_bail!("galaxy3d::mock", "create_image '{}': zero extent", desc.name);
        }
        let mut state = self.state();
        let raw = state.track("image");
        state.image_descs.insert(raw, desc.clone());
        Ok(ImageHandle::from_raw(raw))
    }

    fn destroy_image(&self, image: ImageHandle) {
        let mut state = self.state();
        state.untrack("image", image.raw());
        state.image_descs.remove(&image.raw());
    }

    fn create_image_view(&self, image: ImageHandle, _format: Format, _aspect: ImageAspect) -> Result<ImageViewHandle> {
        let mut state = self.state();
        let known = state.is_live("image", image.raw())
            || state.swapchain_images.values().any(|images| images.contains(&image));
        if !known {
            engine_bail!("galaxy3d::mock", "create_image_view: unknown image {:?}", image);
        }
        let raw = state.track("image_view");
        state.view_images.insert(raw, image.raw());
        Ok(ImageViewHandle::from_raw(raw))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        let mut state = self.state();
        state.untrack("image_view", view.raw());
        state.view_images.remove(&view.raw());
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<SamplerHandle> {
        Ok(SamplerHandle::from_raw(self.state().track("sampler")))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        self.state().untrack("sampler", sampler.raw());
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        if desc.size == 0 {
            engine_bail!("galaxy3d::mock", "create_buffer '{}': zero size", desc.name);
        }
        let mut state = self.state();
        let raw = state.track("buffer");
        state.buffers.insert(raw, (desc.clone(), vec![0; desc.size as usize]));
        Ok(BufferHandle::from_raw(raw))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let (desc, contents) = match state.buffers.get_mut(&buffer.raw()) {
            Some(entry) => entry,
            None => return Err(Error::InvalidResource(format!("unknown buffer {:?}", buffer))),
        };
        if desc.location == MemoryLocation::GpuOnly {
            return Err(Error::InvalidResource(format!("buffer '{}' is not host-visible", desc.name)));
        }
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} overflows buffer '{}' ({} bytes)",
                data.len(), offset, desc.name, contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state();
        state.untrack("buffer", buffer.raw());
        state.buffers.remove(&buffer.raw());
    }

    // ===== RENDER PASS / FRAMEBUFFER =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        let mut state = self.state();
        let raw = state.track("render_pass");
        state.render_pass_descs.insert(raw, desc.clone());
        Ok(RenderPassHandle::from_raw(raw))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        let mut state = self.state();
        state.untrack("render_pass", render_pass.raw());
        state.render_pass_descs.remove(&render_pass.raw());
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let mut state = self.state();
        if !state.is_live("render_pass", desc.render_pass.raw()) {
            engine_bail!("galaxy3d::mock", "create_framebuffer: render pass {:?} is not live", desc.render_pass);
        }
        if let Some(view) = desc.attachments.iter().find(|v| !state.is_live("image_view", v.raw())) {
            engine_bail!("galaxy3d::mock", "create_framebuffer: view {:?} is not live", view);
        }
        let raw = state.track("framebuffer");
        state.framebuffer_descs.insert(raw, desc.clone());
        Ok(FramebufferHandle::from_raw(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        let mut state = self.state();
        state.untrack("framebuffer", framebuffer.raw());
        state.framebuffer_descs.remove(&framebuffer.raw());
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let mut state = self.state();
        let raw = state.track("descriptor_set_layout");
        state.layout_bindings.insert(raw, bindings.to_vec());
        Ok(DescriptorSetLayoutHandle::from_raw(raw))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.state().untrack("descriptor_set_layout", layout.raw());
    }

    fn create_descriptor_pool(&self, max_sets: u32, _sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let mut state = self.state();
        let capacity = state.pool_capacity_override.unwrap_or(max_sets);
        let raw = state.track("descriptor_pool");
        state.pools.insert(raw, MockPool { capacity, used: 0 });
        Ok(DescriptorPoolHandle::from_raw(raw))
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        let mut state = self.state();
        state.pool_resets += 1;
        match state.pools.get_mut(&pool.raw()) {
            Some(entry) => {
                entry.used = 0;
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown pool {:?}", pool))),
        }
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let mut state = self.state();
        state.untrack("descriptor_pool", pool.raw());
        state.pools.remove(&pool.raw());
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let mut state = self.state();
        if !state.is_live("descriptor_set_layout", layout.raw()) {
            return Err(Error::InvalidResource(format!("unknown layout {:?}", layout)));
        }
        if state.fragmented_failures > 0 {
            state.fragmented_failures -= 1;
            return Err(Error::FragmentedPool);
        }
        let entry = match state.pools.get_mut(&pool.raw()) {
            Some(entry) => entry,
            None => return Err(Error::InvalidResource(format!("unknown pool {:?}", pool))),
        };
        if entry.used >= entry.capacity {
            return Err(Error::OutOfPoolMemory);
        }
        entry.used += 1;
        let raw = state.next_handle;
        state.next_handle += 1;
        Ok(DescriptorSetHandle::from_raw(raw))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let mut state = self.state();
        for write in writes {
            state.descriptor_writes.push((set, *write));
        }
        Ok(())
    }

    // ===== SHADERS / PIPELINES =====

    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle> {
        if code.is_empty() || code.len() % 4 != 0 {
            return Err(Error::ShaderModuleCreation(format!(
                "SPIR-V size {} is not a non-zero multiple of 4",
                code.len()
            )));
        }
        Ok(ShaderModuleHandle::from_raw(self.state().track("shader_module")))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.state().untrack("shader_module", module.raw());
    }

    fn reflect_shader(&self, code: &[u8], _stage: ShaderStageFlags) -> Result<ShaderReflection> {
        Ok(self.state().reflections.get(code).cloned().unwrap_or_default())
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let mut state = self.state();
        let raw = state.track("pipeline_layout");
        state.pipeline_layout_descs.insert(raw, desc.clone());
        Ok(PipelineLayoutHandle::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        let mut state = self.state();
        state.untrack("pipeline_layout", layout.raw());
        state.pipeline_layout_descs.remove(&layout.raw());
    }

    fn create_graphics_pipeline(&self, pipeline_state: &GraphicsPipelineState) -> Result<PipelineHandle> {
        let mut state = self.state();
        if !state.is_live("render_pass", pipeline_state.render_pass.raw()) {
            engine_bail!("galaxy3d::mock", "create_graphics_pipeline: render pass is not live");
        }
        let raw = state.track("pipeline");
        state.graphics_pipelines.insert(raw, pipeline_state.clone());
        Ok(PipelineHandle::from_raw(raw))
    }

    fn create_compute_pipeline(&self, pipeline_state: &ComputePipelineState) -> Result<PipelineHandle> {
        let mut state = self.state();
        let raw = state.track("pipeline");
        state.compute_pipelines.insert(raw, pipeline_state.clone());
        Ok(PipelineHandle::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        let mut state = self.state();
        state.untrack("pipeline", pipeline.raw());
        state.graphics_pipelines.remove(&pipeline.raw());
        state.compute_pipelines.remove(&pipeline.raw());
    }

    // ===== COMMAND POOLS / BUFFERS =====

    fn create_command_pool(&self, _queue_family: u32) -> Result<CommandPoolHandle> {
        Ok(CommandPoolHandle::from_raw(self.state().track("command_pool")))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        self.state().untrack("command_pool", pool.raw());
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let mut state = self.state();
        if !state.is_live("command_pool", pool.raw()) {
            engine_bail!("galaxy3d::mock", "allocate_command_buffer: pool {:?} is not live", pool);
        }
        Ok(CommandBufferHandle::from_raw(state.track("command_buffer")))
    }

    fn free_command_buffer(&self, _pool: CommandPoolHandle, cmd: CommandBufferHandle) {
        let mut state = self.state();
        state.untrack("command_buffer", cmd.raw());
        state.recording.remove(&cmd.raw());
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        if !state.recording.insert(cmd.raw()) {
            engine_bail!("galaxy3d::mock", "begin_command_buffer: {:?} already recording", cmd);
        }
        state.commands.push("begin".to_string());
        Ok(())
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        if !state.recording.remove(&cmd.raw()) {
            engine_bail!("galaxy3d::mock", "end_command_buffer: {:?} not recording", cmd);
        }
        state.commands.push("end".to_string());
        Ok(())
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let mut state = self.state();
        state.recording.remove(&cmd.raw());
        state.commands.push("reset".to_string());
        Ok(())
    }

    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo, fence: Option<FenceHandle>) -> Result<()> {
        let mut state = self.state();
        if let Some(cmd) = submit.command_buffers.iter().find(|c| state.recording.contains(&c.raw())) {
            engine_bail!("galaxy3d::mock", "queue_submit: {:?} is still recording", cmd);
        }
        if let Some(fence) = fence {
            let signaled = state.fences.get(&fence.raw()).copied();
            match signaled {
                Some(false) => {}
                Some(true) => engine_bail!("galaxy3d::mock", "queue_submit: fence {:?} is signaled", fence),
                None => engine_bail!("galaxy3d::mock", "queue_submit: unknown fence {:?}", fence),
            }
            state.pending_fences.push(fence.raw());
            state.max_outstanding = state.max_outstanding.max(state.pending_fences.len());
        }
        state.submissions.push(MockSubmission {
            queue,
            command_buffers: submit.command_buffers.to_vec(),
            wait_semaphores: submit.wait_semaphores.to_vec(),
            wait_stages: submit.wait_stages.to_vec(),
            signal_semaphores: submit.signal_semaphores.to_vec(),
            fence,
        });
        Ok(())
    }

    // ===== RECORDING =====

    fn cmd_begin_render_pass(&self, _cmd: CommandBufferHandle, info: &RenderPassBeginInfo) {
        self.push_command(format!("begin_render_pass({})", info.clear_values.len()));
    }

    fn cmd_next_subpass(&self, _cmd: CommandBufferHandle) {
        self.push_command("next_subpass".to_string());
    }

    fn cmd_end_render_pass(&self, _cmd: CommandBufferHandle) {
        self.push_command("end_render_pass".to_string());
    }

    fn cmd_bind_pipeline(&self, _cmd: CommandBufferHandle, bind_point: PipelineBindPoint, _pipeline: PipelineHandle) {
        self.push_command(format!("bind_pipeline({:?})", bind_point));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _cmd: CommandBufferHandle,
        _bind_point: PipelineBindPoint,
        _layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    ) {
        self.push_command(format!("bind_descriptor_sets({}, {})", first_set, sets.len()));
    }

    fn cmd_push_constants(
        &self,
        _cmd: CommandBufferHandle,
        _layout: PipelineLayoutHandle,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.push_command(format!("push_constants({}, {})", offset, data.len()));
    }

    fn cmd_set_viewport(&self, _cmd: CommandBufferHandle, _viewport: &Viewport) {
        self.push_command("set_viewport".to_string());
    }

    fn cmd_set_scissor(&self, _cmd: CommandBufferHandle, _scissor: &Rect2D) {
        self.push_command("set_scissor".to_string());
    }

    fn cmd_bind_vertex_buffers(&self, _cmd: CommandBufferHandle, first_binding: u32, buffers: &[BufferHandle], _offsets: &[u64]) {
        self.push_command(format!("bind_vertex_buffers({}, {})", first_binding, buffers.len()));
    }

    fn cmd_bind_index_buffer(&self, _cmd: CommandBufferHandle, _buffer: BufferHandle, _offset: u64, index_type: IndexType) {
        self.push_command(format!("bind_index_buffer({:?})", index_type));
    }

    fn cmd_draw(&self, _cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.push_command(format!("draw({}, {})", vertex_count, instance_count));
    }

    fn cmd_draw_indexed(
        &self,
        _cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.push_command(format!("draw_indexed({}, {})", index_count, instance_count));
    }

    fn cmd_dispatch(&self, _cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        self.push_command(format!("dispatch({}, {}, {})", x, y, z));
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let raw = state.track("fence");
        state.fences.insert(raw, signaled);
        Ok(FenceHandle::from_raw(raw))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let mut state = self.state();
        state.untrack("fence", fence.raw());
        state.fences.remove(&fence.raw());
        state.pending_fences.retain(|f| *f != fence.raw());
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], _timeout_ns: u64) -> Result<()> {
        let mut state = self.state();
        state.fence_waits += 1;
        for fence in fences {
            let raw = fence.raw();
            let signaled = state.fences.get(&raw).copied();
            match signaled {
                Some(true) => {}
                Some(false) if state.pending_fences.contains(&raw) => state.signal_fence(raw),
                // Unsignaled and never submitted: a real device would hang here
                Some(false) => engine_bail!("galaxy3d::mock", "wait on fence {:?} that is never signaled", fence),
                None => return Err(Error::InvalidResource(format!("unknown fence {:?}", fence))),
            }
        }
        Ok(())
    }

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()> {
        let mut state = self.state();
        for fence in fences {
            match state.fences.get_mut(&fence.raw()) {
                Some(signaled) => *signaled = false,
                None => return Err(Error::InvalidResource(format!("unknown fence {:?}", fence))),
            }
        }
        Ok(())
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        match self.state().fences.get(&fence.raw()) {
            Some(signaled) => Ok(*signaled),
            None => Err(Error::InvalidResource(format!("unknown fence {:?}", fence))),
        }
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        Ok(SemaphoreHandle::from_raw(self.state().track("semaphore")))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        self.state().untrack("semaphore", semaphore.raw());
    }
}

// ============================================================================
// Mock surface
// ============================================================================

/// Window surface whose size is driven by the test
#[derive(Debug)]
pub struct MockSurface {
    size: Mutex<Extent2D>,
    /// Sizes taken one per `wait_events` call
    pending_sizes: Mutex<VecDeque<Extent2D>>,
    wait_calls: AtomicUsize,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new(Extent2D::new(width, height)),
            pending_sizes: Mutex::new(VecDeque::new()),
            wait_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = Extent2D::new(width, height);
    }

    /// Sizes the window takes on successive `wait_events` calls
    pub fn queue_sizes(&self, sizes: &[Extent2D]) {
        self.pending_sizes.lock().unwrap().extend(sizes.iter().copied());
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }
}

impl WindowSurface for MockSurface {
    fn framebuffer_size(&self) -> Extent2D {
        *self.size.lock().unwrap()
    }

    fn wait_events(&self) {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.pending_sizes.lock().unwrap().pop_front() {
            *self.size.lock().unwrap() = next;
        }
    }
}

#[cfg(test)]
#[path = "mock_device_tests.rs"]
mod tests;
