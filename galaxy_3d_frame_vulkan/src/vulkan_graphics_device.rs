/// GraphicsDevice implementation for VulkanDevice
///
/// Contract handles carry the raw Vulkan handle (`Handle::as_raw`), so no
/// lookup table is needed except for the memory allocations backing images
/// and buffers.

use ash::vk;
use ash::vk::Handle;
use galaxy_3d_frame::galaxy3d::device::*;
use galaxy_3d_frame::galaxy3d::{Error, Result};
use galaxy_3d_frame::{engine_debug, engine_err, engine_error, engine_trace, engine_warn};
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use std::ffi::CString;

use crate::vulkan_conversions::*;
use crate::vulkan_device::VulkanDevice;
use crate::vulkan_reflection::{reflect_spirv, spirv_words};

impl VulkanDevice {
    fn lock_allocator(&self) -> std::sync::MutexGuard<'_, gpu_allocator::vulkan::Allocator> {
        self.allocator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shader_stage_info<'a>(
        &self,
        desc: &ShaderStageDesc,
        entry_point: &'a CString,
    ) -> vk::PipelineShaderStageCreateInfo<'a> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stages_to_vk(desc.stage))
            .module(vk_handle(desc.module.raw()))
            .name(entry_point.as_c_str())
    }
}

fn entry_point_name(desc: &ShaderStageDesc) -> Result<CString> {
    CString::new(desc.entry_point.as_str()).map_err(|_| {
        Error::InvalidResource(format!("entry point '{}' contains a NUL byte", desc.entry_point))
    })
}

impl GraphicsDevice for VulkanDevice {
    // ===== DEVICE / QUEUES =====

    fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    fn queue(&self, family: u32, index: u32) -> Result<QueueHandle> {
        if index != 0 || !self.created_families.contains(&family) {
            return Err(Error::InvalidResource(format!(
                "no queue {} was created on family {}",
                index, family
            )));
        }
        let queue = unsafe { self.device.get_device_queue(family, index) };
        Ok(QueueHandle::from_raw(queue.as_raw()))
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| map_vk_result(e, "Failed to query surface capabilities"))?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(self.physical_device, self.surface)
                .map_err(|e| map_vk_result(e, "Failed to query surface formats"))?;
            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)
                .map_err(|e| map_vk_result(e, "Failed to query present modes"))?;

            let (surface_formats, skipped) = surface_formats_from_vk(&formats);
            if !skipped.is_empty() {
                engine_warn!("galaxy3d::vulkan",
                    "Skipping {} surface format(s) with no engine equivalent: {:?}",
                    skipped.len(), skipped);
            }

            // u32::MAX means the swapchain decides its own extent
            let current_extent = if caps.current_extent.width == u32::MAX {
                None
            } else {
                Some(Extent2D::new(caps.current_extent.width, caps.current_extent.height))
            };

            Ok(SurfaceCapabilities {
                min_image_count: caps.min_image_count,
                max_image_count: caps.max_image_count,
                current_extent,
                min_image_extent: Extent2D::new(caps.min_image_extent.width, caps.min_image_extent.height),
                max_image_extent: Extent2D::new(caps.max_image_extent.width, caps.max_image_extent.height),
                formats: surface_formats,
                present_modes: present_modes.iter().filter_map(|&m| present_mode_from_vk(m)).collect(),
            })
        }
    }

    fn supports_depth_format(&self, format: Format) -> bool {
        let properties = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format_to_vk(format))
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| map_vk_result(e, "Failed to wait idle"))
        }
    }

    fn queue_wait_idle(&self, queue: QueueHandle) -> Result<()> {
        let _queue_guard = self.queue_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        unsafe {
            self.device
                .queue_wait_idle(vk_handle(queue.raw()))
                .map_err(|e| map_vk_result(e, "Failed to wait for queue"))
        }
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&self, info: &SwapchainCreateInfo) -> Result<SwapchainHandle> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| map_vk_result(e, "Failed to query surface capabilities"))?;

            let family_indices = [self.queue_families.graphics, self.queue_families.present];
            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(info.min_image_count)
                .image_format(format_to_vk(info.surface_format.format))
                .image_color_space(color_space_to_vk(info.surface_format.color_space))
                .image_extent(extent_to_vk(info.extent))
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .pre_transform(caps.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode_to_vk(info.present_mode))
                .clipped(true)
                .old_swapchain(vk_handle(info.old_swapchain.raw()));

            create_info = if self.queue_families.is_unified() {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            } else {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&family_indices)
            };

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create swapchain"))?;

            engine_debug!("galaxy3d::vulkan", "Swapchain created ({}x{}, {:?})",
                info.extent.width, info.extent.height, info.present_mode);
            Ok(SwapchainHandle::from_raw(swapchain.as_raw()))
        }
    }

    fn destroy_swapchain(&self, swapchain: SwapchainHandle) {
        unsafe { self.swapchain_loader.destroy_swapchain(vk_handle(swapchain.raw()), None) }
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>> {
        let images = unsafe {
            self.swapchain_loader
                .get_swapchain_images(vk_handle(swapchain.raw()))
                .map_err(|e| map_vk_result(e, "Failed to get swapchain images"))?
        };
        Ok(images.iter().map(|image| ImageHandle::from_raw(image.as_raw())).collect())
    }

    fn acquire_next_image(
        &self,
        swapchain: SwapchainHandle,
        timeout_ns: u64,
        semaphore: SemaphoreHandle,
    ) -> Result<(u32, SwapchainStatus)> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                vk_handle(swapchain.raw()),
                timeout_ns,
                vk_handle(semaphore.raw()),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok((index, swapchain_status_from_vk(Ok(suboptimal), "acquire")?)),
            Err(e) => Ok((0, swapchain_status_from_vk(Err(e), "Failed to acquire swapchain image")?)),
        }
    }

    fn queue_present(
        &self,
        queue: QueueHandle,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait_semaphore: SemaphoreHandle,
    ) -> Result<SwapchainStatus> {
        let wait_semaphores = [vk_handle::<vk::Semaphore>(wait_semaphore.raw())];
        let swapchains = [vk_handle::<vk::SwapchainKHR>(swapchain.raw())];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _queue_guard = self.queue_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let result = unsafe { self.swapchain_loader.queue_present(vk_handle(queue.raw()), &present_info) };
        swapchain_status_from_vk(result, "Failed to present swapchain image")
    }

    // ===== IMAGES / SAMPLERS =====

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageHandle> {
        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.extent.width, height: desc.extent.height, depth: 1 })
                .mip_levels(desc.mip_levels.max(1))
                .array_layers(desc.array_layers.max(1))
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(image_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self
                .device
                .create_image(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create image"))?;

            let requirements = self.device.get_image_memory_requirements(image);
            let allocation = match self.lock_allocator().allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    self.device.destroy_image(image, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("galaxy3d::vulkan",
                        "Out of GPU memory for image '{}' (required: {:.2} MB)", desc.name, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                self.lock_allocator().free(allocation).ok();
                self.device.destroy_image(image, None);
                return Err(map_vk_result(e, "Failed to bind image memory"));
            }

            self.image_allocations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(image.as_raw(), allocation);

            engine_trace!("galaxy3d::vulkan", "Image '{}' created ({}x{} {:?})",
                desc.name, desc.extent.width, desc.extent.height, desc.format);
            Ok(ImageHandle::from_raw(image.as_raw()))
        }
    }

    fn destroy_image(&self, image: ImageHandle) {
        let allocation = self
            .image_allocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&image.raw());
        match allocation {
            Some(allocation) => {
                self.lock_allocator().free(allocation).ok();
                unsafe { self.device.destroy_image(vk_handle(image.raw()), None) }
            }
            None => engine_warn!("galaxy3d::vulkan",
                "destroy_image on an image not created by this device (swapchain image?)"),
        }
    }

    fn create_image_view(&self, image: ImageHandle, format: Format, aspect: ImageAspect) -> Result<ImageViewHandle> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(vk_handle(image.raw()))
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: image_aspect_to_vk(aspect),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe {
            self.device
                .create_image_view(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create image view"))?
        };
        Ok(ImageViewHandle::from_raw(view.as_raw()))
    }

    fn destroy_image_view(&self, view: ImageViewHandle) {
        unsafe { self.device.destroy_image_view(vk_handle(view.raw()), None) }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerHandle> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let anisotropy = desc.max_anisotropy.filter(|_| self.anisotropy_supported);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        let sampler = unsafe {
            self.device
                .create_sampler(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create sampler"))?
        };
        Ok(SamplerHandle::from_raw(sampler.as_raw()))
    }

    fn destroy_sampler(&self, sampler: SamplerHandle) {
        unsafe { self.device.destroy_sampler(vk_handle(sampler.raw()), None) }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandle> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self.device.create_buffer(&create_info, None).map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create buffer of size {} bytes", desc.size);
                map_vk_result(e, "Failed to create buffer")
            })?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let allocation = match self.lock_allocator().allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: memory_location_to_allocator(desc.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    self.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("galaxy3d::vulkan",
                        "Out of GPU memory for buffer '{}' (required: {:.2} MB)", desc.name, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                self.lock_allocator().free(allocation).ok();
                self.device.destroy_buffer(buffer, None);
                return Err(map_vk_result(e, "Failed to bind buffer memory"));
            }

            self.buffer_allocations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(buffer.as_raw(), allocation);

            Ok(BufferHandle::from_raw(buffer.as_raw()))
        }
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let mut allocations = self.buffer_allocations.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let allocation = allocations
            .get_mut(&buffer.raw())
            .ok_or_else(|| Error::InvalidResource("write_buffer on an unknown buffer".to_string()))?;

        let mapped = allocation.mapped_slice_mut().ok_or_else(|| {
            engine_err!("galaxy3d::vulkan", "write_buffer on a buffer that is not host-visible")
        })?;

        let start = offset as usize;
        let end = start + data.len();
        if end > mapped.len() {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(), offset, mapped.len()
            )));
        }
        mapped[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let allocation = self
            .buffer_allocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&buffer.raw());
        if let Some(allocation) = allocation {
            self.lock_allocator().free(allocation).ok();
        }
        unsafe { self.device.destroy_buffer(vk_handle(buffer.raw()), None) }
    }

    // ===== RENDER PASS / FRAMEBUFFER =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassHandle> {
        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|a| vk::AttachmentDescription {
                flags: vk::AttachmentDescriptionFlags::empty(),
                format: format_to_vk(a.format),
                samples: sample_count_to_vk(a.samples),
                load_op: load_op_to_vk(a.load_op),
                store_op: store_op_to_vk(a.store_op),
                stencil_load_op: load_op_to_vk(a.stencil_load_op),
                stencil_store_op: store_op_to_vk(a.stencil_store_op),
                initial_layout: image_layout_to_vk(a.initial_layout),
                final_layout: image_layout_to_vk(a.final_layout),
            })
            .collect();

        let to_vk_ref = |r: &AttachmentReference| vk::AttachmentReference {
            attachment: r.attachment,
            layout: image_layout_to_vk(r.layout),
        };

        // Reference arrays must outlive the subpass descriptions pointing at them
        let references: Vec<(Vec<vk::AttachmentReference>, Option<vk::AttachmentReference>, Vec<vk::AttachmentReference>)> = desc
            .subpasses
            .iter()
            .map(|s| {
                (
                    s.color_attachments.iter().map(to_vk_ref).collect(),
                    s.depth_attachment.as_ref().map(to_vk_ref),
                    s.input_attachments.iter().map(to_vk_ref).collect(),
                )
            })
            .collect();

        let subpasses: Vec<vk::SubpassDescription> = references
            .iter()
            .map(|(colors, depth, inputs)| {
                let subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .color_attachments(colors)
                    .input_attachments(inputs);
                match depth {
                    Some(depth) => subpass.depth_stencil_attachment(depth),
                    None => subpass,
                }
            })
            .collect();

        let dependencies: Vec<vk::SubpassDependency> = desc
            .dependencies
            .iter()
            .map(|d| vk::SubpassDependency {
                src_subpass: subpass_ref_to_vk(d.src_subpass),
                dst_subpass: subpass_ref_to_vk(d.dst_subpass),
                src_stage_mask: pipeline_stages_to_vk(d.src_stage),
                dst_stage_mask: pipeline_stages_to_vk(d.dst_stage),
                src_access_mask: access_to_vk(d.src_access),
                dst_access_mask: access_to_vk(d.dst_access),
                dependency_flags: vk::DependencyFlags::BY_REGION,
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            self.device
                .create_render_pass(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create render pass"))?
        };
        engine_debug!("galaxy3d::vulkan", "Render pass created ({} attachment(s), {} subpass(es))",
            attachments.len(), subpasses.len());
        Ok(RenderPassHandle::from_raw(render_pass.as_raw()))
    }

    fn destroy_render_pass(&self, render_pass: RenderPassHandle) {
        unsafe { self.device.destroy_render_pass(vk_handle(render_pass.raw()), None) }
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferHandle> {
        let attachments: Vec<vk::ImageView> = desc.attachments.iter().map(|v| vk_handle(v.raw())).collect();
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_handle(desc.render_pass.raw()))
            .attachments(&attachments)
            .width(desc.extent.width)
            .height(desc.extent.height)
            .layers(desc.layers.max(1));
        let framebuffer = unsafe {
            self.device
                .create_framebuffer(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create framebuffer"))?
        };
        Ok(FramebufferHandle::from_raw(framebuffer.as_raw()))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferHandle) {
        unsafe { self.device.destroy_framebuffer(vk_handle(framebuffer.raw()), None) }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_set_layout(&self, bindings: &[DescriptorBinding]) -> Result<DescriptorSetLayoutHandle> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe {
            self.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create descriptor set layout"))?
        };
        Ok(DescriptorSetLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        unsafe { self.device.destroy_descriptor_set_layout(vk_handle(layout.raw()), None) }
    }

    fn create_descriptor_pool(&self, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<DescriptorPoolHandle> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(s.descriptor_type),
                descriptor_count: s.count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            self.device
                .create_descriptor_pool(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create descriptor pool"))?
        };
        Ok(DescriptorPoolHandle::from_raw(pool.as_raw()))
    }

    fn reset_descriptor_pool(&self, pool: DescriptorPoolHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(vk_handle(pool.raw()), vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| map_vk_result(e, "Failed to reset descriptor pool"))
        }
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        unsafe { self.device.destroy_descriptor_pool(vk_handle(pool.raw()), None) }
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle> {
        let layouts = [vk_handle::<vk::DescriptorSetLayout>(layout.raw())];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk_handle(pool.raw()))
            .set_layouts(&layouts);
        let sets = unsafe {
            self.device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|e| map_vk_result(e, "Failed to allocate descriptor set"))?
        };
        sets.first()
            .map(|set| DescriptorSetHandle::from_raw(set.as_raw()))
            .ok_or_else(|| engine_err!("galaxy3d::vulkan", "Descriptor set allocation returned no set"))
    }

    fn update_descriptor_set(&self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let dst_set: vk::DescriptorSet = vk_handle(set.raw());
        for write in writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(dst_set)
                .dst_binding(write.binding)
                .dst_array_element(write.array_element)
                .descriptor_type(descriptor_type_to_vk(write.resource.descriptor_type()));

            match write.resource {
                DescriptorResource::UniformBuffer { buffer, offset, range }
                | DescriptorResource::StorageBuffer { buffer, offset, range } => {
                    let info = [vk::DescriptorBufferInfo {
                        buffer: vk_handle(buffer.raw()),
                        offset,
                        range,
                    }];
                    unsafe { self.device.update_descriptor_sets(&[base.buffer_info(&info)], &[]) }
                }
                DescriptorResource::CombinedImageSampler { view, sampler } => {
                    let info = [vk::DescriptorImageInfo {
                        sampler: vk_handle(sampler.raw()),
                        image_view: vk_handle(view.raw()),
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    }];
                    unsafe { self.device.update_descriptor_sets(&[base.image_info(&info)], &[]) }
                }
                DescriptorResource::StorageImage { view } => {
                    let info = [vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk_handle(view.raw()),
                        image_layout: vk::ImageLayout::GENERAL,
                    }];
                    unsafe { self.device.update_descriptor_sets(&[base.image_info(&info)], &[]) }
                }
                DescriptorResource::InputAttachment { view } => {
                    let info = [vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk_handle(view.raw()),
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    }];
                    unsafe { self.device.update_descriptor_sets(&[base.image_info(&info)], &[]) }
                }
            }
        }
        Ok(())
    }

    // ===== SHADERS / PIPELINES =====

    fn create_shader_module(&self, code: &[u8]) -> Result<ShaderModuleHandle> {
        let words = spirv_words(code).map_err(|e| Error::ShaderModuleCreation(e.to_string()))?;
        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            self.device.create_shader_module(&create_info, None).map_err(|e| {
                engine_error!("galaxy3d::vulkan", "Failed to create shader module: {:?}", e);
                Error::ShaderModuleCreation(format!("{:?}", e))
            })?
        };
        Ok(ShaderModuleHandle::from_raw(module.as_raw()))
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        unsafe { self.device.destroy_shader_module(vk_handle(module.raw()), None) }
    }

    fn reflect_shader(&self, code: &[u8], stage: ShaderStageFlags) -> Result<ShaderReflection> {
        reflect_spirv(code, stage)
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> =
            desc.set_layouts.iter().map(|l| vk_handle(l.raw())).collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = desc
            .push_constant_ranges
            .iter()
            .map(|r| vk::PushConstantRange {
                stage_flags: shader_stages_to_vk(r.stages),
                offset: r.offset,
                size: r.size,
            })
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            self.device
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create pipeline layout"))?
        };
        Ok(PipelineLayoutHandle::from_raw(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        unsafe { self.device.destroy_pipeline_layout(vk_handle(layout.raw()), None) }
    }

    fn create_graphics_pipeline(&self, state: &GraphicsPipelineState) -> Result<PipelineHandle> {
        let entry_points = state.stages.iter().map(entry_point_name).collect::<Result<Vec<_>>>()?;
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = state
            .stages
            .iter()
            .zip(entry_points.iter())
            .map(|(stage, entry_point)| self.shader_stage_info(stage, entry_point))
            .collect();

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = state
            .vertex_input
            .bindings
            .iter()
            .map(|b| vk::VertexInputBindingDescription {
                binding: b.binding,
                stride: b.stride,
                input_rate: vertex_input_rate_to_vk(b.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = state
            .vertex_input
            .attributes
            .iter()
            .map(|a| vk::VertexInputAttributeDescription {
                location: a.location,
                binding: a.binding,
                format: format_to_vk(a.format),
                offset: a.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(state.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(polygon_mode_to_vk(state.polygon_mode))
            .cull_mode(cull_mode_to_vk(state.cull_mode))
            .front_face(front_face_to_vk(state.front_face))
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(sample_count_to_vk(state.samples));

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth.test_enabled())
            .depth_write_enable(state.depth.write_enabled())
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments =
            vec![blend_attachment_to_vk(state.blend); state.color_attachment_count as usize];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(vk_handle(state.layout.raw()))
            .render_pass(vk_handle(state.render_pass.raw()))
            .subpass(state.subpass);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| map_vk_result(e, "Failed to create graphics pipeline"))?
        };
        pipelines
            .first()
            .map(|p| PipelineHandle::from_raw(p.as_raw()))
            .ok_or_else(|| engine_err!("galaxy3d::vulkan", "Graphics pipeline creation returned no pipeline"))
    }

    fn create_compute_pipeline(&self, state: &ComputePipelineState) -> Result<PipelineHandle> {
        let entry_point = entry_point_name(&state.stage)?;
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(self.shader_stage_info(&state.stage, &entry_point))
            .layout(vk_handle(state.layout.raw()));
        let pipelines = unsafe {
            self.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| map_vk_result(e, "Failed to create compute pipeline"))?
        };
        pipelines
            .first()
            .map(|p| PipelineHandle::from_raw(p.as_raw()))
            .ok_or_else(|| engine_err!("galaxy3d::vulkan", "Compute pipeline creation returned no pipeline"))
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        unsafe { self.device.destroy_pipeline(vk_handle(pipeline.raw()), None) }
    }

    // ===== COMMAND POOLS / BUFFERS =====

    fn create_command_pool(&self, queue_family: u32) -> Result<CommandPoolHandle> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe {
            self.device
                .create_command_pool(&create_info, None)
                .map_err(|e| map_vk_result(e, "Failed to create command pool"))?
        };
        Ok(CommandPoolHandle::from_raw(pool.as_raw()))
    }

    fn destroy_command_pool(&self, pool: CommandPoolHandle) {
        unsafe { self.device.destroy_command_pool(vk_handle(pool.raw()), None) }
    }

    fn allocate_command_buffer(&self, pool: CommandPoolHandle) -> Result<CommandBufferHandle> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(vk_handle(pool.raw()))
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe {
            self.device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| map_vk_result(e, "Failed to allocate command buffer"))?
        };
        buffers
            .first()
            .map(|cmd| CommandBufferHandle::from_raw(cmd.as_raw()))
            .ok_or_else(|| engine_err!("galaxy3d::vulkan", "Command buffer allocation returned no buffer"))
    }

    fn free_command_buffer(&self, pool: CommandPoolHandle, cmd: CommandBufferHandle) {
        let buffers = [vk_handle::<vk::CommandBuffer>(cmd.raw())];
        unsafe { self.device.free_command_buffers(vk_handle(pool.raw()), &buffers) }
    }

    fn begin_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(vk_handle(cmd.raw()), &begin_info)
                .map_err(|e| map_vk_result(e, "Failed to begin command buffer"))
        }
    }

    fn end_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device
                .end_command_buffer(vk_handle(cmd.raw()))
                .map_err(|e| map_vk_result(e, "Failed to end command buffer"))
        }
    }

    fn reset_command_buffer(&self, cmd: CommandBufferHandle) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(vk_handle(cmd.raw()), vk::CommandBufferResetFlags::empty())
                .map_err(|e| map_vk_result(e, "Failed to reset command buffer"))
        }
    }

    fn queue_submit(&self, queue: QueueHandle, submit: &SubmitInfo, fence: Option<FenceHandle>) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> =
            submit.command_buffers.iter().map(|c| vk_handle(c.raw())).collect();
        let wait_semaphores: Vec<vk::Semaphore> =
            submit.wait_semaphores.iter().map(|s| vk_handle(s.raw())).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> =
            submit.wait_stages.iter().map(|&s| pipeline_stages_to_vk(s)).collect();
        let signal_semaphores: Vec<vk::Semaphore> =
            submit.signal_semaphores.iter().map(|s| vk_handle(s.raw())).collect();

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers)
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores);
        let fence = fence.map_or(vk::Fence::null(), |f| vk_handle(f.raw()));

        let _queue_guard = self.queue_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        unsafe {
            self.device
                .queue_submit(vk_handle(queue.raw()), &[submit_info], fence)
                .map_err(|e| map_vk_result(e, "Failed to submit command buffer"))
        }
    }

    // ===== RECORDING =====

    fn cmd_begin_render_pass(&self, cmd: CommandBufferHandle, info: &RenderPassBeginInfo) {
        let clear_values: Vec<vk::ClearValue> = info.clear_values.iter().map(clear_value_to_vk).collect();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_handle(info.render_pass.raw()))
            .framebuffer(vk_handle(info.framebuffer.raw()))
            .render_area(rect_to_vk(&info.render_area))
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(vk_handle(cmd.raw()), &begin_info, vk::SubpassContents::INLINE)
        }
    }

    fn cmd_next_subpass(&self, cmd: CommandBufferHandle) {
        unsafe { self.device.cmd_next_subpass(vk_handle(cmd.raw()), vk::SubpassContents::INLINE) }
    }

    fn cmd_end_render_pass(&self, cmd: CommandBufferHandle) {
        unsafe { self.device.cmd_end_render_pass(vk_handle(cmd.raw())) }
    }

    fn cmd_bind_pipeline(&self, cmd: CommandBufferHandle, bind_point: PipelineBindPoint, pipeline: PipelineHandle) {
        unsafe {
            self.device.cmd_bind_pipeline(
                vk_handle(cmd.raw()),
                bind_point_to_vk(bind_point),
                vk_handle(pipeline.raw()),
            )
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: CommandBufferHandle,
        bind_point: PipelineBindPoint,
        layout: PipelineLayoutHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
    ) {
        let vk_sets: Vec<vk::DescriptorSet> = sets.iter().map(|s| vk_handle(s.raw())).collect();
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                vk_handle(cmd.raw()),
                bind_point_to_vk(bind_point),
                vk_handle(layout.raw()),
                first_set,
                &vk_sets,
                &[],
            )
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: CommandBufferHandle,
        layout: PipelineLayoutHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(
                vk_handle(cmd.raw()),
                vk_handle(layout.raw()),
                shader_stages_to_vk(stages),
                offset,
                data,
            )
        }
    }

    fn cmd_set_viewport(&self, cmd: CommandBufferHandle, viewport: &Viewport) {
        let viewports = [vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        }];
        unsafe { self.device.cmd_set_viewport(vk_handle(cmd.raw()), 0, &viewports) }
    }

    fn cmd_set_scissor(&self, cmd: CommandBufferHandle, scissor: &Rect2D) {
        let scissors = [rect_to_vk(scissor)];
        unsafe { self.device.cmd_set_scissor(vk_handle(cmd.raw()), 0, &scissors) }
    }

    fn cmd_bind_vertex_buffers(&self, cmd: CommandBufferHandle, first_binding: u32, buffers: &[BufferHandle], offsets: &[u64]) {
        let vk_buffers: Vec<vk::Buffer> = buffers.iter().map(|b| vk_handle(b.raw())).collect();
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(vk_handle(cmd.raw()), first_binding, &vk_buffers, offsets)
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: CommandBufferHandle, buffer: BufferHandle, offset: u64, index_type: IndexType) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                vk_handle(cmd.raw()),
                vk_handle(buffer.raw()),
                offset,
                index_type_to_vk(index_type),
            )
        }
    }

    fn cmd_draw(&self, cmd: CommandBufferHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.device
                .cmd_draw(vk_handle(cmd.raw()), vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    fn cmd_draw_indexed(
        &self,
        cmd: CommandBufferHandle,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                vk_handle(cmd.raw()),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        }
    }

    fn cmd_dispatch(&self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(vk_handle(cmd.raw()), x, y, z) }
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| map_vk_result(e, "Failed to create fence"))?
        };
        Ok(FenceHandle::from_raw(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        unsafe { self.device.destroy_fence(vk_handle(fence.raw()), None) }
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], timeout_ns: u64) -> Result<()> {
        let vk_fences: Vec<vk::Fence> = fences.iter().map(|f| vk_handle(f.raw())).collect();
        unsafe {
            self.device
                .wait_for_fences(&vk_fences, true, timeout_ns)
                .map_err(|e| map_vk_result(e, "Failed to wait for fences"))
        }
    }

    fn reset_fences(&self, fences: &[FenceHandle]) -> Result<()> {
        let vk_fences: Vec<vk::Fence> = fences.iter().map(|f| vk_handle(f.raw())).collect();
        unsafe {
            self.device
                .reset_fences(&vk_fences)
                .map_err(|e| map_vk_result(e, "Failed to reset fences"))
        }
    }

    fn fence_status(&self, fence: FenceHandle) -> Result<bool> {
        unsafe {
            self.device
                .get_fence_status(vk_handle(fence.raw()))
                .map_err(|e| map_vk_result(e, "Failed to query fence status"))
        }
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe {
            self.device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| map_vk_result(e, "Failed to create semaphore"))?
        };
        Ok(SemaphoreHandle::from_raw(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        unsafe { self.device.destroy_semaphore(vk_handle(semaphore.raw()), None) }
    }
}
