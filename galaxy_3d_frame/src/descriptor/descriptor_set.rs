/// DescriptorSet - allocated set plus staged writes

use std::sync::Arc;

use crate::descriptor::DescriptorAllocator;
use crate::device::{
    DescriptorResource, DescriptorSetHandle, DescriptorSetLayoutHandle, DescriptorWrite,
    DeviceContext, ImageViewHandle,
};
use crate::error::Result;
use crate::resource::{Buffer, Image2d, Sampler};

/// Descriptor set
///
/// Writes are staged with `write*` and flushed to the device by `update`.
/// The set is released when its pool is reset, not on drop.
pub struct DescriptorSet {
    ctx: Arc<DeviceContext>,
    handle: DescriptorSetHandle,
    layout: DescriptorSetLayoutHandle,
    pending: Vec<DescriptorWrite>,
}

impl DescriptorSet {
    pub fn new(
        ctx: Arc<DeviceContext>,
        allocator: &mut DescriptorAllocator,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<Self> {
        let handle = allocator.allocate(layout)?;
        Ok(Self {
            ctx,
            handle,
            layout,
            pending: Vec::new(),
        })
    }

    pub fn handle(&self) -> DescriptorSetHandle {
        self.handle
    }

    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    /// Stage a write of `resource` into `binding`
    pub fn write(&mut self, binding: u32, resource: DescriptorResource) -> &mut Self {
        self.pending.push(DescriptorWrite {
            binding,
            array_element: 0,
            resource,
        });
        self
    }

    /// Stage the whole of `buffer` as a uniform buffer
    pub fn write_uniform(&mut self, binding: u32, buffer: &Buffer) -> &mut Self {
        self.write(
            binding,
            DescriptorResource::UniformBuffer {
                buffer: buffer.handle(),
                offset: 0,
                range: buffer.size(),
            },
        )
    }

    pub fn write_storage(&mut self, binding: u32, buffer: &Buffer) -> &mut Self {
        self.write(
            binding,
            DescriptorResource::StorageBuffer {
                buffer: buffer.handle(),
                offset: 0,
                range: buffer.size(),
            },
        )
    }

    pub fn write_image_sampler(&mut self, binding: u32, image: &Image2d, sampler: &Sampler) -> &mut Self {
        self.write(
            binding,
            DescriptorResource::CombinedImageSampler {
                view: image.view(),
                sampler: sampler.handle(),
            },
        )
    }

    pub fn write_storage_image(&mut self, binding: u32, image: &Image2d) -> &mut Self {
        self.write(binding, DescriptorResource::StorageImage { view: image.view() })
    }

    pub fn write_input_attachment(&mut self, binding: u32, view: ImageViewHandle) -> &mut Self {
        self.write(binding, DescriptorResource::InputAttachment { view })
    }

    /// Writes staged and not yet flushed
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Flush staged writes to the device
    pub fn update(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.ctx.device().update_descriptor_set(self.handle, &self.pending)?;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "descriptor_set_tests.rs"]
mod tests;
