//! Unit tests for descriptor_set.rs

use std::sync::Arc;

use crate::config::{Config, DescriptorPoolConfig};
use crate::descriptor::{DescriptorAllocator, DescriptorLayoutCache, DescriptorSet};
use crate::device::mock_device::MockDevice;
use crate::device::*;
use crate::resource::{Buffer, Image2d, Sampler};

struct Fixture {
    device: Arc<MockDevice>,
    ctx: Arc<DeviceContext>,
    allocator: DescriptorAllocator,
    layout: DescriptorSetLayoutHandle,
    _cache: DescriptorLayoutCache,
}

fn setup() -> Fixture {
    let device = Arc::new(MockDevice::new());
    let ctx = DeviceContext::new(device.clone(), &Config::default()).unwrap();
    let mut cache = DescriptorLayoutCache::new(ctx.clone());
    let layout = cache
        .create_descriptor_layout(&[
            DescriptorBinding::new(0, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX),
            DescriptorBinding::new(1, DescriptorType::CombinedImageSampler, ShaderStageFlags::FRAGMENT),
        ])
        .unwrap();
    let allocator = DescriptorAllocator::new(ctx.clone(), DescriptorPoolConfig::default());
    Fixture { device, ctx, allocator, layout, _cache: cache }
}

#[test]
fn test_writes_are_staged_until_update() {
    let mut f = setup();
    let buffer = Buffer::uniform(f.ctx.clone(), "camera", 64).unwrap();
    let image = Image2d::new(
        f.ctx.clone(),
        "albedo",
        Extent2D::new(4, 4),
        Format::R8G8B8A8_SRGB,
        ImageUsage::SAMPLED,
    )
    .unwrap();
    let sampler = Sampler::new(f.ctx.clone(), &SamplerDesc::default()).unwrap();

    let mut set = DescriptorSet::new(f.ctx.clone(), &mut f.allocator, f.layout).unwrap();
    set.write_uniform(0, &buffer).write_image_sampler(1, &image, &sampler);
    assert_eq!(set.pending_writes(), 2);
    assert!(f.device.state().descriptor_writes.is_empty());

    set.update().unwrap();
    assert_eq!(set.pending_writes(), 0);

    let state = f.device.state();
    assert_eq!(state.descriptor_writes.len(), 2);
    let (target, first) = state.descriptor_writes[0];
    assert_eq!(target, set.handle());
    assert_eq!(
        first.resource,
        DescriptorResource::UniformBuffer { buffer: buffer.handle(), offset: 0, range: 64 }
    );
    assert_eq!(
        state.descriptor_writes[1].1.resource,
        DescriptorResource::CombinedImageSampler { view: image.view(), sampler: sampler.handle() }
    );
}

#[test]
fn test_update_without_writes_is_noop() {
    let mut f = setup();
    let mut set = DescriptorSet::new(f.ctx.clone(), &mut f.allocator, f.layout).unwrap();
    set.update().unwrap();
    assert!(f.device.state().descriptor_writes.is_empty());
}

#[test]
fn test_set_keeps_its_layout() {
    let mut f = setup();
    let set = DescriptorSet::new(f.ctx.clone(), &mut f.allocator, f.layout).unwrap();
    assert_eq!(set.layout(), f.layout);
    assert!(!set.handle().is_null());
}

#[test]
fn test_input_attachment_write() {
    let mut f = setup();
    let view = ImageViewHandle::from_raw(42);
    let mut set = DescriptorSet::new(f.ctx.clone(), &mut f.allocator, f.layout).unwrap();
    set.write_input_attachment(0, view).update().unwrap();

    let write = f.device.state().descriptor_writes[0].1;
    assert_eq!(write.resource.descriptor_type(), DescriptorType::InputAttachment);
}
