//! Unit tests for layout_cache.rs

use std::sync::Arc;

use crate::config::Config;
use crate::descriptor::DescriptorLayoutCache;
use crate::device::mock_device::MockDevice;
use crate::device::*;

fn setup() -> (Arc<MockDevice>, Arc<DeviceContext>) {
    let device = Arc::new(MockDevice::new());
    let ctx = DeviceContext::new(device.clone(), &Config::default()).unwrap();
    (device, ctx)
}

fn ubo(binding: u32) -> DescriptorBinding {
    DescriptorBinding::new(binding, DescriptorType::UniformBuffer, ShaderStageFlags::VERTEX)
}

fn sampler(binding: u32) -> DescriptorBinding {
    DescriptorBinding::new(binding, DescriptorType::CombinedImageSampler, ShaderStageFlags::FRAGMENT)
}

#[test]
fn test_reversed_bindings_share_layout() {
    let (device, ctx) = setup();
    let mut cache = DescriptorLayoutCache::new(ctx);

    let forward = cache.create_descriptor_layout(&[ubo(0), sampler(1)]).unwrap();
    let reversed = cache.create_descriptor_layout(&[sampler(1), ubo(0)]).unwrap();

    assert_eq!(forward, reversed);
    assert_eq!(cache.len(), 1);
    assert_eq!(device.state().created_count("descriptor_set_layout"), 1);
}

#[test]
fn test_every_permutation_maps_to_one_layout() {
    let (_device, ctx) = setup();
    let mut cache = DescriptorLayoutCache::new(ctx);
    let bindings = [
        ubo(0),
        sampler(1),
        DescriptorBinding::new(2, DescriptorType::StorageBuffer, ShaderStageFlags::COMPUTE),
    ];
    let expected = cache.create_descriptor_layout(&bindings).unwrap();

    let permutations = [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in permutations {
        let permuted: Vec<_> = order.iter().map(|&i| bindings[i]).collect();
        assert_eq!(cache.create_descriptor_layout(&permuted).unwrap(), expected);
    }
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_device_receives_sorted_bindings() {
    let (device, ctx) = setup();
    let mut cache = DescriptorLayoutCache::new(ctx);
    let layout = cache.create_descriptor_layout(&[sampler(1), ubo(0)]).unwrap();

    let state = device.state();
    let bindings = &state.layout_bindings[&layout.raw()];
    assert_eq!(bindings[0].binding, 0);
    assert_eq!(bindings[1].binding, 1);
}

#[test]
fn test_distinct_structure_distinct_layouts() {
    let (_device, ctx) = setup();
    let mut cache = DescriptorLayoutCache::new(ctx);

    let base = cache.create_descriptor_layout(&[ubo(0)]).unwrap();
    let other_stage = cache
        .create_descriptor_layout(&[DescriptorBinding::new(0, DescriptorType::UniformBuffer, ShaderStageFlags::FRAGMENT)])
        .unwrap();
    let mut array = ubo(0);
    array.count = 4;
    let other_count = cache.create_descriptor_layout(&[array]).unwrap();

    assert_ne!(base, other_stage);
    assert_ne!(base, other_count);
    assert_ne!(other_stage, other_count);
    assert_eq!(cache.len(), 3);
}

#[test]
fn test_drop_destroys_layouts() {
    let (device, ctx) = setup();
    {
        let mut cache = DescriptorLayoutCache::new(ctx);
        cache.create_descriptor_layout(&[ubo(0)]).unwrap();
        cache.create_descriptor_layout(&[sampler(0)]).unwrap();
        assert_eq!(device.state().live_count("descriptor_set_layout"), 2);
    }
    assert_eq!(device.state().live_count("descriptor_set_layout"), 0);
}
