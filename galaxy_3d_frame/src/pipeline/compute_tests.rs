//! Unit tests for compute.rs

use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::config::Config;
use crate::descriptor::DescriptorLayoutCache;
use crate::device::mock_device::MockDevice;
use crate::device::*;
use crate::pipeline::*;

const COMPUTE_SPV: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 5, 0, 0, 0];

fn setup() -> (Arc<MockDevice>, Arc<DeviceContext>, DescriptorLayoutCache) {
    let device = Arc::new(MockDevice::new());
    let ctx = DeviceContext::new(device.clone(), &Config::default()).unwrap();
    let cache = DescriptorLayoutCache::new(ctx.clone());
    (device, ctx, cache)
}

fn particles() -> ComputePipeline {
    ComputePipeline::new(
        ShaderSource::new(ShaderStageFlags::COMPUTE, COMPUTE_SPV.to_vec()),
        vec![vec![DescriptorBinding::new(0, DescriptorType::StorageBuffer, ShaderStageFlags::COMPUTE)]],
    )
}

#[test]
fn test_initialize_and_dispatch() {
    let (device, ctx, mut cache) = setup();
    let mut pipeline = particles();
    pipeline.add_push_constants(0, 16, ShaderStageFlags::COMPUTE).unwrap();
    pipeline.initialize(ctx.clone(), &mut cache).unwrap();
    let mut cmd = CommandBuffer::new(ctx, true).unwrap();

    pipeline.bind(&mut cmd).unwrap();
    pipeline.set_push_constants(&mut cmd, 0, &[0u8; 16]).unwrap();
    pipeline.dispatch(&mut cmd, 64, 1, 1).unwrap();

    let state = device.state();
    assert_eq!(state.compute_pipelines.len(), 1);
    assert_eq!(
        state.commands,
        vec!["begin", "bind_pipeline(Compute)", "push_constants(0, 16)", "dispatch(64, 1, 1)"]
    );
}

#[test]
fn test_dispatch_uninitialized_is_violation() {
    let (_device, ctx, _cache) = setup();
    let pipeline = particles();
    let mut cmd = CommandBuffer::new(ctx, true).unwrap();

    assert!(pipeline.dispatch(&mut cmd, 1, 1, 1).unwrap_err().is_contract_violation());
}

#[test]
fn test_compute_shares_cached_layouts() {
    let (_device, ctx, mut cache) = setup();
    let mut first = particles();
    let mut second = particles();
    first.initialize(ctx.clone(), &mut cache).unwrap();
    second.initialize(ctx, &mut cache).unwrap();

    assert_eq!(first.set_layout(0).unwrap(), second.set_layout(0).unwrap());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_drop_releases_native_objects() {
    let (device, ctx, mut cache) = setup();
    {
        let mut pipeline = particles();
        pipeline.initialize(ctx, &mut cache).unwrap();
    }
    let state = device.state();
    assert_eq!(state.live_count("pipeline"), 0);
    assert_eq!(state.live_count("pipeline_layout"), 0);
}
