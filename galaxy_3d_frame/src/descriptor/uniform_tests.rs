//! Unit tests for uniform.rs

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::config::Config;
use crate::descriptor::UniformRing;
use crate::device::mock_device::MockDevice;
use crate::device::*;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: Mat4,
    exposure: f32,
    _pad: [f32; 3],
}

fn setup() -> (Arc<MockDevice>, Arc<DeviceContext>) {
    let device = Arc::new(MockDevice::new());
    let ctx = DeviceContext::new(device.clone(), &Config::default()).unwrap();
    (device, ctx)
}

#[test]
fn test_one_buffer_per_frame() {
    let (device, ctx) = setup();
    let ring = UniformRing::<CameraUniform>::new(ctx, "camera", 3).unwrap();

    assert_eq!(ring.len(), 3);
    assert_eq!(ring.buffer(0).unwrap().size(), std::mem::size_of::<CameraUniform>() as u64);
    assert_eq!(device.state().live_count("buffer"), 3);
}

#[test]
fn test_update_only_touches_its_frame() {
    let (device, ctx) = setup();
    let ring = UniformRing::<CameraUniform>::new(ctx, "camera", 2).unwrap();
    let value = CameraUniform {
        view_proj: Mat4::IDENTITY,
        exposure: 1.5,
        _pad: [0.0; 3],
    };

    ring.update(1, &value).unwrap();

    let state = device.state();
    let written = &state.buffers[&ring.buffer(1).unwrap().handle().raw()].1;
    let untouched = &state.buffers[&ring.buffer(0).unwrap().handle().raw()].1;
    assert_eq!(written.as_slice(), bytemuck::bytes_of(&value));
    assert!(untouched.iter().all(|b| *b == 0));
}

#[test]
fn test_descriptor_covers_whole_buffer() {
    let (_device, ctx) = setup();
    let ring = UniformRing::<CameraUniform>::new(ctx, "camera", 2).unwrap();

    match ring.descriptor(0).unwrap() {
        DescriptorResource::UniformBuffer { buffer, offset, range } => {
            assert_eq!(buffer, ring.buffer(0).unwrap().handle());
            assert_eq!(offset, 0);
            assert_eq!(range, std::mem::size_of::<CameraUniform>() as u64);
        }
        other => panic!("unexpected resource {:?}", other),
    }
}

#[test]
fn test_out_of_range_frame_is_violation() {
    let (_device, ctx) = setup();
    let ring = UniformRing::<CameraUniform>::new(ctx, "camera", 2).unwrap();
    let value = CameraUniform::zeroed();

    assert!(ring.update(2, &value).unwrap_err().is_contract_violation());
    assert!(ring.descriptor(5).unwrap_err().is_contract_violation());
}

#[test]
fn test_zero_frames_is_violation() {
    let (_device, ctx) = setup();
    let err = UniformRing::<CameraUniform>::new(ctx, "camera", 0).err().unwrap();
    assert!(err.is_contract_violation());
}
