/// UniformRing - one host-visible uniform buffer per frame in flight
///
/// The CPU only ever writes the slot of the frame being built, so a write
/// never races the GPU reading an earlier frame's copy.

use std::marker::PhantomData;
use std::sync::Arc;
use bytemuck::Pod;

use crate::device::{DescriptorResource, DeviceContext};
use crate::error::{Error, Result};
use crate::resource::Buffer;

/// Per-frame ring of uniform buffers holding a `T`
pub struct UniformRing<T: Pod> {
    buffers: Vec<Buffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformRing<T> {
    /// Create `frames` buffers sized for one `T`
    pub fn new(ctx: Arc<DeviceContext>, name: &str, frames: usize) -> Result<Self> {
        if frames == 0 {
            return Err(Error::contract("UniformRing", "frame count must be at least 1"));
        }
        let size = std::mem::size_of::<T>() as u64;
        let buffers = (0..frames)
            .map(|frame| Buffer::uniform(ctx.clone(), &format!("{}[{}]", name, frame), size))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            buffers,
            _marker: PhantomData,
        })
    }

    fn slot(&self, frame: usize) -> Result<&Buffer> {
        self.buffers.get(frame).ok_or_else(|| {
            Error::contract(
                "UniformRing",
                format!("frame {} out of range ({} frames)", frame, self.buffers.len()),
            )
        })
    }

    /// Overwrite the copy used by `frame`
    pub fn update(&self, frame: usize, value: &T) -> Result<()> {
        self.slot(frame)?.write_pod(0, value)
    }

    pub fn buffer(&self, frame: usize) -> Result<&Buffer> {
        self.slot(frame)
    }

    /// Descriptor resource for `frame`'s buffer
    pub fn descriptor(&self, frame: usize) -> Result<DescriptorResource> {
        let buffer = self.slot(frame)?;
        Ok(DescriptorResource::UniformBuffer {
            buffer: buffer.handle(),
            offset: 0,
            range: buffer.size(),
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
#[path = "uniform_tests.rs"]
mod tests;
