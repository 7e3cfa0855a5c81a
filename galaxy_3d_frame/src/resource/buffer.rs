/// Buffer - owned GPU buffer with its memory
///
/// The buffer handle and its allocation are created and released together:
/// construction either returns a complete buffer or nothing, and drop frees both.

use std::sync::Arc;
use bytemuck::Pod;

use crate::device::{BufferDesc, BufferHandle, BufferUsage, DeviceContext, MemoryLocation};
use crate::error::{Error, Result};

/// Owned GPU buffer
pub struct Buffer {
    ctx: Arc<DeviceContext>,
    handle: BufferHandle,
    size: u64,
    usage: BufferUsage,
    location: MemoryLocation,
}

impl Buffer {
    /// Create a buffer
    ///
    /// # Arguments
    ///
    /// * `ctx` - Device context
    /// * `desc` - Size, usage and memory location
    pub fn new(ctx: Arc<DeviceContext>, desc: &BufferDesc) -> Result<Self> {
        let handle = ctx.device().create_buffer(desc)?;
        Ok(Self {
            ctx,
            handle,
            size: desc.size,
            usage: desc.usage,
            location: desc.location,
        })
    }

    /// Host-visible uniform buffer of `size` bytes
    pub fn uniform(ctx: Arc<DeviceContext>, name: &str, size: u64) -> Result<Self> {
        Self::new(
            ctx,
            &BufferDesc {
                name: name.to_string(),
                size,
                usage: BufferUsage::UNIFORM,
                location: MemoryLocation::CpuToGpu,
            },
        )
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// Write raw bytes at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                self.size
            )));
        }
        self.ctx.device().write_buffer(self.handle, offset, data)
    }

    /// Write one plain-old-data value at `offset`
    pub fn write_pod<T: Pod>(&self, offset: u64, value: &T) -> Result<()> {
        self.write(offset, bytemuck::bytes_of(value))
    }

    /// Write a slice of plain-old-data values from the start of the buffer
    pub fn write_slice<T: Pod>(&self, values: &[T]) -> Result<()> {
        self.write(0, bytemuck::cast_slice(values))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.ctx.device().destroy_buffer(self.handle);
    }
}
