/// Device module - the downward contract and the shared device context

pub mod types;
pub mod desc;
pub mod graphics_device;
pub mod surface;
pub mod device_context;

pub use types::*;
pub use desc::*;
pub use graphics_device::*;
pub use surface::*;
pub use device_context::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
