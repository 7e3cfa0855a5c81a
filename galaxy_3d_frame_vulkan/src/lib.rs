/*!
# Galaxy 3D Frame - Vulkan Backend

Vulkan implementation of the `galaxy_3d_frame` device contract.

Uses `ash` for the Vulkan bindings, `gpu-allocator` for memory management and
`spirq` for SPIR-V reflection. Validation layer support is compiled in with the
`vulkan-validation` feature and switched on at runtime by `Config::enable_validation`.

# Example

```no_run
use std::sync::Arc;
use galaxy_3d_frame::galaxy3d::{Config, Renderer};
use galaxy_3d_frame::galaxy3d::device::DeviceContext;
use galaxy_3d_frame_vulkan::{VulkanDevice, WinitSurface};
# fn run(window: Arc<winit::window::Window>) -> galaxy_3d_frame::galaxy3d::Result<()> {
let config = Config::default();
let device = Arc::new(VulkanDevice::new(window.as_ref(), &config)?);
let ctx = DeviceContext::new(device, &config)?;
let surface = Arc::new(WinitSurface::new(window));
let mut renderer = Renderer::new(ctx, surface, &config)?;
# Ok(())
# }
```
*/

#[cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]
mod debug;
mod vulkan_conversions;
mod vulkan_device;
mod vulkan_graphics_device;
mod vulkan_reflection;
mod winit_surface;

pub use vulkan_device::VulkanDevice;
pub use winit_surface::WinitSurface;
pub use vulkan_reflection::reflect_spirv;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
