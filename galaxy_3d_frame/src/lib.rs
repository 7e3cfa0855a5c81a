/*!
# Galaxy 3D Frame

Platform-agnostic GPU frame-rendering core of the Galaxy 3D engine.

Everything here is written against a downward device contract
([`device::GraphicsDevice`] and [`device::WindowSurface`]); backends such as
`galaxy_3d_frame_vulkan` implement it. Components receive an
`Arc<DeviceContext>` at construction, there is no global device.

## Architecture

- **DeviceContext**: device, resolved queues, per-thread command pools
- **Swapchain**: surface negotiation, acquire/present, recreation
- **RenderPass**: attachments, subpasses, framebuffers per swapchain image
- **DescriptorAllocator / DescriptorLayoutCache**: pool rotation and layout dedup
- **GraphicsPipeline / ComputePipeline**: pipeline construction and binding
- **CommandBuffer / FrameSync**: recording state machine and frame pacing
- **Renderer**: the frame loop driving registered subrenders
*/

pub mod config;
pub mod error;
pub mod log;
pub mod device;
pub mod sync;
pub mod command;
pub mod swapchain;
pub mod descriptor;
pub mod render_graph;
pub mod pipeline;
pub mod resource;
pub mod renderer;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{Config, DebugSeverity, DescriptorPoolConfig};

    // Frame loop
    pub use crate::renderer::{FrameStats, FrameStatus, Renderer};

    // Logging sub-module (types only, macros stay at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    pub mod device {
        pub use crate::device::*;
    }

    pub mod render {
        pub use crate::command::*;
        pub use crate::descriptor::*;
        pub use crate::pipeline::*;
        pub use crate::render_graph::*;
        pub use crate::renderer::*;
        pub use crate::swapchain::*;
        pub use crate::sync::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }
}
