//! Render graph module
//!
//! Attachments and subpasses declared by the caller, and the render pass
//! that turns them into a native pass plus one framebuffer per swapchain image.

pub mod attachment;
pub mod framebuffers;
pub mod render_pass;
pub mod subpass;

pub use attachment::*;
pub use framebuffers::*;
pub use render_pass::*;
pub use subpass::*;
