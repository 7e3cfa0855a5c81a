/// Renderer module - frame loop, subrenders and their registry

pub mod registry;
pub mod renderer;
pub mod subrender;

pub use registry::*;
pub use renderer::*;
pub use subrender::*;
