/// Pipeline module - graphics and compute pipelines with push constants

pub mod compute;
pub mod graphics;
pub mod pipeline;
pub mod push_constants;

pub use compute::*;
pub use graphics::*;
pub use pipeline::*;
pub use push_constants::*;
