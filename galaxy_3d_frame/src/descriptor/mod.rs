/// Descriptor module - layout cache, pool-rotating allocator, sets and per-frame uniforms

pub mod allocator;
pub mod descriptor_set;
pub mod layout_cache;
pub mod uniform;

pub use allocator::*;
pub use descriptor_set::*;
pub use layout_cache::*;
pub use uniform::*;
