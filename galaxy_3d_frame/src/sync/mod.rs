/// Synchronization module - RAII fences/semaphores and the frame ring

pub mod fence;
pub mod semaphore;
pub mod frame_sync;

pub use fence::*;
pub use semaphore::*;
pub use frame_sync::*;
