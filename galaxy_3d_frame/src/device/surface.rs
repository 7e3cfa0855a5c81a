/// WindowSurface trait - what the frame core needs from the windowing layer

use crate::device::types::Extent2D;
use std::time::Duration;

/// Window backing the presentation surface
///
/// The core only reads the framebuffer pixel size and, while the window is
/// minimized, asks the windowing layer to pump events until it is not.
pub trait WindowSurface: Send + Sync {
    /// Current framebuffer size in pixels (zero when minimized)
    fn framebuffer_size(&self) -> Extent2D;

    /// Block briefly until window events may have changed the size
    fn wait_events(&self) {
        std::thread::sleep(Duration::from_millis(16));
    }
}
