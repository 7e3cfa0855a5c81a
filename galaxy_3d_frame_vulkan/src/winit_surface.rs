/// WindowSurface adapter for winit windows

use galaxy_3d_frame::galaxy3d::device::{Extent2D, WindowSurface};
use std::sync::Arc;
use winit::window::Window;

/// Presentation window backed by winit
///
/// winit reports a zero inner size while the window is minimized, which the
/// swapchain treats as "wait before recreating".
pub struct WinitSurface {
    window: Arc<Window>,
}

impl WinitSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl WindowSurface for WinitSurface {
    fn framebuffer_size(&self) -> Extent2D {
        let size = self.window.inner_size();
        Extent2D::new(size.width, size.height)
    }
}
