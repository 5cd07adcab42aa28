//! Display surface consumed once at device creation

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// How the surface is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Windowed,
    Fullscreen,
    Borderless,
}

/// Window-like object a swapchain can be created for
pub trait DisplaySurface: HasWindowHandle + HasDisplayHandle {
    /// Client area size in pixels
    fn client_size(&self) -> (u32, u32);

    /// Current display mode
    fn display_mode(&self) -> DisplayMode {
        DisplayMode::Windowed
    }
}

impl DisplaySurface for winit::window::Window {
    fn client_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }

    fn display_mode(&self) -> DisplayMode {
        match self.fullscreen() {
            Some(winit::window::Fullscreen::Exclusive(_)) => DisplayMode::Fullscreen,
            Some(winit::window::Fullscreen::Borderless(_)) => DisplayMode::Borderless,
            None => DisplayMode::Windowed,
        }
    }
}
