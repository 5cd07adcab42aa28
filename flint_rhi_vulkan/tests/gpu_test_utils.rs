#![allow(dead_code)]
//! GPU test utilities - one shared Vulkan device for every GPU test
//!
//! `ash-window` refuses to create a second surface for a window on some
//! platforms, so the tests share a single device created against a hidden
//! window, the way an application owns one device.

use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi::flint::RenderDevice;
use flint_rhi_vulkan::flint::VulkanBackend;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::{EventLoop, EventLoopBuilder};
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;

static GPU_DEVICE: OnceLock<Arc<Mutex<RenderDevice>>> = OnceLock::new();

/// Kept alive for the device (the event loop is leaked)
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Shared device, created on first use
pub fn get_test_device() -> Arc<Mutex<RenderDevice>> {
    GPU_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();
            let config = RenderDeviceConfig {
                enable_validation: true,
                vsync: false,
                ..RenderDeviceConfig::default()
            };
            let device = RenderDevice::create::<VulkanBackend>(&window, config)
                .expect("Failed to create the Vulkan device for tests");

            // EventLoop is not Sync and cannot live in a static
            std::mem::forget(event_loop);
            GPU_WINDOW.set(window).ok();

            Arc::new(Mutex::new(device))
        })
        .clone()
}

/// Hidden 800x600 window (any-thread event loop on Windows, for `cargo test`)
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = {
        #[cfg(target_os = "windows")]
        {
            EventLoopBuilder::new().with_any_thread(true).build().unwrap()
        }
        #[cfg(not(target_os = "windows"))]
        {
            EventLoopBuilder::new().build().unwrap()
        }
    };

    let window_attrs = Window::default_attributes()
        .with_title("flint GPU test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);

    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}
