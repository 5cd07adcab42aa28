#![allow(dead_code)]
#![cfg(windows)]
//! GPU test utilities - one shared Direct3D 11 device for every GPU test
//!
//! DXGI allows a single swapchain per window, so the tests share one device
//! created against a hidden window.

use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi::flint::RenderDevice;
use flint_rhi_d3d11::flint::D3D11Backend;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::{EventLoop, EventLoopBuilder};
use winit::platform::windows::EventLoopBuilderExtWindows;
use winit::window::Window;

static GPU_DEVICE: OnceLock<Arc<Mutex<RenderDevice>>> = OnceLock::new();

/// Kept alive for the device (the event loop is leaked)
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Shared device with the debug layer on, created on first use
pub fn get_test_device() -> Arc<Mutex<RenderDevice>> {
    GPU_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();
            let config = RenderDeviceConfig {
                enable_validation: true,
                vsync: false,
                ..RenderDeviceConfig::default()
            };
            let device = RenderDevice::create::<D3D11Backend>(&window, config)
                .expect("Failed to create the Direct3D 11 device for tests");

            // EventLoop is not Sync and cannot live in a static
            std::mem::forget(event_loop);
            GPU_WINDOW.set(window).ok();

            Arc::new(Mutex::new(device))
        })
        .clone()
}

/// Hidden 800x600 window on an any-thread event loop (tests run off the main thread)
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoopBuilder::new().with_any_thread(true).build().unwrap();

    let window_attrs = Window::default_attributes()
        .with_title("flint D3D11 test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);

    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}
