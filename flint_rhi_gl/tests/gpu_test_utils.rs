#![allow(dead_code)]
//! GPU test utilities - one GL 4.6 context on a dedicated thread
//!
//! A GL context is current on a single thread while the test harness runs
//! every test on its own. The context, its hidden window and the device live
//! on one worker thread; tests ship closures to it with [`with_test_device`].

use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi::flint::{Error, RenderDevice, Result};
use flint_rhi_gl::flint::{GlBackend, GlSurface};
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext, Version};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface as _, Surface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use std::ffi::{c_void, CString};
use std::num::NonZeroU32;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use winit::event_loop::EventLoop;
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
#[cfg(all(unix, not(target_os = "macos")))]
use winit::platform::x11::EventLoopBuilderExtX11;

type Job = Box<dyn FnOnce(&mut RenderDevice) + Send>;

static GL_THREAD: OnceLock<Mutex<Sender<Job>>> = OnceLock::new();

/// Run `body` against the shared device on the context thread
///
/// Panics inside `body` are re-raised on the calling test thread.
pub fn with_test_device<R, F>(body: F) -> R
where
    R: Send + 'static,
    F: FnOnce(&mut RenderDevice) -> R + Send + 'static,
{
    let (reply, result) = mpsc::channel();
    let job: Job = Box::new(move |device| {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(device)));
        let _ = reply.send(outcome);
    });

    GL_THREAD
        .get_or_init(spawn_gl_thread)
        .lock()
        .unwrap()
        .send(job)
        .expect("GL test thread is gone");

    match result.recv().expect("GL test thread dropped the job") {
        Ok(value) => value,
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn spawn_gl_thread() -> Mutex<Sender<Job>> {
    let (sender, jobs) = mpsc::channel::<Job>();
    thread::Builder::new()
        .name("flint-gl-tests".to_string())
        .spawn(move || {
            let (surface, _event_loop) = create_test_surface();
            let config = RenderDeviceConfig {
                enable_validation: true,
                vsync: false,
                ..RenderDeviceConfig::default()
            };
            let mut device = GlBackend::create_device(surface, config).expect("Failed to create the OpenGL device for tests");

            for job in jobs {
                job(&mut device);
            }
        })
        .expect("Failed to spawn the GL test thread");
    Mutex::new(sender)
}

// ============================================================================
// GLUTIN SURFACE
// ============================================================================

/// glutin context + window surface of a hidden 800x600 window
pub struct GlutinSurface {
    context: PossiblyCurrentContext,
    surface: Surface<WindowSurface>,
    size: Mutex<(u32, u32)>,
    _window: Window,
}

// Only ever used on the context thread, which GlContext enforces.
unsafe impl Send for GlutinSurface {}
unsafe impl Sync for GlutinSurface {}

impl GlSurface for GlutinSurface {
    fn get_proc_address(&self, name: &str) -> *const c_void {
        match CString::new(name) {
            Ok(name) => self.context.display().get_proc_address(&name),
            Err(_) => std::ptr::null(),
        }
    }

    fn swap_buffers(&self) -> Result<()> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| Error::BackendError(format!("swap_buffers failed: {}", e)))
    }

    fn set_swap_interval(&self, interval: u32) -> Result<()> {
        let interval = match NonZeroU32::new(interval) {
            Some(frames) => SwapInterval::Wait(frames),
            None => SwapInterval::DontWait,
        };
        self.surface
            .set_swap_interval(&self.context, interval)
            .map_err(|e| Error::BackendError(format!("set_swap_interval failed: {}", e)))
    }

    fn client_size(&self) -> (u32, u32) {
        *self.size.lock().unwrap()
    }

    fn resize(&self, width: u32, height: u32) {
        if let (Some(w), Some(h)) = (NonZeroU32::new(width), NonZeroU32::new(height)) {
            self.surface.resize(&self.context, w, h);
            *self.size.lock().unwrap() = (width, height);
        }
    }
}

/// Hidden window with a current GL 4.6 core context (event loop returned to keep it alive)
#[allow(deprecated)]
pub fn create_test_surface() -> (Arc<dyn GlSurface>, EventLoop<()>) {
    let event_loop = {
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        {
            EventLoop::builder().with_any_thread(true).build().unwrap()
        }
        #[cfg(target_os = "macos")]
        {
            EventLoop::builder().build().unwrap()
        }
    };

    let window_attrs = Window::default_attributes()
        .with_title("flint GL test")
        .with_inner_size(winit::dpi::PhysicalSize::new(800, 600))
        .with_visible(false);

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(window_attrs))
        .build(&event_loop, ConfigTemplateBuilder::new(), |configs| {
            configs.max_by_key(|config| config.num_samples() == 0).unwrap()
        })
        .unwrap();
    let window = window.expect("glutin did not create a window");

    let raw_handle = window.window_handle().ok().map(|handle| handle.as_raw());
    let context_attrs = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(4, 6))))
        .with_profile(GlProfile::Core)
        .with_debug(true)
        .build(raw_handle);

    let display = gl_config.display();
    let not_current = unsafe { display.create_context(&gl_config, &context_attrs) }.unwrap();
    let surface_attrs = window.build_surface_attributes(Default::default()).unwrap();
    let surface = unsafe { display.create_window_surface(&gl_config, &surface_attrs) }.unwrap();
    let context = not_current.make_current(&surface).unwrap();

    let size = window.inner_size();
    let surface = GlutinSurface {
        context,
        surface,
        size: Mutex::new((size.width, size.height)),
        _window: window,
    };
    (Arc::new(surface), event_loop)
}
