/// GlContext - the GL function table shared by every native object
///
/// A GL context is current on exactly one thread. The table is wrapped with
/// the id of that thread, and every access goes through [`GlContext::gl`],
/// which refuses to hand the functions out anywhere else. Native objects hold
/// an `Arc<GlContext>` and delete their names in `Drop`.

use flint_rhi::flint::render::{BlendStateDesc, DepthStencilStateDesc};
use flint_rhi::flint::{Error, Result};
use std::ffi::{c_char, c_void};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::gl_state::{GlBlendState, GlDepthStencilState};
use std::thread::{self, ThreadId};

/// Window-system side of an OpenGL device
///
/// Implemented by the application over whatever created the context (glutin,
/// SDL, a native WGL/GLX/EGL wrapper). The context must be current on the
/// calling thread whenever the backend is created or used.
pub trait GlSurface: Send + Sync {
    /// Address of a GL entry point, null when unavailable
    fn get_proc_address(&self, name: &str) -> *const c_void;

    /// Present the default framebuffer
    fn swap_buffers(&self) -> Result<()>;

    /// 0 disables vsync, 1 waits for one vertical blank
    fn set_swap_interval(&self, interval: u32) -> Result<()>;

    /// Current drawable size in pixels
    fn client_size(&self) -> (u32, u32);

    /// Resize the drawable (no-op for surfaces that follow their window)
    fn resize(&self, _width: u32, _height: u32) {}
}

// ===== ARB_gl_spirv =====

pub(crate) const SHADER_BINARY_FORMAT_SPIR_V: u32 = 0x9551;

type ShaderBinaryFn =
    unsafe extern "system" fn(count: i32, shaders: *const u32, binary_format: u32, binary: *const c_void, length: i32);
type SpecializeShaderFn = unsafe extern "system" fn(
    shader: u32,
    entry_point: *const c_char,
    constant_count: u32,
    constant_indices: *const u32,
    constant_values: *const u32,
);

/// SPIR-V ingestion entry points, loaded beside the glow table
#[derive(Clone, Copy)]
pub(crate) struct SpirvEntryPoints {
    pub shader_binary: ShaderBinaryFn,
    pub specialize_shader: SpecializeShaderFn,
}

impl SpirvEntryPoints {
    /// `None` when the driver does not export both functions
    pub(crate) fn load(surface: &dyn GlSurface) -> Option<Self> {
        let shader_binary = surface.get_proc_address("glShaderBinary");
        let specialize_shader = surface.get_proc_address("glSpecializeShader");
        if shader_binary.is_null() || specialize_shader.is_null() {
            return None;
        }
        unsafe {
            Some(Self {
                shader_binary: std::mem::transmute::<*const c_void, ShaderBinaryFn>(shader_binary),
                specialize_shader: std::mem::transmute::<*const c_void, SpecializeShaderFn>(specialize_shader),
            })
        }
    }
}

// ===== CONTEXT =====

/// GL function table bound to its owning thread
pub struct GlContext {
    gl: glow::Context,
    spirv: Option<SpirvEntryPoints>,
    owner: ThreadId,
    /// Command list that last replayed fixed-function state, 0 for none
    state_owner: AtomicU64,
    applied: Mutex<AppliedState>,
}

/// Blend and depth-stencil state currently live in the context
///
/// Clears override the write masks and restore them from here, whichever
/// command list set them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AppliedState {
    pub blend: GlBlendState,
    pub depth_stencil: GlDepthStencilState,
}

impl AppliedState {
    /// State of a freshly created context
    fn context_defaults() -> Self {
        Self {
            blend: GlBlendState::new(&BlendStateDesc::default()),
            depth_stencil: GlDepthStencilState::new(&DepthStencilStateDesc {
                enable_depth_test: false,
                ..DepthStencilStateDesc::default()
            }),
        }
    }
}

// The table is only reachable through `gl()`, which checks the thread.
unsafe impl Send for GlContext {}
unsafe impl Sync for GlContext {}

impl GlContext {
    pub(crate) fn new(gl: glow::Context, spirv: Option<SpirvEntryPoints>) -> Self {
        Self {
            gl,
            spirv,
            owner: thread::current().id(),
            state_owner: AtomicU64::new(0),
            applied: Mutex::new(AppliedState::context_defaults()),
        }
    }

    /// SPIR-V entry points, checked against the context thread like `gl()`
    pub(crate) fn spirv(&self) -> Result<Option<SpirvEntryPoints>> {
        self.gl()?;
        Ok(self.spirv)
    }

    /// Function table, or `Error::InvalidState` off the context thread
    pub fn gl(&self) -> Result<&glow::Context> {
        if thread::current().id() == self.owner {
            Ok(&self.gl)
        } else {
            Err(Error::InvalidState(
                "OpenGL called from a thread other than the context thread".to_string(),
            ))
        }
    }

    /// Record `list` as the last one to touch fixed-function state
    ///
    /// Returns `true` when a different list (or none) held it before.
    pub(crate) fn claim_state(&self, list: u64) -> bool {
        self.state_owner.swap(list, Ordering::Relaxed) != list
    }

    pub(crate) fn applied_state(&self) -> AppliedState {
        match self.applied.lock() {
            Ok(applied) => *applied,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn update_applied_state(&self, update: impl FnOnce(&mut AppliedState)) {
        match self.applied.lock() {
            Ok(mut applied) => update(&mut applied),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    /// Function table for `Drop` impls
    ///
    /// Logs and returns `None` off the context thread; the GL name leaks.
    pub(crate) fn gl_for_drop(&self, what: &str) -> Option<&glow::Context> {
        match self.gl() {
            Ok(gl) => Some(gl),
            Err(_) => {
                flint_rhi::rhi_error!("flint::gl", "{} dropped off the context thread, leaking it", what);
                None
            }
        }
    }
}

/// Drain `glGetError`, returning the first error code (0 if none)
pub(crate) fn take_error(gl: &glow::Context) -> u32 {
    use glow::HasContext;

    let first = unsafe { gl.get_error() };
    if first != glow::NO_ERROR {
        // Flags are sticky per category; clear the rest so later checks start clean
        for _ in 0..8 {
            if unsafe { gl.get_error() } == glow::NO_ERROR {
                break;
            }
        }
    }
    first
}
