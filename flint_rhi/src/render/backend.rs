//! Backend seam - the traits a native graphics backend implements

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::render::{
    BlendStateDesc, BufferBinding, BufferDesc, DepthStencilStateDesc, DisplaySurface,
    PipelineStateDesc, QueryType, RasterizerStateDesc, RenderDeviceConfig, SamplerDesc,
    ShaderStage, ShaderStageFlags, TextureDescription, Viewport,
};

// ============================================================================
// Common types
// ============================================================================

/// Which native API a backend drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// CPU emulation (tests, tooling)
    Headless,
    Direct3D11,
    OpenGL,
    Vulkan,
}

/// Behavioral differences between backends that callers may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Command lists are recorded for later playback (false: executed immediately)
    pub deferred_recording: bool,
    /// Command lists may be recorded on worker threads
    pub multithreaded_recording: bool,
    /// Textures and render targets can be read back to host memory
    pub host_readback: bool,
    /// GPU timestamp queries are supported
    pub timestamp_queries: bool,
}

/// Process-unique identity of a wrapper object
///
/// Used by the command-list state cache to remember what is bound without
/// holding a borrow on the bound object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn value(&self) -> u64 {
        self.0
    }
}

// ============================================================================
// Native objects
// ============================================================================

/// Downcast support shared by every native object
///
/// Call these on `&dyn NativeX` / `Box<dyn NativeX>` through `as_ref()` or
/// `into_any()`: a `Box` is itself `Any`, so `boxed.as_any()` would yield the box.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Recover a backend's concrete native type
///
/// # Errors
///
/// Returns `Error::InvalidResource` if the object was created by another backend.
pub fn downcast_native<'a, T: Any>(object: &'a dyn Any, kind: &str) -> Result<&'a T> {
    object.downcast_ref::<T>().ok_or_else(|| {
        Error::InvalidResource(format!("{} was not created by this backend", kind))
    })
}

/// Mutable variant of [`downcast_native`]
pub fn downcast_native_mut<'a, T: Any>(object: &'a mut dyn Any, kind: &str) -> Result<&'a mut T> {
    object.downcast_mut::<T>().ok_or_else(|| {
        Error::InvalidResource(format!("{} was not created by this backend", kind))
    })
}

/// Native buffer object
pub trait NativeBuffer: AsAny + Send + Sync {}

/// Native texture or render-target object
///
/// Render targets pre-build one view per (layer, mip) at creation time.
pub trait NativeTexture: AsAny + Send + Sync {}

/// Native sampler object
pub trait NativeSampler: AsAny + Send + Sync {}

/// Native shader object (tagged by stage inside the backend)
pub trait NativeShader: AsAny + Send + Sync {
    fn stage(&self) -> ShaderStage;
}

/// Native blend state object
pub trait NativeBlendState: AsAny + Send + Sync {}

/// Native depth-stencil state object
pub trait NativeDepthStencilState: AsAny + Send + Sync {}

/// Native rasterizer state object
pub trait NativeRasterizerState: AsAny + Send + Sync {}

/// Native pipeline state object
///
/// Exposes the native sub-states it was built from so the command list can
/// rebind them individually when their keys change. Compute pipelines have none.
pub trait NativePipelineState: AsAny + Send + Sync {
    fn blend_state(&self) -> Option<&dyn NativeBlendState>;
    fn depth_stencil_state(&self) -> Option<&dyn NativeDepthStencilState>;
    fn rasterizer_state(&self) -> Option<&dyn NativeRasterizerState>;
}

/// Native query pool object
pub trait NativeQueryPool: AsAny + Send + Sync {
    /// Called when the front-end ring hands out `index` again
    fn on_allocate(&mut self, _index: u32) {}
}

// ============================================================================
// Command list seam
// ============================================================================

/// Native per-list recording context
///
/// Recording calls never block. Calls that can be rejected by the backend
/// return `Result`; the front end decides how to recover.
pub trait NativeCommandList: AsAny + Send {
    /// Start recording (no-op on immediate backends)
    fn begin(&mut self) -> Result<()>;

    /// Finish recording (no-op on immediate backends)
    fn end(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: &Viewport);

    /// Bind the swapchain backbuffer as the only color target
    fn bind_backbuffer(&mut self) -> Result<()>;

    /// Bind color targets and an optional depth target
    ///
    /// `layer` is `None` for flat binding (every layer at `mip`), `Some` for
    /// one array slice. Returns `Error::IncompleteFramebuffer` when the
    /// combination is rejected.
    fn bind_render_targets(
        &mut self,
        targets: &[&dyn NativeTexture],
        depth: Option<&dyn NativeTexture>,
        layer: Option<u32>,
        mip: u32,
    ) -> Result<()>;

    fn clear_render_target(&mut self, target: &dyn NativeTexture, color: [f32; 4]);
    fn clear_depth_stencil(&mut self, target: &dyn NativeTexture, depth: f32, stencil: u8);

    /// Whether another list replaced device-wide fixed-function state since
    /// this list last bound any
    ///
    /// Backends where every list records into one shared context (OpenGL)
    /// answer `true` after interleaving; the caller then forgets its cached
    /// state keys. Deferred backends keep state per list.
    fn shared_state_changed(&mut self) -> bool {
        false
    }

    /// Bind shaders, input layout and topology of a pipeline
    fn bind_pipeline_state(&mut self, pipeline: &dyn NativePipelineState) -> Result<()>;
    fn bind_blend_state(&mut self, state: &dyn NativeBlendState);
    fn bind_depth_stencil_state(&mut self, state: &dyn NativeDepthStencilState);
    fn bind_rasterizer_state(&mut self, state: &dyn NativeRasterizerState);

    fn bind_buffer(&mut self, buffer: &dyn NativeBuffer, binding: BufferBinding);
    fn unbind_buffer(&mut self, binding: BufferBinding);
    fn bind_texture(&mut self, texture: &dyn NativeTexture, index: u32, stages: ShaderStageFlags);
    fn unbind_texture(&mut self, index: u32, stages: ShaderStageFlags);
    fn bind_sampler(&mut self, sampler: &dyn NativeSampler, index: u32, stages: ShaderStageFlags);

    /// Record a buffer content update
    fn update_buffer(&mut self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32);
    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: i32);
    fn draw_instanced_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        index_offset: u32,
        vertex_offset: i32,
        instance_offset: u32,
    );
    fn draw_instanced_indirect(&mut self, arguments: &dyn NativeBuffer, offset: u32);
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);

    fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32);
}

// ============================================================================
// Device seam
// ============================================================================

/// Device-level backend interface
///
/// Exactly one implementation is linked per binary. All `create_*` calls log
/// and return `Err` on native failure; all `destroy_*` calls must be made
/// while the device is alive.
pub trait RenderBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn capabilities(&self) -> BackendCapabilities;

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeBuffer>>;
    fn destroy_buffer(&self, buffer: Box<dyn NativeBuffer>);

    /// Immediate content update. Mapping failures return `Error::MappingFailed`
    /// and leave the buffer untouched.
    fn update_buffer(&self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()>;

    // ===== TEXTURES =====

    /// `initial_data` is laid out as `subresource_layouts(desc)` describes
    fn create_texture(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>>;

    /// Like `create_texture`, plus one render view per (layer, mip)
    fn create_render_target(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>>;

    fn destroy_texture(&self, texture: Box<dyn NativeTexture>);
    fn set_debug_name(&self, texture: &dyn NativeTexture, name: &str);

    /// Raw bytes of one subresource, tightly packed (row pitch as in the walk)
    fn read_subresource(&self, texture: &dyn NativeTexture, layer: u32, mip: u32) -> Result<Vec<u8>>;

    // ===== SAMPLERS / SHADERS =====

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn NativeSampler>>;
    fn destroy_sampler(&self, sampler: Box<dyn NativeSampler>);

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> Result<Box<dyn NativeShader>>;
    fn destroy_shader(&self, shader: Box<dyn NativeShader>);

    // ===== FIXED-FUNCTION STATE =====

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<Box<dyn NativeBlendState>>;
    fn destroy_blend_state(&self, state: Box<dyn NativeBlendState>);

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Result<Box<dyn NativeDepthStencilState>>;
    fn destroy_depth_stencil_state(&self, state: Box<dyn NativeDepthStencilState>);

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Result<Box<dyn NativeRasterizerState>>;
    fn destroy_rasterizer_state(&self, state: Box<dyn NativeRasterizerState>);

    // ===== PIPELINES =====

    fn create_pipeline_state(&self, desc: &PipelineStateDesc<'_>) -> Result<Box<dyn NativePipelineState>>;
    fn destroy_pipeline_state(&self, pipeline: Box<dyn NativePipelineState>);

    // ===== COMMAND LISTS =====

    fn create_command_list(&self) -> Result<Box<dyn NativeCommandList>>;
    fn destroy_command_list(&self, command_list: Box<dyn NativeCommandList>);

    /// Execute a recorded list on the device queue / immediate context
    fn submit_command_list(&self, command_list: &mut dyn NativeCommandList) -> Result<()>;

    // ===== QUERIES =====

    fn create_query_pool(&self, query_type: QueryType, capacity: u32) -> Result<Box<dyn NativeQueryPool>>;
    fn destroy_query_pool(&self, pool: Box<dyn NativeQueryPool>);

    /// Poll a query result; `None` while unavailable (never blocks)
    fn query_result(&self, pool: &mut dyn NativeQueryPool, index: u32) -> Option<u64>;

    /// Convert a raw timestamp delta to milliseconds
    fn timestamp_to_milliseconds(&self, pool: &dyn NativeQueryPool, ticks: u64) -> f64;

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()>;
    fn set_vsync_state(&mut self, enabled: bool);
    fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()>;
    fn backbuffer_size(&self) -> (u32, u32);
    fn wait_idle(&self) -> Result<()>;
}

/// Static constructor of a backend, selected at compile time
///
/// Implemented once per backend crate; `RenderDevice::create::<F>` calls it.
pub trait RenderBackendFactory {
    /// Create the native device/context and swapchain for `surface`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` carrying the native error code. The
    /// failure is fatal: there is no degraded mode.
    fn create_backend(
        surface: &dyn DisplaySurface,
        config: &RenderDeviceConfig,
    ) -> Result<Box<dyn RenderBackend>>;
}
