/// GlBackend - OpenGL 4.6 implementation of RenderBackend
///
/// The application owns the context and the window; the backend only needs a
/// [`GlSurface`] to load functions and present. Every native object shares the
/// function table through an `Arc<GlContext>` and must be used on the thread
/// the context is current on.

use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BackendCapabilities, BackendKind, BlendStateDesc,
    BufferDesc, DepthStencilStateDesc, NativeBlendState, NativeBuffer, NativeCommandList,
    NativeDepthStencilState, NativePipelineState, NativeQueryPool, NativeRasterizerState,
    NativeSampler, NativeShader, NativeTexture, PipelineStateDesc, QueryType, RasterizerStateDesc,
    RenderBackend, RenderDeviceConfig, SamplerDesc, ShaderStage, TextureDescription,
};
use flint_rhi::flint::{Error, RenderDevice, Result};
use flint_rhi::{rhi_debug, rhi_error, rhi_info, rhi_warn};
use glow::HasContext;
use std::sync::Arc;

use crate::debug::{gl_debug_message_callback, reset_debug_output_stats};
use crate::gl_buffer::GlBuffer;
use crate::gl_command_list::GlCommandList;
use crate::gl_context::{GlContext, GlSurface, SpirvEntryPoints};
use crate::gl_pipeline::GlPipelineState;
use crate::gl_query_pool::{nanoseconds_to_milliseconds, GlQueryPool};
use crate::gl_sampler::GlSampler;
use crate::gl_shader::GlShader;
use crate::gl_state::{GlBlendState, GlDepthStencilState, GlRasterizerState};
use crate::gl_texture::GlTexture;

/// Lowest desktop GL version the backend runs on
pub(crate) const REQUIRED_VERSION: (u32, u32) = (4, 6);

pub(crate) fn version_supported(major: u32, minor: u32, is_embedded: bool) -> bool {
    !is_embedded && (major, minor) >= REQUIRED_VERSION
}

/// OpenGL render backend
pub struct GlBackend {
    ctx: Arc<GlContext>,
    surface: Arc<dyn GlSurface>,
    max_anisotropy: f32,
    vsync: bool,
    renderer: String,
}

impl GlBackend {
    /// Wrap the context current on this thread
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if the context is older than GL 4.6 or
    /// an OpenGL ES context.
    pub fn new(surface: Arc<dyn GlSurface>, config: &RenderDeviceConfig) -> Result<Self> {
        let mut gl = unsafe { glow::Context::from_loader_function(|name| surface.get_proc_address(name)) };

        let version = gl.version();
        if !version_supported(version.major, version.minor, version.is_embedded) {
            let message = format!(
                "OpenGL {}.{} required, context is {}{}.{}",
                REQUIRED_VERSION.0,
                REQUIRED_VERSION.1,
                if version.is_embedded { "ES " } else { "" },
                version.major,
                version.minor
            );
            rhi_error!("flint::gl", "{}", message);
            return Err(Error::InitializationFailed(message));
        }

        let debug_output = config.enable_validation && gl.supports_debug();
        unsafe {
            if debug_output {
                reset_debug_output_stats();
                gl.enable(glow::DEBUG_OUTPUT);
                gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
                gl.debug_message_callback(gl_debug_message_callback);
            } else if config.enable_validation {
                rhi_warn!("flint::gl", "Validation requested but the context has no debug output");
            }

            gl.enable(glow::TEXTURE_CUBE_MAP_SEAMLESS);
            gl.enable(glow::FRAMEBUFFER_SRGB);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        }

        let max_anisotropy = unsafe { gl.get_parameter_f32(glow::MAX_TEXTURE_MAX_ANISOTROPY) };
        let renderer = unsafe { gl.get_parameter_string(glow::RENDERER) };
        let version_string = unsafe { gl.get_parameter_string(glow::VERSION) };

        let spirv = SpirvEntryPoints::load(surface.as_ref());
        if spirv.is_none() {
            rhi_warn!("flint::gl", "glSpecializeShader unavailable, only GLSL shaders can be created");
        }

        if let Err(e) = surface.set_swap_interval(config.vsync as u32) {
            rhi_warn!("flint::gl", "Failed to set the swap interval: {}", e);
        }

        rhi_info!(
            "flint::gl",
            "OpenGL device ready: {} ({}, debug output: {})",
            renderer,
            version_string,
            debug_output
        );
        rhi_debug!("flint::gl", "Max anisotropy {}", max_anisotropy);

        Ok(Self {
            ctx: Arc::new(GlContext::new(gl, spirv)),
            surface,
            max_anisotropy,
            vsync: config.vsync,
            renderer,
        })
    }

    /// Backend wrapped in a `RenderDevice`
    pub fn create_device(surface: Arc<dyn GlSurface>, config: RenderDeviceConfig) -> Result<RenderDevice> {
        let backend = Self::new(surface, &config)?;
        Ok(RenderDevice::from_backend(Box::new(backend), config))
    }

    /// `GL_RENDERER` string of the context
    pub fn renderer(&self) -> &str {
        &self.renderer
    }

    /// Shared function table, for interop with application GL code
    pub fn context(&self) -> &Arc<GlContext> {
        &self.ctx
    }
}

impl RenderBackend for GlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenGL
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            deferred_recording: false,
            multithreaded_recording: false,
            host_readback: true,
            timestamp_queries: true,
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeBuffer>> {
        Ok(Box::new(GlBuffer::create(&self.ctx, desc, initial_data)?))
    }

    fn destroy_buffer(&self, buffer: Box<dyn NativeBuffer>) {
        drop(buffer);
    }

    fn update_buffer(&self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        downcast_native::<GlBuffer>(buffer.as_any(), "Buffer")?.update(data)
    }

    // ===== TEXTURES =====

    fn create_texture(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(GlTexture::create(&self.ctx, desc, initial_data, false)?))
    }

    fn create_render_target(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(GlTexture::create(&self.ctx, desc, initial_data, true)?))
    }

    fn destroy_texture(&self, texture: Box<dyn NativeTexture>) {
        drop(texture);
    }

    fn set_debug_name(&self, texture: &dyn NativeTexture, name: &str) {
        if let Ok(texture) = downcast_native::<GlTexture>(texture.as_any(), "Texture") {
            texture.set_debug_name(name);
        }
    }

    fn read_subresource(&self, texture: &dyn NativeTexture, layer: u32, mip: u32) -> Result<Vec<u8>> {
        downcast_native::<GlTexture>(texture.as_any(), "Texture")?.read_subresource(layer, mip)
    }

    // ===== SAMPLERS / SHADERS =====

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn NativeSampler>> {
        Ok(Box::new(GlSampler::create(&self.ctx, desc, self.max_anisotropy)?))
    }

    fn destroy_sampler(&self, sampler: Box<dyn NativeSampler>) {
        drop(sampler);
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> Result<Box<dyn NativeShader>> {
        Ok(Box::new(GlShader::create(&self.ctx, stage, bytecode)?))
    }

    fn destroy_shader(&self, shader: Box<dyn NativeShader>) {
        drop(shader);
    }

    // ===== FIXED-FUNCTION STATE =====

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<Box<dyn NativeBlendState>> {
        if desc.sample_mask != !0 {
            rhi_warn!("flint::gl", "Blend state sample mask is not applied on OpenGL");
        }
        Ok(Box::new(GlBlendState::new(desc)))
    }

    fn destroy_blend_state(&self, state: Box<dyn NativeBlendState>) {
        drop(state);
    }

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Result<Box<dyn NativeDepthStencilState>> {
        if desc.enable_depth_bounds_test {
            rhi_warn!("flint::gl", "Depth bounds test is not part of core OpenGL, ignored");
        }
        Ok(Box::new(GlDepthStencilState::new(desc)))
    }

    fn destroy_depth_stencil_state(&self, state: Box<dyn NativeDepthStencilState>) {
        drop(state);
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Result<Box<dyn NativeRasterizerState>> {
        Ok(Box::new(GlRasterizerState::new(desc)))
    }

    fn destroy_rasterizer_state(&self, state: Box<dyn NativeRasterizerState>) {
        drop(state);
    }

    // ===== PIPELINES =====

    fn create_pipeline_state(&self, desc: &PipelineStateDesc<'_>) -> Result<Box<dyn NativePipelineState>> {
        Ok(Box::new(GlPipelineState::create(&self.ctx, desc)?))
    }

    fn destroy_pipeline_state(&self, pipeline: Box<dyn NativePipelineState>) {
        drop(pipeline);
    }

    // ===== COMMAND LISTS =====

    fn create_command_list(&self) -> Result<Box<dyn NativeCommandList>> {
        Ok(Box::new(GlCommandList::new(&self.ctx, self.surface.clone())?))
    }

    fn destroy_command_list(&self, command_list: Box<dyn NativeCommandList>) {
        drop(command_list);
    }

    fn submit_command_list(&self, command_list: &mut dyn NativeCommandList) -> Result<()> {
        downcast_native_mut::<GlCommandList>(command_list.as_any_mut(), "CommandList")?.submit()
    }

    // ===== QUERIES =====

    fn create_query_pool(&self, query_type: QueryType, capacity: u32) -> Result<Box<dyn NativeQueryPool>> {
        Ok(Box::new(GlQueryPool::create(&self.ctx, query_type, capacity)?))
    }

    fn destroy_query_pool(&self, pool: Box<dyn NativeQueryPool>) {
        drop(pool);
    }

    fn query_result(&self, pool: &mut dyn NativeQueryPool, index: u32) -> Option<u64> {
        downcast_native::<GlQueryPool>((*pool).as_any(), "QueryPool").ok()?.poll(index)
    }

    fn timestamp_to_milliseconds(&self, _pool: &dyn NativeQueryPool, ticks: u64) -> f64 {
        nanoseconds_to_milliseconds(ticks)
    }

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()> {
        self.ctx.gl()?;
        self.surface.swap_buffers()
    }

    fn set_vsync_state(&mut self, enabled: bool) {
        match self.surface.set_swap_interval(enabled as u32) {
            Ok(()) => self.vsync = enabled,
            Err(e) => rhi_error!("flint::gl", "Failed to change vsync state: {}", e),
        }
    }

    fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("Invalid backbuffer size {}x{}", width, height)));
        }
        self.surface.resize(width, height);
        rhi_debug!("flint::gl", "Backbuffer resized to {}x{} (vsync: {})", width, height, self.vsync);
        Ok(())
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        self.surface.client_size()
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.gl()?.finish() };
        Ok(())
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        let alive = Arc::strong_count(&self.ctx) - 1;
        if alive > 0 {
            rhi_warn!("flint::gl", "{} native object(s) outlive the OpenGL backend", alive);
        }
    }
}

#[cfg(test)]
#[path = "gl_tests.rs"]
mod tests;
