/// GlCommandList - OpenGL implementation of NativeCommandList
///
/// GL has no command buffers, so every call executes immediately on the
/// context thread and submission only flushes. Framebuffers for bound target
/// sets are cached by texture identity. Vertex and index buffers are VAO
/// state, so they are tracked and re-attached whenever a pipeline changes the
/// vertex array.

use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BindMode, BufferBinding, NativeBlendState, NativeBuffer,
    NativeCommandList, NativeDepthStencilState, NativePipelineState, NativeQueryPool,
    NativeRasterizerState, NativeSampler, NativeTexture, ResourceId, ShaderStageFlags,
    Viewport,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_err, rhi_error, rhi_warn};
use glow::HasContext;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::gl_buffer::{GlBuffer, GlBufferStorage};
use crate::gl_context::{GlContext, GlSurface};
use crate::gl_conv::{clear_kind, index_type, ClearKind};
use crate::gl_pipeline::GlPipelineState;
use crate::gl_query_pool::GlQueryPool;
use crate::gl_sampler::GlSampler;
use crate::gl_state::{GlBlendState, GlDepthStencilState, GlRasterizerState};
use crate::gl_texture::{attach, AttachmentSource, GlTexture};

/// Simultaneous color attachments
const MAX_COLOR_TARGETS: usize = 8;

/// Framebuffers kept alive per command list
const FRAMEBUFFER_CACHE_SIZE: usize = 16;

// ===== FRAMEBUFFER CACHE =====

/// Attachment set of a framebuffer object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FramebufferKey {
    pub colors: Vec<ResourceId>,
    pub depth: Option<ResourceId>,
    pub layer: Option<u32>,
    pub mip: u32,
}

impl FramebufferKey {
    fn contains(&self, id: ResourceId) -> bool {
        self.colors.contains(&id) || self.depth == Some(id)
    }
}

/// Bounded map of framebuffer objects, oldest evicted first
#[derive(Debug, Default)]
pub(crate) struct FramebufferCache {
    entries: FxHashMap<FramebufferKey, glow::Framebuffer>,
    order: VecDeque<FramebufferKey>,
}

impl FramebufferCache {
    pub(crate) fn get(&self, key: &FramebufferKey) -> Option<glow::Framebuffer> {
        self.entries.get(key).copied()
    }

    /// Insert `framebuffer`, returning the one evicted to make room
    pub(crate) fn insert(&mut self, key: FramebufferKey, framebuffer: glow::Framebuffer) -> Option<glow::Framebuffer> {
        let evicted = if self.order.len() >= FRAMEBUFFER_CACHE_SIZE {
            self.order.pop_front().and_then(|oldest| self.entries.remove(&oldest))
        } else {
            None
        };
        self.order.push_back(key.clone());
        self.entries.insert(key, framebuffer);
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = glow::Framebuffer> + '_ {
        self.order.clear();
        self.entries.drain().map(|(_, framebuffer)| framebuffer)
    }
}

// ===== HELPERS =====

/// Top-left viewport rectangle in GL's bottom-left window space
pub(crate) fn gl_viewport(viewport: &Viewport, target_height: u32) -> (i32, i32, i32, i32) {
    let y = target_height as i32 - (viewport.y + viewport.height as i32);
    (viewport.x, y, viewport.width as i32, viewport.height as i32)
}

pub(crate) fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "complete",
        glow::FRAMEBUFFER_UNDEFINED => "undefined",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "missing attachment",
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "incomplete draw buffer",
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "incomplete read buffer",
        glow::FRAMEBUFFER_UNSUPPORTED => "unsupported format combination",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "mismatched sample counts",
        glow::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => "mismatched layered attachments",
        _ => "unknown status",
    }
}

fn draw_buffers(count: usize) -> Vec<u32> {
    (0..count as u32).map(|i| glow::COLOR_ATTACHMENT0 + i).collect()
}

/// Image access of a shader-writable buffer binding
pub(crate) fn image_access(mode: BindMode) -> u32 {
    match mode {
        BindMode::ReadOnly => glow::READ_ONLY,
        BindMode::WriteOnly => glow::READ_WRITE,
    }
}

fn render_target(texture: &dyn NativeTexture) -> Result<&GlTexture> {
    let texture = downcast_native::<GlTexture>(texture.as_any(), "RenderTarget")?;
    if !texture.is_render_target() {
        return Err(Error::IncompleteFramebuffer("Texture was not created as a render target".to_string()));
    }
    Ok(texture)
}

// ===== COMMAND LIST =====

#[derive(Debug, Clone)]
struct BoundTargets {
    framebuffer: Option<glow::Framebuffer>,
    key: Option<FramebufferKey>,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy)]
struct BoundPipeline {
    mode: u32,
    vertex_array: Option<glow::VertexArray>,
    is_compute: bool,
}

#[derive(Debug, Clone, Copy)]
struct IndexBuffer {
    buffer: glow::Buffer,
    element_type: u32,
    element_size: u32,
}

/// OpenGL command list implementation
pub struct GlCommandList {
    ctx: Arc<GlContext>,
    /// Identity used when claiming the shared fixed-function state
    state_id: u64,
    surface: Arc<dyn GlSurface>,
    recording: bool,
    framebuffers: FramebufferCache,
    clear_framebuffer: Option<glow::Framebuffer>,
    targets: Option<BoundTargets>,
    viewport: Option<Viewport>,
    pipeline: Option<BoundPipeline>,
    vertex_buffers: FxHashMap<u32, (glow::Buffer, i32)>,
    index_buffer: Option<IndexBuffer>,
    texture_targets: FxHashMap<u32, u32>,
}

impl GlCommandList {
    pub(crate) fn new(ctx: &Arc<GlContext>, surface: Arc<dyn GlSurface>) -> Result<Self> {
        ctx.gl()?;
        Ok(Self {
            ctx: ctx.clone(),
            state_id: ResourceId::next().value(),
            surface,
            recording: false,
            framebuffers: FramebufferCache::default(),
            clear_framebuffer: None,
            targets: None,
            viewport: None,
            pipeline: None,
            vertex_buffers: FxHashMap::default(),
            index_buffer: None,
            texture_targets: FxHashMap::default(),
        })
    }

    /// Commands already executed; push them to the driver
    pub(crate) fn submit(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list submitted while recording".to_string()));
        }
        unsafe { self.ctx.gl()?.flush() };
        Ok(())
    }

    /// Run `body` with the GL table, logging instead of failing
    fn with_gl(&mut self, name: &str, body: impl FnOnce(&mut Self, &glow::Context) -> Result<()>) {
        let ctx = self.ctx.clone();
        if let Err(e) = ctx.gl().and_then(|gl| body(self, gl)) {
            rhi_error!("flint::gl", "{} skipped: {}", name, e);
        }
    }

    // ===== TARGETS =====

    fn apply_viewport(&self, gl: &glow::Context) {
        let Some(targets) = &self.targets else {
            return;
        };
        let viewport = self.viewport.unwrap_or_else(|| Viewport::new(targets.width, targets.height));
        let (x, y, width, height) = gl_viewport(&viewport, targets.height);
        unsafe {
            gl.viewport(x, y, width, height);
            gl.depth_range_f32(viewport.min_depth, viewport.max_depth);
        }
    }

    fn ensure_targets(&mut self, gl: &glow::Context) -> Result<()> {
        if self.targets.is_none() {
            self.bind_default_framebuffer(gl);
        }
        Ok(())
    }

    fn bind_default_framebuffer(&mut self, gl: &glow::Context) {
        let (width, height) = self.surface.client_size();
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
        self.targets = Some(BoundTargets { framebuffer: None, key: None, width, height });
        self.apply_viewport(gl);
    }

    unsafe fn build_framebuffer(
        gl: &glow::Context,
        colors: &[AttachmentSource],
        depth: Option<(u32, AttachmentSource)>,
    ) -> Result<glow::Framebuffer> {
        let framebuffer = gl
            .create_framebuffer()
            .map_err(|e| rhi_err!("flint::gl", "Failed to create framebuffer: {}", e))?;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
        for (i, &source) in colors.iter().enumerate() {
            attach(gl, glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0 + i as u32, source);
        }
        if let Some((point, source)) = depth {
            attach(gl, glow::FRAMEBUFFER, point, source);
        }
        if colors.is_empty() {
            gl.draw_buffers(&[glow::NONE]);
            gl.read_buffer(glow::NONE);
        } else {
            gl.draw_buffers(&draw_buffers(colors.len()));
        }

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(framebuffer);
            return Err(Error::IncompleteFramebuffer(format!(
                "Framebuffer is {} ({:#x})",
                framebuffer_status_name(status),
                status
            )));
        }
        Ok(framebuffer)
    }

    /// Rebind whatever framebuffer the list had before a scratch operation
    fn restore_framebuffer(&self, gl: &glow::Context) {
        let framebuffer = self.targets.as_ref().and_then(|targets| targets.framebuffer);
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    /// Subresource a clear of `texture` covers: the bound range, or every layer of mip 0
    fn clear_source(&self, texture: &GlTexture) -> Option<AttachmentSource> {
        match self.targets.as_ref().and_then(|targets| targets.key.as_ref()) {
            Some(key) if key.contains(texture.id) => texture.attachment(key.layer, key.mip),
            _ => texture.attachment(None, 0),
        }
    }

    /// Attach `source` to the clear framebuffer and run `clear`
    fn clear_with(
        &mut self,
        gl: &glow::Context,
        point: u32,
        source: AttachmentSource,
        clear: impl FnOnce(&glow::Context),
    ) -> Result<()> {
        let framebuffer = match self.clear_framebuffer {
            Some(framebuffer) => framebuffer,
            None => {
                let framebuffer = unsafe { gl.create_framebuffer() }
                    .map_err(|e| rhi_err!("flint::gl", "Failed to create clear framebuffer: {}", e))?;
                self.clear_framebuffer = Some(framebuffer);
                framebuffer
            }
        };

        let result = unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            attach(gl, glow::FRAMEBUFFER, point, source);
            if point == glow::COLOR_ATTACHMENT0 {
                gl.draw_buffers(&[glow::COLOR_ATTACHMENT0]);
            } else {
                gl.draw_buffers(&[glow::NONE]);
            }
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            let result = if status == glow::FRAMEBUFFER_COMPLETE {
                clear(gl);
                Ok(())
            } else {
                Err(Error::IncompleteFramebuffer(format!(
                    "Clear target is {} ({:#x})",
                    framebuffer_status_name(status),
                    status
                )))
            };
            gl.framebuffer_texture(glow::FRAMEBUFFER, point, None, 0);
            result
        };
        self.restore_framebuffer(gl);
        result
    }

    // ===== DRAW PREPARATION =====

    fn prepare_draw(&mut self, gl: &glow::Context) -> Result<BoundPipeline> {
        let pipeline = self
            .pipeline
            .ok_or_else(|| Error::InvalidState("Draw without a bound pipeline state".to_string()))?;
        if pipeline.is_compute {
            return Err(Error::InvalidState("Draw with a compute pipeline bound".to_string()));
        }
        self.ensure_targets(gl)?;
        Ok(pipeline)
    }

    fn draw_with(&mut self, name: &str, record: impl FnOnce(&Self, &glow::Context, BoundPipeline) -> Result<()>) {
        self.with_gl(name, |list, gl| {
            let pipeline = list.prepare_draw(gl)?;
            record(list, gl, pipeline)
        });
    }

    fn index_buffer(&self) -> Result<IndexBuffer> {
        self.index_buffer
            .ok_or_else(|| Error::InvalidState("Indexed draw without an index buffer".to_string()))
    }

    /// Attach tracked vertex and index buffers to the current vertex array
    fn attach_vertex_buffers(&self, gl: &glow::Context) {
        unsafe {
            for (&slot, &(buffer, stride)) in &self.vertex_buffers {
                gl.bind_vertex_buffer(slot, Some(buffer), 0, stride);
            }
            if let Some(index) = self.index_buffer {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index.buffer));
            }
        }
    }

    fn has_vertex_array(&self) -> bool {
        self.pipeline.map(|p| p.vertex_array.is_some()).unwrap_or(false)
    }
}

impl NativeCommandList for GlCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list already recording".to_string()));
        }
        self.ctx.gl()?;
        self.recording = true;
        self.targets = None;
        self.viewport = None;
        self.pipeline = None;
        self.vertex_buffers.clear();
        self.index_buffer = None;
        self.texture_targets.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::InvalidState("Command list not recording".to_string()));
        }
        self.recording = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = Some(*viewport);
        self.with_gl("set_viewport", |list, gl| {
            list.apply_viewport(gl);
            Ok(())
        });
    }

    fn bind_backbuffer(&mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let gl = ctx.gl()?;
        self.bind_default_framebuffer(gl);
        Ok(())
    }

    fn bind_render_targets(
        &mut self,
        targets: &[&dyn NativeTexture],
        depth: Option<&dyn NativeTexture>,
        layer: Option<u32>,
        mip: u32,
    ) -> Result<()> {
        if targets.len() > MAX_COLOR_TARGETS {
            return Err(Error::IncompleteFramebuffer(format!(
                "{} color targets bound (max {})",
                targets.len(),
                MAX_COLOR_TARGETS
            )));
        }

        let mut textures = Vec::with_capacity(targets.len());
        for &target in targets {
            textures.push(render_target(target)?);
        }
        let depth_texture = depth.map(render_target).transpose()?;
        let Some(first) = textures.first().copied().or(depth_texture) else {
            return Err(Error::IncompleteFramebuffer("No render targets given".to_string()));
        };
        if let Some(texture) = textures.iter().chain(depth_texture.iter()).find(|texture| mip >= texture.desc.mip_count) {
            return Err(Error::IncompleteFramebuffer(format!(
                "Mip {} out of range ({} mips)",
                mip, texture.desc.mip_count
            )));
        }

        let (width, height, _) = first.desc.mip_extent(mip);
        let samples = first.desc.sampler_count;
        let layer_count = if layer.is_some() { 1 } else { first.layer_count() };
        for texture in textures.iter().chain(depth_texture.iter()) {
            let (w, h, _) = texture.desc.mip_extent(mip);
            if (w, h) != (width, height) || texture.desc.sampler_count != samples {
                return Err(Error::IncompleteFramebuffer(format!(
                    "Render targets differ in size or sample count ({}x{}x{} vs {}x{}x{})",
                    w, h, texture.desc.sampler_count, width, height, samples
                )));
            }
            let texture_layers = if layer.is_some() { 1 } else { texture.layer_count() };
            if texture_layers != layer_count {
                return Err(Error::IncompleteFramebuffer("Render targets differ in layer count".to_string()));
            }
        }
        if let Some(texture) = textures.iter().find(|texture| texture.desc.format.is_depth()) {
            return Err(Error::IncompleteFramebuffer(format!(
                "{:?} cannot be bound as a color target",
                texture.desc.format
            )));
        }
        if let Some(depth_texture) = depth_texture {
            if !depth_texture.desc.format.is_depth() {
                return Err(Error::IncompleteFramebuffer(format!(
                    "{:?} cannot be bound as a depth target",
                    depth_texture.desc.format
                )));
            }
        }

        let missing = || Error::IncompleteFramebuffer(format!("No attachment for layer {:?}, mip {}", layer, mip));
        let color_sources = textures
            .iter()
            .map(|texture| texture.attachment(layer, mip).ok_or_else(missing))
            .collect::<Result<Vec<_>>>()?;
        let depth_source = depth_texture
            .map(|texture| texture.attachment(layer, mip).map(|source| (texture.attachment_point(0), source)).ok_or_else(missing))
            .transpose()?;

        let key = FramebufferKey {
            colors: textures.iter().map(|texture| texture.id).collect(),
            depth: depth_texture.map(|texture| texture.id),
            layer,
            mip,
        };

        let ctx = self.ctx.clone();
        let gl = ctx.gl()?;
        let framebuffer = match self.framebuffers.get(&key) {
            Some(framebuffer) => {
                unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer)) };
                framebuffer
            }
            None => {
                let framebuffer = match unsafe { Self::build_framebuffer(gl, &color_sources, depth_source) } {
                    Ok(framebuffer) => framebuffer,
                    Err(e) => {
                        self.restore_framebuffer(gl);
                        return Err(e);
                    }
                };
                if let Some(evicted) = self.framebuffers.insert(key.clone(), framebuffer) {
                    unsafe { gl.delete_framebuffer(evicted) };
                }
                rhi_debug!("flint::gl", "Created framebuffer #{} ({} color target(s))", self.framebuffers.len(), textures.len());
                framebuffer
            }
        };

        self.targets = Some(BoundTargets { framebuffer: Some(framebuffer), key: Some(key), width, height });
        self.apply_viewport(gl);
        Ok(())
    }

    fn clear_render_target(&mut self, target: &dyn NativeTexture, color: [f32; 4]) {
        self.with_gl("clear_render_target", |list, gl| {
            let texture = render_target(target)?;
            let source = list
                .clear_source(texture)
                .ok_or_else(|| Error::IncompleteFramebuffer("No attachment to clear".to_string()))?;
            let kind = clear_kind(texture.desc.format);
            let write_mask = list.ctx.applied_state().blend.write_mask;
            list.clear_with(gl, glow::COLOR_ATTACHMENT0, source, |gl| unsafe {
                gl.color_mask(true, true, true, true);
                match kind {
                    ClearKind::Float => gl.clear_buffer_f32_slice(glow::COLOR, 0, &color),
                    ClearKind::Uint => gl.clear_buffer_u32_slice(glow::COLOR, 0, &color.map(|c| c as u32)),
                    ClearKind::Sint => gl.clear_buffer_i32_slice(glow::COLOR, 0, &color.map(|c| c as i32)),
                }
                let [r, g, b, a] = write_mask;
                gl.color_mask(r, g, b, a);
            })
        });
    }

    fn clear_depth_stencil(&mut self, target: &dyn NativeTexture, depth: f32, stencil: u8) {
        self.with_gl("clear_depth_stencil", |list, gl| {
            let texture = render_target(target)?;
            if !texture.desc.format.is_depth() {
                return Err(Error::InvalidResource(format!("{:?} has no depth", texture.desc.format)));
            }
            let source = list
                .clear_source(texture)
                .ok_or_else(|| Error::IncompleteFramebuffer("No attachment to clear".to_string()))?;
            let has_stencil = texture.desc.format.has_stencil();
            let state = list.ctx.applied_state().depth_stencil;
            list.clear_with(gl, texture.attachment_point(0), source, |gl| unsafe {
                gl.depth_mask(true);
                if has_stencil {
                    gl.stencil_mask(0xFF);
                    gl.clear_buffer_depth_stencil(glow::DEPTH_STENCIL, 0, depth, stencil as i32);
                } else {
                    gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[depth]);
                }
                gl.depth_mask(state.depth_write);
                gl.stencil_mask(state.write_mask);
            })
        });
    }

    fn shared_state_changed(&mut self) -> bool {
        self.ctx.claim_state(self.state_id)
    }

    fn bind_pipeline_state(&mut self, pipeline: &dyn NativePipelineState) -> Result<()> {
        let pipeline = downcast_native::<GlPipelineState>(pipeline.as_any(), "PipelineState")?;
        let ctx = self.ctx.clone();
        let gl = ctx.gl()?;

        pipeline.apply(gl);
        self.pipeline = Some(BoundPipeline {
            mode: pipeline.mode,
            vertex_array: pipeline.vertex_array,
            is_compute: pipeline.is_compute(),
        });
        if pipeline.vertex_array.is_some() {
            self.attach_vertex_buffers(gl);
        }
        Ok(())
    }

    fn bind_blend_state(&mut self, state: &dyn NativeBlendState) {
        self.with_gl("bind_blend_state", |list, gl| {
            let state = *downcast_native::<GlBlendState>(state.as_any(), "BlendState")?;
            state.apply(gl);
            list.ctx.update_applied_state(|applied| applied.blend = state);
            Ok(())
        });
    }

    fn bind_depth_stencil_state(&mut self, state: &dyn NativeDepthStencilState) {
        self.with_gl("bind_depth_stencil_state", |list, gl| {
            let state = *downcast_native::<GlDepthStencilState>(state.as_any(), "DepthStencilState")?;
            state.apply(gl);
            list.ctx.update_applied_state(|applied| applied.depth_stencil = state);
            Ok(())
        });
    }

    fn bind_rasterizer_state(&mut self, state: &dyn NativeRasterizerState) {
        self.with_gl("bind_rasterizer_state", |_, gl| {
            downcast_native::<GlRasterizerState>(state.as_any(), "RasterizerState")?.apply(gl);
            Ok(())
        });
    }

    fn bind_buffer(&mut self, buffer: &dyn NativeBuffer, binding: BufferBinding) {
        self.with_gl("bind_buffer", |list, gl| {
            let buffer = downcast_native::<GlBuffer>(buffer.as_any(), "Buffer")?;
            match (binding, &buffer.storage) {
                (BufferBinding::Vertex { slot, stride }, GlBufferStorage::Linear { buffer, .. }) => {
                    list.vertex_buffers.insert(slot, (*buffer, stride as i32));
                    if list.has_vertex_array() {
                        unsafe { gl.bind_vertex_buffer(slot, Some(*buffer), 0, stride as i32) };
                    }
                }
                (BufferBinding::Index { index_type: ty }, GlBufferStorage::Linear { buffer, .. }) => {
                    list.index_buffer = Some(IndexBuffer {
                        buffer: *buffer,
                        element_type: index_type(ty),
                        element_size: ty.size_bytes(),
                    });
                    if list.has_vertex_array() {
                        unsafe { gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(*buffer)) };
                    }
                }
                (BufferBinding::Constant { index, .. }, GlBufferStorage::Linear { buffer, .. }) => unsafe {
                    gl.bind_buffer_base(glow::UNIFORM_BUFFER, index, Some(*buffer));
                },
                (BufferBinding::Resource { index, .. }, GlBufferStorage::Linear { buffer, .. }) => unsafe {
                    gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, index, Some(*buffer));
                },
                (BufferBinding::Resource { index, mode, .. }, GlBufferStorage::Image { texture, target, format, .. }) => unsafe {
                    let layered = *target == glow::TEXTURE_3D;
                    gl.bind_image_texture(index, *texture, 0, layered, 0, image_access(mode), format.internal);
                },
                (binding, GlBufferStorage::Image { .. }) => {
                    return Err(Error::InvalidResource(format!(
                        "Texture-backed buffer cannot be bound as {:?}",
                        binding
                    )));
                }
            }
            Ok(())
        });
    }

    fn unbind_buffer(&mut self, binding: BufferBinding) {
        self.with_gl("unbind_buffer", |list, gl| {
            match binding {
                BufferBinding::Vertex { slot, .. } => {
                    list.vertex_buffers.remove(&slot);
                    if list.has_vertex_array() {
                        unsafe { gl.bind_vertex_buffer(slot, None, 0, 0) };
                    }
                }
                // Index buffers stay bound until replaced
                BufferBinding::Index { .. } => {}
                BufferBinding::Constant { index, .. } => unsafe {
                    gl.bind_buffer_base(glow::UNIFORM_BUFFER, index, None);
                },
                BufferBinding::Resource { index, .. } => unsafe {
                    gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, index, None);
                },
            }
            Ok(())
        });
    }

    fn bind_texture(&mut self, texture: &dyn NativeTexture, index: u32, _stages: ShaderStageFlags) {
        self.with_gl("bind_texture", |list, gl| {
            let texture = downcast_native::<GlTexture>(texture.as_any(), "Texture")?;
            unsafe {
                gl.active_texture(glow::TEXTURE0 + index);
                gl.bind_texture(texture.target, Some(texture.texture));
            }
            if let Some(previous) = list.texture_targets.insert(index, texture.target) {
                if previous != texture.target {
                    unsafe { gl.bind_texture(previous, None) };
                }
            }
            Ok(())
        });
    }

    fn unbind_texture(&mut self, index: u32, _stages: ShaderStageFlags) {
        self.with_gl("unbind_texture", |list, gl| {
            if let Some(target) = list.texture_targets.remove(&index) {
                unsafe {
                    gl.active_texture(glow::TEXTURE0 + index);
                    gl.bind_texture(target, None);
                }
            }
            Ok(())
        });
    }

    fn bind_sampler(&mut self, sampler: &dyn NativeSampler, index: u32, _stages: ShaderStageFlags) {
        self.with_gl("bind_sampler", |_, gl| {
            let sampler = downcast_native::<GlSampler>(sampler.as_any(), "Sampler")?;
            unsafe { gl.bind_sampler(index, Some(sampler.sampler)) };
            Ok(())
        });
    }

    fn update_buffer(&mut self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        downcast_native::<GlBuffer>(buffer.as_any(), "Buffer")?.update(data)
    }

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32) {
        self.draw_with("draw", |_, gl, pipeline| {
            unsafe { gl.draw_arrays(pipeline.mode, vertex_offset as i32, vertex_count as i32) };
            Ok(())
        });
    }

    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: i32) {
        self.draw_with("draw_indexed", |list, gl, pipeline| {
            let index = list.index_buffer()?;
            unsafe {
                gl.draw_elements_base_vertex(
                    pipeline.mode,
                    index_count as i32,
                    index.element_type,
                    (index_offset * index.element_size) as i32,
                    vertex_offset,
                );
            }
            Ok(())
        });
    }

    fn draw_instanced_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        index_offset: u32,
        vertex_offset: i32,
        instance_offset: u32,
    ) {
        self.draw_with("draw_instanced_indexed", |list, gl, pipeline| {
            let index = list.index_buffer()?;
            unsafe {
                gl.draw_elements_instanced_base_vertex_base_instance(
                    pipeline.mode,
                    index_count as i32,
                    index.element_type,
                    (index_offset * index.element_size) as i32,
                    instance_count as i32,
                    vertex_offset,
                    instance_offset,
                );
            }
            Ok(())
        });
    }

    fn draw_instanced_indirect(&mut self, arguments: &dyn NativeBuffer, offset: u32) {
        self.draw_with("draw_instanced_indirect", |_, gl, pipeline| {
            let buffer = downcast_native::<GlBuffer>(arguments.as_any(), "Buffer")?
                .linear()
                .ok_or_else(|| Error::InvalidResource("Indirect arguments must be a linear buffer".to_string()))?;
            unsafe {
                gl.bind_buffer(glow::DRAW_INDIRECT_BUFFER, Some(buffer));
                gl.draw_arrays_indirect_offset(pipeline.mode, offset as i32);
                gl.bind_buffer(glow::DRAW_INDIRECT_BUFFER, None);
            }
            Ok(())
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.with_gl("dispatch_compute", |list, gl| {
            if !list.pipeline.map(|p| p.is_compute).unwrap_or(false) {
                return Err(Error::InvalidState("no compute pipeline bound".to_string()));
            }
            unsafe {
                gl.dispatch_compute(x, y, z);
                // Later draws and readbacks may consume image or storage writes
                gl.memory_barrier(glow::ALL_BARRIER_BITS);
            }
            Ok(())
        });
    }

    fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32) {
        self.with_gl("write_timestamp", |_, gl| {
            downcast_native_mut::<GlQueryPool>(pool.as_any_mut(), "QueryPool")?.write(gl, index)
        });
    }
}

impl Drop for GlCommandList {
    fn drop(&mut self) {
        if self.framebuffers.len() == 0 && self.clear_framebuffer.is_none() {
            return;
        }
        match self.ctx.gl_for_drop("Command list") {
            Some(gl) => unsafe {
                for framebuffer in self.framebuffers.drain() {
                    gl.delete_framebuffer(framebuffer);
                }
                if let Some(framebuffer) = self.clear_framebuffer.take() {
                    gl.delete_framebuffer(framebuffer);
                }
            },
            None => rhi_warn!("flint::gl", "{} framebuffer(s) leaked", self.framebuffers.len()),
        }
    }
}

#[cfg(test)]
#[path = "gl_command_list_tests.rs"]
mod tests;
