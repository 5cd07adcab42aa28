//! Command list front end

use crate::error::{Error, Result};
use crate::render::{
    AttachmentLoad, BlendState, BlendStateKey, Buffer, BufferBinding, BufferMiscFlags,
    DepthStencilState, DepthStencilStateKey, IndexType, NativeCommandList, NativeQueryPool,
    NativeTexture, PipelineState, PrimitiveTopology, RasterizerState, RasterizerStateKey,
    RenderDevice, RenderPassDesc, RenderTarget, ResourceId, Sampler, ShaderStageFlags,
};
use crate::{rhi_error, rhi_trace, rhi_warn};

// ===== VIEWPORT =====

/// Viewport rectangle and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport at the origin
    pub fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height, min_depth: 0.0, max_depth: 1.0 }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

// ===== STATE =====

/// Recording phase of a command list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandListLifecycle {
    Idle,
    Recording,
    Recorded,
    Submitted,
}

/// What the command list currently has bound
///
/// Reset at every `begin()`: a fresh recording starts from native defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandListState {
    pub backbuffer_bound: bool,
    pub render_targets: Vec<ResourceId>,
    pub depth_target: Option<ResourceId>,
    /// `None` when all layers are bound
    pub layer: Option<u32>,
    pub mip: u32,
    pub viewport: Viewport,
    pub pipeline: Option<ResourceId>,
    pub primitive_topology: Option<PrimitiveTopology>,
    pub blend_key: Option<BlendStateKey>,
    pub depth_stencil_key: Option<DepthStencilStateKey>,
    pub rasterizer_key: Option<RasterizerStateKey>,
    pub clear_depth_value: f32,
}

impl Default for CommandListState {
    fn default() -> Self {
        Self {
            backbuffer_bound: false,
            render_targets: Vec::new(),
            depth_target: None,
            layer: None,
            mip: 0,
            viewport: Viewport::default(),
            pipeline: None,
            primitive_topology: None,
            blend_key: None,
            depth_stencil_key: None,
            rasterizer_key: None,
            clear_depth_value: 0.0,
        }
    }
}

// ===== COMMAND LIST =====

/// Command list
///
/// Records into a backend's [`NativeCommandList`] and keeps an explicit
/// [`CommandListState`] of what is bound. A blend, depth-stencil or rasterizer
/// state only reaches the backend when its key differs from the bound one.
///
/// Lifecycle: `Idle -> Recording -> Recorded -> Submitted`, and back to
/// `Recording` on the next `begin()`. Calls made in the wrong phase return
/// `Error::InvalidState`.
pub struct CommandList {
    id: ResourceId,
    lifecycle: CommandListLifecycle,
    state: CommandListState,
    native: Option<Box<dyn NativeCommandList>>,
}

impl CommandList {
    pub fn create(device: &RenderDevice) -> Result<Self> {
        let native = device.backend().create_command_list()?;
        Ok(Self {
            id: ResourceId::next(),
            lifecycle: CommandListLifecycle::Idle,
            state: CommandListState::default(),
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_command_list(native);
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn lifecycle(&self) -> CommandListLifecycle {
        self.lifecycle
    }

    pub fn state(&self) -> &CommandListState {
        &self.state
    }

    // ===== LIFECYCLE =====

    pub fn begin(&mut self) -> Result<()> {
        match self.lifecycle {
            CommandListLifecycle::Idle | CommandListLifecycle::Submitted => {}
            other => {
                return Err(Error::InvalidState(format!("begin() called on a {:?} command list", other)));
            }
        }

        self.native_mut()?.begin()?;
        self.state = CommandListState {
            clear_depth_value: self.state.clear_depth_value,
            ..CommandListState::default()
        };
        self.lifecycle = CommandListLifecycle::Recording;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.ensure_recording("end")?;
        self.native_mut()?.end()?;
        self.lifecycle = CommandListLifecycle::Recorded;
        Ok(())
    }

    /// Execute the recorded commands on the device
    pub fn playback(&mut self, device: &RenderDevice) -> Result<()> {
        if self.lifecycle != CommandListLifecycle::Recorded {
            return Err(Error::InvalidState(format!("playback() called on a {:?} command list", self.lifecycle)));
        }

        let native = self.native.as_deref_mut().ok_or_else(destroyed)?;
        device.backend().submit_command_list(native)?;
        self.lifecycle = CommandListLifecycle::Submitted;
        Ok(())
    }

    // ===== DRAW / DISPATCH =====

    pub fn draw(&mut self, vertex_count: u32, vertex_offset: u32) -> Result<()> {
        self.recording_native("draw")?.draw(vertex_count, vertex_offset);
        Ok(())
    }

    pub fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: i32) -> Result<()> {
        self.recording_native("draw_indexed")?.draw_indexed(index_count, index_offset, vertex_offset);
        Ok(())
    }

    pub fn draw_instanced_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        index_offset: u32,
        vertex_offset: i32,
        instance_offset: u32,
    ) -> Result<()> {
        self.recording_native("draw_instanced_indexed")?.draw_instanced_indexed(
            index_count,
            instance_count,
            index_offset,
            vertex_offset,
            instance_offset,
        );
        Ok(())
    }

    /// Draw with arguments read from an `IndirectDrawArguments` buffer
    pub fn draw_instanced_indirect(&mut self, arguments: &Buffer, offset: u32) -> Result<()> {
        if !arguments.desc().buffer_type.usage().misc.contains(BufferMiscFlags::DRAW_INDIRECT_ARGS) {
            return Err(Error::InvalidResource(format!(
                "{:?} buffer cannot hold indirect draw arguments",
                arguments.desc().buffer_type
            )));
        }
        let buffer = arguments.native()?;
        self.recording_native("draw_instanced_indirect")?.draw_instanced_indirect(buffer, offset);
        Ok(())
    }

    pub fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.recording_native("dispatch_compute")?.dispatch_compute(x, y, z);
        Ok(())
    }

    // ===== VIEWPORT =====

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.recording_native("set_viewport")?.set_viewport(&viewport);
        self.state.viewport = viewport;
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        self.state.viewport
    }

    // ===== RENDER TARGETS =====

    pub fn bind_backbuffer(&mut self) -> Result<()> {
        self.recording_native("bind_backbuffer")?.bind_backbuffer()?;
        self.state.backbuffer_bound = true;
        self.state.render_targets.clear();
        self.state.depth_target = None;
        self.state.layer = None;
        self.state.mip = 0;
        Ok(())
    }

    /// Bind every layer of `targets` at `mip`
    ///
    /// A combination the backend rejects is logged and the backbuffer is bound
    /// instead; the call still succeeds.
    pub fn bind_render_targets(
        &mut self,
        targets: &[&RenderTarget],
        depth: Option<&RenderTarget>,
        mip: u32,
    ) -> Result<()> {
        self.bind_targets(targets, depth, None, mip)
    }

    /// Bind one array layer of `targets` at `mip`
    pub fn bind_render_targets_layered(
        &mut self,
        targets: &[&RenderTarget],
        depth: Option<&RenderTarget>,
        layer: u32,
        mip: u32,
    ) -> Result<()> {
        self.bind_targets(targets, depth, Some(layer), mip)
    }

    fn bind_targets(
        &mut self,
        targets: &[&RenderTarget],
        depth: Option<&RenderTarget>,
        layer: Option<u32>,
        mip: u32,
    ) -> Result<()> {
        let color_natives = targets.iter().map(|target| target.native()).collect::<Result<Vec<&dyn NativeTexture>>>()?;
        let depth_native = depth.map(|target| target.native()).transpose()?;

        match self
            .recording_native("bind_render_targets")?
            .bind_render_targets(&color_natives, depth_native, layer, mip)
        {
            Ok(()) => {
                self.state.backbuffer_bound = false;
                self.state.render_targets = targets.iter().map(|target| target.id()).collect();
                self.state.depth_target = depth.map(RenderTarget::id);
                self.state.layer = layer;
                self.state.mip = mip;
                Ok(())
            }
            Err(Error::IncompleteFramebuffer(reason)) => {
                rhi_error!("flint::CommandList", "Incomplete framebuffer! ({})", reason);
                self.bind_backbuffer()
            }
            Err(e) => Err(e),
        }
    }

    // ===== RENDER PASSES =====

    /// Bind the pass attachments and apply their load operations
    pub fn begin_render_pass(&mut self, desc: &RenderPassDesc<'_>) -> Result<()> {
        let colors: Vec<&RenderTarget> = desc.color_attachments.iter().map(|attachment| attachment.target).collect();
        let depth = desc.depth_attachment.as_ref().map(|attachment| attachment.target);
        self.bind_targets(&colors, depth, desc.layer, desc.mip)?;

        for attachment in &desc.color_attachments {
            if let AttachmentLoad::Clear(color) = attachment.load {
                self.clear_render_target(attachment.target, color)?;
            }
        }
        if let Some(attachment) = &desc.depth_attachment {
            if let AttachmentLoad::Clear(value) = attachment.load {
                self.clear_depth_render_target(attachment.target, Some(value))?;
            }
        }
        Ok(())
    }

    /// Restore the backbuffer as the output
    pub fn end_render_pass(&mut self) -> Result<()> {
        self.bind_backbuffer()
    }

    // ===== CLEARS =====

    pub fn clear_render_target(&mut self, target: &RenderTarget, color: [f32; 4]) -> Result<()> {
        let native = target.native()?;
        self.recording_native("clear_render_target")?.clear_render_target(native, color);
        Ok(())
    }

    pub fn clear_color_render_targets(&mut self, targets: &[&RenderTarget], color: [f32; 4]) -> Result<()> {
        for target in targets {
            self.clear_render_target(target, color)?;
        }
        Ok(())
    }

    /// Clear depth (and stencil to 0); `None` uses the value set by `set_clear_depth_value`
    pub fn clear_depth_render_target(&mut self, target: &RenderTarget, value: Option<f32>) -> Result<()> {
        if !target.is_depth() {
            rhi_warn!("flint::CommandList", "Depth clear on non-depth target {:?}", target.desc().format);
        }
        let depth = value.unwrap_or(self.state.clear_depth_value);
        let native = target.native()?;
        self.recording_native("clear_depth_render_target")?.clear_depth_stencil(native, depth, 0);
        Ok(())
    }

    pub fn set_clear_depth_value(&mut self, value: f32) {
        self.state.clear_depth_value = value;
    }

    // ===== PIPELINE STATE =====

    /// Forget cached sub-state keys when another list changed the shared native state
    fn sync_state_keys(&mut self) -> Result<()> {
        if self.native_mut()?.shared_state_changed() {
            rhi_trace!("flint::CommandList", "Shared state changed by another list, dropping cached keys");
            self.state.blend_key = None;
            self.state.depth_stencil_key = None;
            self.state.rasterizer_key = None;
        }
        Ok(())
    }

    /// Bind a pipeline, then each fixed-function sub-state whose key changed
    pub fn bind_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<()> {
        let native_pipeline = pipeline.native()?;
        self.recording_native("bind_pipeline_state")?.bind_pipeline_state(native_pipeline)?;
        self.sync_state_keys()?;
        self.state.pipeline = Some(pipeline.id());
        self.state.primitive_topology = Some(pipeline.primitive_topology());

        if let (Some(key), Some(state)) = (pipeline.blend_key(), native_pipeline.blend_state()) {
            if self.state.blend_key != Some(key) {
                self.native_mut()?.bind_blend_state(state);
                self.state.blend_key = Some(key);
            }
        }
        if let (Some(key), Some(state)) = (pipeline.depth_stencil_key(), native_pipeline.depth_stencil_state()) {
            if self.state.depth_stencil_key != Some(key) {
                self.native_mut()?.bind_depth_stencil_state(state);
                self.state.depth_stencil_key = Some(key);
            }
        }
        if let (Some(key), Some(state)) = (pipeline.rasterizer_key(), native_pipeline.rasterizer_state()) {
            if self.state.rasterizer_key != Some(key) {
                self.native_mut()?.bind_rasterizer_state(state);
                self.state.rasterizer_key = Some(key);
            }
        }
        Ok(())
    }

    pub fn bind_blend_state(&mut self, state: &BlendState) -> Result<()> {
        self.ensure_recording("bind_blend_state")?;
        self.sync_state_keys()?;
        if self.state.blend_key == Some(state.key()) {
            rhi_trace!("flint::CommandList", "Blend state {:#x} already bound", state.key().value());
            return Ok(());
        }
        let native = state.native()?;
        self.native_mut()?.bind_blend_state(native);
        self.state.blend_key = Some(state.key());
        Ok(())
    }

    pub fn bind_depth_stencil_state(&mut self, state: &DepthStencilState) -> Result<()> {
        self.ensure_recording("bind_depth_stencil_state")?;
        self.sync_state_keys()?;
        if self.state.depth_stencil_key == Some(state.key()) {
            return Ok(());
        }
        let native = state.native()?;
        self.native_mut()?.bind_depth_stencil_state(native);
        self.state.depth_stencil_key = Some(state.key());
        Ok(())
    }

    pub fn bind_rasterizer_state(&mut self, state: &RasterizerState) -> Result<()> {
        self.ensure_recording("bind_rasterizer_state")?;
        self.sync_state_keys()?;
        if self.state.rasterizer_key == Some(state.key()) {
            return Ok(());
        }
        let native = state.native()?;
        self.native_mut()?.bind_rasterizer_state(native);
        self.state.rasterizer_key = Some(state.key());
        Ok(())
    }

    // ===== RESOURCES =====

    pub fn bind_buffer(&mut self, buffer: &Buffer, binding: BufferBinding) -> Result<()> {
        let native = buffer.native()?;
        self.recording_native("bind_buffer")?.bind_buffer(native, binding);
        Ok(())
    }

    pub fn unbind_buffer(&mut self, binding: BufferBinding) -> Result<()> {
        self.recording_native("unbind_buffer")?.unbind_buffer(binding);
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, buffer: &Buffer, slot: u32) -> Result<()> {
        if !buffer.desc().buffer_type.is_vertex() {
            return Err(Error::InvalidResource(format!("{:?} buffer bound as vertex buffer", buffer.desc().buffer_type)));
        }
        self.bind_buffer(buffer, BufferBinding::Vertex { slot, stride: buffer.desc().stride })
    }

    pub fn bind_index_buffer(&mut self, buffer: &Buffer, index_type: IndexType) -> Result<()> {
        if !buffer.desc().buffer_type.is_index() {
            return Err(Error::InvalidResource(format!("{:?} buffer bound as index buffer", buffer.desc().buffer_type)));
        }
        self.bind_buffer(buffer, BufferBinding::Index { index_type })
    }

    /// Record a buffer update executed at playback
    pub fn update_buffer(&mut self, buffer: &Buffer, data: &[u8]) -> Result<()> {
        let native = buffer.native()?;
        self.recording_native("update_buffer")?.update_buffer(native, data)
    }

    pub fn bind_sampler(&mut self, sampler: &Sampler, index: u32, stages: ShaderStageFlags) -> Result<()> {
        let native = sampler.native()?;
        self.recording_native("bind_sampler")?.bind_sampler(native, index, stages);
        Ok(())
    }

    pub(crate) fn bind_shader_texture(
        &mut self,
        texture: &dyn NativeTexture,
        index: u32,
        stages: ShaderStageFlags,
    ) -> Result<()> {
        self.recording_native("bind_texture")?.bind_texture(texture, index, stages);
        Ok(())
    }

    pub(crate) fn unbind_shader_texture(&mut self, index: u32, stages: ShaderStageFlags) -> Result<()> {
        self.recording_native("unbind_texture")?.unbind_texture(index, stages);
        Ok(())
    }

    pub(crate) fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32) -> Result<()> {
        self.recording_native("write_timestamp")?.write_timestamp(pool, index);
        Ok(())
    }

    // ===== INTERNAL =====

    fn ensure_recording(&self, operation: &str) -> Result<()> {
        if self.lifecycle != CommandListLifecycle::Recording {
            return Err(Error::InvalidState(format!(
                "{}() requires a recording command list (state: {:?})",
                operation, self.lifecycle
            )));
        }
        Ok(())
    }

    fn native_mut(&mut self) -> Result<&mut dyn NativeCommandList> {
        match self.native.as_deref_mut() {
            Some(native) => Ok(native),
            None => Err(destroyed()),
        }
    }

    fn recording_native(&mut self, operation: &str) -> Result<&mut dyn NativeCommandList> {
        self.ensure_recording(operation)?;
        self.native_mut()
    }
}

fn destroyed() -> Error {
    Error::InvalidResource("Command list used after destroy()".to_string())
}

impl Drop for CommandList {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::CommandList", "Command list dropped without destroy(), native object leaked");
        }
    }
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
