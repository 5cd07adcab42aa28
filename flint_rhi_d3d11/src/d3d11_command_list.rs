/// D3D11CommandList - Direct3D 11 implementation of NativeCommandList
///
/// Records into a deferred context owned by the list. `end` finishes the
/// recording into an `ID3D11CommandList`, which `submit` executes once on the
/// immediate context. Deferred contexts start every recording from default
/// state, so nothing carries over between frames.

use d3d12::ComPtr;
use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BindMode, BufferBinding, NativeBlendState, NativeBuffer, NativeCommandList,
    NativeDepthStencilState, NativePipelineState, NativeQueryPool, NativeRasterizerState, NativeSampler,
    NativeTexture, ShaderStage, ShaderStageFlags, TextureDescription, TextureDimension, Viewport,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_error, rhi_warn};
use std::ptr;
use std::sync::{Arc, PoisonError};
use winapi::shared::minwindef::FALSE;
use winapi::um::d3d11;

use crate::d3d11_buffer::D3D11Buffer;
use crate::d3d11_context::{check, D3D11Context, SOURCE};
use crate::d3d11_conv::index_format;
use crate::d3d11_pipeline::D3D11PipelineState;
use crate::d3d11_query_pool::D3D11QueryPool;
use crate::d3d11_sampler::D3D11Sampler;
use crate::d3d11_state::{D3D11BlendState, D3D11DepthStencilState, D3D11RasterizerState};
use crate::d3d11_swapchain::SharedBackbuffer;
use crate::d3d11_texture::D3D11Texture;

/// Simultaneous color targets
pub(crate) const MAX_COLOR_TARGETS: usize = d3d11::D3D11_SIMULTANEOUS_RENDER_TARGET_COUNT as usize;

const BLEND_FACTOR: [f32; 4] = [1.0; 4];

// ===== HELPERS =====

/// Native pipeline stage of a flint stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NativeStage {
    Vs,
    Hs,
    Ds,
    Ps,
    Cs,
}

pub(crate) fn native_stage(stage: ShaderStage) -> NativeStage {
    match stage {
        ShaderStage::Vertex => NativeStage::Vs,
        ShaderStage::TessControl => NativeStage::Hs,
        ShaderStage::TessEvaluation => NativeStage::Ds,
        ShaderStage::Pixel => NativeStage::Ps,
        ShaderStage::Compute => NativeStage::Cs,
    }
}

pub(crate) fn d3d11_viewport(viewport: &Viewport) -> d3d11::D3D11_VIEWPORT {
    d3d11::D3D11_VIEWPORT {
        TopLeftX: viewport.x as f32,
        TopLeftY: viewport.y as f32,
        Width: viewport.width as f32,
        Height: viewport.height as f32,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

/// Initial UAV counter: append buffers restart at zero, others keep theirs
pub(crate) fn initial_uav_count(append: bool) -> u32 {
    if append { 0 } else { u32::MAX }
}

/// Layers a bind covers: one, or every layer (W slices of `mip` for volumes)
fn bound_layers(desc: &TextureDescription, layer: Option<u32>, mip: u32) -> u32 {
    match (layer, desc.dimension) {
        (Some(_), _) => 1,
        (None, TextureDimension::Texture3D) => desc.mip_extent(mip).2,
        (None, _) => desc.array_size,
    }
}

/// Check that a set of targets can be bound together, returning the bound size
pub(crate) fn check_target_set(
    colors: &[&TextureDescription],
    depth: Option<&TextureDescription>,
    layer: Option<u32>,
    mip: u32,
) -> Result<(u32, u32)> {
    if colors.len() > MAX_COLOR_TARGETS {
        return Err(Error::IncompleteFramebuffer(format!(
            "{} color targets bound (max {})",
            colors.len(),
            MAX_COLOR_TARGETS
        )));
    }
    let Some(first) = colors.first().copied().or(depth) else {
        return Err(Error::IncompleteFramebuffer("No render targets given".to_string()));
    };
    if let Some(desc) = colors.iter().copied().chain(depth).find(|desc| mip >= desc.mip_count) {
        return Err(Error::IncompleteFramebuffer(format!("Mip {} out of range ({} mips)", mip, desc.mip_count)));
    }
    let (width, height, _) = first.mip_extent(mip);
    let samples = first.sampler_count;
    let layers = bound_layers(first, layer, mip);
    for desc in colors.iter().copied().chain(depth) {
        let (w, h, _) = desc.mip_extent(mip);
        if (w, h) != (width, height) || desc.sampler_count != samples {
            return Err(Error::IncompleteFramebuffer(format!(
                "Render targets differ in size or sample count ({}x{}x{} vs {}x{}x{})",
                w, h, desc.sampler_count, width, height, samples
            )));
        }
        if bound_layers(desc, layer, mip) != layers {
            return Err(Error::IncompleteFramebuffer("Render targets differ in layer count".to_string()));
        }
    }

    if let Some(desc) = colors.iter().find(|desc| desc.format.is_depth()) {
        return Err(Error::IncompleteFramebuffer(format!("{:?} cannot be bound as a color target", desc.format)));
    }
    if let Some(desc) = depth {
        if !desc.format.is_depth() {
            return Err(Error::IncompleteFramebuffer(format!("{:?} cannot be bound as a depth target", desc.format)));
        }
    }
    Ok((width, height))
}

fn raw_or_null<T>(object: &Option<ComPtr<T>>) -> *mut T {
    object.as_ref().map_or(ptr::null_mut(), |object| object.as_mut_ptr())
}

fn render_target(texture: &dyn NativeTexture) -> Result<&D3D11Texture> {
    let texture = downcast_native::<D3D11Texture>(texture.as_any(), "RenderTarget")?;
    if !texture.is_render_target() {
        return Err(Error::IncompleteFramebuffer("Texture was not created as a render target".to_string()));
    }
    Ok(texture)
}

// ===== COMMAND LIST =====

#[derive(Debug, Clone, Copy)]
struct BoundTargets {
    width: u32,
    height: u32,
    color_count: u32,
}

/// Direct3D 11 command list implementation
pub struct D3D11CommandList {
    ctx: Arc<D3D11Context>,
    context: ComPtr<d3d11::ID3D11DeviceContext>,
    backbuffer: SharedBackbuffer,
    recording: bool,
    finished: Option<ComPtr<d3d11::ID3D11CommandList>>,
    targets: Option<BoundTargets>,
    viewport: Option<Viewport>,
    /// `Some(is_compute)` once a pipeline is bound
    pipeline: Option<bool>,
    index_bound: bool,
}

// SAFETY: the deferred context is owned by this list and only used through &mut self
unsafe impl Send for D3D11CommandList {}

impl D3D11CommandList {
    pub(crate) fn new(ctx: &Arc<D3D11Context>, backbuffer: SharedBackbuffer) -> Result<Self> {
        let mut context = ComPtr::<d3d11::ID3D11DeviceContext>::null();
        check(unsafe { ctx.device.CreateDeferredContext(0, context.mut_self()) }, "CreateDeferredContext")?;
        Ok(Self {
            ctx: ctx.clone(),
            context,
            backbuffer,
            recording: false,
            finished: None,
            targets: None,
            viewport: None,
            pipeline: None,
            index_bound: false,
        })
    }

    /// Execute the finished recording on the immediate context
    pub(crate) fn submit(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list submitted while recording".to_string()));
        }
        let list = self
            .finished
            .take()
            .ok_or_else(|| Error::InvalidState("Command list has no finished recording to submit".to_string()))?;
        unsafe { self.ctx.immediate().ExecuteCommandList(list.as_mut_ptr(), FALSE) };
        self.ctx.flush_debug_messages();
        Ok(())
    }

    /// Run `body`, logging instead of failing
    fn logged(&mut self, name: &str, body: impl FnOnce(&mut Self) -> Result<()>) {
        if let Err(e) = body(self) {
            rhi_error!(SOURCE, "{} skipped: {}", name, e);
        }
    }

    // ===== TARGETS =====

    fn apply_viewport(&self) {
        let Some(targets) = self.targets else {
            return;
        };
        let viewport = self.viewport.unwrap_or_else(|| Viewport::new(targets.width, targets.height));
        let native = d3d11_viewport(&viewport);
        unsafe { self.context.RSSetViewports(1, &native) };
    }

    fn ensure_targets(&mut self) -> Result<()> {
        if self.targets.is_none() {
            self.bind_backbuffer()?;
        }
        Ok(())
    }

    // ===== PER-STAGE BINDING =====

    unsafe fn set_constant_buffer(&self, stage: NativeStage, index: u32, buffer: *mut d3d11::ID3D11Buffer) {
        let buffers = [buffer];
        let context = &self.context;
        match stage {
            NativeStage::Vs => context.VSSetConstantBuffers(index, 1, buffers.as_ptr()),
            NativeStage::Hs => context.HSSetConstantBuffers(index, 1, buffers.as_ptr()),
            NativeStage::Ds => context.DSSetConstantBuffers(index, 1, buffers.as_ptr()),
            NativeStage::Ps => context.PSSetConstantBuffers(index, 1, buffers.as_ptr()),
            NativeStage::Cs => context.CSSetConstantBuffers(index, 1, buffers.as_ptr()),
        }
    }

    unsafe fn set_shader_resource(&self, stage: NativeStage, index: u32, view: *mut d3d11::ID3D11ShaderResourceView) {
        let views = [view];
        let context = &self.context;
        match stage {
            NativeStage::Vs => context.VSSetShaderResources(index, 1, views.as_ptr()),
            NativeStage::Hs => context.HSSetShaderResources(index, 1, views.as_ptr()),
            NativeStage::Ds => context.DSSetShaderResources(index, 1, views.as_ptr()),
            NativeStage::Ps => context.PSSetShaderResources(index, 1, views.as_ptr()),
            NativeStage::Cs => context.CSSetShaderResources(index, 1, views.as_ptr()),
        }
    }

    unsafe fn set_sampler(&self, stage: NativeStage, index: u32, sampler: *mut d3d11::ID3D11SamplerState) {
        let samplers = [sampler];
        let context = &self.context;
        match stage {
            NativeStage::Vs => context.VSSetSamplers(index, 1, samplers.as_ptr()),
            NativeStage::Hs => context.HSSetSamplers(index, 1, samplers.as_ptr()),
            NativeStage::Ds => context.DSSetSamplers(index, 1, samplers.as_ptr()),
            NativeStage::Ps => context.PSSetSamplers(index, 1, samplers.as_ptr()),
            NativeStage::Cs => context.CSSetSamplers(index, 1, samplers.as_ptr()),
        }
    }

    /// UAVs exist on the pixel and compute stages only
    unsafe fn set_unordered_access(
        &self,
        stage: NativeStage,
        index: u32,
        view: *mut d3d11::ID3D11UnorderedAccessView,
        initial_count: u32,
    ) {
        let views = [view];
        let counts = [initial_count];
        match stage {
            NativeStage::Cs => self.context.CSSetUnorderedAccessViews(index, 1, views.as_ptr(), counts.as_ptr()),
            NativeStage::Ps => {
                let color_count = self.targets.map(|targets| targets.color_count).unwrap_or(0);
                if index < color_count {
                    rhi_warn!(SOURCE, "Pixel UAV slot {} overlaps {} bound color targets", index, color_count);
                }
                self.context.OMSetRenderTargetsAndUnorderedAccessViews(
                    d3d11::D3D11_KEEP_RENDER_TARGETS_AND_DEPTH_STENCIL,
                    ptr::null(),
                    ptr::null_mut(),
                    index,
                    1,
                    views.as_ptr(),
                    counts.as_ptr(),
                );
            }
            other => rhi_warn!(SOURCE, "Unordered access is not available on the {:?} stage", other),
        }
    }

    // ===== DRAW PREPARATION =====

    fn prepare_draw(&mut self) -> Result<()> {
        match self.pipeline {
            None => return Err(Error::InvalidState("Draw without a bound pipeline state".to_string())),
            Some(true) => return Err(Error::InvalidState("Draw with a compute pipeline bound".to_string())),
            Some(false) => {}
        }
        self.ensure_targets()
    }

    fn draw_with(&mut self, name: &str, record: impl FnOnce(&Self) -> Result<()>) {
        self.logged(name, |list| {
            list.prepare_draw()?;
            record(list)
        });
    }

    fn require_index_buffer(&self) -> Result<()> {
        if !self.index_bound {
            return Err(Error::InvalidState("Indexed draw without an index buffer".to_string()));
        }
        Ok(())
    }
}

impl NativeCommandList for D3D11CommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list already recording".to_string()));
        }
        self.recording = true;
        self.finished = None;
        self.targets = None;
        self.viewport = None;
        self.pipeline = None;
        self.index_bound = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::InvalidState("Command list not recording".to_string()));
        }
        self.recording = false;

        let mut list = ComPtr::<d3d11::ID3D11CommandList>::null();
        check(unsafe { self.context.FinishCommandList(FALSE, list.mut_self()) }, "FinishCommandList")?;
        self.finished = Some(list);
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = Some(*viewport);
        let native = d3d11_viewport(viewport);
        unsafe { self.context.RSSetViewports(1, &native) };
    }

    fn bind_backbuffer(&mut self) -> Result<()> {
        let backbuffer = self.backbuffer.read().unwrap_or_else(PoisonError::into_inner);
        let view = backbuffer
            .view
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Backbuffer is being resized".to_string()))?;
        let views = [view.as_mut_ptr()];
        unsafe { self.context.OMSetRenderTargets(1, views.as_ptr(), ptr::null_mut()) };

        self.targets = Some(BoundTargets { width: backbuffer.width, height: backbuffer.height, color_count: 1 });
        drop(backbuffer);
        self.apply_viewport();
        Ok(())
    }

    fn bind_render_targets(
        &mut self,
        targets: &[&dyn NativeTexture],
        depth: Option<&dyn NativeTexture>,
        layer: Option<u32>,
        mip: u32,
    ) -> Result<()> {
        let textures = targets.iter().map(|&target| render_target(target)).collect::<Result<Vec<_>>>()?;
        let depth_texture = depth.map(render_target).transpose()?;

        let descs: Vec<&TextureDescription> = textures.iter().map(|texture| &texture.desc).collect();
        let (width, height) = check_target_set(&descs, depth_texture.map(|texture| &texture.desc), layer, mip)?;

        let missing = || Error::IncompleteFramebuffer(format!("No view for layer {:?}, mip {}", layer, mip));
        let color_views = textures
            .iter()
            .map(|texture| texture.color_view(layer, mip).ok_or_else(missing))
            .collect::<Result<Vec<_>>>()?;
        let depth_view = match depth_texture {
            Some(texture) => texture.depth_view(layer, mip).ok_or_else(missing)?,
            None => ptr::null_mut(),
        };

        unsafe {
            self.context.OMSetRenderTargets(color_views.len() as u32, color_views.as_ptr(), depth_view);
        }
        self.targets = Some(BoundTargets { width, height, color_count: color_views.len() as u32 });
        self.apply_viewport();
        Ok(())
    }

    fn clear_render_target(&mut self, target: &dyn NativeTexture, color: [f32; 4]) {
        self.logged("clear_render_target", |list| {
            let texture = render_target(target)?;
            if texture.is_depth() {
                return Err(Error::InvalidResource(format!("{:?} is not a color target", texture.desc.format)));
            }
            for view in texture.flat_color_views() {
                unsafe { list.context.ClearRenderTargetView(view, &color) };
            }
            Ok(())
        });
    }

    fn clear_depth_stencil(&mut self, target: &dyn NativeTexture, depth: f32, stencil: u8) {
        self.logged("clear_depth_stencil", |list| {
            let texture = render_target(target)?;
            if !texture.is_depth() {
                return Err(Error::InvalidResource(format!("{:?} has no depth", texture.desc.format)));
            }
            let mut flags = d3d11::D3D11_CLEAR_DEPTH;
            if texture.desc.format.has_stencil() {
                flags |= d3d11::D3D11_CLEAR_STENCIL;
            }
            for view in texture.flat_depth_views() {
                unsafe { list.context.ClearDepthStencilView(view, flags, depth, stencil) };
            }
            Ok(())
        });
    }

    fn bind_pipeline_state(&mut self, pipeline: &dyn NativePipelineState) -> Result<()> {
        let pipeline = downcast_native::<D3D11PipelineState>(pipeline.as_any(), "PipelineState")?;
        let context = &self.context;

        unsafe {
            if let Some(compute) = &pipeline.compute {
                context.CSSetShader(compute.as_mut_ptr(), ptr::null(), 0);
                self.pipeline = Some(true);
                return Ok(());
            }

            context.VSSetShader(raw_or_null(&pipeline.vertex), ptr::null(), 0);
            context.HSSetShader(raw_or_null(&pipeline.hull), ptr::null(), 0);
            context.DSSetShader(raw_or_null(&pipeline.domain), ptr::null(), 0);
            context.PSSetShader(raw_or_null(&pipeline.pixel), ptr::null(), 0);
            context.IASetInputLayout(raw_or_null(&pipeline.input_layout));
            context.IASetPrimitiveTopology(pipeline.topology);
        }
        self.pipeline = Some(false);
        Ok(())
    }

    fn bind_blend_state(&mut self, state: &dyn NativeBlendState) {
        self.logged("bind_blend_state", |list| {
            let state = downcast_native::<D3D11BlendState>(state.as_any(), "BlendState")?;
            unsafe { list.context.OMSetBlendState(state.state.as_mut_ptr(), &BLEND_FACTOR, state.sample_mask) };
            Ok(())
        });
    }

    fn bind_depth_stencil_state(&mut self, state: &dyn NativeDepthStencilState) {
        self.logged("bind_depth_stencil_state", |list| {
            let state = downcast_native::<D3D11DepthStencilState>(state.as_any(), "DepthStencilState")?;
            unsafe { list.context.OMSetDepthStencilState(state.state.as_mut_ptr(), state.stencil_ref) };
            Ok(())
        });
    }

    fn bind_rasterizer_state(&mut self, state: &dyn NativeRasterizerState) {
        self.logged("bind_rasterizer_state", |list| {
            let state = downcast_native::<D3D11RasterizerState>(state.as_any(), "RasterizerState")?;
            unsafe { list.context.RSSetState(state.state.as_mut_ptr()) };
            Ok(())
        });
    }

    fn bind_buffer(&mut self, buffer: &dyn NativeBuffer, binding: BufferBinding) {
        self.logged("bind_buffer", |list| {
            let buffer = downcast_native::<D3D11Buffer>(buffer.as_any(), "Buffer")?;
            let linear = buffer.buffer();
            let needs_linear = !matches!(binding, BufferBinding::Resource { .. });
            if needs_linear && linear.is_null() {
                return Err(Error::InvalidResource(format!("Texture-backed buffer cannot be bound as {:?}", binding)));
            }

            unsafe {
                match binding {
                    BufferBinding::Vertex { slot, stride } => {
                        let buffers = [linear];
                        let offsets = [0u32];
                        list.context.IASetVertexBuffers(slot, 1, buffers.as_ptr(), &stride, offsets.as_ptr());
                    }
                    BufferBinding::Index { index_type } => {
                        list.context.IASetIndexBuffer(linear, index_format(index_type), 0);
                        list.index_bound = true;
                    }
                    BufferBinding::Constant { index, stages } => {
                        for stage in stages.stages() {
                            list.set_constant_buffer(native_stage(stage), index, linear);
                        }
                    }
                    BufferBinding::Resource { index, stages, mode: BindMode::ReadOnly } => {
                        let srv = buffer
                            .srv
                            .as_ref()
                            .ok_or_else(|| Error::InvalidResource(format!("{:?} buffer has no shader view", buffer.buffer_type)))?;
                        for stage in stages.stages() {
                            list.set_shader_resource(native_stage(stage), index, srv.as_mut_ptr());
                        }
                    }
                    BufferBinding::Resource { index, stages, mode: BindMode::WriteOnly } => {
                        let uav = buffer
                            .uav
                            .as_ref()
                            .ok_or_else(|| Error::InvalidResource(format!("{:?} buffer has no UAV", buffer.buffer_type)))?;
                        for stage in stages.stages() {
                            list.set_unordered_access(native_stage(stage), index, uav.as_mut_ptr(), initial_uav_count(buffer.append));
                        }
                    }
                }
            }
            Ok(())
        });
    }

    fn unbind_buffer(&mut self, binding: BufferBinding) {
        unsafe {
            match binding {
                BufferBinding::Vertex { slot, .. } => {
                    let buffers = [ptr::null_mut()];
                    let zeros = [0u32];
                    self.context.IASetVertexBuffers(slot, 1, buffers.as_ptr(), zeros.as_ptr(), zeros.as_ptr());
                }
                BufferBinding::Index { .. } => {
                    self.context.IASetIndexBuffer(ptr::null_mut(), 0, 0);
                    self.index_bound = false;
                }
                BufferBinding::Constant { index, stages } => {
                    for stage in stages.stages() {
                        self.set_constant_buffer(native_stage(stage), index, ptr::null_mut());
                    }
                }
                BufferBinding::Resource { index, stages, mode: BindMode::ReadOnly } => {
                    for stage in stages.stages() {
                        self.set_shader_resource(native_stage(stage), index, ptr::null_mut());
                    }
                }
                BufferBinding::Resource { index, stages, mode: BindMode::WriteOnly } => {
                    for stage in stages.stages() {
                        self.set_unordered_access(native_stage(stage), index, ptr::null_mut(), u32::MAX);
                    }
                }
            }
        }
    }

    fn bind_texture(&mut self, texture: &dyn NativeTexture, index: u32, stages: ShaderStageFlags) {
        self.logged("bind_texture", |list| {
            let texture = downcast_native::<D3D11Texture>(texture.as_any(), "Texture")?;
            for stage in stages.stages() {
                unsafe { list.set_shader_resource(native_stage(stage), index, texture.srv.as_mut_ptr()) };
            }
            Ok(())
        });
    }

    fn unbind_texture(&mut self, index: u32, stages: ShaderStageFlags) {
        for stage in stages.stages() {
            unsafe { self.set_shader_resource(native_stage(stage), index, ptr::null_mut()) };
        }
    }

    fn bind_sampler(&mut self, sampler: &dyn NativeSampler, index: u32, stages: ShaderStageFlags) {
        self.logged("bind_sampler", |list| {
            let sampler = downcast_native::<D3D11Sampler>(sampler.as_any(), "Sampler")?;
            for stage in stages.stages() {
                unsafe { list.set_sampler(native_stage(stage), index, sampler.sampler.as_mut_ptr()) };
            }
            Ok(())
        });
    }

    fn update_buffer(&mut self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        downcast_native::<D3D11Buffer>(buffer.as_any(), "Buffer")?.update_on(&self.context, data)
    }

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32) {
        self.draw_with("draw", |list| {
            unsafe { list.context.Draw(vertex_count, vertex_offset) };
            Ok(())
        });
    }

    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: i32) {
        self.draw_with("draw_indexed", |list| {
            list.require_index_buffer()?;
            unsafe { list.context.DrawIndexed(index_count, index_offset, vertex_offset) };
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
        self.draw_with("draw_instanced_indexed", |list| {
            list.require_index_buffer()?;
            unsafe {
                list.context.DrawIndexedInstanced(index_count, instance_count, index_offset, vertex_offset, instance_offset)
            };
            Ok(())
        });
    }

    fn draw_instanced_indirect(&mut self, arguments: &dyn NativeBuffer, offset: u32) {
        self.draw_with("draw_instanced_indirect", |list| {
            let buffer = downcast_native::<D3D11Buffer>(arguments.as_any(), "Buffer")?.buffer();
            if buffer.is_null() {
                return Err(Error::InvalidResource("Indirect arguments must be a linear buffer".to_string()));
            }
            unsafe { list.context.DrawInstancedIndirect(buffer, offset) };
            Ok(())
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.logged("dispatch_compute", |list| {
            if list.pipeline != Some(true) {
                return Err(Error::InvalidState("no compute pipeline bound".to_string()));
            }
            unsafe { list.context.Dispatch(x, y, z) };
            Ok(())
        });
    }

    fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32) {
        self.logged("write_timestamp", |list| {
            downcast_native_mut::<D3D11QueryPool>(pool.as_any_mut(), "QueryPool")?.write(&list.context, index)
        });
    }
}

#[cfg(test)]
#[path = "d3d11_command_list_tests.rs"]
mod tests;
