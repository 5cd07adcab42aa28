//! Headless backend - CPU emulation of the backend seam

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::render::{
    downcast_native, downcast_native_mut, subresource_index, subresource_layouts, total_byte_size,
    BackendCapabilities, BackendKind, BlendStateDesc, BlendStateKey, BufferBinding, BufferDesc,
    ChannelEncoding, CpuAccess, DepthStencilStateDesc, DepthStencilStateKey, DisjointAction,
    DisplaySurface, ImageFormat, NativeBlendState, NativeBuffer, NativeCommandList,
    NativeDepthStencilState, NativePipelineState, NativeQueryPool, NativeRasterizerState,
    NativeSampler, NativeShader, NativeTexture, PipelineStateDesc, PrimitiveTopology, QueryType,
    RasterizerStateDesc, RasterizerStateKey, RenderBackend, RenderBackendFactory,
    RenderDeviceConfig, ResourceId, SamplerDesc, ShaderStage, ShaderStageFlags, SubresourceLayout,
    SubresourceViewTable, TextureDescription, TimestampDisjointRing, Viewport,
};
use crate::{rhi_debug, rhi_error, rhi_info, rhi_warn};

/// Emulated GPU clock rate (ticks per second)
pub const HEADLESS_TIMESTAMP_FREQUENCY: u64 = 1_000_000_000;

/// Emulated cost of one draw or dispatch, in clock ticks
pub const HEADLESS_WORK_TICKS: u64 = 1_000;

const MAX_COLOR_ATTACHMENTS: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Default)]
struct Counters {
    blend_state_binds: AtomicU64,
    depth_stencil_state_binds: AtomicU64,
    rasterizer_state_binds: AtomicU64,
    pipeline_binds: AtomicU64,
    render_target_binds: AtomicU64,
    backbuffer_binds: AtomicU64,
    buffer_binds: AtomicU64,
    draws: AtomicU64,
    dispatches: AtomicU64,
    clears: AtomicU64,
    buffer_updates: AtomicU64,
    timestamps: AtomicU64,
    submits: AtomicU64,
    presents: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Native calls received by a headless backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub blend_state_binds: u64,
    pub depth_stencil_state_binds: u64,
    pub rasterizer_state_binds: u64,
    pub pipeline_binds: u64,
    pub render_target_binds: u64,
    pub backbuffer_binds: u64,
    pub buffer_binds: u64,
    pub draws: u64,
    pub dispatches: u64,
    pub clears: u64,
    pub buffer_updates: u64,
    pub timestamps: u64,
    pub submits: u64,
    pub presents: u64,
}

/// Handle reading the counters of a backend after it was moved into a device
#[derive(Clone)]
pub struct HeadlessStatsHandle {
    counters: Arc<Counters>,
}

impl HeadlessStatsHandle {
    pub fn snapshot(&self) -> HeadlessStats {
        let c = &self.counters;
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        HeadlessStats {
            blend_state_binds: read(&c.blend_state_binds),
            depth_stencil_state_binds: read(&c.depth_stencil_state_binds),
            rasterizer_state_binds: read(&c.rasterizer_state_binds),
            pipeline_binds: read(&c.pipeline_binds),
            render_target_binds: read(&c.render_target_binds),
            backbuffer_binds: read(&c.backbuffer_binds),
            buffer_binds: read(&c.buffer_binds),
            draws: read(&c.draws),
            dispatches: read(&c.dispatches),
            clears: read(&c.clears),
            buffer_updates: read(&c.buffer_updates),
            timestamps: read(&c.timestamps),
            submits: read(&c.submits),
            presents: read(&c.presents),
        }
    }
}

// ============================================================================
// Native objects
// ============================================================================

/// Host-memory buffer
pub struct HeadlessBuffer {
    desc: BufferDesc,
    memory: Arc<Mutex<Vec<u8>>>,
}

impl HeadlessBuffer {
    /// Copy of the current contents
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.memory).clone()
    }

    fn map_for_write(&self) -> Result<()> {
        if !self.desc.buffer_type.usage().cpu_access.contains(CpuAccess::WRITE) {
            rhi_error!("flint::headless", "Failed to map buffer!");
            return Err(Error::MappingFailed(format!(
                "{:?} buffer has no CPU write access",
                self.desc.buffer_type
            )));
        }
        Ok(())
    }

    fn check_fits(&self, data: &[u8]) -> Result<()> {
        let capacity = lock(&self.memory).len();
        if data.len() > capacity {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes exceeds buffer size ({} bytes)",
                data.len(),
                capacity
            )));
        }
        Ok(())
    }
}

impl NativeBuffer for HeadlessBuffer {}

struct TextureStorage {
    desc: TextureDescription,
    layouts: Vec<SubresourceLayout>,
    bytes: Mutex<Vec<u8>>,
    name: Mutex<String>,
}

impl TextureStorage {
    fn layout(&self, layer: u32, mip: u32) -> Option<&SubresourceLayout> {
        if layer >= self.desc.array_size || mip >= self.desc.mip_count {
            return None;
        }
        self.layouts.get(subresource_index(layer, mip, self.desc.mip_count) as usize)
    }

    /// Repeat `texel` over one mip of one layer (or of every layer)
    fn fill(&self, layer: Option<u32>, mip: u32, texel: &[u8]) {
        let layers = match layer {
            Some(layer) => layer..layer + 1,
            None => 0..self.desc.array_size,
        };
        let mut bytes = lock(&self.bytes);
        for layer in layers {
            if let Some(layout) = self.layout(layer, mip) {
                let start = layout.offset as usize;
                let end = start + layout.size as usize;
                if let Some(region) = bytes.get_mut(start..end) {
                    for chunk in region.chunks_exact_mut(texel.len()) {
                        chunk.copy_from_slice(texel);
                    }
                }
            }
        }
    }
}

/// Attachment view of one (layer, mip)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentView {
    pub layer: u32,
    pub mip: u32,
    pub width: u32,
    pub height: u32,
}

/// Host-memory texture; render targets carry their attachment views
pub struct HeadlessTexture {
    storage: Arc<TextureStorage>,
    views: Option<SubresourceViewTable<AttachmentView>>,
}

impl HeadlessTexture {
    pub fn desc(&self) -> &TextureDescription {
        &self.storage.desc
    }

    pub fn debug_name(&self) -> String {
        lock(&self.storage.name).clone()
    }

    pub fn is_render_target(&self) -> bool {
        self.views.is_some()
    }

    fn attachment_view(&self, layer: Option<u32>, mip: u32) -> Result<AttachmentView> {
        let views = self.views.as_ref().ok_or_else(|| {
            Error::IncompleteFramebuffer("attachment is not a render target".to_string())
        })?;
        views.get(layer.unwrap_or(0), mip).copied().ok_or_else(|| {
            Error::IncompleteFramebuffer(format!(
                "no view for layer {} mip {} ({} layers, {} mips)",
                layer.unwrap_or(0),
                mip,
                views.array_size(),
                views.mip_count()
            ))
        })
    }
}

impl NativeTexture for HeadlessTexture {}

pub struct HeadlessSampler {
    pub desc: SamplerDesc,
}

impl NativeSampler for HeadlessSampler {}

pub struct HeadlessShader {
    stage: ShaderStage,
    bytecode_size: usize,
}

impl HeadlessShader {
    pub fn bytecode_size(&self) -> usize {
        self.bytecode_size
    }
}

impl NativeShader for HeadlessShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeadlessBlendState {
    pub key: BlendStateKey,
}

impl NativeBlendState for HeadlessBlendState {}

#[derive(Debug, Clone, Copy)]
pub struct HeadlessDepthStencilState {
    pub key: DepthStencilStateKey,
}

impl NativeDepthStencilState for HeadlessDepthStencilState {}

#[derive(Debug, Clone, Copy)]
pub struct HeadlessRasterizerState {
    pub key: RasterizerStateKey,
}

impl NativeRasterizerState for HeadlessRasterizerState {}

pub struct HeadlessPipelineState {
    pub is_compute: bool,
    pub primitive_topology: PrimitiveTopology,
    blend: Option<HeadlessBlendState>,
    depth_stencil: Option<HeadlessDepthStencilState>,
    rasterizer: Option<HeadlessRasterizerState>,
}

impl NativePipelineState for HeadlessPipelineState {
    fn blend_state(&self) -> Option<&dyn NativeBlendState> {
        self.blend.as_ref().map(|state| state as &dyn NativeBlendState)
    }

    fn depth_stencil_state(&self) -> Option<&dyn NativeDepthStencilState> {
        self.depth_stencil.as_ref().map(|state| state as &dyn NativeDepthStencilState)
    }

    fn rasterizer_state(&self) -> Option<&dyn NativeRasterizerState> {
        self.rasterizer.as_ref().map(|state| state as &dyn NativeRasterizerState)
    }
}

struct QuerySlots {
    query_type: QueryType,
    values: Mutex<Vec<Option<u64>>>,
    ring: Mutex<TimestampDisjointRing>,
}

pub struct HeadlessQueryPool {
    slots: Arc<QuerySlots>,
}

impl NativeQueryPool for HeadlessQueryPool {
    fn on_allocate(&mut self, index: u32) {
        if let Some(value) = lock(&self.slots.values).get_mut(index as usize) {
            *value = None;
        }
    }
}

// ============================================================================
// Command list
// ============================================================================

enum HeadlessCommand {
    Fill {
        storage: Arc<TextureStorage>,
        layer: Option<u32>,
        mip: u32,
        texel: Vec<u8>,
    },
    UpdateBuffer {
        memory: Arc<Mutex<Vec<u8>>>,
        data: Vec<u8>,
    },
    Work,
    Timestamp {
        slots: Arc<QuerySlots>,
        index: u32,
        disjoint: DisjointAction,
    },
}

/// Deferred list executed by `submit_command_list`
pub struct HeadlessCommandList {
    counters: Arc<Counters>,
    commands: Vec<HeadlessCommand>,
    recording: bool,
    bound_targets: Vec<Arc<TextureStorage>>,
    bound_layer: Option<u32>,
    bound_mip: u32,
    viewport: Viewport,
    /// Shared state owner and this list's identity, in immediate-context mode
    shared_state: Option<(Arc<AtomicU64>, u64)>,
}

impl HeadlessCommandList {
    /// Number of commands waiting for submission
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Subresources a clear of `storage` touches: the bound view, else mip 0 of every layer
    fn clear_selection(&self, storage: &Arc<TextureStorage>) -> (Option<u32>, u32) {
        if self.bound_targets.iter().any(|bound| Arc::ptr_eq(bound, storage)) {
            (self.bound_layer, self.bound_mip)
        } else {
            (None, 0)
        }
    }
}

fn headless_texture<'a>(texture: &'a dyn NativeTexture) -> Result<&'a HeadlessTexture> {
    downcast_native::<HeadlessTexture>(texture.as_any(), "Texture")
}

fn headless_buffer<'a>(buffer: &'a dyn NativeBuffer) -> Result<&'a HeadlessBuffer> {
    downcast_native::<HeadlessBuffer>(buffer.as_any(), "Buffer")
}

impl NativeCommandList for HeadlessCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.bound_targets.clear();
        self.bound_layer = None;
        self.bound_mip = 0;
        self.recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.recording = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = *viewport;
    }

    fn bind_backbuffer(&mut self) -> Result<()> {
        bump(&self.counters.backbuffer_binds);
        self.bound_targets.clear();
        self.bound_layer = None;
        self.bound_mip = 0;
        Ok(())
    }

    fn bind_render_targets(
        &mut self,
        targets: &[&dyn NativeTexture],
        depth: Option<&dyn NativeTexture>,
        layer: Option<u32>,
        mip: u32,
    ) -> Result<()> {
        if targets.is_empty() && depth.is_none() {
            return Err(Error::IncompleteFramebuffer("no attachments".to_string()));
        }
        if targets.len() > MAX_COLOR_ATTACHMENTS {
            return Err(Error::IncompleteFramebuffer(format!(
                "{} color attachments (max {})",
                targets.len(),
                MAX_COLOR_ATTACHMENTS
            )));
        }

        let mut extent: Option<(u32, u32)> = None;
        let mut check_extent = |view: AttachmentView| -> Result<()> {
            match extent {
                Some(size) if size != (view.width, view.height) => Err(Error::IncompleteFramebuffer(format!(
                    "attachment sizes disagree ({}x{} vs {}x{})",
                    size.0, size.1, view.width, view.height
                ))),
                _ => {
                    extent = Some((view.width, view.height));
                    Ok(())
                }
            }
        };

        let mut colors = Vec::with_capacity(targets.len());
        for target in targets {
            let texture = headless_texture(*target)?;
            if texture.desc().format.is_depth() {
                return Err(Error::IncompleteFramebuffer(format!(
                    "{:?} bound as a color attachment",
                    texture.desc().format
                )));
            }
            check_extent(texture.attachment_view(layer, mip)?)?;
            colors.push(Arc::clone(&texture.storage));
        }

        if let Some(depth) = depth {
            let texture = headless_texture(depth)?;
            if !texture.desc().format.is_depth() {
                return Err(Error::IncompleteFramebuffer(format!(
                    "{:?} bound as the depth attachment",
                    texture.desc().format
                )));
            }
            check_extent(texture.attachment_view(layer, mip)?)?;
            colors.push(Arc::clone(&texture.storage));
        }

        bump(&self.counters.render_target_binds);
        self.bound_targets = colors;
        self.bound_layer = layer;
        self.bound_mip = mip;
        Ok(())
    }

    fn clear_render_target(&mut self, target: &dyn NativeTexture, color: [f32; 4]) {
        let texture = match headless_texture(target) {
            Ok(texture) => texture,
            Err(e) => {
                rhi_error!("flint::headless", "clear_render_target: {}", e);
                return;
            }
        };
        let Some(texel) = encode_color_texel(texture.desc().format, color) else {
            rhi_warn!("flint::headless", "Color clear of {:?} is not emulated", texture.desc().format);
            return;
        };

        bump(&self.counters.clears);
        let (layer, mip) = self.clear_selection(&texture.storage);
        self.commands.push(HeadlessCommand::Fill { storage: Arc::clone(&texture.storage), layer, mip, texel });
    }

    fn clear_depth_stencil(&mut self, target: &dyn NativeTexture, depth: f32, stencil: u8) {
        let texture = match headless_texture(target) {
            Ok(texture) => texture,
            Err(e) => {
                rhi_error!("flint::headless", "clear_depth_stencil: {}", e);
                return;
            }
        };
        let Some(texel) = encode_depth_texel(texture.desc().format, depth, stencil) else {
            rhi_warn!("flint::headless", "Depth clear of {:?} ignored", texture.desc().format);
            return;
        };

        bump(&self.counters.clears);
        let (layer, mip) = self.clear_selection(&texture.storage);
        self.commands.push(HeadlessCommand::Fill { storage: Arc::clone(&texture.storage), layer, mip, texel });
    }

    fn shared_state_changed(&mut self) -> bool {
        match &self.shared_state {
            Some((owner, id)) => owner.swap(*id, Ordering::Relaxed) != *id,
            None => false,
        }
    }

    fn bind_pipeline_state(&mut self, pipeline: &dyn NativePipelineState) -> Result<()> {
        downcast_native::<HeadlessPipelineState>(pipeline.as_any(), "Pipeline state")?;
        bump(&self.counters.pipeline_binds);
        Ok(())
    }

    fn bind_blend_state(&mut self, _state: &dyn NativeBlendState) {
        bump(&self.counters.blend_state_binds);
    }

    fn bind_depth_stencil_state(&mut self, _state: &dyn NativeDepthStencilState) {
        bump(&self.counters.depth_stencil_state_binds);
    }

    fn bind_rasterizer_state(&mut self, _state: &dyn NativeRasterizerState) {
        bump(&self.counters.rasterizer_state_binds);
    }

    fn bind_buffer(&mut self, _buffer: &dyn NativeBuffer, _binding: BufferBinding) {
        bump(&self.counters.buffer_binds);
    }

    fn unbind_buffer(&mut self, _binding: BufferBinding) {}

    fn bind_texture(&mut self, _texture: &dyn NativeTexture, _index: u32, _stages: ShaderStageFlags) {}

    fn unbind_texture(&mut self, _index: u32, _stages: ShaderStageFlags) {}

    fn bind_sampler(&mut self, _sampler: &dyn NativeSampler, _index: u32, _stages: ShaderStageFlags) {}

    fn update_buffer(&mut self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        let buffer = headless_buffer(buffer)?;
        buffer.map_for_write()?;
        buffer.check_fits(data)?;
        bump(&self.counters.buffer_updates);
        self.commands.push(HeadlessCommand::UpdateBuffer {
            memory: Arc::clone(&buffer.memory),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn draw(&mut self, _vertex_count: u32, _vertex_offset: u32) {
        bump(&self.counters.draws);
        self.commands.push(HeadlessCommand::Work);
    }

    fn draw_indexed(&mut self, _index_count: u32, _index_offset: u32, _vertex_offset: i32) {
        bump(&self.counters.draws);
        self.commands.push(HeadlessCommand::Work);
    }

    fn draw_instanced_indexed(
        &mut self,
        _index_count: u32,
        _instance_count: u32,
        _index_offset: u32,
        _vertex_offset: i32,
        _instance_offset: u32,
    ) {
        bump(&self.counters.draws);
        self.commands.push(HeadlessCommand::Work);
    }

    fn draw_instanced_indirect(&mut self, _arguments: &dyn NativeBuffer, _offset: u32) {
        bump(&self.counters.draws);
        self.commands.push(HeadlessCommand::Work);
    }

    fn dispatch_compute(&mut self, _x: u32, _y: u32, _z: u32) {
        bump(&self.counters.dispatches);
        self.commands.push(HeadlessCommand::Work);
    }

    fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32) {
        let pool = match downcast_native_mut::<HeadlessQueryPool>(pool.as_any_mut(), "Query pool") {
            Ok(pool) => pool,
            Err(e) => {
                rhi_error!("flint::headless", "write_timestamp: {}", e);
                return;
            }
        };

        bump(&self.counters.timestamps);
        let disjoint = lock(&pool.slots.ring).on_timestamp(index);
        self.commands.push(HeadlessCommand::Timestamp {
            slots: Arc::clone(&pool.slots),
            index,
            disjoint,
        });
    }
}

// ============================================================================
// Texel encoding
// ============================================================================

fn unorm(value: f32, max: f32) -> f32 {
    (value.clamp(0.0, 1.0) * max).round()
}

fn snorm(value: f32, max: f32) -> f32 {
    (value.clamp(-1.0, 1.0) * max).round()
}

/// Bytes of one texel of `format` holding `color`, `None` for formats the CPU path does not encode
fn encode_color_texel(format: ImageFormat, color: [f32; 4]) -> Option<Vec<u8>> {
    let channels = &color[..format.channel_count().min(4) as usize];
    let mut texel = Vec::with_capacity(format.element_size() as usize);

    match format.channel_encoding() {
        ChannelEncoding::Unorm8 => texel.extend(channels.iter().map(|&c| unorm(c, 255.0) as u8)),
        ChannelEncoding::Snorm8 => texel.extend(channels.iter().map(|&c| snorm(c, 127.0) as i8 as u8)),
        ChannelEncoding::Uint8 => texel.extend(channels.iter().map(|&c| c as u8)),
        ChannelEncoding::Sint8 => texel.extend(channels.iter().map(|&c| c as i8 as u8)),
        ChannelEncoding::Unorm16 => {
            channels.iter().for_each(|&c| texel.extend_from_slice(&(unorm(c, 65535.0) as u16).to_le_bytes()))
        }
        ChannelEncoding::Snorm16 => {
            channels.iter().for_each(|&c| texel.extend_from_slice(&(snorm(c, 32767.0) as i16).to_le_bytes()))
        }
        ChannelEncoding::Uint16 => channels.iter().for_each(|&c| texel.extend_from_slice(&(c as u16).to_le_bytes())),
        ChannelEncoding::Sint16 => channels.iter().for_each(|&c| texel.extend_from_slice(&(c as i16).to_le_bytes())),
        ChannelEncoding::Uint32 => channels.iter().for_each(|&c| texel.extend_from_slice(&(c as u32).to_le_bytes())),
        ChannelEncoding::Sint32 => channels.iter().for_each(|&c| texel.extend_from_slice(&(c as i32).to_le_bytes())),
        ChannelEncoding::Float32 => channels.iter().for_each(|&c| texel.extend_from_slice(&c.to_le_bytes())),
        ChannelEncoding::Packed if format == ImageFormat::Rgb10A2Unorm => {
            let packed = unorm(color[0], 1023.0) as u32
                | (unorm(color[1], 1023.0) as u32) << 10
                | (unorm(color[2], 1023.0) as u32) << 20
                | (unorm(color[3], 3.0) as u32) << 30;
            texel.extend_from_slice(&packed.to_le_bytes());
        }
        ChannelEncoding::Float16 | ChannelEncoding::Packed | ChannelEncoding::Block => return None,
    }

    if matches!(format, ImageFormat::Bgra8Unorm | ImageFormat::Bgra8UnormSrgb) {
        texel.swap(0, 2);
    }
    Some(texel)
}

fn encode_depth_texel(format: ImageFormat, depth: f32, stencil: u8) -> Option<Vec<u8>> {
    match format {
        ImageFormat::D32Float => Some(depth.to_le_bytes().to_vec()),
        ImageFormat::D16Unorm => Some((unorm(depth, 65535.0) as u16).to_le_bytes().to_vec()),
        ImageFormat::D24UnormS8Uint => {
            let packed = unorm(depth, 16_777_215.0) as u32 | (stencil as u32) << 24;
            Some(packed.to_le_bytes().to_vec())
        }
        ImageFormat::D32FloatS8Uint => {
            let mut texel = depth.to_le_bytes().to_vec();
            texel.extend_from_slice(&[stencil, 0, 0, 0]);
            Some(texel)
        }
        _ => None,
    }
}

// ============================================================================
// Backend
// ============================================================================

/// CPU backend
///
/// Buffers and textures live in host memory and recorded commands run at
/// submit. Every native call is counted in [`HeadlessStats`].
pub struct HeadlessBackend {
    counters: Arc<Counters>,
    clock: AtomicU64,
    backbuffer_size: (u32, u32),
    vsync: bool,
    shared_state: Option<Arc<AtomicU64>>,
}

impl HeadlessBackend {
    /// Backend with a `width` x `height` backbuffer
    pub fn new(width: u32, height: u32) -> Self {
        rhi_info!("flint::headless", "Headless backend created ({}x{})", width, height);
        Self {
            counters: Arc::new(Counters::default()),
            clock: AtomicU64::new(0),
            backbuffer_size: (width, height),
            vsync: true,
            shared_state: None,
        }
    }

    /// Make every command list share one fixed-function state owner, the way
    /// lists share the context on an immediate backend
    pub fn with_shared_state(mut self) -> Self {
        self.shared_state = Some(Arc::new(AtomicU64::new(0)));
        self
    }

    /// Counter handle that stays valid after the backend is boxed into a device
    pub fn stats_handle(&self) -> HeadlessStatsHandle {
        HeadlessStatsHandle { counters: Arc::clone(&self.counters) }
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats_handle().snapshot()
    }

    fn allocate_texture(
        &self,
        desc: &TextureDescription,
        initial_data: Option<&[u8]>,
        render_target: bool,
    ) -> Result<HeadlessTexture> {
        let size = total_byte_size(desc) as usize;
        let mut bytes = vec![0u8; size];
        if let Some(data) = initial_data {
            if data.len() != size {
                return Err(Error::InvalidResource(format!(
                    "Texture initial data is {} bytes, layout expects {}",
                    data.len(),
                    size
                )));
            }
            bytes.copy_from_slice(data);
        }

        let views = if render_target {
            Some(SubresourceViewTable::build(desc.array_size, desc.mip_count, |layer, mip| {
                let (width, height, _) = desc.mip_extent(mip);
                Ok(AttachmentView { layer, mip, width, height })
            })?)
        } else {
            None
        };

        Ok(HeadlessTexture {
            storage: Arc::new(TextureStorage {
                desc: *desc,
                layouts: subresource_layouts(desc),
                bytes: Mutex::new(bytes),
                name: Mutex::new(String::new()),
            }),
            views,
        })
    }

    fn execute(&self, command: HeadlessCommand) {
        match command {
            HeadlessCommand::Fill { storage, layer, mip, texel } => storage.fill(layer, mip, &texel),
            HeadlessCommand::UpdateBuffer { memory, data } => {
                // Sized at record time
                if let Some(target) = lock(&memory).get_mut(..data.len()) {
                    target.copy_from_slice(&data);
                }
            }
            HeadlessCommand::Work => {
                self.clock.fetch_add(HEADLESS_WORK_TICKS, Ordering::Relaxed);
            }
            HeadlessCommand::Timestamp { slots, index, disjoint } => {
                let now = self.clock.load(Ordering::Relaxed);
                if let Some(value) = lock(&slots.values).get_mut(index as usize) {
                    *value = Some(now);
                }
                if let DisjointAction::End(disjoint_index) = disjoint {
                    lock(&slots.ring).resolve(disjoint_index, HEADLESS_TIMESTAMP_FREQUENCY);
                }
            }
        }
    }
}

impl RenderBackendFactory for HeadlessBackend {
    fn create_backend(
        surface: &dyn DisplaySurface,
        config: &RenderDeviceConfig,
    ) -> Result<Box<dyn RenderBackend>> {
        let (width, height) = surface.client_size();
        if width == 0 || height == 0 {
            return Err(Error::InitializationFailed(format!(
                "Surface client area is {}x{}",
                width, height
            )));
        }
        let mut backend = HeadlessBackend::new(width, height);
        backend.vsync = config.vsync;
        Ok(Box::new(backend))
    }
}

impl RenderBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            deferred_recording: true,
            multithreaded_recording: true,
            host_readback: true,
            timestamp_queries: true,
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeBuffer>> {
        let mut memory = vec![0u8; desc.byte_width() as usize];
        if let Some(data) = initial_data {
            let target = memory.get_mut(..data.len()).ok_or_else(|| {
                Error::InvalidResource(format!(
                    "Initial data of {} bytes exceeds buffer size ({} bytes)",
                    data.len(),
                    desc.byte_width()
                ))
            })?;
            target.copy_from_slice(data);
        }
        rhi_debug!("flint::headless", "Buffer {:?} ({} bytes)", desc.buffer_type, memory.len());
        Ok(Box::new(HeadlessBuffer {
            desc: *desc,
            memory: Arc::new(Mutex::new(memory)),
        }))
    }

    fn destroy_buffer(&self, _buffer: Box<dyn NativeBuffer>) {}

    fn update_buffer(&self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        let buffer = headless_buffer(buffer)?;
        buffer.map_for_write()?;
        buffer.check_fits(data)?;
        bump(&self.counters.buffer_updates);
        lock(&buffer.memory)[..data.len()].copy_from_slice(data);
        Ok(())
    }

    // ===== TEXTURES =====

    fn create_texture(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(self.allocate_texture(desc, initial_data, false)?))
    }

    fn create_render_target(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(self.allocate_texture(desc, initial_data, true)?))
    }

    fn destroy_texture(&self, _texture: Box<dyn NativeTexture>) {}

    fn set_debug_name(&self, texture: &dyn NativeTexture, name: &str) {
        if let Ok(texture) = headless_texture(texture) {
            *lock(&texture.storage.name) = name.to_string();
        }
    }

    fn read_subresource(&self, texture: &dyn NativeTexture, layer: u32, mip: u32) -> Result<Vec<u8>> {
        let texture = headless_texture(texture)?;
        let layout = texture.storage.layout(layer, mip).ok_or_else(|| {
            Error::InvalidResource(format!("No subresource at layer {} mip {}", layer, mip))
        })?;
        let start = layout.offset as usize;
        let end = start + layout.size as usize;
        lock(&texture.storage.bytes)
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::InvalidResource("Subresource outside texture memory".to_string()))
    }

    // ===== SAMPLERS / SHADERS =====

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn NativeSampler>> {
        Ok(Box::new(HeadlessSampler { desc: *desc }))
    }

    fn destroy_sampler(&self, _sampler: Box<dyn NativeSampler>) {}

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> Result<Box<dyn NativeShader>> {
        if bytecode.is_empty() {
            return Err(Error::InvalidResource(format!("Empty {:?} shader bytecode", stage)));
        }
        Ok(Box::new(HeadlessShader { stage, bytecode_size: bytecode.len() }))
    }

    fn destroy_shader(&self, _shader: Box<dyn NativeShader>) {}

    // ===== FIXED-FUNCTION STATE =====

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<Box<dyn NativeBlendState>> {
        Ok(Box::new(HeadlessBlendState { key: desc.state_key() }))
    }

    fn destroy_blend_state(&self, _state: Box<dyn NativeBlendState>) {}

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Result<Box<dyn NativeDepthStencilState>> {
        Ok(Box::new(HeadlessDepthStencilState { key: desc.state_key() }))
    }

    fn destroy_depth_stencil_state(&self, _state: Box<dyn NativeDepthStencilState>) {}

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Result<Box<dyn NativeRasterizerState>> {
        Ok(Box::new(HeadlessRasterizerState { key: desc.state_key() }))
    }

    fn destroy_rasterizer_state(&self, _state: Box<dyn NativeRasterizerState>) {}

    // ===== PIPELINES =====

    fn create_pipeline_state(&self, desc: &PipelineStateDesc<'_>) -> Result<Box<dyn NativePipelineState>> {
        for shader in desc.graphics_shaders().chain(desc.compute_shader) {
            downcast_native::<HeadlessShader>(shader.native()?.as_any(), "Shader")?;
        }

        if desc.is_compute() {
            return Ok(Box::new(HeadlessPipelineState {
                is_compute: true,
                primitive_topology: desc.primitive_topology,
                blend: None,
                depth_stencil: None,
                rasterizer: None,
            }));
        }

        let blend = match desc.blend_state {
            Some(state) => Some(*downcast_native::<HeadlessBlendState>(state.native()?.as_any(), "Blend state")?),
            None => None,
        };
        let depth_stencil = match desc.depth_stencil_state {
            Some(state) => Some(*downcast_native::<HeadlessDepthStencilState>(
                state.native()?.as_any(),
                "Depth-stencil state",
            )?),
            None => None,
        };
        let rasterizer = match desc.rasterizer_state {
            Some(state) => Some(*downcast_native::<HeadlessRasterizerState>(
                state.native()?.as_any(),
                "Rasterizer state",
            )?),
            None => None,
        };

        Ok(Box::new(HeadlessPipelineState {
            is_compute: false,
            primitive_topology: desc.primitive_topology,
            blend,
            depth_stencil,
            rasterizer,
        }))
    }

    fn destroy_pipeline_state(&self, _pipeline: Box<dyn NativePipelineState>) {}

    // ===== COMMAND LISTS =====

    fn create_command_list(&self) -> Result<Box<dyn NativeCommandList>> {
        Ok(Box::new(HeadlessCommandList {
            counters: Arc::clone(&self.counters),
            commands: Vec::new(),
            recording: false,
            bound_targets: Vec::new(),
            bound_layer: None,
            bound_mip: 0,
            viewport: Viewport::default(),
            shared_state: self.shared_state.as_ref().map(|owner| (Arc::clone(owner), ResourceId::next().value())),
        }))
    }

    fn destroy_command_list(&self, _command_list: Box<dyn NativeCommandList>) {}

    fn submit_command_list(&self, command_list: &mut dyn NativeCommandList) -> Result<()> {
        let list = downcast_native_mut::<HeadlessCommandList>(command_list.as_any_mut(), "Command list")?;
        if list.recording {
            return Err(Error::InvalidState("Command list submitted while recording".to_string()));
        }

        bump(&self.counters.submits);
        for command in list.commands.drain(..) {
            self.execute(command);
        }
        Ok(())
    }

    // ===== QUERIES =====

    fn create_query_pool(&self, query_type: QueryType, capacity: u32) -> Result<Box<dyn NativeQueryPool>> {
        Ok(Box::new(HeadlessQueryPool {
            slots: Arc::new(QuerySlots {
                query_type,
                values: Mutex::new(vec![None; capacity as usize]),
                ring: Mutex::new(TimestampDisjointRing::new(capacity)),
            }),
        }))
    }

    fn destroy_query_pool(&self, _pool: Box<dyn NativeQueryPool>) {}

    fn query_result(&self, pool: &mut dyn NativeQueryPool, index: u32) -> Option<u64> {
        let pool = downcast_native::<HeadlessQueryPool>((*pool).as_any(), "Query pool").ok()?;
        let value = lock(&pool.slots.values).get(index as usize).copied().flatten()?;
        if pool.slots.query_type == QueryType::Timestamp {
            lock(&pool.slots.ring).resolved_frequency(index)?;
        }
        Some(value)
    }

    fn timestamp_to_milliseconds(&self, pool: &dyn NativeQueryPool, ticks: u64) -> f64 {
        match downcast_native::<HeadlessQueryPool>(pool.as_any(), "Query pool") {
            Ok(pool) => lock(&pool.slots.ring).ticks_to_milliseconds(ticks),
            Err(_) => 0.0,
        }
    }

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()> {
        bump(&self.counters.presents);
        Ok(())
    }

    fn set_vsync_state(&mut self, enabled: bool) {
        self.vsync = enabled;
    }

    fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidState(format!("Cannot resize backbuffer to {}x{}", width, height)));
        }
        self.backbuffer_size = (width, height);
        Ok(())
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        self.backbuffer_size
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "headless_tests.rs"]
mod tests;
