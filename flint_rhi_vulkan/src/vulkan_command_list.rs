/// VulkanCommandList - Vulkan implementation of NativeCommandList
///
/// Records into a primary command buffer owned by the list. Rendering is
/// opened lazily with dynamic rendering at the first draw after a target
/// change and closed before any transfer command (clear, update) or when the
/// targets change. Resources are pushed with VK_KHR_push_descriptor right
/// before the draw or dispatch that uses them.

use ash::vk;
use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BufferBinding, FillMode, NativeBlendState, NativeBuffer,
    NativeCommandList, NativeDepthStencilState, NativePipelineState, NativeQueryPool,
    NativeRasterizerState, NativeSampler, NativeTexture, ShaderStageFlags, Viewport,
    DepthStencilStateDesc, RasterizerStateDesc,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_err, rhi_error, rhi_warn};
use std::sync::Arc;

use crate::vulkan_buffer::{BufferStorage, StagingBuffer, VulkanBuffer};
use crate::vulkan_context::{binding_slots, GpuContext};
use crate::vulkan_format::{aspect_mask, clear_color_value, index_type_to_vk};
use crate::vulkan_pipeline::{format_has_stencil, AttachmentSignature, PipelineShared, VariantKey, VulkanPipelineState};
use crate::vulkan_query_pool::VulkanQueryPool;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_state::{VulkanBlendState, VulkanDepthStencilState, VulkanRasterizerState};
use crate::vulkan_swapchain::SharedBackbuffer;
use crate::vulkan_texture::{memory_barrier, VulkanTexture};

/// Largest chunk `vkCmdUpdateBuffer` accepts
const UPDATE_CHUNK: usize = 65536;

/// Simultaneous color attachments
const MAX_COLOR_TARGETS: usize = 8;

/// Vertex buffer slots
const MAX_VERTEX_SLOTS: usize = 16;

// ===== ATTACHMENTS =====

#[derive(Debug, Clone, Copy)]
struct Attachment {
    image: vk::Image,
    view: vk::ImageView,
    format: vk::Format,
    range: vk::ImageSubresourceRange,
}

#[derive(Debug, Clone)]
struct BoundAttachments {
    colors: Vec<Attachment>,
    depth: Option<Attachment>,
    extent: vk::Extent2D,
    samples: vk::SampleCountFlags,
    layer_count: u32,
}

impl BoundAttachments {
    fn signature(&self) -> AttachmentSignature {
        AttachmentSignature {
            color_formats: self.colors.iter().map(|c| c.format).collect(),
            depth_format: self.depth.map(|d| d.format).unwrap_or(vk::Format::UNDEFINED),
            samples: self.samples,
        }
    }

    /// Bound range of `image`, if it is one of the attachments
    fn range_of(&self, image: vk::Image) -> Option<vk::ImageSubresourceRange> {
        self.colors
            .iter()
            .chain(self.depth.iter())
            .find(|attachment| attachment.image == image)
            .map(|attachment| attachment.range)
    }
}

// ===== DESCRIPTORS =====

/// Resources bound per binding slot, pushed as one descriptor set
#[derive(Debug, Clone, Default)]
struct DescriptorTable {
    constants: [vk::Buffer; binding_slots::CONSTANT_COUNT as usize],
    textures: [vk::ImageView; binding_slots::TEXTURE_COUNT as usize],
    samplers: [vk::Sampler; binding_slots::SAMPLER_COUNT as usize],
    storage_buffers: [vk::Buffer; binding_slots::STORAGE_BUFFER_COUNT as usize],
    storage_images: [vk::ImageView; binding_slots::STORAGE_IMAGE_COUNT as usize],
}

/// Set `slots[index]`, logging out-of-range indices
fn set_slot<T: Copy>(slots: &mut [T], index: u32, value: T, kind: &str) -> bool {
    match slots.get_mut(index as usize) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => {
            rhi_warn!("flint::vulkan", "{} slot {} out of range (max {})", kind, index, slots.len());
            false
        }
    }
}

impl DescriptorTable {
    fn push(&self, ctx: &GpuContext, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint) {
        let buffer_infos: Vec<(u32, vk::DescriptorType, [vk::DescriptorBufferInfo; 1])> = self
            .constants
            .iter()
            .enumerate()
            .map(|(i, &buffer)| (binding_slots::CONSTANT_BASE + i as u32, vk::DescriptorType::UNIFORM_BUFFER, buffer))
            .chain(self.storage_buffers.iter().enumerate().map(|(i, &buffer)| {
                (binding_slots::STORAGE_BUFFER_BASE + i as u32, vk::DescriptorType::STORAGE_BUFFER, buffer)
            }))
            .filter(|(_, _, buffer)| *buffer != vk::Buffer::null())
            .map(|(binding, ty, buffer)| {
                (binding, ty, [vk::DescriptorBufferInfo { buffer, offset: 0, range: vk::WHOLE_SIZE }])
            })
            .collect();

        let image_infos: Vec<(u32, vk::DescriptorType, [vk::DescriptorImageInfo; 1])> = self
            .textures
            .iter()
            .enumerate()
            .map(|(i, &view)| (binding_slots::TEXTURE_BASE + i as u32, vk::DescriptorType::SAMPLED_IMAGE, view, vk::Sampler::null()))
            .chain(self.storage_images.iter().enumerate().map(|(i, &view)| {
                (binding_slots::STORAGE_IMAGE_BASE + i as u32, vk::DescriptorType::STORAGE_IMAGE, view, vk::Sampler::null())
            }))
            .chain(self.samplers.iter().enumerate().map(|(i, &sampler)| {
                (binding_slots::SAMPLER_BASE + i as u32, vk::DescriptorType::SAMPLER, vk::ImageView::null(), sampler)
            }))
            .filter(|(_, ty, view, sampler)| {
                if *ty == vk::DescriptorType::SAMPLER {
                    *sampler != vk::Sampler::null()
                } else {
                    *view != vk::ImageView::null()
                }
            })
            .map(|(binding, ty, view, sampler)| {
                let info = vk::DescriptorImageInfo {
                    sampler,
                    image_view: view,
                    image_layout: vk::ImageLayout::GENERAL,
                };
                (binding, ty, [info])
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = buffer_infos
            .iter()
            .map(|(binding, ty, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_binding(*binding)
                    .descriptor_type(*ty)
                    .buffer_info(info)
            })
            .chain(image_infos.iter().map(|(binding, ty, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_binding(*binding)
                    .descriptor_type(*ty)
                    .image_info(info)
            }))
            .collect();

        if writes.is_empty() {
            return;
        }
        unsafe {
            ctx.push_descriptor
                .cmd_push_descriptor_set(cmd, bind_point, ctx.pipeline_layout, 0, &writes);
        }
    }
}

// ===== COMMAND LIST =====

/// Vulkan command list implementation
pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    backbuffer: SharedBackbuffer,

    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    /// Signaled when the last submission of this list has completed
    fence: vk::Fence,
    recording: bool,

    attachments: Option<BoundAttachments>,
    rendering: bool,
    viewport: Option<Viewport>,

    pipeline: Option<Arc<PipelineShared>>,
    bound_pipeline: vk::Pipeline,
    blend: VulkanBlendState,
    fill_mode: FillMode,
    depth_stencil: VulkanDepthStencilState,
    rasterizer: VulkanRasterizerState,
    dynamic_dirty: bool,

    descriptors: DescriptorTable,
    graphics_descriptors_dirty: bool,
    compute_descriptors_dirty: bool,
    vertex_buffers: [Option<(vk::Buffer, u32)>; MAX_VERTEX_SLOTS],
    vertex_buffers_dirty: bool,

    /// Objects referenced by the recorded commands, released once the fence signals
    retained_pipelines: Vec<Arc<PipelineShared>>,
    retained_staging: Vec<StagingBuffer>,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: &Arc<GpuContext>, backbuffer: SharedBackbuffer) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                rhi_error!("flint::vulkan", "Failed to create command pool: {:?}", e);
                Error::BackendError(format!("Failed to create command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(rhi_err!("flint::vulkan", "Failed to allocate command buffer: {:?}", e));
                }
            };

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            let fence = match ctx.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(rhi_err!("flint::vulkan", "Failed to create command list fence: {:?}", e));
                }
            };

            Ok(Self {
                ctx: ctx.clone(),
                backbuffer,
                command_pool,
                command_buffer: command_buffers[0],
                fence,
                recording: false,
                attachments: None,
                rendering: false,
                viewport: None,
                pipeline: None,
                bound_pipeline: vk::Pipeline::null(),
                blend: VulkanBlendState::opaque(),
                fill_mode: FillMode::Solid,
                depth_stencil: VulkanDepthStencilState::new(&DepthStencilStateDesc::disabled()),
                rasterizer: VulkanRasterizerState::new(&RasterizerStateDesc::default()),
                dynamic_dirty: true,
                descriptors: DescriptorTable::default(),
                graphics_descriptors_dirty: false,
                compute_descriptors_dirty: false,
                vertex_buffers: [None; MAX_VERTEX_SLOTS],
                vertex_buffers_dirty: false,
                retained_pipelines: Vec::new(),
                retained_staging: Vec::new(),
            })
        }
    }

    /// Submit the recorded commands on the graphics queue
    pub(crate) fn submit(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list submitted while recording".to_string()));
        }
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.ctx
                .device
                .reset_fences(&[self.fence])
                .map_err(|e| rhi_err!("flint::vulkan", "Failed to reset command list fence: {:?}", e))?;
            let queue = self.ctx.queue();
            self.ctx
                .device
                .queue_submit(*queue, &[submit_info], self.fence)
                .map_err(|e| rhi_err!("flint::vulkan", "Failed to submit command list: {:?}", e))
        }
    }

    fn wait_for_completion(&self) -> Result<()> {
        unsafe { self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to wait for command list: {:?}", e))
    }

    // ===== RENDERING SCOPE =====

    fn end_rendering(&mut self) {
        if self.rendering {
            unsafe {
                self.ctx.device.cmd_end_rendering(self.command_buffer);
                memory_barrier(&self.ctx.device, self.command_buffer);
            }
            self.rendering = false;
        }
    }

    fn ensure_attachments(&mut self) -> Result<()> {
        if self.attachments.is_none() {
            self.bind_backbuffer()?;
        }
        Ok(())
    }

    fn ensure_rendering(&mut self) -> Result<()> {
        if self.rendering {
            return Ok(());
        }
        self.ensure_attachments()?;
        let Some(attachments) = &self.attachments else {
            return Err(Error::InvalidState("No render targets bound".to_string()));
        };

        let color_infos: Vec<vk::RenderingAttachmentInfo> = attachments
            .colors
            .iter()
            .map(|color| {
                vk::RenderingAttachmentInfo::default()
                    .image_view(color.view)
                    .image_layout(vk::ImageLayout::GENERAL)
                    .load_op(vk::AttachmentLoadOp::LOAD)
                    .store_op(vk::AttachmentStoreOp::STORE)
            })
            .collect();
        let depth_info = attachments.depth.map(|depth| {
            vk::RenderingAttachmentInfo::default()
                .image_view(depth.view)
                .image_layout(vk::ImageLayout::GENERAL)
                .load_op(vk::AttachmentLoadOp::LOAD)
                .store_op(vk::AttachmentStoreOp::STORE)
        });

        let render_area = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: attachments.extent };
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(attachments.layer_count)
            .color_attachments(&color_infos);
        if let (Some(depth_info), Some(depth)) = (depth_info.as_ref(), attachments.depth) {
            rendering_info = rendering_info.depth_attachment(depth_info);
            if format_has_stencil(depth.format) {
                rendering_info = rendering_info.stencil_attachment(depth_info);
            }
        }

        let extent = attachments.extent;
        unsafe {
            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[render_area]);
        }
        self.rendering = true;
        self.apply_viewport(extent);
        Ok(())
    }

    fn apply_viewport(&self, extent: vk::Extent2D) {
        let viewport = self.viewport.unwrap_or_else(|| Viewport::new(extent.width, extent.height));
        unsafe {
            self.ctx
                .device
                .cmd_set_viewport(self.command_buffer, 0, &[flipped_viewport(&viewport)]);
        }
    }

    fn set_attachments(&mut self, attachments: BoundAttachments) {
        self.end_rendering();
        self.attachments = Some(attachments);
    }

    // ===== DRAW PREPARATION =====

    fn prepare_draw(&mut self) -> Result<()> {
        let pipeline = self
            .pipeline
            .clone()
            .ok_or_else(|| Error::InvalidState("Draw without a bound pipeline state".to_string()))?;
        if pipeline.is_compute() {
            return Err(Error::InvalidState("Draw with a compute pipeline bound".to_string()));
        }

        self.ensure_rendering()?;
        let signature = self
            .attachments
            .as_ref()
            .map(BoundAttachments::signature)
            .unwrap_or_default();

        let key = VariantKey { blend: self.blend.key, fill_mode: self.fill_mode, attachments: signature };
        let variant = pipeline.variant(&key, &self.blend)?;
        let cmd = self.command_buffer;
        let device = &self.ctx.device;

        unsafe {
            if variant != self.bound_pipeline {
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, variant);
                self.bound_pipeline = variant;
            }

            if self.dynamic_dirty {
                self.depth_stencil.record(device, cmd, &self.ctx.limits);
                self.rasterizer.record(device, cmd);
                self.dynamic_dirty = false;
            }

            if self.vertex_buffers_dirty {
                for (slot, bound) in self.vertex_buffers.iter().enumerate() {
                    if let Some((buffer, stride)) = bound {
                        device.cmd_bind_vertex_buffers2(cmd, slot as u32, &[*buffer], &[0], None, Some(&[*stride as u64]));
                    }
                }
                self.vertex_buffers_dirty = false;
            }
        }

        if self.graphics_descriptors_dirty {
            self.descriptors.push(&self.ctx, cmd, vk::PipelineBindPoint::GRAPHICS);
            self.graphics_descriptors_dirty = false;
        }
        Ok(())
    }

    /// Run a draw, logging instead of failing (the seam's draws are infallible)
    fn draw_with(&mut self, name: &str, record: impl FnOnce(&ash::Device, vk::CommandBuffer)) {
        match self.prepare_draw() {
            Ok(()) => record(&self.ctx.device, self.command_buffer),
            Err(e) => rhi_error!("flint::vulkan", "{} skipped: {}", name, e),
        }
    }

    fn invalidate_descriptors(&mut self) {
        self.graphics_descriptors_dirty = true;
        self.compute_descriptors_dirty = true;
    }

    fn texture_range(&self, texture: &VulkanTexture) -> vk::ImageSubresourceRange {
        self.attachments
            .as_ref()
            .and_then(|attachments| attachments.range_of(texture.image))
            .unwrap_or(vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(texture.desc.format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: texture.layer_count(),
            })
    }

    fn render_target<'a>(&self, texture: &'a dyn NativeTexture) -> Result<&'a VulkanTexture> {
        let texture = downcast_native::<VulkanTexture>(texture.as_any(), "RenderTarget")?;
        if !texture.is_render_target() {
            return Err(Error::IncompleteFramebuffer("Texture was not created as a render target".to_string()));
        }
        Ok(texture)
    }

    fn attachment_for(&self, texture: &VulkanTexture, layer: Option<u32>, mip: u32) -> Result<Attachment> {
        let view = texture.attachment_view(layer, mip).ok_or_else(|| {
            Error::IncompleteFramebuffer(format!("No view for layer {:?}, mip {}", layer, mip))
        })?;
        let (base_layer, layer_count) = match layer {
            Some(layer) => (layer, 1),
            None => (0, texture.layer_count()),
        };
        Ok(Attachment {
            image: texture.image,
            view,
            format: texture.format,
            range: vk::ImageSubresourceRange {
                aspect_mask: aspect_mask(texture.desc.format),
                base_mip_level: mip,
                level_count: 1,
                base_array_layer: base_layer,
                layer_count,
            },
        })
    }
}

/// D3D-style viewport on Vulkan (negative height flips Y)
pub(crate) fn flipped_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x as f32,
        y: viewport.y as f32 + viewport.height as f32,
        width: viewport.width as f32,
        height: -(viewport.height as f32),
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

/// `data` split into `vkCmdUpdateBuffer` chunks, the tail padded to 4 bytes
pub(crate) fn update_chunks(data: &[u8]) -> Vec<(u64, Vec<u8>)> {
    data.chunks(UPDATE_CHUNK)
        .enumerate()
        .map(|(i, chunk)| {
            let mut bytes = chunk.to_vec();
            bytes.resize(chunk.len().next_multiple_of(4), 0);
            ((i * UPDATE_CHUNK) as u64, bytes)
        })
        .collect()
}

impl NativeCommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::InvalidState("Command list already recording".to_string()));
        }
        self.wait_for_completion()?;
        self.retained_pipelines.clear();
        self.retained_staging.clear();

        unsafe {
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }

        self.recording = true;
        self.attachments = None;
        self.rendering = false;
        self.viewport = None;
        self.pipeline = None;
        self.bound_pipeline = vk::Pipeline::null();
        self.blend = VulkanBlendState::opaque();
        self.fill_mode = FillMode::Solid;
        self.depth_stencil = VulkanDepthStencilState::new(&DepthStencilStateDesc::disabled());
        self.rasterizer = VulkanRasterizerState::new(&RasterizerStateDesc::default());
        self.dynamic_dirty = true;
        self.descriptors = DescriptorTable::default();
        self.graphics_descriptors_dirty = false;
        self.compute_descriptors_dirty = false;
        self.vertex_buffers = [None; MAX_VERTEX_SLOTS];
        self.vertex_buffers_dirty = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.recording {
            return Err(Error::InvalidState("Command list not recording".to_string()));
        }
        self.end_rendering();
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.recording = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = Some(*viewport);
        if self.rendering {
            if let Some(extent) = self.attachments.as_ref().map(|a| a.extent) {
                self.apply_viewport(extent);
            }
        }
    }

    fn bind_backbuffer(&mut self) -> Result<()> {
        let backbuffer = *self
            .backbuffer
            .read()
            .map_err(|_| Error::BackendError("Backbuffer lock poisoned".to_string()))?;
        if backbuffer.view == vk::ImageView::null() {
            return Err(Error::InvalidState("No swapchain image acquired".to_string()));
        }

        self.set_attachments(BoundAttachments {
            colors: vec![Attachment {
                image: backbuffer.image,
                view: backbuffer.view,
                format: backbuffer.format,
                range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
            }],
            depth: None,
            extent: backbuffer.extent,
            samples: vk::SampleCountFlags::TYPE_1,
            layer_count: 1,
        });
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
        if targets.is_empty() && depth.is_none() {
            return Err(Error::IncompleteFramebuffer("No render targets given".to_string()));
        }

        let mut textures = Vec::with_capacity(targets.len());
        for &target in targets {
            textures.push(self.render_target(target)?);
        }
        let depth_texture = depth.map(|depth| self.render_target(depth)).transpose()?;

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
        let layer_count = match layer {
            Some(_) => 1,
            None => first.layer_count(),
        };

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
        if let Some(depth_texture) = depth_texture {
            if !depth_texture.desc.format.is_depth() {
                return Err(Error::IncompleteFramebuffer(format!(
                    "{:?} cannot be bound as a depth target",
                    depth_texture.desc.format
                )));
            }
        }

        let colors = textures
            .iter()
            .map(|texture| self.attachment_for(texture, layer, mip))
            .collect::<Result<Vec<_>>>()?;
        let depth_attachment = depth_texture
            .map(|texture| self.attachment_for(texture, layer, mip))
            .transpose()?;

        self.set_attachments(BoundAttachments {
            colors,
            depth: depth_attachment,
            extent: vk::Extent2D { width, height },
            samples: crate::vulkan_format::sample_count_to_vk(samples),
            layer_count,
        });
        Ok(())
    }

    fn clear_render_target(&mut self, target: &dyn NativeTexture, color: [f32; 4]) {
        let texture = match downcast_native::<VulkanTexture>(target.as_any(), "RenderTarget") {
            Ok(texture) => texture,
            Err(e) => {
                rhi_error!("flint::vulkan", "clear_render_target skipped: {}", e);
                return;
            }
        };
        let range = self.texture_range(texture);
        let value = clear_color_value(texture.desc.format, color);
        let image = texture.image;
        self.end_rendering();
        unsafe {
            self.ctx
                .device
                .cmd_clear_color_image(self.command_buffer, image, vk::ImageLayout::GENERAL, &value, &[range]);
            memory_barrier(&self.ctx.device, self.command_buffer);
        }
    }

    fn clear_depth_stencil(&mut self, target: &dyn NativeTexture, depth: f32, stencil: u8) {
        let texture = match downcast_native::<VulkanTexture>(target.as_any(), "RenderTarget") {
            Ok(texture) => texture,
            Err(e) => {
                rhi_error!("flint::vulkan", "clear_depth_stencil skipped: {}", e);
                return;
            }
        };
        let range = self.texture_range(texture);
        let value = vk::ClearDepthStencilValue { depth, stencil: stencil as u32 };
        let image = texture.image;
        self.end_rendering();
        unsafe {
            self.ctx
                .device
                .cmd_clear_depth_stencil_image(self.command_buffer, image, vk::ImageLayout::GENERAL, &value, &[range]);
            memory_barrier(&self.ctx.device, self.command_buffer);
        }
    }

    fn bind_pipeline_state(&mut self, pipeline: &dyn NativePipelineState) -> Result<()> {
        let pipeline = downcast_native::<VulkanPipelineState>(pipeline.as_any(), "PipelineState")?;
        let shared = pipeline.shared.clone();

        if shared.is_compute() {
            unsafe {
                self.ctx.device.cmd_bind_pipeline(
                    self.command_buffer,
                    vk::PipelineBindPoint::COMPUTE,
                    shared.compute_pipeline(),
                );
            }
        }
        // Graphics variants are resolved at draw time
        self.bound_pipeline = vk::Pipeline::null();
        self.invalidate_descriptors();
        self.retained_pipelines.push(shared.clone());
        self.pipeline = Some(shared);
        Ok(())
    }

    fn bind_blend_state(&mut self, state: &dyn NativeBlendState) {
        match downcast_native::<VulkanBlendState>(state.as_any(), "BlendState") {
            Ok(state) => self.blend = *state,
            Err(e) => rhi_error!("flint::vulkan", "bind_blend_state skipped: {}", e),
        }
    }

    fn bind_depth_stencil_state(&mut self, state: &dyn NativeDepthStencilState) {
        match downcast_native::<VulkanDepthStencilState>(state.as_any(), "DepthStencilState") {
            Ok(state) => {
                self.depth_stencil = *state;
                self.dynamic_dirty = true;
            }
            Err(e) => rhi_error!("flint::vulkan", "bind_depth_stencil_state skipped: {}", e),
        }
    }

    fn bind_rasterizer_state(&mut self, state: &dyn NativeRasterizerState) {
        match downcast_native::<VulkanRasterizerState>(state.as_any(), "RasterizerState") {
            Ok(state) => {
                self.rasterizer = *state;
                self.fill_mode = state.desc.fill_mode;
                self.dynamic_dirty = true;
            }
            Err(e) => rhi_error!("flint::vulkan", "bind_rasterizer_state skipped: {}", e),
        }
    }

    fn bind_buffer(&mut self, buffer: &dyn NativeBuffer, binding: BufferBinding) {
        let buffer = match downcast_native::<VulkanBuffer>(buffer.as_any(), "Buffer") {
            Ok(buffer) => buffer,
            Err(e) => {
                rhi_error!("flint::vulkan", "bind_buffer skipped: {}", e);
                return;
            }
        };

        match (binding, &buffer.storage) {
            (BufferBinding::Vertex { slot, stride }, BufferStorage::Linear { buffer }) => {
                if set_slot(&mut self.vertex_buffers, slot, Some((*buffer, stride)), "Vertex buffer") {
                    self.vertex_buffers_dirty = true;
                }
            }
            (BufferBinding::Index { index_type }, BufferStorage::Linear { buffer }) => unsafe {
                self.ctx
                    .device
                    .cmd_bind_index_buffer(self.command_buffer, *buffer, 0, index_type_to_vk(index_type));
            },
            (BufferBinding::Constant { index, .. }, BufferStorage::Linear { buffer }) => {
                if set_slot(&mut self.descriptors.constants, index, *buffer, "Constant buffer") {
                    self.invalidate_descriptors();
                }
            }
            (BufferBinding::Resource { index, .. }, BufferStorage::Linear { buffer }) => {
                if set_slot(&mut self.descriptors.storage_buffers, index, *buffer, "Storage buffer") {
                    self.invalidate_descriptors();
                }
            }
            (BufferBinding::Resource { index, .. }, BufferStorage::Image { view, .. }) => {
                if set_slot(&mut self.descriptors.storage_images, index, *view, "Storage image") {
                    self.invalidate_descriptors();
                }
            }
            (binding, BufferStorage::Image { .. }) => {
                rhi_error!("flint::vulkan", "Texture-backed buffer cannot be bound as {:?}", binding);
            }
        }
    }

    fn unbind_buffer(&mut self, binding: BufferBinding) {
        match binding {
            BufferBinding::Vertex { slot, .. } => {
                set_slot(&mut self.vertex_buffers, slot, None, "Vertex buffer");
            }
            // Index buffers stay bound until replaced
            BufferBinding::Index { .. } => {}
            BufferBinding::Constant { index, .. } => {
                set_slot(&mut self.descriptors.constants, index, vk::Buffer::null(), "Constant buffer");
                self.invalidate_descriptors();
            }
            BufferBinding::Resource { index, .. } => {
                set_slot(&mut self.descriptors.storage_buffers, index, vk::Buffer::null(), "Storage buffer");
                set_slot(&mut self.descriptors.storage_images, index, vk::ImageView::null(), "Storage image");
                self.invalidate_descriptors();
            }
        }
    }

    fn bind_texture(&mut self, texture: &dyn NativeTexture, index: u32, _stages: ShaderStageFlags) {
        match downcast_native::<VulkanTexture>(texture.as_any(), "Texture") {
            Ok(texture) => {
                if set_slot(&mut self.descriptors.textures, index, texture.sampled_view, "Texture") {
                    self.invalidate_descriptors();
                }
            }
            Err(e) => rhi_error!("flint::vulkan", "bind_texture skipped: {}", e),
        }
    }

    fn unbind_texture(&mut self, index: u32, _stages: ShaderStageFlags) {
        if set_slot(&mut self.descriptors.textures, index, vk::ImageView::null(), "Texture") {
            self.invalidate_descriptors();
        }
    }

    fn bind_sampler(&mut self, sampler: &dyn NativeSampler, index: u32, _stages: ShaderStageFlags) {
        match downcast_native::<VulkanSampler>(sampler.as_any(), "Sampler") {
            Ok(sampler) => {
                if set_slot(&mut self.descriptors.samplers, index, sampler.sampler, "Sampler") {
                    self.invalidate_descriptors();
                }
            }
            Err(e) => rhi_error!("flint::vulkan", "bind_sampler skipped: {}", e),
        }
    }

    fn update_buffer(&mut self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        let buffer = downcast_native::<VulkanBuffer>(buffer.as_any(), "Buffer")?;
        if data.len() as u64 > buffer.size {
            return Err(Error::InvalidResource(format!(
                "Update of {} bytes exceeds buffer size ({} bytes)",
                data.len(),
                buffer.size
            )));
        }

        self.end_rendering();
        match &buffer.storage {
            BufferStorage::Linear { buffer: handle } => {
                let chunks = update_chunks(data);
                if let Some((offset, last)) = chunks.last() {
                    if offset + last.len() as u64 > buffer.size {
                        return Err(Error::InvalidResource(
                            "Buffer size is not a multiple of 4, cannot pad the update".to_string(),
                        ));
                    }
                }
                unsafe {
                    for (offset, bytes) in &chunks {
                        self.ctx.device.cmd_update_buffer(self.command_buffer, *handle, *offset, bytes);
                    }
                }
            }
            BufferStorage::Image { image, extent, .. } => {
                let staging = StagingBuffer::with_data(&self.ctx, data)?;
                let region = vk::BufferImageCopy::default()
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .image_extent(*extent);
                unsafe {
                    self.ctx.device.cmd_copy_buffer_to_image(
                        self.command_buffer,
                        staging.buffer,
                        *image,
                        vk::ImageLayout::GENERAL,
                        &[region],
                    );
                }
                self.retained_staging.push(staging);
            }
        }
        unsafe { memory_barrier(&self.ctx.device, self.command_buffer) };
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, vertex_offset: u32) {
        self.draw_with("draw", |device, cmd| unsafe {
            device.cmd_draw(cmd, vertex_count, 1, vertex_offset, 0);
        });
    }

    fn draw_indexed(&mut self, index_count: u32, index_offset: u32, vertex_offset: i32) {
        self.draw_with("draw_indexed", |device, cmd| unsafe {
            device.cmd_draw_indexed(cmd, index_count, 1, index_offset, vertex_offset, 0);
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
        self.draw_with("draw_instanced_indexed", |device, cmd| unsafe {
            device.cmd_draw_indexed(cmd, index_count, instance_count, index_offset, vertex_offset, instance_offset);
        });
    }

    fn draw_instanced_indirect(&mut self, arguments: &dyn NativeBuffer, offset: u32) {
        let handle = match downcast_native::<VulkanBuffer>(arguments.as_any(), "Buffer")
            .and_then(|buffer| buffer.linear().ok_or_else(|| Error::InvalidResource("Indirect arguments must be a linear buffer".to_string())))
        {
            Ok(handle) => handle,
            Err(e) => {
                rhi_error!("flint::vulkan", "draw_instanced_indirect skipped: {}", e);
                return;
            }
        };
        self.draw_with("draw_instanced_indirect", |device, cmd| unsafe {
            device.cmd_draw_indirect(cmd, handle, offset as u64, 1, 0);
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        let is_compute = self.pipeline.as_ref().map(|p| p.is_compute()).unwrap_or(false);
        if !is_compute {
            rhi_error!("flint::vulkan", "dispatch_compute skipped: no compute pipeline bound");
            return;
        }
        self.end_rendering();
        if self.compute_descriptors_dirty {
            self.descriptors.push(&self.ctx, self.command_buffer, vk::PipelineBindPoint::COMPUTE);
            self.compute_descriptors_dirty = false;
        }
        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, x, y, z);
            memory_barrier(&self.ctx.device, self.command_buffer);
        }
    }

    fn write_timestamp(&mut self, pool: &mut dyn NativeQueryPool, index: u32) {
        match downcast_native_mut::<VulkanQueryPool>(pool.as_any_mut(), "QueryPool") {
            Ok(pool) => unsafe {
                self.ctx.device.cmd_write_timestamp(
                    self.command_buffer,
                    vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                    pool.pool,
                    index,
                );
            },
            Err(e) => rhi_error!("flint::vulkan", "write_timestamp skipped: {}", e),
        }
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.wait_for_fences(&[self.fence], true, u64::MAX).ok();
            self.ctx.device.destroy_fence(self.fence, None);
            // Frees the command buffer too
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
