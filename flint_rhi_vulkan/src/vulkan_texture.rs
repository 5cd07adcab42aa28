/// Texture - Vulkan implementation of NativeTexture
///
/// Every image lives in `GENERAL` layout once created, so sampling, storage,
/// attachment use and transfers never need per-use layout tracking. Command
/// lists separate hazards with memory barriers instead.

use ash::vk;
use flint_rhi::flint::render::{
    subresource_layouts, ImageFormat, NativeTexture, SubresourceLayout, SubresourceViewTable,
    TextureDescription, TextureDimension, TextureFlags,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_err, rhi_warn};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::StagingBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    aspect_mask, attachment_view_type, image_format_to_vk, image_type_to_vk, layered_view_type,
    sample_count_to_vk, view_aspect_mask, view_kind_to_vk,
};

// ===== BARRIER HELPERS =====

/// Range over `mip_count` mips and `layer_count` layers from (0, 0)
pub(crate) fn full_range(aspect: vk::ImageAspectFlags, mip_count: u32, layer_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: mip_count,
        base_array_layer: 0,
        layer_count,
    }
}

/// Layout transition (or plain memory barrier when `old == new`)
pub(crate) unsafe fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);

    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );
}

/// Global write-to-anything barrier between dependent commands
pub(crate) unsafe fn memory_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE);
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::PipelineStageFlags::ALL_COMMANDS,
        vk::DependencyFlags::empty(),
        &[barrier],
        &[],
        &[],
    );
}

fn copy_region(layout: &SubresourceLayout, aspect: vk::ImageAspectFlags, buffer_offset: u64) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(buffer_offset)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: aspect,
            mip_level: layout.mip,
            base_array_layer: layout.layer,
            layer_count: 1,
        })
        .image_extent(vk::Extent3D { width: layout.width, height: layout.height, depth: layout.depth })
}

// ===== TEXTURE =====

/// Vulkan texture / render target
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    allocation: Option<Allocation>,
    pub(crate) desc: TextureDescription,
    pub(crate) format: vk::Format,
    /// Shader resource view over every layer and mip
    pub(crate) sampled_view: vk::ImageView,
    /// One single-layer view per (layer, mip), render targets only
    pub(crate) attachment_views: Option<SubresourceViewTable<vk::ImageView>>,
    /// One all-layers view per mip, render targets only
    pub(crate) layered_views: Vec<vk::ImageView>,
    debug_name: Mutex<String>,
}

impl NativeTexture for VulkanTexture {}

impl VulkanTexture {
    /// Create a sampled texture, or a render target when `render_target` is set
    pub(crate) fn create(
        ctx: &Arc<GpuContext>,
        desc: &TextureDescription,
        initial_data: Option<&[u8]>,
        render_target: bool,
    ) -> Result<Self> {
        let image_type = image_type_to_vk(desc.dimension).ok_or_else(|| {
            Error::InvalidResource(format!("{:?} textures are not images", desc.dimension))
        })?;
        if render_target && desc.dimension == TextureDimension::Texture3D {
            return Err(Error::InvalidResource("3D render targets are not supported by the Vulkan backend".to_string()));
        }

        let format = image_format_to_vk(desc.format);
        let mut features = vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::TRANSFER_DST;
        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        if render_target {
            if desc.format.is_depth() {
                features |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
                usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
            } else {
                features |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
                usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
            }
        }
        if !ctx.format_supports(format, features) {
            return Err(rhi_err!("flint::vulkan", "Format {:?} does not support {:?}", desc.format, features));
        }

        let layers = if desc.dimension == TextureDimension::Texture3D { 1 } else { desc.array_size };
        let create_flags = if desc.flags.contains(TextureFlags::CUBE_MAP) {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let image_info = vk::ImageCreateInfo::default()
            .flags(create_flags)
            .image_type(image_type)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: desc.depth.max(1) })
            .mip_levels(desc.mip_count)
            .array_layers(layers)
            .samples(sample_count_to_vk(desc.sampler_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create image: {:?}", e))?;

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = match ctx.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bound = unsafe { ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) };

        // From here on Drop releases everything created so far
        let mut texture = Self {
            ctx: ctx.clone(),
            image,
            allocation: Some(allocation),
            desc: *desc,
            format,
            sampled_view: vk::ImageView::null(),
            attachment_views: None,
            layered_views: Vec::new(),
            debug_name: Mutex::new(String::new()),
        };
        bound.map_err(|e| rhi_err!("flint::vulkan", "Failed to bind image memory: {:?}", e))?;

        texture.sampled_view = texture.create_view(
            view_kind_to_vk(desc.view_kind()),
            view_aspect_mask(desc.format),
            (0, desc.mip_count),
            (0, layers),
        )?;

        if render_target {
            let aspect = aspect_mask(desc.format);
            let single = attachment_view_type(desc.dimension);
            let table = SubresourceViewTable::build(layers, desc.mip_count, |layer, mip| {
                texture.create_view(single, aspect, (mip, 1), (layer, 1))
            })?;
            texture.attachment_views = Some(table);

            let layered = layered_view_type(desc.dimension);
            for mip in 0..desc.mip_count {
                let view = texture.create_view(layered, aspect, (mip, 1), (0, layers))?;
                texture.layered_views.push(view);
            }
        }

        texture.initialize_contents(initial_data)?;
        Ok(texture)
    }

    fn create_view(
        &self,
        view_type: vk::ImageViewType,
        aspect: vk::ImageAspectFlags,
        (base_mip, mip_count): (u32, u32),
        (base_layer, layer_count): (u32, u32),
    ) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: base_mip,
                level_count: mip_count,
                base_array_layer: base_layer,
                layer_count,
            });
        unsafe { self.ctx.device.create_image_view(&view_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create image view: {:?}", e))
    }

    pub(crate) fn layer_count(&self) -> u32 {
        if self.desc.dimension == TextureDimension::Texture3D { 1 } else { self.desc.array_size }
    }

    fn range(&self) -> vk::ImageSubresourceRange {
        full_range(aspect_mask(self.desc.format), self.desc.mip_count, self.layer_count())
    }

    /// Upload initial data (and generate mips), leaving the image in GENERAL
    fn initialize_contents(&self, initial_data: Option<&[u8]>) -> Result<()> {
        let range = self.range();
        let image = self.image;

        let Some(data) = initial_data else {
            return self.ctx.one_shot(|device, cmd| unsafe {
                transition_image(device, cmd, image, range, vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL);
            });
        };

        if self.desc.format.has_stencil() {
            return Err(Error::InvalidResource(
                "Initial data for combined depth-stencil formats is not supported".to_string(),
            ));
        }

        let layouts = subresource_layouts(&self.desc);
        let aspect = view_aspect_mask(self.desc.format);
        let regions: Vec<vk::BufferImageCopy> = layouts
            .iter()
            .map(|layout| copy_region(layout, aspect, layout.offset))
            .collect();

        let generate_mips = self.desc.flags.contains(TextureFlags::HARDWARE_MIP_GEN) && self.desc.mip_count > 1;
        let can_blit = self.ctx.format_supports(
            self.format,
            vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
        );
        if generate_mips && !can_blit {
            rhi_warn!("flint::vulkan", "Format {:?} cannot be blitted, keeping uploaded mips", self.desc.format);
        }

        let staging = StagingBuffer::with_data(&self.ctx, data)?;
        let desc = self.desc;
        let layers = self.layer_count();

        self.ctx.one_shot(|device, cmd| unsafe {
            transition_image(device, cmd, image, range, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            device.cmd_copy_buffer_to_image(cmd, staging.buffer, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &regions);
            transition_image(device, cmd, image, range, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::GENERAL);

            if generate_mips && can_blit {
                record_mip_chain(device, cmd, image, &desc, layers);
            }
        })
    }

    /// Read one subresource back into host memory, laid out like the upload walk
    pub(crate) fn read_subresource(&self, layer: u32, mip: u32) -> Result<Vec<u8>> {
        if self.desc.sampler_count > 1 {
            return Err(Error::InvalidResource("Multisampled textures cannot be read back".to_string()));
        }
        let layouts = subresource_layouts(&self.desc);
        let layout = layouts
            .iter()
            .find(|layout| layout.layer == layer && layout.mip == mip)
            .copied()
            .ok_or_else(|| {
                Error::InvalidResource(format!("Subresource (layer {}, mip {}) out of range", layer, mip))
            })?;

        let image = self.image;
        let range = self.range();

        if !self.desc.format.has_stencil() {
            let staging = StagingBuffer::for_readback(&self.ctx, layout.size)?;
            let region = copy_region(&layout, view_aspect_mask(self.desc.format), 0);
            self.ctx.one_shot(|device, cmd| unsafe {
                transition_image(device, cmd, image, range, vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL);
                device.cmd_copy_image_to_buffer(cmd, image, vk::ImageLayout::GENERAL, staging.buffer, &[region]);
            })?;
            return staging.read();
        }

        // Depth and stencil aspects are copied separately and re-interleaved
        let texels = layout.width as u64 * layout.height as u64 * layout.depth as u64;
        let depth_staging = StagingBuffer::for_readback(&self.ctx, texels * 4)?;
        let stencil_staging = StagingBuffer::for_readback(&self.ctx, texels)?;
        let depth_region = copy_region(&layout, vk::ImageAspectFlags::DEPTH, 0);
        let stencil_region = copy_region(&layout, vk::ImageAspectFlags::STENCIL, 0);
        self.ctx.one_shot(|device, cmd| unsafe {
            transition_image(device, cmd, image, range, vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL);
            device.cmd_copy_image_to_buffer(cmd, image, vk::ImageLayout::GENERAL, depth_staging.buffer, &[depth_region]);
            device.cmd_copy_image_to_buffer(cmd, image, vk::ImageLayout::GENERAL, stencil_staging.buffer, &[stencil_region]);
        })?;

        Ok(interleave_depth_stencil(self.desc.format, &depth_staging.read()?, &stencil_staging.read()?))
    }

    pub(crate) fn set_debug_name(&self, name: &str) {
        self.ctx.set_object_name(self.image, name);
        if let Ok(mut debug_name) = self.debug_name.lock() {
            *debug_name = name.to_string();
        }
    }

    pub fn debug_name(&self) -> String {
        self.debug_name.lock().map(|name| name.clone()).unwrap_or_default()
    }

    /// Attachment view for a bind: one layer, or every layer (`None`) of `mip`
    pub(crate) fn attachment_view(&self, layer: Option<u32>, mip: u32) -> Option<vk::ImageView> {
        match layer {
            Some(layer) => self.attachment_views.as_ref()?.get(layer, mip).copied(),
            None => self.layered_views.get(mip as usize).copied(),
        }
    }

    pub(crate) fn is_render_target(&self) -> bool {
        self.attachment_views.is_some()
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            let views = self
                .attachment_views
                .take()
                .map(SubresourceViewTable::into_views)
                .unwrap_or_default();
            for view in views.into_iter().chain(self.layered_views.drain(..)) {
                self.ctx.device.destroy_image_view(view, None);
            }
            if self.sampled_view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.sampled_view, None);
            }
            self.ctx.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
    }
}

/// Blit each mip from the previous one, image in GENERAL throughout
unsafe fn record_mip_chain(device: &ash::Device, cmd: vk::CommandBuffer, image: vk::Image, desc: &TextureDescription, layers: u32) {
    for mip in 1..desc.mip_count {
        let (src_w, src_h, src_d) = desc.mip_extent(mip - 1);
        let (dst_w, dst_h, dst_d) = desc.mip_extent(mip);

        let blit = vk::ImageBlit::default()
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: mip - 1,
                base_array_layer: 0,
                layer_count: layers,
            })
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: src_w as i32, y: src_h as i32, z: src_d as i32 },
            ])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: mip,
                base_array_layer: 0,
                layer_count: layers,
            })
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: dst_w as i32, y: dst_h as i32, z: dst_d as i32 },
            ]);

        device.cmd_blit_image(
            cmd,
            image,
            vk::ImageLayout::GENERAL,
            image,
            vk::ImageLayout::GENERAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        let mip_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: mip,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        };
        transition_image(device, cmd, image, mip_range, vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL);
    }
}

/// Pack separately copied depth and stencil planes the way the upload walk stores them
///
/// D24S8: 24-bit depth in the low bits, stencil in the high byte.
/// D32S8: 32-bit float depth, stencil byte, 3 padding bytes.
pub(crate) fn interleave_depth_stencil(format: ImageFormat, depth: &[u8], stencil: &[u8]) -> Vec<u8> {
    let texel_bytes = (format.bits_per_pixel() / 8) as usize;
    let mut packed = Vec::with_capacity(stencil.len() * texel_bytes);

    for (depth_texel, &stencil_value) in depth.chunks_exact(4).zip(stencil) {
        match format {
            ImageFormat::D24UnormS8Uint => {
                packed.extend_from_slice(&depth_texel[..3]);
                packed.push(stencil_value);
            }
            _ => {
                packed.extend_from_slice(depth_texel);
                packed.extend_from_slice(&[stencil_value, 0, 0, 0]);
            }
        }
    }
    packed
}

#[cfg(test)]
#[path = "vulkan_texture_tests.rs"]
mod tests;
