/// Buffer - Vulkan implementation of NativeBuffer
///
/// Linear buffers live in a `vk::Buffer`; texture-backed UAV buffers are
/// storage images kept in `GENERAL` layout.

use ash::vk;
use flint_rhi::flint::render::{BufferDesc, BufferShape, NativeBuffer};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_error, rhi_err};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{buffer_usage_to_vk, image_format_to_vk, storage_image_type, storage_image_usage};
use crate::vulkan_texture::{full_range, transition_image};

// ===== STAGING =====

/// Host-visible transfer buffer used for uploads and readbacks
pub(crate) struct StagingBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
}

impl StagingBuffer {
    fn new(ctx: &Arc<GpuContext>, size: u64, location: MemoryLocation, usage: vk::BufferUsageFlags) -> Result<Self> {
        let (buffer, allocation) = create_raw_buffer(ctx, "staging", size, usage, location)?;
        Ok(Self { ctx: ctx.clone(), buffer, allocation: Some(allocation), size })
    }

    /// Staging buffer filled with `data`
    pub(crate) fn with_data(ctx: &Arc<GpuContext>, data: &[u8]) -> Result<Self> {
        let staging = Self::new(ctx, data.len() as u64, MemoryLocation::CpuToGpu, vk::BufferUsageFlags::TRANSFER_SRC)?;
        staging.write(data)?;
        Ok(staging)
    }

    /// Staging buffer the GPU copies into
    pub(crate) fn for_readback(ctx: &Arc<GpuContext>, size: u64) -> Result<Self> {
        Self::new(ctx, size, MemoryLocation::GpuToCpu, vk::BufferUsageFlags::TRANSFER_DST)
    }

    fn mapped(&self) -> Result<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| Error::MappingFailed("Staging buffer is not host visible".to_string()))
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        let ptr = self.mapped()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len().min(self.size as usize));
        }
        Ok(())
    }

    /// Copy the staging contents out (after the GPU copy completed)
    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        let ptr = self.mapped()?;
        let mut bytes = vec![0u8; self.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, bytes.as_mut_ptr(), bytes.len());
        }
        Ok(bytes)
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

fn create_raw_buffer(
    ctx: &GpuContext,
    name: &str,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
) -> Result<(vk::Buffer, Allocation)> {
    let buffer_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe { ctx.device.create_buffer(&buffer_info, None) }
        .map_err(|e| rhi_err!("flint::vulkan", "Failed to create buffer: {:?}", e))?;

    let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
    let allocation = match ctx.allocate(name, requirements, location, true) {
        Ok(allocation) => allocation,
        Err(e) => {
            unsafe { ctx.device.destroy_buffer(buffer, None) };
            return Err(e);
        }
    };

    if let Err(e) = unsafe { ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
        ctx.free(allocation);
        unsafe { ctx.device.destroy_buffer(buffer, None) };
        return Err(rhi_err!("flint::vulkan", "Failed to bind buffer memory: {:?}", e));
    }

    Ok((buffer, allocation))
}

// ===== BUFFER =====

/// Native storage of a buffer
pub(crate) enum BufferStorage {
    Linear {
        buffer: vk::Buffer,
    },
    Image {
        image: vk::Image,
        view: vk::ImageView,
        extent: vk::Extent3D,
    },
}

/// Vulkan buffer implementation
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    pub(crate) storage: BufferStorage,
    allocation: Option<Allocation>,
    pub(crate) size: u64,
    /// Host-mapped (dynamic) buffer
    pub(crate) host_visible: bool,
}

impl NativeBuffer for VulkanBuffer {}

impl VulkanBuffer {
    /// Create a buffer for `desc`, uploading `initial_data` if present
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        match desc.shape {
            BufferShape::Linear { .. } => Self::create_linear(ctx, desc, initial_data),
            BufferShape::Image { width, height, depth, mip_count } => {
                Self::create_image(ctx, desc, (width, height, depth.max(1), mip_count.max(1)), initial_data)
            }
        }
    }

    fn create_linear(ctx: &Arc<GpuContext>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        let native = buffer_usage_to_vk(desc.buffer_type);
        let size = desc.byte_width();
        let name = format!("{:?}", desc.buffer_type);
        let (buffer, allocation) = create_raw_buffer(ctx, &name, size, native.usage, native.location)?;

        let host_visible = allocation.mapped_ptr().is_some();
        let result = Self {
            ctx: ctx.clone(),
            storage: BufferStorage::Linear { buffer },
            allocation: Some(allocation),
            size,
            host_visible,
        };

        if let Some(data) = initial_data {
            if result.host_visible {
                result.write_mapped(data)?;
            } else {
                let staging = StagingBuffer::with_data(ctx, data)?;
                ctx.one_shot(|device, cmd| unsafe {
                    let region = vk::BufferCopy::default().size(data.len() as u64);
                    device.cmd_copy_buffer(cmd, staging.buffer, buffer, &[region]);
                })?;
            }
        }

        Ok(result)
    }

    fn create_image(
        ctx: &Arc<GpuContext>,
        desc: &BufferDesc,
        (width, height, depth, mip_count): (u32, u32, u32, u32),
        initial_data: Option<&[u8]>,
    ) -> Result<Self> {
        let Some((image_type, view_type)) = storage_image_type(desc) else {
            return Err(Error::InvalidResource(format!("{:?} is not a texture buffer", desc.buffer_type)));
        };
        let format = image_format_to_vk(desc.view_format);
        let extent = vk::Extent3D { width, height, depth };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(mip_count)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(storage_image_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create storage image: {:?}", e))?;

        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
        let allocation = match ctx.allocate("storage image", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on Drop releases everything
        let mut result = Self {
            ctx: ctx.clone(),
            storage: BufferStorage::Image { image, view: vk::ImageView::null(), extent },
            allocation: None,
            size: desc.byte_width(),
            host_visible: false,
        };

        let bound = unsafe { ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
        result.allocation = Some(allocation);
        bound.map_err(|e| rhi_err!("flint::vulkan", "Failed to bind storage image memory: {:?}", e))?;

        let range = full_range(vk::ImageAspectFlags::COLOR, mip_count, 1);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(range);
        let created_view = unsafe { ctx.device.create_image_view(&view_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create storage image view: {:?}", e))?;
        if let BufferStorage::Image { view, .. } = &mut result.storage {
            *view = created_view;
        }

        let staging = initial_data.map(|data| StagingBuffer::with_data(ctx, data)).transpose()?;
        ctx.one_shot(|device, cmd| unsafe {
            match &staging {
                Some(staging) => {
                    transition_image(device, cmd, image, range, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
                    let region = vk::BufferImageCopy::default()
                        .image_subresource(vk::ImageSubresourceLayers {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            mip_level: 0,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                        .image_extent(extent);
                    device.cmd_copy_buffer_to_image(cmd, staging.buffer, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
                    transition_image(device, cmd, image, range, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::GENERAL);
                }
                None => {
                    transition_image(device, cmd, image, range, vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL);
                }
            }
        })?;

        Ok(result)
    }

    /// Copy `data` into a host-mapped buffer
    fn write_mapped(&self, data: &[u8]) -> Result<()> {
        let ptr = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| {
                rhi_error!("flint::vulkan", "Failed to map buffer!");
                Error::MappingFailed("Buffer is not host visible".to_string())
            })?;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr() as *mut u8, data.len().min(self.size as usize));
        }
        Ok(())
    }

    /// Immediate update; only host-visible (dynamic) buffers can be mapped
    pub(crate) fn update(&self, data: &[u8]) -> Result<()> {
        if !self.host_visible {
            rhi_error!("flint::vulkan", "Failed to map buffer!");
            return Err(Error::MappingFailed("Buffer was created without CPU write access".to_string()));
        }
        self.write_mapped(data)
    }

    /// Linear buffer handle, `None` for texture-backed buffers
    pub(crate) fn linear(&self) -> Option<vk::Buffer> {
        match self.storage {
            BufferStorage::Linear { buffer } => Some(buffer),
            BufferStorage::Image { .. } => None,
        }
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            match self.storage {
                BufferStorage::Linear { buffer } => self.ctx.device.destroy_buffer(buffer, None),
                BufferStorage::Image { image, view, .. } => {
                    if view != vk::ImageView::null() {
                        self.ctx.device.destroy_image_view(view, None);
                    }
                    self.ctx.device.destroy_image(image, None);
                }
            }
        }
        if let Some(allocation) = self.allocation.take() {
            self.ctx.free(allocation);
        }
    }
}
