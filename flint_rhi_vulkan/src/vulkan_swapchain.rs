/// Swapchain - presentation for the Vulkan backend
///
/// Manages presentation to the window, separate from command recording.
/// The current image is acquired right after creation and after every
/// present, and sits in `GENERAL` layout until it is presented, so command
/// lists can render to it like any other target.

use ash::vk;
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_err, rhi_error, rhi_warn};
use std::sync::{Arc, RwLock};

use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::{full_range, transition_image};

/// The swapchain image command lists render into
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Backbuffer {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

/// Backbuffer shared between the swapchain and every command list
pub(crate) type SharedBackbuffer = Arc<RwLock<Backbuffer>>;

/// Vulkan swapchain
pub(crate) struct Swapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,

    requested_image_count: u32,
    vsync: bool,

    /// Signaled when the acquired image is ready to be written
    acquire_fence: vk::Fence,
    current_image: u32,
    backbuffer: SharedBackbuffer,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        instance: &ash::Instance,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        preferred_format: vk::Format,
        image_count: u32,
        (width, height): (u32, u32),
        vsync: bool,
    ) -> Result<Self> {
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(ctx.physical_device, ctx.graphics_queue_family, surface)
        }
        .unwrap_or(false);
        if !supported {
            rhi_error!("flint::vulkan", "The graphics queue cannot present to this surface");
            return Err(Error::InitializationFailed("Surface not supported by the graphics queue".to_string()));
        }

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface)
        }
        .map_err(|e| {
            rhi_error!("flint::vulkan", "Failed to query surface formats: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
        })?;
        let format = choose_surface_format(&formats, preferred_format).ok_or_else(|| {
            Error::InitializationFailed("Surface reports no formats".to_string())
        })?;
        if format.format != preferred_format {
            rhi_warn!("flint::vulkan", "Backbuffer format {:?} unavailable, using {:?}", preferred_format, format.format);
        }

        let acquire_fence = unsafe { ctx.device.create_fence(&vk::FenceCreateInfo::default(), None) }
            .map_err(|e| Error::InitializationFailed(format!("Failed to create acquire fence: {:?}", e)))?;

        let swapchain_loader = ash::khr::swapchain::Device::new(instance, &ctx.device);

        let mut swapchain = Self {
            ctx,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent: vk::Extent2D { width, height },
            requested_image_count: image_count,
            vsync,
            acquire_fence,
            current_image: 0,
            backbuffer: Arc::new(RwLock::new(Backbuffer::default())),
        };
        swapchain.build(width, height)?;
        swapchain.acquire()?;
        Ok(swapchain)
    }

    pub(crate) fn backbuffer(&self) -> SharedBackbuffer {
        self.backbuffer.clone()
    }

    pub(crate) fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// (Re)create the swapchain for the given size, replacing the old one
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
        }
        .map_err(|e| {
            rhi_error!("flint::vulkan", "Failed to get surface capabilities: {:?}", e);
            Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
        })?;
        let present_modes = unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(self.ctx.physical_device, self.surface)
        }
        .unwrap_or_default();

        let extent = choose_extent(&capabilities, width, height);
        let present_mode = choose_present_mode(self.vsync, &present_modes);
        let image_count = choose_image_count(&capabilities, self.requested_image_count);

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::TRANSFER_SRC,
            )
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }.map_err(|e| {
            rhi_error!("flint::vulkan", "Failed to create swapchain: {:?}", e);
            Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
        })?;

        unsafe {
            self.destroy_views();
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }
        }
        self.swapchain = swapchain;
        self.extent = extent;

        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }.map_err(|e| {
            rhi_error!("flint::vulkan", "Failed to get swapchain images: {:?}", e);
            Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
        })?;

        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .subresource_range(full_range(vk::ImageAspectFlags::COLOR, 1, 1));
            let view = unsafe { self.ctx.device.create_image_view(&create_info, None) }.map_err(|e| {
                rhi_error!("flint::vulkan", "Failed to create swapchain image view: {:?}", e);
                Error::InitializationFailed(format!("Failed to create image view: {:?}", e))
            })?;
            self.image_views.push(view);
        }

        rhi_debug!(
            "flint::vulkan",
            "Swapchain {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            self.images.len(),
            present_mode
        );
        Ok(())
    }

    /// Acquire the next image and make it renderable
    fn acquire(&mut self) -> Result<()> {
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                vk::Semaphore::null(),
                self.acquire_fence,
            )
        };
        let image_index = match acquired {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                rhi_warn!("flint::vulkan", "Swapchain out of date during acquire, rebuilding");
                self.wait_idle()?;
                self.build(self.extent.width, self.extent.height)?;
                let (index, _) = unsafe {
                    self.swapchain_loader.acquire_next_image(
                        self.swapchain,
                        u64::MAX,
                        vk::Semaphore::null(),
                        self.acquire_fence,
                    )
                }
                .map_err(|e| rhi_err!("flint::vulkan", "Failed to acquire swapchain image: {:?}", e))?;
                index
            }
            Err(e) => return Err(rhi_err!("flint::vulkan", "Failed to acquire swapchain image: {:?}", e)),
        };

        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.acquire_fence], true, u64::MAX)
                .and_then(|_| self.ctx.device.reset_fences(&[self.acquire_fence]))
                .map_err(|e| rhi_err!("flint::vulkan", "Failed to wait for swapchain image: {:?}", e))?;
        }

        self.current_image = image_index;
        let image = self.images[image_index as usize];
        self.ctx.one_shot(|device, cmd| unsafe {
            transition_image(
                device,
                cmd,
                image,
                full_range(vk::ImageAspectFlags::COLOR, 1, 1),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::GENERAL,
            );
        })?;

        if let Ok(mut backbuffer) = self.backbuffer.write() {
            *backbuffer = Backbuffer {
                image,
                view: self.image_views[image_index as usize],
                format: self.format.format,
                extent: self.extent,
            };
        }
        Ok(())
    }

    /// Present the current image and acquire the next one
    pub(crate) fn present(&mut self) -> Result<()> {
        let image = self.images[self.current_image as usize];
        // The one-shot waits for everything queued before it
        self.ctx.one_shot(|device, cmd| unsafe {
            transition_image(
                device,
                cmd,
                image,
                full_range(vk::ImageAspectFlags::COLOR, 1, 1),
                vk::ImageLayout::GENERAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );
        })?;

        let swapchains = [self.swapchain];
        let image_indices = [self.current_image];
        let present_info = vk::PresentInfoKHR::default()
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = {
            let queue = self.ctx.queue();
            unsafe { self.swapchain_loader.queue_present(*queue, &present_info) }
        };
        match presented {
            Ok(_) | Err(vk::Result::SUBOPTIMAL_KHR) => {}
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                rhi_warn!("flint::vulkan", "Swapchain out of date during present, rebuilding");
                self.wait_idle()?;
                self.build(self.extent.width, self.extent.height)?;
            }
            Err(e) => return Err(rhi_err!("flint::vulkan", "Failed to present swapchain image: {:?}", e)),
        }

        self.acquire()
    }

    /// Rebuild for a new client size
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("Cannot resize backbuffer to {}x{}", width, height)));
        }
        self.wait_idle()?;
        self.build(width, height)?;
        self.acquire()
    }

    /// Switch present mode, rebuilding the swapchain when it changes
    pub(crate) fn set_vsync(&mut self, enabled: bool) -> Result<()> {
        if self.vsync == enabled {
            return Ok(());
        }
        self.vsync = enabled;
        self.resize(self.extent.width, self.extent.height)
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to wait idle before swapchain rebuild: {:?}", e))
    }

    unsafe fn destroy_views(&mut self) {
        for view in self.image_views.drain(..) {
            self.ctx.device.destroy_image_view(view, None);
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.destroy_views();
            self.ctx.device.destroy_fence(self.acquire_fence, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

// ===== SELECTION =====

/// Exact format match if available, else the first reported format
pub(crate) fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == preferred)
        .or_else(|| formats.first())
        .copied()
}

/// FIFO with vsync; otherwise the lowest-latency mode available
pub(crate) fn choose_present_mode(vsync: bool, available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
