/// GpuContext - device-level state shared by every Vulkan object
///
/// Native buffers, textures, shaders and pipelines hold an `Arc<GpuContext>`
/// and destroy their handles in `Drop`. The device and instance themselves
/// are destroyed by `VulkanBackend::drop()` after a final idle wait.

use ash::vk;
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_error;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

/// Resource slots of the shared descriptor set layout
///
/// flint binds resources by register index, the way D3D11 does. Each class of
/// resource gets a fixed window of bindings in set 0, and shaders must be
/// compiled with matching binding shifts.
pub mod binding_slots {
    pub const CONSTANT_BASE: u32 = 0;
    pub const CONSTANT_COUNT: u32 = 8;
    pub const TEXTURE_BASE: u32 = 8;
    pub const TEXTURE_COUNT: u32 = 8;
    pub const SAMPLER_BASE: u32 = 16;
    pub const SAMPLER_COUNT: u32 = 6;
    pub const STORAGE_BUFFER_BASE: u32 = 22;
    pub const STORAGE_BUFFER_COUNT: u32 = 6;
    pub const STORAGE_IMAGE_BASE: u32 = 28;
    pub const STORAGE_IMAGE_COUNT: u32 = 4;

    /// Total bindings, within the guaranteed `maxPushDescriptors` of 32
    pub const TOTAL: u32 = STORAGE_IMAGE_BASE + STORAGE_IMAGE_COUNT;
}

/// Device limits and optional features read once at device creation
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Nanoseconds per timestamp tick
    pub timestamp_period: f32,
    /// Valid bits of a graphics-queue timestamp (0: no timestamps)
    pub timestamp_valid_bits: u32,
    pub max_sampler_anisotropy: f32,
    pub depth_bounds: bool,
    pub sampler_anisotropy: bool,
    pub fill_mode_non_solid: bool,
    pub tessellation: bool,
}

/// Shared GPU context for all Vulkan resources
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Graphics (and present) queue
    graphics_queue: Mutex<vk::Queue>,

    pub graphics_queue_family: u32,

    /// Command pool for one-shot uploads, readbacks and layout transitions
    upload_command_pool: Mutex<vk::CommandPool>,

    pub limits: DeviceLimits,

    /// VK_KHR_push_descriptor entry points
    pub push_descriptor: ash::khr::push_descriptor::Device,

    /// Set 0 layout (push descriptors, see [`binding_slots`])
    pub descriptor_set_layout: vk::DescriptorSetLayout,

    /// Pipeline layout shared by every graphics and compute pipeline
    pub pipeline_layout: vk::PipelineLayout,

    /// Object naming, present when validation is on
    debug_utils: Option<ash::ext::debug_utils::Device>,

    /// Instance (kept for format queries, destroyed by VulkanBackend)
    instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        upload_command_pool: vk::CommandPool,
        limits: DeviceLimits,
        validation: bool,
    ) -> Result<Self> {
        let push_descriptor = ash::khr::push_descriptor::Device::new(instance, &device);
        let debug_utils = validation.then(|| ash::ext::debug_utils::Device::new(instance, &device));

        let descriptor_set_layout = create_descriptor_set_layout(&device)?;
        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(|e| {
            rhi_error!("flint::vulkan", "Failed to create pipeline layout: {:?}", e);
            Error::InitializationFailed(format!("vkCreatePipelineLayout failed: {:?}", e))
        })?;

        Ok(Self {
            device,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
            graphics_queue: Mutex::new(graphics_queue),
            graphics_queue_family,
            upload_command_pool: Mutex::new(upload_command_pool),
            limits,
            push_descriptor,
            descriptor_set_layout,
            pipeline_layout,
            debug_utils,
            instance: instance.clone(),
            physical_device,
        })
    }

    /// Optimal-tiling features of `format` contain `features`
    pub fn format_supports(&self, format: vk::Format, features: vk::FormatFeatureFlags) -> bool {
        let properties = unsafe {
            self.instance.get_physical_device_format_properties(self.physical_device, format)
        };
        properties.optimal_tiling_features.contains(features)
    }

    /// Exclusive access to the graphics queue (submission needs external sync)
    pub fn queue(&self) -> MutexGuard<'_, vk::Queue> {
        self.graphics_queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocate device memory through gpu-allocator
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self.allocator.lock().map_err(|_| {
            Error::BackendError("Vulkan allocator mutex poisoned".to_string())
        })?;
        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                rhi_error!("flint::vulkan", "Failed to allocate {} bytes for '{}': {:?}", requirements.size, name, e);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator
    pub fn free(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            if let Err(e) = allocator.free(allocation) {
                rhi_error!("flint::vulkan", "Failed to free allocation: {:?}", e);
            }
        }
    }

    /// Attach a debug name to a handle (no-op without validation)
    pub fn set_object_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        unsafe {
            let _ = debug_utils.set_debug_utils_object_name(&info);
        }
    }

    /// Record commands into a transient command buffer, submit and wait
    ///
    /// Used for uploads, readbacks and swapchain layout transitions.
    pub fn one_shot(&self, record: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> Result<()> {
        let pool = self.upload_command_pool.lock().map_err(|_| {
            Error::BackendError("Upload command pool mutex poisoned".to_string())
        })?;

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self.device.allocate_command_buffers(&alloc_info).map_err(|e| {
                rhi_error!("flint::vulkan", "Failed to allocate upload command buffer: {:?}", e);
                Error::BackendError(format!("vkAllocateCommandBuffers failed: {:?}", e))
            })?[0];

            let result = self.record_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait(
        &self,
        command_buffer: vk::CommandBuffer,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(command_buffer, &begin_info).map_err(|e| {
            Error::BackendError(format!("vkBeginCommandBuffer failed: {:?}", e))
        })?;

        record(&self.device, command_buffer);

        self.device.end_command_buffer(command_buffer).map_err(|e| {
            Error::BackendError(format!("vkEndCommandBuffer failed: {:?}", e))
        })?;

        let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None).map_err(|e| {
            Error::BackendError(format!("vkCreateFence failed: {:?}", e))
        })?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let submitted = {
            let queue = self.queue();
            self.device.queue_submit(*queue, &[submit_info], fence)
        };
        let result = submitted
            .and_then(|_| self.device.wait_for_fences(&[fence], true, u64::MAX))
            .map_err(|e| {
                rhi_error!("flint::vulkan", "One-shot submission failed: {:?}", e);
                Error::BackendError(format!("One-shot submission failed: {:?}", e))
            });

        self.device.destroy_fence(fence, None);
        result
    }

    /// Destroy the device-level objects owned by the context
    ///
    /// # Safety
    ///
    /// The device must be idle and no native object may be used afterwards.
    pub(crate) unsafe fn destroy(&mut self) {
        if let Ok(pool) = self.upload_command_pool.lock() {
            self.device.destroy_command_pool(*pool, None);
        }
        self.device.destroy_pipeline_layout(self.pipeline_layout, None);
        self.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        ManuallyDrop::drop(&mut self.allocator);
    }
}

fn create_descriptor_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
    use binding_slots::*;

    let windows = [
        (CONSTANT_BASE, CONSTANT_COUNT, vk::DescriptorType::UNIFORM_BUFFER),
        (TEXTURE_BASE, TEXTURE_COUNT, vk::DescriptorType::SAMPLED_IMAGE),
        (SAMPLER_BASE, SAMPLER_COUNT, vk::DescriptorType::SAMPLER),
        (STORAGE_BUFFER_BASE, STORAGE_BUFFER_COUNT, vk::DescriptorType::STORAGE_BUFFER),
        (STORAGE_IMAGE_BASE, STORAGE_IMAGE_COUNT, vk::DescriptorType::STORAGE_IMAGE),
    ];

    let bindings: Vec<vk::DescriptorSetLayoutBinding> = windows
        .iter()
        .flat_map(|&(base, count, descriptor_type)| {
            (base..base + count).map(move |binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::ALL)
            })
        })
        .collect();

    let create_info = vk::DescriptorSetLayoutCreateInfo::default()
        .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
        .bindings(&bindings);

    unsafe { device.create_descriptor_set_layout(&create_info, None) }.map_err(|e| {
        rhi_error!("flint::vulkan", "Failed to create descriptor set layout: {:?}", e);
        Error::InitializationFailed(format!("vkCreateDescriptorSetLayout failed: {:?}", e))
    })
}
