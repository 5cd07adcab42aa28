/// VulkanBackend - Vulkan implementation of RenderBackend
///
/// Owns the instance, the logical device and the swapchain. Every native
/// object shares the device through an `Arc<GpuContext>`; the device is only
/// destroyed once the backend holds the last reference.

use ash::vk;
use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BackendCapabilities, BackendKind, BlendStateDesc,
    BufferDesc, DepthStencilStateDesc, DisplaySurface, NativeBlendState, NativeBuffer,
    NativeCommandList, NativeDepthStencilState, NativePipelineState, NativeQueryPool,
    NativeRasterizerState, NativeSampler, NativeShader, NativeTexture, PipelineStateDesc,
    QueryType, RasterizerStateDesc, RenderBackend, RenderBackendFactory, RenderDeviceConfig,
    SamplerDesc, ShaderStage, TextureDescription,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_error, rhi_info, rhi_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

use crate::debug::{messenger_create_info, reset_validation_tracking};
use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{DeviceLimits, GpuContext};
use crate::vulkan_format::image_format_to_vk;
use crate::vulkan_pipeline::VulkanPipelineState;
use crate::vulkan_query_pool::VulkanQueryPool;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_shader::VulkanShader;
use crate::vulkan_state::{VulkanBlendState, VulkanDepthStencilState, VulkanRasterizerState};
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::VulkanTexture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    rhi_error!("flint::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Vulkan render backend
pub struct VulkanBackend {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ctx: Arc<GpuContext>,
    /// Dropped before the device (owns the surface)
    swapchain: Option<Swapchain>,
    device_name: String,
}

// ===== DEVICE SELECTION =====

/// Preference of a device type (higher is better)
pub(crate) fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

/// Device extensions required on top of the core API
pub(crate) fn required_device_extensions() -> [&'static CStr; 2] {
    [ash::khr::swapchain::NAME, ash::khr::push_descriptor::NAME]
}

/// Candidate device: queue family able to draw and present, and capability score
struct Candidate {
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
    score: u32,
    name: String,
}

unsafe fn evaluate_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Option<Candidate> {
    let properties = instance.get_physical_device_properties(physical_device);
    let name = properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown device".to_string());

    if properties.api_version < vk::API_VERSION_1_3 {
        rhi_debug!("flint::vulkan", "Skipping '{}': Vulkan 1.3 not supported", name);
        return None;
    }

    let extensions = instance.enumerate_device_extension_properties(physical_device).ok()?;
    for required in required_device_extensions() {
        let found = extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str().map(|n| n == required).unwrap_or(false));
        if !found {
            rhi_debug!("flint::vulkan", "Skipping '{}': {:?} missing", name, required);
            return None;
        }
    }

    let queue_family = instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .enumerate()
        .position(|(index, family)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
                && surface_loader
                    .get_physical_device_surface_support(physical_device, index as u32, surface)
                    .unwrap_or(false)
        })? as u32;

    Some(Candidate {
        physical_device,
        queue_family,
        score: device_type_score(properties.device_type),
        name,
    })
}

impl VulkanBackend {
    /// Create the instance, device and swapchain for `surface`
    pub fn new(surface: &dyn DisplaySurface, config: &RenderDeviceConfig) -> Result<Self> {
        let validation = config.enable_validation || cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("Failed to load the Vulkan library", e))?;

            // ===== INSTANCE =====

            let app_name = CString::new(config.app_name.clone()).unwrap_or_else(|_| c"flint".to_owned());
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"flint")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = surface
                .display_handle()
                .map_err(|e| init_error("Failed to get display handle", e))?;
            let window_handle = surface
                .window_handle()
                .map_err(|e| init_error("Failed to get window handle", e))?;

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("Failed to get required instance extensions", e))?
                .to_vec();
            let layer_names = if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                Vec::new()
            };

            let mut debug_info = messenger_create_info();
            let mut instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            if validation {
                // Also reports instance creation and destruction
                instance_info = instance_info.push_next(&mut debug_info);
            }

            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| init_error("Failed to create Vulkan instance", e))?;

            let debug_messenger = if validation {
                reset_validation_tracking();
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                match debug_utils.create_debug_utils_messenger(&messenger_create_info(), None) {
                    Ok(messenger) => Some((debug_utils, messenger)),
                    Err(e) => {
                        rhi_warn!("flint::vulkan", "Debug messenger unavailable: {:?}", e);
                        None
                    }
                }
            } else {
                None
            };

            let destroy_instance = |messenger: &Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>| {
                if let Some((debug_utils, messenger)) = messenger {
                    debug_utils.destroy_debug_utils_messenger(*messenger, None);
                }
                instance.destroy_instance(None);
            };

            // ===== SURFACE & PHYSICAL DEVICE =====

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let vk_surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(vk_surface) => vk_surface,
                Err(e) => {
                    destroy_instance(&debug_messenger);
                    return Err(init_error("Failed to create surface", e));
                }
            };

            let candidate = instance
                .enumerate_physical_devices()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|pd| evaluate_device(&instance, &surface_loader, vk_surface, pd))
                .max_by_key(|candidate| candidate.score);
            let Some(candidate) = candidate else {
                surface_loader.destroy_surface(vk_surface, None);
                destroy_instance(&debug_messenger);
                rhi_error!("flint::vulkan", "No Vulkan 1.3 device with push descriptors can present to this surface");
                return Err(Error::InitializationFailed("No suitable Vulkan device".to_string()));
            };
            rhi_info!("flint::vulkan", "Using '{}'", candidate.name);

            // ===== LOGICAL DEVICE =====

            let physical_device = candidate.physical_device;
            let supported = instance.get_physical_device_features(physical_device);
            let properties = instance.get_physical_device_properties(physical_device);
            let family_properties = instance.get_physical_device_queue_family_properties(physical_device);

            let limits = DeviceLimits {
                timestamp_period: properties.limits.timestamp_period,
                timestamp_valid_bits: family_properties
                    .get(candidate.queue_family as usize)
                    .map(|family| family.timestamp_valid_bits)
                    .unwrap_or(0),
                max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
                depth_bounds: supported.depth_bounds == vk::TRUE,
                sampler_anisotropy: supported.sampler_anisotropy == vk::TRUE,
                fill_mode_non_solid: supported.fill_mode_non_solid == vk::TRUE,
                tessellation: supported.tessellation_shader == vk::TRUE,
            };

            let features = vk::PhysicalDeviceFeatures::default()
                .depth_bounds(limits.depth_bounds)
                .sampler_anisotropy(limits.sampler_anisotropy)
                .fill_mode_non_solid(limits.fill_mode_non_solid)
                .tessellation_shader(limits.tessellation);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default().host_query_reset(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .dynamic_rendering(true)
                .synchronization2(true);

            let priorities = [1.0];
            let queue_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(candidate.queue_family)
                .queue_priorities(&priorities)];
            let device_extensions = required_device_extensions().map(CStr::as_ptr);
            let device_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&device_extensions)
                .enabled_features(&features)
                .push_next(&mut features12)
                .push_next(&mut features13);

            let device = match instance.create_device(physical_device, &device_info, None) {
                Ok(device) => device,
                Err(e) => {
                    surface_loader.destroy_surface(vk_surface, None);
                    destroy_instance(&debug_messenger);
                    return Err(init_error("Failed to create logical device", e));
                }
            };
            let graphics_queue = device.get_device_queue(candidate.queue_family, 0);

            let fail = |device: &ash::Device, error: Error| {
                device.destroy_device(None);
                surface_loader.destroy_surface(vk_surface, None);
                destroy_instance(&debug_messenger);
                error
            };

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => return Err(fail(&device, init_error("Failed to create GPU allocator", e))),
            };

            let upload_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(candidate.queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = match device.create_command_pool(&upload_pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    drop(allocator);
                    return Err(fail(&device, init_error("Failed to create upload command pool", e)));
                }
            };

            let ctx = GpuContext::new(
                &instance,
                physical_device,
                device.clone(),
                allocator,
                graphics_queue,
                candidate.queue_family,
                upload_command_pool,
                limits,
                validation,
            );
            let ctx = match ctx {
                Ok(ctx) => Arc::new(ctx),
                Err(e) => {
                    device.destroy_command_pool(upload_command_pool, None);
                    return Err(fail(&device, e));
                }
            };

            // ===== SWAPCHAIN =====

            // From here the swapchain owns the surface and Drop cleans up
            let mut backend = Self {
                _entry: entry,
                instance: instance.clone(),
                debug_messenger,
                ctx: ctx.clone(),
                swapchain: None,
                device_name: candidate.name,
            };

            let swapchain = Swapchain::new(
                ctx,
                &instance,
                vk_surface,
                surface_loader,
                image_format_to_vk(config.backbuffer_format),
                config.backbuffer_count,
                surface.client_size(),
                config.vsync,
            )?;
            backend.swapchain = Some(swapchain);

            rhi_info!(
                "flint::vulkan",
                "Vulkan device ready (validation: {}, timestamps: {} bits)",
                validation,
                limits.timestamp_valid_bits
            );
            Ok(backend)
        }
    }

    /// Name of the selected physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn swapchain_mut(&mut self) -> Result<&mut Swapchain> {
        self.swapchain
            .as_mut()
            .ok_or_else(|| Error::InvalidState("Swapchain not created".to_string()))
    }
}

impl RenderBackendFactory for VulkanBackend {
    fn create_backend(
        surface: &dyn DisplaySurface,
        config: &RenderDeviceConfig,
    ) -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(VulkanBackend::new(surface, config)?))
    }
}

impl RenderBackend for VulkanBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vulkan
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            deferred_recording: true,
            multithreaded_recording: true,
            host_readback: true,
            timestamp_queries: self.ctx.limits.timestamp_valid_bits > 0,
        }
    }

    // ===== BUFFERS =====

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeBuffer>> {
        Ok(Box::new(VulkanBuffer::create(&self.ctx, desc, initial_data)?))
    }

    fn destroy_buffer(&self, buffer: Box<dyn NativeBuffer>) {
        drop(buffer);
    }

    fn update_buffer(&self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        downcast_native::<VulkanBuffer>(buffer.as_any(), "Buffer")?.update(data)
    }

    // ===== TEXTURES =====

    fn create_texture(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(VulkanTexture::create(&self.ctx, desc, initial_data, false)?))
    }

    fn create_render_target(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(VulkanTexture::create(&self.ctx, desc, initial_data, true)?))
    }

    fn destroy_texture(&self, texture: Box<dyn NativeTexture>) {
        drop(texture);
    }

    fn set_debug_name(&self, texture: &dyn NativeTexture, name: &str) {
        if let Ok(texture) = downcast_native::<VulkanTexture>(texture.as_any(), "Texture") {
            texture.set_debug_name(name);
        }
    }

    fn read_subresource(&self, texture: &dyn NativeTexture, layer: u32, mip: u32) -> Result<Vec<u8>> {
        downcast_native::<VulkanTexture>(texture.as_any(), "Texture")?.read_subresource(layer, mip)
    }

    // ===== SAMPLERS / SHADERS =====

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn NativeSampler>> {
        Ok(Box::new(VulkanSampler::create(&self.ctx, desc)?))
    }

    fn destroy_sampler(&self, sampler: Box<dyn NativeSampler>) {
        drop(sampler);
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> Result<Box<dyn NativeShader>> {
        Ok(Box::new(VulkanShader::create(&self.ctx, stage, bytecode)?))
    }

    fn destroy_shader(&self, shader: Box<dyn NativeShader>) {
        drop(shader);
    }

    // ===== FIXED-FUNCTION STATE =====

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<Box<dyn NativeBlendState>> {
        Ok(Box::new(VulkanBlendState::new(desc)))
    }

    fn destroy_blend_state(&self, state: Box<dyn NativeBlendState>) {
        drop(state);
    }

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Result<Box<dyn NativeDepthStencilState>> {
        if desc.enable_depth_bounds_test && !self.ctx.limits.depth_bounds {
            rhi_warn!("flint::vulkan", "Depth bounds test not supported by this device, ignored");
        }
        Ok(Box::new(VulkanDepthStencilState::new(desc)))
    }

    fn destroy_depth_stencil_state(&self, state: Box<dyn NativeDepthStencilState>) {
        drop(state);
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Result<Box<dyn NativeRasterizerState>> {
        Ok(Box::new(VulkanRasterizerState::new(desc)))
    }

    fn destroy_rasterizer_state(&self, state: Box<dyn NativeRasterizerState>) {
        drop(state);
    }

    // ===== PIPELINES =====

    fn create_pipeline_state(&self, desc: &PipelineStateDesc<'_>) -> Result<Box<dyn NativePipelineState>> {
        Ok(Box::new(VulkanPipelineState::create(&self.ctx, desc)?))
    }

    fn destroy_pipeline_state(&self, pipeline: Box<dyn NativePipelineState>) {
        // Variants stay alive in command lists still referencing them
        drop(pipeline);
    }

    // ===== COMMAND LISTS =====

    fn create_command_list(&self) -> Result<Box<dyn NativeCommandList>> {
        let swapchain = self
            .swapchain
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Swapchain not created".to_string()))?;
        Ok(Box::new(VulkanCommandList::new(&self.ctx, swapchain.backbuffer())?))
    }

    fn destroy_command_list(&self, command_list: Box<dyn NativeCommandList>) {
        drop(command_list);
    }

    fn submit_command_list(&self, command_list: &mut dyn NativeCommandList) -> Result<()> {
        downcast_native_mut::<VulkanCommandList>(command_list.as_any_mut(), "CommandList")?.submit()
    }

    // ===== QUERIES =====

    fn create_query_pool(&self, query_type: QueryType, capacity: u32) -> Result<Box<dyn NativeQueryPool>> {
        Ok(Box::new(VulkanQueryPool::create(&self.ctx, query_type, capacity)?))
    }

    fn destroy_query_pool(&self, pool: Box<dyn NativeQueryPool>) {
        drop(pool);
    }

    fn query_result(&self, pool: &mut dyn NativeQueryPool, index: u32) -> Option<u64> {
        downcast_native::<VulkanQueryPool>((*pool).as_any(), "QueryPool").ok()?.poll(index)
    }

    fn timestamp_to_milliseconds(&self, pool: &dyn NativeQueryPool, ticks: u64) -> f64 {
        match downcast_native::<VulkanQueryPool>(pool.as_any(), "QueryPool") {
            Ok(pool) => pool.ticks_to_milliseconds(ticks),
            Err(_) => 0.0,
        }
    }

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()> {
        self.swapchain_mut()?.present()
    }

    fn set_vsync_state(&mut self, enabled: bool) {
        let result = self.swapchain_mut().and_then(|swapchain| swapchain.set_vsync(enabled));
        if let Err(e) = result {
            rhi_error!("flint::vulkan", "Failed to change vsync state: {}", e);
        }
    }

    fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()> {
        self.swapchain_mut()?.resize(width, height)
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        self.swapchain
            .as_ref()
            .map(|swapchain| {
                let extent = swapchain.extent();
                (extent.width, extent.height)
            })
            .unwrap_or((0, 0))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| Error::BackendError(format!("vkDeviceWaitIdle failed: {:?}", e)))
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Swapchain (views, surface) while the device is alive
            self.swapchain = None;

            // 2. Device-level objects, only if no native object outlived the backend
            match Arc::get_mut(&mut self.ctx) {
                Some(ctx) => {
                    ctx.destroy();
                    ctx.device.destroy_device(None);
                }
                None => {
                    rhi_error!(
                        "flint::vulkan",
                        "{} native object(s) still alive at shutdown, leaking the device",
                        Arc::strong_count(&self.ctx) - 1
                    );
                    return;
                }
            }

            // 3. Messenger and instance
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
