/// D3D11Backend - Direct3D 11 implementation of RenderBackend
///
/// Owns the device, the immediate context and the swapchain. Every native
/// object shares the device through an `Arc<D3D11Context>`. Command lists
/// record into deferred contexts and are executed on the immediate context
/// at submission.

use d3d12::ComPtr;
use flint_rhi::flint::render::{
    downcast_native, downcast_native_mut, BackendCapabilities, BackendKind, BlendStateDesc,
    BufferDesc, DepthStencilStateDesc, DisplayMode, DisplaySurface, NativeBlendState, NativeBuffer,
    NativeCommandList, NativeDepthStencilState, NativePipelineState, NativeQueryPool,
    NativeRasterizerState, NativeSampler, NativeShader, NativeTexture, PipelineStateDesc,
    QueryType, RasterizerStateDesc, RenderBackend, RenderBackendFactory, RenderDeviceConfig,
    SamplerDesc, ShaderStage, TextureDescription,
};
use flint_rhi::flint::{Error, RenderDevice, Result};
use flint_rhi::{rhi_debug, rhi_error, rhi_info, rhi_warn};
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use std::{mem, ptr, thread};
use std::sync::Arc;
use winapi::shared::minwindef::{FALSE, TRUE};
use winapi::shared::windef::HWND;
use winapi::shared::winerror::{self, HRESULT};
use winapi::shared::{dxgi, dxgiformat, dxgitype};
use winapi::um::{d3d11, d3dcommon};
use winapi::Interface;

use crate::d3d11_buffer::D3D11Buffer;
use crate::d3d11_command_list::D3D11CommandList;
use crate::d3d11_context::{check, hresult_code, D3D11Context, HResult, SOURCE};
use crate::d3d11_conv::{feature_level_name, image_format_to_dxgi};
use crate::d3d11_pipeline::D3D11PipelineState;
use crate::d3d11_query_pool::D3D11QueryPool;
use crate::d3d11_sampler::D3D11Sampler;
use crate::d3d11_shader::D3D11Shader;
use crate::d3d11_state::{D3D11BlendState, D3D11DepthStencilState, D3D11RasterizerState};
use crate::d3d11_swapchain::Swapchain;
use crate::d3d11_texture::D3D11Texture;
use crate::debug::reset_debug_layer_tracking;

const FEATURE_LEVELS: [d3dcommon::D3D_FEATURE_LEVEL; 2] =
    [d3dcommon::D3D_FEATURE_LEVEL_11_1, d3dcommon::D3D_FEATURE_LEVEL_11_0];

fn init_error(what: &str, hr: HRESULT) -> Error {
    rhi_error!(SOURCE, "{} (HRESULT {})", what, hresult_code(hr));
    Error::InitializationFailed(format!("{} (HRESULT {})", what, hresult_code(hr)))
}

// ===== ADAPTER SELECTION =====

/// What adapter selection needs to know about an adapter
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AdapterInfo {
    pub name: String,
    pub dedicated_video_memory: usize,
    pub has_output: bool,
    pub software: bool,
}

/// Index of the preferred adapter
///
/// Hardware adapters driving a display win, then the most dedicated memory.
/// Software adapters (WARP) are picked only when nothing else exists.
pub(crate) fn pick_adapter(adapters: &[AdapterInfo]) -> Option<usize> {
    adapters
        .iter()
        .enumerate()
        .max_by_key(|(_, adapter)| (!adapter.software, adapter.has_output, adapter.dedicated_video_memory))
        .map(|(index, _)| index)
}

/// Adapter description string, cut at the terminating NUL
pub(crate) fn adapter_name(description: &[u16]) -> String {
    let len = description.iter().position(|&c| c == 0).unwrap_or(description.len());
    String::from_utf16_lossy(&description[..len])
}

unsafe fn enumerate_adapters() -> Vec<(ComPtr<dxgi::IDXGIAdapter1>, AdapterInfo)> {
    let mut factory = ComPtr::<dxgi::IDXGIFactory1>::null();
    let hr = dxgi::CreateDXGIFactory1(&dxgi::IDXGIFactory1::uuidof(), factory.mut_void());
    if let Err(hr) = hr.into_result() {
        rhi_warn!(SOURCE, "CreateDXGIFactory1 failed ({}), using the default adapter", hresult_code(hr));
        return Vec::new();
    }

    let mut adapters = Vec::new();
    for index in 0.. {
        let mut adapter = ComPtr::<dxgi::IDXGIAdapter1>::null();
        if factory.EnumAdapters1(index, adapter.mut_self()) == winerror::DXGI_ERROR_NOT_FOUND {
            break;
        }
        if adapter.is_null() {
            continue;
        }

        let mut desc: dxgi::DXGI_ADAPTER_DESC1 = mem::zeroed();
        if adapter.GetDesc1(&mut desc).into_result().is_err() {
            continue;
        }
        let mut output = ComPtr::<dxgi::IDXGIOutput>::null();
        let has_output = adapter.EnumOutputs(0, output.mut_self()) == winerror::S_OK;

        let info = AdapterInfo {
            name: adapter_name(&desc.Description),
            dedicated_video_memory: desc.DedicatedVideoMemory,
            has_output,
            software: desc.Flags & dxgi::DXGI_ADAPTER_FLAG_SOFTWARE != 0,
        };
        rhi_debug!(
            SOURCE,
            "Adapter {}: '{}' ({} MB, output: {})",
            index,
            info.name,
            info.dedicated_video_memory / (1024 * 1024),
            info.has_output
        );
        adapters.push((adapter, info));
    }
    adapters
}

// ===== DEVICE CREATION =====

fn window_handle(surface: &dyn DisplaySurface) -> Result<HWND> {
    let handle = surface.window_handle().map_err(|e| {
        rhi_error!(SOURCE, "Failed to get window handle: {:?}", e);
        Error::InitializationFailed(format!("Failed to get window handle: {:?}", e))
    })?;
    match handle.as_raw() {
        RawWindowHandle::Win32(handle) => Ok(handle.hwnd.get() as HWND),
        other => {
            rhi_error!(SOURCE, "Direct3D 11 needs a Win32 window, got {:?}", other);
            Err(Error::InitializationFailed("Surface is not a Win32 window".to_string()))
        }
    }
}

struct CreatedDevice {
    device: ComPtr<d3d11::ID3D11Device>,
    immediate: ComPtr<d3d11::ID3D11DeviceContext>,
    swapchain: ComPtr<dxgi::IDXGISwapChain>,
    feature_level: d3dcommon::D3D_FEATURE_LEVEL,
    debug_layer: bool,
}

unsafe fn create_device(
    adapter: Option<&ComPtr<dxgi::IDXGIAdapter1>>,
    swapchain_desc: &dxgi::DXGI_SWAP_CHAIN_DESC,
    debug_layer: bool,
) -> std::result::Result<CreatedDevice, HRESULT> {
    let (adapter, driver_type) = match adapter {
        Some(adapter) => (adapter.as_mut_ptr() as *mut dxgi::IDXGIAdapter, d3dcommon::D3D_DRIVER_TYPE_UNKNOWN),
        None => (ptr::null_mut(), d3dcommon::D3D_DRIVER_TYPE_HARDWARE),
    };

    let mut levels: &[d3dcommon::D3D_FEATURE_LEVEL] = &FEATURE_LEVELS;
    let mut debug_layer = debug_layer;
    loop {
        let flags = if debug_layer { d3d11::D3D11_CREATE_DEVICE_DEBUG } else { 0 };
        let mut device = ComPtr::<d3d11::ID3D11Device>::null();
        let mut immediate = ComPtr::<d3d11::ID3D11DeviceContext>::null();
        let mut swapchain = ComPtr::<dxgi::IDXGISwapChain>::null();
        let mut feature_level = 0;

        let hr = d3d11::D3D11CreateDeviceAndSwapChain(
            adapter,
            driver_type,
            ptr::null_mut(),
            flags,
            levels.as_ptr(),
            levels.len() as u32,
            d3d11::D3D11_SDK_VERSION,
            swapchain_desc,
            swapchain.mut_self(),
            device.mut_self(),
            &mut feature_level,
            immediate.mut_self(),
        );

        match hr {
            // Runtimes without 11_1 reject the whole list
            winerror::E_INVALIDARG if levels.len() > 1 => {
                rhi_debug!(SOURCE, "Feature level 11_1 unknown to the runtime, retrying with 11_0");
                levels = &levels[1..];
            }
            winerror::DXGI_ERROR_SDK_COMPONENT_MISSING if debug_layer => {
                rhi_warn!(SOURCE, "D3D11 debug layer not installed, continuing without it");
                debug_layer = false;
            }
            hr if winerror::SUCCEEDED(hr) => {
                return Ok(CreatedDevice { device, immediate, swapchain, feature_level, debug_layer });
            }
            hr => return Err(hr),
        }
    }
}

/// Whether the driver records command lists natively (emulated otherwise)
unsafe fn driver_command_lists(device: &d3d11::ID3D11Device) -> bool {
    let mut threading: d3d11::D3D11_FEATURE_DATA_THREADING = mem::zeroed();
    let hr = device.CheckFeatureSupport(
        d3d11::D3D11_FEATURE_THREADING,
        &mut threading as *mut _ as *mut _,
        mem::size_of::<d3d11::D3D11_FEATURE_DATA_THREADING>() as u32,
    );
    hr.into_result().is_ok() && threading.DriverCommandLists != FALSE
}

// ===== BACKEND =====

/// Direct3D 11 render backend
pub struct D3D11Backend {
    /// Dropped before the context
    swapchain: Swapchain,
    ctx: Arc<D3D11Context>,
    adapter_name: String,
}

impl D3D11Backend {
    /// Create the device and swapchain for `surface`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` with the native HRESULT when no device
    /// supporting feature level 11_0 can be created.
    pub fn new(surface: &dyn DisplaySurface, config: &RenderDeviceConfig) -> Result<Self> {
        let hwnd = window_handle(surface)?;
        let (width, height) = surface.client_size();
        let debug_layer = config.enable_validation || cfg!(feature = "d3d11-debug-layer");

        let format = image_format_to_dxgi(config.backbuffer_format);
        if format == dxgiformat::DXGI_FORMAT_UNKNOWN {
            rhi_error!(SOURCE, "{:?} cannot be a backbuffer format", config.backbuffer_format);
            return Err(Error::InitializationFailed(format!(
                "Unsupported backbuffer format {:?}",
                config.backbuffer_format
            )));
        }
        let buffer_count = config.backbuffer_count.max(1);

        let swapchain_desc = dxgi::DXGI_SWAP_CHAIN_DESC {
            BufferDesc: dxgitype::DXGI_MODE_DESC {
                Width: width,
                Height: height,
                RefreshRate: dxgitype::DXGI_RATIONAL { Numerator: 0, Denominator: 1 },
                Format: format,
                ScanlineOrdering: dxgitype::DXGI_MODE_SCANLINE_ORDER_UNSPECIFIED,
                Scaling: dxgitype::DXGI_MODE_SCALING_UNSPECIFIED,
            },
            SampleDesc: dxgitype::DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: dxgitype::DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: buffer_count,
            OutputWindow: hwnd,
            Windowed: if surface.display_mode() == DisplayMode::Fullscreen { FALSE } else { TRUE },
            SwapEffect: dxgi::DXGI_SWAP_EFFECT_DISCARD,
            Flags: 0,
        };

        unsafe {
            let adapters = enumerate_adapters();
            let infos: Vec<AdapterInfo> = adapters.iter().map(|(_, info)| info.clone()).collect();
            let selected = pick_adapter(&infos).and_then(|index| adapters.get(index));
            let adapter_name = match selected {
                Some((_, info)) => info.name.clone(),
                None => "Default adapter".to_string(),
            };
            rhi_info!(SOURCE, "Using '{}'", adapter_name);

            let created = create_device(selected.map(|(adapter, _)| adapter), &swapchain_desc, debug_layer)
                .map_err(|hr| init_error("D3D11CreateDeviceAndSwapChain failed", hr))?;

            if created.debug_layer {
                reset_debug_layer_tracking();
            }
            if !driver_command_lists(&created.device) {
                rhi_info!(SOURCE, "Driver command lists are emulated by the runtime");
            }

            let ctx = Arc::new(D3D11Context::new(
                created.device,
                created.immediate,
                created.feature_level,
                created.debug_layer,
            ));
            let swapchain = Swapchain::new(
                ctx.clone(),
                created.swapchain,
                format,
                buffer_count,
                (width, height),
                config.vsync,
            )?;
            ctx.flush_debug_messages();

            rhi_info!(
                SOURCE,
                "Direct3D 11 device ready (feature level {}, debug layer: {})",
                feature_level_name(ctx.feature_level),
                ctx.has_debug_layer()
            );
            Ok(Self { swapchain, ctx, adapter_name })
        }
    }

    /// Backend wrapped in a `RenderDevice`
    pub fn create_device(surface: &dyn DisplaySurface, config: RenderDeviceConfig) -> Result<RenderDevice> {
        let backend = Self::new(surface, &config)?;
        Ok(RenderDevice::from_backend(Box::new(backend), config))
    }

    /// Description of the adapter the device runs on
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }
}

impl RenderBackendFactory for D3D11Backend {
    fn create_backend(
        surface: &dyn DisplaySurface,
        config: &RenderDeviceConfig,
    ) -> Result<Box<dyn RenderBackend>> {
        Ok(Box::new(D3D11Backend::new(surface, config)?))
    }
}

impl RenderBackend for D3D11Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct3D11
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
        Ok(Box::new(D3D11Buffer::create(&self.ctx, desc, initial_data)?))
    }

    fn destroy_buffer(&self, buffer: Box<dyn NativeBuffer>) {
        drop(buffer);
    }

    fn update_buffer(&self, buffer: &dyn NativeBuffer, data: &[u8]) -> Result<()> {
        let buffer = downcast_native::<D3D11Buffer>(buffer.as_any(), "Buffer")?;
        buffer.update_on(&self.ctx.immediate(), data)
    }

    // ===== TEXTURES =====

    fn create_texture(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(D3D11Texture::create(&self.ctx, desc, initial_data, false)?))
    }

    fn create_render_target(&self, desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<Box<dyn NativeTexture>> {
        Ok(Box::new(D3D11Texture::create(&self.ctx, desc, initial_data, true)?))
    }

    fn destroy_texture(&self, texture: Box<dyn NativeTexture>) {
        drop(texture);
    }

    fn set_debug_name(&self, texture: &dyn NativeTexture, name: &str) {
        if let Ok(texture) = downcast_native::<D3D11Texture>(texture.as_any(), "Texture") {
            texture.set_debug_name(name);
        }
    }

    fn read_subresource(&self, texture: &dyn NativeTexture, layer: u32, mip: u32) -> Result<Vec<u8>> {
        downcast_native::<D3D11Texture>(texture.as_any(), "Texture")?.read_subresource(layer, mip)
    }

    // ===== SAMPLERS / SHADERS =====

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Box<dyn NativeSampler>> {
        Ok(Box::new(D3D11Sampler::create(&self.ctx, desc)?))
    }

    fn destroy_sampler(&self, sampler: Box<dyn NativeSampler>) {
        drop(sampler);
    }

    fn create_shader(&self, stage: ShaderStage, bytecode: &[u8]) -> Result<Box<dyn NativeShader>> {
        Ok(Box::new(D3D11Shader::create(&self.ctx, stage, bytecode)?))
    }

    fn destroy_shader(&self, shader: Box<dyn NativeShader>) {
        drop(shader);
    }

    // ===== FIXED-FUNCTION STATE =====

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<Box<dyn NativeBlendState>> {
        Ok(Box::new(D3D11BlendState::create(&self.ctx, desc)?))
    }

    fn destroy_blend_state(&self, state: Box<dyn NativeBlendState>) {
        drop(state);
    }

    fn create_depth_stencil_state(&self, desc: &DepthStencilStateDesc) -> Result<Box<dyn NativeDepthStencilState>> {
        Ok(Box::new(D3D11DepthStencilState::create(&self.ctx, desc)?))
    }

    fn destroy_depth_stencil_state(&self, state: Box<dyn NativeDepthStencilState>) {
        drop(state);
    }

    fn create_rasterizer_state(&self, desc: &RasterizerStateDesc) -> Result<Box<dyn NativeRasterizerState>> {
        Ok(Box::new(D3D11RasterizerState::create(&self.ctx, desc)?))
    }

    fn destroy_rasterizer_state(&self, state: Box<dyn NativeRasterizerState>) {
        drop(state);
    }

    // ===== PIPELINES =====

    fn create_pipeline_state(&self, desc: &PipelineStateDesc<'_>) -> Result<Box<dyn NativePipelineState>> {
        Ok(Box::new(D3D11PipelineState::create(&self.ctx, desc)?))
    }

    fn destroy_pipeline_state(&self, pipeline: Box<dyn NativePipelineState>) {
        drop(pipeline);
    }

    // ===== COMMAND LISTS =====

    fn create_command_list(&self) -> Result<Box<dyn NativeCommandList>> {
        Ok(Box::new(D3D11CommandList::new(&self.ctx, self.swapchain.backbuffer())?))
    }

    fn destroy_command_list(&self, command_list: Box<dyn NativeCommandList>) {
        drop(command_list);
    }

    fn submit_command_list(&self, command_list: &mut dyn NativeCommandList) -> Result<()> {
        downcast_native_mut::<D3D11CommandList>(command_list.as_any_mut(), "CommandList")?.submit()
    }

    // ===== QUERIES =====

    fn create_query_pool(&self, query_type: QueryType, capacity: u32) -> Result<Box<dyn NativeQueryPool>> {
        Ok(Box::new(D3D11QueryPool::create(&self.ctx, query_type, capacity)?))
    }

    fn destroy_query_pool(&self, pool: Box<dyn NativeQueryPool>) {
        drop(pool);
    }

    fn query_result(&self, pool: &mut dyn NativeQueryPool, index: u32) -> Option<u64> {
        let pool = downcast_native_mut::<D3D11QueryPool>(pool.as_any_mut(), "QueryPool").ok()?;
        pool.poll(&self.ctx.immediate(), index)
    }

    fn timestamp_to_milliseconds(&self, pool: &dyn NativeQueryPool, ticks: u64) -> f64 {
        match downcast_native::<D3D11QueryPool>(pool.as_any(), "QueryPool") {
            Ok(pool) => pool.ring.ticks_to_milliseconds(ticks),
            Err(_) => 0.0,
        }
    }

    // ===== PRESENTATION =====

    fn present(&mut self) -> Result<()> {
        self.swapchain.present()
    }

    fn set_vsync_state(&mut self, enabled: bool) {
        self.swapchain.set_vsync(enabled);
    }

    fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()> {
        self.swapchain.resize(width, height)
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        self.swapchain.size()
    }

    fn wait_idle(&self) -> Result<()> {
        let desc = d3d11::D3D11_QUERY_DESC { Query: d3d11::D3D11_QUERY_EVENT, MiscFlags: 0 };
        let mut query = ComPtr::<d3d11::ID3D11Query>::null();
        check(unsafe { self.ctx.device.CreateQuery(&desc, query.mut_self()) }, "CreateQuery(EVENT)")?;

        unsafe { self.ctx.immediate().End(query.as_mut_ptr() as *mut d3d11::ID3D11Asynchronous) };
        loop {
            let hr = unsafe {
                self.ctx
                    .immediate()
                    .GetData(query.as_mut_ptr() as *mut d3d11::ID3D11Asynchronous, ptr::null_mut(), 0, 0)
            };
            match hr {
                winerror::S_OK => return Ok(()),
                winerror::S_FALSE => thread::yield_now(),
                hr => {
                    let reason = self.ctx.device_removed_reason();
                    return Err(Error::BackendError(format!(
                        "Waiting for the GPU failed with HRESULT {} (device removed reason {})",
                        hresult_code(hr),
                        hresult_code(reason)
                    )));
                }
            }
        }
    }
}

impl Drop for D3D11Backend {
    fn drop(&mut self) {
        {
            let immediate = self.ctx.immediate();
            unsafe {
                immediate.ClearState();
                immediate.Flush();
            }
        }
        self.ctx.flush_debug_messages();

        // The swapchain holds one reference of its own
        let alive = Arc::strong_count(&self.ctx).saturating_sub(2);
        if alive > 0 {
            rhi_warn!(SOURCE, "{} native object(s) outlive the Direct3D 11 backend", alive);
        }
    }
}

#[cfg(test)]
#[path = "d3d11_tests.rs"]
mod tests;
