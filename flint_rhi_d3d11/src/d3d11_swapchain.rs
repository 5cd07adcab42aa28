/// Swapchain - presentation for the Direct3D 11 backend
///
/// The DXGI swapchain is created together with the device. Its buffer 0 is
/// wrapped in a render target view shared with every command list; the view
/// is dropped and rebuilt around `ResizeBuffers`.

use d3d12::ComPtr;
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_err, rhi_error, rhi_warn};
use std::ptr;
use std::sync::{Arc, PoisonError, RwLock};
use winapi::shared::dxgi;
use winapi::shared::dxgiformat::DXGI_FORMAT;
use winapi::shared::minwindef::FALSE;
use winapi::shared::winerror::{self, HRESULT};
use winapi::um::d3d11;
use winapi::Interface;

use crate::d3d11_context::{check, hresult_code, D3D11Context, HResult, SOURCE};

/// The swapchain buffer command lists render into
pub(crate) struct Backbuffer {
    pub view: Option<ComPtr<d3d11::ID3D11RenderTargetView>>,
    pub width: u32,
    pub height: u32,
}

// SAFETY: views are free-threaded; access is synchronized by the RwLock
unsafe impl Send for Backbuffer {}
unsafe impl Sync for Backbuffer {}

/// Backbuffer shared between the swapchain and every command list
pub(crate) type SharedBackbuffer = Arc<RwLock<Backbuffer>>;

/// Readable name of a device-removed reason
pub(crate) fn removed_reason_name(reason: HRESULT) -> &'static str {
    match reason {
        winerror::S_OK => "device not removed",
        winerror::DXGI_ERROR_DEVICE_HUNG => "device hung",
        winerror::DXGI_ERROR_DEVICE_REMOVED => "device removed",
        winerror::DXGI_ERROR_DEVICE_RESET => "device reset",
        winerror::DXGI_ERROR_DRIVER_INTERNAL_ERROR => "driver internal error",
        winerror::DXGI_ERROR_INVALID_CALL => "invalid call",
        _ => "unknown reason",
    }
}

/// DXGI sync interval for a vsync setting
pub(crate) fn sync_interval(vsync: bool) -> u32 {
    if vsync { 1 } else { 0 }
}

pub(crate) struct Swapchain {
    ctx: Arc<D3D11Context>,
    swapchain: ComPtr<dxgi::IDXGISwapChain>,
    format: DXGI_FORMAT,
    buffer_count: u32,
    vsync: bool,
    backbuffer: SharedBackbuffer,
}

// SAFETY: DXGI swapchains are free-threaded; present and resize take &mut self
unsafe impl Send for Swapchain {}
unsafe impl Sync for Swapchain {}

impl Swapchain {
    pub(crate) fn new(
        ctx: Arc<D3D11Context>,
        swapchain: ComPtr<dxgi::IDXGISwapChain>,
        format: DXGI_FORMAT,
        buffer_count: u32,
        (width, height): (u32, u32),
        vsync: bool,
    ) -> Result<Self> {
        let view = create_backbuffer_view(&ctx, &swapchain)?;
        Ok(Self {
            ctx,
            swapchain,
            format,
            buffer_count,
            vsync,
            backbuffer: Arc::new(RwLock::new(Backbuffer { view: Some(view), width, height })),
        })
    }

    pub(crate) fn backbuffer(&self) -> SharedBackbuffer {
        self.backbuffer.clone()
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        let backbuffer = self.backbuffer.read().unwrap_or_else(PoisonError::into_inner);
        (backbuffer.width, backbuffer.height)
    }

    pub(crate) fn set_vsync(&mut self, enabled: bool) {
        self.vsync = enabled;
    }

    pub(crate) fn present(&mut self) -> Result<()> {
        let hr = unsafe { self.swapchain.Present(sync_interval(self.vsync), 0) };
        self.ctx.flush_debug_messages();

        if let Err(hr) = hr.into_result() {
            if hr == winerror::DXGI_ERROR_DEVICE_REMOVED || hr == winerror::DXGI_ERROR_DEVICE_RESET {
                let reason = self.ctx.device_removed_reason();
                rhi_error!(
                    SOURCE,
                    "Present failed, device lost: {} ({})",
                    removed_reason_name(reason),
                    hresult_code(reason)
                );
                return Err(Error::BackendError(format!(
                    "Device lost: {} ({})",
                    removed_reason_name(reason),
                    hresult_code(reason)
                )));
            }
            return Err(rhi_err!(SOURCE, "Present failed with HRESULT {}", hresult_code(hr)));
        }
        Ok(())
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("Invalid backbuffer size {}x{}", width, height)));
        }

        let mut backbuffer = self.backbuffer.write().unwrap_or_else(PoisonError::into_inner);
        {
            // Every reference to buffer 0 must be gone before ResizeBuffers
            let immediate = self.ctx.immediate();
            unsafe {
                immediate.OMSetRenderTargets(0, ptr::null(), ptr::null_mut());
                immediate.Flush();
            }
        }
        backbuffer.view = None;

        let hr = unsafe { self.swapchain.ResizeBuffers(self.buffer_count, width, height, self.format, 0) };
        check(hr, "ResizeBuffers")?;

        backbuffer.view = Some(create_backbuffer_view(&self.ctx, &self.swapchain)?);
        backbuffer.width = width;
        backbuffer.height = height;
        rhi_debug!(SOURCE, "Backbuffer resized to {}x{} (vsync: {})", width, height, self.vsync);
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // DXGI refuses to release a swapchain that is still fullscreen
        let hr = unsafe { self.swapchain.SetFullscreenState(FALSE, ptr::null_mut()) };
        if let Err(hr) = hr.into_result() {
            rhi_warn!(SOURCE, "Failed to leave fullscreen before release ({})", hresult_code(hr));
        }
    }
}

fn create_backbuffer_view(
    ctx: &D3D11Context,
    swapchain: &ComPtr<dxgi::IDXGISwapChain>,
) -> Result<ComPtr<d3d11::ID3D11RenderTargetView>> {
    let mut buffer = ComPtr::<d3d11::ID3D11Texture2D>::null();
    check(
        unsafe { swapchain.GetBuffer(0, &d3d11::ID3D11Texture2D::uuidof(), buffer.mut_void()) },
        "IDXGISwapChain::GetBuffer",
    )?;

    let mut view = ComPtr::<d3d11::ID3D11RenderTargetView>::null();
    check(
        unsafe {
            ctx.device.CreateRenderTargetView(buffer.as_mut_ptr() as *mut d3d11::ID3D11Resource, ptr::null(), view.mut_self())
        },
        "CreateRenderTargetView(backbuffer)",
    )?;
    Ok(view)
}

#[cfg(test)]
#[path = "d3d11_swapchain_tests.rs"]
mod tests;
