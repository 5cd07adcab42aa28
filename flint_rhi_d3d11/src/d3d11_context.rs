/// D3D11Context - device and immediate context shared by every native object
///
/// `ID3D11Device` is free-threaded; the immediate context is not, so every
/// use of it goes through a mutex. Deferred contexts belong to their command
/// list and need no locking.

use d3d12::ComPtr;
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_err, rhi_error, rhi_warn};
use std::sync::{Mutex, MutexGuard, PoisonError};
use winapi::shared::winerror::{self, HRESULT};
use winapi::um::{d3d11, d3d11sdklayers, d3dcommon};
use winapi::Interface;

use crate::debug::drain_info_queue;

pub(crate) const SOURCE: &str = "flint::d3d11";

// ===== HRESULT =====

/// HRESULT as the usual `0x8007000E` hex form
pub(crate) fn hresult_code(hr: HRESULT) -> String {
    format!("0x{:08X}", hr as u32)
}

pub(crate) trait HResult<T> {
    fn into_result(self) -> std::result::Result<T, HRESULT>;
}

impl HResult<()> for HRESULT {
    fn into_result(self) -> std::result::Result<(), HRESULT> {
        if winerror::SUCCEEDED(self) {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<T> HResult<T> for (T, HRESULT) {
    fn into_result(self) -> std::result::Result<T, HRESULT> {
        let (value, hr) = self;
        hr.into_result().map(|()| value)
    }
}

/// Log a failed native call and turn it into an `Error`
pub(crate) fn check(hr: HRESULT, what: &str) -> Result<()> {
    match hr.into_result() {
        Ok(()) => Ok(()),
        Err(winerror::E_OUTOFMEMORY) => {
            rhi_error!(SOURCE, "{} failed: out of memory", what);
            Err(Error::OutOfMemory)
        }
        Err(hr) => Err(rhi_err!(SOURCE, "{} failed with HRESULT {}", what, hresult_code(hr))),
    }
}

/// Upcast a buffer or texture interface to `ID3D11Resource`
pub(crate) fn as_resource<T: Interface>(object: &ComPtr<T>) -> Result<ComPtr<d3d11::ID3D11Resource>> {
    let (resource, hr) = unsafe { object.cast::<d3d11::ID3D11Resource>() };
    check(hr, "QueryInterface(ID3D11Resource)")?;
    Ok(resource)
}

// ===== CONTEXT =====

pub struct D3D11Context {
    pub(crate) device: ComPtr<d3d11::ID3D11Device>,
    immediate: Mutex<ComPtr<d3d11::ID3D11DeviceContext>>,
    pub(crate) feature_level: d3dcommon::D3D_FEATURE_LEVEL,
    info_queue: Option<ComPtr<d3d11sdklayers::ID3D11InfoQueue>>,
}

// SAFETY: the device is free-threaded and the immediate context is only
// reached through the mutex.
unsafe impl Send for D3D11Context {}
unsafe impl Sync for D3D11Context {}

impl D3D11Context {
    pub(crate) fn new(
        device: ComPtr<d3d11::ID3D11Device>,
        immediate: ComPtr<d3d11::ID3D11DeviceContext>,
        feature_level: d3dcommon::D3D_FEATURE_LEVEL,
        debug_layer: bool,
    ) -> Self {
        let info_queue = if debug_layer {
            match unsafe { device.cast::<d3d11sdklayers::ID3D11InfoQueue>() }.into_result() {
                Ok(queue) => Some(queue),
                Err(hr) => {
                    rhi_warn!(SOURCE, "Debug layer active but ID3D11InfoQueue unavailable ({})", hresult_code(hr));
                    None
                }
            }
        } else {
            None
        };

        Self { device, immediate: Mutex::new(immediate), feature_level, info_queue }
    }

    /// Exclusive access to the immediate context
    pub(crate) fn immediate(&self) -> MutexGuard<'_, ComPtr<d3d11::ID3D11DeviceContext>> {
        self.immediate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward pending debug-layer messages to the logger
    pub(crate) fn flush_debug_messages(&self) {
        if let Some(queue) = &self.info_queue {
            drain_info_queue(queue);
        }
    }

    pub(crate) fn has_debug_layer(&self) -> bool {
        self.info_queue.is_some()
    }

    /// Why the device went away, `S_OK` while it is alive
    pub(crate) fn device_removed_reason(&self) -> HRESULT {
        unsafe { self.device.GetDeviceRemovedReason() }
    }
}

/// Attach a debug name visible in graphics debuggers
pub(crate) unsafe fn set_object_name(child: *mut d3d11::ID3D11DeviceChild, name: &str) {
    if child.is_null() {
        return;
    }
    let hr = (*child).SetPrivateData(
        &d3dcommon::WKPDID_D3DDebugObjectName,
        name.len() as u32,
        name.as_ptr() as *const _,
    );
    if let Err(hr) = hr.into_result() {
        rhi_warn!(SOURCE, "Failed to set debug name '{}' ({})", name, hresult_code(hr));
    }
}

#[cfg(test)]
#[path = "d3d11_context_tests.rs"]
mod tests;
