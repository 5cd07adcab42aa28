//! RenderDevice - owner of the native device and its swapchain

use crate::error::Result;
use crate::render::{
    BackendCapabilities, BackendKind, DisplaySurface, RenderBackend, RenderBackendFactory,
    RenderDeviceConfig,
};
use crate::{rhi_debug, rhi_info, rhi_warn};

/// Native device, immediate context / queue and swapchain
pub struct RenderDevice {
    backend: Box<dyn RenderBackend>,
    config: RenderDeviceConfig,
}

impl RenderDevice {
    /// Create the device through the backend linked into this binary
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when the native device or the swapchain
    /// cannot be created. There is no fallback.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use flint_rhi::flint::{RenderDevice, Result};
    /// # use flint_rhi::flint::render::{DisplaySurface, RenderDeviceConfig, HeadlessBackend};
    /// # fn run(window: &winit::window::Window) -> Result<()> {
    /// let device = RenderDevice::create::<HeadlessBackend>(window, RenderDeviceConfig::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create<F: RenderBackendFactory>(
        surface: &dyn DisplaySurface,
        config: RenderDeviceConfig,
    ) -> Result<Self> {
        let backend = F::create_backend(surface, &config)?;
        Ok(Self::from_backend(backend, config))
    }

    /// Wrap an already created backend
    pub fn from_backend(backend: Box<dyn RenderBackend>, config: RenderDeviceConfig) -> Self {
        let (width, height) = backend.backbuffer_size();
        rhi_info!(
            "flint::RenderDevice",
            "{:?} device created ({}x{}, vsync {})",
            backend.kind(),
            width,
            height,
            config.vsync
        );
        Self { backend, config }
    }

    /// Backend seam used by the wrappers
    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &RenderDeviceConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    // ===== PRESENTATION =====

    /// Present the backbuffer (honors the vsync state)
    pub fn present(&mut self) -> Result<()> {
        self.backend.present()
    }

    pub fn set_vsync_state(&mut self, enabled: bool) {
        if self.config.vsync != enabled {
            rhi_debug!("flint::RenderDevice", "VSync {}", if enabled { "enabled" } else { "disabled" });
        }
        self.config.vsync = enabled;
        self.backend.set_vsync_state(enabled);
    }

    pub fn vsync_state(&self) -> bool {
        self.config.vsync
    }

    /// Recreate the swapchain buffers at the new client size
    pub fn resize_backbuffer(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.backend.backbuffer_size() {
            return Ok(());
        }
        self.backend.resize_backbuffer(width, height)?;
        rhi_debug!("flint::RenderDevice", "Backbuffer resized to {}x{}", width, height);
        Ok(())
    }

    pub fn backbuffer_size(&self) -> (u32, u32) {
        self.backend.backbuffer_size()
    }

    /// Block until the GPU finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.backend.wait_idle()
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        if self.backend.wait_idle().is_err() {
            rhi_warn!("flint::RenderDevice", "wait_idle() failed while dropping the device");
        }
        rhi_info!("flint::RenderDevice", "{:?} device destroyed", self.backend.kind());
    }
}

#[cfg(test)]
#[path = "render_device_tests.rs"]
mod tests;
