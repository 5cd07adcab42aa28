//! Render device configuration

use crate::render::ImageFormat;

/// Render device configuration
#[derive(Debug, Clone)]
pub struct RenderDeviceConfig {
    /// Enable validation/debug layers (D3D11 debug device, Vulkan validation, GL debug output)
    pub enable_validation: bool,
    /// Application name (reported to the Vulkan driver)
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Initial vertical sync state
    pub vsync: bool,
    /// Swapchain color format
    pub backbuffer_format: ImageFormat,
    /// Number of swapchain images
    pub backbuffer_count: u32,
    /// Capacity used by `CommandListPool::with_default_capacity`
    pub command_list_capacity: u32,
}

impl Default for RenderDeviceConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Flint Application".to_string(),
            app_version: (1, 0, 0),
            vsync: true,
            backbuffer_format: ImageFormat::Bgra8Unorm,
            backbuffer_count: 2,
            command_list_capacity: 4,
        }
    }
}
