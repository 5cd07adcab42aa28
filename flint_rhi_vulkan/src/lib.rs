/*!
# Flint RHI - Vulkan Backend

Vulkan 1.3 implementation of the Flint render hardware interface.

Built on ash for the bindings and gpu-allocator for memory. Rendering uses
dynamic rendering and push descriptors, so there are no render pass or
descriptor pool objects to manage: resources bound by register index are
pushed right before each draw or dispatch.

```no_run
use flint_rhi::flint::RenderDevice;
use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi_vulkan::flint::VulkanBackend;

# fn run(window: &winit::window::Window) -> flint_rhi::flint::Result<()> {
let device = RenderDevice::create::<VulkanBackend>(window, RenderDeviceConfig::default())?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_format;
mod vulkan_pipeline;
mod vulkan_query_pool;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_state;
mod vulkan_swapchain;
mod vulkan_texture;

pub mod flint {
    pub use crate::vulkan::VulkanBackend;
    pub use crate::vulkan_command_list::VulkanCommandList;
    pub use crate::vulkan_texture::VulkanTexture;
    pub use crate::vulkan_context::binding_slots;

    // Validation reporting
    pub use crate::debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
}
