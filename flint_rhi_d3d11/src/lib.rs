/*!
# Flint RHI - Direct3D 11 Backend

Direct3D 11 (feature level 11_0 and up) implementation of the Flint render
hardware interface.

Command lists record into deferred contexts and can be built on worker
threads; submission executes them on the immediate context. Shaders are
accepted as precompiled DXBC only.

```no_run
# #[cfg(windows)]
# mod example {
use flint_rhi::flint::RenderDevice;
use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi_d3d11::flint::D3D11Backend;

# fn run(window: &winit::window::Window) -> flint_rhi::flint::Result<()> {
let mut device = RenderDevice::create::<D3D11Backend>(window, RenderDeviceConfig::default())?;
device.present()?;
# Ok(())
# }
# }
```
*/

#![cfg(windows)]

mod d3d11;
mod d3d11_buffer;
mod d3d11_command_list;
mod d3d11_context;
mod d3d11_conv;
mod d3d11_pipeline;
mod d3d11_query_pool;
mod d3d11_sampler;
mod d3d11_shader;
mod d3d11_state;
mod d3d11_swapchain;
mod d3d11_texture;
mod debug;

pub mod flint {
    pub use crate::d3d11::D3D11Backend;
    pub use crate::d3d11_command_list::D3D11CommandList;
    pub use crate::d3d11_texture::D3D11Texture;

    // Debug layer reporting
    pub use crate::debug::{get_debug_layer_stats, print_debug_layer_report, DebugLayerStats};
}
