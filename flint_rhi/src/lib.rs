/*!
# Flint RHI

Backend-agnostic core of the Flint render hardware interface.

This crate describes GPU resources and fixed-function state with plain value
types, packs blend/depth-stencil/rasterizer state into integer keys for cheap
change detection, and routes every native call through a single trait seam
(`RenderBackend` / `NativeCommandList`). Exactly one backend crate
(`flint_rhi_vulkan`, `flint_rhi_gl` or `flint_rhi_d3d11`) is linked per
binary and plugged in when the `RenderDevice` is created.

## Architecture

- **RenderDevice**: owns the backend (device + swapchain/context)
- **State keys**: packed `BlendStateKey`, `DepthStencilStateKey`, `RasterizerStateKey`
- **Descriptions**: `BufferDesc`, `TextureDescription`, `SamplerDesc`, `PipelineStateDesc`, `RenderPassDesc`
- **Wrappers**: `Buffer`, `Texture`, `RenderTarget`, `Sampler`, `Shader`, `PipelineState`, ...
  each owning an opaque native object destroyed explicitly against the device
- **CommandList**: recording front end with an explicit bound-state cache
- **CommandListPool / QueryPool**: round-robin rings

A CPU `headless` backend ships with the core for tests and host-side emulation.
*/

// Internal modules
mod error;
mod rhi;
pub mod log;
pub mod render;

// Main flint namespace module
pub mod flint {
    // Error types
    pub use crate::error::{Error, Result};

    // Global singleton (logger registry)
    pub use crate::rhi::Rhi;

    // Device façade
    pub use crate::render::RenderDevice;

    // Logging sub-module (types only, macros live at crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogFacadeLogger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::render::*;
    }
}
