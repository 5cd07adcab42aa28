/*!
# Flint RHI - OpenGL Backend

OpenGL 4.6 core profile implementation of the Flint render hardware interface.

The application creates the context (glutin, SDL, a native WGL/GLX/EGL
wrapper) and hands the backend a [`flint::GlSurface`] that loads entry points
and presents. Commands execute immediately on the context thread; every
native object refuses to touch GL from any other thread.

Shaders are accepted as GLSL source or as SPIR-V (`ARB_gl_spirv`).

```no_run
use std::sync::Arc;
use flint_rhi::flint::render::RenderDeviceConfig;
use flint_rhi_gl::flint::{GlBackend, GlSurface};

# fn run(surface: Arc<dyn GlSurface>) -> flint_rhi::flint::Result<()> {
let mut device = GlBackend::create_device(surface, RenderDeviceConfig::default())?;
device.present()?;
# Ok(())
# }
```
*/

mod debug;
mod gl;
mod gl_buffer;
mod gl_command_list;
mod gl_context;
mod gl_conv;
mod gl_pipeline;
mod gl_query_pool;
mod gl_sampler;
mod gl_shader;
mod gl_state;
mod gl_texture;

pub mod flint {
    pub use crate::gl::GlBackend;
    pub use crate::gl_command_list::GlCommandList;
    pub use crate::gl_context::{GlContext, GlSurface};
    pub use crate::gl_state::{get_state_apply_counts, StateApplyCounts};
    pub use crate::gl_texture::GlTexture;

    // GL debug output reporting
    pub use crate::debug::{get_debug_output_stats, print_debug_output_report, DebugOutputStats};
}
