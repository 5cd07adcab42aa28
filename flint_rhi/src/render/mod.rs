//! Render module - descriptions, state keys, wrappers and the backend seam

// Module declarations
pub mod backend;
pub mod config;
pub mod surface;
pub mod state_key;
pub mod image_format;
pub mod buffer;
pub mod texture;
pub mod render_target;
pub mod sampler;
pub mod shader;
pub mod blend_state;
pub mod depth_stencil_state;
pub mod rasterizer_state;
pub mod pipeline_state;
pub mod render_pass;
pub mod command_list;
pub mod command_list_pool;
pub mod query_pool;
pub mod render_device;
pub mod headless;

// Re-export everything
pub use backend::*;
pub use config::*;
pub use surface::*;
pub use state_key::*;
pub use image_format::*;
pub use buffer::*;
pub use texture::*;
pub use render_target::*;
pub use sampler::*;
pub use shader::*;
pub use blend_state::*;
pub use depth_stencil_state::*;
pub use rasterizer_state::*;
pub use pipeline_state::*;
pub use render_pass::*;
pub use command_list::*;
pub use command_list_pool::*;
pub use query_pool::*;
pub use render_device::*;
pub use headless::{HeadlessBackend, HeadlessStats, HeadlessStatsHandle};
