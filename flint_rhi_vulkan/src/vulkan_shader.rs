/// VulkanShader - Vulkan implementation of NativeShader
///
/// The module handle is shared with every pipeline built from it, so a shader
/// may be destroyed while pipelines (and their lazily built variants) still
/// need it.

use ash::vk;
use flint_rhi::flint::render::{NativeShader, ShaderStage};
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_err;
use std::ffi::CStr;
use std::io::Cursor;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::shader_stage_to_vk;

/// Entry point of every flint SPIR-V module
pub(crate) const ENTRY_POINT: &CStr = c"main";

/// Owned shader module, destroyed with its last reference
pub(crate) struct ShaderModule {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    pub(crate) stage: vk::ShaderStageFlags,
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_shader_module(self.module, None) };
    }
}

/// Vulkan shader implementation
pub struct VulkanShader {
    stage: ShaderStage,
    pub(crate) module: Arc<ShaderModule>,
}

impl NativeShader for VulkanShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl VulkanShader {
    pub(crate) fn create(ctx: &Arc<GpuContext>, stage: ShaderStage, bytecode: &[u8]) -> Result<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytecode)).map_err(|e| {
            Error::InvalidResource(format!("Invalid SPIR-V for {:?} shader: {}", stage, e))
        })?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| rhi_err!("flint::vulkan", "Failed to create {:?} shader module: {:?}", stage, e))?;

        Ok(Self {
            stage,
            module: Arc::new(ShaderModule {
                ctx: ctx.clone(),
                module,
                stage: shader_stage_to_vk(stage),
            }),
        })
    }
}
