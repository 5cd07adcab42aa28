/// Fixed-function state objects for the Vulkan backend
///
/// Blend state is baked into pipeline variants (Vulkan has no dynamic blend
/// equation in core 1.3). Depth-stencil and rasterizer state are replayed
/// with core 1.3 dynamic state commands when bound, so they never cause a
/// pipeline rebuild. Fill mode is the exception and is part of the variant key.

use ash::vk;
use flint_rhi::flint::render::{
    BlendStateDesc, BlendStateKey, DepthStencilStateDesc, NativeBlendState,
    NativeDepthStencilState, NativeRasterizerState, RasterizerStateDesc, StencilFaceDesc,
};

use crate::vulkan_context::DeviceLimits;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, color_write_mask_to_vk, compare_op_to_vk,
    cull_mode_to_vk, stencil_op_to_vk,
};

// ===== BLEND =====

#[derive(Debug, Clone, Copy)]
pub struct VulkanBlendState {
    pub(crate) key: BlendStateKey,
    pub(crate) attachment: vk::PipelineColorBlendAttachmentState,
    pub(crate) alpha_to_coverage: bool,
    pub(crate) sample_mask: u32,
}

impl NativeBlendState for VulkanBlendState {}

impl VulkanBlendState {
    pub(crate) fn new(desc: &BlendStateDesc) -> Self {
        let (source_alpha, dest_alpha, operation_alpha) = desc.effective_alpha();
        let attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(desc.enable_blend)
            .src_color_blend_factor(blend_factor_to_vk(desc.source))
            .dst_color_blend_factor(blend_factor_to_vk(desc.dest))
            .color_blend_op(blend_op_to_vk(desc.operation))
            .src_alpha_blend_factor(blend_factor_to_vk(source_alpha))
            .dst_alpha_blend_factor(blend_factor_to_vk(dest_alpha))
            .alpha_blend_op(blend_op_to_vk(operation_alpha))
            .color_write_mask(color_write_mask_to_vk(desc.write_mask));

        Self {
            key: desc.state_key(),
            attachment,
            alpha_to_coverage: desc.enable_alpha_to_coverage,
            sample_mask: desc.sample_mask,
        }
    }

    /// Pipelines built without a blend state write every channel unblended
    pub(crate) fn opaque() -> Self {
        Self::new(&BlendStateDesc::default())
    }
}

// ===== DEPTH-STENCIL =====

#[derive(Debug, Clone, Copy)]
pub struct VulkanDepthStencilState {
    pub(crate) desc: DepthStencilStateDesc,
}

impl NativeDepthStencilState for VulkanDepthStencilState {}

fn stencil_face(face: &StencilFaceDesc) -> (vk::StencilOp, vk::StencilOp, vk::StencilOp, vk::CompareOp) {
    (
        stencil_op_to_vk(face.fail_operation),
        stencil_op_to_vk(face.pass_operation),
        stencil_op_to_vk(face.z_fail_operation),
        compare_op_to_vk(face.comparison_function),
    )
}

impl VulkanDepthStencilState {
    pub(crate) fn new(desc: &DepthStencilStateDesc) -> Self {
        Self { desc: *desc }
    }

    /// Record the dynamic depth-stencil state
    pub(crate) unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer, limits: &DeviceLimits) {
        let desc = &self.desc;
        device.cmd_set_depth_test_enable(cmd, desc.enable_depth_test);
        device.cmd_set_depth_write_enable(cmd, desc.enable_depth_write);
        device.cmd_set_depth_compare_op(cmd, compare_op_to_vk(desc.depth_comparison_func));

        let depth_bounds = desc.enable_depth_bounds_test && limits.depth_bounds;
        device.cmd_set_depth_bounds_test_enable(cmd, depth_bounds);
        if limits.depth_bounds {
            device.cmd_set_depth_bounds(cmd, desc.depth_bounds_min, desc.depth_bounds_max);
        }

        device.cmd_set_stencil_test_enable(cmd, desc.enable_stencil_test);
        for (face_mask, face) in [
            (vk::StencilFaceFlags::FRONT, &desc.front),
            (vk::StencilFaceFlags::BACK, &desc.back),
        ] {
            let (fail, pass, depth_fail, compare) = stencil_face(face);
            device.cmd_set_stencil_op(cmd, face_mask, fail, pass, depth_fail, compare);
        }
        let both = vk::StencilFaceFlags::FRONT_AND_BACK;
        device.cmd_set_stencil_compare_mask(cmd, both, desc.stencil_read_mask as u32);
        device.cmd_set_stencil_write_mask(cmd, both, desc.stencil_write_mask as u32);
        device.cmd_set_stencil_reference(cmd, both, desc.stencil_ref_value as u32);
    }
}

// ===== RASTERIZER =====

#[derive(Debug, Clone, Copy)]
pub struct VulkanRasterizerState {
    pub(crate) desc: RasterizerStateDesc,
}

impl NativeRasterizerState for VulkanRasterizerState {}

impl VulkanRasterizerState {
    pub(crate) fn new(desc: &RasterizerStateDesc) -> Self {
        Self { desc: *desc }
    }

    pub(crate) fn front_face(&self) -> vk::FrontFace {
        // The negative-height viewport keeps D3D winding
        if self.desc.use_triangle_ccw {
            vk::FrontFace::COUNTER_CLOCKWISE
        } else {
            vk::FrontFace::CLOCKWISE
        }
    }

    /// Record the dynamic rasterizer state (fill mode lives in the pipeline)
    pub(crate) unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        let desc = &self.desc;
        device.cmd_set_cull_mode(cmd, cull_mode_to_vk(desc.cull_mode));
        device.cmd_set_front_face(cmd, self.front_face());

        let bias = desc.depth_bias != 0.0 || desc.slope_scale != 0.0;
        device.cmd_set_depth_bias_enable(cmd, bias);
        device.cmd_set_depth_bias(cmd, desc.depth_bias, desc.depth_bias_clamp, desc.slope_scale);
    }
}

#[cfg(test)]
#[path = "vulkan_state_tests.rs"]
mod tests;
