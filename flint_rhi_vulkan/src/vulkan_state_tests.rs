//! Unit tests for vulkan_state.rs

use ash::vk;
use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BlendStateDesc, ColorWriteMask, RasterizerStateDesc,
};

use super::*;

// ============================================================================
// BLEND
// ============================================================================

#[test]
fn test_opaque_blend_writes_all_channels() {
    let state = VulkanBlendState::opaque();
    assert_eq!(state.attachment.blend_enable, vk::FALSE);
    assert_eq!(state.attachment.color_write_mask, vk::ColorComponentFlags::RGBA);
    assert_eq!(state.sample_mask, !0);
    assert!(!state.alpha_to_coverage);
}

#[test]
fn test_alpha_blending_factors() {
    let state = VulkanBlendState::new(&BlendStateDesc::alpha_blending());
    assert_eq!(state.attachment.blend_enable, vk::TRUE);
    assert_eq!(state.attachment.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
    assert_eq!(state.attachment.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(state.attachment.color_blend_op, vk::BlendOp::ADD);
}

#[test]
fn test_alpha_follows_color_without_separate_alpha() {
    let desc = BlendStateDesc {
        enable_blend: true,
        use_separate_alpha: false,
        source: BlendSource::One,
        dest: BlendSource::One,
        operation: BlendOperation::RevSub,
        source_alpha: BlendSource::Zero,
        dest_alpha: BlendSource::Zero,
        operation_alpha: BlendOperation::Add,
        ..Default::default()
    };
    let state = VulkanBlendState::new(&desc);
    assert_eq!(state.attachment.src_alpha_blend_factor, vk::BlendFactor::ONE);
    assert_eq!(state.attachment.dst_alpha_blend_factor, vk::BlendFactor::ONE);
    assert_eq!(state.attachment.alpha_blend_op, vk::BlendOp::REVERSE_SUBTRACT);
}

#[test]
fn test_separate_alpha_and_write_mask() {
    let desc = BlendStateDesc {
        enable_blend: true,
        use_separate_alpha: true,
        source_alpha: BlendSource::One,
        dest_alpha: BlendSource::Zero,
        operation_alpha: BlendOperation::Max,
        write_mask: ColorWriteMask::RGB,
        ..Default::default()
    };
    let state = VulkanBlendState::new(&desc);
    assert_eq!(state.attachment.alpha_blend_op, vk::BlendOp::MAX);
    assert_eq!(
        state.attachment.color_write_mask,
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B
    );
    assert_eq!(state.key, desc.state_key());
}

// ============================================================================
// RASTERIZER
// ============================================================================

#[test]
fn test_front_face_follows_winding() {
    let ccw = VulkanRasterizerState::new(&RasterizerStateDesc::default());
    assert_eq!(ccw.front_face(), vk::FrontFace::COUNTER_CLOCKWISE);

    let cw = VulkanRasterizerState::new(&RasterizerStateDesc { use_triangle_ccw: false, ..Default::default() });
    assert_eq!(cw.front_face(), vk::FrontFace::CLOCKWISE);
}
