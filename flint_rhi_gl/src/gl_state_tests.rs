//! Unit tests for gl_state.rs

use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BlendStateDesc, ColorWriteMask, ComparisonFunction, CullMode,
    DepthStencilStateDesc, FillMode, RasterizerStateDesc, StencilFaceDesc, StencilOperation,
};

use super::*;

// ============================================================================
// BLEND
// ============================================================================

#[test]
fn test_opaque_blend_writes_all_channels() {
    let state = GlBlendState::opaque();
    assert!(!state.enabled);
    assert_eq!(state.write_mask, [true; 4]);
    assert!(!state.alpha_to_coverage);
}

#[test]
fn test_alpha_blending_factors() {
    let state = GlBlendState::new(&BlendStateDesc::alpha_blending());
    assert!(state.enabled);
    assert_eq!(state.source, glow::SRC_ALPHA);
    assert_eq!(state.dest, glow::ONE_MINUS_SRC_ALPHA);
    assert_eq!(state.equation, glow::FUNC_ADD);
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
    let state = GlBlendState::new(&desc);
    assert_eq!(state.source_alpha, glow::ONE);
    assert_eq!(state.dest_alpha, glow::ONE);
    assert_eq!(state.equation_alpha, glow::FUNC_REVERSE_SUBTRACT);
}

#[test]
fn test_write_mask_channels() {
    let desc = BlendStateDesc { write_mask: ColorWriteMask::R | ColorWriteMask::A, ..Default::default() };
    assert_eq!(GlBlendState::new(&desc).write_mask, [true, false, false, true]);
}

// ============================================================================
// DEPTH-STENCIL
// ============================================================================

#[test]
fn test_depth_stencil_translation() {
    let desc = DepthStencilStateDesc {
        enable_stencil_test: true,
        depth_comparison_func: ComparisonFunction::Less,
        stencil_ref_value: 3,
        stencil_read_mask: 0x0F,
        stencil_write_mask: 0xF0,
        back: StencilFaceDesc {
            comparison_function: ComparisonFunction::Equal,
            pass_operation: StencilOperation::Inc,
            fail_operation: StencilOperation::Zero,
            z_fail_operation: StencilOperation::Invert,
        },
        ..Default::default()
    };
    let state = GlDepthStencilState::new(&desc);
    assert!(state.depth_test && state.depth_write && state.stencil_test);
    assert_eq!(state.depth_func, glow::LESS);
    assert_eq!((state.stencil_ref, state.read_mask, state.write_mask), (3, 0x0F, 0xF0));
    assert_eq!(state.front.func, glow::ALWAYS);
    assert_eq!(state.front.pass, glow::REPLACE);
    assert_eq!(state.back.func, glow::EQUAL);
    assert_eq!(state.back.pass, glow::INCR);
    assert_eq!(state.back.fail, glow::ZERO);
    assert_eq!(state.back.depth_fail, glow::INVERT);
}

#[test]
fn test_disabled_depth() {
    let state = GlDepthStencilState::new(&DepthStencilStateDesc::disabled());
    assert!(!state.depth_test);
    assert!(!state.depth_write);
}

// ============================================================================
// RASTERIZER
// ============================================================================

#[test]
fn test_default_rasterizer() {
    let state = GlRasterizerState::new(&RasterizerStateDesc::default());
    assert_eq!(state.cull_face, None);
    assert_eq!(state.front_face, glow::CCW);
    assert_eq!(state.polygon_mode, glow::FILL);
    assert!(!state.has_depth_bias());
}

#[test]
fn test_rasterizer_cull_wireframe_and_bias() {
    let desc = RasterizerStateDesc {
        cull_mode: CullMode::Back,
        fill_mode: FillMode::Wireframe,
        slope_scale: 1.5,
        use_triangle_ccw: false,
        ..Default::default()
    };
    let state = GlRasterizerState::new(&desc);
    assert_eq!(state.cull_face, Some(glow::BACK));
    assert_eq!(state.front_face, glow::CW);
    assert_eq!(state.polygon_mode, glow::LINE);
    assert!(state.has_depth_bias());
}
