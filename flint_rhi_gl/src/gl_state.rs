/// Fixed-function state objects for the OpenGL backend
///
/// GL has no state objects, so each one is the already-translated parameter
/// set and is replayed into the context when bound. Pipelines keep their own
/// copies; the command list replays them only when the state key changes.

use flint_rhi::flint::render::{
    BlendStateDesc, ColorWriteMask, DepthStencilStateDesc, NativeBlendState,
    NativeDepthStencilState, NativeRasterizerState, RasterizerStateDesc, StencilFaceDesc,
};
use glow::HasContext;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::gl_conv::{blend_equation, blend_factor, compare_func, cull_face, polygon_mode, stencil_op};

fn toggle(gl: &glow::Context, capability: u32, enabled: bool) {
    unsafe {
        if enabled {
            gl.enable(capability);
        } else {
            gl.disable(capability);
        }
    }
}

/// Replays per state kind, in `StateApplyCounts` field order
static APPLY_COUNTS: [AtomicU64; 3] = [const { AtomicU64::new(0) }; 3];

/// Number of times each fixed-function state kind was replayed into a GL context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateApplyCounts {
    pub blend: u64,
    pub depth_stencil: u64,
    pub rasterizer: u64,
}

pub fn get_state_apply_counts() -> StateApplyCounts {
    let [blend, depth_stencil, rasterizer] = [0, 1, 2].map(|slot| APPLY_COUNTS[slot].load(Ordering::Relaxed));
    StateApplyCounts { blend, depth_stencil, rasterizer }
}

fn count_apply(slot: usize) {
    APPLY_COUNTS[slot].fetch_add(1, Ordering::Relaxed);
}

// ===== BLEND =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlBlendState {
    pub(crate) enabled: bool,
    pub(crate) source: u32,
    pub(crate) dest: u32,
    pub(crate) equation: u32,
    pub(crate) source_alpha: u32,
    pub(crate) dest_alpha: u32,
    pub(crate) equation_alpha: u32,
    pub(crate) write_mask: [bool; 4],
    pub(crate) alpha_to_coverage: bool,
}

impl NativeBlendState for GlBlendState {}

impl GlBlendState {
    pub(crate) fn new(desc: &BlendStateDesc) -> Self {
        let (source_alpha, dest_alpha, operation_alpha) = desc.effective_alpha();
        let mask = desc.write_mask;
        Self {
            enabled: desc.enable_blend,
            source: blend_factor(desc.source),
            dest: blend_factor(desc.dest),
            equation: blend_equation(desc.operation),
            source_alpha: blend_factor(source_alpha),
            dest_alpha: blend_factor(dest_alpha),
            equation_alpha: blend_equation(operation_alpha),
            write_mask: [
                mask.contains(ColorWriteMask::R),
                mask.contains(ColorWriteMask::G),
                mask.contains(ColorWriteMask::B),
                mask.contains(ColorWriteMask::A),
            ],
            alpha_to_coverage: desc.enable_alpha_to_coverage,
        }
    }

    pub(crate) fn opaque() -> Self {
        Self::new(&BlendStateDesc::default())
    }

    pub(crate) fn apply(&self, gl: &glow::Context) {
        count_apply(0);
        toggle(gl, glow::BLEND, self.enabled);
        toggle(gl, glow::SAMPLE_ALPHA_TO_COVERAGE, self.alpha_to_coverage);
        unsafe {
            gl.blend_func_separate(self.source, self.dest, self.source_alpha, self.dest_alpha);
            gl.blend_equation_separate(self.equation, self.equation_alpha);
            let [r, g, b, a] = self.write_mask;
            gl.color_mask(r, g, b, a);
        }
    }
}

// ===== DEPTH-STENCIL =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlStencilFace {
    pub func: u32,
    pub fail: u32,
    pub depth_fail: u32,
    pub pass: u32,
}

impl GlStencilFace {
    fn new(face: &StencilFaceDesc) -> Self {
        Self {
            func: compare_func(face.comparison_function),
            fail: stencil_op(face.fail_operation),
            depth_fail: stencil_op(face.z_fail_operation),
            pass: stencil_op(face.pass_operation),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlDepthStencilState {
    pub(crate) depth_test: bool,
    pub(crate) depth_write: bool,
    pub(crate) depth_func: u32,
    pub(crate) stencil_test: bool,
    pub(crate) stencil_ref: i32,
    pub(crate) read_mask: u32,
    pub(crate) write_mask: u32,
    pub(crate) front: GlStencilFace,
    pub(crate) back: GlStencilFace,
}

impl NativeDepthStencilState for GlDepthStencilState {}

impl GlDepthStencilState {
    /// Depth bounds are not part of core GL and are ignored
    pub(crate) fn new(desc: &DepthStencilStateDesc) -> Self {
        Self {
            depth_test: desc.enable_depth_test,
            depth_write: desc.enable_depth_write,
            depth_func: compare_func(desc.depth_comparison_func),
            stencil_test: desc.enable_stencil_test,
            stencil_ref: desc.stencil_ref_value as i32,
            read_mask: desc.stencil_read_mask as u32,
            write_mask: desc.stencil_write_mask as u32,
            front: GlStencilFace::new(&desc.front),
            back: GlStencilFace::new(&desc.back),
        }
    }

    pub(crate) fn apply(&self, gl: &glow::Context) {
        count_apply(1);
        toggle(gl, glow::DEPTH_TEST, self.depth_test);
        toggle(gl, glow::STENCIL_TEST, self.stencil_test);
        unsafe {
            gl.depth_mask(self.depth_write);
            gl.depth_func(self.depth_func);
            for (face, state) in [(glow::FRONT, &self.front), (glow::BACK, &self.back)] {
                gl.stencil_func_separate(face, state.func, self.stencil_ref, self.read_mask);
                gl.stencil_op_separate(face, state.fail, state.depth_fail, state.pass);
            }
            gl.stencil_mask(self.write_mask);
        }
    }
}

// ===== RASTERIZER =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlRasterizerState {
    pub(crate) cull_face: Option<u32>,
    pub(crate) front_face: u32,
    pub(crate) polygon_mode: u32,
    pub(crate) depth_bias: f32,
    pub(crate) slope_scale: f32,
}

impl NativeRasterizerState for GlRasterizerState {}

impl GlRasterizerState {
    pub(crate) fn new(desc: &RasterizerStateDesc) -> Self {
        Self {
            cull_face: cull_face(desc.cull_mode),
            front_face: if desc.use_triangle_ccw { glow::CCW } else { glow::CW },
            polygon_mode: polygon_mode(desc.fill_mode),
            depth_bias: desc.depth_bias,
            slope_scale: desc.slope_scale,
        }
    }

    pub(crate) fn has_depth_bias(&self) -> bool {
        self.depth_bias != 0.0 || self.slope_scale != 0.0
    }

    pub(crate) fn apply(&self, gl: &glow::Context) {
        count_apply(2);
        toggle(gl, glow::CULL_FACE, self.cull_face.is_some());
        let bias = self.has_depth_bias();
        for capability in [glow::POLYGON_OFFSET_FILL, glow::POLYGON_OFFSET_LINE, glow::POLYGON_OFFSET_POINT] {
            toggle(gl, capability, bias);
        }
        unsafe {
            if let Some(face) = self.cull_face {
                gl.cull_face(face);
            }
            gl.front_face(self.front_face);
            gl.polygon_mode(glow::FRONT_AND_BACK, self.polygon_mode);
            gl.polygon_offset(self.slope_scale, self.depth_bias);
        }
    }
}

#[cfg(test)]
#[path = "gl_state_tests.rs"]
mod tests;
