/// GlSampler - OpenGL implementation of NativeSampler

use flint_rhi::flint::render::{NativeSampler, SamplerDesc};
use flint_rhi::flint::Result;
use flint_rhi::rhi_err;
use glow::HasContext;
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_conv::{compare_func, sampler_address, sampler_filters};

pub struct GlSampler {
    ctx: Arc<GlContext>,
    pub(crate) sampler: glow::Sampler,
}

impl NativeSampler for GlSampler {}

/// Sampler object parameters derived from a description
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SamplerParameters {
    pub ints: Vec<(u32, i32)>,
    pub floats: Vec<(u32, f32)>,
    pub border_color: [f32; 4],
}

/// Parameters for `desc`, anisotropy clamped to `max_anisotropy`
pub(crate) fn sampler_parameters(desc: &SamplerDesc, max_anisotropy: f32) -> SamplerParameters {
    let (min_filter, mag_filter) = sampler_filters(desc.filter);
    let mut ints = vec![
        (glow::TEXTURE_MIN_FILTER, min_filter as i32),
        (glow::TEXTURE_MAG_FILTER, mag_filter as i32),
        (glow::TEXTURE_WRAP_S, sampler_address(desc.address_u) as i32),
        (glow::TEXTURE_WRAP_T, sampler_address(desc.address_v) as i32),
        (glow::TEXTURE_WRAP_R, sampler_address(desc.address_w) as i32),
    ];
    if desc.filter.is_comparison() {
        ints.push((glow::TEXTURE_COMPARE_MODE, glow::COMPARE_REF_TO_TEXTURE as i32));
        ints.push((glow::TEXTURE_COMPARE_FUNC, compare_func(desc.comparison_function) as i32));
    } else {
        ints.push((glow::TEXTURE_COMPARE_MODE, glow::NONE as i32));
    }

    let mut floats = vec![
        (glow::TEXTURE_MIN_LOD, desc.min_lod),
        (glow::TEXTURE_MAX_LOD, desc.max_lod),
        (glow::TEXTURE_LOD_BIAS, desc.lod_bias),
    ];
    if let Some(anisotropy) = desc.filter.anisotropy() {
        floats.push((glow::TEXTURE_MAX_ANISOTROPY, (anisotropy as f32).min(max_anisotropy.max(1.0))));
    }

    SamplerParameters { ints, floats, border_color: desc.border_color }
}

impl GlSampler {
    pub(crate) fn create(ctx: &Arc<GlContext>, desc: &SamplerDesc, max_anisotropy: f32) -> Result<Self> {
        let gl = ctx.gl()?;
        let parameters = sampler_parameters(desc, max_anisotropy);
        unsafe {
            let sampler = gl
                .create_sampler()
                .map_err(|e| rhi_err!("flint::gl", "Failed to create sampler: {}", e))?;
            for &(name, value) in &parameters.ints {
                gl.sampler_parameter_i32(sampler, name, value);
            }
            for &(name, value) in &parameters.floats {
                gl.sampler_parameter_f32(sampler, name, value);
            }
            let mut border = parameters.border_color;
            gl.sampler_parameter_f32_slice(sampler, glow::TEXTURE_BORDER_COLOR, &mut border);

            Ok(Self { ctx: ctx.clone(), sampler })
        }
    }
}

impl Drop for GlSampler {
    fn drop(&mut self) {
        if let Some(gl) = self.ctx.gl_for_drop("Sampler") {
            unsafe { gl.delete_sampler(self.sampler) };
        }
    }
}

#[cfg(test)]
#[path = "gl_sampler_tests.rs"]
mod tests;
