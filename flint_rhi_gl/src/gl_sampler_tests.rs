//! Unit tests for gl_sampler.rs

use flint_rhi::flint::render::{ComparisonFunction, SamplerAddress, SamplerDesc, SamplerFilter};

use super::*;

fn int(parameters: &SamplerParameters, name: u32) -> Option<i32> {
    parameters.ints.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

fn float(parameters: &SamplerParameters, name: u32) -> Option<f32> {
    parameters.floats.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

// ============================================================================
// FILTERING
// ============================================================================

#[test]
fn test_point_sampler() {
    let desc = SamplerDesc { filter: SamplerFilter::Point, ..Default::default() };
    let parameters = sampler_parameters(&desc, 16.0);
    assert_eq!(int(&parameters, glow::TEXTURE_MIN_FILTER), Some(glow::NEAREST_MIPMAP_NEAREST as i32));
    assert_eq!(int(&parameters, glow::TEXTURE_MAG_FILTER), Some(glow::NEAREST as i32));
    assert_eq!(int(&parameters, glow::TEXTURE_COMPARE_MODE), Some(glow::NONE as i32));
    assert_eq!(float(&parameters, glow::TEXTURE_MAX_ANISOTROPY), None);
}

#[test]
fn test_anisotropy_is_clamped() {
    let desc = SamplerDesc { filter: SamplerFilter::Anisotropic16, ..Default::default() };
    assert_eq!(float(&sampler_parameters(&desc, 8.0), glow::TEXTURE_MAX_ANISOTROPY), Some(8.0));
    assert_eq!(float(&sampler_parameters(&desc, 16.0), glow::TEXTURE_MAX_ANISOTROPY), Some(16.0));
}

#[test]
fn test_comparison_sampler() {
    let desc = SamplerDesc {
        filter: SamplerFilter::ComparisonBilinear,
        comparison_function: ComparisonFunction::LEqual,
        ..Default::default()
    };
    let parameters = sampler_parameters(&desc, 16.0);
    assert_eq!(int(&parameters, glow::TEXTURE_COMPARE_MODE), Some(glow::COMPARE_REF_TO_TEXTURE as i32));
    assert_eq!(int(&parameters, glow::TEXTURE_COMPARE_FUNC), Some(glow::LEQUAL as i32));
}

// ============================================================================
// ADDRESSING / LOD
// ============================================================================

#[test]
fn test_address_modes_and_lod_range() {
    let desc = SamplerDesc {
        address_u: SamplerAddress::ClampEdge,
        address_v: SamplerAddress::Mirror,
        address_w: SamplerAddress::ClampBorder,
        border_color: [1.0, 0.0, 0.0, 1.0],
        min_lod: 1.0,
        max_lod: 4.0,
        lod_bias: -0.5,
        ..Default::default()
    };
    let parameters = sampler_parameters(&desc, 16.0);
    assert_eq!(int(&parameters, glow::TEXTURE_WRAP_S), Some(glow::CLAMP_TO_EDGE as i32));
    assert_eq!(int(&parameters, glow::TEXTURE_WRAP_T), Some(glow::MIRRORED_REPEAT as i32));
    assert_eq!(int(&parameters, glow::TEXTURE_WRAP_R), Some(glow::CLAMP_TO_BORDER as i32));
    assert_eq!(float(&parameters, glow::TEXTURE_MIN_LOD), Some(1.0));
    assert_eq!(float(&parameters, glow::TEXTURE_MAX_LOD), Some(4.0));
    assert_eq!(float(&parameters, glow::TEXTURE_LOD_BIAS), Some(-0.5));
    assert_eq!(parameters.border_color, [1.0, 0.0, 0.0, 1.0]);
}
