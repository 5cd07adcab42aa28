/// D3D11Sampler - Direct3D 11 implementation of NativeSampler

use d3d12::ComPtr;
use flint_rhi::flint::render::{NativeSampler, SamplerDesc};
use flint_rhi::flint::Result;
use winapi::um::d3d11;

use crate::d3d11_context::{check, D3D11Context};
use crate::d3d11_conv::{address_to_d3d11, comparison_to_d3d11, filter_to_d3d11};

pub struct D3D11Sampler {
    pub(crate) sampler: ComPtr<d3d11::ID3D11SamplerState>,
}

// SAFETY: state objects are immutable after creation
unsafe impl Send for D3D11Sampler {}
unsafe impl Sync for D3D11Sampler {}

impl NativeSampler for D3D11Sampler {}

/// Native description of `desc`; the comparison function only applies to comparison filters
pub(crate) fn sampler_desc(desc: &SamplerDesc) -> d3d11::D3D11_SAMPLER_DESC {
    d3d11::D3D11_SAMPLER_DESC {
        Filter: filter_to_d3d11(desc.filter),
        AddressU: address_to_d3d11(desc.address_u),
        AddressV: address_to_d3d11(desc.address_v),
        AddressW: address_to_d3d11(desc.address_w),
        MipLODBias: desc.lod_bias,
        MaxAnisotropy: desc.filter.anisotropy().unwrap_or(1),
        ComparisonFunc: if desc.filter.is_comparison() {
            comparison_to_d3d11(desc.comparison_function)
        } else {
            d3d11::D3D11_COMPARISON_NEVER
        },
        BorderColor: desc.border_color,
        MinLOD: desc.min_lod,
        MaxLOD: desc.max_lod,
    }
}

impl D3D11Sampler {
    pub(crate) fn create(ctx: &D3D11Context, desc: &SamplerDesc) -> Result<Self> {
        let native = sampler_desc(desc);
        let mut sampler = ComPtr::<d3d11::ID3D11SamplerState>::null();
        check(unsafe { ctx.device.CreateSamplerState(&native, sampler.mut_self()) }, "CreateSamplerState")?;
        Ok(Self { sampler })
    }
}

#[cfg(test)]
#[path = "d3d11_sampler_tests.rs"]
mod tests;
