/// Fixed-function state objects for the Direct3D 11 backend
///
/// Each state wraps its immutable `ID3D11*State` together with the values
/// D3D11 takes at bind time instead of creation time (sample mask, stencil
/// reference).

use d3d12::ComPtr;
use flint_rhi::flint::render::{
    BlendStateDesc, CullMode, DepthStencilStateDesc, NativeBlendState, NativeDepthStencilState, NativeRasterizerState,
    RasterizerStateDesc, StencilFaceDesc,
};
use flint_rhi::flint::Result;
use flint_rhi::rhi_warn;
use winapi::shared::minwindef::{FALSE, TRUE};
use winapi::um::d3d11;

use crate::d3d11_context::{check, D3D11Context, SOURCE};
use crate::d3d11_conv::{
    alpha_blend_to_d3d11, blend_op_to_d3d11, blend_to_d3d11, comparison_to_d3d11, cull_to_d3d11, fill_to_d3d11,
    stencil_op_to_d3d11,
};

fn boolean(value: bool) -> i32 {
    if value { TRUE } else { FALSE }
}

// ===== BLEND =====

/// Same blend for every render target
pub(crate) fn blend_desc(desc: &BlendStateDesc) -> d3d11::D3D11_BLEND_DESC {
    let (source_alpha, dest_alpha, operation_alpha) = desc.effective_alpha();
    let target = d3d11::D3D11_RENDER_TARGET_BLEND_DESC {
        BlendEnable: boolean(desc.enable_blend),
        SrcBlend: blend_to_d3d11(desc.source),
        DestBlend: blend_to_d3d11(desc.dest),
        BlendOp: blend_op_to_d3d11(desc.operation),
        SrcBlendAlpha: alpha_blend_to_d3d11(source_alpha),
        DestBlendAlpha: alpha_blend_to_d3d11(dest_alpha),
        BlendOpAlpha: blend_op_to_d3d11(operation_alpha),
        // ColorWriteMask bits match D3D11_COLOR_WRITE_ENABLE
        RenderTargetWriteMask: desc.write_mask.bits(),
    };
    d3d11::D3D11_BLEND_DESC {
        AlphaToCoverageEnable: boolean(desc.enable_alpha_to_coverage),
        IndependentBlendEnable: FALSE,
        RenderTarget: [target; 8],
    }
}

pub struct D3D11BlendState {
    pub(crate) state: ComPtr<d3d11::ID3D11BlendState>,
    pub(crate) sample_mask: u32,
}

unsafe impl Send for D3D11BlendState {}
unsafe impl Sync for D3D11BlendState {}

impl NativeBlendState for D3D11BlendState {}

impl D3D11BlendState {
    pub(crate) fn create(ctx: &D3D11Context, desc: &BlendStateDesc) -> Result<Self> {
        let native = blend_desc(desc);
        let mut state = ComPtr::<d3d11::ID3D11BlendState>::null();
        check(unsafe { ctx.device.CreateBlendState(&native, state.mut_self()) }, "CreateBlendState")?;
        Ok(Self { state, sample_mask: desc.sample_mask })
    }
}

// ===== DEPTH-STENCIL =====

fn stencil_face(face: &StencilFaceDesc) -> d3d11::D3D11_DEPTH_STENCILOP_DESC {
    d3d11::D3D11_DEPTH_STENCILOP_DESC {
        StencilFailOp: stencil_op_to_d3d11(face.fail_operation),
        StencilDepthFailOp: stencil_op_to_d3d11(face.z_fail_operation),
        StencilPassOp: stencil_op_to_d3d11(face.pass_operation),
        StencilFunc: comparison_to_d3d11(face.comparison_function),
    }
}

pub(crate) fn depth_stencil_desc(desc: &DepthStencilStateDesc) -> d3d11::D3D11_DEPTH_STENCIL_DESC {
    d3d11::D3D11_DEPTH_STENCIL_DESC {
        DepthEnable: boolean(desc.enable_depth_test),
        DepthWriteMask: if desc.enable_depth_write {
            d3d11::D3D11_DEPTH_WRITE_MASK_ALL
        } else {
            d3d11::D3D11_DEPTH_WRITE_MASK_ZERO
        },
        DepthFunc: comparison_to_d3d11(desc.depth_comparison_func),
        StencilEnable: boolean(desc.enable_stencil_test),
        StencilReadMask: desc.stencil_read_mask,
        StencilWriteMask: desc.stencil_write_mask,
        FrontFace: stencil_face(&desc.front),
        BackFace: stencil_face(&desc.back),
    }
}

pub struct D3D11DepthStencilState {
    pub(crate) state: ComPtr<d3d11::ID3D11DepthStencilState>,
    pub(crate) stencil_ref: u32,
}

unsafe impl Send for D3D11DepthStencilState {}
unsafe impl Sync for D3D11DepthStencilState {}

impl NativeDepthStencilState for D3D11DepthStencilState {}

impl D3D11DepthStencilState {
    pub(crate) fn create(ctx: &D3D11Context, desc: &DepthStencilStateDesc) -> Result<Self> {
        if desc.enable_depth_bounds_test {
            rhi_warn!(SOURCE, "Depth bounds test is not available in Direct3D 11 and is ignored");
        }
        let native = depth_stencil_desc(desc);
        let mut state = ComPtr::<d3d11::ID3D11DepthStencilState>::null();
        check(unsafe { ctx.device.CreateDepthStencilState(&native, state.mut_self()) }, "CreateDepthStencilState")?;
        Ok(Self { state, stencil_ref: desc.stencil_ref_value as u32 })
    }
}

// ===== RASTERIZER =====

pub(crate) fn rasterizer_desc(desc: &RasterizerStateDesc) -> d3d11::D3D11_RASTERIZER_DESC {
    d3d11::D3D11_RASTERIZER_DESC {
        FillMode: fill_to_d3d11(desc.fill_mode),
        CullMode: cull_to_d3d11(desc.cull_mode),
        FrontCounterClockwise: boolean(desc.use_triangle_ccw),
        DepthBias: desc.depth_bias.round() as i32,
        DepthBiasClamp: desc.depth_bias_clamp,
        SlopeScaledDepthBias: desc.slope_scale,
        DepthClipEnable: TRUE,
        ScissorEnable: FALSE,
        MultisampleEnable: TRUE,
        AntialiasedLineEnable: FALSE,
    }
}

pub struct D3D11RasterizerState {
    pub(crate) state: ComPtr<d3d11::ID3D11RasterizerState>,
}

unsafe impl Send for D3D11RasterizerState {}
unsafe impl Sync for D3D11RasterizerState {}

impl NativeRasterizerState for D3D11RasterizerState {}

impl D3D11RasterizerState {
    pub(crate) fn create(ctx: &D3D11Context, desc: &RasterizerStateDesc) -> Result<Self> {
        if desc.cull_mode == CullMode::FrontAndBack {
            rhi_warn!(SOURCE, "Direct3D 11 cannot cull both faces, culling back faces only");
        }
        let native = rasterizer_desc(desc);
        let mut state = ComPtr::<d3d11::ID3D11RasterizerState>::null();
        check(unsafe { ctx.device.CreateRasterizerState(&native, state.mut_self()) }, "CreateRasterizerState")?;
        Ok(Self { state })
    }
}

#[cfg(test)]
#[path = "d3d11_state_tests.rs"]
mod tests;
