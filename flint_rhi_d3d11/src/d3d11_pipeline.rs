/// D3D11PipelineState - Direct3D 11 implementation of NativePipelineState
///
/// D3D11 has no pipeline objects: a pipeline is the set of shader objects,
/// an input layout, a topology and references to its three state objects,
/// all bound together by the command list.

use flint_rhi::flint::render::{
    downcast_native, InputLayoutEntry, NativeBlendState, NativeDepthStencilState, NativePipelineState,
    NativeRasterizerState, PipelineStateDesc, Shader,
};
use flint_rhi::flint::{Error, Result};
use d3d12::ComPtr;
use std::ffi::CStr;
use winapi::um::d3d11;
use winapi::um::d3dcommon::D3D_PRIMITIVE_TOPOLOGY;

use crate::d3d11_context::{check, D3D11Context};
use crate::d3d11_conv::{topology_to_d3d11, vertex_format};
use crate::d3d11_shader::{D3D11Shader, ShaderObject};
use crate::d3d11_state::{D3D11BlendState, D3D11DepthStencilState, D3D11RasterizerState};

/// Every attribute uses this semantic, indexed by its location
pub(crate) const VERTEX_SEMANTIC: &CStr = c"TEXCOORD";

/// Native input elements of an input layout
pub(crate) fn input_elements(entries: &[InputLayoutEntry]) -> Result<Vec<d3d11::D3D11_INPUT_ELEMENT_DESC>> {
    entries
        .iter()
        .map(|entry| {
            let format = vertex_format(entry.format).ok_or_else(|| {
                Error::InvalidResource(format!(
                    "{:?} cannot be used as a vertex attribute (location {})",
                    entry.format, entry.location
                ))
            })?;
            let per_instance = entry.instance_step_rate > 0;
            Ok(d3d11::D3D11_INPUT_ELEMENT_DESC {
                SemanticName: VERTEX_SEMANTIC.as_ptr(),
                SemanticIndex: entry.location,
                Format: format,
                InputSlot: entry.vertex_buffer_index,
                AlignedByteOffset: entry.offset,
                InputSlotClass: if per_instance {
                    d3d11::D3D11_INPUT_PER_INSTANCE_DATA
                } else {
                    d3d11::D3D11_INPUT_PER_VERTEX_DATA
                },
                InstanceDataStepRate: entry.instance_step_rate,
            })
        })
        .collect()
}

pub struct D3D11PipelineState {
    pub(crate) vertex: Option<ComPtr<d3d11::ID3D11VertexShader>>,
    pub(crate) hull: Option<ComPtr<d3d11::ID3D11HullShader>>,
    pub(crate) domain: Option<ComPtr<d3d11::ID3D11DomainShader>>,
    pub(crate) pixel: Option<ComPtr<d3d11::ID3D11PixelShader>>,
    pub(crate) compute: Option<ComPtr<d3d11::ID3D11ComputeShader>>,
    pub(crate) input_layout: Option<ComPtr<d3d11::ID3D11InputLayout>>,
    pub(crate) topology: D3D_PRIMITIVE_TOPOLOGY,
    blend: Option<D3D11BlendState>,
    depth_stencil: Option<D3D11DepthStencilState>,
    rasterizer: Option<D3D11RasterizerState>,
}

unsafe impl Send for D3D11PipelineState {}
unsafe impl Sync for D3D11PipelineState {}

impl NativePipelineState for D3D11PipelineState {
    fn blend_state(&self) -> Option<&dyn NativeBlendState> {
        self.blend.as_ref().map(|state| state as &dyn NativeBlendState)
    }

    fn depth_stencil_state(&self) -> Option<&dyn NativeDepthStencilState> {
        self.depth_stencil.as_ref().map(|state| state as &dyn NativeDepthStencilState)
    }

    fn rasterizer_state(&self) -> Option<&dyn NativeRasterizerState> {
        self.rasterizer.as_ref().map(|state| state as &dyn NativeRasterizerState)
    }
}

fn d3d11_shader(shader: &Shader) -> Result<&D3D11Shader> {
    let native = shader.native()?;
    downcast_native::<D3D11Shader>(native.as_any(), "Shader")
}

impl D3D11PipelineState {
    pub(crate) fn create(ctx: &D3D11Context, desc: &PipelineStateDesc<'_>) -> Result<Self> {
        desc.validate()?;

        let mut pipeline = Self {
            vertex: None,
            hull: None,
            domain: None,
            pixel: None,
            compute: None,
            input_layout: None,
            topology: topology_to_d3d11(desc.primitive_topology),
            blend: None,
            depth_stencil: None,
            rasterizer: None,
        };

        let shaders = desc.graphics_shaders().chain(desc.compute_shader);
        for shader in shaders {
            match d3d11_shader(shader)?.object.clone() {
                ShaderObject::Vertex(object) => pipeline.vertex = Some(object),
                ShaderObject::Hull(object) => pipeline.hull = Some(object),
                ShaderObject::Domain(object) => pipeline.domain = Some(object),
                ShaderObject::Pixel(object) => pipeline.pixel = Some(object),
                ShaderObject::Compute(object) => pipeline.compute = Some(object),
            }
        }
        if desc.is_compute() {
            return Ok(pipeline);
        }

        if let Some(vertex_shader) = desc.vertex_shader {
            let elements = input_elements(&desc.input_layout)?;
            if !elements.is_empty() {
                let bytecode = &d3d11_shader(vertex_shader)?.bytecode;
                let mut layout = ComPtr::<d3d11::ID3D11InputLayout>::null();
                check(
                    unsafe {
                        ctx.device.CreateInputLayout(
                            elements.as_ptr(),
                            elements.len() as u32,
                            bytecode.as_ptr() as *const _,
                            bytecode.len(),
                            layout.mut_self(),
                        )
                    },
                    "CreateInputLayout",
                )?;
                pipeline.input_layout = Some(layout);
            }
        }

        if let Some(state) = desc.blend_state {
            let native = downcast_native::<D3D11BlendState>(state.native()?.as_any(), "BlendState")?;
            pipeline.blend = Some(D3D11BlendState { state: native.state.clone(), sample_mask: native.sample_mask });
        }
        if let Some(state) = desc.depth_stencil_state {
            let native = downcast_native::<D3D11DepthStencilState>(state.native()?.as_any(), "DepthStencilState")?;
            pipeline.depth_stencil =
                Some(D3D11DepthStencilState { state: native.state.clone(), stencil_ref: native.stencil_ref });
        }
        if let Some(state) = desc.rasterizer_state {
            let native = downcast_native::<D3D11RasterizerState>(state.native()?.as_any(), "RasterizerState")?;
            pipeline.rasterizer = Some(D3D11RasterizerState { state: native.state.clone() });
        }

        Ok(pipeline)
    }
}

#[cfg(test)]
#[path = "d3d11_pipeline_tests.rs"]
mod tests;
