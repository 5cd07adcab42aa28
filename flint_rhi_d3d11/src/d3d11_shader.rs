/// D3D11Shader - Direct3D 11 implementation of NativeShader
///
/// Shaders are created from compiled DXBC. The vertex shader keeps its
/// bytecode, which input layouts are validated against.

use d3d12::ComPtr;
use flint_rhi::flint::render::{NativeShader, ShaderStage};
use flint_rhi::flint::{Error, Result};
use std::ptr;
use winapi::um::d3d11;

use crate::d3d11_context::{check, D3D11Context};

/// Container magic of compiled HLSL
pub(crate) const DXBC_MAGIC: &[u8; 4] = b"DXBC";

/// Smallest possible DXBC container: magic, checksum, version, size, chunk count
const DXBC_HEADER_SIZE: usize = 32;

/// Reject payloads that are not DXBC containers
pub(crate) fn check_bytecode(stage: ShaderStage, bytecode: &[u8]) -> Result<()> {
    if bytecode.len() < DXBC_HEADER_SIZE || &bytecode[..4] != DXBC_MAGIC {
        return Err(Error::InvalidResource(format!(
            "{:?} shader payload of {} bytes is not DXBC bytecode",
            stage,
            bytecode.len()
        )));
    }
    Ok(())
}

/// Native shader object, one interface per stage
#[derive(Clone)]
pub(crate) enum ShaderObject {
    Vertex(ComPtr<d3d11::ID3D11VertexShader>),
    Hull(ComPtr<d3d11::ID3D11HullShader>),
    Domain(ComPtr<d3d11::ID3D11DomainShader>),
    Pixel(ComPtr<d3d11::ID3D11PixelShader>),
    Compute(ComPtr<d3d11::ID3D11ComputeShader>),
}

pub struct D3D11Shader {
    stage: ShaderStage,
    pub(crate) object: ShaderObject,
    pub(crate) bytecode: Vec<u8>,
}

// SAFETY: shader objects are immutable after creation
unsafe impl Send for D3D11Shader {}
unsafe impl Sync for D3D11Shader {}

impl NativeShader for D3D11Shader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl D3D11Shader {
    pub(crate) fn create(ctx: &D3D11Context, stage: ShaderStage, bytecode: &[u8]) -> Result<Self> {
        check_bytecode(stage, bytecode)?;

        let code = bytecode.as_ptr() as *const _;
        let len = bytecode.len();
        let device = &ctx.device;
        let object = unsafe {
            match stage {
                ShaderStage::Vertex => {
                    let mut shader = ComPtr::<d3d11::ID3D11VertexShader>::null();
                    check(device.CreateVertexShader(code, len, ptr::null_mut(), shader.mut_self()), "CreateVertexShader")?;
                    ShaderObject::Vertex(shader)
                }
                ShaderStage::TessControl => {
                    let mut shader = ComPtr::<d3d11::ID3D11HullShader>::null();
                    check(device.CreateHullShader(code, len, ptr::null_mut(), shader.mut_self()), "CreateHullShader")?;
                    ShaderObject::Hull(shader)
                }
                ShaderStage::TessEvaluation => {
                    let mut shader = ComPtr::<d3d11::ID3D11DomainShader>::null();
                    check(device.CreateDomainShader(code, len, ptr::null_mut(), shader.mut_self()), "CreateDomainShader")?;
                    ShaderObject::Domain(shader)
                }
                ShaderStage::Pixel => {
                    let mut shader = ComPtr::<d3d11::ID3D11PixelShader>::null();
                    check(device.CreatePixelShader(code, len, ptr::null_mut(), shader.mut_self()), "CreatePixelShader")?;
                    ShaderObject::Pixel(shader)
                }
                ShaderStage::Compute => {
                    let mut shader = ComPtr::<d3d11::ID3D11ComputeShader>::null();
                    check(
                        device.CreateComputeShader(code, len, ptr::null_mut(), shader.mut_self()),
                        "CreateComputeShader",
                    )?;
                    ShaderObject::Compute(shader)
                }
            }
        };

        let bytecode = if stage == ShaderStage::Vertex { bytecode.to_vec() } else { Vec::new() };
        Ok(Self { stage, object, bytecode })
    }
}

#[cfg(test)]
#[path = "d3d11_shader_tests.rs"]
mod tests;
