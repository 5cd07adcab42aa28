/// GlShader - OpenGL implementation of NativeShader
///
/// Accepts SPIR-V modules (ARB_gl_spirv, entry point `main`) or GLSL source
/// text. The two are told apart by the SPIR-V magic number.

use flint_rhi::flint::render::{NativeShader, ShaderStage};
use flint_rhi::flint::{Error, Result};
use flint_rhi::rhi_error;
use glow::HasContext;
use std::ffi::c_void;
use std::sync::Arc;

use crate::gl_context::{GlContext, SHADER_BINARY_FORMAT_SPIR_V};
use crate::gl_conv::shader_type;

pub(crate) const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader payload kind
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShaderSource<'a> {
    Spirv(&'a [u8]),
    Glsl(&'a str),
}

/// Classify a shader payload
pub(crate) fn classify_source(bytecode: &[u8]) -> Result<ShaderSource<'_>> {
    if bytecode.len() >= 4 && u32::from_le_bytes([bytecode[0], bytecode[1], bytecode[2], bytecode[3]]) == SPIRV_MAGIC {
        if bytecode.len() % 4 != 0 {
            return Err(Error::InvalidResource(format!(
                "SPIR-V module size must be a multiple of 4 (got {} bytes)",
                bytecode.len()
            )));
        }
        return Ok(ShaderSource::Spirv(bytecode));
    }

    let source = std::str::from_utf8(bytecode)
        .map_err(|e| Error::InvalidResource(format!("Shader is neither SPIR-V nor UTF-8 GLSL: {}", e)))?
        .trim_end_matches('\0');
    if source.trim().is_empty() {
        return Err(Error::InvalidResource("Shader source is empty".to_string()));
    }
    Ok(ShaderSource::Glsl(source))
}

pub struct GlShader {
    ctx: Arc<GlContext>,
    stage: ShaderStage,
    pub(crate) shader: glow::Shader,
}

impl NativeShader for GlShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl GlShader {
    pub(crate) fn create(ctx: &Arc<GlContext>, stage: ShaderStage, bytecode: &[u8]) -> Result<Self> {
        let source = classify_source(bytecode)?;
        let gl = ctx.gl()?;

        unsafe {
            let shader = gl
                .create_shader(shader_type(stage))
                .map_err(|e| Error::BackendError(format!("glCreateShader failed: {}", e)))?;

            match source {
                ShaderSource::Spirv(module) => {
                    let Some(spirv) = ctx.spirv()? else {
                        gl.delete_shader(shader);
                        return Err(Error::InvalidResource(
                            "SPIR-V shaders need glShaderBinary and glSpecializeShader".to_string(),
                        ));
                    };
                    let name = shader.0.get();
                    (spirv.shader_binary)(
                        1,
                        &name,
                        SHADER_BINARY_FORMAT_SPIR_V,
                        module.as_ptr() as *const c_void,
                        module.len() as i32,
                    );
                    (spirv.specialize_shader)(name, c"main".as_ptr(), 0, std::ptr::null(), std::ptr::null());
                }
                ShaderSource::Glsl(text) => {
                    gl.shader_source(shader, text);
                    gl.compile_shader(shader);
                }
            }

            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                rhi_error!("flint::gl", "Failed to compile {:?} shader:\n{}", stage, log);
                return Err(Error::InvalidResource(format!("{:?} shader compilation failed: {}", stage, log)));
            }

            Ok(Self { ctx: ctx.clone(), stage, shader })
        }
    }
}

impl Drop for GlShader {
    fn drop(&mut self) {
        if let Some(gl) = self.ctx.gl_for_drop("Shader") {
            unsafe { gl.delete_shader(self.shader) };
        }
    }
}

#[cfg(test)]
#[path = "gl_shader_tests.rs"]
mod tests;
