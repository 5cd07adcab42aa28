/// GlPipelineState - OpenGL implementation of NativePipelineState
///
/// A linked program plus a vertex array object holding the attribute formats
/// of the input layout. Vertex buffers are attached to the VAO binding points
/// by the command list. The fixed-function state copies are handed back through
/// `NativePipelineState` and replayed only when their key changes.

use flint_rhi::flint::render::{
    downcast_native, InputLayoutEntry, NativeBlendState, NativeDepthStencilState,
    NativePipelineState, NativeRasterizerState, PipelineStateDesc, PrimitiveTopology, Shader,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_debug, rhi_err, rhi_error};
use glow::HasContext;
use std::sync::Arc;

use crate::gl_context::GlContext;
use crate::gl_conv::{primitive_mode, vertex_attribute, AttributeKind};
use crate::gl_shader::GlShader;
use crate::gl_state::{GlBlendState, GlDepthStencilState, GlRasterizerState};

// ===== VERTEX INPUT =====

/// One `glVertexAttrib*Format` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlAttribute {
    pub location: u32,
    pub size: i32,
    pub data_type: u32,
    pub kind: AttributeKind,
    pub binding: u32,
    pub offset: u32,
}

/// Attribute formats and per-binding instance divisors of an input layout
pub(crate) fn vertex_layout(entries: &[InputLayoutEntry]) -> Result<(Vec<GlAttribute>, Vec<(u32, u32)>)> {
    let mut attributes = Vec::with_capacity(entries.len());
    let mut divisors: Vec<(u32, u32)> = Vec::new();

    for entry in entries {
        let (size, data_type, kind) = vertex_attribute(entry.format).ok_or_else(|| {
            Error::InvalidResource(format!(
                "{:?} cannot be used as a vertex attribute (location {})",
                entry.format, entry.location
            ))
        })?;
        attributes.push(GlAttribute {
            location: entry.location,
            size,
            data_type,
            kind,
            binding: entry.vertex_buffer_index,
            offset: entry.offset,
        });

        match divisors.iter_mut().find(|(binding, _)| *binding == entry.vertex_buffer_index) {
            Some(divisor) => divisor.1 = divisor.1.max(entry.instance_step_rate),
            None => divisors.push((entry.vertex_buffer_index, entry.instance_step_rate)),
        }
    }

    Ok((attributes, divisors))
}

// ===== PIPELINE =====

pub struct GlPipelineState {
    ctx: Arc<GlContext>,
    pub(crate) program: glow::Program,
    pub(crate) vertex_array: Option<glow::VertexArray>,
    pub(crate) mode: u32,
    pub(crate) patch_vertices: Option<i32>,
    pub(crate) blend: Option<GlBlendState>,
    pub(crate) depth_stencil: Option<GlDepthStencilState>,
    pub(crate) rasterizer: Option<GlRasterizerState>,
}

impl NativePipelineState for GlPipelineState {
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

fn gl_shader(shader: &Shader) -> Result<glow::Shader> {
    let native = shader.native()?;
    Ok(downcast_native::<GlShader>(native.as_any(), "Shader")?.shader)
}

unsafe fn link_program(gl: &glow::Context, shaders: &[glow::Shader]) -> Result<glow::Program> {
    let program = gl
        .create_program()
        .map_err(|e| rhi_err!("flint::gl", "Failed to create program: {}", e))?;
    for &shader in shaders {
        gl.attach_shader(program, shader);
    }
    gl.link_program(program);
    for &shader in shaders {
        gl.detach_shader(program, shader);
    }

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        rhi_error!("flint::gl", "Failed to link program:\n{}", log);
        return Err(Error::InvalidResource(format!("Program link failed: {}", log)));
    }
    Ok(program)
}

unsafe fn build_vertex_array(gl: &glow::Context, entries: &[InputLayoutEntry]) -> Result<glow::VertexArray> {
    let (attributes, divisors) = vertex_layout(entries)?;
    let vertex_array = gl
        .create_vertex_array()
        .map_err(|e| rhi_err!("flint::gl", "Failed to create vertex array: {}", e))?;

    gl.bind_vertex_array(Some(vertex_array));
    for attribute in &attributes {
        gl.enable_vertex_attrib_array(attribute.location);
        match attribute.kind {
            AttributeKind::Float | AttributeKind::Normalized => gl.vertex_attrib_format_f32(
                attribute.location,
                attribute.size,
                attribute.data_type,
                attribute.kind == AttributeKind::Normalized,
                attribute.offset,
            ),
            AttributeKind::Integer => {
                gl.vertex_attrib_format_i32(attribute.location, attribute.size, attribute.data_type, attribute.offset)
            }
        }
        gl.vertex_attrib_binding(attribute.location, attribute.binding);
    }
    for &(binding, divisor) in &divisors {
        gl.vertex_binding_divisor(binding, divisor);
    }
    gl.bind_vertex_array(None);

    Ok(vertex_array)
}

impl GlPipelineState {
    pub(crate) fn create(ctx: &Arc<GlContext>, desc: &PipelineStateDesc<'_>) -> Result<Self> {
        let gl = ctx.gl()?;

        if let Some(compute_shader) = desc.compute_shader {
            let program = unsafe { link_program(gl, &[gl_shader(compute_shader)?])? };
            return Ok(Self {
                ctx: ctx.clone(),
                program,
                vertex_array: None,
                mode: glow::POINTS,
                patch_vertices: None,
                blend: None,
                depth_stencil: None,
                rasterizer: None,
            });
        }

        let shaders = desc.graphics_shaders().map(gl_shader).collect::<Result<Vec<_>>>()?;

        let blend = match desc.blend_state {
            Some(state) => *downcast_native::<GlBlendState>(state.native()?.as_any(), "BlendState")?,
            None => GlBlendState::opaque(),
        };
        let depth_stencil = match desc.depth_stencil_state {
            Some(state) => Some(*downcast_native::<GlDepthStencilState>(state.native()?.as_any(), "DepthStencilState")?),
            None => None,
        };
        let rasterizer = match desc.rasterizer_state {
            Some(state) => Some(*downcast_native::<GlRasterizerState>(state.native()?.as_any(), "RasterizerState")?),
            None => None,
        };

        let patch_vertices = match desc.primitive_topology {
            PrimitiveTopology::Patch { control_points } => Some(control_points as i32),
            _ => None,
        };

        unsafe {
            let program = link_program(gl, &shaders)?;
            let vertex_array = match build_vertex_array(gl, &desc.input_layout) {
                Ok(vertex_array) => vertex_array,
                Err(e) => {
                    gl.delete_program(program);
                    return Err(e);
                }
            };

            rhi_debug!(
                "flint::gl",
                "Linked program with {} stage(s), {} vertex attribute(s)",
                shaders.len(),
                desc.input_layout.len()
            );

            Ok(Self {
                ctx: ctx.clone(),
                program,
                vertex_array: Some(vertex_array),
                mode: primitive_mode(desc.primitive_topology),
                patch_vertices,
                blend: Some(blend),
                depth_stencil,
                rasterizer,
            })
        }
    }

    pub(crate) fn is_compute(&self) -> bool {
        self.vertex_array.is_none()
    }

    /// Make the program and vertex array current
    pub(crate) fn apply(&self, gl: &glow::Context) {
        unsafe {
            gl.use_program(Some(self.program));
            if let Some(vertex_array) = self.vertex_array {
                gl.bind_vertex_array(Some(vertex_array));
            }
            if let Some(vertices) = self.patch_vertices {
                gl.patch_parameter_i32(glow::PATCH_VERTICES, vertices);
            }
        }
    }
}

impl Drop for GlPipelineState {
    fn drop(&mut self) {
        if let Some(gl) = self.ctx.gl_for_drop("Pipeline state") {
            unsafe {
                if let Some(vertex_array) = self.vertex_array {
                    gl.delete_vertex_array(vertex_array);
                }
                gl.delete_program(self.program);
            }
        }
    }
}

#[cfg(test)]
#[path = "gl_pipeline_tests.rs"]
mod tests;
