//! Pipeline state objects

use crate::error::{Error, Result};
use crate::render::{
    BlendState, BlendStateKey, CommandList, DepthStencilState, DepthStencilStateKey, ImageFormat,
    NativePipelineState, RasterizerState, RasterizerStateKey, RenderDevice, ResourceId, Shader,
    ShaderStage,
};
use crate::rhi_warn;

/// Primitive assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
    /// Tessellation patches
    Patch { control_points: u32 },
}

/// One vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputLayoutEntry {
    /// Shader input location / semantic index
    pub location: u32,
    pub format: ImageFormat,
    pub vertex_buffer_index: u32,
    /// Byte offset inside the vertex
    pub offset: u32,
    /// 0 for per-vertex data, N to advance every N instances
    pub instance_step_rate: u32,
}

/// Pipeline state description
///
/// Graphics pipelines need a vertex shader and all three fixed-function
/// states; compute pipelines take a compute shader only.
#[derive(Clone, Default)]
pub struct PipelineStateDesc<'a> {
    pub vertex_shader: Option<&'a Shader>,
    pub tess_control_shader: Option<&'a Shader>,
    pub tess_evaluation_shader: Option<&'a Shader>,
    pub pixel_shader: Option<&'a Shader>,
    pub compute_shader: Option<&'a Shader>,
    pub blend_state: Option<&'a BlendState>,
    pub depth_stencil_state: Option<&'a DepthStencilState>,
    pub rasterizer_state: Option<&'a RasterizerState>,
    pub primitive_topology: PrimitiveTopology,
    pub input_layout: Vec<InputLayoutEntry>,
}

impl<'a> PipelineStateDesc<'a> {
    pub fn is_compute(&self) -> bool {
        self.compute_shader.is_some()
    }

    /// Graphics shaders in pipeline order (vertex, tess control, tess evaluation, pixel)
    pub fn graphics_shaders(&self) -> impl Iterator<Item = &'a Shader> {
        [
            self.vertex_shader,
            self.tess_control_shader,
            self.tess_evaluation_shader,
            self.pixel_shader,
        ]
        .into_iter()
        .flatten()
    }

    pub fn validate(&self) -> Result<()> {
        let slots = [
            (self.vertex_shader, ShaderStage::Vertex),
            (self.tess_control_shader, ShaderStage::TessControl),
            (self.tess_evaluation_shader, ShaderStage::TessEvaluation),
            (self.pixel_shader, ShaderStage::Pixel),
            (self.compute_shader, ShaderStage::Compute),
        ];
        for (shader, stage) in slots {
            if let Some(shader) = shader {
                if shader.stage() != stage {
                    return Err(Error::InvalidResource(format!(
                        "{:?} shader bound to the {:?} slot",
                        shader.stage(),
                        stage
                    )));
                }
            }
        }

        if self.is_compute() {
            if self.graphics_shaders().next().is_some() {
                return Err(Error::InvalidResource(
                    "Compute pipeline cannot have graphics stages".to_string(),
                ));
            }
            return Ok(());
        }

        if self.vertex_shader.is_none() {
            return Err(Error::InvalidResource("Graphics pipeline requires a vertex shader".to_string()));
        }
        if self.blend_state.is_none() || self.depth_stencil_state.is_none() || self.rasterizer_state.is_none() {
            return Err(Error::InvalidResource(
                "Graphics pipeline requires blend, depth-stencil and rasterizer states".to_string(),
            ));
        }
        if matches!(self.primitive_topology, PrimitiveTopology::Patch { control_points } if control_points == 0 || control_points > 32) {
            return Err(Error::InvalidResource("Patch topology needs 1..=32 control points".to_string()));
        }
        Ok(())
    }
}

/// Compiled pipeline state
pub struct PipelineState {
    id: ResourceId,
    is_compute: bool,
    primitive_topology: PrimitiveTopology,
    blend_key: Option<BlendStateKey>,
    depth_stencil_key: Option<DepthStencilStateKey>,
    rasterizer_key: Option<RasterizerStateKey>,
    native: Option<Box<dyn NativePipelineState>>,
}

impl PipelineState {
    pub fn create(device: &RenderDevice, desc: &PipelineStateDesc<'_>) -> Result<Self> {
        desc.validate()?;

        let native = device.backend().create_pipeline_state(desc)?;
        let is_compute = desc.is_compute();
        Ok(Self {
            id: ResourceId::next(),
            is_compute,
            primitive_topology: desc.primitive_topology,
            blend_key: desc.blend_state.filter(|_| !is_compute).map(BlendState::key),
            depth_stencil_key: desc.depth_stencil_state.filter(|_| !is_compute).map(DepthStencilState::key),
            rasterizer_key: desc.rasterizer_state.filter(|_| !is_compute).map(RasterizerState::key),
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_pipeline_state(native);
        }
    }

    pub fn bind(&self, cmd: &mut CommandList) -> Result<()> {
        cmd.bind_pipeline_state(self)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn is_compute(&self) -> bool {
        self.is_compute
    }

    pub fn primitive_topology(&self) -> PrimitiveTopology {
        self.primitive_topology
    }

    pub fn blend_key(&self) -> Option<BlendStateKey> {
        self.blend_key
    }

    pub fn depth_stencil_key(&self) -> Option<DepthStencilStateKey> {
        self.depth_stencil_key
    }

    pub fn rasterizer_key(&self) -> Option<RasterizerStateKey> {
        self.rasterizer_key
    }

    pub fn native(&self) -> Result<&dyn NativePipelineState> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Pipeline state used after destroy()".to_string()))
    }
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::PipelineState", "Pipeline state dropped without destroy(), native object leaked");
        }
    }
}
