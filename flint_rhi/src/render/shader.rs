//! Shader stages and compiled shader objects

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{NativeShader, RenderDevice, ResourceId};
use crate::rhi_warn;

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::TessControl => ShaderStageFlags::TESS_CONTROL,
            ShaderStage::TessEvaluation => ShaderStageFlags::TESS_EVALUATION,
            ShaderStage::Pixel => ShaderStageFlags::PIXEL,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of pipeline stages a resource is bound to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 1;
        const PIXEL = 1 << 2;
        const TESS_CONTROL = 1 << 3;
        const TESS_EVALUATION = 1 << 4;
        const COMPUTE = 1 << 5;

        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::PIXEL.bits()
            | Self::TESS_CONTROL.bits()
            | Self::TESS_EVALUATION.bits();
        const ALL = Self::ALL_GRAPHICS.bits() | Self::COMPUTE.bits();
    }
}

impl ShaderStageFlags {
    /// Individual stages contained in the set
    pub fn stages(&self) -> impl Iterator<Item = ShaderStage> + '_ {
        [
            ShaderStage::Vertex,
            ShaderStage::TessControl,
            ShaderStage::TessEvaluation,
            ShaderStage::Pixel,
            ShaderStage::Compute,
        ]
        .into_iter()
        .filter(move |stage| self.contains(stage.flag()))
    }
}

/// Precompiled shader program handed to [`Shader::create`]
pub trait ShaderBytecode {
    fn stage(&self) -> ShaderStage;
    fn bytes(&self) -> &[u8];
}

/// Owned bytecode blob
#[derive(Debug, Clone)]
pub struct ShaderBlob {
    pub stage: ShaderStage,
    pub bytecode: Vec<u8>,
}

impl ShaderBlob {
    pub fn new(stage: ShaderStage, bytecode: impl Into<Vec<u8>>) -> Self {
        Self { stage, bytecode: bytecode.into() }
    }
}

impl ShaderBytecode for ShaderBlob {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn bytes(&self) -> &[u8] {
        &self.bytecode
    }
}

/// Compiled shader for one stage
pub struct Shader {
    id: ResourceId,
    stage: ShaderStage,
    native: Option<Box<dyn NativeShader>>,
}

impl Shader {
    pub fn create(device: &RenderDevice, bytecode: &dyn ShaderBytecode) -> Result<Self> {
        if bytecode.bytes().is_empty() {
            return Err(Error::InvalidResource(format!("Empty {:?} shader bytecode", bytecode.stage())));
        }

        let native = device.backend().create_shader(bytecode.stage(), bytecode.bytes())?;
        Ok(Self {
            id: ResourceId::next(),
            stage: bytecode.stage(),
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_shader(native);
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn native(&self) -> Result<&dyn NativeShader> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Shader used after destroy()".to_string()))
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::Shader", "{:?} shader dropped without destroy(), native object leaked", self.stage);
        }
    }
}
