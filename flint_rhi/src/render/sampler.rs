//! Texture sampler description and wrapper

use crate::error::{Error, Result};
use crate::render::{CommandList, ComparisonFunction, NativeSampler, RenderDevice, ResourceId, ShaderStageFlags};
use crate::rhi_warn;

/// Texture coordinate addressing outside `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerAddress {
    Wrap,
    Mirror,
    ClampEdge,
    ClampBorder,
    MirrorOnce,
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Point,
    Bilinear,
    Trilinear,
    Anisotropic8,
    Anisotropic16,
    ComparisonPoint,
    ComparisonBilinear,
    ComparisonTrilinear,
    ComparisonAnisotropic8,
    ComparisonAnisotropic16,
}

impl SamplerFilter {
    /// Filter compares against a reference value (shadow sampling)
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            SamplerFilter::ComparisonPoint
                | SamplerFilter::ComparisonBilinear
                | SamplerFilter::ComparisonTrilinear
                | SamplerFilter::ComparisonAnisotropic8
                | SamplerFilter::ComparisonAnisotropic16
        )
    }

    /// Maximum anisotropy, `None` when anisotropic filtering is off
    pub fn anisotropy(&self) -> Option<u32> {
        match self {
            SamplerFilter::Anisotropic8 | SamplerFilter::ComparisonAnisotropic8 => Some(8),
            SamplerFilter::Anisotropic16 | SamplerFilter::ComparisonAnisotropic16 => Some(16),
            _ => None,
        }
    }

    pub fn is_min_linear(&self) -> bool {
        !matches!(self, SamplerFilter::Point | SamplerFilter::ComparisonPoint)
    }

    pub fn is_mag_linear(&self) -> bool {
        self.is_min_linear()
    }

    pub fn is_mip_linear(&self) -> bool {
        !matches!(
            self,
            SamplerFilter::Point
                | SamplerFilter::Bilinear
                | SamplerFilter::ComparisonPoint
                | SamplerFilter::ComparisonBilinear
        )
    }
}

/// Sampler description
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub address_u: SamplerAddress,
    pub address_v: SamplerAddress,
    pub address_w: SamplerAddress,
    pub filter: SamplerFilter,
    pub comparison_function: ComparisonFunction,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            address_u: SamplerAddress::Wrap,
            address_v: SamplerAddress::Wrap,
            address_w: SamplerAddress::Wrap,
            filter: SamplerFilter::Bilinear,
            comparison_function: ComparisonFunction::Always,
            border_color: [0.0; 4],
            min_lod: 0.0,
            max_lod: 1000.0,
            lod_bias: 0.0,
        }
    }
}

/// Sampler object
pub struct Sampler {
    id: ResourceId,
    desc: SamplerDesc,
    native: Option<Box<dyn NativeSampler>>,
}

impl Sampler {
    pub fn create(device: &RenderDevice, desc: SamplerDesc) -> Result<Self> {
        if desc.min_lod > desc.max_lod {
            return Err(Error::InvalidResource(format!(
                "Sampler min LOD ({}) is greater than max LOD ({})",
                desc.min_lod, desc.max_lod
            )));
        }

        let native = device.backend().create_sampler(&desc)?;
        Ok(Self {
            id: ResourceId::next(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_sampler(native);
        }
    }

    pub fn bind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.bind_sampler(self, index, stages)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    pub fn native(&self) -> Result<&dyn NativeSampler> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Sampler used after destroy()".to_string()))
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::Sampler", "Sampler dropped without destroy(), native object leaked");
        }
    }
}
