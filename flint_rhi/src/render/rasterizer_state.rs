//! Rasterizer state description and wrapper

use std::hash::{Hash, Hasher};
use crate::error::{Error, Result};
use crate::render::{
    CommandList, CullMode, FillMode, NativeRasterizerState, RasterizerStateKey, RenderDevice,
    ResourceId,
};
use crate::rhi_warn;

/// Rasterizer state description
///
/// The three bias values are quantized into the key (see
/// [`quantize_unit_float`](crate::render::quantize_unit_float)); descriptions
/// that only differ inside one quantization bucket compare equal.
#[derive(Debug, Clone, Copy)]
pub struct RasterizerStateDesc {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub depth_bias: f32,
    pub slope_scale: f32,
    pub depth_bias_clamp: f32,
    /// Counter-clockwise triangles are front facing
    pub use_triangle_ccw: bool,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::None,
            fill_mode: FillMode::Solid,
            depth_bias: 0.0,
            slope_scale: 0.0,
            depth_bias_clamp: 0.0,
            use_triangle_ccw: true,
        }
    }
}

impl RasterizerStateDesc {
    pub fn state_key(&self) -> RasterizerStateKey {
        RasterizerStateKey::from_desc(self)
    }
}

impl PartialEq for RasterizerStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.state_key() == other.state_key()
    }
}

impl Eq for RasterizerStateDesc {}

impl Hash for RasterizerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state_key().hash(state);
    }
}

/// Rasterizer state object
pub struct RasterizerState {
    id: ResourceId,
    desc: RasterizerStateDesc,
    key: RasterizerStateKey,
    native: Option<Box<dyn NativeRasterizerState>>,
}

impl RasterizerState {
    pub fn create(device: &RenderDevice, desc: RasterizerStateDesc) -> Result<Self> {
        let native = device.backend().create_rasterizer_state(&desc)?;
        Ok(Self {
            id: ResourceId::next(),
            key: desc.state_key(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_rasterizer_state(native);
        }
    }

    pub fn bind(&self, cmd: &mut CommandList) -> Result<()> {
        cmd.bind_rasterizer_state(self)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &RasterizerStateDesc {
        &self.desc
    }

    pub fn key(&self) -> RasterizerStateKey {
        self.key
    }

    pub fn native(&self) -> Result<&dyn NativeRasterizerState> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Rasterizer state used after destroy()".to_string()))
    }
}

impl Drop for RasterizerState {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::RasterizerState", "Rasterizer state dropped without destroy(), native object leaked");
        }
    }
}
