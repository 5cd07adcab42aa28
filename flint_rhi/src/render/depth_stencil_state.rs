//! Depth-stencil state description and wrapper

use std::hash::{Hash, Hasher};
use crate::error::{Error, Result};
use crate::render::{
    CommandList, ComparisonFunction, DepthStencilStateKey, NativeDepthStencilState, RenderDevice,
    ResourceId, StencilOperation,
};
use crate::rhi_warn;

/// Stencil behavior for one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceDesc {
    pub comparison_function: ComparisonFunction,
    pub pass_operation: StencilOperation,
    pub fail_operation: StencilOperation,
    pub z_fail_operation: StencilOperation,
}

impl Default for StencilFaceDesc {
    fn default() -> Self {
        Self {
            comparison_function: ComparisonFunction::Always,
            pass_operation: StencilOperation::Replace,
            fail_operation: StencilOperation::Keep,
            z_fail_operation: StencilOperation::Keep,
        }
    }
}

/// Depth-stencil state description
///
/// Compared and hashed through [`DepthStencilStateKey`].
#[derive(Debug, Clone, Copy)]
pub struct DepthStencilStateDesc {
    pub enable_depth_test: bool,
    pub enable_stencil_test: bool,
    pub enable_depth_write: bool,
    pub enable_depth_bounds_test: bool,
    pub depth_bounds_min: f32,
    pub depth_bounds_max: f32,
    pub depth_comparison_func: ComparisonFunction,
    pub stencil_ref_value: u8,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front: StencilFaceDesc,
    pub back: StencilFaceDesc,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            enable_depth_test: true,
            enable_stencil_test: false,
            enable_depth_write: true,
            enable_depth_bounds_test: false,
            depth_bounds_min: 0.0,
            depth_bounds_max: 1.0,
            depth_comparison_func: ComparisonFunction::Always,
            stencil_ref_value: 1,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFaceDesc::default(),
            back: StencilFaceDesc::default(),
        }
    }
}

impl DepthStencilStateDesc {
    /// Depth test and write disabled
    pub fn disabled() -> Self {
        Self {
            enable_depth_test: false,
            enable_depth_write: false,
            ..Self::default()
        }
    }

    pub fn state_key(&self) -> DepthStencilStateKey {
        DepthStencilStateKey::from_desc(self)
    }
}

impl PartialEq for DepthStencilStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.state_key() == other.state_key()
    }
}

impl Eq for DepthStencilStateDesc {}

impl Hash for DepthStencilStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state_key().hash(state);
    }
}

/// Depth-stencil state object
pub struct DepthStencilState {
    id: ResourceId,
    desc: DepthStencilStateDesc,
    key: DepthStencilStateKey,
    native: Option<Box<dyn NativeDepthStencilState>>,
}

impl DepthStencilState {
    pub fn create(device: &RenderDevice, desc: DepthStencilStateDesc) -> Result<Self> {
        let native = device.backend().create_depth_stencil_state(&desc)?;
        Ok(Self {
            id: ResourceId::next(),
            key: desc.state_key(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_depth_stencil_state(native);
        }
    }

    pub fn bind(&self, cmd: &mut CommandList) -> Result<()> {
        cmd.bind_depth_stencil_state(self)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &DepthStencilStateDesc {
        &self.desc
    }

    pub fn key(&self) -> DepthStencilStateKey {
        self.key
    }

    pub fn native(&self) -> Result<&dyn NativeDepthStencilState> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Depth-stencil state used after destroy()".to_string()))
    }
}

impl Drop for DepthStencilState {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::DepthStencilState", "Depth-stencil state dropped without destroy(), native object leaked");
        }
    }
}
