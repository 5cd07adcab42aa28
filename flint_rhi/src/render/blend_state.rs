//! Blend state description and wrapper

use std::hash::{Hash, Hasher};
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{
    BlendOperation, BlendSource, BlendStateKey, CommandList, NativeBlendState, RenderDevice,
    ResourceId,
};
use crate::rhi_warn;

bitflags! {
    /// Color channels written to the render target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGB = Self::R.bits() | Self::G.bits() | Self::B.bits();
        const ALL = Self::RGB.bits() | Self::A.bits();
    }
}

// ===== BLEND STATE DESC =====

/// Blend state description
///
/// Equality and hashing go through [`BlendStateKey`]: two descriptions are
/// equal exactly when they pack to the same key.
#[derive(Debug, Clone, Copy)]
pub struct BlendStateDesc {
    pub write_mask: ColorWriteMask,
    pub enable_blend: bool,
    pub use_separate_alpha: bool,
    pub enable_alpha_to_coverage: bool,
    pub source: BlendSource,
    pub dest: BlendSource,
    pub operation: BlendOperation,
    pub source_alpha: BlendSource,
    pub dest_alpha: BlendSource,
    pub operation_alpha: BlendOperation,
    pub sample_mask: u32,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self {
            write_mask: ColorWriteMask::ALL,
            enable_blend: false,
            use_separate_alpha: false,
            enable_alpha_to_coverage: false,
            source: BlendSource::Zero,
            dest: BlendSource::One,
            operation: BlendOperation::Add,
            source_alpha: BlendSource::Zero,
            dest_alpha: BlendSource::One,
            operation_alpha: BlendOperation::Add,
            sample_mask: !0,
        }
    }
}

impl BlendStateDesc {
    /// Classic `src * a + dst * (1 - a)` blending
    pub fn alpha_blending() -> Self {
        Self {
            enable_blend: true,
            source: BlendSource::SrcAlpha,
            dest: BlendSource::InvSrcAlpha,
            source_alpha: BlendSource::One,
            dest_alpha: BlendSource::InvSrcAlpha,
            ..Self::default()
        }
    }

    /// Additive blending
    pub fn additive() -> Self {
        Self {
            enable_blend: true,
            source: BlendSource::One,
            dest: BlendSource::One,
            source_alpha: BlendSource::One,
            dest_alpha: BlendSource::One,
            ..Self::default()
        }
    }

    /// Packed key of this description
    pub fn state_key(&self) -> BlendStateKey {
        BlendStateKey::from_desc(self)
    }

    /// Color/alpha factors the native blend unit should use
    ///
    /// Without separate alpha the color equation applies to alpha as well.
    pub fn effective_alpha(&self) -> (BlendSource, BlendSource, BlendOperation) {
        if self.use_separate_alpha {
            (self.source_alpha, self.dest_alpha, self.operation_alpha)
        } else {
            (self.source, self.dest, self.operation)
        }
    }
}

impl PartialEq for BlendStateDesc {
    fn eq(&self, other: &Self) -> bool {
        self.state_key() == other.state_key()
    }
}

impl Eq for BlendStateDesc {}

impl Hash for BlendStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state_key().hash(state);
    }
}

// ===== BLEND STATE =====

/// Blend state object
///
/// Description and key are fixed at creation. The native object must be
/// released with [`BlendState::destroy`] while the device is alive.
pub struct BlendState {
    id: ResourceId,
    desc: BlendStateDesc,
    key: BlendStateKey,
    native: Option<Box<dyn NativeBlendState>>,
}

impl BlendState {
    pub fn create(device: &RenderDevice, desc: BlendStateDesc) -> Result<Self> {
        let native = device.backend().create_blend_state(&desc)?;
        Ok(Self {
            id: ResourceId::next(),
            key: desc.state_key(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_blend_state(native);
        }
    }

    /// Bind on `cmd` (skipped if the command list already has this key bound)
    pub fn bind(&self, cmd: &mut CommandList) -> Result<()> {
        cmd.bind_blend_state(self)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &BlendStateDesc {
        &self.desc
    }

    pub fn key(&self) -> BlendStateKey {
        self.key
    }

    pub fn native(&self) -> Result<&dyn NativeBlendState> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Blend state used after destroy()".to_string()))
    }
}

impl Drop for BlendState {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::BlendState", "Blend state dropped without destroy(), native object leaked");
        }
    }
}

#[cfg(test)]
#[path = "blend_state_tests.rs"]
mod tests;
