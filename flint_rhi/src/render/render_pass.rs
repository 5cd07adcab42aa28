//! Render pass descriptions

use crate::render::RenderTarget;

/// What happens to an attachment's contents when the pass begins
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachmentLoad<T> {
    /// Contents are undefined
    DontCare,
    /// Contents are preserved
    Load,
    /// Contents are cleared to the value
    Clear(T),
}

/// Color attachment
#[derive(Clone, Copy)]
pub struct ColorAttachment<'a> {
    pub target: &'a RenderTarget,
    pub load: AttachmentLoad<[f32; 4]>,
}

/// Depth attachment
#[derive(Clone, Copy)]
pub struct DepthAttachment<'a> {
    pub target: &'a RenderTarget,
    pub load: AttachmentLoad<f32>,
}

/// Render pass description
#[derive(Clone, Default)]
pub struct RenderPassDesc<'a> {
    pub color_attachments: Vec<ColorAttachment<'a>>,
    pub depth_attachment: Option<DepthAttachment<'a>>,
    /// Bind a single array layer; `None` binds every layer
    pub layer: Option<u32>,
    pub mip: u32,
}

impl<'a> RenderPassDesc<'a> {
    /// Pass over one color target cleared to `color`
    pub fn single(target: &'a RenderTarget, color: [f32; 4]) -> Self {
        Self {
            color_attachments: vec![ColorAttachment { target, load: AttachmentLoad::Clear(color) }],
            ..Self::default()
        }
    }

    /// Attach a depth target
    pub fn with_depth(mut self, target: &'a RenderTarget, load: AttachmentLoad<f32>) -> Self {
        self.depth_attachment = Some(DepthAttachment { target, load });
        self
    }
}
