/// Texture - OpenGL implementation of NativeTexture
///
/// Textures use immutable storage (`glTexStorage*`) sized from the
/// description. Render targets additionally pre-compute one attachment per
/// (layer, mip), so binding never has to inspect the texture shape again.
/// Readback goes through a transient read framebuffer, one depth slice at a
/// time.

use flint_rhi::flint::render::{
    subresource_layouts, total_byte_size, ImageFormat, NativeTexture, ResourceId,
    SubresourceLayout, SubresourceViewTable, TextureDescription, TextureDimension, TextureFlags,
    ViewKind,
};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_err, rhi_warn};
use glow::HasContext;
use std::sync::{Arc, Mutex};

use crate::gl_context::{take_error, GlContext};
use crate::gl_conv::{attachment_point, cube_face_target, describe_format, is_layered_target, texture_target, FormatDesc};

// ===== ATTACHMENTS =====

/// How one subresource (or a whole level) attaches to a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttachmentSource {
    /// Whole level of a non-layered texture
    Level { texture: glow::Texture, target: u32, level: i32 },
    /// Every layer of a level (layered rendering)
    Layered { texture: glow::Texture, level: i32 },
    /// One array layer or depth slice
    Layer { texture: glow::Texture, level: i32, layer: i32 },
    /// One face of a cube map
    Face { texture: glow::Texture, face_target: u32, level: i32 },
}

/// Attach `source` at `point` of the framebuffer bound to `fbo_target`
pub(crate) unsafe fn attach(gl: &glow::Context, fbo_target: u32, point: u32, source: AttachmentSource) {
    match source {
        AttachmentSource::Level { texture, target, level } => {
            gl.framebuffer_texture_2d(fbo_target, point, target, Some(texture), level)
        }
        AttachmentSource::Layered { texture, level } => {
            gl.framebuffer_texture(fbo_target, point, Some(texture), level)
        }
        AttachmentSource::Layer { texture, level, layer } => {
            gl.framebuffer_texture_layer(fbo_target, point, Some(texture), level, layer)
        }
        AttachmentSource::Face { texture, face_target, level } => {
            gl.framebuffer_texture_2d(fbo_target, point, face_target, Some(texture), level)
        }
    }
}

// ===== DEPTH-STENCIL PACKING =====

/// D24S8 texels from flint order (depth low, stencil high) to GL order
pub(crate) fn d24s8_to_gl(bytes: &mut [u8]) {
    for texel in bytes.chunks_exact_mut(4) {
        let value = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
        texel.copy_from_slice(&value.rotate_left(8).to_le_bytes());
    }
}

/// Inverse of [`d24s8_to_gl`]
pub(crate) fn d24s8_from_gl(bytes: &mut [u8]) {
    for texel in bytes.chunks_exact_mut(4) {
        let value = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
        texel.copy_from_slice(&value.rotate_right(8).to_le_bytes());
    }
}

// ===== TEXTURE =====

/// OpenGL texture / render target
pub struct GlTexture {
    ctx: Arc<GlContext>,
    /// Identity used to key framebuffer caches (GL names are recycled)
    pub(crate) id: ResourceId,
    pub(crate) texture: glow::Texture,
    pub(crate) target: u32,
    pub(crate) desc: TextureDescription,
    pub(crate) format: FormatDesc,
    /// Single-layer attachment per (layer, mip), render targets only
    attachments: Option<SubresourceViewTable<AttachmentSource>>,
    debug_name: Mutex<String>,
}

impl NativeTexture for GlTexture {}

impl GlTexture {
    /// Create a sampled texture, or a render target when `render_target` is set
    pub(crate) fn create(
        ctx: &Arc<GlContext>,
        desc: &TextureDescription,
        initial_data: Option<&[u8]>,
        render_target: bool,
    ) -> Result<Self> {
        desc.validate()?;
        if matches!(desc.dimension, TextureDimension::Unknown | TextureDimension::Buffer) {
            return Err(Error::InvalidResource(format!("{:?} textures are not images", desc.dimension)));
        }
        let format = describe_format(desc.format)
            .ok_or_else(|| Error::InvalidResource("Texture format is Unknown".to_string()))?;

        let kind = desc.view_kind();
        if kind == ViewKind::MultisampledArray {
            return Err(Error::InvalidResource(
                "Multisampled texture arrays are not supported by the OpenGL backend".to_string(),
            ));
        }
        if format.is_compressed() && (render_target || desc.dimension == TextureDimension::Texture1D) {
            return Err(Error::InvalidResource(format!(
                "{:?} cannot be used for a 1D texture or a render target",
                desc.format
            )));
        }
        let multisampled = kind == ViewKind::Multisampled;
        if multisampled && initial_data.is_some() {
            return Err(Error::InvalidResource("Multisampled textures cannot take initial data".to_string()));
        }
        if let Some(data) = initial_data {
            let expected = total_byte_size(desc);
            if data.len() as u64 != expected {
                return Err(Error::InvalidResource(format!(
                    "Texture initial data is {} bytes, expected {}",
                    data.len(),
                    expected
                )));
            }
        }

        let target = texture_target(kind);
        let gl = ctx.gl()?;
        let texture = unsafe {
            let texture = gl
                .create_texture()
                .map_err(|e| rhi_err!("flint::gl", "Failed to create texture: {}", e))?;
            gl.bind_texture(target, Some(texture));
            allocate_storage(gl, target, desc, format);
            if !multisampled {
                gl.tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, desc.mip_count as i32 - 1);
            }
            gl.bind_texture(target, None);

            let error = take_error(gl);
            if error != glow::NO_ERROR {
                gl.delete_texture(texture);
                if error == glow::OUT_OF_MEMORY {
                    return Err(Error::OutOfMemory);
                }
                return Err(rhi_err!(
                    "flint::gl",
                    "Texture storage for {:?} {}x{}x{} failed: {:#x}",
                    desc.format,
                    desc.width,
                    desc.height,
                    desc.depth,
                    error
                ));
            }
            texture
        };

        let mut result = Self {
            ctx: ctx.clone(),
            id: ResourceId::next(),
            texture,
            target,
            desc: *desc,
            format,
            attachments: None,
            debug_name: Mutex::new(String::new()),
        };

        if let Some(data) = initial_data {
            result.upload(gl, data)?;
        }
        if desc.flags.contains(TextureFlags::HARDWARE_MIP_GEN) && desc.mip_count > 1 && !multisampled {
            unsafe {
                gl.bind_texture(target, Some(texture));
                gl.generate_mipmap(target);
                gl.bind_texture(target, None);
            }
        }

        if render_target {
            let table = SubresourceViewTable::build(result.layer_count(), desc.mip_count, |layer, mip| {
                Ok(result.subresource_attachment(layer, mip))
            })?;
            result.attachments = Some(table);
        }
        Ok(result)
    }

    /// Layers addressable by a single-layer binding (depth slices for 3D)
    pub(crate) fn layer_count(&self) -> u32 {
        match self.desc.dimension {
            TextureDimension::Texture3D => self.desc.depth,
            _ => self.desc.array_size,
        }
    }

    pub(crate) fn is_render_target(&self) -> bool {
        self.attachments.is_some()
    }

    /// Attachment of one layer (or depth slice) of mip `mip`
    fn subresource_attachment(&self, layer: u32, mip: u32) -> AttachmentSource {
        let level = mip as i32;
        match self.target {
            glow::TEXTURE_CUBE_MAP => AttachmentSource::Face {
                texture: self.texture,
                face_target: cube_face_target(layer),
                level,
            },
            target if is_layered_target(target) => AttachmentSource::Layer {
                texture: self.texture,
                level,
                layer: layer as i32,
            },
            target => AttachmentSource::Level { texture: self.texture, target, level },
        }
    }

    /// Attachment for binding `layer` of `mip` (`None` layer: every layer)
    pub(crate) fn attachment(&self, layer: Option<u32>, mip: u32) -> Option<AttachmentSource> {
        let table = self.attachments.as_ref()?;
        match layer {
            Some(layer) => table.get(layer, mip).copied(),
            None if mip >= table.mip_count() => None,
            None if is_layered_target(self.target) || self.target == glow::TEXTURE_CUBE_MAP => {
                Some(AttachmentSource::Layered { texture: self.texture, level: mip as i32 })
            }
            None => Some(AttachmentSource::Level { texture: self.texture, target: self.target, level: mip as i32 }),
        }
    }

    pub(crate) fn attachment_point(&self, color_index: u32) -> u32 {
        attachment_point(self.desc.format, color_index)
    }

    fn upload(&self, gl: &glow::Context, data: &[u8]) -> Result<()> {
        let converted;
        let data = if self.desc.format == ImageFormat::D24UnormS8Uint {
            let mut bytes = data.to_vec();
            d24s8_to_gl(&mut bytes);
            converted = bytes;
            &converted[..]
        } else {
            data
        };

        unsafe {
            gl.bind_texture(self.target, Some(self.texture));
            for layout in subresource_layouts(&self.desc) {
                let start = layout.offset as usize;
                let bytes = &data[start..start + layout.size as usize];
                self.upload_subresource(gl, &layout, bytes);
            }
            gl.bind_texture(self.target, None);
        }

        let error = take_error(gl);
        if error != glow::NO_ERROR {
            return Err(rhi_err!("flint::gl", "Texture upload failed: {:#x}", error));
        }
        Ok(())
    }

    unsafe fn upload_subresource(&self, gl: &glow::Context, layout: &SubresourceLayout, bytes: &[u8]) {
        let level = layout.mip as i32;
        let (w, h, d) = (layout.width as i32, layout.height as i32, layout.depth as i32);
        let f = self.format;

        if f.is_compressed() {
            let data = glow::CompressedPixelUnpackData::Slice(bytes);
            match self.target {
                glow::TEXTURE_2D => gl.compressed_tex_sub_image_2d(self.target, level, 0, 0, w, h, f.internal, data),
                glow::TEXTURE_CUBE_MAP => gl.compressed_tex_sub_image_2d(
                    cube_face_target(layout.layer),
                    level,
                    0,
                    0,
                    w,
                    h,
                    f.internal,
                    data,
                ),
                glow::TEXTURE_3D => gl.compressed_tex_sub_image_3d(self.target, level, 0, 0, 0, w, h, d, f.internal, data),
                _ => gl.compressed_tex_sub_image_3d(
                    self.target,
                    level,
                    0,
                    0,
                    layout.layer as i32,
                    w,
                    h,
                    1,
                    f.internal,
                    data,
                ),
            }
            return;
        }

        let data = glow::PixelUnpackData::Slice(bytes);
        match self.target {
            glow::TEXTURE_1D_ARRAY => gl.tex_sub_image_2d(
                self.target,
                level,
                0,
                layout.layer as i32,
                w,
                1,
                f.external,
                f.data_type,
                data,
            ),
            glow::TEXTURE_2D => gl.tex_sub_image_2d(self.target, level, 0, 0, w, h, f.external, f.data_type, data),
            glow::TEXTURE_CUBE_MAP => gl.tex_sub_image_2d(
                cube_face_target(layout.layer),
                level,
                0,
                0,
                w,
                h,
                f.external,
                f.data_type,
                data,
            ),
            glow::TEXTURE_3D => gl.tex_sub_image_3d(self.target, level, 0, 0, 0, w, h, d, f.external, f.data_type, data),
            _ => gl.tex_sub_image_3d(
                self.target,
                level,
                0,
                0,
                layout.layer as i32,
                w,
                h,
                1,
                f.external,
                f.data_type,
                data,
            ),
        }
    }

    /// Read one subresource back, tightly packed
    pub(crate) fn read_subresource(&self, layer: u32, mip: u32) -> Result<Vec<u8>> {
        if self.format.is_compressed() {
            return Err(Error::InvalidResource(format!("Cannot read back {:?} texels", self.desc.format)));
        }
        if self.desc.sampler_count > 1 {
            return Err(Error::InvalidResource("Cannot read back a multisampled texture".to_string()));
        }
        let layout = subresource_layouts(&self.desc)
            .into_iter()
            .find(|layout| layout.layer == layer && layout.mip == mip)
            .ok_or_else(|| {
                Error::InvalidResource(format!("Subresource (layer {}, mip {}) out of range", layer, mip))
            })?;

        let gl = self.ctx.gl()?;
        let mut bytes = vec![0u8; layout.size as usize];
        let point = self.attachment_point(0);
        let is_color = point == glow::COLOR_ATTACHMENT0;

        unsafe {
            let fbo = gl
                .create_framebuffer()
                .map_err(|e| rhi_err!("flint::gl", "Failed to create readback framebuffer: {}", e))?;
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(fbo));
            gl.read_buffer(if is_color { glow::COLOR_ATTACHMENT0 } else { glow::NONE });

            let mut result = Ok(());
            for (slice, chunk) in bytes.chunks_mut(layout.slice_pitch as usize).enumerate() {
                let source = match self.desc.dimension {
                    TextureDimension::Texture3D => AttachmentSource::Layer {
                        texture: self.texture,
                        level: mip as i32,
                        layer: slice as i32,
                    },
                    _ => self.subresource_attachment(layer, mip),
                };
                attach(gl, glow::READ_FRAMEBUFFER, point, source);

                let status = gl.check_framebuffer_status(glow::READ_FRAMEBUFFER);
                if status != glow::FRAMEBUFFER_COMPLETE {
                    result = Err(Error::IncompleteFramebuffer(format!(
                        "Readback framebuffer incomplete: {:#x}",
                        status
                    )));
                    break;
                }
                gl.read_pixels(
                    0,
                    0,
                    layout.width as i32,
                    layout.height as i32,
                    self.format.external,
                    self.format.data_type,
                    glow::PixelPackData::Slice(chunk),
                );
            }

            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.delete_framebuffer(fbo);
            result?;
        }

        let error = take_error(gl);
        if error != glow::NO_ERROR {
            return Err(rhi_err!("flint::gl", "Texture readback failed: {:#x}", error));
        }
        if self.desc.format == ImageFormat::D24UnormS8Uint {
            d24s8_from_gl(&mut bytes);
        }
        Ok(bytes)
    }

    pub(crate) fn set_debug_name(&self, name: &str) {
        if let Ok(mut debug_name) = self.debug_name.lock() {
            *debug_name = name.to_string();
        }
        match self.ctx.gl() {
            Ok(gl) => unsafe { gl.object_label(glow::TEXTURE, self.texture.0.get(), Some(name)) },
            Err(e) => rhi_warn!("flint::gl", "Cannot label texture '{}': {}", name, e),
        }
    }

    pub fn debug_name(&self) -> String {
        self.debug_name.lock().map(|name| name.clone()).unwrap_or_default()
    }
}

/// Immutable storage for every target a texture can have
unsafe fn allocate_storage(gl: &glow::Context, target: u32, desc: &TextureDescription, format: FormatDesc) {
    let levels = desc.mip_count as i32;
    let (w, h) = (desc.width as i32, desc.height as i32);
    match target {
        glow::TEXTURE_1D_ARRAY => gl.tex_storage_2d(target, levels, format.internal, w, desc.array_size as i32),
        glow::TEXTURE_2D | glow::TEXTURE_CUBE_MAP => gl.tex_storage_2d(target, levels, format.internal, w, h),
        glow::TEXTURE_2D_MULTISAMPLE => gl.tex_storage_2d_multisample(
            target,
            desc.sampler_count as i32,
            format.internal,
            w,
            h,
            desc.flags.contains(TextureFlags::MULTISAMPLE_PATTERN),
        ),
        glow::TEXTURE_3D => gl.tex_storage_3d(target, levels, format.internal, w, h, desc.depth as i32),
        _ => gl.tex_storage_3d(target, levels, format.internal, w, h, desc.array_size as i32),
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        if let Some(gl) = self.ctx.gl_for_drop("Texture") {
            unsafe { gl.delete_texture(self.texture) };
        }
    }
}

#[cfg(test)]
#[path = "gl_texture_tests.rs"]
mod tests;
