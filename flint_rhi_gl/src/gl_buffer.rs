/// Buffer - OpenGL implementation of NativeBuffer
///
/// Linear buffers are GL buffer objects created against the target of their
/// type; texture-backed UAV buffers are immutable-storage textures bound as
/// images. Host updates map the buffer write-only and invalidate it.

use flint_rhi::flint::render::{BufferDesc, BufferShape, BufferType, NativeBuffer};
use flint_rhi::flint::{Error, Result};
use flint_rhi::{rhi_err, rhi_error};
use glow::HasContext;
use std::sync::Arc;

use crate::gl_context::{take_error, GlContext};
use crate::gl_conv::{buffer_usage, describe_format, FormatDesc};

/// Native storage of a buffer
pub(crate) enum GlBufferStorage {
    Linear {
        buffer: glow::Buffer,
        target: u32,
    },
    Image {
        texture: glow::Texture,
        target: u32,
        format: FormatDesc,
        width: u32,
        height: u32,
        depth: u32,
    },
}

/// OpenGL buffer
pub struct GlBuffer {
    ctx: Arc<GlContext>,
    pub(crate) storage: GlBufferStorage,
    pub(crate) desc: BufferDesc,
    pub(crate) size: u64,
}

impl NativeBuffer for GlBuffer {}

impl GlBuffer {
    pub(crate) fn create(ctx: &Arc<GlContext>, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<Self> {
        let usage = buffer_usage(desc.buffer_type).ok_or_else(|| {
            Error::InvalidResource("Unknown buffer type cannot be created".to_string())
        })?;
        let size = desc.byte_width();
        if let Some(data) = initial_data {
            if data.len() as u64 > size {
                return Err(Error::InvalidResource(format!(
                    "Initial data of {} bytes exceeds buffer size ({} bytes)",
                    data.len(),
                    size
                )));
            }
        }

        let gl = ctx.gl()?;
        let storage = match desc.shape {
            BufferShape::Linear { .. } => unsafe {
                let buffer = gl
                    .create_buffer()
                    .map_err(|e| rhi_err!("flint::gl", "Failed to create buffer: {}", e))?;
                gl.bind_buffer(usage.target, Some(buffer));
                gl.buffer_data_size(usage.target, size as i32, usage.usage);
                if let Some(data) = initial_data {
                    gl.buffer_sub_data_u8_slice(usage.target, 0, data);
                }
                gl.bind_buffer(usage.target, None);

                let error = take_error(gl);
                if error != glow::NO_ERROR {
                    gl.delete_buffer(buffer);
                    return Err(if error == glow::OUT_OF_MEMORY {
                        rhi_error!("flint::gl", "Out of memory creating a {} byte buffer", size);
                        Error::OutOfMemory
                    } else {
                        rhi_err!("flint::gl", "glBufferData failed: {:#x}", error)
                    });
                }
                GlBufferStorage::Linear { buffer, target: usage.target }
            },
            BufferShape::Image { width, height, depth, mip_count } => {
                create_image_storage(gl, desc, usage.target, width, height, depth, mip_count.max(1), initial_data)?
            }
        };

        Ok(Self { ctx: ctx.clone(), storage, desc: *desc, size })
    }

    /// Linear buffer handle, `None` for texture-backed buffers
    pub(crate) fn linear(&self) -> Option<glow::Buffer> {
        match self.storage {
            GlBufferStorage::Linear { buffer, .. } => Some(buffer),
            GlBufferStorage::Image { .. } => None,
        }
    }

    /// Replace the buffer contents from the host
    pub(crate) fn update(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "Update of {} bytes exceeds buffer size ({} bytes)",
                data.len(),
                self.size
            )));
        }

        let gl = self.ctx.gl()?;
        match &self.storage {
            GlBufferStorage::Linear { buffer, target } => unsafe {
                gl.bind_buffer(*target, Some(*buffer));
                let invalidate = if data.len() as u64 == self.size {
                    glow::MAP_INVALIDATE_BUFFER_BIT
                } else {
                    glow::MAP_INVALIDATE_RANGE_BIT
                };
                let ptr = gl.map_buffer_range(*target, 0, data.len() as i32, glow::MAP_WRITE_BIT | invalidate);
                if ptr.is_null() {
                    let error = take_error(gl);
                    gl.bind_buffer(*target, None);
                    rhi_error!("flint::gl", "Failed to map buffer (error {:#x})", error);
                    return Err(Error::MappingFailed(format!("glMapBufferRange failed: {:#x}", error)));
                }
                std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
                gl.unmap_buffer(*target);
                gl.bind_buffer(*target, None);
                Ok(())
            },
            GlBufferStorage::Image { texture, target, format, width, height, depth } => {
                if data.len() as u64 != self.size {
                    return Err(Error::InvalidResource(format!(
                        "Texture buffer update must cover the whole image ({} bytes, got {})",
                        self.size,
                        data.len()
                    )));
                }
                upload_image(gl, *texture, *target, *format, (*width, *height, *depth), data)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn create_image_storage(
    gl: &glow::Context,
    desc: &BufferDesc,
    target: u32,
    width: u32,
    height: u32,
    depth: u32,
    mip_count: u32,
    initial_data: Option<&[u8]>,
) -> Result<GlBufferStorage> {
    let format = describe_format(desc.view_format)
        .filter(|format| !format.is_compressed())
        .ok_or_else(|| {
            Error::InvalidResource(format!("{:?} cannot back a texture buffer", desc.view_format))
        })?;
    let (height, depth) = match desc.buffer_type {
        BufferType::UavTexture1D => (1, 1),
        BufferType::UavTexture2D => (height.max(1), 1),
        _ => (height.max(1), depth.max(1)),
    };
    if desc.buffer_type == BufferType::UavTexture1D && initial_data.is_some() {
        return Err(Error::InvalidResource(
            "1D texture buffers cannot be created with initial data on OpenGL".to_string(),
        ));
    }

    unsafe {
        let texture = gl
            .create_texture()
            .map_err(|e| rhi_err!("flint::gl", "Failed to create texture buffer: {}", e))?;
        gl.bind_texture(target, Some(texture));
        match desc.buffer_type {
            BufferType::UavTexture1D => gl.tex_storage_1d(target, mip_count as i32, format.internal, width as i32),
            BufferType::UavTexture2D => {
                gl.tex_storage_2d(target, mip_count as i32, format.internal, width as i32, height as i32)
            }
            _ => gl.tex_storage_3d(target, mip_count as i32, format.internal, width as i32, height as i32, depth as i32),
        }
        gl.bind_texture(target, None);

        let error = take_error(gl);
        if error != glow::NO_ERROR {
            gl.delete_texture(texture);
            return Err(rhi_err!("flint::gl", "Texture buffer storage failed: {:#x}", error));
        }

        if let Some(data) = initial_data {
            if let Err(e) = upload_image(gl, texture, target, format, (width, height, depth), data) {
                gl.delete_texture(texture);
                return Err(e);
            }
        }

        Ok(GlBufferStorage::Image { texture, target, format, width, height, depth })
    }
}

/// Write mip 0 of a texture-backed buffer
fn upload_image(
    gl: &glow::Context,
    texture: glow::Texture,
    target: u32,
    format: FormatDesc,
    (width, height, depth): (u32, u32, u32),
    data: &[u8],
) -> Result<()> {
    unsafe {
        gl.bind_texture(target, Some(texture));
        match target {
            glow::TEXTURE_2D => gl.tex_sub_image_2d(
                target,
                0,
                0,
                0,
                width as i32,
                height as i32,
                format.external,
                format.data_type,
                glow::PixelUnpackData::Slice(data),
            ),
            glow::TEXTURE_3D => gl.tex_sub_image_3d(
                target,
                0,
                0,
                0,
                0,
                width as i32,
                height as i32,
                depth as i32,
                format.external,
                format.data_type,
                glow::PixelUnpackData::Slice(data),
            ),
            _ => {
                gl.bind_texture(target, None);
                return Err(Error::InvalidResource(
                    "1D texture buffers cannot be written from the host on OpenGL".to_string(),
                ));
            }
        }
        gl.bind_texture(target, None);
    }
    Ok(())
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        let Some(gl) = self.ctx.gl_for_drop("Buffer") else {
            return;
        };
        unsafe {
            match self.storage {
                GlBufferStorage::Linear { buffer, .. } => gl.delete_buffer(buffer),
                GlBufferStorage::Image { texture, .. } => gl.delete_texture(texture),
            }
        }
    }
}
