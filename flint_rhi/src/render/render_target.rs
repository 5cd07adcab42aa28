//! Render target wrapper

use crate::error::{Error, Result};
use crate::render::texture::{check_initial_data, read_all_subresources};
use crate::render::{
    texels_to_f32, CommandList, NativeTexture, RenderDevice, ResourceId, ShaderStageFlags,
    TextureDescription, TextureDimension,
};
use crate::rhi_warn;

/// Color or depth render target
pub struct RenderTarget {
    id: ResourceId,
    desc: TextureDescription,
    native: Option<Box<dyn NativeTexture>>,
}

impl RenderTarget {
    pub fn create_1d(device: &RenderDevice, desc: TextureDescription, initial_data: Option<&[u8]>) -> Result<Self> {
        Self::create(device, TextureDescription { dimension: TextureDimension::Texture1D, ..desc }, initial_data)
    }

    pub fn create_2d(device: &RenderDevice, desc: TextureDescription, initial_data: Option<&[u8]>) -> Result<Self> {
        Self::create(device, TextureDescription { dimension: TextureDimension::Texture2D, ..desc }, initial_data)
    }

    pub fn create_3d(device: &RenderDevice, desc: TextureDescription, initial_data: Option<&[u8]>) -> Result<Self> {
        Self::create(device, TextureDescription { dimension: TextureDimension::Texture3D, ..desc }, initial_data)
    }

    fn create(device: &RenderDevice, desc: TextureDescription, initial_data: Option<&[u8]>) -> Result<Self> {
        desc.validate()?;
        check_initial_data(&desc, initial_data)?;

        let native = device.backend().create_render_target(&desc, initial_data)?;
        Ok(Self {
            id: ResourceId::next(),
            desc,
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_texture(native);
        }
    }

    /// Bind as a shader resource
    pub fn bind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.bind_shader_texture(self.native()?, index, stages)
    }

    pub fn unbind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.unbind_shader_texture(index, stages)
    }

    /// Raw bytes of every subresource in walk order
    pub fn retrieve_texels_ldr(&self, device: &RenderDevice) -> Result<Vec<u8>> {
        read_all_subresources(device, self.native()?, &self.desc)
    }

    pub fn retrieve_texels_hdr(&self, device: &RenderDevice) -> Result<Vec<f32>> {
        texels_to_f32(self.desc.format, &self.retrieve_texels_ldr(device)?)
    }

    /// Raw bytes of a single (layer, mip)
    pub fn retrieve_layer_texels_ldr(&self, device: &RenderDevice, layer: u32, mip: u32) -> Result<Vec<u8>> {
        if layer >= self.desc.array_size || mip >= self.desc.mip_count {
            return Err(Error::InvalidResource(format!(
                "Subresource (layer {}, mip {}) out of range ({} layers, {} mips)",
                layer, mip, self.desc.array_size, self.desc.mip_count
            )));
        }
        device.backend().read_subresource(self.native()?, layer, mip)
    }

    /// Single (layer, mip) converted to floats
    pub fn retrieve_layer_texels_hdr(&self, device: &RenderDevice, layer: u32, mip: u32) -> Result<Vec<f32>> {
        texels_to_f32(self.desc.format, &self.retrieve_layer_texels_ldr(device, layer, mip)?)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &TextureDescription {
        &self.desc
    }

    pub fn is_depth(&self) -> bool {
        self.desc.format.is_depth()
    }

    pub fn native(&self) -> Result<&dyn NativeTexture> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Render target used after destroy()".to_string()))
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::RenderTarget", "Render target dropped without destroy(), native object leaked");
        }
    }
}
