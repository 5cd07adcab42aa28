//! Texture description, subresource layout and texture wrapper

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::render::{ChannelEncoding, CommandList, ImageFormat, NativeTexture, RenderDevice, ResourceId, ShaderStageFlags};
use crate::rhi_warn;

// ===== DESCRIPTION =====

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

bitflags! {
    /// Texture creation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        /// Array layers are cube faces (`array_size` counts faces)
        const CUBE_MAP = 1 << 0;
        /// Typeless storage viewed as depth and as shader resource
        const DEPTH_RESOURCE = 1 << 1;
        /// Mips are generated by the GPU
        const HARDWARE_MIP_GEN = 1 << 2;
        /// Standard multisample pattern
        const MULTISAMPLE_PATTERN = 1 << 3;
        /// Host may write the texture after creation
        const ALLOW_CPU_WRITE = 1 << 4;
    }
}

/// Texture description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescription {
    pub dimension: TextureDimension,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Array layers (faces for cube maps)
    pub array_size: u32,
    pub mip_count: u32,
    /// MSAA sample count
    pub sampler_count: u32,
    pub flags: TextureFlags,
}

impl Default for TextureDescription {
    fn default() -> Self {
        Self {
            dimension: TextureDimension::Unknown,
            format: ImageFormat::Unknown,
            width: 0,
            height: 0,
            depth: 1,
            array_size: 1,
            mip_count: 1,
            sampler_count: 1,
            flags: TextureFlags::empty(),
        }
    }
}

/// Number of mips down to 1x1 along the smaller axis
pub fn compute_mip_count(width: u32, height: u32) -> u32 {
    let (mut w, mut h, mut count) = (width, height, 0);
    while w > 0 && h > 0 {
        count += 1;
        w >>= 1;
        h >>= 1;
    }
    count
}

impl TextureDescription {
    /// Single-mip 2D texture
    pub fn texture_2d(format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            dimension: TextureDimension::Texture2D,
            format,
            width,
            height,
            ..Self::default()
        }
    }

    /// Check the counts a native backend relies on
    pub fn validate(&self) -> Result<()> {
        if self.dimension == TextureDimension::Unknown {
            return Ok(());
        }
        if self.format == ImageFormat::Unknown {
            return Err(Error::InvalidResource("Texture format is Unknown".to_string()));
        }

        let counts = [
            ("width", self.width),
            ("height", self.height),
            ("depth", self.depth),
            ("mip count", self.mip_count),
            ("array size", self.array_size),
            ("sampler count", self.sampler_count),
        ];
        for (name, value) in counts {
            if value < 1 {
                return Err(Error::InvalidResource(format!("Texture {} must be >= 1 (got {})", name, value)));
            }
        }

        let largest = self.width.max(self.height).max(self.depth);
        let full_chain = compute_mip_count(largest, largest);
        if self.mip_count > full_chain {
            return Err(Error::InvalidResource(format!(
                "Texture mip count {} exceeds the full chain of {} for {}x{}x{}",
                self.mip_count, full_chain, self.width, self.height, self.depth
            )));
        }

        if self.flags.contains(TextureFlags::CUBE_MAP) && self.array_size % 6 != 0 {
            return Err(Error::InvalidResource(format!(
                "Cube map array size must be a multiple of 6 (got {})",
                self.array_size
            )));
        }
        Ok(())
    }

    /// Shader view shape of this texture
    pub fn view_kind(&self) -> ViewKind {
        match self.dimension {
            TextureDimension::Texture1D if self.array_size > 1 => ViewKind::Texture1DArray,
            TextureDimension::Texture1D => ViewKind::Texture1D,
            TextureDimension::Texture3D => ViewKind::Texture3D,
            _ => {
                if self.sampler_count > 1 {
                    if self.array_size > 1 { ViewKind::MultisampledArray } else { ViewKind::Multisampled }
                } else if self.flags.contains(TextureFlags::CUBE_MAP) {
                    if self.array_size > 6 { ViewKind::CubeArray } else { ViewKind::Cube }
                } else if self.array_size > 1 {
                    ViewKind::Texture2DArray
                } else {
                    ViewKind::Texture2D
                }
            }
        }
    }

    /// Size of mip `mip` (halved per level, floor, minimum 1)
    pub fn mip_extent(&self, mip: u32) -> (u32, u32, u32) {
        let halve = |extent: u32| extent.checked_shr(mip).unwrap_or(0).max(1);
        (halve(self.width), halve(self.height), halve(self.depth))
    }
}

/// Shader view shape, decided once for every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Cube,
    CubeArray,
    Multisampled,
    MultisampledArray,
    Texture3D,
}

// ===== SUBRESOURCE WALK =====

/// Placement of one (layer, mip) in a texture payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceLayout {
    pub layer: u32,
    pub mip: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Bytes per row (per block row for compressed formats)
    pub row_pitch: u64,
    /// Rows (block rows for compressed formats)
    pub num_rows: u32,
    /// Bytes per depth slice
    pub slice_pitch: u64,
    /// Offset from the payload start
    pub offset: u64,
    pub size: u64,
}

/// Layout of every subresource of `desc`, arrays outer, mips inner
pub fn subresource_layouts(desc: &TextureDescription) -> Vec<SubresourceLayout> {
    let mut layouts = Vec::with_capacity((desc.array_size * desc.mip_count) as usize);
    let mut offset = 0u64;

    for layer in 0..desc.array_size {
        for mip in 0..desc.mip_count {
            let (width, height, depth) = desc.mip_extent(mip);

            // 64-bit: a 16384x16384 Rgba32Float slice is 4 GiB
            let (row_pitch, num_rows) = match desc.format.block_size_bytes() {
                Some(block_bytes) => (width.div_ceil(4).max(1) as u64 * block_bytes as u64, height.div_ceil(4).max(1)),
                None => ((width as u64 * desc.format.bits_per_pixel() as u64).div_ceil(8), height),
            };
            let slice_pitch = row_pitch * num_rows as u64;
            let size = slice_pitch * depth as u64;

            layouts.push(SubresourceLayout {
                layer,
                mip,
                width,
                height,
                depth,
                row_pitch,
                num_rows,
                slice_pitch,
                offset,
                size,
            });
            offset += size;
        }
    }

    layouts
}

/// Size of a complete texture payload
pub fn total_byte_size(desc: &TextureDescription) -> u64 {
    subresource_layouts(desc).iter().map(|layout| layout.size).sum()
}

/// Flat subresource index (D3D11 `D3D11CalcSubresource` order)
pub fn subresource_index(layer: u32, mip: u32, mip_count: u32) -> u32 {
    layer * mip_count + mip
}

// ===== TEXEL CONVERSION =====

fn f16_to_f32(bits: u16) -> f32 {
    let negative = bits & 0x8000 != 0;
    let exponent = ((bits >> 10) & 0x1F) as u32;
    let mantissa = (bits & 0x3FF) as u32;

    let magnitude = match exponent {
        0 => mantissa as f32 * 2f32.powi(-24),
        0x1F if mantissa == 0 => f32::INFINITY,
        0x1F => f32::NAN,
        _ => f32::from_bits(((exponent + 112) << 23) | (mantissa << 13)),
    };

    if negative { -magnitude } else { magnitude }
}

/// Convert raw texel bytes to one float per channel
///
/// Normalized formats map to `[0, 1]` / `[-1, 1]`, integer formats are cast.
///
/// # Errors
///
/// `Error::InvalidResource` for block-compressed and most packed formats.
pub fn texels_to_f32(format: ImageFormat, bytes: &[u8]) -> Result<Vec<f32>> {
    let unsupported = || Error::InvalidResource(format!("Cannot convert {:?} texels to floats", format));

    let texels = match format.channel_encoding() {
        ChannelEncoding::Unorm8 => bytes.iter().map(|&b| b as f32 / 255.0).collect(),
        ChannelEncoding::Snorm8 => bytes.iter().map(|&b| (b as i8 as f32 / 127.0).max(-1.0)).collect(),
        ChannelEncoding::Uint8 => bytes.iter().map(|&b| b as f32).collect(),
        ChannelEncoding::Sint8 => bytes.iter().map(|&b| b as i8 as f32).collect(),
        ChannelEncoding::Unorm16 => bytemuck::pod_collect_to_vec::<u8, u16>(bytes)
            .into_iter()
            .map(|v| v as f32 / 65535.0)
            .collect(),
        ChannelEncoding::Snorm16 => bytemuck::pod_collect_to_vec::<u8, i16>(bytes)
            .into_iter()
            .map(|v| (v as f32 / 32767.0).max(-1.0))
            .collect(),
        ChannelEncoding::Uint16 => bytemuck::pod_collect_to_vec::<u8, u16>(bytes).into_iter().map(|v| v as f32).collect(),
        ChannelEncoding::Sint16 => bytemuck::pod_collect_to_vec::<u8, i16>(bytes).into_iter().map(|v| v as f32).collect(),
        ChannelEncoding::Float16 => bytemuck::pod_collect_to_vec::<u8, u16>(bytes).into_iter().map(f16_to_f32).collect(),
        ChannelEncoding::Uint32 => bytemuck::pod_collect_to_vec::<u8, u32>(bytes).into_iter().map(|v| v as f32).collect(),
        ChannelEncoding::Sint32 => bytemuck::pod_collect_to_vec::<u8, i32>(bytes).into_iter().map(|v| v as f32).collect(),
        ChannelEncoding::Float32 => bytemuck::pod_collect_to_vec::<u8, f32>(bytes),
        ChannelEncoding::Packed if format == ImageFormat::Rgb10A2Unorm => {
            bytemuck::pod_collect_to_vec::<u8, u32>(bytes)
                .into_iter()
                .flat_map(|v| {
                    [
                        (v & 0x3FF) as f32 / 1023.0,
                        ((v >> 10) & 0x3FF) as f32 / 1023.0,
                        ((v >> 20) & 0x3FF) as f32 / 1023.0,
                        (v >> 30) as f32 / 3.0,
                    ]
                })
                .collect()
        }
        ChannelEncoding::Packed | ChannelEncoding::Block => return Err(unsupported()),
    };

    Ok(texels)
}

// ===== SUBRESOURCE VIEW TABLE =====

/// Per (layer, mip) native views, built once at creation
///
/// Render targets look their views up here on every bind; nothing is created
/// on the bind path.
#[derive(Debug)]
pub struct SubresourceViewTable<V> {
    views: Vec<V>,
    array_size: u32,
    mip_count: u32,
}

impl<V> SubresourceViewTable<V> {
    /// Build the table, calling `create(layer, mip)` for every subresource
    pub fn build(
        array_size: u32,
        mip_count: u32,
        mut create: impl FnMut(u32, u32) -> Result<V>,
    ) -> Result<Self> {
        let mut views = Vec::with_capacity((array_size * mip_count) as usize);
        for layer in 0..array_size {
            for mip in 0..mip_count {
                views.push(create(layer, mip)?);
            }
        }
        Ok(Self { views, array_size, mip_count })
    }

    pub fn get(&self, layer: u32, mip: u32) -> Option<&V> {
        if layer >= self.array_size || mip >= self.mip_count {
            return None;
        }
        self.views.get(subresource_index(layer, mip, self.mip_count) as usize)
    }

    pub fn array_size(&self) -> u32 {
        self.array_size
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.views.iter()
    }

    /// Consume the table (for native destruction)
    pub fn into_views(self) -> Vec<V> {
        self.views
    }
}

// ===== TEXTURE =====

pub(crate) fn check_initial_data(desc: &TextureDescription, initial_data: Option<&[u8]>) -> Result<()> {
    if let Some(data) = initial_data {
        let expected = total_byte_size(desc);
        if data.len() as u64 != expected {
            return Err(Error::InvalidResource(format!(
                "Texture initial data is {} bytes, layout expects {}",
                data.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Read every subresource back in walk order
pub(crate) fn read_all_subresources(
    device: &RenderDevice,
    native: &dyn NativeTexture,
    desc: &TextureDescription,
) -> Result<Vec<u8>> {
    let mut texels = Vec::with_capacity(total_byte_size(desc) as usize);
    for layout in subresource_layouts(desc) {
        texels.extend(device.backend().read_subresource(native, layout.layer, layout.mip)?);
    }
    Ok(texels)
}

/// Sampled texture
pub struct Texture {
    id: ResourceId,
    desc: TextureDescription,
    name: String,
    native: Option<Box<dyn NativeTexture>>,
}

impl Texture {
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

        let native = device.backend().create_texture(&desc, initial_data)?;
        Ok(Self {
            id: ResourceId::next(),
            desc,
            name: String::new(),
            native: Some(native),
        })
    }

    pub fn destroy(&mut self, device: &RenderDevice) {
        if let Some(native) = self.native.take() {
            device.backend().destroy_texture(native);
        }
    }

    pub fn bind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.bind_shader_texture(self.native()?, index, stages)
    }

    pub fn unbind(&self, cmd: &mut CommandList, index: u32, stages: ShaderStageFlags) -> Result<()> {
        cmd.unbind_shader_texture(index, stages)
    }

    /// Attach a debug name visible in graphics debuggers
    pub fn set_resource_name(&mut self, device: &RenderDevice, name: &str) -> Result<()> {
        device.backend().set_debug_name(self.native()?, name);
        self.name = name.to_string();
        Ok(())
    }

    pub fn resource_name(&self) -> &str {
        &self.name
    }

    /// Raw bytes of every subresource, laid out like the upload payload
    pub fn retrieve_texels_ldr(&self, device: &RenderDevice) -> Result<Vec<u8>> {
        read_all_subresources(device, self.native()?, &self.desc)
    }

    /// Every subresource converted to floats
    pub fn retrieve_texels_hdr(&self, device: &RenderDevice) -> Result<Vec<f32>> {
        texels_to_f32(self.desc.format, &self.retrieve_texels_ldr(device)?)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &TextureDescription {
        &self.desc
    }

    pub fn native(&self) -> Result<&dyn NativeTexture> {
        self.native
            .as_deref()
            .ok_or_else(|| Error::InvalidResource("Texture used after destroy()".to_string()))
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if self.native.is_some() {
            rhi_warn!("flint::Texture", "Texture '{}' dropped without destroy(), native object leaked", self.name);
        }
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
