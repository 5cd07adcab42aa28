//! Canonical image format shared by every backend

/// Storage encoding of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEncoding {
    Unorm8,
    Snorm8,
    Uint8,
    Sint8,
    Unorm16,
    Snorm16,
    Uint16,
    Sint16,
    Float16,
    Uint32,
    Sint32,
    Float32,
    /// Bit-packed formats (10:10:10:2, 11:11:10, depth-stencil)
    Packed,
    /// Block-compressed formats
    Block,
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Unknown,

    Rgba32Float,
    Rgba32Uint,
    Rgba32Sint,
    Rgb32Float,
    Rgb32Uint,
    Rgb32Sint,
    Rgba16Float,
    Rgba16Unorm,
    Rgba16Uint,
    Rgba16Snorm,
    Rgba16Sint,
    Rg32Float,
    Rg32Uint,
    Rg32Sint,
    D32FloatS8Uint,
    Rgb10A2Unorm,
    Rgb10A2Uint,
    Rg11B10Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Uint,
    Rgba8Snorm,
    Rgba8Sint,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rg16Float,
    Rg16Unorm,
    Rg16Uint,
    Rg16Snorm,
    Rg16Sint,
    D32Float,
    R32Float,
    R32Uint,
    R32Sint,
    D24UnormS8Uint,
    Rg8Unorm,
    Rg8Uint,
    Rg8Snorm,
    Rg8Sint,
    R16Float,
    D16Unorm,
    R16Unorm,
    R16Uint,
    R16Snorm,
    R16Sint,
    R8Unorm,
    R8Uint,
    R8Snorm,
    R8Sint,

    Bc1Unorm,
    Bc1UnormSrgb,
    Bc2Unorm,
    Bc2UnormSrgb,
    Bc3Unorm,
    Bc3UnormSrgb,
    Bc4Unorm,
    Bc4Snorm,
    Bc5Unorm,
    Bc5Snorm,
    Bc6hUf16,
    Bc6hSf16,
    Bc7Unorm,
    Bc7UnormSrgb,
}

impl ImageFormat {
    /// Bits per pixel (per texel for block formats: 4 or 8)
    pub fn bits_per_pixel(&self) -> u32 {
        use ImageFormat::*;
        match self {
            Unknown => 0,
            Rgba32Float | Rgba32Uint | Rgba32Sint => 128,
            Rgb32Float | Rgb32Uint | Rgb32Sint => 96,
            Rgba16Float | Rgba16Unorm | Rgba16Uint | Rgba16Snorm | Rgba16Sint
            | Rg32Float | Rg32Uint | Rg32Sint | D32FloatS8Uint => 64,
            Rgb10A2Unorm | Rgb10A2Uint | Rg11B10Float
            | Rgba8Unorm | Rgba8UnormSrgb | Rgba8Uint | Rgba8Snorm | Rgba8Sint
            | Bgra8Unorm | Bgra8UnormSrgb
            | Rg16Float | Rg16Unorm | Rg16Uint | Rg16Snorm | Rg16Sint
            | D32Float | R32Float | R32Uint | R32Sint | D24UnormS8Uint => 32,
            Rg8Unorm | Rg8Uint | Rg8Snorm | Rg8Sint
            | R16Float | D16Unorm | R16Unorm | R16Uint | R16Snorm | R16Sint => 16,
            R8Unorm | R8Uint | R8Snorm | R8Sint => 8,
            Bc1Unorm | Bc1UnormSrgb | Bc4Unorm | Bc4Snorm => 4,
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc5Unorm | Bc5Snorm
            | Bc6hUf16 | Bc6hSf16 | Bc7Unorm | Bc7UnormSrgb => 8,
        }
    }

    /// Bytes per 4x4 block for block-compressed formats, `None` otherwise
    pub fn block_size_bytes(&self) -> Option<u32> {
        use ImageFormat::*;
        match self {
            Bc1Unorm | Bc1UnormSrgb | Bc4Unorm | Bc4Snorm => Some(8),
            Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb | Bc5Unorm | Bc5Snorm
            | Bc6hUf16 | Bc6hSf16 | Bc7Unorm | Bc7UnormSrgb => Some(16),
            _ => None,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.block_size_bytes().is_some()
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            ImageFormat::D32FloatS8Uint | ImageFormat::D32Float | ImageFormat::D24UnormS8Uint | ImageFormat::D16Unorm
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(self, ImageFormat::D32FloatS8Uint | ImageFormat::D24UnormS8Uint)
    }

    pub fn is_srgb(&self) -> bool {
        matches!(
            self,
            ImageFormat::Rgba8UnormSrgb
                | ImageFormat::Bgra8UnormSrgb
                | ImageFormat::Bc1UnormSrgb
                | ImageFormat::Bc2UnormSrgb
                | ImageFormat::Bc3UnormSrgb
                | ImageFormat::Bc7UnormSrgb
        )
    }

    /// Number of color/depth channels
    pub fn channel_count(&self) -> u32 {
        use ImageFormat::*;
        match self {
            Unknown => 0,
            Rgba32Float | Rgba32Uint | Rgba32Sint | Rgba16Float | Rgba16Unorm | Rgba16Uint
            | Rgba16Snorm | Rgba16Sint | Rgb10A2Unorm | Rgb10A2Uint | Rgba8Unorm
            | Rgba8UnormSrgb | Rgba8Uint | Rgba8Snorm | Rgba8Sint | Bgra8Unorm
            | Bgra8UnormSrgb | Bc1Unorm | Bc1UnormSrgb | Bc2Unorm | Bc2UnormSrgb | Bc3Unorm
            | Bc3UnormSrgb | Bc7Unorm | Bc7UnormSrgb => 4,
            Rgb32Float | Rgb32Uint | Rgb32Sint | Rg11B10Float | Bc6hUf16 | Bc6hSf16 => 3,
            Rg32Float | Rg32Uint | Rg32Sint | Rg16Float | Rg16Unorm | Rg16Uint | Rg16Snorm
            | Rg16Sint | Rg8Unorm | Rg8Uint | Rg8Snorm | Rg8Sint | D32FloatS8Uint
            | D24UnormS8Uint | Bc5Unorm | Bc5Snorm => 2,
            D32Float | R32Float | R32Uint | R32Sint | R16Float | D16Unorm | R16Unorm
            | R16Uint | R16Snorm | R16Sint | R8Unorm | R8Uint | R8Snorm | R8Sint | Bc4Unorm
            | Bc4Snorm => 1,
        }
    }

    /// Per-channel storage encoding
    pub fn channel_encoding(&self) -> ChannelEncoding {
        use ImageFormat::*;
        match self {
            Rgba8Unorm | Rgba8UnormSrgb | Bgra8Unorm | Bgra8UnormSrgb | Rg8Unorm | R8Unorm => ChannelEncoding::Unorm8,
            Rgba8Snorm | Rg8Snorm | R8Snorm => ChannelEncoding::Snorm8,
            Rgba8Uint | Rg8Uint | R8Uint => ChannelEncoding::Uint8,
            Rgba8Sint | Rg8Sint | R8Sint => ChannelEncoding::Sint8,
            Rgba16Unorm | Rg16Unorm | R16Unorm | D16Unorm => ChannelEncoding::Unorm16,
            Rgba16Snorm | Rg16Snorm | R16Snorm => ChannelEncoding::Snorm16,
            Rgba16Uint | Rg16Uint | R16Uint => ChannelEncoding::Uint16,
            Rgba16Sint | Rg16Sint | R16Sint => ChannelEncoding::Sint16,
            Rgba16Float | Rg16Float | R16Float => ChannelEncoding::Float16,
            Rgba32Uint | Rgb32Uint | Rg32Uint | R32Uint => ChannelEncoding::Uint32,
            Rgba32Sint | Rgb32Sint | Rg32Sint | R32Sint => ChannelEncoding::Sint32,
            Rgba32Float | Rgb32Float | Rg32Float | R32Float | D32Float => ChannelEncoding::Float32,
            Unknown | D32FloatS8Uint | Rgb10A2Unorm | Rgb10A2Uint | Rg11B10Float | D24UnormS8Uint => ChannelEncoding::Packed,
            Bc1Unorm | Bc1UnormSrgb | Bc2Unorm | Bc2UnormSrgb | Bc3Unorm | Bc3UnormSrgb
            | Bc4Unorm | Bc4Snorm | Bc5Unorm | Bc5Snorm | Bc6hUf16 | Bc6hSf16 | Bc7Unorm
            | Bc7UnormSrgb => ChannelEncoding::Block,
        }
    }

    /// Size in bytes of a single element (vertex attribute / index)
    pub fn element_size(&self) -> u32 {
        self.bits_per_pixel() / 8
    }
}

#[cfg(test)]
#[path = "image_format_tests.rs"]
mod tests;
