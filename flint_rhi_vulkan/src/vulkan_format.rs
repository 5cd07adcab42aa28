//! Lookup tables from flint descriptions to Vulkan enums
//!
//! Every translation the backend performs lives here as a pure function so
//! the tables can be pinned by tests without a GPU.

use ash::vk;
use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BufferDesc, BufferType, ColorWriteMask, ComparisonFunction,
    CullMode, FillMode, ImageFormat, IndexType, PrimitiveTopology, SamplerAddress, ShaderStage,
    ShaderStageFlags, StencilOperation, TextureDimension, ViewKind,
};
use gpu_allocator::MemoryLocation;

// ===== IMAGE FORMATS =====

/// Vulkan format of an image format (`UNDEFINED` for `Unknown`)
pub(crate) fn image_format_to_vk(format: ImageFormat) -> vk::Format {
    use ImageFormat::*;
    match format {
        Unknown => vk::Format::UNDEFINED,

        Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        Rgba32Uint => vk::Format::R32G32B32A32_UINT,
        Rgba32Sint => vk::Format::R32G32B32A32_SINT,
        Rgb32Float => vk::Format::R32G32B32_SFLOAT,
        Rgb32Uint => vk::Format::R32G32B32_UINT,
        Rgb32Sint => vk::Format::R32G32B32_SINT,
        Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        Rgba16Unorm => vk::Format::R16G16B16A16_UNORM,
        Rgba16Uint => vk::Format::R16G16B16A16_UINT,
        Rgba16Snorm => vk::Format::R16G16B16A16_SNORM,
        Rgba16Sint => vk::Format::R16G16B16A16_SINT,
        Rg32Float => vk::Format::R32G32_SFLOAT,
        Rg32Uint => vk::Format::R32G32_UINT,
        Rg32Sint => vk::Format::R32G32_SINT,
        D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
        Rgb10A2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        Rgb10A2Uint => vk::Format::A2B10G10R10_UINT_PACK32,
        Rg11B10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
        Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        Rgba8Uint => vk::Format::R8G8B8A8_UINT,
        Rgba8Snorm => vk::Format::R8G8B8A8_SNORM,
        Rgba8Sint => vk::Format::R8G8B8A8_SINT,
        Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        Rg16Float => vk::Format::R16G16_SFLOAT,
        Rg16Unorm => vk::Format::R16G16_UNORM,
        Rg16Uint => vk::Format::R16G16_UINT,
        Rg16Snorm => vk::Format::R16G16_SNORM,
        Rg16Sint => vk::Format::R16G16_SINT,
        D32Float => vk::Format::D32_SFLOAT,
        R32Float => vk::Format::R32_SFLOAT,
        R32Uint => vk::Format::R32_UINT,
        R32Sint => vk::Format::R32_SINT,
        D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        Rg8Unorm => vk::Format::R8G8_UNORM,
        Rg8Uint => vk::Format::R8G8_UINT,
        Rg8Snorm => vk::Format::R8G8_SNORM,
        Rg8Sint => vk::Format::R8G8_SINT,
        R16Float => vk::Format::R16_SFLOAT,
        D16Unorm => vk::Format::D16_UNORM,
        R16Unorm => vk::Format::R16_UNORM,
        R16Uint => vk::Format::R16_UINT,
        R16Snorm => vk::Format::R16_SNORM,
        R16Sint => vk::Format::R16_SINT,
        R8Unorm => vk::Format::R8_UNORM,
        R8Uint => vk::Format::R8_UINT,
        R8Snorm => vk::Format::R8_SNORM,
        R8Sint => vk::Format::R8_SINT,

        Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Bc1UnormSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Bc2Unorm => vk::Format::BC2_UNORM_BLOCK,
        Bc2UnormSrgb => vk::Format::BC2_SRGB_BLOCK,
        Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        Bc3UnormSrgb => vk::Format::BC3_SRGB_BLOCK,
        Bc4Unorm => vk::Format::BC4_UNORM_BLOCK,
        Bc4Snorm => vk::Format::BC4_SNORM_BLOCK,
        Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        Bc5Snorm => vk::Format::BC5_SNORM_BLOCK,
        Bc6hUf16 => vk::Format::BC6H_UFLOAT_BLOCK,
        Bc6hSf16 => vk::Format::BC6H_SFLOAT_BLOCK,
        Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
        Bc7UnormSrgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// Aspects of a whole image of this format
pub(crate) fn aspect_mask(format: ImageFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Aspects a shader view may select (depth only for combined formats)
pub(crate) fn view_aspect_mask(format: ImageFormat) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Clear value for a color image, typed after the channel encoding
pub(crate) fn clear_color_value(format: ImageFormat, color: [f32; 4]) -> vk::ClearColorValue {
    use flint_rhi::flint::render::ChannelEncoding::*;
    match format.channel_encoding() {
        Uint8 | Uint16 | Uint32 => vk::ClearColorValue { uint32: color.map(|c| c.max(0.0) as u32) },
        Sint8 | Sint16 | Sint32 => vk::ClearColorValue { int32: color.map(|c| c as i32) },
        _ if format == ImageFormat::Rgb10A2Uint => vk::ClearColorValue { uint32: color.map(|c| c.max(0.0) as u32) },
        _ => vk::ClearColorValue { float32: color },
    }
}

// ===== IMAGE SHAPES =====

/// Image type of a texture dimension, `None` for non-image dimensions
pub(crate) fn image_type_to_vk(dimension: TextureDimension) -> Option<vk::ImageType> {
    match dimension {
        TextureDimension::Texture1D => Some(vk::ImageType::TYPE_1D),
        TextureDimension::Texture2D => Some(vk::ImageType::TYPE_2D),
        TextureDimension::Texture3D => Some(vk::ImageType::TYPE_3D),
        TextureDimension::Unknown | TextureDimension::Buffer => None,
    }
}

pub(crate) fn view_kind_to_vk(kind: ViewKind) -> vk::ImageViewType {
    match kind {
        ViewKind::Texture1D => vk::ImageViewType::TYPE_1D,
        ViewKind::Texture1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        ViewKind::Texture2D | ViewKind::Multisampled => vk::ImageViewType::TYPE_2D,
        ViewKind::Texture2DArray | ViewKind::MultisampledArray => vk::ImageViewType::TYPE_2D_ARRAY,
        ViewKind::Cube => vk::ImageViewType::CUBE,
        ViewKind::CubeArray => vk::ImageViewType::CUBE_ARRAY,
        ViewKind::Texture3D => vk::ImageViewType::TYPE_3D,
    }
}

/// View type of a single (layer, mip) attachment view
pub(crate) fn attachment_view_type(dimension: TextureDimension) -> vk::ImageViewType {
    match dimension {
        TextureDimension::Texture1D => vk::ImageViewType::TYPE_1D,
        _ => vk::ImageViewType::TYPE_2D,
    }
}

/// View type covering every layer of one mip (flat render-target binding)
pub(crate) fn layered_view_type(dimension: TextureDimension) -> vk::ImageViewType {
    match dimension {
        TextureDimension::Texture1D => vk::ImageViewType::TYPE_1D_ARRAY,
        _ => vk::ImageViewType::TYPE_2D_ARRAY,
    }
}

pub(crate) fn sample_count_to_vk(count: u32) -> vk::SampleCountFlags {
    match count {
        0 | 1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        3 | 4 => vk::SampleCountFlags::TYPE_4,
        5..=8 => vk::SampleCountFlags::TYPE_8,
        9..=16 => vk::SampleCountFlags::TYPE_16,
        17..=32 => vk::SampleCountFlags::TYPE_32,
        _ => vk::SampleCountFlags::TYPE_64,
    }
}

// ===== BUFFERS =====

/// Native usage and memory placement of a buffer description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VulkanBufferUsage {
    pub usage: vk::BufferUsageFlags,
    pub location: MemoryLocation,
}

/// Derive native buffer flags from the logical usage table
pub(crate) fn buffer_usage_to_vk(buffer_type: BufferType) -> VulkanBufferUsage {
    use flint_rhi::flint::render::{BufferBindFlags, BufferMiscFlags};

    let logical = buffer_type.usage();
    let mut usage = vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC;

    if logical.bind.contains(BufferBindFlags::VERTEX) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if logical.bind.contains(BufferBindFlags::INDEX) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if logical.bind.contains(BufferBindFlags::CONSTANT) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if logical.bind.intersects(BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS) {
        usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if logical.misc.contains(BufferMiscFlags::DRAW_INDIRECT_ARGS) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }

    let location = if logical.dynamic { MemoryLocation::CpuToGpu } else { MemoryLocation::GpuOnly };
    VulkanBufferUsage { usage, location }
}

/// Image usage of a texture-backed UAV buffer
pub(crate) fn storage_image_usage() -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::STORAGE
        | vk::ImageUsageFlags::SAMPLED
        | vk::ImageUsageFlags::TRANSFER_DST
        | vk::ImageUsageFlags::TRANSFER_SRC
}

/// Image type of a texture-backed UAV buffer
pub(crate) fn storage_image_type(desc: &BufferDesc) -> Option<(vk::ImageType, vk::ImageViewType)> {
    match desc.buffer_type {
        BufferType::UavTexture1D => Some((vk::ImageType::TYPE_1D, vk::ImageViewType::TYPE_1D)),
        BufferType::UavTexture2D => Some((vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D)),
        BufferType::UavTexture3D => Some((vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D)),
        _ => None,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

// ===== SHADERS =====

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::TessControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::TessEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub(crate) fn shader_stages_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    stages
        .stages()
        .fold(vk::ShaderStageFlags::empty(), |acc, stage| acc | shader_stage_to_vk(stage))
}

pub(crate) fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::Patch { .. } => vk::PrimitiveTopology::PATCH_LIST,
    }
}

// ===== FIXED-FUNCTION STATE =====

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn fill_mode_to_vk(mode: FillMode) -> vk::PolygonMode {
    match mode {
        FillMode::Solid => vk::PolygonMode::FILL,
        FillMode::Wireframe => vk::PolygonMode::LINE,
    }
}

pub(crate) fn compare_op_to_vk(function: ComparisonFunction) -> vk::CompareOp {
    match function {
        ComparisonFunction::Never => vk::CompareOp::NEVER,
        ComparisonFunction::Always => vk::CompareOp::ALWAYS,
        ComparisonFunction::Less => vk::CompareOp::LESS,
        ComparisonFunction::Greater => vk::CompareOp::GREATER,
        ComparisonFunction::LEqual => vk::CompareOp::LESS_OR_EQUAL,
        ComparisonFunction::GEqual => vk::CompareOp::GREATER_OR_EQUAL,
        ComparisonFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        ComparisonFunction::Equal => vk::CompareOp::EQUAL,
    }
}

pub(crate) fn stencil_op_to_vk(operation: StencilOperation) -> vk::StencilOp {
    match operation {
        StencilOperation::Keep => vk::StencilOp::KEEP,
        StencilOperation::Zero => vk::StencilOp::ZERO,
        StencilOperation::Replace => vk::StencilOp::REPLACE,
        StencilOperation::Inc => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOperation::IncWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOperation::Dec => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOperation::DecWrap => vk::StencilOp::DECREMENT_AND_WRAP,
        StencilOperation::Invert => vk::StencilOp::INVERT,
    }
}

pub(crate) fn blend_factor_to_vk(source: BlendSource) -> vk::BlendFactor {
    match source {
        BlendSource::Zero => vk::BlendFactor::ZERO,
        BlendSource::One => vk::BlendFactor::ONE,
        BlendSource::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendSource::InvSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendSource::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendSource::InvSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendSource::DestAlpha => vk::BlendFactor::DST_ALPHA,
        BlendSource::InvDestAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendSource::DestColor => vk::BlendFactor::DST_COLOR,
        BlendSource::InvDestColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendSource::SrcAlphaSat => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendSource::BlendFactor => vk::BlendFactor::CONSTANT_COLOR,
        BlendSource::InvBlendFactor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
    }
}

pub(crate) fn blend_op_to_vk(operation: BlendOperation) -> vk::BlendOp {
    match operation {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Sub => vk::BlendOp::SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
        BlendOperation::RevSub => vk::BlendOp::REVERSE_SUBTRACT,
    }
}

pub(crate) fn color_write_mask_to_vk(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::R) { flags |= vk::ColorComponentFlags::R; }
    if mask.contains(ColorWriteMask::G) { flags |= vk::ColorComponentFlags::G; }
    if mask.contains(ColorWriteMask::B) { flags |= vk::ColorComponentFlags::B; }
    if mask.contains(ColorWriteMask::A) { flags |= vk::ColorComponentFlags::A; }
    flags
}

// ===== SAMPLERS =====

pub(crate) fn sampler_address_to_vk(address: SamplerAddress) -> vk::SamplerAddressMode {
    match address {
        SamplerAddress::Wrap => vk::SamplerAddressMode::REPEAT,
        SamplerAddress::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        SamplerAddress::ClampEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        SamplerAddress::ClampBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        SamplerAddress::MirrorOnce => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
    }
}

/// Closest built-in border color (Vulkan has no arbitrary border colors in core)
pub(crate) fn border_color_to_vk(color: [f32; 4]) -> vk::BorderColor {
    if color[3] < 0.5 {
        vk::BorderColor::FLOAT_TRANSPARENT_BLACK
    } else if color[0] + color[1] + color[2] >= 1.5 {
        vk::BorderColor::FLOAT_OPAQUE_WHITE
    } else {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
