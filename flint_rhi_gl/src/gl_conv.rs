//! Lookup tables from flint descriptions to GL enums
//!
//! Pure functions over `glow` constants, pinned by tests without a context.

use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BufferType, ChannelEncoding, ComparisonFunction, CullMode,
    FillMode, ImageFormat, IndexType, PrimitiveTopology, SamplerAddress, SamplerFilter,
    ShaderStage, StencilOperation, ViewKind,
};

// ===== IMAGE FORMATS =====

/// Storage and transfer description of an image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FormatDesc {
    /// Sized internal format (`glTexStorage*`)
    pub internal: u32,
    /// Pixel transfer format (0 for block-compressed formats)
    pub external: u32,
    /// Pixel transfer type (0 for block-compressed formats)
    pub data_type: u32,
}

impl FormatDesc {
    const fn new(internal: u32, external: u32, data_type: u32) -> Self {
        Self { internal, external, data_type }
    }

    const fn compressed(internal: u32) -> Self {
        Self { internal, external: 0, data_type: 0 }
    }

    pub fn is_compressed(&self) -> bool {
        self.external == 0
    }
}

/// GL description of `format`, `None` for `Unknown`
pub(crate) fn describe_format(format: ImageFormat) -> Option<FormatDesc> {
    use ImageFormat::*;
    let desc = match format {
        Unknown => return None,

        Rgba32Float => FormatDesc::new(glow::RGBA32F, glow::RGBA, glow::FLOAT),
        Rgba32Uint => FormatDesc::new(glow::RGBA32UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT),
        Rgba32Sint => FormatDesc::new(glow::RGBA32I, glow::RGBA_INTEGER, glow::INT),
        Rgb32Float => FormatDesc::new(glow::RGB32F, glow::RGB, glow::FLOAT),
        Rgb32Uint => FormatDesc::new(glow::RGB32UI, glow::RGB_INTEGER, glow::UNSIGNED_INT),
        Rgb32Sint => FormatDesc::new(glow::RGB32I, glow::RGB_INTEGER, glow::INT),
        Rgba16Float => FormatDesc::new(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        Rgba16Unorm => FormatDesc::new(glow::RGBA16, glow::RGBA, glow::UNSIGNED_SHORT),
        Rgba16Uint => FormatDesc::new(glow::RGBA16UI, glow::RGBA_INTEGER, glow::UNSIGNED_SHORT),
        Rgba16Snorm => FormatDesc::new(glow::RGBA16_SNORM, glow::RGBA, glow::SHORT),
        Rgba16Sint => FormatDesc::new(glow::RGBA16I, glow::RGBA_INTEGER, glow::SHORT),
        Rg32Float => FormatDesc::new(glow::RG32F, glow::RG, glow::FLOAT),
        Rg32Uint => FormatDesc::new(glow::RG32UI, glow::RG_INTEGER, glow::UNSIGNED_INT),
        Rg32Sint => FormatDesc::new(glow::RG32I, glow::RG_INTEGER, glow::INT),
        D32FloatS8Uint => FormatDesc::new(
            glow::DEPTH32F_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
        ),
        Rgb10A2Unorm => FormatDesc::new(glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV),
        Rgb10A2Uint => FormatDesc::new(glow::RGB10_A2UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT_2_10_10_10_REV),
        Rg11B10Float => FormatDesc::new(glow::R11F_G11F_B10F, glow::RGB, glow::UNSIGNED_INT_10F_11F_11F_REV),
        Rgba8Unorm => FormatDesc::new(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        Rgba8UnormSrgb => FormatDesc::new(glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
        Rgba8Uint => FormatDesc::new(glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE),
        Rgba8Snorm => FormatDesc::new(glow::RGBA8_SNORM, glow::RGBA, glow::BYTE),
        Rgba8Sint => FormatDesc::new(glow::RGBA8I, glow::RGBA_INTEGER, glow::BYTE),
        // GL has no BGRA storage; the swizzle happens in the transfer format
        Bgra8Unorm => FormatDesc::new(glow::RGBA8, glow::BGRA, glow::UNSIGNED_BYTE),
        Bgra8UnormSrgb => FormatDesc::new(glow::SRGB8_ALPHA8, glow::BGRA, glow::UNSIGNED_BYTE),
        Rg16Float => FormatDesc::new(glow::RG16F, glow::RG, glow::HALF_FLOAT),
        Rg16Unorm => FormatDesc::new(glow::RG16, glow::RG, glow::UNSIGNED_SHORT),
        Rg16Uint => FormatDesc::new(glow::RG16UI, glow::RG_INTEGER, glow::UNSIGNED_SHORT),
        Rg16Snorm => FormatDesc::new(glow::RG16_SNORM, glow::RG, glow::SHORT),
        Rg16Sint => FormatDesc::new(glow::RG16I, glow::RG_INTEGER, glow::SHORT),
        D32Float => FormatDesc::new(glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT),
        R32Float => FormatDesc::new(glow::R32F, glow::RED, glow::FLOAT),
        R32Uint => FormatDesc::new(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT),
        R32Sint => FormatDesc::new(glow::R32I, glow::RED_INTEGER, glow::INT),
        D24UnormS8Uint => FormatDesc::new(glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8),
        Rg8Unorm => FormatDesc::new(glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        Rg8Uint => FormatDesc::new(glow::RG8UI, glow::RG_INTEGER, glow::UNSIGNED_BYTE),
        Rg8Snorm => FormatDesc::new(glow::RG8_SNORM, glow::RG, glow::BYTE),
        Rg8Sint => FormatDesc::new(glow::RG8I, glow::RG_INTEGER, glow::BYTE),
        R16Float => FormatDesc::new(glow::R16F, glow::RED, glow::HALF_FLOAT),
        D16Unorm => FormatDesc::new(glow::DEPTH_COMPONENT16, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT),
        R16Unorm => FormatDesc::new(glow::R16, glow::RED, glow::UNSIGNED_SHORT),
        R16Uint => FormatDesc::new(glow::R16UI, glow::RED_INTEGER, glow::UNSIGNED_SHORT),
        R16Snorm => FormatDesc::new(glow::R16_SNORM, glow::RED, glow::SHORT),
        R16Sint => FormatDesc::new(glow::R16I, glow::RED_INTEGER, glow::SHORT),
        R8Unorm => FormatDesc::new(glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        R8Uint => FormatDesc::new(glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE),
        R8Snorm => FormatDesc::new(glow::R8_SNORM, glow::RED, glow::BYTE),
        R8Sint => FormatDesc::new(glow::R8I, glow::RED_INTEGER, glow::BYTE),

        Bc1Unorm => FormatDesc::compressed(glow::COMPRESSED_RGBA_S3TC_DXT1_EXT),
        Bc1UnormSrgb => FormatDesc::compressed(glow::COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT),
        Bc2Unorm => FormatDesc::compressed(glow::COMPRESSED_RGBA_S3TC_DXT3_EXT),
        Bc2UnormSrgb => FormatDesc::compressed(glow::COMPRESSED_SRGB_ALPHA_S3TC_DXT3_EXT),
        Bc3Unorm => FormatDesc::compressed(glow::COMPRESSED_RGBA_S3TC_DXT5_EXT),
        Bc3UnormSrgb => FormatDesc::compressed(glow::COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT),
        Bc4Unorm => FormatDesc::compressed(glow::COMPRESSED_RED_RGTC1),
        Bc4Snorm => FormatDesc::compressed(glow::COMPRESSED_SIGNED_RED_RGTC1),
        Bc5Unorm => FormatDesc::compressed(glow::COMPRESSED_RG_RGTC2),
        Bc5Snorm => FormatDesc::compressed(glow::COMPRESSED_SIGNED_RG_RGTC2),
        Bc6hUf16 => FormatDesc::compressed(glow::COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT),
        Bc6hSf16 => FormatDesc::compressed(glow::COMPRESSED_RGB_BPTC_SIGNED_FLOAT),
        Bc7Unorm => FormatDesc::compressed(glow::COMPRESSED_RGBA_BPTC_UNORM),
        Bc7UnormSrgb => FormatDesc::compressed(glow::COMPRESSED_SRGB_ALPHA_BPTC_UNORM),
    };
    Some(desc)
}

/// Framebuffer attachment point of a render-target format
pub(crate) fn attachment_point(format: ImageFormat, color_index: u32) -> u32 {
    if format.has_stencil() {
        glow::DEPTH_STENCIL_ATTACHMENT
    } else if format.is_depth() {
        glow::DEPTH_ATTACHMENT
    } else {
        glow::COLOR_ATTACHMENT0 + color_index
    }
}

/// Clear call family for a color format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClearKind {
    Float,
    Uint,
    Sint,
}

pub(crate) fn clear_kind(format: ImageFormat) -> ClearKind {
    match format.channel_encoding() {
        ChannelEncoding::Uint8 | ChannelEncoding::Uint16 | ChannelEncoding::Uint32 => ClearKind::Uint,
        ChannelEncoding::Sint8 | ChannelEncoding::Sint16 | ChannelEncoding::Sint32 => ClearKind::Sint,
        _ if format == ImageFormat::Rgb10A2Uint => ClearKind::Uint,
        _ => ClearKind::Float,
    }
}

// ===== TEXTURE TARGETS =====

/// Texture target of a shader view shape
///
/// 1D textures always live in `TEXTURE_1D_ARRAY` storage so they share the
/// 2D upload path; shaders sample them as `sampler1DArray`.
pub(crate) fn texture_target(kind: ViewKind) -> u32 {
    match kind {
        ViewKind::Texture1D | ViewKind::Texture1DArray => glow::TEXTURE_1D_ARRAY,
        ViewKind::Texture2D => glow::TEXTURE_2D,
        ViewKind::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        ViewKind::Cube => glow::TEXTURE_CUBE_MAP,
        ViewKind::CubeArray => glow::TEXTURE_CUBE_MAP_ARRAY,
        ViewKind::Multisampled => glow::TEXTURE_2D_MULTISAMPLE,
        ViewKind::MultisampledArray => glow::TEXTURE_2D_MULTISAMPLE_ARRAY,
        ViewKind::Texture3D => glow::TEXTURE_3D,
    }
}

/// Target uses 3D storage calls (array layers or depth slices in `z`)
pub(crate) fn is_layered_target(target: u32) -> bool {
    matches!(
        target,
        glow::TEXTURE_1D_ARRAY
            | glow::TEXTURE_2D_ARRAY
            | glow::TEXTURE_CUBE_MAP_ARRAY
            | glow::TEXTURE_2D_MULTISAMPLE_ARRAY
            | glow::TEXTURE_3D
    )
}

/// Face target of cube layer `layer`
pub(crate) fn cube_face_target(layer: u32) -> u32 {
    glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer % 6
}

// ===== BUFFERS =====

/// Creation target and usage hint of a buffer type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlBufferUsage {
    pub target: u32,
    pub usage: u32,
}

/// Derive the GL target and usage hint, `None` for `Unknown`
pub(crate) fn buffer_usage(buffer_type: BufferType) -> Option<GlBufferUsage> {
    let target = match buffer_type {
        BufferType::Constant => glow::UNIFORM_BUFFER,
        BufferType::Vertex | BufferType::DynamicVertex => glow::ARRAY_BUFFER,
        BufferType::Index | BufferType::DynamicIndex => glow::ELEMENT_ARRAY_BUFFER,
        BufferType::UavBuffer => glow::TEXTURE_BUFFER,
        BufferType::UavTexture1D => glow::TEXTURE_1D,
        BufferType::UavTexture2D => glow::TEXTURE_2D,
        BufferType::UavTexture3D => glow::TEXTURE_3D,
        BufferType::Structured | BufferType::AppendStructured => glow::SHADER_STORAGE_BUFFER,
        BufferType::IndirectDrawArguments => glow::DRAW_INDIRECT_BUFFER,
        BufferType::Unknown => return None,
    };
    let usage = if buffer_type.usage().dynamic { glow::DYNAMIC_DRAW } else { glow::STATIC_DRAW };
    Some(GlBufferUsage { target, usage })
}

pub(crate) fn index_type(index_type: IndexType) -> u32 {
    match index_type {
        IndexType::U16 => glow::UNSIGNED_SHORT,
        IndexType::U32 => glow::UNSIGNED_INT,
    }
}

// ===== VERTEX INPUT =====

/// How an attribute reaches the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeKind {
    Float,
    Normalized,
    Integer,
}

/// Component count, component type and kind of a vertex attribute format
pub(crate) fn vertex_attribute(format: ImageFormat) -> Option<(i32, u32, AttributeKind)> {
    let components = format.channel_count() as i32;
    let (data_type, kind) = match format.channel_encoding() {
        ChannelEncoding::Float32 => (glow::FLOAT, AttributeKind::Float),
        ChannelEncoding::Float16 => (glow::HALF_FLOAT, AttributeKind::Float),
        ChannelEncoding::Unorm8 => (glow::UNSIGNED_BYTE, AttributeKind::Normalized),
        ChannelEncoding::Snorm8 => (glow::BYTE, AttributeKind::Normalized),
        ChannelEncoding::Unorm16 => (glow::UNSIGNED_SHORT, AttributeKind::Normalized),
        ChannelEncoding::Snorm16 => (glow::SHORT, AttributeKind::Normalized),
        ChannelEncoding::Uint8 => (glow::UNSIGNED_BYTE, AttributeKind::Integer),
        ChannelEncoding::Sint8 => (glow::BYTE, AttributeKind::Integer),
        ChannelEncoding::Uint16 => (glow::UNSIGNED_SHORT, AttributeKind::Integer),
        ChannelEncoding::Sint16 => (glow::SHORT, AttributeKind::Integer),
        ChannelEncoding::Uint32 => (glow::UNSIGNED_INT, AttributeKind::Integer),
        ChannelEncoding::Sint32 => (glow::INT, AttributeKind::Integer),
        ChannelEncoding::Packed | ChannelEncoding::Block => return None,
    };
    if format.is_depth() || components == 0 {
        return None;
    }
    Some((components, data_type, kind))
}

// ===== SHADERS / PIPELINES =====

pub(crate) fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::TessControl => glow::TESS_CONTROL_SHADER,
        ShaderStage::TessEvaluation => glow::TESS_EVALUATION_SHADER,
        ShaderStage::Pixel => glow::FRAGMENT_SHADER,
        ShaderStage::Compute => glow::COMPUTE_SHADER,
    }
}

pub(crate) fn primitive_mode(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::Patch { .. } => glow::PATCHES,
    }
}

// ===== FIXED-FUNCTION STATE =====

pub(crate) fn compare_func(function: ComparisonFunction) -> u32 {
    match function {
        ComparisonFunction::Never => glow::NEVER,
        ComparisonFunction::Always => glow::ALWAYS,
        ComparisonFunction::Less => glow::LESS,
        ComparisonFunction::Greater => glow::GREATER,
        ComparisonFunction::LEqual => glow::LEQUAL,
        ComparisonFunction::GEqual => glow::GEQUAL,
        ComparisonFunction::NotEqual => glow::NOTEQUAL,
        ComparisonFunction::Equal => glow::EQUAL,
    }
}

pub(crate) fn stencil_op(operation: StencilOperation) -> u32 {
    match operation {
        StencilOperation::Keep => glow::KEEP,
        StencilOperation::Zero => glow::ZERO,
        StencilOperation::Replace => glow::REPLACE,
        StencilOperation::Inc => glow::INCR,
        StencilOperation::IncWrap => glow::INCR_WRAP,
        StencilOperation::Dec => glow::DECR,
        StencilOperation::DecWrap => glow::DECR_WRAP,
        StencilOperation::Invert => glow::INVERT,
    }
}

pub(crate) fn blend_factor(source: BlendSource) -> u32 {
    match source {
        BlendSource::Zero => glow::ZERO,
        BlendSource::One => glow::ONE,
        BlendSource::SrcColor => glow::SRC_COLOR,
        BlendSource::InvSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendSource::SrcAlpha => glow::SRC_ALPHA,
        BlendSource::InvSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendSource::DestAlpha => glow::DST_ALPHA,
        BlendSource::InvDestAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendSource::DestColor => glow::DST_COLOR,
        BlendSource::InvDestColor => glow::ONE_MINUS_DST_COLOR,
        BlendSource::SrcAlphaSat => glow::SRC_ALPHA_SATURATE,
        BlendSource::BlendFactor => glow::CONSTANT_COLOR,
        BlendSource::InvBlendFactor => glow::ONE_MINUS_CONSTANT_COLOR,
    }
}

pub(crate) fn blend_equation(operation: BlendOperation) -> u32 {
    match operation {
        BlendOperation::Add => glow::FUNC_ADD,
        BlendOperation::Sub => glow::FUNC_SUBTRACT,
        BlendOperation::Min => glow::MIN,
        BlendOperation::Max => glow::MAX,
        BlendOperation::RevSub => glow::FUNC_REVERSE_SUBTRACT,
    }
}

/// Face to cull, `None` when culling is disabled
pub(crate) fn cull_face(mode: CullMode) -> Option<u32> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(glow::FRONT),
        CullMode::Back => Some(glow::BACK),
        CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
    }
}

pub(crate) fn polygon_mode(mode: FillMode) -> u32 {
    match mode {
        FillMode::Solid => glow::FILL,
        FillMode::Wireframe => glow::LINE,
    }
}

// ===== SAMPLERS =====

pub(crate) fn sampler_address(address: SamplerAddress) -> u32 {
    match address {
        SamplerAddress::Wrap => glow::REPEAT,
        SamplerAddress::Mirror => glow::MIRRORED_REPEAT,
        SamplerAddress::ClampEdge => glow::CLAMP_TO_EDGE,
        SamplerAddress::ClampBorder => glow::CLAMP_TO_BORDER,
        SamplerAddress::MirrorOnce => glow::MIRROR_CLAMP_TO_EDGE,
    }
}

/// `(min, mag)` filters of a sampler filter
pub(crate) fn sampler_filters(filter: SamplerFilter) -> (u32, u32) {
    let mag = if filter.is_mag_linear() { glow::LINEAR } else { glow::NEAREST };
    let min = match (filter.is_min_linear(), filter.is_mip_linear()) {
        (false, false) => glow::NEAREST_MIPMAP_NEAREST,
        (false, true) => glow::NEAREST_MIPMAP_LINEAR,
        (true, false) => glow::LINEAR_MIPMAP_NEAREST,
        (true, true) => glow::LINEAR_MIPMAP_LINEAR,
    };
    (min, mag)
}

#[cfg(test)]
#[path = "gl_conv_tests.rs"]
mod tests;
