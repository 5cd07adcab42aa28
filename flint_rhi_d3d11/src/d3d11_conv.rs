//! Lookup tables from flint descriptions to Direct3D 11 enums and flags
//!
//! Pure functions only, so the tables can be pinned by tests on any Windows
//! machine without creating a device.

use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BufferDesc, BufferMiscFlags, BufferBindFlags, BufferShape,
    BufferType, ComparisonFunction, CpuAccess, CullMode, FillMode, ImageFormat, IndexType,
    PrimitiveTopology, SamplerAddress, SamplerFilter, StencilOperation, ViewKind,
};
use winapi::shared::dxgiformat::*;
use winapi::um::d3d11::*;
use winapi::um::d3dcommon::*;

// ===== FORMATS =====

/// DXGI format of an image format (`UNKNOWN` for `Unknown`)
pub(crate) fn image_format_to_dxgi(format: ImageFormat) -> DXGI_FORMAT {
    use ImageFormat::*;
    match format {
        Unknown => DXGI_FORMAT_UNKNOWN,

        Rgba32Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
        Rgba32Uint => DXGI_FORMAT_R32G32B32A32_UINT,
        Rgba32Sint => DXGI_FORMAT_R32G32B32A32_SINT,
        Rgb32Float => DXGI_FORMAT_R32G32B32_FLOAT,
        Rgb32Uint => DXGI_FORMAT_R32G32B32_UINT,
        Rgb32Sint => DXGI_FORMAT_R32G32B32_SINT,
        Rgba16Float => DXGI_FORMAT_R16G16B16A16_FLOAT,
        Rgba16Unorm => DXGI_FORMAT_R16G16B16A16_UNORM,
        Rgba16Uint => DXGI_FORMAT_R16G16B16A16_UINT,
        Rgba16Snorm => DXGI_FORMAT_R16G16B16A16_SNORM,
        Rgba16Sint => DXGI_FORMAT_R16G16B16A16_SINT,
        Rg32Float => DXGI_FORMAT_R32G32_FLOAT,
        Rg32Uint => DXGI_FORMAT_R32G32_UINT,
        Rg32Sint => DXGI_FORMAT_R32G32_SINT,
        D32FloatS8Uint => DXGI_FORMAT_D32_FLOAT_S8X24_UINT,
        Rgb10A2Unorm => DXGI_FORMAT_R10G10B10A2_UNORM,
        Rgb10A2Uint => DXGI_FORMAT_R10G10B10A2_UINT,
        Rg11B10Float => DXGI_FORMAT_R11G11B10_FLOAT,
        Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        Rgba8UnormSrgb => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
        Rgba8Uint => DXGI_FORMAT_R8G8B8A8_UINT,
        Rgba8Snorm => DXGI_FORMAT_R8G8B8A8_SNORM,
        Rgba8Sint => DXGI_FORMAT_R8G8B8A8_SINT,
        Bgra8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        Bgra8UnormSrgb => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
        Rg16Float => DXGI_FORMAT_R16G16_FLOAT,
        Rg16Unorm => DXGI_FORMAT_R16G16_UNORM,
        Rg16Uint => DXGI_FORMAT_R16G16_UINT,
        Rg16Snorm => DXGI_FORMAT_R16G16_SNORM,
        Rg16Sint => DXGI_FORMAT_R16G16_SINT,
        D32Float => DXGI_FORMAT_D32_FLOAT,
        R32Float => DXGI_FORMAT_R32_FLOAT,
        R32Uint => DXGI_FORMAT_R32_UINT,
        R32Sint => DXGI_FORMAT_R32_SINT,
        D24UnormS8Uint => DXGI_FORMAT_D24_UNORM_S8_UINT,
        Rg8Unorm => DXGI_FORMAT_R8G8_UNORM,
        Rg8Uint => DXGI_FORMAT_R8G8_UINT,
        Rg8Snorm => DXGI_FORMAT_R8G8_SNORM,
        Rg8Sint => DXGI_FORMAT_R8G8_SINT,
        R16Float => DXGI_FORMAT_R16_FLOAT,
        D16Unorm => DXGI_FORMAT_D16_UNORM,
        R16Unorm => DXGI_FORMAT_R16_UNORM,
        R16Uint => DXGI_FORMAT_R16_UINT,
        R16Snorm => DXGI_FORMAT_R16_SNORM,
        R16Sint => DXGI_FORMAT_R16_SINT,
        R8Unorm => DXGI_FORMAT_R8_UNORM,
        R8Uint => DXGI_FORMAT_R8_UINT,
        R8Snorm => DXGI_FORMAT_R8_SNORM,
        R8Sint => DXGI_FORMAT_R8_SINT,

        Bc1Unorm => DXGI_FORMAT_BC1_UNORM,
        Bc1UnormSrgb => DXGI_FORMAT_BC1_UNORM_SRGB,
        Bc2Unorm => DXGI_FORMAT_BC2_UNORM,
        Bc2UnormSrgb => DXGI_FORMAT_BC2_UNORM_SRGB,
        Bc3Unorm => DXGI_FORMAT_BC3_UNORM,
        Bc3UnormSrgb => DXGI_FORMAT_BC3_UNORM_SRGB,
        Bc4Unorm => DXGI_FORMAT_BC4_UNORM,
        Bc4Snorm => DXGI_FORMAT_BC4_SNORM,
        Bc5Unorm => DXGI_FORMAT_BC5_UNORM,
        Bc5Snorm => DXGI_FORMAT_BC5_SNORM,
        Bc6hUf16 => DXGI_FORMAT_BC6H_UF16,
        Bc6hSf16 => DXGI_FORMAT_BC6H_SF16,
        Bc7Unorm => DXGI_FORMAT_BC7_UNORM,
        Bc7UnormSrgb => DXGI_FORMAT_BC7_UNORM_SRGB,
    }
}

/// The three faces of a depth format: storage, depth view, shader view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DepthFormats {
    pub storage: DXGI_FORMAT,
    pub depth_view: DXGI_FORMAT,
    pub shader_view: DXGI_FORMAT,
}

/// Typeless triple of a depth format, `None` for color formats
pub(crate) fn depth_formats(format: ImageFormat) -> Option<DepthFormats> {
    let (storage, depth_view, shader_view) = match format {
        ImageFormat::D32Float => (DXGI_FORMAT_R32_TYPELESS, DXGI_FORMAT_D32_FLOAT, DXGI_FORMAT_R32_FLOAT),
        ImageFormat::D24UnormS8Uint => (
            DXGI_FORMAT_R24G8_TYPELESS,
            DXGI_FORMAT_D24_UNORM_S8_UINT,
            DXGI_FORMAT_R24_UNORM_X8_TYPELESS,
        ),
        ImageFormat::D16Unorm => (DXGI_FORMAT_R16_TYPELESS, DXGI_FORMAT_D16_UNORM, DXGI_FORMAT_R16_UNORM),
        ImageFormat::D32FloatS8Uint => (
            DXGI_FORMAT_R32G8X24_TYPELESS,
            DXGI_FORMAT_D32_FLOAT_S8X24_UINT,
            DXGI_FORMAT_R32_FLOAT_X8X24_TYPELESS,
        ),
        _ => return None,
    };
    Some(DepthFormats { storage, depth_view, shader_view })
}

/// Storage and shader-view formats of a texture
pub(crate) fn texture_formats(format: ImageFormat) -> (DXGI_FORMAT, DXGI_FORMAT) {
    match depth_formats(format) {
        Some(depth) => (depth.storage, depth.shader_view),
        None => {
            let native = image_format_to_dxgi(format);
            (native, native)
        }
    }
}

pub(crate) fn index_format(index_type: IndexType) -> DXGI_FORMAT {
    match index_type {
        IndexType::U16 => DXGI_FORMAT_R16_UINT,
        IndexType::U32 => DXGI_FORMAT_R32_UINT,
    }
}

/// Format usable as a vertex attribute, `None` for depth and block formats
pub(crate) fn vertex_format(format: ImageFormat) -> Option<DXGI_FORMAT> {
    if format == ImageFormat::Unknown || format.is_depth() || format.block_size_bytes().is_some() {
        return None;
    }
    Some(image_format_to_dxgi(format))
}

// ===== BUFFERS =====

/// Native usage, bind, CPU access and misc flags of a buffer type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferFlags {
    pub usage: D3D11_USAGE,
    pub bind: u32,
    pub cpu_access: u32,
    pub misc: u32,
}

pub(crate) fn buffer_flags(buffer_type: BufferType) -> BufferFlags {
    let usage = buffer_type.usage();

    let mut bind = 0;
    if usage.bind.contains(BufferBindFlags::VERTEX) {
        bind |= D3D11_BIND_VERTEX_BUFFER;
    }
    if usage.bind.contains(BufferBindFlags::INDEX) {
        bind |= D3D11_BIND_INDEX_BUFFER;
    }
    if usage.bind.contains(BufferBindFlags::CONSTANT) {
        bind |= D3D11_BIND_CONSTANT_BUFFER;
    }
    if usage.bind.contains(BufferBindFlags::SHADER_RESOURCE) {
        bind |= D3D11_BIND_SHADER_RESOURCE;
    }
    if usage.bind.contains(BufferBindFlags::UNORDERED_ACCESS) {
        bind |= D3D11_BIND_UNORDERED_ACCESS;
    }

    let mut cpu_access = 0;
    if usage.cpu_access.contains(CpuAccess::WRITE) {
        cpu_access |= D3D11_CPU_ACCESS_WRITE;
    }
    if usage.cpu_access.contains(CpuAccess::READ) {
        cpu_access |= D3D11_CPU_ACCESS_READ;
    }

    // APPEND is a property of the UAV, not of the resource
    let mut misc = 0;
    if usage.misc.contains(BufferMiscFlags::STRUCTURED) {
        misc |= D3D11_RESOURCE_MISC_BUFFER_STRUCTURED;
    }
    if usage.misc.contains(BufferMiscFlags::DRAW_INDIRECT_ARGS) {
        misc |= D3D11_RESOURCE_MISC_DRAWINDIRECT_ARGS;
    }

    BufferFlags {
        usage: if usage.dynamic { D3D11_USAGE_DYNAMIC } else { D3D11_USAGE_DEFAULT },
        bind,
        cpu_access,
        misc,
    }
}

/// Element layout of the shader views of a linear buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferViewLayout {
    pub format: DXGI_FORMAT,
    pub num_elements: u32,
    /// Byte-address view over 32-bit words
    pub raw: bool,
    pub append: bool,
}

/// Shader view layout of `desc`, `None` when the buffer is not shader visible
pub(crate) fn buffer_view_layout(desc: &BufferDesc) -> Option<BufferViewLayout> {
    let usage = desc.buffer_type.usage();
    if !usage.bind.intersects(BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS) {
        return None;
    }
    let append = usage.misc.contains(BufferMiscFlags::APPEND);

    if usage.misc.contains(BufferMiscFlags::STRUCTURED) {
        return Some(BufferViewLayout {
            format: DXGI_FORMAT_UNKNOWN,
            num_elements: desc.stride,
            raw: false,
            append,
        });
    }

    let byte_width = desc.byte_width();
    if desc.view_format == ImageFormat::Unknown {
        return Some(BufferViewLayout {
            format: DXGI_FORMAT_R32_TYPELESS,
            num_elements: (byte_width / 4) as u32,
            raw: true,
            append,
        });
    }

    let element_size = desc.view_format.element_size().max(1) as u64;
    Some(BufferViewLayout {
        format: image_format_to_dxgi(desc.view_format),
        num_elements: (byte_width / element_size) as u32,
        raw: false,
        append,
    })
}

/// Creation description of a linear buffer
///
/// Constant buffers are padded to 16 bytes. Buffers viewed as raw words get
/// `ALLOW_RAW_VIEWS`.
pub(crate) fn buffer_desc(desc: &BufferDesc) -> D3D11_BUFFER_DESC {
    let flags = buffer_flags(desc.buffer_type);
    let mut byte_width = desc.byte_width() as u32;
    if desc.buffer_type == BufferType::Constant {
        byte_width = (byte_width + 15) & !15;
    }

    let mut misc = flags.misc;
    let view = buffer_view_layout(desc);
    if view.map(|view| view.raw).unwrap_or(false) {
        misc |= D3D11_RESOURCE_MISC_BUFFER_ALLOW_RAW_VIEWS;
    }

    let structure_stride = match desc.shape {
        BufferShape::Linear { size, .. } if desc.buffer_type.usage().misc.contains(BufferMiscFlags::STRUCTURED) => size as u32,
        _ => 0,
    };

    D3D11_BUFFER_DESC {
        ByteWidth: byte_width,
        Usage: flags.usage,
        BindFlags: flags.bind,
        CPUAccessFlags: flags.cpu_access,
        MiscFlags: misc,
        StructureByteStride: structure_stride,
    }
}

// ===== FIXED-FUNCTION STATE =====

pub(crate) fn comparison_to_d3d11(function: ComparisonFunction) -> D3D11_COMPARISON_FUNC {
    match function {
        ComparisonFunction::Never => D3D11_COMPARISON_NEVER,
        ComparisonFunction::Always => D3D11_COMPARISON_ALWAYS,
        ComparisonFunction::Less => D3D11_COMPARISON_LESS,
        ComparisonFunction::Greater => D3D11_COMPARISON_GREATER,
        ComparisonFunction::LEqual => D3D11_COMPARISON_LESS_EQUAL,
        ComparisonFunction::GEqual => D3D11_COMPARISON_GREATER_EQUAL,
        ComparisonFunction::NotEqual => D3D11_COMPARISON_NOT_EQUAL,
        ComparisonFunction::Equal => D3D11_COMPARISON_EQUAL,
    }
}

pub(crate) fn stencil_op_to_d3d11(operation: StencilOperation) -> D3D11_STENCIL_OP {
    match operation {
        StencilOperation::Keep => D3D11_STENCIL_OP_KEEP,
        StencilOperation::Zero => D3D11_STENCIL_OP_ZERO,
        StencilOperation::Replace => D3D11_STENCIL_OP_REPLACE,
        StencilOperation::Inc => D3D11_STENCIL_OP_INCR_SAT,
        StencilOperation::IncWrap => D3D11_STENCIL_OP_INCR,
        StencilOperation::Dec => D3D11_STENCIL_OP_DECR_SAT,
        StencilOperation::DecWrap => D3D11_STENCIL_OP_DECR,
        StencilOperation::Invert => D3D11_STENCIL_OP_INVERT,
    }
}

pub(crate) fn blend_to_d3d11(source: BlendSource) -> D3D11_BLEND {
    match source {
        BlendSource::Zero => D3D11_BLEND_ZERO,
        BlendSource::One => D3D11_BLEND_ONE,
        BlendSource::SrcColor => D3D11_BLEND_SRC_COLOR,
        BlendSource::InvSrcColor => D3D11_BLEND_INV_SRC_COLOR,
        BlendSource::SrcAlpha => D3D11_BLEND_SRC_ALPHA,
        BlendSource::InvSrcAlpha => D3D11_BLEND_INV_SRC_ALPHA,
        BlendSource::DestAlpha => D3D11_BLEND_DEST_ALPHA,
        BlendSource::InvDestAlpha => D3D11_BLEND_INV_DEST_ALPHA,
        BlendSource::DestColor => D3D11_BLEND_DEST_COLOR,
        BlendSource::InvDestColor => D3D11_BLEND_INV_DEST_COLOR,
        BlendSource::SrcAlphaSat => D3D11_BLEND_SRC_ALPHA_SAT,
        BlendSource::BlendFactor => D3D11_BLEND_BLEND_FACTOR,
        BlendSource::InvBlendFactor => D3D11_BLEND_INV_BLEND_FACTOR,
    }
}

/// Alpha-channel factor: D3D11 rejects `*_COLOR` factors there
pub(crate) fn alpha_blend_to_d3d11(source: BlendSource) -> D3D11_BLEND {
    match source {
        BlendSource::SrcColor => D3D11_BLEND_SRC_ALPHA,
        BlendSource::InvSrcColor => D3D11_BLEND_INV_SRC_ALPHA,
        BlendSource::DestColor => D3D11_BLEND_DEST_ALPHA,
        BlendSource::InvDestColor => D3D11_BLEND_INV_DEST_ALPHA,
        other => blend_to_d3d11(other),
    }
}

pub(crate) fn blend_op_to_d3d11(operation: BlendOperation) -> D3D11_BLEND_OP {
    match operation {
        BlendOperation::Add => D3D11_BLEND_OP_ADD,
        BlendOperation::Sub => D3D11_BLEND_OP_SUBTRACT,
        BlendOperation::RevSub => D3D11_BLEND_OP_REV_SUBTRACT,
        BlendOperation::Min => D3D11_BLEND_OP_MIN,
        BlendOperation::Max => D3D11_BLEND_OP_MAX,
    }
}

/// Cull mode; `FrontAndBack` has no D3D11 equivalent and culls back faces
pub(crate) fn cull_to_d3d11(mode: CullMode) -> D3D11_CULL_MODE {
    match mode {
        CullMode::None => D3D11_CULL_NONE,
        CullMode::Front => D3D11_CULL_FRONT,
        CullMode::Back | CullMode::FrontAndBack => D3D11_CULL_BACK,
    }
}

pub(crate) fn fill_to_d3d11(mode: FillMode) -> D3D11_FILL_MODE {
    match mode {
        FillMode::Solid => D3D11_FILL_SOLID,
        FillMode::Wireframe => D3D11_FILL_WIREFRAME,
    }
}

// ===== SAMPLERS =====

pub(crate) fn address_to_d3d11(address: SamplerAddress) -> D3D11_TEXTURE_ADDRESS_MODE {
    match address {
        SamplerAddress::Wrap => D3D11_TEXTURE_ADDRESS_WRAP,
        SamplerAddress::Mirror => D3D11_TEXTURE_ADDRESS_MIRROR,
        SamplerAddress::ClampEdge => D3D11_TEXTURE_ADDRESS_CLAMP,
        SamplerAddress::ClampBorder => D3D11_TEXTURE_ADDRESS_BORDER,
        SamplerAddress::MirrorOnce => D3D11_TEXTURE_ADDRESS_MIRROR_ONCE,
    }
}

pub(crate) fn filter_to_d3d11(filter: SamplerFilter) -> D3D11_FILTER {
    let comparison = filter.is_comparison();
    if filter.anisotropy().is_some() {
        return if comparison { D3D11_FILTER_COMPARISON_ANISOTROPIC } else { D3D11_FILTER_ANISOTROPIC };
    }

    match (filter.is_min_linear(), filter.is_mip_linear(), comparison) {
        (false, _, false) => D3D11_FILTER_MIN_MAG_MIP_POINT,
        (true, false, false) => D3D11_FILTER_MIN_MAG_LINEAR_MIP_POINT,
        (true, true, false) => D3D11_FILTER_MIN_MAG_MIP_LINEAR,
        (false, _, true) => D3D11_FILTER_COMPARISON_MIN_MAG_MIP_POINT,
        (true, false, true) => D3D11_FILTER_COMPARISON_MIN_MAG_LINEAR_MIP_POINT,
        (true, true, true) => D3D11_FILTER_COMPARISON_MIN_MAG_MIP_LINEAR,
    }
}

// ===== PIPELINES =====

pub(crate) fn topology_to_d3d11(topology: PrimitiveTopology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        PrimitiveTopology::TriangleList => D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        PrimitiveTopology::TriangleStrip => D3D11_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
        PrimitiveTopology::LineList => D3D11_PRIMITIVE_TOPOLOGY_LINELIST,
        PrimitiveTopology::PointList => D3D11_PRIMITIVE_TOPOLOGY_POINTLIST,
        PrimitiveTopology::Patch { control_points } => {
            let control_points = control_points.clamp(1, 32);
            D3D11_PRIMITIVE_TOPOLOGY_1_CONTROL_POINT_PATCHLIST + (control_points - 1)
        }
    }
}

// ===== VIEWS =====

pub(crate) fn srv_dimension(kind: ViewKind) -> D3D_SRV_DIMENSION {
    match kind {
        ViewKind::Texture1D => D3D11_SRV_DIMENSION_TEXTURE1D,
        ViewKind::Texture1DArray => D3D11_SRV_DIMENSION_TEXTURE1DARRAY,
        ViewKind::Texture2D => D3D11_SRV_DIMENSION_TEXTURE2D,
        ViewKind::Texture2DArray => D3D11_SRV_DIMENSION_TEXTURE2DARRAY,
        ViewKind::Cube => D3D11_SRV_DIMENSION_TEXTURECUBE,
        ViewKind::CubeArray => D3D11_SRV_DIMENSION_TEXTURECUBEARRAY,
        ViewKind::Multisampled => D3D11_SRV_DIMENSION_TEXTURE2DMS,
        ViewKind::MultisampledArray => D3D11_SRV_DIMENSION_TEXTURE2DMSARRAY,
        ViewKind::Texture3D => D3D11_SRV_DIMENSION_TEXTURE3D,
    }
}

pub(crate) fn feature_level_name(level: D3D_FEATURE_LEVEL) -> &'static str {
    match level {
        D3D_FEATURE_LEVEL_11_1 => "11_1",
        D3D_FEATURE_LEVEL_11_0 => "11_0",
        D3D_FEATURE_LEVEL_10_1 => "10_1",
        D3D_FEATURE_LEVEL_10_0 => "10_0",
        _ => "unknown",
    }
}

#[cfg(test)]
#[path = "d3d11_conv_tests.rs"]
mod tests;
