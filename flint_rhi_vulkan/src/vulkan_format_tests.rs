//! Unit tests for the Vulkan lookup tables
//!
//! Pure mapping functions, no GPU required.

use ash::vk;
use flint_rhi::flint::render::{
    BlendOperation, BlendSource, BufferDesc, BufferShape, BufferType, ColorWriteMask,
    ComparisonFunction, CullMode, FillMode, ImageFormat, PrimitiveTopology, SamplerAddress,
    ShaderStageFlags, StencilOperation, TextureDimension, ViewKind,
};
use gpu_allocator::MemoryLocation;

use super::*;

// ============================================================================
// IMAGE FORMATS
// ============================================================================

#[test]
fn test_color_formats() {
    assert_eq!(image_format_to_vk(ImageFormat::Rgba8Unorm), vk::Format::R8G8B8A8_UNORM);
    assert_eq!(image_format_to_vk(ImageFormat::Rgba8UnormSrgb), vk::Format::R8G8B8A8_SRGB);
    assert_eq!(image_format_to_vk(ImageFormat::Bgra8Unorm), vk::Format::B8G8R8A8_UNORM);
    assert_eq!(image_format_to_vk(ImageFormat::Rgba16Float), vk::Format::R16G16B16A16_SFLOAT);
    assert_eq!(image_format_to_vk(ImageFormat::Rgba32Float), vk::Format::R32G32B32A32_SFLOAT);
    assert_eq!(image_format_to_vk(ImageFormat::R8Unorm), vk::Format::R8_UNORM);
}

#[test]
fn test_packed_formats_use_vulkan_component_order() {
    assert_eq!(image_format_to_vk(ImageFormat::Rgb10A2Unorm), vk::Format::A2B10G10R10_UNORM_PACK32);
    assert_eq!(image_format_to_vk(ImageFormat::Rg11B10Float), vk::Format::B10G11R11_UFLOAT_PACK32);
}

#[test]
fn test_depth_formats() {
    assert_eq!(image_format_to_vk(ImageFormat::D16Unorm), vk::Format::D16_UNORM);
    assert_eq!(image_format_to_vk(ImageFormat::D32Float), vk::Format::D32_SFLOAT);
    assert_eq!(image_format_to_vk(ImageFormat::D24UnormS8Uint), vk::Format::D24_UNORM_S8_UINT);
    assert_eq!(image_format_to_vk(ImageFormat::D32FloatS8Uint), vk::Format::D32_SFLOAT_S8_UINT);
}

#[test]
fn test_block_formats() {
    assert_eq!(image_format_to_vk(ImageFormat::Bc1Unorm), vk::Format::BC1_RGBA_UNORM_BLOCK);
    assert_eq!(image_format_to_vk(ImageFormat::Bc3UnormSrgb), vk::Format::BC3_SRGB_BLOCK);
    assert_eq!(image_format_to_vk(ImageFormat::Bc6hUf16), vk::Format::BC6H_UFLOAT_BLOCK);
    assert_eq!(image_format_to_vk(ImageFormat::Bc7UnormSrgb), vk::Format::BC7_SRGB_BLOCK);
}

#[test]
fn test_unknown_format_is_undefined() {
    assert_eq!(image_format_to_vk(ImageFormat::Unknown), vk::Format::UNDEFINED);
}

#[test]
fn test_aspect_masks() {
    assert_eq!(aspect_mask(ImageFormat::Rgba8Unorm), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(ImageFormat::D32Float), vk::ImageAspectFlags::DEPTH);
    assert_eq!(
        aspect_mask(ImageFormat::D24UnormS8Uint),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert_eq!(view_aspect_mask(ImageFormat::D24UnormS8Uint), vk::ImageAspectFlags::DEPTH);
}

#[test]
fn test_clear_values_follow_encoding() {
    let value = clear_color_value(ImageFormat::Rgba8Uint, [3.0, 2.0, 1.0, 0.0]);
    // SAFETY: the union was written through its uint32 member
    assert_eq!(unsafe { value.uint32 }, [3, 2, 1, 0]);

    let value = clear_color_value(ImageFormat::R32Sint, [-4.0, 0.0, 0.0, 0.0]);
    // SAFETY: the union was written through its int32 member
    assert_eq!(unsafe { value.int32 }[0], -4);

    let value = clear_color_value(ImageFormat::Rgba8Unorm, [0.5, 0.25, 0.0, 1.0]);
    // SAFETY: the union was written through its float32 member
    assert_eq!(unsafe { value.float32 }, [0.5, 0.25, 0.0, 1.0]);
}

// ============================================================================
// VIEW SHAPES
// ============================================================================

#[test]
fn test_view_kind_table() {
    let table = [
        (ViewKind::Texture1D, vk::ImageViewType::TYPE_1D),
        (ViewKind::Texture1DArray, vk::ImageViewType::TYPE_1D_ARRAY),
        (ViewKind::Texture2D, vk::ImageViewType::TYPE_2D),
        (ViewKind::Texture2DArray, vk::ImageViewType::TYPE_2D_ARRAY),
        (ViewKind::Cube, vk::ImageViewType::CUBE),
        (ViewKind::CubeArray, vk::ImageViewType::CUBE_ARRAY),
        (ViewKind::Multisampled, vk::ImageViewType::TYPE_2D),
        (ViewKind::MultisampledArray, vk::ImageViewType::TYPE_2D_ARRAY),
        (ViewKind::Texture3D, vk::ImageViewType::TYPE_3D),
    ];
    for (kind, expected) in table {
        assert_eq!(view_kind_to_vk(kind), expected, "{:?}", kind);
    }
}

#[test]
fn test_image_type_rejects_non_image_dimensions() {
    assert_eq!(image_type_to_vk(TextureDimension::Texture2D), Some(vk::ImageType::TYPE_2D));
    assert_eq!(image_type_to_vk(TextureDimension::Buffer), None);
    assert_eq!(image_type_to_vk(TextureDimension::Unknown), None);
}

#[test]
fn test_sample_counts_round_up() {
    assert_eq!(sample_count_to_vk(1), vk::SampleCountFlags::TYPE_1);
    assert_eq!(sample_count_to_vk(4), vk::SampleCountFlags::TYPE_4);
    assert_eq!(sample_count_to_vk(6), vk::SampleCountFlags::TYPE_8);
}

// ============================================================================
// BUFFER USAGE
// ============================================================================

#[test]
fn test_buffer_usage_table_regression() {
    let transfer = vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC;
    let storage = transfer | vk::BufferUsageFlags::STORAGE_BUFFER;

    let table = [
        (BufferType::Constant, transfer | vk::BufferUsageFlags::UNIFORM_BUFFER, MemoryLocation::CpuToGpu),
        (BufferType::DynamicVertex, transfer | vk::BufferUsageFlags::VERTEX_BUFFER, MemoryLocation::CpuToGpu),
        (BufferType::Vertex, transfer | vk::BufferUsageFlags::VERTEX_BUFFER, MemoryLocation::GpuOnly),
        (BufferType::DynamicIndex, transfer | vk::BufferUsageFlags::INDEX_BUFFER, MemoryLocation::CpuToGpu),
        (BufferType::Index, transfer | vk::BufferUsageFlags::INDEX_BUFFER, MemoryLocation::GpuOnly),
        (BufferType::UavBuffer, storage, MemoryLocation::GpuOnly),
        (BufferType::Structured, storage, MemoryLocation::GpuOnly),
        (BufferType::AppendStructured, storage, MemoryLocation::GpuOnly),
        (BufferType::IndirectDrawArguments, storage | vk::BufferUsageFlags::INDIRECT_BUFFER, MemoryLocation::GpuOnly),
        (BufferType::Unknown, storage, MemoryLocation::GpuOnly),
    ];

    for (buffer_type, usage, location) in table {
        let native = buffer_usage_to_vk(buffer_type);
        assert_eq!(native.usage, usage, "{:?}", buffer_type);
        assert_eq!(native.location, location, "{:?}", buffer_type);
    }
}

#[test]
fn test_uav_textures_become_storage_images() {
    let desc = BufferDesc {
        buffer_type: BufferType::UavTexture3D,
        shape: BufferShape::Image { width: 8, height: 8, depth: 8, mip_count: 1 },
        view_format: ImageFormat::R32Float,
        stride: 0,
    };
    assert_eq!(storage_image_type(&desc), Some((vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D)));
    assert_eq!(storage_image_type(&BufferDesc::constant(16)), None);
    assert!(storage_image_usage().contains(vk::ImageUsageFlags::STORAGE));
}

// ============================================================================
// SHADERS AND TOPOLOGY
// ============================================================================

#[test]
fn test_shader_stage_sets() {
    assert_eq!(
        shader_stages_to_vk(ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(
        shader_stages_to_vk(ShaderStageFlags::ALL),
        vk::ShaderStageFlags::VERTEX
            | vk::ShaderStageFlags::TESSELLATION_CONTROL
            | vk::ShaderStageFlags::TESSELLATION_EVALUATION
            | vk::ShaderStageFlags::FRAGMENT
            | vk::ShaderStageFlags::COMPUTE
    );
}

#[test]
fn test_topologies() {
    assert_eq!(topology_to_vk(PrimitiveTopology::TriangleStrip), vk::PrimitiveTopology::TRIANGLE_STRIP);
    assert_eq!(
        topology_to_vk(PrimitiveTopology::Patch { control_points: 3 }),
        vk::PrimitiveTopology::PATCH_LIST
    );
}

// ============================================================================
// FIXED-FUNCTION STATE
// ============================================================================

#[test]
fn test_every_state_enum_value_maps() {
    // Distinct inputs must never collapse onto one native value
    let compare: Vec<_> = ComparisonFunction::ALL.iter().map(|&f| compare_op_to_vk(f)).collect();
    let stencil: Vec<_> = StencilOperation::ALL.iter().map(|&op| stencil_op_to_vk(op)).collect();
    let factors: Vec<_> = BlendSource::ALL.iter().map(|&s| blend_factor_to_vk(s)).collect();
    let ops: Vec<_> = BlendOperation::ALL.iter().map(|&op| blend_op_to_vk(op)).collect();
    let culls: Vec<_> = CullMode::ALL.iter().map(|&c| cull_mode_to_vk(c)).collect();
    let fills: Vec<_> = FillMode::ALL.iter().map(|&f| fill_mode_to_vk(f)).collect();

    fn all_distinct<T: PartialEq>(values: &[T]) -> bool {
        values.iter().enumerate().all(|(i, a)| values[i + 1..].iter().all(|b| a != b))
    }

    assert!(all_distinct(&compare));
    assert!(all_distinct(&stencil));
    assert!(all_distinct(&factors));
    assert!(all_distinct(&ops));
    assert!(all_distinct(&culls));
    assert!(all_distinct(&fills));
}

#[test]
fn test_state_enum_spot_checks() {
    assert_eq!(compare_op_to_vk(ComparisonFunction::LEqual), vk::CompareOp::LESS_OR_EQUAL);
    assert_eq!(stencil_op_to_vk(StencilOperation::IncWrap), vk::StencilOp::INCREMENT_AND_WRAP);
    assert_eq!(blend_factor_to_vk(BlendSource::InvSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_factor_to_vk(BlendSource::BlendFactor), vk::BlendFactor::CONSTANT_COLOR);
    assert_eq!(blend_op_to_vk(BlendOperation::RevSub), vk::BlendOp::REVERSE_SUBTRACT);
    assert_eq!(cull_mode_to_vk(CullMode::FrontAndBack), vk::CullModeFlags::FRONT_AND_BACK);
    assert_eq!(fill_mode_to_vk(FillMode::Wireframe), vk::PolygonMode::LINE);
}

#[test]
fn test_color_write_mask() {
    assert_eq!(color_write_mask_to_vk(ColorWriteMask::ALL), vk::ColorComponentFlags::RGBA);
    assert_eq!(
        color_write_mask_to_vk(ColorWriteMask::R | ColorWriteMask::A),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
    );
    assert!(color_write_mask_to_vk(ColorWriteMask::empty()).is_empty());
}

// ============================================================================
// SAMPLERS
// ============================================================================

#[test]
fn test_sampler_address_modes() {
    assert_eq!(sampler_address_to_vk(SamplerAddress::Wrap), vk::SamplerAddressMode::REPEAT);
    assert_eq!(sampler_address_to_vk(SamplerAddress::ClampBorder), vk::SamplerAddressMode::CLAMP_TO_BORDER);
    assert_eq!(sampler_address_to_vk(SamplerAddress::MirrorOnce), vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE);
}

#[test]
fn test_border_color_snaps_to_builtin() {
    assert_eq!(border_color_to_vk([0.0; 4]), vk::BorderColor::FLOAT_TRANSPARENT_BLACK);
    assert_eq!(border_color_to_vk([0.0, 0.0, 0.0, 1.0]), vk::BorderColor::FLOAT_OPAQUE_BLACK);
    assert_eq!(border_color_to_vk([1.0; 4]), vk::BorderColor::FLOAT_OPAQUE_WHITE);
}
