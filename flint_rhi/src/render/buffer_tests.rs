//! Unit tests for buffer.rs
//!
//! The usage table is the single source every backend derives its native
//! flags from, so it is pinned here entry by entry.

use serial_test::serial;

use crate::error::Error;
use crate::flint::Rhi;
use crate::log::LogSeverity;
use crate::render::headless::HeadlessBuffer;
use crate::render::{
    downcast_native, BindMode, Buffer, BufferBindFlags, BufferBinding, BufferDesc, BufferMiscFlags,
    BufferShape, BufferType, CpuAccess, HeadlessBackend, ImageFormat, IndexType, RenderDevice,
    RenderDeviceConfig, ShaderStageFlags,
};
use crate::rhi::test_support::CapturingLogger;

fn headless_device() -> RenderDevice {
    RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), RenderDeviceConfig::default())
}

fn contents(buffer: &Buffer) -> Vec<u8> {
    let native = buffer.native().unwrap();
    downcast_native::<HeadlessBuffer>(native.as_any(), "Buffer").unwrap().contents()
}

// ============================================================================
// USAGE TABLE
// ============================================================================

#[test]
fn test_usage_table_regression() {
    let uav = BufferBindFlags::SHADER_RESOURCE | BufferBindFlags::UNORDERED_ACCESS;
    let none = BufferMiscFlags::empty();

    let table = [
        (BufferType::Constant, BufferBindFlags::CONSTANT, true, none),
        (BufferType::DynamicVertex, BufferBindFlags::VERTEX, true, none),
        (BufferType::Vertex, BufferBindFlags::VERTEX, false, none),
        (BufferType::DynamicIndex, BufferBindFlags::INDEX, true, none),
        (BufferType::Index, BufferBindFlags::INDEX, false, none),
        (BufferType::UavBuffer, uav, false, none),
        (BufferType::UavTexture1D, uav, false, none),
        (BufferType::UavTexture2D, uav, false, none),
        (BufferType::UavTexture3D, uav, false, none),
        (BufferType::Structured, uav, false, BufferMiscFlags::STRUCTURED),
        (BufferType::AppendStructured, uav, false, BufferMiscFlags::STRUCTURED | BufferMiscFlags::APPEND),
        (BufferType::IndirectDrawArguments, uav, false, BufferMiscFlags::DRAW_INDIRECT_ARGS),
        (BufferType::Unknown, BufferBindFlags::SHADER_RESOURCE, false, none),
    ];

    for (buffer_type, bind, dynamic, misc) in table {
        let usage = buffer_type.usage();
        assert_eq!(usage.bind, bind, "{:?}", buffer_type);
        assert_eq!(usage.dynamic, dynamic, "{:?}", buffer_type);
        assert_eq!(usage.misc, misc, "{:?}", buffer_type);
        let expected_cpu = if dynamic { CpuAccess::WRITE } else { CpuAccess::empty() };
        assert_eq!(usage.cpu_access, expected_cpu, "{:?}", buffer_type);
    }
}

#[test]
fn test_type_predicates() {
    assert!(BufferType::DynamicVertex.is_vertex());
    assert!(!BufferType::Index.is_vertex());
    assert!(BufferType::DynamicIndex.is_index());
    assert!(BufferType::UavTexture3D.is_texture());
    assert!(!BufferType::UavBuffer.is_texture());
    assert!(BufferType::IndirectDrawArguments.is_element_array());
    assert!(!BufferType::Constant.is_element_array());
}

// ============================================================================
// DESCRIPTION
// ============================================================================

#[test]
fn test_structured_byte_width_is_size_times_stride() {
    let desc = BufferDesc::structured(16, 100, false);
    assert_eq!(desc.byte_width(), 1600);
    assert_eq!(BufferDesc::structured(16, 100, true).buffer_type, BufferType::AppendStructured);
}

#[test]
fn test_image_byte_width() {
    let desc = BufferDesc {
        buffer_type: BufferType::UavTexture2D,
        shape: BufferShape::Image { width: 32, height: 16, depth: 0, mip_count: 1 },
        view_format: ImageFormat::Rgba16Float,
        stride: 0,
    };
    assert_eq!(desc.byte_width(), 32 * 16 * 8);
    assert!(desc.validate().is_ok());
}

#[test]
fn test_index_type_from_view_format() {
    assert_eq!(BufferDesc::index(64, ImageFormat::R16Uint, false).index_type(), IndexType::U16);
    assert_eq!(BufferDesc::index(64, ImageFormat::R32Uint, true).index_type(), IndexType::U32);
    assert_eq!(IndexType::U16.size_bytes(), 2);
    assert_eq!(IndexType::U32.size_bytes(), 4);
}

#[test]
fn test_validate_rejects_bad_descs() {
    assert!(matches!(BufferDesc::constant(0).validate(), Err(Error::InvalidResource(_))));
    assert!(matches!(BufferDesc::vertex(64, 0, false).validate(), Err(Error::InvalidResource(_))));

    let linear_texture = BufferDesc {
        buffer_type: BufferType::UavTexture2D,
        shape: BufferShape::Linear { size: 64, single_element_size: 4 },
        view_format: ImageFormat::R32Float,
        stride: 0,
    };
    assert!(matches!(linear_texture.validate(), Err(Error::InvalidResource(_))));
}

// ============================================================================
// WRAPPER
// ============================================================================

#[test]
fn test_binding_follows_type() {
    let device = headless_device();
    let stages = ShaderStageFlags::VERTEX | ShaderStageFlags::PIXEL;

    let mut constant = Buffer::create(&device, BufferDesc::constant(256), None).unwrap();
    let mut vertex = Buffer::create(&device, BufferDesc::vertex(96, 12, false), None).unwrap();
    let mut index = Buffer::create(&device, BufferDesc::index(12, ImageFormat::R16Uint, false), None).unwrap();
    let mut structured = Buffer::create(&device, BufferDesc::structured(16, 4, false), None).unwrap();

    assert_eq!(constant.binding(3, stages, BindMode::WriteOnly), BufferBinding::Constant { index: 3, stages });
    assert_eq!(vertex.binding(1, stages, BindMode::WriteOnly), BufferBinding::Vertex { slot: 1, stride: 12 });
    assert_eq!(index.binding(0, stages, BindMode::ReadOnly), BufferBinding::Index { index_type: IndexType::U16 });
    assert_eq!(
        structured.binding(2, ShaderStageFlags::COMPUTE, BindMode::ReadOnly),
        BufferBinding::Resource { index: 2, stages: ShaderStageFlags::COMPUTE, mode: BindMode::ReadOnly }
    );

    constant.destroy(&device);
    vertex.destroy(&device);
    index.destroy(&device);
    structured.destroy(&device);
}

#[test]
fn test_initial_data_is_uploaded() {
    let device = headless_device();
    let mut buffer = Buffer::create(&device, BufferDesc::vertex(8, 4, false), Some(&[1u8, 2, 3, 4][..])).unwrap();

    assert_eq!(contents(&buffer), vec![1, 2, 3, 4, 0, 0, 0, 0]);
    buffer.destroy(&device);
}

#[test]
fn test_initial_data_larger_than_buffer_is_rejected() {
    let device = headless_device();
    let result = Buffer::create(&device, BufferDesc::constant(4), Some(&[0u8; 8][..]));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_update_dynamic_buffer() {
    let device = headless_device();
    let mut buffer = Buffer::create(&device, BufferDesc::constant(4), None).unwrap();

    buffer.update(&device, &[9, 8, 7, 6]).unwrap();
    assert_eq!(contents(&buffer), vec![9, 8, 7, 6]);

    assert!(matches!(buffer.update(&device, &[0; 5]), Err(Error::InvalidResource(_))));
    buffer.destroy(&device);
}

#[test]
#[serial]
fn test_update_static_buffer_fails_to_map() {
    let capture = CapturingLogger::install();
    let device = headless_device();
    let mut buffer = Buffer::create(&device, BufferDesc::vertex(4, 4, false), Some(&[1u8, 1, 1, 1][..])).unwrap();

    let result = buffer.update(&device, &[2, 2, 2, 2]);
    let errors = capture.messages_at(LogSeverity::Error);
    Rhi::reset_logger();

    assert!(matches!(result, Err(Error::MappingFailed(_))));
    assert!(errors.iter().any(|m| m == "Failed to map buffer!"));
    // No side effects
    assert_eq!(contents(&buffer), vec![1, 1, 1, 1]);
    buffer.destroy(&device);
}

#[test]
fn test_use_after_destroy() {
    let device = headless_device();
    let mut buffer = Buffer::create(&device, BufferDesc::constant(16), None).unwrap();
    buffer.destroy(&device);

    assert!(matches!(buffer.native(), Err(Error::InvalidResource(_))));
    assert!(matches!(buffer.update(&device, &[0; 4]), Err(Error::InvalidResource(_))));
}
