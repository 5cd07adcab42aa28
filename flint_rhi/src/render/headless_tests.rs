//! Unit tests for the headless backend

use super::{encode_color_texel, encode_depth_texel, HeadlessBuffer, HeadlessTexture};
use crate::error::Error;
use crate::render::{
    downcast_native, BackendKind, BufferDesc, ImageFormat, NativeBuffer, NativeCommandList, PipelineState,
    PipelineStateDesc, RenderBackend, RenderDevice, RenderDeviceConfig, Shader, ShaderBlob,
    ShaderStage, Texture, TextureDescription,
};
use crate::render::HeadlessBackend;

fn headless_device() -> RenderDevice {
    RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), RenderDeviceConfig::default())
}

/// Native buffer type no backend knows about
struct ForeignBuffer;

impl NativeBuffer for ForeignBuffer {}

// ============================================================================
// TEXEL ENCODING
// ============================================================================

#[test]
fn test_encode_unorm8_and_bgra_swizzle() {
    let color = [1.0, 0.5, 0.0, 1.0];
    assert_eq!(encode_color_texel(ImageFormat::Rgba8Unorm, color), Some(vec![255, 128, 0, 255]));
    assert_eq!(encode_color_texel(ImageFormat::Bgra8Unorm, color), Some(vec![0, 128, 255, 255]));
}

#[test]
fn test_encode_clamps_normalized_values() {
    assert_eq!(encode_color_texel(ImageFormat::R8Unorm, [2.0, 0.0, 0.0, 0.0]), Some(vec![255]));
    assert_eq!(encode_color_texel(ImageFormat::R8Snorm, [-3.0, 0.0, 0.0, 0.0]), Some(vec![(-127i8) as u8]));
}

#[test]
fn test_encode_wide_formats() {
    let texel = encode_color_texel(ImageFormat::Rg32Float, [0.25, -1.5, 9.0, 9.0]).unwrap();
    let mut expected = 0.25f32.to_le_bytes().to_vec();
    expected.extend_from_slice(&(-1.5f32).to_le_bytes());
    assert_eq!(texel, expected);

    let texel = encode_color_texel(ImageFormat::R16Unorm, [1.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(texel, vec![0xFF, 0xFF]);
}

#[test]
fn test_encode_rgb10a2() {
    let texel = encode_color_texel(ImageFormat::Rgb10A2Unorm, [1.0, 0.0, 1.0, 1.0]).unwrap();
    let packed = u32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]);
    assert_eq!(packed, 0x3FF | (0x3FF << 20) | (0x3 << 30));
}

#[test]
fn test_encode_unsupported_formats() {
    assert_eq!(encode_color_texel(ImageFormat::Rgba16Float, [0.0; 4]), None);
    assert_eq!(encode_color_texel(ImageFormat::Bc1Unorm, [0.0; 4]), None);
}

#[test]
fn test_encode_depth_formats() {
    assert_eq!(encode_depth_texel(ImageFormat::D32Float, 1.0, 0), Some(1.0f32.to_le_bytes().to_vec()));
    assert_eq!(encode_depth_texel(ImageFormat::D16Unorm, 1.0, 0), Some(vec![0xFF, 0xFF]));
    assert_eq!(encode_depth_texel(ImageFormat::D24UnormS8Uint, 1.0, 7), Some(vec![0xFF, 0xFF, 0xFF, 7]));

    let texel = encode_depth_texel(ImageFormat::D32FloatS8Uint, 0.0, 3).unwrap();
    assert_eq!(texel.len(), 8);
    assert_eq!(texel[4], 3);

    assert_eq!(encode_depth_texel(ImageFormat::Rgba8Unorm, 1.0, 0), None);
}

// ============================================================================
// BACKEND
// ============================================================================

#[test]
fn test_kind_and_backbuffer() {
    let backend = HeadlessBackend::new(200, 100);
    assert_eq!(backend.kind(), BackendKind::Headless);
    assert_eq!(backend.backbuffer_size(), (200, 100));
    assert_eq!(backend.stats().submits, 0);
}

#[test]
fn test_read_subresource_range() {
    let device = headless_device();
    let desc = TextureDescription { mip_count: 2, ..TextureDescription::texture_2d(ImageFormat::R8Unorm, 4, 4) };
    let payload: Vec<u8> = (0..20).collect();
    let mut texture = Texture::create_2d(&device, desc, Some(payload.as_slice())).unwrap();
    let native = texture.native().unwrap();

    assert_eq!(device.backend().read_subresource(native, 0, 1).unwrap(), vec![16, 17, 18, 19]);
    assert!(matches!(device.backend().read_subresource(native, 0, 2), Err(Error::InvalidResource(_))));
    assert!(matches!(device.backend().read_subresource(native, 1, 0), Err(Error::InvalidResource(_))));

    texture.destroy(&device);
}

#[test]
fn test_debug_name_is_stored() {
    let device = headless_device();
    let mut texture =
        Texture::create_2d(&device, TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 2, 2), None).unwrap();
    texture.set_resource_name(&device, "albedo").unwrap();

    let native = downcast_native::<HeadlessTexture>(texture.native().unwrap().as_any(), "Texture").unwrap();
    assert_eq!(native.debug_name(), "albedo");
    assert!(!native.is_render_target());

    texture.destroy(&device);
}

#[test]
fn test_compute_pipeline_has_no_sub_states() {
    let device = headless_device();
    let mut shader = Shader::create(&device, &ShaderBlob::new(ShaderStage::Compute, vec![0xC0])).unwrap();
    let desc = PipelineStateDesc { compute_shader: Some(&shader), ..PipelineStateDesc::default() };
    let mut pipeline = PipelineState::create(&device, &desc).unwrap();

    let native = pipeline.native().unwrap();
    assert!(native.blend_state().is_none());
    assert!(native.depth_stencil_state().is_none());
    assert!(native.rasterizer_state().is_none());
    assert!(pipeline.is_compute());
    assert_eq!(pipeline.blend_key(), None);

    pipeline.destroy(&device);
    shader.destroy(&device);
}

#[test]
fn test_submit_while_recording_is_rejected() {
    let backend = HeadlessBackend::new(8, 8);
    let mut list = backend.create_command_list().unwrap();
    list.begin().unwrap();

    assert!(matches!(backend.submit_command_list(list.as_mut()), Err(Error::InvalidState(_))));

    list.end().unwrap();
    assert!(backend.submit_command_list(list.as_mut()).is_ok());
    assert_eq!(backend.stats().submits, 1);
}

#[test]
fn test_foreign_native_objects_are_rejected() {
    let backend = HeadlessBackend::new(8, 8);
    let foreign = ForeignBuffer;
    let result = backend.update_buffer(&foreign, &[0; 4]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));

    let mut list = backend.create_command_list().unwrap();
    list.begin().unwrap();
    let list: &mut dyn NativeCommandList = list.as_mut();
    assert!(matches!(list.update_buffer(&foreign, &[0; 4]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_oversized_buffer_writes_are_rejected() {
    let backend = HeadlessBackend::new(8, 8);
    let desc = BufferDesc::vertex(8, 4, true);
    assert!(matches!(backend.create_buffer(&desc, Some(&[1u8; 12][..])), Err(Error::InvalidResource(_))));

    let buffer = backend.create_buffer(&desc, Some(&[1u8; 4][..])).unwrap();
    assert!(matches!(backend.update_buffer(buffer.as_ref(), &[2; 9]), Err(Error::InvalidResource(_))));

    let mut list = backend.create_command_list().unwrap();
    list.begin().unwrap();
    assert!(matches!(list.as_mut().update_buffer(buffer.as_ref(), &[3; 16]), Err(Error::InvalidResource(_))));

    // Nothing was written by the rejected calls
    let native = downcast_native::<HeadlessBuffer>(buffer.as_ref().as_any(), "Buffer").unwrap();
    assert_eq!(native.contents(), [1, 1, 1, 1, 0, 0, 0, 0]);

    backend.update_buffer(buffer.as_ref(), &[5; 8]).unwrap();
    assert_eq!(native.contents(), [5; 8]);
}
