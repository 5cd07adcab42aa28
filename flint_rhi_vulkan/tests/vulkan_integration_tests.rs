//! Integration tests for the Vulkan backend
//!
//! All tests require a GPU and are marked with #[ignore]. They share one
//! device (see gpu_test_utils) and run serially.
//!
//! Run with: cargo test -p flint_rhi_vulkan --test vulkan_integration_tests -- --ignored

mod gpu_test_utils;

use flint_rhi::flint::render::{
    BackendKind, Buffer, BufferDesc, CommandList, ImageFormat, QueryPool, QueryType, RenderTarget,
    Sampler, SamplerDesc, Shader, ShaderBlob, ShaderStage, Texture, TextureDescription, Viewport,
};
use flint_rhi::flint::Error;
use gpu_test_utils::get_test_device;
use serial_test::serial;

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_device_capabilities() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    assert_eq!(device.backend_kind(), BackendKind::Vulkan);
    let caps = device.capabilities();
    assert!(caps.deferred_recording);
    assert!(caps.multithreaded_recording);
    assert!(caps.host_readback);
    assert_eq!(device.backbuffer_size(), (800, 600));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_present_and_resize() {
    let device = get_test_device();
    let mut device = device.lock().unwrap();

    let mut cmd = CommandList::create(&device).unwrap();
    cmd.begin().unwrap();
    cmd.bind_backbuffer().unwrap();
    cmd.set_viewport(Viewport::new(800, 600)).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.present().unwrap();

    device.resize_backbuffer(640, 480).unwrap();
    assert_eq!(device.backbuffer_size(), (640, 480));
    device.present().unwrap();

    device.set_vsync_state(true);
    device.present().unwrap();
    device.set_vsync_state(false);

    device.resize_backbuffer(800, 600).unwrap();
    device.wait_idle().unwrap();
    cmd.destroy(&device);
}

// ============================================================================
// TEXTURES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_texture_upload_readback() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let desc = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 64, 32);
    let payload: Vec<u8> = (0..64u32 * 32).flat_map(|i| [i as u8, (i >> 8) as u8, 7, 255]).collect();

    let mut texture = Texture::create_2d(&device, desc, Some(payload.as_slice())).unwrap();
    let readback = texture.retrieve_texels_ldr(&device).unwrap();
    assert_eq!(readback, payload);

    texture.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_layered_clear() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let desc = TextureDescription {
        array_size: 2,
        mip_count: 2,
        ..TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 8, 8)
    };
    let mut target = RenderTarget::create_2d(&device, desc, None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    cmd.bind_render_targets_layered(&[&target], None, 1, 1).unwrap();
    cmd.clear_render_target(&target, [0.0, 1.0, 0.0, 1.0]).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.wait_idle().unwrap();

    let cleared = target.retrieve_layer_texels_ldr(&device, 1, 1).unwrap();
    assert_eq!(cleared.len(), 4 * 4 * 4);
    assert!(cleared.chunks(4).all(|texel| texel == [0, 255, 0, 255]));
    let untouched = target.retrieve_layer_texels_ldr(&device, 0, 1).unwrap();
    assert!(untouched.iter().all(|&b| b == 0));

    cmd.destroy(&device);
    target.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_depth_clear_readback() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let desc = TextureDescription::texture_2d(ImageFormat::D32Float, 16, 16);
    let mut depth = RenderTarget::create_2d(&device, desc, None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    cmd.clear_depth_render_target(&depth, Some(0.5)).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.wait_idle().unwrap();

    let values = depth.retrieve_texels_hdr(&device).unwrap();
    assert_eq!(values.len(), 16 * 16);
    assert!(values.iter().all(|&d| d == 0.5));

    cmd.destroy(&device);
    depth.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_mismatched_targets_fall_back_to_backbuffer() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let mut small = RenderTarget::create_2d(&device, TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 8, 8), None).unwrap();
    let mut large = RenderTarget::create_2d(&device, TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 16, 16), None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    cmd.bind_render_targets(&[&small, &large], None, 0).unwrap();
    assert!(cmd.state().backbuffer_bound);
    assert!(cmd.state().render_targets.is_empty());
    cmd.end().unwrap();

    cmd.destroy(&device);
    large.destroy(&device);
    small.destroy(&device);
}

// ============================================================================
// OTHER RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_buffers_and_samplers() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let mut constants = Buffer::create(&device, BufferDesc::constant(256), None).unwrap();
    constants.update(&device, &[1u8; 64]).unwrap();

    let mut vertices = Buffer::create(&device, BufferDesc::vertex(1024, 16, false), None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();
    cmd.begin().unwrap();
    cmd.update_buffer(&vertices, &[2u8; 512]).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.wait_idle().unwrap();

    let mut sampler = Sampler::create(&device, SamplerDesc::default()).unwrap();

    sampler.destroy(&device);
    cmd.destroy(&device);
    vertices.destroy(&device);
    constants.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_invalid_spirv_rejected() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let result = Shader::create(&device, &ShaderBlob::new(ShaderStage::Vertex, vec![1, 2, 3]));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_vulkan_timestamps() {
    let device = get_test_device();
    let device = device.lock().unwrap();
    if !device.capabilities().timestamp_queries {
        return;
    }

    let mut queries = QueryPool::create(&device, QueryType::Timestamp, 4).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();
    let start = queries.allocate_query_handle();
    let end = queries.allocate_query_handle();

    cmd.begin().unwrap();
    queries.write_timestamp(&mut cmd, start).unwrap();
    cmd.bind_backbuffer().unwrap();
    queries.write_timestamp(&mut cmd, end).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.wait_idle().unwrap();

    let elapsed = queries.elapsed_milliseconds(&device, start, end).unwrap();
    assert!(elapsed >= 0.0);

    cmd.destroy(&device);
    queries.destroy(&device);
}
