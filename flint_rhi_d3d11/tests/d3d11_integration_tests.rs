//! Integration tests for the Direct3D 11 backend
//!
//! All tests require a GPU and are marked with #[ignore]. They share one
//! device (see gpu_test_utils) and run serially.
//!
//! Run with: cargo test -p flint_rhi_d3d11 --test d3d11_integration_tests -- --ignored

#![cfg(windows)]

mod gpu_test_utils;

use flint_rhi::flint::render::{
    BackendKind, Buffer, BufferDesc, CommandList, ImageFormat, QueryPool, QueryType, RenderTarget,
    Sampler, SamplerDesc, SamplerFilter, Shader, ShaderBlob, ShaderStage, Texture, TextureDescription,
    Viewport,
};
use flint_rhi::flint::Error;
use flint_rhi_d3d11::flint::get_debug_layer_stats;
use gpu_test_utils::get_test_device;
use serial_test::serial;

// ============================================================================
// DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_device_capabilities() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    assert_eq!(device.backend_kind(), BackendKind::Direct3D11);
    let caps = device.capabilities();
    assert!(caps.deferred_recording);
    assert!(caps.multithreaded_recording);
    assert!(caps.host_readback);
    assert!(caps.timestamp_queries);
    assert_eq!(device.backbuffer_size(), (800, 600));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_present_and_resize() {
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

    assert!(device.resize_backbuffer(0, 480).is_err());
    assert_eq!(device.backbuffer_size(), (640, 480));

    device.set_vsync_state(true);
    device.present().unwrap();
    device.set_vsync_state(false);

    device.resize_backbuffer(800, 600).unwrap();
    device.wait_idle().unwrap();
    cmd.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_recording_is_consumed_by_playback() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let mut cmd = CommandList::create(&device).unwrap();
    cmd.begin().unwrap();
    cmd.bind_backbuffer().unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    assert!(matches!(cmd.playback(&device), Err(Error::InvalidState(_))));

    // Recording again starts from a clean deferred context
    cmd.begin().unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();

    device.wait_idle().unwrap();
    cmd.destroy(&device);
}

// ============================================================================
// TEXTURES
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_texture_upload_readback() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    // 60 texels wide: the staging row pitch is padded by the driver
    let desc = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 60, 32);
    let payload: Vec<u8> = (0..60u32 * 32).flat_map(|i| [i as u8, (i >> 8) as u8, 7, 255]).collect();

    let mut texture = Texture::create_2d(&device, desc, Some(payload.as_slice())).unwrap();
    let readback = texture.retrieve_texels_ldr(&device).unwrap();
    assert_eq!(readback, payload);

    texture.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_layered_clear() {
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

    // Clears cover the whole target
    for layer in 0..2 {
        let cleared = target.retrieve_layer_texels_ldr(&device, layer, 1).unwrap();
        assert_eq!(cleared.len(), 4 * 4 * 4);
        assert!(cleared.chunks(4).all(|texel| texel == [0, 255, 0, 255]));
    }

    cmd.destroy(&device);
    target.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_depth_clear_readback() {
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
fn test_integration_d3d11_volume_render_target() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let desc = TextureDescription { depth: 4, ..TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 8, 8) };
    let mut volume = RenderTarget::create_3d(&device, desc, None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    cmd.bind_render_targets_layered(&[&volume], None, 2, 0).unwrap();
    cmd.clear_render_target(&volume, [1.0, 0.0, 0.0, 1.0]).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    device.wait_idle().unwrap();

    let texels = volume.retrieve_texels_ldr(&device).unwrap();
    assert_eq!(texels.len(), 8 * 8 * 4 * 4);
    assert!(texels.chunks(4).all(|texel| texel == [255, 0, 0, 255]));

    cmd.destroy(&device);
    volume.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_mismatched_targets_fall_back_to_backbuffer() {
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
fn test_integration_d3d11_buffers_and_samplers() {
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

    let mut linear = Sampler::create(&device, SamplerDesc::default()).unwrap();
    let mut shadow = Sampler::create(
        &device,
        SamplerDesc { filter: SamplerFilter::ComparisonTrilinear, ..SamplerDesc::default() },
    )
    .unwrap();

    shadow.destroy(&device);
    linear.destroy(&device);
    cmd.destroy(&device);
    vertices.destroy(&device);
    constants.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_invalid_dxbc_rejected() {
    let device = get_test_device();
    let device = device.lock().unwrap();

    let result = Shader::create(&device, &ShaderBlob::new(ShaderStage::Vertex, vec![1, 2, 3]));
    assert!(matches!(result, Err(Error::InvalidResource(_))));

    // SPIR-V magic is not DXBC
    let spirv = vec![0x03, 0x02, 0x23, 0x07, 0, 0, 1, 0];
    let result = Shader::create(&device, &ShaderBlob::new(ShaderStage::Pixel, spirv));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_timestamps() {
    let device = get_test_device();
    let device = device.lock().unwrap();

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

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_integration_d3d11_debug_layer_is_clean() {
    let device = get_test_device();
    let device = device.lock().unwrap();
    device.wait_idle().unwrap();

    let stats = get_debug_layer_stats();
    assert_eq!(stats.errors, 0, "debug layer reported errors");
}
