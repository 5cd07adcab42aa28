//! Integration tests driving the public API end to end on the headless backend
//!
//! These cover a full frame worth of work: resources, pipeline binds, render
//! passes, timestamps, playback and readback. No GPU is needed.
//!
//! Run with: cargo test -p flint_rhi --test headless_integration_tests

use flint_rhi::flint::render::{
    AttachmentLoad, BlendState, BlendStateDesc, Buffer, BufferDesc, CommandList, CommandListPool,
    DepthStencilState, DepthStencilStateDesc, HeadlessBackend, HeadlessStatsHandle, ImageFormat,
    PipelineState, PipelineStateDesc, QueryPool, QueryType, RasterizerState, RasterizerStateDesc,
    RenderPassDesc, RenderTarget, Shader, ShaderBlob, ShaderStage, Texture, TextureDescription,
    CullMode, Viewport,
};
use flint_rhi::flint::{Error, RenderDevice};
use flint_rhi::flint::render::RenderDeviceConfig;

fn device_with_counters() -> (RenderDevice, HeadlessStatsHandle) {
    let backend = HeadlessBackend::new(256, 256);
    let counters = backend.stats_handle();
    (RenderDevice::from_backend(Box::new(backend), RenderDeviceConfig::default()), counters)
}

// ============================================================================
// TEXTURE ROUND TRIP
// ============================================================================

#[test]
fn test_integration_rgba8_upload_readback_is_lossless() {
    let (device, _) = device_with_counters();
    let desc = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 256, 256);

    let payload: Vec<u8> = (0..256u32 * 256)
        .flat_map(|i| {
            let (x, y) = (i % 256, i / 256);
            [x as u8, y as u8, (x ^ y) as u8, 255]
        })
        .collect();

    let mut texture = Texture::create_2d(&device, desc, Some(payload.as_slice())).unwrap();
    let readback = texture.retrieve_texels_ldr(&device).unwrap();

    assert_eq!(readback.len(), 256 * 256 * 4);
    assert_eq!(readback, payload);

    texture.destroy(&device);
}

#[test]
fn test_integration_layered_render_target_clear() {
    let (device, _) = device_with_counters();
    let desc = TextureDescription {
        array_size: 2,
        mip_count: 2,
        ..TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 4, 4)
    };
    let mut target = RenderTarget::create_2d(&device, desc, None).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    cmd.bind_render_targets_layered(&[&target], None, 1, 1).unwrap();
    cmd.clear_render_target(&target, [1.0, 0.0, 0.0, 1.0]).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();

    assert!(target.retrieve_layer_texels_ldr(&device, 0, 1).unwrap().iter().all(|&b| b == 0));
    let cleared = target.retrieve_layer_texels_ldr(&device, 1, 1).unwrap();
    assert_eq!(cleared.len(), 2 * 2 * 4);
    assert!(cleared.chunks(4).all(|texel| texel == [255, 0, 0, 255]));

    let hdr = target.retrieve_layer_texels_hdr(&device, 1, 1).unwrap();
    assert_eq!(&hdr[..4], &[1.0, 0.0, 0.0, 1.0]);

    cmd.destroy(&device);
    target.destroy(&device);
}

// ============================================================================
// FRAME
// ============================================================================

#[test]
fn test_integration_frame_with_state_gating() {
    let (device, counters) = device_with_counters();

    let mut vs = Shader::create(&device, &ShaderBlob::new(ShaderStage::Vertex, vec![1, 2, 3])).unwrap();
    let mut ps = Shader::create(&device, &ShaderBlob::new(ShaderStage::Pixel, vec![4, 5, 6])).unwrap();
    let mut opaque = BlendState::create(&device, BlendStateDesc::default()).unwrap();
    let mut blended = BlendState::create(&device, BlendStateDesc::alpha_blending()).unwrap();
    let mut depth = DepthStencilState::create(&device, DepthStencilStateDesc::default()).unwrap();
    let mut raster = RasterizerState::create(
        &device,
        RasterizerStateDesc { cull_mode: CullMode::Back, ..RasterizerStateDesc::default() },
    )
    .unwrap();

    let base = PipelineStateDesc {
        vertex_shader: Some(&vs),
        pixel_shader: Some(&ps),
        blend_state: Some(&opaque),
        depth_stencil_state: Some(&depth),
        rasterizer_state: Some(&raster),
        ..PipelineStateDesc::default()
    };
    let mut first = PipelineState::create(&device, &base).unwrap();
    let mut second = PipelineState::create(&device, &PipelineStateDesc { blend_state: Some(&blended), ..base.clone() }).unwrap();

    let color_desc = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 16, 16);
    let depth_desc = TextureDescription::texture_2d(ImageFormat::D32Float, 16, 16);
    let mut color = RenderTarget::create_2d(&device, color_desc, None).unwrap();
    let mut depth_target = RenderTarget::create_2d(&device, depth_desc, None).unwrap();
    let mut vertices = Buffer::create(&device, BufferDesc::vertex(3 * 12, 12, true), None).unwrap();

    let mut cmd = CommandList::create(&device).unwrap();
    cmd.begin().unwrap();
    let pass = RenderPassDesc::single(&color, [0.0, 0.0, 1.0, 1.0]).with_depth(&depth_target, AttachmentLoad::Clear(1.0));
    cmd.begin_render_pass(&pass).unwrap();
    cmd.set_viewport(Viewport::new(16, 16)).unwrap();
    cmd.bind_vertex_buffer(&vertices, 0).unwrap();

    cmd.bind_pipeline_state(&first).unwrap();
    cmd.draw(3, 0).unwrap();
    cmd.bind_pipeline_state(&first).unwrap();
    cmd.draw(3, 0).unwrap();
    cmd.bind_pipeline_state(&second).unwrap();
    cmd.draw(3, 0).unwrap();

    cmd.end_render_pass().unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();

    let stats = counters.snapshot();
    assert_eq!(stats.pipeline_binds, 3);
    // Only the blend key differs between the two pipelines
    assert_eq!(stats.blend_state_binds, 2);
    assert_eq!(stats.depth_stencil_state_binds, 1);
    assert_eq!(stats.rasterizer_state_binds, 1);
    assert_eq!(stats.draws, 3);
    assert_eq!(stats.submits, 1);

    let texels = color.retrieve_texels_ldr(&device).unwrap();
    assert!(texels.chunks(4).all(|texel| texel == [0, 0, 255, 255]));
    let depth_values = depth_target.retrieve_texels_hdr(&device).unwrap();
    assert!(depth_values.iter().all(|&d| d == 1.0));

    cmd.destroy(&device);
    vertices.destroy(&device);
    depth_target.destroy(&device);
    color.destroy(&device);
    second.destroy(&device);
    first.destroy(&device);
    raster.destroy(&device);
    depth.destroy(&device);
    blended.destroy(&device);
    opaque.destroy(&device);
    ps.destroy(&device);
    vs.destroy(&device);
}

#[test]
fn test_integration_pool_frames_with_timestamps() {
    let (mut device, counters) = device_with_counters();
    let mut lists = CommandListPool::create(&device, 2).unwrap();
    let mut queries = QueryPool::create(&device, QueryType::Timestamp, 4).unwrap();

    let mut frame_times = Vec::new();
    for frame in 0..4u32 {
        let cmd = lists.allocate();
        let start = queries.allocate_query_handle();
        let end = queries.allocate_query_handle();
        assert!(start < queries.capacity() && end < queries.capacity());

        cmd.begin().unwrap();
        queries.write_timestamp(cmd, start).unwrap();
        for _ in 0..=frame {
            cmd.draw(3, 0).unwrap();
        }
        queries.write_timestamp(cmd, end).unwrap();
        cmd.end().unwrap();
        cmd.playback(&device).unwrap();
        device.present().unwrap();

        frame_times.push(queries.elapsed_milliseconds(&device, start, end).unwrap());
    }

    // Each extra draw adds the same amount of GPU time
    let step = frame_times[1] - frame_times[0];
    assert!(step > 0.0);
    for pair in frame_times.windows(2) {
        assert!(((pair[1] - pair[0]) - step).abs() < 1e-9);
    }

    let stats = counters.snapshot();
    assert_eq!(stats.submits, 4);
    assert_eq!(stats.presents, 4);
    assert_eq!(stats.timestamps, 8);

    queries.destroy(&device);
    lists.destroy(&device);
}

#[test]
fn test_integration_lifecycle_errors_surface() {
    let (device, _) = device_with_counters();
    let mut cmd = CommandList::create(&device).unwrap();

    assert!(matches!(cmd.draw(3, 0), Err(Error::InvalidState(_))));
    assert!(matches!(cmd.playback(&device), Err(Error::InvalidState(_))));

    cmd.begin().unwrap();
    assert!(matches!(cmd.begin(), Err(Error::InvalidState(_))));
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();

    // A submitted list can be recorded again
    cmd.begin().unwrap();
    cmd.end().unwrap();

    cmd.destroy(&device);
}
