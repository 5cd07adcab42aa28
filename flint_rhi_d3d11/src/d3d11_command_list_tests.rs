//! Unit tests for d3d11_command_list.rs (target validation and conversions)

use flint_rhi::flint::render::{ImageFormat, TextureFlags};

use super::*;

fn target(format: ImageFormat, width: u32, height: u32) -> TextureDescription {
    TextureDescription {
        dimension: TextureDimension::Texture2D,
        format,
        width,
        height,
        ..TextureDescription::default()
    }
}

fn color(width: u32, height: u32) -> TextureDescription {
    target(ImageFormat::Rgba8Unorm, width, height)
}

fn depth(width: u32, height: u32) -> TextureDescription {
    target(ImageFormat::D24UnormS8Uint, width, height)
}

// ============================================================================
// CONVERSIONS
// ============================================================================

#[test]
fn test_viewport_conversion_keeps_origin() {
    let viewport = Viewport { x: 10, y: -4, width: 320, height: 200, min_depth: 0.25, max_depth: 0.75 };
    let native = d3d11_viewport(&viewport);
    assert_eq!((native.TopLeftX, native.TopLeftY), (10.0, -4.0));
    assert_eq!((native.Width, native.Height), (320.0, 200.0));
    assert_eq!((native.MinDepth, native.MaxDepth), (0.25, 0.75));
}

#[test]
fn test_native_stages() {
    assert_eq!(native_stage(ShaderStage::Vertex), NativeStage::Vs);
    assert_eq!(native_stage(ShaderStage::TessControl), NativeStage::Hs);
    assert_eq!(native_stage(ShaderStage::TessEvaluation), NativeStage::Ds);
    assert_eq!(native_stage(ShaderStage::Pixel), NativeStage::Ps);
    assert_eq!(native_stage(ShaderStage::Compute), NativeStage::Cs);
}

#[test]
fn test_append_buffers_reset_their_counter() {
    assert_eq!(initial_uav_count(true), 0);
    assert_eq!(initial_uav_count(false), u32::MAX);
}

// ============================================================================
// TARGET SETS
// ============================================================================

#[test]
fn test_color_and_depth_of_same_size() {
    let (a, b, z) = (color(256, 128), color(256, 128), depth(256, 128));
    assert_eq!(check_target_set(&[&a, &b], Some(&z), None, 0).unwrap(), (256, 128));
}

#[test]
fn test_depth_only_set() {
    let z = depth(64, 64);
    assert_eq!(check_target_set(&[], Some(&z), None, 0).unwrap(), (64, 64));
}

#[test]
fn test_empty_set_is_rejected() {
    assert!(matches!(check_target_set(&[], None, None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_too_many_color_targets() {
    let a = color(16, 16);
    let colors = vec![&a; MAX_COLOR_TARGETS + 1];
    assert!(matches!(check_target_set(&colors, None, None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_size_mismatch_is_rejected() {
    let (a, z) = (color(256, 256), depth(128, 128));
    assert!(matches!(check_target_set(&[&a], Some(&z), None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_sample_count_mismatch_is_rejected() {
    let a = color(64, 64);
    let mut b = color(64, 64);
    b.sampler_count = 4;
    assert!(matches!(check_target_set(&[&a, &b], None, None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_layer_counts_must_match_for_flat_binds() {
    let a = TextureDescription { array_size: 6, ..color(32, 32) };
    let b = TextureDescription { array_size: 4, ..color(32, 32) };
    assert!(check_target_set(&[&a, &b], None, None, 0).is_err());

    // A single layer makes both sides one slice
    assert_eq!(check_target_set(&[&a, &b], None, Some(2), 0).unwrap(), (32, 32));
}

#[test]
fn test_depth_format_as_color_is_rejected() {
    let z = depth(32, 32);
    assert!(matches!(check_target_set(&[&z], None, None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_color_format_as_depth_is_rejected() {
    let (a, b) = (color(32, 32), color(32, 32));
    assert!(matches!(check_target_set(&[&a], Some(&b), None, 0), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_mip_binds_use_mip_extent() {
    let a = TextureDescription { mip_count: 4, ..color(256, 64) };
    let z = TextureDescription { mip_count: 4, ..depth(256, 64) };
    assert_eq!(check_target_set(&[&a], Some(&z), None, 2).unwrap(), (64, 16));
    assert!(check_target_set(&[&a], None, None, 4).is_err());
    assert!(matches!(check_target_set(&[&a], Some(&z), Some(0), 40), Err(Error::IncompleteFramebuffer(_))));
}

#[test]
fn test_volume_flat_bind_counts_w_slices() {
    let volume = TextureDescription {
        dimension: TextureDimension::Texture3D,
        depth: 8,
        mip_count: 2,
        ..color(16, 16)
    };
    let layered = TextureDescription { array_size: 4, mip_count: 2, ..color(16, 16) };

    // Mip 1 has 4 W slices, matching the 4 array layers
    assert_eq!(check_target_set(&[&volume, &layered], None, None, 1).unwrap(), (8, 8));
}

#[test]
fn test_cube_faces_count_as_layers() {
    let cube = TextureDescription { array_size: 6, flags: TextureFlags::CUBE_MAP, ..color(64, 64) };
    let z = TextureDescription { array_size: 6, ..depth(64, 64) };
    assert!(check_target_set(&[&cube], Some(&z), None, 0).is_ok());
}
