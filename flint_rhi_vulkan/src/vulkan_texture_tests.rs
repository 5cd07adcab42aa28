//! Unit tests for vulkan_texture.rs (host-side helpers only)

use ash::vk;
use flint_rhi::flint::render::ImageFormat;

use super::*;

// ============================================================================
// RANGES
// ============================================================================

#[test]
fn test_full_range_starts_at_origin() {
    let range = full_range(vk::ImageAspectFlags::COLOR, 5, 6);
    assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
    assert_eq!(range.base_mip_level, 0);
    assert_eq!(range.level_count, 5);
    assert_eq!(range.base_array_layer, 0);
    assert_eq!(range.layer_count, 6);
}

// ============================================================================
// DEPTH-STENCIL READBACK PACKING
// ============================================================================

#[test]
fn test_interleave_d24s8_packs_stencil_in_high_byte() {
    // Two texels: depth 0x00ABCDEF / 0x00123456, stencil 0x7F / 0x01
    let depth = [0xEF, 0xCD, 0xAB, 0x00, 0x56, 0x34, 0x12, 0x00];
    let stencil = [0x7F, 0x01];

    let packed = interleave_depth_stencil(ImageFormat::D24UnormS8Uint, &depth, &stencil);

    assert_eq!(packed.len(), 8);
    assert_eq!(u32::from_le_bytes([packed[0], packed[1], packed[2], packed[3]]), 0x7FAB_CDEF);
    assert_eq!(u32::from_le_bytes([packed[4], packed[5], packed[6], packed[7]]), 0x0112_3456);
}

#[test]
fn test_interleave_d32s8_pads_stencil() {
    let depth = 0.5f32.to_le_bytes();
    let stencil = [0x42];

    let packed = interleave_depth_stencil(ImageFormat::D32FloatS8Uint, &depth, &stencil);

    assert_eq!(packed.len(), 8);
    assert_eq!(f32::from_le_bytes([packed[0], packed[1], packed[2], packed[3]]), 0.5);
    assert_eq!(&packed[4..], &[0x42, 0, 0, 0]);
}

#[test]
fn test_interleave_empty_input() {
    assert!(interleave_depth_stencil(ImageFormat::D24UnormS8Uint, &[], &[]).is_empty());
}
