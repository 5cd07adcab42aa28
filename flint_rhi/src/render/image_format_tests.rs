//! Unit tests for image_format.rs

use crate::render::{ImageFormat, ChannelEncoding};

// ============================================================================
// SIZE TESTS
// ============================================================================

#[test]
fn test_bits_per_pixel_common_formats() {
    assert_eq!(ImageFormat::R8Unorm.bits_per_pixel(), 8);
    assert_eq!(ImageFormat::Rg8Unorm.bits_per_pixel(), 16);
    assert_eq!(ImageFormat::Rgba8Unorm.bits_per_pixel(), 32);
    assert_eq!(ImageFormat::Rgba16Float.bits_per_pixel(), 64);
    assert_eq!(ImageFormat::Rgb32Float.bits_per_pixel(), 96);
    assert_eq!(ImageFormat::Rgba32Float.bits_per_pixel(), 128);
    assert_eq!(ImageFormat::D24UnormS8Uint.bits_per_pixel(), 32);
    assert_eq!(ImageFormat::Unknown.bits_per_pixel(), 0);
}

#[test]
fn test_block_sizes() {
    assert_eq!(ImageFormat::Bc1Unorm.block_size_bytes(), Some(8));
    assert_eq!(ImageFormat::Bc4Snorm.block_size_bytes(), Some(8));
    assert_eq!(ImageFormat::Bc2Unorm.block_size_bytes(), Some(16));
    assert_eq!(ImageFormat::Bc3UnormSrgb.block_size_bytes(), Some(16));
    assert_eq!(ImageFormat::Bc5Unorm.block_size_bytes(), Some(16));
    assert_eq!(ImageFormat::Bc6hUf16.block_size_bytes(), Some(16));
    assert_eq!(ImageFormat::Bc7Unorm.block_size_bytes(), Some(16));
    assert_eq!(ImageFormat::Rgba8Unorm.block_size_bytes(), None);
    assert!(ImageFormat::Bc7Unorm.is_compressed());
    assert!(!ImageFormat::R8Unorm.is_compressed());
}

#[test]
fn test_block_bits_per_pixel_match_block_size() {
    for format in [ImageFormat::Bc1Unorm, ImageFormat::Bc3Unorm, ImageFormat::Bc5Snorm, ImageFormat::Bc7UnormSrgb] {
        let block = format.block_size_bytes().unwrap();
        assert_eq!(format.bits_per_pixel() * 16 / 8, block, "{:?}", format);
    }
}

// ============================================================================
// CLASSIFICATION TESTS
// ============================================================================

#[test]
fn test_depth_and_stencil_classification() {
    assert!(ImageFormat::D16Unorm.is_depth());
    assert!(ImageFormat::D32Float.is_depth());
    assert!(ImageFormat::D24UnormS8Uint.is_depth());
    assert!(ImageFormat::D32FloatS8Uint.is_depth());
    assert!(!ImageFormat::R32Float.is_depth());

    assert!(ImageFormat::D24UnormS8Uint.has_stencil());
    assert!(!ImageFormat::D32Float.has_stencil());
}

#[test]
fn test_srgb_classification() {
    assert!(ImageFormat::Rgba8UnormSrgb.is_srgb());
    assert!(ImageFormat::Bc1UnormSrgb.is_srgb());
    assert!(!ImageFormat::Rgba8Unorm.is_srgb());
}

#[test]
fn test_channel_encodings() {
    assert_eq!(ImageFormat::Rgba8Unorm.channel_encoding(), ChannelEncoding::Unorm8);
    assert_eq!(ImageFormat::R16Float.channel_encoding(), ChannelEncoding::Float16);
    assert_eq!(ImageFormat::Rgba32Float.channel_encoding(), ChannelEncoding::Float32);
    assert_eq!(ImageFormat::Rg11B10Float.channel_encoding(), ChannelEncoding::Packed);
    assert_eq!(ImageFormat::Bc1Unorm.channel_encoding(), ChannelEncoding::Block);
    assert_eq!(ImageFormat::Rgba8Unorm.channel_count(), 4);
    assert_eq!(ImageFormat::Rg16Float.channel_count(), 2);
}

#[test]
fn test_element_size() {
    assert_eq!(ImageFormat::R16Uint.element_size(), 2);
    assert_eq!(ImageFormat::R32Uint.element_size(), 4);
    assert_eq!(ImageFormat::Rgb32Float.element_size(), 12);
}
