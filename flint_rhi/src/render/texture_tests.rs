//! Unit tests for texture.rs
//!
//! Covers the subresource walk, the view-kind decision table, texel
//! conversion and the Texture wrapper on the headless backend.

use crate::render::{
    compute_mip_count, subresource_index, subresource_layouts, texels_to_f32, total_byte_size,
    HeadlessBackend, ImageFormat, RenderDevice, RenderDeviceConfig, SubresourceViewTable, Texture,
    TextureDescription, TextureDimension, TextureFlags, ViewKind,
};
use crate::error::Error;

fn headless_device() -> RenderDevice {
    RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), RenderDeviceConfig::default())
}

fn r8_fixture() -> TextureDescription {
    TextureDescription {
        dimension: TextureDimension::Texture2D,
        format: ImageFormat::R8Unorm,
        width: 4,
        height: 4,
        array_size: 2,
        mip_count: 2,
        ..TextureDescription::default()
    }
}

// ============================================================================
// SUBRESOURCE WALK
// ============================================================================

#[test]
fn test_walk_r8_two_layers_two_mips() {
    let layouts = subresource_layouts(&r8_fixture());
    assert_eq!(layouts.len(), 4);

    let expected = [
        // (layer, mip, width, row_pitch, offset, size)
        (0, 0, 4, 4, 0, 16),
        (0, 1, 2, 2, 16, 4),
        (1, 0, 4, 4, 20, 16),
        (1, 1, 2, 2, 36, 4),
    ];
    for (layout, (layer, mip, width, row_pitch, offset, size)) in layouts.iter().zip(expected) {
        assert_eq!(layout.layer, layer);
        assert_eq!(layout.mip, mip);
        assert_eq!(layout.width, width);
        assert_eq!(layout.row_pitch, row_pitch);
        assert_eq!(layout.offset, offset);
        assert_eq!(layout.size, size);
    }
    assert_eq!(total_byte_size(&r8_fixture()), 40);
}

#[test]
fn test_walk_mips_floor_at_one() {
    let desc = TextureDescription {
        format: ImageFormat::Rgba8Unorm,
        width: 8,
        height: 2,
        mip_count: 4,
        ..TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 8, 2)
    };
    let extents: Vec<_> = subresource_layouts(&desc).iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(extents, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
}

#[test]
fn test_walk_block_compressed() {
    let desc = TextureDescription {
        mip_count: 3,
        ..TextureDescription::texture_2d(ImageFormat::Bc1Unorm, 8, 8)
    };
    let layouts = subresource_layouts(&desc);

    // 8x8 -> 2x2 blocks of 8 bytes
    assert_eq!(layouts[0].row_pitch, 16);
    assert_eq!(layouts[0].num_rows, 2);
    assert_eq!(layouts[0].size, 32);
    // 4x4 -> 1 block
    assert_eq!(layouts[1].size, 8);
    // 2x2 -> still 1 block
    assert_eq!(layouts[2].row_pitch, 8);
    assert_eq!(layouts[2].num_rows, 1);

    let bc7 = TextureDescription::texture_2d(ImageFormat::Bc7Unorm, 4, 4);
    assert_eq!(total_byte_size(&bc7), 16);
}

#[test]
fn test_walk_3d_includes_depth_slices() {
    let desc = TextureDescription {
        dimension: TextureDimension::Texture3D,
        depth: 4,
        mip_count: 2,
        ..TextureDescription::texture_2d(ImageFormat::R16Float, 4, 4)
    };
    let layouts = subresource_layouts(&desc);
    assert_eq!(layouts[0].slice_pitch, 32);
    assert_eq!(layouts[0].size, 128);
    assert_eq!(layouts[1].depth, 2);
    assert_eq!(layouts[1].size, 16);
}

#[test]
fn test_walk_largest_format_at_max_extent() {
    let desc = TextureDescription {
        mip_count: 15,
        ..TextureDescription::texture_2d(ImageFormat::Rgba32Float, 16384, 16384)
    };
    let layouts = subresource_layouts(&desc);
    assert_eq!(layouts.len(), 15);

    // Top mip is a 4 GiB slice
    assert_eq!(layouts[0].row_pitch, 16384 * 16);
    assert_eq!(layouts[0].slice_pitch, 1u64 << 32);
    assert_eq!(layouts[0].size, 1u64 << 32);
    assert_eq!(layouts[1].offset, 1u64 << 32);
    assert_eq!(layouts[14].width, 1);
    assert_eq!(layouts[14].size, 16);

    // Square full chain stays within 4/3 of the top mip
    let total = total_byte_size(&desc);
    assert!(total > 1u64 << 32);
    assert!(total < (1u64 << 32) / 3 * 4 + 64);
}

#[test]
fn test_mip_extent_past_bit_width() {
    let desc = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 4096, 16);
    assert_eq!(desc.mip_extent(4), (256, 1, 1));
    assert_eq!(desc.mip_extent(32), (1, 1, 1));
    assert_eq!(desc.mip_extent(40), (1, 1, 1));
}

#[test]
fn test_subresource_index_and_mip_count() {
    assert_eq!(subresource_index(0, 0, 3), 0);
    assert_eq!(subresource_index(1, 2, 3), 5);
    assert_eq!(compute_mip_count(256, 256), 9);
    assert_eq!(compute_mip_count(256, 1), 1);
    assert_eq!(compute_mip_count(0, 16), 0);
}

// ============================================================================
// VALIDATION / VIEW KIND
// ============================================================================

#[test]
fn test_validate_rejects_zero_counts() {
    let desc = TextureDescription { mip_count: 0, ..r8_fixture() };
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));

    let desc = TextureDescription { width: 0, ..r8_fixture() };
    assert!(desc.validate().is_err());

    // Unknown dimension is not checked
    assert!(TextureDescription::default().validate().is_ok());
    assert!(r8_fixture().validate().is_ok());
}

#[test]
fn test_validate_rejects_mip_count_past_full_chain() {
    // 4x4 has three levels: 4, 2, 1
    let desc = TextureDescription { mip_count: 3, ..r8_fixture() };
    assert!(desc.validate().is_ok());
    let desc = TextureDescription { mip_count: 4, ..r8_fixture() };
    assert!(matches!(desc.validate(), Err(Error::InvalidResource(_))));

    // The longest side decides, including volume depth
    let strip = TextureDescription { mip_count: 9, ..TextureDescription::texture_2d(ImageFormat::R8Unorm, 256, 1) };
    assert!(strip.validate().is_ok());
    let volume = TextureDescription {
        dimension: TextureDimension::Texture3D,
        depth: 32,
        mip_count: 6,
        ..TextureDescription::texture_2d(ImageFormat::R8Unorm, 2, 2)
    };
    assert!(volume.validate().is_ok());

    let device = headless_device();
    let desc = TextureDescription { mip_count: 33, ..TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 64, 64) };
    let result = Texture::create_2d(&device, desc, None);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_validate_cube_array_size() {
    let desc = TextureDescription { flags: TextureFlags::CUBE_MAP, array_size: 4, ..r8_fixture() };
    assert!(desc.validate().is_err());
    let desc = TextureDescription { flags: TextureFlags::CUBE_MAP, array_size: 6, ..r8_fixture() };
    assert!(desc.validate().is_ok());
}

#[test]
fn test_view_kind_decision_table() {
    let base = TextureDescription::texture_2d(ImageFormat::Rgba8Unorm, 16, 16);
    let cases = [
        (base, ViewKind::Texture2D),
        (TextureDescription { array_size: 4, ..base }, ViewKind::Texture2DArray),
        (TextureDescription { flags: TextureFlags::CUBE_MAP, array_size: 6, ..base }, ViewKind::Cube),
        (TextureDescription { flags: TextureFlags::CUBE_MAP, array_size: 12, ..base }, ViewKind::CubeArray),
        (TextureDescription { sampler_count: 4, ..base }, ViewKind::Multisampled),
        (TextureDescription { sampler_count: 4, array_size: 2, ..base }, ViewKind::MultisampledArray),
        // Multisampling wins over the cube flag
        (TextureDescription { sampler_count: 4, flags: TextureFlags::CUBE_MAP, array_size: 6, ..base }, ViewKind::MultisampledArray),
        (TextureDescription { dimension: TextureDimension::Texture1D, ..base }, ViewKind::Texture1D),
        (TextureDescription { dimension: TextureDimension::Texture1D, array_size: 3, ..base }, ViewKind::Texture1DArray),
        (TextureDescription { dimension: TextureDimension::Texture3D, depth: 8, ..base }, ViewKind::Texture3D),
    ];

    for (desc, expected) in cases {
        assert_eq!(desc.view_kind(), expected, "{:?}", desc);
    }
}

// ============================================================================
// TEXEL CONVERSION
// ============================================================================

#[test]
fn test_texels_to_f32_unorm8() {
    let floats = texels_to_f32(ImageFormat::Rgba8Unorm, &[0, 255, 51, 102]).unwrap();
    assert_eq!(floats, vec![0.0, 1.0, 0.2, 0.4]);
}

#[test]
fn test_texels_to_f32_half_float() {
    // 1.0, -2.0, 0.5, +inf
    let bytes: Vec<u8> = [0x3C00u16, 0xC000, 0x3800, 0x7C00]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let floats = texels_to_f32(ImageFormat::Rgba16Float, &bytes).unwrap();
    assert_eq!(floats[0], 1.0);
    assert_eq!(floats[1], -2.0);
    assert_eq!(floats[2], 0.5);
    assert!(floats[3].is_infinite());
}

#[test]
fn test_texels_to_f32_float32_passthrough() {
    let bytes: Vec<u8> = [1.5f32, -3.25].iter().flat_map(|v| v.to_le_bytes()).collect();
    assert_eq!(texels_to_f32(ImageFormat::Rg32Float, &bytes).unwrap(), vec![1.5, -3.25]);
}

#[test]
fn test_texels_to_f32_rgb10a2() {
    let packed: u32 = 1023 | (0 << 10) | (1023 << 20) | (3 << 30);
    let floats = texels_to_f32(ImageFormat::Rgb10A2Unorm, &packed.to_le_bytes()).unwrap();
    assert_eq!(floats, vec![1.0, 0.0, 1.0, 1.0]);
}

#[test]
fn test_texels_to_f32_rejects_compressed() {
    assert!(matches!(texels_to_f32(ImageFormat::Bc1Unorm, &[0; 8]), Err(Error::InvalidResource(_))));
    assert!(texels_to_f32(ImageFormat::D24UnormS8Uint, &[0; 4]).is_err());
}

// ============================================================================
// SUBRESOURCE VIEW TABLE
// ============================================================================

#[test]
fn test_view_table_lookup() {
    let table = SubresourceViewTable::build(3, 2, |layer, mip| Ok((layer, mip))).unwrap();
    assert_eq!(table.get(0, 0), Some(&(0, 0)));
    assert_eq!(table.get(2, 1), Some(&(2, 1)));
    assert_eq!(table.get(3, 0), None);
    assert_eq!(table.get(0, 2), None);
    assert_eq!(table.iter().count(), 6);
}

#[test]
fn test_view_table_propagates_creation_error() {
    let result = SubresourceViewTable::build(2, 2, |layer, _| {
        if layer == 1 {
            Err(Error::BackendError("view creation failed".to_string()))
        } else {
            Ok(())
        }
    });
    assert!(result.is_err());
}

// ============================================================================
// TEXTURE WRAPPER
// ============================================================================

#[test]
fn test_texture_upload_readback_roundtrip() {
    let device = headless_device();
    let payload: Vec<u8> = (0..40u8).collect();

    let mut texture = Texture::create_2d(&device, r8_fixture(), Some(payload.as_slice())).unwrap();
    assert_eq!(texture.retrieve_texels_ldr(&device).unwrap(), payload);

    let hdr = texture.retrieve_texels_hdr(&device).unwrap();
    assert_eq!(hdr.len(), 40);
    assert_eq!(hdr[39], 39.0 / 255.0);

    texture.destroy(&device);
}

#[test]
fn test_texture_rejects_wrong_payload_size() {
    let device = headless_device();
    let result = Texture::create_2d(&device, r8_fixture(), Some(&[0u8; 16][..]));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_texture_resource_name() {
    let device = headless_device();
    let mut texture = Texture::create_2d(&device, r8_fixture(), None).unwrap();
    texture.set_resource_name(&device, "albedo").unwrap();
    assert_eq!(texture.resource_name(), "albedo");
    texture.destroy(&device);
    assert!(texture.native().is_err());
}
