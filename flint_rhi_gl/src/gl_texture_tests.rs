//! Unit tests for gl_texture.rs (host-side helpers)

use super::*;

// ============================================================================
// D24S8 PACKING
// ============================================================================

#[test]
fn test_d24s8_moves_stencil_to_low_byte() {
    // depth 0x123456, stencil 0xAB in flint order
    let mut bytes = 0xAB12_3456u32.to_le_bytes().to_vec();
    d24s8_to_gl(&mut bytes);
    let gl = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(gl >> 8, 0x12_3456);
    assert_eq!(gl & 0xFF, 0xAB);
}

#[test]
fn test_d24s8_conversion_is_reversible() {
    let original: Vec<u8> = (0u8..16).collect();
    let mut bytes = original.clone();
    d24s8_to_gl(&mut bytes);
    assert_ne!(bytes, original);
    d24s8_from_gl(&mut bytes);
    assert_eq!(bytes, original);
}

#[test]
fn test_d24s8_ignores_trailing_partial_texel() {
    let mut bytes = vec![1, 2, 3, 4, 5, 6];
    d24s8_to_gl(&mut bytes);
    assert_eq!(&bytes[4..], &[5, 6]);
}
