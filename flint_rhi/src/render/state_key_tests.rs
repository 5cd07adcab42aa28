//! Unit tests for state_key.rs
//!
//! Key equality must coincide with field equality over the full cardinality
//! of every enum field, padding bits must stay zero and float fields must be
//! quantized into stable buckets.

use std::collections::HashSet;
use crate::render::{
    BlendOperation, BlendSource, BlendStateDesc, BlendStateKey, ColorWriteMask, ComparisonFunction,
    CullMode, DepthStencilStateDesc, DepthStencilStateKey, FillMode, RasterizerStateDesc,
    RasterizerStateKey, StencilFaceDesc, StencilOperation, dequantize_unit_float,
    quantize_unit_float,
};

// ============================================================================
// ENUM TABLES
// ============================================================================

#[test]
fn test_enum_counts() {
    assert_eq!(BlendSource::COUNT, 13);
    assert_eq!(BlendOperation::COUNT, 5);
    assert_eq!(CullMode::COUNT, 4);
    assert_eq!(FillMode::COUNT, 2);
    assert_eq!(ComparisonFunction::COUNT, 8);
    assert_eq!(StencilOperation::COUNT, 8);
}

#[test]
fn test_enum_from_index_matches_discriminant() {
    for (i, value) in BlendSource::ALL.iter().enumerate() {
        assert_eq!(*value as usize, i);
        assert_eq!(BlendSource::from_index(i), Some(*value));
    }
    for (i, value) in StencilOperation::ALL.iter().enumerate() {
        assert_eq!(*value as usize, i);
    }
    assert_eq!(BlendSource::from_index(BlendSource::COUNT), None);
    assert_eq!(CullMode::from_index(7), None);
}

// ============================================================================
// BLEND KEY
// ============================================================================

#[test]
fn test_blend_key_color_equation_is_injective() {
    let mut keys = HashSet::new();
    for &source in BlendSource::ALL {
        for &dest in BlendSource::ALL {
            for &operation in BlendOperation::ALL {
                let desc = BlendStateDesc { source, dest, operation, ..BlendStateDesc::default() };
                let key = desc.state_key();
                assert!(keys.insert(key), "duplicate key for {:?}/{:?}/{:?}", source, dest, operation);

                let decoded = key.to_desc().unwrap();
                assert_eq!(decoded.source, source);
                assert_eq!(decoded.dest, dest);
                assert_eq!(decoded.operation, operation);
            }
        }
    }
    assert_eq!(keys.len(), BlendSource::COUNT * BlendSource::COUNT * BlendOperation::COUNT);
}

#[test]
fn test_blend_key_alpha_equation_is_injective() {
    let mut keys = HashSet::new();
    for &source_alpha in BlendSource::ALL {
        for &dest_alpha in BlendSource::ALL {
            for &operation_alpha in BlendOperation::ALL {
                let desc = BlendStateDesc {
                    use_separate_alpha: true,
                    source_alpha,
                    dest_alpha,
                    operation_alpha,
                    ..BlendStateDesc::default()
                };
                assert!(keys.insert(desc.state_key()));
            }
        }
    }
    assert_eq!(keys.len(), BlendSource::COUNT * BlendSource::COUNT * BlendOperation::COUNT);
}

#[test]
fn test_blend_key_flags_and_write_mask() {
    let mut keys = HashSet::new();
    for bits in 0..16u8 {
        for flags in 0..8u8 {
            let desc = BlendStateDesc {
                write_mask: ColorWriteMask::from_bits_truncate(bits),
                enable_blend: flags & 1 != 0,
                use_separate_alpha: flags & 2 != 0,
                enable_alpha_to_coverage: flags & 4 != 0,
                ..BlendStateDesc::default()
            };
            let key = desc.state_key();
            assert!(keys.insert(key));

            let decoded = key.to_desc().unwrap();
            assert_eq!(decoded.write_mask.bits(), bits);
            assert_eq!(decoded.enable_blend, flags & 1 != 0);
            assert_eq!(decoded.use_separate_alpha, flags & 2 != 0);
            assert_eq!(decoded.enable_alpha_to_coverage, flags & 4 != 0);
            // Padding bit 7
            assert_eq!(key.value() & 0x80, 0);
        }
    }
}

#[test]
fn test_blend_keys_differing_only_in_sample_mask() {
    let a = BlendStateDesc { sample_mask: 0xFFFF_FFFF, ..BlendStateDesc::alpha_blending() };
    let b = BlendStateDesc { sample_mask: 0x0000_000F, ..BlendStateDesc::alpha_blending() };

    let (ka, kb) = (a.state_key(), b.state_key());
    assert_ne!(ka, kb);
    assert_ne!(a, b);
    assert_eq!(ka.value() & !BlendStateKey::SAMPLE_MASK_BITS, kb.value() & !BlendStateKey::SAMPLE_MASK_BITS);
    assert_eq!(ka.sample_mask(), 0xFFFF_FFFF);
    assert_eq!(kb.sample_mask(), 0xF);
}

#[test]
fn test_blend_default_roundtrip() {
    let desc = BlendStateDesc::default();
    let decoded = desc.state_key().to_desc().unwrap();
    assert_eq!(decoded, desc);
    assert_eq!(decoded.write_mask, ColorWriteMask::ALL);
    assert_eq!(decoded.sample_mask, !0);
    assert!(!decoded.enable_blend);
}

// ============================================================================
// DEPTH-STENCIL KEY
// ============================================================================

#[test]
fn test_depth_stencil_key_face_is_injective() {
    let mut front_keys = HashSet::new();
    let mut back_keys = HashSet::new();
    for &comparison_function in ComparisonFunction::ALL {
        for &pass_operation in StencilOperation::ALL {
            for &fail_operation in StencilOperation::ALL {
                for &z_fail_operation in StencilOperation::ALL {
                    let face = StencilFaceDesc { comparison_function, pass_operation, fail_operation, z_fail_operation };

                    let front = DepthStencilStateDesc { front: face, ..DepthStencilStateDesc::default() };
                    let key = front.state_key();
                    assert!(front_keys.insert(key));
                    assert_eq!(key.to_desc().unwrap().front, face);

                    let back = DepthStencilStateDesc { back: face, ..DepthStencilStateDesc::default() };
                    assert!(back_keys.insert(back.state_key()));
                    assert_eq!(back.state_key().to_desc().unwrap().back, face);
                }
            }
        }
    }
    assert_eq!(front_keys.len(), 8 * 8 * 8 * 8);
    assert_eq!(back_keys.len(), 8 * 8 * 8 * 8);
}

#[test]
fn test_depth_stencil_key_scalar_fields() {
    let mut keys = HashSet::new();
    for &depth_comparison_func in ComparisonFunction::ALL {
        for flags in 0..16u8 {
            let desc = DepthStencilStateDesc {
                depth_comparison_func,
                enable_depth_test: flags & 1 != 0,
                enable_stencil_test: flags & 2 != 0,
                enable_depth_write: flags & 4 != 0,
                enable_depth_bounds_test: flags & 8 != 0,
                ..DepthStencilStateDesc::default()
            };
            let key = desc.state_key();
            assert!(keys.insert(key));
            let decoded = key.to_desc().unwrap();
            assert_eq!(decoded.depth_comparison_func, depth_comparison_func);
            assert_eq!(decoded.enable_depth_bounds_test, flags & 8 != 0);
        }
    }

    for value in [0u8, 1, 0x7F, 0xFF] {
        let desc = DepthStencilStateDesc {
            stencil_ref_value: value,
            stencil_read_mask: value ^ 0x0F,
            stencil_write_mask: value ^ 0xF0,
            ..DepthStencilStateDesc::default()
        };
        let decoded = desc.state_key().to_desc().unwrap();
        assert_eq!(decoded.stencil_ref_value, value);
        assert_eq!(decoded.stencil_read_mask, value ^ 0x0F);
        assert_eq!(decoded.stencil_write_mask, value ^ 0xF0);
    }
}

#[test]
fn test_depth_stencil_key_keeps_depth_bounds_exactly() {
    let a = DepthStencilStateDesc { depth_bounds_min: 0.25, depth_bounds_max: 0.75, ..DepthStencilStateDesc::default() };
    let b = DepthStencilStateDesc { depth_bounds_min: 0.25, depth_bounds_max: 0.750001, ..DepthStencilStateDesc::default() };
    assert_ne!(a.state_key(), b.state_key());

    let decoded = a.state_key().to_desc().unwrap();
    assert_eq!(decoded.depth_bounds_min, 0.25);
    assert_eq!(decoded.depth_bounds_max, 0.75);
}

#[test]
fn test_depth_stencil_key_folds_negative_zero() {
    let a = DepthStencilStateDesc { depth_bounds_min: 0.0, ..DepthStencilStateDesc::default() };
    let b = DepthStencilStateDesc { depth_bounds_min: -0.0, ..DepthStencilStateDesc::default() };
    assert_eq!(a.state_key(), b.state_key());
    assert_eq!(a, b);
}

#[test]
fn test_depth_stencil_key_padding_is_zero() {
    let desc = DepthStencilStateDesc {
        stencil_ref_value: 0xFF,
        stencil_read_mask: 0xFF,
        stencil_write_mask: 0xFF,
        front: StencilFaceDesc {
            comparison_function: ComparisonFunction::Equal,
            pass_operation: StencilOperation::Invert,
            fail_operation: StencilOperation::Invert,
            z_fail_operation: StencilOperation::Invert,
        },
        back: StencilFaceDesc {
            comparison_function: ComparisonFunction::Equal,
            pass_operation: StencilOperation::Invert,
            fail_operation: StencilOperation::Invert,
            z_fail_operation: StencilOperation::Invert,
        },
        ..DepthStencilStateDesc::default()
    };
    let key = desc.state_key().value();
    assert_eq!(key & (1 << 31), 0);
    assert_eq!((key >> 56) & 0xFF, 0);
}

#[test]
fn test_depth_stencil_default_values() {
    let desc = DepthStencilStateDesc::default();
    let decoded = DepthStencilStateKey::from_desc(&desc).to_desc().unwrap();
    assert!(decoded.enable_depth_test);
    assert!(decoded.enable_depth_write);
    assert!(!decoded.enable_stencil_test);
    assert_eq!(decoded.depth_comparison_func, ComparisonFunction::Always);
    assert_eq!(decoded.stencil_ref_value, 1);
    assert_eq!(decoded.front.pass_operation, StencilOperation::Replace);
    assert_eq!(decoded.depth_bounds_max, 1.0);
}

// ============================================================================
// RASTERIZER KEY
// ============================================================================

#[test]
fn test_rasterizer_key_enum_fields_are_injective() {
    let mut keys = HashSet::new();
    for &cull_mode in CullMode::ALL {
        for &fill_mode in FillMode::ALL {
            for use_triangle_ccw in [false, true] {
                let desc = RasterizerStateDesc { cull_mode, fill_mode, use_triangle_ccw, ..RasterizerStateDesc::default() };
                let key = desc.state_key();
                assert!(keys.insert(key));

                let decoded = key.to_desc().unwrap();
                assert_eq!(decoded.cull_mode, cull_mode);
                assert_eq!(decoded.fill_mode, fill_mode);
                assert_eq!(decoded.use_triangle_ccw, use_triangle_ccw);
            }
        }
    }
    assert_eq!(keys.len(), CullMode::COUNT * FillMode::COUNT * 2);
}

#[test]
fn test_rasterizer_key_use_flags() {
    let desc = RasterizerStateDesc { depth_bias: 0.5, ..RasterizerStateDesc::default() };
    let key = RasterizerStateKey::from_desc(&desc).value();
    assert_ne!(key & (1 << 5), 0);
    assert_eq!(key & (1 << 6), 0);
    assert_eq!(key & (1 << 7), 0);

    let decoded = RasterizerStateKey::from_desc(&desc).to_desc().unwrap();
    assert!((decoded.depth_bias - 0.5).abs() < 1.0 / 127.0);
    assert_eq!(decoded.slope_scale, 0.0);
}

#[test]
fn test_rasterizer_zero_bucket_keys_match() {
    let zero = RasterizerStateDesc::default();
    let tiny = RasterizerStateDesc { depth_bias: 1e-4, slope_scale: 2e-4, depth_bias_clamp: 1e-3, ..zero };
    assert_eq!(quantize_unit_float(1e-4), quantize_unit_float(0.0));
    assert_eq!(RasterizerStateKey::from_desc(&zero), RasterizerStateKey::from_desc(&tiny));
    assert_eq!(RasterizerStateKey::from_desc(&tiny).value() & 0xE0, 0);

    let decoded = RasterizerStateKey::from_desc(&tiny).to_desc().unwrap();
    assert_eq!(decoded.depth_bias, 0.0);
    assert_eq!(decoded.depth_bias_clamp, 0.0);
}

#[test]
fn test_rasterizer_same_bucket_is_equal() {
    let a = RasterizerStateDesc { depth_bias: 0.5, ..RasterizerStateDesc::default() };
    let b = RasterizerStateDesc { depth_bias: 0.501, ..RasterizerStateDesc::default() };
    let c = RasterizerStateDesc { depth_bias: 0.55, ..RasterizerStateDesc::default() };
    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ============================================================================
// QUANTIZATION
// ============================================================================

#[test]
fn test_quantize_boundaries() {
    assert_eq!(quantize_unit_float(-1.0), 0);
    assert_eq!(quantize_unit_float(1.0), 255);
    assert_eq!(quantize_unit_float(0.0), 128);
    assert_eq!(quantize_unit_float(-5.0), 0);
    assert_eq!(quantize_unit_float(42.0), 255);
    assert_eq!(quantize_unit_float(f32::NAN), quantize_unit_float(0.0));
}

#[test]
fn test_quantize_is_monotonic() {
    let mut previous = 0u8;
    for i in -100..=100 {
        let bucket = quantize_unit_float(i as f32 / 100.0);
        assert!(bucket >= previous);
        previous = bucket;
    }
}

#[test]
fn test_dequantize_lands_in_same_bucket() {
    for bucket in 0..=255u8 {
        assert_eq!(quantize_unit_float(dequantize_unit_float(bucket)), bucket);
    }
}
