//! Unit tests for gl_pipeline.rs (vertex layout translation)

use flint_rhi::flint::render::{ImageFormat, InputLayoutEntry};

use super::*;

fn entry(location: u32, format: ImageFormat, slot: u32, offset: u32, step: u32) -> InputLayoutEntry {
    InputLayoutEntry {
        location,
        format,
        vertex_buffer_index: slot,
        offset,
        instance_step_rate: step,
    }
}

// ============================================================================
// VERTEX LAYOUT
// ============================================================================

#[test]
fn test_vertex_layout_attributes_and_divisors() {
    let layout = [
        entry(0, ImageFormat::Rgb32Float, 0, 0, 0),
        entry(1, ImageFormat::Rgba8Unorm, 0, 12, 0),
        entry(2, ImageFormat::Rgba8Uint, 1, 0, 1),
    ];
    let (attributes, divisors) = vertex_layout(&layout).unwrap();

    assert_eq!(attributes.len(), 3);
    assert_eq!((attributes[0].size, attributes[0].data_type), (3, glow::FLOAT));
    assert_eq!(attributes[0].kind, AttributeKind::Float);
    assert_eq!(attributes[1].kind, AttributeKind::Normalized);
    assert_eq!(attributes[1].offset, 12);
    assert_eq!(attributes[2].kind, AttributeKind::Integer);
    assert_eq!(attributes[2].binding, 1);

    assert_eq!(divisors, vec![(0, 0), (1, 1)]);
}

#[test]
fn test_vertex_layout_empty() {
    let (attributes, divisors) = vertex_layout(&[]).unwrap();
    assert!(attributes.is_empty());
    assert!(divisors.is_empty());
}

#[test]
fn test_vertex_layout_rejects_depth_formats() {
    let result = vertex_layout(&[entry(0, ImageFormat::D32Float, 0, 0, 0)]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}
