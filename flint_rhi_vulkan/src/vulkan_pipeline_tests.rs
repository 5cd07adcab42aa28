//! Unit tests for vulkan_pipeline.rs (host-side construction helpers)

use ash::vk;
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
// VERTEX INPUT
// ============================================================================

#[test]
fn test_vertex_input_one_binding_per_slot() {
    let layout = [
        entry(0, ImageFormat::Rgb32Float, 0, 0, 0),
        entry(1, ImageFormat::Rg32Float, 0, 12, 0),
        entry(2, ImageFormat::Rgba32Float, 1, 0, 1),
    ];
    let (bindings, attributes) = vertex_input(&layout);

    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].binding, 0);
    assert_eq!(bindings[0].input_rate, vk::VertexInputRate::VERTEX);
    assert_eq!(bindings[1].binding, 1);
    assert_eq!(bindings[1].input_rate, vk::VertexInputRate::INSTANCE);

    assert_eq!(attributes.len(), 3);
    assert_eq!(attributes[1].location, 1);
    assert_eq!(attributes[1].offset, 12);
    assert_eq!(attributes[1].format, vk::Format::R32G32_SFLOAT);
    assert_eq!(attributes[2].binding, 1);
}

#[test]
fn test_vertex_input_empty_layout() {
    let (bindings, attributes) = vertex_input(&[]);
    assert!(bindings.is_empty());
    assert!(attributes.is_empty());
}

// ============================================================================
// DYNAMIC STATE / FORMATS
// ============================================================================

#[test]
fn test_dynamic_states_depth_bounds_optional() {
    let without = dynamic_states(false);
    let with = dynamic_states(true);
    assert!(!without.contains(&vk::DynamicState::DEPTH_BOUNDS));
    assert!(with.contains(&vk::DynamicState::DEPTH_BOUNDS));
    assert_eq!(with.len(), without.len() + 1);
    assert!(without.contains(&vk::DynamicState::VERTEX_INPUT_BINDING_STRIDE));
    assert!(without.contains(&vk::DynamicState::STENCIL_REFERENCE));
}

#[test]
fn test_format_has_stencil() {
    assert!(format_has_stencil(vk::Format::D24_UNORM_S8_UINT));
    assert!(format_has_stencil(vk::Format::D32_SFLOAT_S8_UINT));
    assert!(!format_has_stencil(vk::Format::D32_SFLOAT));
    assert!(!format_has_stencil(vk::Format::UNDEFINED));
}
