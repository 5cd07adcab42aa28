//! Unit tests for d3d11.rs (adapter selection)

use super::*;

fn adapter(name: &str, megabytes: usize, has_output: bool, software: bool) -> AdapterInfo {
    AdapterInfo {
        name: name.to_string(),
        dedicated_video_memory: megabytes * 1024 * 1024,
        has_output,
        software,
    }
}

#[test]
fn test_no_adapters() {
    assert_eq!(pick_adapter(&[]), None);
}

#[test]
fn test_most_memory_wins() {
    let adapters = [
        adapter("Integrated", 128, true, false),
        adapter("Discrete", 8192, true, false),
    ];
    assert_eq!(pick_adapter(&adapters), Some(1));
}

#[test]
fn test_adapter_with_output_preferred() {
    // Headless compute card vs the one driving the monitor
    let adapters = [
        adapter("Compute", 24576, false, false),
        adapter("Display", 4096, true, false),
    ];
    assert_eq!(pick_adapter(&adapters), Some(1));
}

#[test]
fn test_software_adapter_is_last_resort() {
    let adapters = [adapter("Microsoft Basic Render Driver", 0, true, true), adapter("GPU", 0, false, false)];
    assert_eq!(pick_adapter(&adapters), Some(1));

    let warp_only = [adapter("Microsoft Basic Render Driver", 0, false, true)];
    assert_eq!(pick_adapter(&warp_only), Some(0));
}

#[test]
fn test_adapter_name_stops_at_nul() {
    let mut description = [0u16; 128];
    for (slot, c) in description.iter_mut().zip("Radeon RX".encode_utf16()) {
        *slot = c;
    }
    assert_eq!(adapter_name(&description), "Radeon RX");
}

#[test]
fn test_adapter_name_without_nul() {
    let description: Vec<u16> = "GPU".encode_utf16().collect();
    assert_eq!(adapter_name(&description), "GPU");
}

#[test]
fn test_feature_levels_start_at_11_1() {
    assert_eq!(FEATURE_LEVELS[0], d3dcommon::D3D_FEATURE_LEVEL_11_1);
    assert_eq!(FEATURE_LEVELS[FEATURE_LEVELS.len() - 1], d3dcommon::D3D_FEATURE_LEVEL_11_0);
}
