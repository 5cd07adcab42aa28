//! Unit tests for vulkan_command_list.rs (host-side helpers)

use flint_rhi::flint::render::Viewport;

use super::*;

// ============================================================================
// VIEWPORT
// ============================================================================

#[test]
fn test_flipped_viewport_full_target() {
    let viewport = flipped_viewport(&Viewport::new(800, 600));
    assert_eq!(viewport.x, 0.0);
    assert_eq!(viewport.y, 600.0);
    assert_eq!(viewport.width, 800.0);
    assert_eq!(viewport.height, -600.0);
    assert_eq!(viewport.min_depth, 0.0);
    assert_eq!(viewport.max_depth, 1.0);
}

#[test]
fn test_flipped_viewport_offset() {
    let viewport = flipped_viewport(&Viewport {
        x: 10,
        y: 20,
        width: 100,
        height: 50,
        min_depth: 0.25,
        max_depth: 0.75,
    });
    assert_eq!(viewport.x, 10.0);
    assert_eq!(viewport.y, 70.0);
    assert_eq!(viewport.height, -50.0);
    assert_eq!(viewport.min_depth, 0.25);
}

// ============================================================================
// BUFFER UPDATE CHUNKS
// ============================================================================

#[test]
fn test_update_chunks_small() {
    let chunks = update_chunks(&[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].0, 0);
    assert_eq!(chunks[0].1, vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_update_chunks_pads_tail() {
    let chunks = update_chunks(&[9, 9, 9, 9, 7]);
    assert_eq!(chunks[0].1, vec![9, 9, 9, 9, 7, 0, 0, 0]);
}

#[test]
fn test_update_chunks_splits_large_updates() {
    let data = vec![0xAB; UPDATE_CHUNK * 2 + 12];
    let chunks = update_chunks(&data);

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].0, 0);
    assert_eq!(chunks[1].0, UPDATE_CHUNK as u64);
    assert_eq!(chunks[2].0, (UPDATE_CHUNK * 2) as u64);
    assert_eq!(chunks[2].1.len(), 12);
    assert!(chunks.iter().all(|(_, bytes)| bytes.len() <= UPDATE_CHUNK));
}

#[test]
fn test_update_chunks_empty() {
    assert!(update_chunks(&[]).is_empty());
}
