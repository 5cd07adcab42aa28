//! Unit tests for vulkan_swapchain.rs (selection helpers)

use ash::vk;

use super::*;

fn capabilities(current: (u32, u32), min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min_count,
        max_image_count: max_count,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    }
}

// ============================================================================
// PRESENT MODE
// ============================================================================

#[test]
fn test_vsync_always_fifo() {
    let all = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(true, &all), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_no_vsync_prefers_mailbox_then_immediate() {
    let all = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
    assert_eq!(choose_present_mode(false, &all), vk::PresentModeKHR::MAILBOX);

    let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(false, &no_mailbox), vk::PresentModeKHR::IMMEDIATE);

    assert_eq!(choose_present_mode(false, &[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
}

// ============================================================================
// EXTENT / IMAGE COUNT / FORMAT
// ============================================================================

#[test]
fn test_extent_uses_surface_extent_when_fixed() {
    let caps = capabilities((800, 600), 2, 8);
    assert_eq!(choose_extent(&caps, 1024, 768), vk::Extent2D { width: 800, height: 600 });
}

#[test]
fn test_extent_clamped_when_surface_defers() {
    let caps = capabilities((u32::MAX, u32::MAX), 2, 8);
    assert_eq!(choose_extent(&caps, 8000, 0), vk::Extent2D { width: 4096, height: 1 });
}

#[test]
fn test_image_count_bounds() {
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 8), 3), 3);
    assert_eq!(choose_image_count(&capabilities((1, 1), 3, 8), 2), 3);
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 2), 4), 2);
    // max 0 means unbounded
    assert_eq!(choose_image_count(&capabilities((1, 1), 2, 0), 6), 6);
}

#[test]
fn test_surface_format_fallback() {
    let formats = [
        vk::SurfaceFormatKHR { format: vk::Format::R8G8B8A8_UNORM, color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR },
        vk::SurfaceFormatKHR { format: vk::Format::B8G8R8A8_UNORM, color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR },
    ];
    assert_eq!(choose_surface_format(&formats, vk::Format::B8G8R8A8_UNORM).map(|f| f.format), Some(vk::Format::B8G8R8A8_UNORM));
    assert_eq!(choose_surface_format(&formats, vk::Format::A2B10G10R10_UNORM_PACK32).map(|f| f.format), Some(vk::Format::R8G8B8A8_UNORM));
    assert!(choose_surface_format(&[], vk::Format::B8G8R8A8_UNORM).is_none());
}
