//! Unit tests for command_list_pool.rs

use crate::error::Error;
use crate::render::{
    CommandListLifecycle, CommandListPool, HeadlessBackend, RenderDevice, RenderDeviceConfig,
};

fn headless_device() -> RenderDevice {
    RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), RenderDeviceConfig::default())
}

// ============================================================================
// ROUND ROBIN
// ============================================================================

#[test]
fn test_allocate_wraps_on_call_n_plus_one() {
    let device = headless_device();
    let mut pool = CommandListPool::create(&device, 3).unwrap();

    let ids: Vec<_> = (0..4).map(|_| pool.allocate().id()).collect();

    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_ne!(ids[0], ids[2]);
    assert_eq!(ids[3], ids[0]);

    pool.destroy(&device);
}

#[test]
fn test_single_list_pool_always_returns_it() {
    let device = headless_device();
    let mut pool = CommandListPool::create(&device, 1).unwrap();

    let first = pool.allocate().id();
    assert_eq!(pool.allocate().id(), first);
    assert_eq!(pool.allocate().id(), first);

    pool.destroy(&device);
}

#[test]
fn test_reused_list_can_be_recorded_again() {
    let device = headless_device();
    let mut pool = CommandListPool::create(&device, 2).unwrap();

    for _ in 0..5 {
        let cmd = pool.allocate();
        cmd.begin().unwrap();
        cmd.draw(3, 0).unwrap();
        cmd.end().unwrap();
        cmd.playback(&device).unwrap();
        assert_eq!(cmd.lifecycle(), CommandListLifecycle::Submitted);
    }

    pool.destroy(&device);
}

// ============================================================================
// CREATION / DESTRUCTION
// ============================================================================

#[test]
fn test_zero_capacity_is_rejected() {
    let device = headless_device();
    assert!(matches!(CommandListPool::create(&device, 0), Err(Error::InvalidResource(_))));
}

#[test]
fn test_default_capacity_comes_from_config() {
    let config = RenderDeviceConfig { command_list_capacity: 6, ..RenderDeviceConfig::default() };
    let device = RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), config);
    let mut pool = CommandListPool::with_default_capacity(&device).unwrap();

    assert_eq!(pool.capacity(), 6);
    pool.destroy(&device);
}

#[test]
fn test_lists_reject_use_after_pool_destroy() {
    let device = headless_device();
    let mut pool = CommandListPool::create(&device, 2).unwrap();
    pool.destroy(&device);

    assert!(matches!(pool.allocate().begin(), Err(Error::InvalidResource(_))));
}
