//! Unit tests for query_pool.rs
//!
//! The headless clock advances `HEADLESS_WORK_TICKS` per draw or dispatch at
//! `HEADLESS_TIMESTAMP_FREQUENCY` ticks per second.

use crate::error::Error;
use crate::render::headless::{HEADLESS_TIMESTAMP_FREQUENCY, HEADLESS_WORK_TICKS};
use crate::render::{
    CommandList, DisjointAction, HeadlessBackend, QueryPool, QueryType, RenderDevice,
    RenderDeviceConfig, TimestampDisjointRing,
};

fn headless_device() -> RenderDevice {
    RenderDevice::from_backend(Box::new(HeadlessBackend::new(64, 64)), RenderDeviceConfig::default())
}

// ============================================================================
// DISJOINT RING
// ============================================================================

#[test]
fn test_ring_pairs_timestamps() {
    let mut ring = TimestampDisjointRing::new(8);

    assert_eq!(ring.on_timestamp(2), DisjointAction::Begin(2));
    assert_eq!(ring.on_timestamp(3), DisjointAction::End(2));
    assert_eq!(ring.on_timestamp(4), DisjointAction::Begin(4));
    assert_eq!(ring.on_timestamp(5), DisjointAction::End(4));

    assert_eq!(ring.disjoint_for(2), 2);
    assert_eq!(ring.disjoint_for(3), 2);
    assert_eq!(ring.disjoint_for(5), 4);
}

#[test]
fn test_ring_unresolved_until_resolve() {
    let mut ring = TimestampDisjointRing::new(4);
    ring.on_timestamp(0);
    ring.on_timestamp(1);

    assert_eq!(ring.resolved_frequency(0), None);
    assert_eq!(ring.resolved_frequency(1), None);
    assert_eq!(ring.frequency(), 0);
    assert_eq!(ring.ticks_to_milliseconds(1_000), 0.0);

    ring.resolve(0, 1_000_000);
    assert_eq!(ring.resolved_frequency(1), Some(1_000_000));
    assert_eq!(ring.ticks_to_milliseconds(1_000), 1.0);
}

#[test]
fn test_ring_reopening_clears_resolution() {
    let mut ring = TimestampDisjointRing::new(2);
    ring.on_timestamp(0);
    ring.on_timestamp(1);
    ring.resolve(0, 10);

    // Index 0 comes around again and opens a new disjoint query
    ring.on_timestamp(0);
    assert_eq!(ring.resolved_frequency(0), None);
    // The highest frequency seen is kept
    assert_eq!(ring.frequency(), 10);
}

#[test]
fn test_ring_keeps_highest_frequency() {
    let mut ring = TimestampDisjointRing::new(4);
    ring.resolve(0, 500);
    ring.resolve(2, 200);
    assert_eq!(ring.frequency(), 500);
}

// ============================================================================
// QUERY POOL
// ============================================================================

#[test]
fn test_handles_stay_below_capacity_and_wrap() {
    let device = headless_device();
    let mut pool = QueryPool::create(&device, QueryType::Timestamp, 3).unwrap();

    let handles: Vec<u32> = (0..7).map(|_| pool.allocate_query_handle()).collect();
    assert_eq!(handles, vec![0, 1, 2, 0, 1, 2, 0]);
    assert!(handles.iter().all(|&h| h < pool.capacity()));

    pool.destroy(&device);
}

#[test]
fn test_zero_capacity_is_rejected() {
    let device = headless_device();
    assert!(matches!(QueryPool::create(&device, QueryType::Timestamp, 0), Err(Error::InvalidResource(_))));
}

#[test]
fn test_timestamp_unavailable_before_playback() {
    let device = headless_device();
    let mut pool = QueryPool::create(&device, QueryType::Timestamp, 4).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    let start = pool.allocate_query_handle();
    let end = pool.allocate_query_handle();
    pool.write_timestamp(&mut cmd, start).unwrap();
    cmd.draw(3, 0).unwrap();
    pool.write_timestamp(&mut cmd, end).unwrap();
    cmd.end().unwrap();

    assert_eq!(pool.retrieve_result(&device, start), None);
    assert_eq!(pool.elapsed_milliseconds(&device, start, end), None);

    cmd.playback(&device).unwrap();

    let begin_ticks = pool.retrieve_result(&device, start).unwrap();
    let end_ticks = pool.retrieve_result(&device, end).unwrap();
    assert_eq!(end_ticks - begin_ticks, HEADLESS_WORK_TICKS);

    let expected_ms = HEADLESS_WORK_TICKS as f64 / HEADLESS_TIMESTAMP_FREQUENCY as f64 * 1000.0;
    let elapsed = pool.elapsed_milliseconds(&device, start, end).unwrap();
    assert!((elapsed - expected_ms).abs() < 1e-9);

    cmd.destroy(&device);
    pool.destroy(&device);
}

#[test]
fn test_unpaired_timestamp_stays_unavailable() {
    let device = headless_device();
    let mut pool = QueryPool::create(&device, QueryType::Timestamp, 2).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    let handle = pool.allocate_query_handle();
    pool.write_timestamp(&mut cmd, handle).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();

    // The covering disjoint query is still open
    assert_eq!(pool.retrieve_result(&device, handle), None);

    cmd.destroy(&device);
    pool.destroy(&device);
}

#[test]
fn test_reallocated_handle_is_reset() {
    let device = headless_device();
    let mut pool = QueryPool::create(&device, QueryType::Timestamp, 2).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();

    cmd.begin().unwrap();
    let a = pool.allocate_query_handle();
    let b = pool.allocate_query_handle();
    pool.write_timestamp(&mut cmd, a).unwrap();
    pool.write_timestamp(&mut cmd, b).unwrap();
    cmd.end().unwrap();
    cmd.playback(&device).unwrap();
    assert!(pool.retrieve_result(&device, a).is_some());

    // Wraps to slot 0 again
    assert_eq!(pool.allocate_query_handle(), a);
    assert_eq!(pool.retrieve_result(&device, a), None);

    cmd.destroy(&device);
    pool.destroy(&device);
}

#[test]
fn test_write_timestamp_checks_pool_and_handle() {
    let device = headless_device();
    let mut timestamps = QueryPool::create(&device, QueryType::Timestamp, 2).unwrap();
    let mut events = QueryPool::create(&device, QueryType::Unknown, 2).unwrap();
    let mut cmd = CommandList::create(&device).unwrap();
    cmd.begin().unwrap();

    assert!(matches!(timestamps.write_timestamp(&mut cmd, 2), Err(Error::InvalidResource(_))));
    assert!(matches!(events.write_timestamp(&mut cmd, 0), Err(Error::InvalidState(_))));
    assert_eq!(timestamps.retrieve_result(&device, 5), None);

    cmd.destroy(&device);
    timestamps.destroy(&device);
    events.destroy(&device);
}
