//! Unit tests for d3d11_query_pool.rs

use winapi::shared::minwindef::TRUE;

use super::*;

#[test]
fn test_reliable_clock_reports_frequency() {
    let data = d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT { Frequency: 1_000_000_000, Disjoint: FALSE };
    assert_eq!(disjoint_frequency(&data), Some(1_000_000_000));
}

#[test]
fn test_disjoint_clock_is_rejected() {
    let data = d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT { Frequency: 1_000_000_000, Disjoint: TRUE };
    assert_eq!(disjoint_frequency(&data), None);

    let zero = d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT { Frequency: 0, Disjoint: FALSE };
    assert_eq!(disjoint_frequency(&zero), None);
}

#[test]
fn test_resolved_ring_converts_ticks() {
    let mut ring = TimestampDisjointRing::new(4);
    assert_eq!(ring.on_timestamp(0), DisjointAction::Begin(0));
    assert_eq!(ring.on_timestamp(1), DisjointAction::End(0));

    let data = d3d11::D3D11_QUERY_DATA_TIMESTAMP_DISJOINT { Frequency: 2_000, Disjoint: FALSE };
    ring.resolve(ring.disjoint_for(1), disjoint_frequency(&data).unwrap());
    assert_eq!(ring.resolved_frequency(1), Some(2_000));
    assert_eq!(ring.ticks_to_milliseconds(500), 250.0);
}
