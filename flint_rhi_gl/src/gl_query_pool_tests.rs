//! Unit tests for gl_query_pool.rs

use super::*;

#[test]
fn test_nanoseconds_to_milliseconds() {
    assert_eq!(nanoseconds_to_milliseconds(2_000_000), 2.0);
    assert_eq!(nanoseconds_to_milliseconds(0), 0.0);
    assert!((nanoseconds_to_milliseconds(16_666_667) - 16.666667).abs() < 1e-6);
}
