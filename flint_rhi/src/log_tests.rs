//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger, LogFacadeLogger
//! and the rhi_* macros (through a capturing logger).

use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, LogFacadeLogger};
use crate::flint::{Error, Result, Rhi};
use crate::rhi::test_support::CapturingLogger;
use serial_test::serial;
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "flint::test".to_string(),
        message: format!("{:?} message", severity),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_with_file_line() {
    let e = entry(LogSeverity::Error, Some("vulkan.rs"), Some(42));
    assert_eq!(e.file, Some("vulkan.rs"));
    assert_eq!(e.line, Some(42));
    assert_eq!(e.message, "Error message");
}

#[test]
fn test_log_entry_clone() {
    let e1 = entry(LogSeverity::Warn, Some("test.rs"), Some(10));
    let e2 = e1.clone();
    assert_eq!(e1.severity, e2.severity);
    assert_eq!(e1.source, e2.source);
    assert_eq!(e1.line, e2.line);
}

// ============================================================================
// DEFAULT / FACADE LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("test.rs"), Some(7)));
    }
}

#[test]
fn test_facade_level_mapping() {
    assert_eq!(LogFacadeLogger::level(LogSeverity::Trace), ::log::Level::Trace);
    assert_eq!(LogFacadeLogger::level(LogSeverity::Debug), ::log::Level::Debug);
    assert_eq!(LogFacadeLogger::level(LogSeverity::Info), ::log::Level::Info);
    assert_eq!(LogFacadeLogger::level(LogSeverity::Warn), ::log::Level::Warn);
    assert_eq!(LogFacadeLogger::level(LogSeverity::Error), ::log::Level::Error);
}

#[test]
fn test_facade_logger_without_backend_does_not_panic() {
    let logger = LogFacadeLogger;
    logger.log(&entry(LogSeverity::Info, None, None));
    logger.log(&entry(LogSeverity::Error, Some("gl.rs"), Some(3)));
}

#[test]
fn test_loggers_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<LogFacadeLogger>();
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_macros_route_through_global_logger() {
    let capture = CapturingLogger::install();

    crate::rhi_trace!("flint::test", "trace {}", 1);
    crate::rhi_debug!("flint::test", "debug {}", 2);
    crate::rhi_info!("flint::test", "info {}", 3);
    crate::rhi_warn!("flint::test", "warn {}", 4);
    crate::rhi_error!("flint::test", "error {}", 5);

    let entries = capture.entries();
    Rhi::reset_logger();

    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].severity, LogSeverity::Trace);
    assert_eq!(entries[3].message, "warn 4");
    assert_eq!(entries[4].severity, LogSeverity::Error);
    assert!(entries[4].file.is_some());
    assert!(entries[4].line.is_some());
    assert!(entries[2].file.is_none());
}

fn bail_when_zero(count: u32) -> Result<u32> {
    if count == 0 {
        crate::rhi_bail!("flint::test", "capacity must be > 0 (got {})", count);
    }
    Ok(count)
}

#[test]
#[serial]
fn test_rhi_err_logs_and_builds_backend_error() {
    let capture = CapturingLogger::install();

    let err = crate::rhi_err!("flint::test", "native call failed: {}", -4);
    let bailed = bail_when_zero(0);
    let ok = bail_when_zero(3);

    let entries = capture.entries();
    Rhi::reset_logger();

    assert_eq!(err, Error::BackendError("native call failed: -4".to_string()));
    assert_eq!(bailed, Err(Error::BackendError("capacity must be > 0 (got 0)".to_string())));
    assert_eq!(ok, Ok(3));
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.severity == LogSeverity::Error));
}
