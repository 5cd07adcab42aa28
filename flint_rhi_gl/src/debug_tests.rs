//! Unit tests for debug.rs

use flint_rhi::flint::log::{LogEntry, LogSeverity, Logger};
use flint_rhi::flint::Rhi;
use serial_test::serial;
use std::sync::{Arc, Mutex};

use super::*;

struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LABELS
// ============================================================================

#[test]
fn test_severity_mapping() {
    assert_eq!(severity_from_gl(glow::DEBUG_SEVERITY_HIGH), LogSeverity::Error);
    assert_eq!(severity_from_gl(glow::DEBUG_SEVERITY_MEDIUM), LogSeverity::Warn);
    assert_eq!(severity_from_gl(glow::DEBUG_SEVERITY_LOW), LogSeverity::Info);
    assert_eq!(severity_from_gl(glow::DEBUG_SEVERITY_NOTIFICATION), LogSeverity::Debug);
}

#[test]
fn test_source_and_type_labels() {
    assert_eq!(source_label(glow::DEBUG_SOURCE_SHADER_COMPILER), "Shader Compiler");
    assert_eq!(source_label(0xFFFF), "Other");
    assert_eq!(type_label(glow::DEBUG_TYPE_PERFORMANCE), "Performance");
    assert_eq!(type_label(glow::DEBUG_TYPE_ERROR), "Error");
}

// ============================================================================
// CALLBACK
// ============================================================================

#[test]
#[serial]
fn test_callback_logs_and_counts() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Rhi::set_logger(TestLogger { entries: entries.clone() });
    reset_debug_output_stats();

    gl_debug_message_callback(
        glow::DEBUG_SOURCE_API,
        glow::DEBUG_TYPE_ERROR,
        0x502,
        glow::DEBUG_SEVERITY_HIGH,
        "GL_INVALID_OPERATION in glDrawArrays",
    );
    gl_debug_message_callback(
        glow::DEBUG_SOURCE_API,
        glow::DEBUG_TYPE_PERFORMANCE,
        7,
        glow::DEBUG_SEVERITY_MEDIUM,
        "buffer moved to system memory",
    );
    gl_debug_message_callback(
        glow::DEBUG_SOURCE_API,
        glow::DEBUG_TYPE_OTHER,
        1,
        glow::DEBUG_SEVERITY_NOTIFICATION,
        "buffer uses VIDEO memory",
    );

    Rhi::reset_logger();

    let stats = get_debug_output_stats();
    assert_eq!(stats, DebugOutputStats { errors: 1, warnings: 1 });

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].source, "flint::gl::debug");
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].message.contains("[API/Error]"));
    assert!(captured[0].message.contains("0x502"));
    assert_eq!(captured[1].severity, LogSeverity::Warn);
    assert_eq!(captured[2].severity, LogSeverity::Debug);
}
