/// GL debug output - routes KHR_debug messages into the flint logger
///
/// Installed when validation is requested and the context supports debug
/// output. Messages go to `Rhi::log` under `flint::gl::debug`.

use colored::*;
use flint_rhi::flint::log::LogSeverity;
use flint_rhi::flint::Rhi;
use std::sync::atomic::{AtomicU32, Ordering};

const DEBUG_SOURCE: &str = "flint::gl::debug";

static ERROR_COUNT: AtomicU32 = AtomicU32::new(0);
static WARNING_COUNT: AtomicU32 = AtomicU32::new(0);

/// Messages of error and warning severity seen since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOutputStats {
    pub errors: u32,
    pub warnings: u32,
}

pub fn get_debug_output_stats() -> DebugOutputStats {
    DebugOutputStats {
        errors: ERROR_COUNT.load(Ordering::Relaxed),
        warnings: WARNING_COUNT.load(Ordering::Relaxed),
    }
}

/// Print a colored summary of the debug messages seen so far
pub fn print_debug_output_report() {
    let stats = get_debug_output_stats();
    if stats.errors == 0 && stats.warnings == 0 {
        println!("\n{}", "No GL debug errors or warnings".green().bold());
        return;
    }

    println!("\n{}", "=== GL Debug Output Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
}

pub(crate) fn reset_debug_output_stats() {
    ERROR_COUNT.store(0, Ordering::Relaxed);
    WARNING_COUNT.store(0, Ordering::Relaxed);
}

pub(crate) fn severity_from_gl(severity: u32) -> LogSeverity {
    match severity {
        glow::DEBUG_SEVERITY_HIGH => LogSeverity::Error,
        glow::DEBUG_SEVERITY_MEDIUM => LogSeverity::Warn,
        glow::DEBUG_SEVERITY_LOW => LogSeverity::Info,
        _ => LogSeverity::Debug,
    }
}

pub(crate) fn source_label(source: u32) -> &'static str {
    match source {
        glow::DEBUG_SOURCE_API => "API",
        glow::DEBUG_SOURCE_WINDOW_SYSTEM => "Window System",
        glow::DEBUG_SOURCE_SHADER_COMPILER => "Shader Compiler",
        glow::DEBUG_SOURCE_THIRD_PARTY => "Third Party",
        glow::DEBUG_SOURCE_APPLICATION => "Application",
        _ => "Other",
    }
}

pub(crate) fn type_label(message_type: u32) -> &'static str {
    match message_type {
        glow::DEBUG_TYPE_ERROR => "Error",
        glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR => "Deprecated",
        glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR => "Undefined",
        glow::DEBUG_TYPE_PORTABILITY => "Portability",
        glow::DEBUG_TYPE_PERFORMANCE => "Performance",
        glow::DEBUG_TYPE_MARKER => "Marker",
        _ => "Other",
    }
}

/// Debug message callback handed to `glDebugMessageCallback`
pub(crate) fn gl_debug_message_callback(source: u32, message_type: u32, id: u32, severity: u32, message: &str) {
    let severity = severity_from_gl(severity);
    match severity {
        LogSeverity::Error => ERROR_COUNT.fetch_add(1, Ordering::Relaxed),
        LogSeverity::Warn => WARNING_COUNT.fetch_add(1, Ordering::Relaxed),
        _ => 0,
    };

    Rhi::log(
        severity,
        DEBUG_SOURCE,
        format!("[{}/{}] {:#x}: {}", source_label(source), type_label(message_type), id, message),
    );
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
