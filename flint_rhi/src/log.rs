//! Diagnostics plumbing for the Flint RHI
//!
//! Every message the RHI emits is a [`LogEntry`] handed to the installed
//! [`Logger`]. Two loggers ship with the crate: [`DefaultLogger`] prints to
//! stdout with colors, [`LogFacadeLogger`] hands entries to the `log` crate.
//! Errors raised through `rhi_error!`/`rhi_err!` also carry the call site.

use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::time::SystemTime;

/// Destination for RHI diagnostics
///
/// Install one with `Rhi::set_logger`. Implementations are called from
/// whatever thread produced the message.
///
/// # Example
///
/// ```no_run
/// use flint_rhi::flint::log::{Logger, LogEntry, LogSeverity};
///
/// struct ErrorsOnly;
///
/// impl Logger for ErrorsOnly {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One diagnostic message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,

    /// Wall clock time at creation
    pub timestamp: SystemTime,

    /// Emitting component, e.g. "flint::CommandList" or "flint::d3d11::Texture"
    pub source: String,

    pub message: String,

    /// Call site, filled in by the error macros only
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Message severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    /// Fixed-width colored label used by [`DefaultLogger`]
    fn label(self) -> ColoredString {
        match self {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        }
    }
}

/// Colored stdout logger installed until the application picks another one
///
/// Lines look like `[2026-01-01 12:00:00.000] [WARN ] [flint::Buffer] message`,
/// with ` (file:line)` appended when the entry carries a call site.
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let local: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "[{}] [{}] [{}] {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.severity.label(),
            entry.source.bright_blue(),
            entry.message
        );
        if let (Some(file), Some(at)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, at));
        }
        println!("{}", line);
    }
}

/// Logger forwarding every entry to the `log` crate facade
///
/// Lets an application that already installed `env_logger` (or any other
/// `log` backend) receive RHI diagnostics. The entry source becomes the
/// record target.
pub struct LogFacadeLogger;

impl LogFacadeLogger {
    /// Map a Flint severity to a `log` level
    pub fn level(severity: LogSeverity) -> ::log::Level {
        match severity {
            LogSeverity::Trace => ::log::Level::Trace,
            LogSeverity::Debug => ::log::Level::Debug,
            LogSeverity::Info => ::log::Level::Info,
            LogSeverity::Warn => ::log::Level::Warn,
            LogSeverity::Error => ::log::Level::Error,
        }
    }
}

impl Logger for LogFacadeLogger {
    fn log(&self, entry: &LogEntry) {
        let level = Self::level(entry.severity);
        match (entry.file, entry.line) {
            (Some(file), Some(line)) => {
                ::log::log!(target: entry.source.as_str(), level, "{} ({}:{})", entry.message, file, line)
            }
            _ => ::log::log!(target: entry.source.as_str(), level, "{}", entry.message),
        }
    }
}

// ===== MACROS =====

/// Emit a `Trace` entry
///
/// # Example
///
/// ```no_run
/// flint_rhi::rhi_trace!("flint::CommandList", "draw({}, {})", 3, 0);
/// ```
#[macro_export]
macro_rules! rhi_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::flint::Rhi::log(
            $crate::flint::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Emit a `Debug` entry
///
/// # Example
///
/// ```no_run
/// flint_rhi::rhi_debug!("flint::QueryPool", "Created pool with {} slots", 64);
/// ```
#[macro_export]
macro_rules! rhi_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::flint::Rhi::log(
            $crate::flint::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Emit an `Info` entry
///
/// # Example
///
/// ```no_run
/// flint_rhi::rhi_info!("flint::RenderDevice", "Device created");
/// ```
#[macro_export]
macro_rules! rhi_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::flint::Rhi::log(
            $crate::flint::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Emit a `Warn` entry
///
/// # Example
///
/// ```no_run
/// flint_rhi::rhi_warn!("flint::Buffer", "Buffer dropped without destroy()");
/// ```
#[macro_export]
macro_rules! rhi_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::flint::Rhi::log(
            $crate::flint::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Emit an `Error` entry tagged with the caller's file and line
///
/// # Example
///
/// ```no_run
/// flint_rhi::rhi_error!("flint::RenderDevice", "Failed to initialize: {}", "E_FAIL");
/// ```
#[macro_export]
macro_rules! rhi_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::flint::Rhi::log_detailed(
            $crate::flint::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR message and evaluate to `Error::BackendError` carrying the same text
///
/// # Example
///
/// ```no_run
/// fn create() -> flint_rhi::flint::Result<()> {
///     Err(flint_rhi::rhi_err!("flint::vulkan", "vkCreateImage failed: {}", -2))
/// }
/// ```
#[macro_export]
macro_rules! rhi_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::flint::Rhi::log_detailed(
            $crate::flint::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::flint::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError(..))` from the enclosing function
///
/// # Example
///
/// ```no_run
/// fn check(count: u32) -> flint_rhi::flint::Result<()> {
///     if count == 0 {
///         flint_rhi::rhi_bail!("flint::QueryPool", "Query pool capacity must be > 0");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! rhi_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::rhi_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
