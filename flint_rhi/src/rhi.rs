//! Rhi - global singleton for process-wide RHI services
//!
//! Holds the logger every `rhi_*!` macro writes to. The logger sits behind a
//! `RwLock` so it can be swapped at runtime (tests install a capturing logger).

use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

type SharedLogger = RwLock<Box<dyn Logger>>;

/// Installed logger, `DefaultLogger` until the application sets one
static ACTIVE_LOGGER: OnceLock<SharedLogger> = OnceLock::new();

fn active_logger() -> &'static SharedLogger {
    ACTIVE_LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

fn install(logger: Box<dyn Logger>) {
    if let Ok(mut slot) = active_logger().write() {
        *slot = logger;
    }
}

fn dispatch(severity: LogSeverity, source: &str, message: String, site: Option<(&'static str, u32)>) {
    let entry = LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_owned(),
        message,
        file: site.map(|(file, _)| file),
        line: site.map(|(_, line)| line),
    };
    if let Ok(logger) = active_logger().read() {
        logger.log(&entry);
    }
}

/// Process-wide RHI services
///
/// # Example
///
/// ```no_run
/// use flint_rhi::flint::{Rhi, log::LogFacadeLogger};
///
/// // Forward RHI diagnostics to env_logger / log
/// Rhi::set_logger(LogFacadeLogger);
/// ```
pub struct Rhi;

impl Rhi {
    /// Route all further diagnostics to `logger`
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        install(Box::new(logger));
    }

    /// Go back to the colored stdout logger
    pub fn reset_logger() {
        install(Box::new(DefaultLogger));
    }

    /// Emit an entry without a call site. Backs `rhi_trace!` through `rhi_warn!`.
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        dispatch(severity, source, message, None);
    }

    /// Emit an entry tagged with `file:line`. Backs `rhi_error!`, `rhi_err!` and `rhi_bail!`.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        dispatch(severity, source, message, Some((file, line)));
    }
}

/// Test helpers shared by the unit test modules
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};
    use crate::log::{Logger, LogEntry, LogSeverity};
    use super::Rhi;

    /// Logger capturing every entry for later assertions
    #[derive(Clone)]
    pub struct CapturingLogger {
        entries: Arc<Mutex<Vec<LogEntry>>>,
    }

    impl CapturingLogger {
        /// Install a fresh capturing logger as the global logger and return a handle to it
        pub fn install() -> Self {
            let logger = Self { entries: Arc::new(Mutex::new(Vec::new())) };
            Rhi::set_logger(logger.clone());
            logger
        }

        pub fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }

        pub fn messages_at(&self, severity: LogSeverity) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter(|e| e.severity == severity)
                .map(|e| e.message)
                .collect()
        }
    }

    impl Logger for CapturingLogger {
        fn log(&self, entry: &LogEntry) {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

#[cfg(test)]
#[path = "rhi_tests.rs"]
mod tests;
