/// D3D11 debug layer - routes info-queue messages into the flint logger
///
/// The runtime stores debug-layer messages in `ID3D11InfoQueue` instead of
/// calling back. The queue is drained after every submit and present, each
/// message going to `Rhi::log` under `flint::d3d11::debug`. Repeats of the
/// same message id are counted instead of logged again.

use colored::*;
use flint_rhi::flint::log::LogSeverity;
use flint_rhi::flint::Rhi;
use rustc_hash::FxHashMap;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use winapi::shared::basetsd::SIZE_T;
use winapi::shared::winerror;
use winapi::um::d3d11sdklayers::{
    ID3D11InfoQueue, D3D11_MESSAGE, D3D11_MESSAGE_ID, D3D11_MESSAGE_SEVERITY, D3D11_MESSAGE_SEVERITY_CORRUPTION,
    D3D11_MESSAGE_SEVERITY_ERROR, D3D11_MESSAGE_SEVERITY_INFO, D3D11_MESSAGE_SEVERITY_WARNING,
};

const DEBUG_SOURCE: &str = "flint::d3d11::debug";

/// Repeats logged in full before a message id is only counted
const MAX_REPEATS_LOGGED: u32 = 3;

static ERROR_COUNT: AtomicU32 = AtomicU32::new(0);
static WARNING_COUNT: AtomicU32 = AtomicU32::new(0);
static INFO_COUNT: AtomicU32 = AtomicU32::new(0);

/// Occurrences of each message id
static MESSAGE_IDS: Mutex<Option<FxHashMap<D3D11_MESSAGE_ID, u32>>> = Mutex::new(None);

/// Debug-layer messages seen since the device was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugLayerStats {
    /// Errors and corruption reports
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
}

impl DebugLayerStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info
    }
}

pub fn get_debug_layer_stats() -> DebugLayerStats {
    DebugLayerStats {
        errors: ERROR_COUNT.load(Ordering::Relaxed),
        warnings: WARNING_COUNT.load(Ordering::Relaxed),
        info: INFO_COUNT.load(Ordering::Relaxed),
    }
}

pub(crate) fn reset_debug_layer_tracking() {
    ERROR_COUNT.store(0, Ordering::Relaxed);
    WARNING_COUNT.store(0, Ordering::Relaxed);
    INFO_COUNT.store(0, Ordering::Relaxed);
    if let Ok(mut ids) = MESSAGE_IDS.lock() {
        *ids = Some(FxHashMap::default());
    }
}

/// Print a colored summary of the debug-layer messages seen so far
pub fn print_debug_layer_report() {
    let stats = get_debug_layer_stats();
    if stats.total() == 0 {
        println!("\n{}", "No D3D11 debug layer messages".green().bold());
        return;
    }

    println!("\n{}", "=== D3D11 Debug Layer Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
    println!("{}\n", "================================".bright_blue().bold());
}

pub(crate) fn severity_from_d3d11(severity: D3D11_MESSAGE_SEVERITY) -> LogSeverity {
    match severity {
        D3D11_MESSAGE_SEVERITY_CORRUPTION | D3D11_MESSAGE_SEVERITY_ERROR => LogSeverity::Error,
        D3D11_MESSAGE_SEVERITY_WARNING => LogSeverity::Warn,
        D3D11_MESSAGE_SEVERITY_INFO => LogSeverity::Info,
        _ => LogSeverity::Debug,
    }
}

/// Description bytes without the trailing NUL
pub(crate) fn message_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn track_message(id: D3D11_MESSAGE_ID) -> u32 {
    let Ok(mut ids) = MESSAGE_IDS.lock() else {
        return 1;
    };
    let count = ids.get_or_insert_with(FxHashMap::default).entry(id).or_insert(0);
    *count += 1;
    *count
}

/// Count and log one debug-layer message
pub(crate) fn record_message(severity: D3D11_MESSAGE_SEVERITY, id: D3D11_MESSAGE_ID, text: &str) {
    let severity = severity_from_d3d11(severity);
    match severity {
        LogSeverity::Error => ERROR_COUNT.fetch_add(1, Ordering::Relaxed),
        LogSeverity::Warn => WARNING_COUNT.fetch_add(1, Ordering::Relaxed),
        _ => INFO_COUNT.fetch_add(1, Ordering::Relaxed),
    };

    let occurrences = track_message(id);
    if occurrences > MAX_REPEATS_LOGGED {
        return;
    }
    let suffix = if occurrences == MAX_REPEATS_LOGGED { " (further repeats suppressed)" } else { "" };
    Rhi::log(severity, DEBUG_SOURCE, format!("[{}] {}{}", id, text, suffix));
}

/// Log and clear every message stored in `queue`
pub(crate) fn drain_info_queue(queue: &ID3D11InfoQueue) {
    unsafe {
        let count = queue.GetNumStoredMessages();
        for index in 0..count {
            let mut length: SIZE_T = 0;
            if winerror::FAILED(queue.GetMessage(index, std::ptr::null_mut(), &mut length)) || length == 0 {
                continue;
            }

            // u64 storage keeps the D3D11_MESSAGE header aligned
            let words = (length + mem::size_of::<u64>() - 1) / mem::size_of::<u64>();
            let mut storage = vec![0u64; words.max(1)];
            let message = storage.as_mut_ptr() as *mut D3D11_MESSAGE;
            if winerror::FAILED(queue.GetMessage(index, message, &mut length)) {
                continue;
            }

            let message = &*message;
            let text = if message.pDescription.is_null() {
                String::from("No description")
            } else {
                let bytes = std::slice::from_raw_parts(message.pDescription as *const u8, message.DescriptionByteLength);
                message_text(bytes)
            };
            record_message(message.Severity, message.ID, &text);
        }
        queue.ClearStoredMessages();
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
