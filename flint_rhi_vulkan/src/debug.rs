/// Vulkan debug messenger - routes validation layer messages into the flint logger
///
/// Messages are forwarded with `Rhi::log` under the `flint::vulkan::validation`
/// source, counted per severity, and grouped so repeats show an occurrence
/// count instead of flooding the log.

use ash::vk;
use colored::Colorize;
use flint_rhi::flint::log::LogSeverity;
use flint_rhi::flint::Rhi;
use rustc_hash::FxHashMap;
use std::ffi::{c_char, c_void, CStr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const VALIDATION_SOURCE: &str = "flint::vulkan::validation";

/// Message counters in `ValidationStats` field order
static COUNTERS: [AtomicU32; 4] = [const { AtomicU32::new(0) }; 4];

/// Occurrences of each distinct message text
static SEEN_MESSAGES: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Per-severity count of validation messages since the device was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

fn counter_slot(severity: LogSeverity) -> usize {
    match severity {
        LogSeverity::Error => 0,
        LogSeverity::Warn => 1,
        LogSeverity::Info => 2,
        LogSeverity::Debug | LogSeverity::Trace => 3,
    }
}

/// Reset counters and message grouping (called when a device is created)
pub(crate) fn reset_validation_tracking() {
    COUNTERS.iter().for_each(|counter| counter.store(0, Ordering::Relaxed));
    if let Ok(mut seen) = SEEN_MESSAGES.lock() {
        *seen = Some(FxHashMap::default());
    }
}

/// Current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    let [errors, warnings, info, verbose] = [0, 1, 2, 3].map(|slot| COUNTERS[slot].load(Ordering::Relaxed));
    ValidationStats { errors, warnings, info, verbose }
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();
    if stats.total() == 0 {
        println!("\n{}", "Vulkan validation: clean".green().bold());
        return;
    }

    println!("\n{}", "-- Vulkan validation summary --".bright_blue().bold());
    let rows = [
        (stats.errors, "errors".red().bold()),
        (stats.warnings, "warnings".yellow().bold()),
        (stats.info, "info".cyan()),
        (stats.verbose, "verbose".bright_black()),
    ];
    for (count, label) in rows.iter().filter(|row| row.0 > 0) {
        println!("  {:>6} {}", count, label);
    }
    println!("  {:>6} total", stats.total());

    let repeated = SEEN_MESSAGES
        .lock()
        .ok()
        .and_then(|seen| seen.as_ref().map(|m| m.values().filter(|&&n| n > 1).count()))
        .unwrap_or(0);
    if repeated > 0 {
        println!("  {} distinct message(s) repeated", repeated);
    }
}

/// Log severity of a validation message
pub(crate) fn severity_from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

pub(crate) fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

fn track_message(message: &str) -> u32 {
    let Ok(mut seen) = SEEN_MESSAGES.lock() else {
        return 1;
    };
    let count = seen
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Messenger create info shared by the instance chain and the messenger itself
pub(crate) fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Debug messenger entry point
///
/// # Safety
///
/// Called by the loader with a valid callback data pointer.
pub unsafe extern "system" fn vulkan_debug_callback(
    severity_flags: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_flags: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    let Some(data) = data.as_ref() else {
        return vk::FALSE;
    };
    let text = |ptr: *const c_char, fallback: &'static str| {
        if ptr.is_null() {
            fallback.into()
        } else {
            CStr::from_ptr(ptr).to_string_lossy()
        }
    };
    let id = text(data.p_message_id_name, "<no id>");
    let message = text(data.p_message, "<empty>");

    let severity = severity_from_vk(severity_flags);
    COUNTERS[counter_slot(severity)].fetch_add(1, Ordering::Relaxed);

    let repeat = match track_message(&message) {
        1 => String::new(),
        n => format!(" [x{}]", n),
    };
    Rhi::log(
        severity,
        VALIDATION_SOURCE,
        format!("[{}]{} {}: {}", message_type_label(type_flags), repeat, id, message),
    );

    // The triggering call must not be aborted
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
