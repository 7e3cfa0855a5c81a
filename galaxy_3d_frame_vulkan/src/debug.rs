/// Vulkan debug messenger - forwards validation layer messages to the engine logger
///
/// Messages are filtered by the configured [`DebugSeverity`], counted per
/// severity, and grouped so repeated messages carry an occurrence count.

use ash::vk;
use colored::*;
use galaxy_3d_frame::galaxy3d::log::LogSeverity;
use galaxy_3d_frame::galaxy3d::DebugSeverity;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Log source of every validation message
pub(crate) const VALIDATION_SOURCE: &str = "galaxy3d::vulkan::validation";

/// Threshold applied by the callback (None until a messenger is installed)
static DEBUG_SEVERITY: Mutex<Option<DebugSeverity>> = Mutex::new(None);

/// Global validation statistics (thread-safe atomic counters)
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences of each message text since the messenger was installed
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts per severity
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

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn increment(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the callback threshold and reset statistics
pub(crate) fn init_debug_config(severity: DebugSeverity) {
    VALIDATION_STATS.reset();
    *MESSAGE_TRACKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(FxHashMap::default());
    *DEBUG_SEVERITY.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(severity);
}

/// Stop forwarding messages (messenger destroyed)
pub(crate) fn clear_debug_config() {
    *DEBUG_SEVERITY.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}

/// Get current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let tracker_guard = MESSAGE_TRACKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(tracker) = tracker_guard.as_ref() {
        let duplicate_count = tracker.values().filter(|&&count| count > 1).count();
        if duplicate_count > 0 {
            println!("\n  {} message(s) appeared multiple times", duplicate_count);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

/// Severity flags the messenger subscribes to for a threshold
pub(crate) fn messenger_severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Flags;
    match severity {
        DebugSeverity::ErrorsOnly => Flags::ERROR,
        DebugSeverity::ErrorsAndWarnings => Flags::ERROR | Flags::WARNING,
        DebugSeverity::All => Flags::ERROR | Flags::WARNING | Flags::INFO | Flags::VERBOSE,
    }
}

/// Whether a message of `message_severity` passes the `threshold`
pub(crate) fn passes_threshold(
    threshold: DebugSeverity,
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
) -> bool {
    message_severity.intersects(messenger_severity_flags(threshold))
}

/// Engine log severity of a validation message
pub(crate) fn log_severity(message_severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Flags;
    if message_severity.contains(Flags::ERROR) {
        LogSeverity::Error
    } else if message_severity.contains(Flags::WARNING) {
        LogSeverity::Warn
    } else if message_severity.contains(Flags::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

/// Filter, count, group and log one message
///
/// Returns false when the message was below the threshold.
pub(crate) fn forward_message(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id_name: &str,
    message: &str,
) -> bool {
    let threshold = match *DEBUG_SEVERITY.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) {
        Some(threshold) => threshold,
        None => return false,
    };
    if !passes_threshold(threshold, message_severity) {
        return false;
    }

    let severity = log_severity(message_severity);
    VALIDATION_STATS.increment(severity);

    let occurrence_count = {
        let mut tracker_guard = MESSAGE_TRACKER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tracker = tracker_guard.get_or_insert_with(FxHashMap::default);
        let count = tracker.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    };

    let repeat_indicator = if occurrence_count > 1 {
        format!(" [x{}]", occurrence_count)
    } else {
        String::new()
    };

    galaxy_3d_frame::log::log(
        severity,
        VALIDATION_SOURCE,
        format!(
            "[{}]{} {}: {}",
            message_type_name(message_type),
            repeat_indicator,
            message_id_name,
            message
        ),
    );
    true
}

/// Vulkan debug messenger callback
///
/// Called by the validation layers; never asks the driver to abort the call.
#[cfg(feature = "vulkan-validation")]
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    use std::ffi::CStr;

    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    forward_message(message_severity, message_type, message_id_name, message);
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
