/// Vulkan debug messenger - validation layer messages
///
/// Messages go through the engine logger (console) and/or a plain-text log
/// file, with per-severity statistics and optional break-on-error.

use ash::vk;
use colored::*;
use quasar_gpu::{engine_error, engine_info, engine_trace, engine_warn};
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_config::{DebugMessageFilter, DebugOutput, DebugSeverity, ValidationStats, VulkanConfig};

static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrence count per message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Settings the callback reads on every message
#[derive(Clone)]
pub(crate) struct Config {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl From<&VulkanConfig> for Config {
    fn from(config: &VulkanConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
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

    fn counter(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> &AtomicU32 {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        }
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [&self.errors, &self.warnings, &self.info, &self.verbose] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic inside the callback must not disable validation output
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install the callback settings and reset statistics
pub(crate) fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    *lock(&MESSAGE_TRACKER) = Some(FxHashMap::default());
    *lock(&DEBUG_CONFIG) = Some(config);
}

pub(crate) fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Messenger severity mask for a configured level
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

pub(crate) fn category_visible(filter: &DebugMessageFilter, message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> bool {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        filter.show_validation
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        filter.show_performance
    } else {
        filter.show_general
    }
}

/// Print the statistics gathered since the messenger was created
pub fn print_validation_stats_report() {
    let stats = validation_stats();

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

    if let Some(tracker) = lock(&MESSAGE_TRACKER).as_ref() {
        let repeated = tracker.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            println!("\n  {} message(s) appeared multiple times", repeated);
        }
    }
    println!("{}\n", "====================================".bright_blue().bold());
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Debug-utils messenger callback
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let config = match lock(&DEBUG_CONFIG).as_ref() {
        Some(config) => config.clone(),
        None => return vk::FALSE,
    };

    if !severity_flags(config.severity).intersects(message_severity)
        || !category_visible(&config.message_filter, message_type)
    {
        return vk::FALSE;
    }

    let occurrences = if config.enable_stats {
        VALIDATION_STATS.counter(message_severity).fetch_add(1, Ordering::Relaxed);
        let mut tracker = lock(&MESSAGE_TRACKER);
        let count = tracker.get_or_insert_with(FxHashMap::default)
            .entry(message.to_string())
            .or_insert(0);
        *count += 1;
        *count
    } else {
        1
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };
    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };
    let is_error = message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);

    let (to_console, file) = match &config.output {
        DebugOutput::Console => (true, None),
        DebugOutput::File(path) => (false, Some(path)),
        DebugOutput::Both(path) => (true, Some(path)),
    };

    if to_console {
        const SOURCE: &str = "quasar::vulkan::validation";
        if is_error {
            engine_error!(SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            engine_warn!(SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            engine_info!(SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else {
            engine_trace!(SOURCE, "[{}]{} {}: {}", type_str, repeat, message_id, message);
        }
    }
    if let Some(path) = file {
        write_to_file(path, &format!("[VULKAN {:?}] [{}]{}\n  Message ID: {}\n  {}\n",
            message_severity, type_str, repeat, message_id, message));
    }

    if is_error && config.panic_on_error {
        panic!("Vulkan validation error (strict mode): {}: {}", message_id, message);
    }
    if is_error && config.break_on_error {
        eprintln!("{} {}: {}", "Break on validation error, aborting.".red().bold(), message_id, message);
        std::process::abort();
    }

    vk::FALSE
}

fn write_to_file(path: &Path, message: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", message);
    }
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
