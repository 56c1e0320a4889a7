//! Internal logging system for the Quasar GPU core
//!
//! This module provides a flexible logging system with:
//! - Customizable logger via Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - Thread-safe logging with RwLock
//! - File and line information for detailed ERROR logs
//! - Error macros that log and build an [`Error`](crate::quasar::Error) in one step

use colored::*;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Process-wide logger slot
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Logger trait for custom logging implementations
///
/// Implement this trait to create custom loggers (file logging, network logging, etc.)
///
/// # Example
///
/// ```no_run
/// use quasar_gpu::quasar::log::{Logger, LogEntry};
///
/// struct FileLogger {
///     file: std::fs::File,
/// }
///
/// impl Logger for FileLogger {
///     fn log(&self, entry: &LogEntry) {
///         // Write to file...
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    ///
    /// # Arguments
    ///
    /// * `entry` - The log entry to process
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level (Trace, Debug, Info, Warn, Error)
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "quasar::Backend", "quasar::vulkan")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Very verbose information (fence waits, per-frame bookkeeping)
    Trace,

    /// Development/debugging information
    Debug,

    /// Important informational messages
    Info,

    /// Warning messages (recoverable problems)
    Warn,

    /// Error messages (contract violations, with file:line details)
    Error,
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
///
/// Entries below `min_severity` are dropped.
pub struct DefaultLogger {
    min_severity: LogSeverity,
}

impl DefaultLogger {
    /// Create a logger printing entries at or above `min_severity`
    pub fn new(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    /// Lowest severity printed by this logger
    pub fn min_severity(&self) -> LogSeverity {
        self.min_severity
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new(LogSeverity::Debug)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if entry.severity < self.min_severity {
            return;
        }

        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            println!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

fn logger_slot() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

/// Replace the process-wide logger
///
/// # Example
///
/// ```no_run
/// use quasar_gpu::quasar::log::{set_logger, DefaultLogger, LogSeverity};
///
/// set_logger(DefaultLogger::new(LogSeverity::Warn));
/// ```
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut lock) = logger_slot().write() {
        *lock = Box::new(logger);
    }
}

/// Reset logger to default (DefaultLogger)
pub fn reset_logger() {
    if let Ok(mut lock) = logger_slot().write() {
        *lock = Box::new(DefaultLogger::default());
    }
}

/// Internal logging method (for simple logs without file:line)
///
/// Used by macros like engine_info!, engine_warn!, etc.
pub fn log(severity: LogSeverity, source: &str, message: String) {
    if let Ok(lock) = logger_slot().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }
}

/// Internal logging method with file:line (used by engine_error!)
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    if let Ok(lock) = logger_slot().read() {
        lock.log(&LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// # Example
///
/// ```no_run
/// quasar_gpu::engine_trace!("quasar::Frame", "Waiting for fence {}", 12);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// quasar_gpu::engine_info!("quasar::Backend", "Context created");
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// quasar_gpu::engine_error!("quasar::Backend", "Failed to submit: {}", "device lost");
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

// ===== ERROR MACROS =====

/// Log an ERROR and build an `Error`
///
/// The variant defaults to `BackendError`; prefix with `Variant =>` to pick another.
///
/// # Example
///
/// ```no_run
/// let err = quasar_gpu::engine_err!(CapacityExceeded => "quasar::HandlePool", "pool full");
/// ```
#[macro_export]
macro_rules! engine_err {
    ($variant:ident => $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::quasar::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_err!(BackendError => $source, $($arg)*)
    };
}

/// Log an ERROR and return `Err` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($($arg:tt)*) => {
        return Err($crate::engine_err!($($arg)*))
    };
}

/// Log a WARN and build an `Error`
#[macro_export]
macro_rules! engine_warn_err {
    ($variant:ident => $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::quasar::Error::$variant(message)
    }};
    ($source:expr, $($arg:tt)*) => {
        $crate::engine_warn_err!(BackendError => $source, $($arg)*)
    };
}

/// Log a WARN and return `Err` from the enclosing function
#[macro_export]
macro_rules! engine_bail_warn {
    ($($arg:tt)*) => {
        return Err($crate::engine_warn_err!($($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
