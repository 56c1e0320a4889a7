//! Vulkan device configuration and validation-layer settings

use std::path::PathBuf;

/// Which validation messages reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

/// Message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters, per severity
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

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Configuration of a [`VulkanDevice`](crate::VulkanDevice)
///
/// Validation settings only take effect when the crate is built with the
/// `vulkan-validation` feature.
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    pub app_name: String,
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,
    /// Panic (instead of abort) on the first validation error
    pub panic_on_error: bool,
    pub enable_validation_stats: bool,
    /// Capacity of every shader-visible CBV/SRV/UAV heap
    pub max_bindless_descriptors: u32,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            app_name: "Quasar Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: false,
            max_bindless_descriptors: 16384,
        }
    }
}

impl VulkanConfig {
    pub fn with_app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    pub fn with_debug_severity(mut self, severity: DebugSeverity) -> Self {
        self.debug_severity = severity;
        self
    }

    pub fn with_debug_output(mut self, output: DebugOutput) -> Self {
        self.debug_output = output;
        self
    }

    pub fn with_message_filter(mut self, filter: DebugMessageFilter) -> Self {
        self.debug_message_filter = filter;
        self
    }

    pub fn with_break_on_validation_error(mut self, enable: bool) -> Self {
        self.break_on_validation_error = enable;
        self
    }

    pub fn with_panic_on_error(mut self, enable: bool) -> Self {
        self.panic_on_error = enable;
        self
    }

    pub fn with_validation_stats(mut self, enable: bool) -> Self {
        self.enable_validation_stats = enable;
        self
    }

    pub fn with_max_bindless_descriptors(mut self, count: u32) -> Self {
        self.max_bindless_descriptors = count;
        self
    }

    /// Validation is requested and compiled in
    pub(crate) fn validation_active(&self) -> bool {
        cfg!(feature = "vulkan-validation") && self.enable_validation
    }
}

#[cfg(test)]
#[path = "vulkan_config_tests.rs"]
mod tests;
