//! Unit tests for the validation messenger (no GPU required)

use super::*;
use serial_test::serial;

fn config(severity: DebugSeverity) -> Config {
    Config {
        severity,
        output: DebugOutput::Console,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        panic_on_error: false,
        enable_stats: true,
    }
}

fn send(severity: vk::DebugUtilsMessageSeverityFlagsEXT, message_type: vk::DebugUtilsMessageTypeFlagsEXT, text: &CStr) {
    let data = vk::DebugUtilsMessengerCallbackDataEXT::default()
        .message_id_name(c"VUID-test")
        .message(text);
    let result = unsafe { vulkan_debug_callback(severity, message_type, &data, std::ptr::null_mut()) };
    assert_eq!(result, vk::FALSE);
}

// ============================================================================
// FILTERS
// ============================================================================

#[test]
fn test_severity_flags() {
    assert_eq!(severity_flags(DebugSeverity::ErrorsOnly), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    assert!(severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(!severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
    assert!(severity_flags(DebugSeverity::All).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
}

#[test]
fn test_category_filter() {
    let filter = DebugMessageFilter { show_general: false, show_validation: true, show_performance: false };
    assert!(category_visible(&filter, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
    assert!(!category_visible(&filter, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE));
    assert!(!category_visible(&filter, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL));
}

// ============================================================================
// CALLBACK
// ============================================================================

#[test]
#[serial]
fn test_callback_counts_displayed_messages() {
    init_debug_config(config(DebugSeverity::ErrorsAndWarnings));

    send(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"bad layout");
    send(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE, c"slow path");
    // Filtered out by severity
    send(vk::DebugUtilsMessageSeverityFlagsEXT::INFO, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, c"loader info");

    let stats = validation_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 1);
    assert_eq!(stats.info, 0);
}

#[test]
#[serial]
fn test_init_resets_stats() {
    init_debug_config(config(DebugSeverity::All));
    send(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE, vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, c"chatter");
    assert_eq!(validation_stats().verbose, 1);

    init_debug_config(config(DebugSeverity::All));
    assert_eq!(validation_stats().total(), 0);
}

#[test]
#[serial]
fn test_file_output() {
    let path = std::env::temp_dir().join("quasar_validation_test.log");
    let _ = std::fs::remove_file(&path);
    init_debug_config(Config { output: DebugOutput::File(path.clone()), ..config(DebugSeverity::All) });

    send(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, c"written to disk");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("VUID-test"));
    assert!(contents.contains("written to disk"));
}
