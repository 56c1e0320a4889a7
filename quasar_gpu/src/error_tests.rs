//! Unit tests for error.rs
//!
//! Tests Error variants, Display output and the error macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_capacity_exceeded_display() {
    let err = Error::CapacityExceeded("buffer pool (4096)".to_string());
    assert_eq!(format!("{}", err), "Capacity exceeded: buffer pool (4096)");
}

#[test]
fn test_invalid_handle_display() {
    let err = Error::InvalidHandle("texture #12".to_string());
    assert_eq!(format!("{}", err), "Invalid handle: texture #12");
}

#[test]
fn test_shader_compilation_failed_display() {
    let err = Error::ShaderCompilationFailed("lighting.hlsl(12): syntax error".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Shader compilation failed"));
    assert!(display.contains("syntax error"));
}

#[test]
fn test_remaining_variants_display() {
    assert!(format!("{}", Error::InvalidResource("x".into())).starts_with("Invalid resource"));
    assert!(format!("{}", Error::InitializationFailed("x".into())).starts_with("Initialization failed"));
    assert!(format!("{}", Error::InvalidBinding("x".into())).starts_with("Invalid binding"));
    assert!(format!("{}", Error::InvalidState("x".into())).starts_with("Invalid state"));
}

// ============================================================================
// TRAIT TESTS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    fn takes_std_error(_: &dyn std::error::Error) {}
    takes_std_error(&Error::OutOfMemory);
}

#[test]
fn test_result_question_mark_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::InvalidState("not recording".to_string()))
    }
    fn outer() -> Result<u32> {
        let v = inner()?;
        Ok(v + 1)
    }
    assert_eq!(outer(), Err(Error::InvalidState("not recording".to_string())));
}

// ============================================================================
// MACRO TESTS
// ============================================================================

#[test]
fn test_engine_err_defaults_to_backend_error() {
    let err = crate::engine_err!("quasar::test", "value {} out of range", 7);
    assert_eq!(err, Error::BackendError("value 7 out of range".to_string()));
}

#[test]
fn test_engine_err_with_variant() {
    let err = crate::engine_err!(CapacityExceeded => "quasar::test", "pool full ({})", 3);
    assert_eq!(err, Error::CapacityExceeded("pool full (3)".to_string()));
}

#[test]
fn test_engine_bail_returns_early() {
    fn check(value: u32) -> Result<u32> {
        if value == 0 {
            crate::engine_bail!(InvalidHandle => "quasar::test", "zero is not a handle");
        }
        Ok(value)
    }
    assert_eq!(check(4), Ok(4));
    assert_eq!(check(0), Err(Error::InvalidHandle("zero is not a handle".to_string())));
}

#[test]
fn test_engine_warn_err_with_variant() {
    let err = crate::engine_warn_err!(ShaderCompilationFailed => "quasar::test", "bad shader");
    assert_eq!(err, Error::ShaderCompilationFailed("bad shader".to_string()));
}
