//! Error types for the Quasar GPU core
//!
//! Every fallible operation of the core returns [`Result`]. Contract
//! violations (exhausted pools, double frees, unknown bindings...) are
//! reported through the same type instead of aborting the process, the
//! caller decides what to do with them.

use std::fmt;

/// Result type for Quasar GPU operations
pub type Result<T> = std::result::Result<T, Error>;

/// Quasar GPU errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Native backend error (Vulkan, mock device, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (wrong kind, missing view, not CPU visible, ...)
    InvalidResource(String),

    /// Initialization failed (context, device, subsystems)
    InitializationFailed(String),

    /// A fixed-capacity pool, heap or queue is exhausted
    CapacityExceeded(String),

    /// Handle or descriptor is not live (never acquired or already freed)
    InvalidHandle(String),

    /// Binding does not exist in the current pipeline layout or has the wrong kind
    InvalidBinding(String),

    /// Operation called in the wrong recording/frame state
    InvalidState(String),

    /// Shader compilation or reflection failed (recoverable on reload)
    ShaderCompilationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::InvalidBinding(msg) => write!(f, "Invalid binding: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::ShaderCompilationFailed(msg) => write!(f, "Shader compilation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
