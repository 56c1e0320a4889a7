/// Upload subsystem - staged copies into GPU-only resources

pub mod upload_manager;

pub use upload_manager::*;
