//! Resource module
//!
//! Typed handles and the per-kind record tables backing them.

pub mod handle;
pub mod resource_table;
pub mod records;

pub use handle::*;
pub use resource_table::ResourceTable;
pub use records::*;
