/// Utility module - generic building blocks

pub mod handle_pool;

pub use handle_pool::HandlePool;
