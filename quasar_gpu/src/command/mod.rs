/// Command recording helpers

pub mod barrier;

pub use barrier::*;
