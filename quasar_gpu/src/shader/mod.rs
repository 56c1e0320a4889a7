/// Shader module - compiler contract, reflection and binding layouts

pub mod reflection;
pub mod binding_layout;
pub mod sampler_registry;

pub use reflection::*;
pub use binding_layout::*;
pub use sampler_registry::*;
