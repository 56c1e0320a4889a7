/// Backend - the explicit GPU context object
///
/// Split the way the operations group: frame progression and lifetime in
/// `backend.rs`, resource creation/destruction in `backend_resources.rs`,
/// command recording in `backend_recording.rs`.

mod backend;
mod backend_resources;
mod backend_recording;

pub use backend::Backend;
pub use backend_resources::{PipelineDesc, ReloadOutcome};
pub use backend_recording::{ColorTarget, DepthTarget, RenderPassDesc};

#[cfg(test)]
mod test_support;
