//! Context configuration and binding-contract constants

use std::time::Duration;
use crate::error::Result;

/// Number of frames the CPU may record ahead of the GPU
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Register (binding space for SPIR-V) reserved for the push-constant block
pub const PUSH_CONSTANT_REGISTER: u32 = 999;

/// Register space of the global bindless arrays, never part of a pipeline layout
pub const BINDLESS_REGISTER_SPACE: u32 = 1;

/// Sentinel for "pipeline has no such parameter"
pub const INVALID_PARAMETER: u32 = u32::MAX;

/// Constant buffer views must start and end on this boundary
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Row pitch alignment for buffer -> texture copies
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u64 = 256;

/// Offset alignment of a texture footprint inside an upload heap
pub const TEXTURE_DATA_PLACEMENT_ALIGNMENT: u64 = 512;

/// Largest push-constant block accepted by the layout builder
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 128;

/// Round `value` up to the next multiple of `alignment` (power of two)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Retry policy for the first compilation of a pipeline's shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderLoadRetry {
    /// `None` retries until the shader compiles
    pub max_attempts: Option<u32>,
    /// Sleep between attempts, leaving time to fix the source
    pub interval: Duration,
}

impl Default for ShaderLoadRetry {
    fn default() -> Self {
        Self {
            max_attempts: None,
            interval: Duration::from_secs(1),
        }
    }
}

/// Capacities and policies of a [`Backend`](crate::quasar::Backend)
#[derive(Debug, Clone)]
pub struct Config {
    pub frames_in_flight: usize,
    pub max_buffers: u32,
    pub max_textures: u32,
    pub max_pipelines: u32,
    /// CPU-only CBV/SRV/UAV heap
    pub staging_descriptor_capacity: u32,
    pub render_target_descriptor_capacity: u32,
    pub depth_stencil_descriptor_capacity: u32,
    /// Bindless prefix of every render-pass heap
    pub num_reserved_descriptors: u32,
    /// Per-frame transient region of every render-pass heap
    pub num_transient_descriptors: u32,
    pub max_barrier_batch: usize,
    pub upload_heap_size: u64,
    pub frame_allocator_size: u64,
    pub shader_load_retry: ShaderLoadRetry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frames_in_flight: FRAMES_IN_FLIGHT,
            max_buffers: 4096,
            max_textures: 4096,
            max_pipelines: 256,
            staging_descriptor_capacity: 16384,
            render_target_descriptor_capacity: 512,
            depth_stencil_descriptor_capacity: 128,
            num_reserved_descriptors: 8192,
            num_transient_descriptors: 4096,
            max_barrier_batch: 16,
            upload_heap_size: 32 * 1024 * 1024,
            frame_allocator_size: 4 * 1024 * 1024,
            shader_load_retry: ShaderLoadRetry::default(),
        }
    }
}

impl Config {
    pub fn with_pool_capacities(mut self, buffers: u32, textures: u32, pipelines: u32) -> Self {
        self.max_buffers = buffers;
        self.max_textures = textures;
        self.max_pipelines = pipelines;
        self
    }

    pub fn with_descriptor_capacities(mut self, reserved: u32, transient: u32) -> Self {
        self.num_reserved_descriptors = reserved;
        self.num_transient_descriptors = transient;
        self
    }

    pub fn with_staging_capacity(mut self, capacity: u32) -> Self {
        self.staging_descriptor_capacity = capacity;
        self
    }

    pub fn with_barrier_batch(mut self, size: usize) -> Self {
        self.max_barrier_batch = size;
        self
    }

    pub fn with_upload_heap_size(mut self, size: u64) -> Self {
        self.upload_heap_size = size;
        self
    }

    pub fn with_frame_allocator_size(mut self, size: u64) -> Self {
        self.frame_allocator_size = size;
        self
    }

    pub fn with_shader_load_retry(mut self, retry: ShaderLoadRetry) -> Self {
        self.shader_load_retry = retry;
        self
    }

    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight != FRAMES_IN_FLIGHT {
            crate::engine_bail!(InitializationFailed => "quasar::Config",
                "frames_in_flight must be {} (got {})", FRAMES_IN_FLIGHT, self.frames_in_flight);
        }
        let capacities = [
            ("max_buffers", self.max_buffers as u64),
            ("max_textures", self.max_textures as u64),
            ("max_pipelines", self.max_pipelines as u64),
            ("staging_descriptor_capacity", self.staging_descriptor_capacity as u64),
            ("render_target_descriptor_capacity", self.render_target_descriptor_capacity as u64),
            ("depth_stencil_descriptor_capacity", self.depth_stencil_descriptor_capacity as u64),
            ("num_reserved_descriptors", self.num_reserved_descriptors as u64),
            ("num_transient_descriptors", self.num_transient_descriptors as u64),
            ("max_barrier_batch", self.max_barrier_batch as u64),
            ("upload_heap_size", self.upload_heap_size),
            ("frame_allocator_size", self.frame_allocator_size),
        ];
        for (name, value) in capacities {
            if value == 0 {
                crate::engine_bail!(InitializationFailed => "quasar::Config",
                    "{} must be greater than zero", name);
            }
        }
        if self.shader_load_retry.max_attempts == Some(0) {
            crate::engine_bail!(InitializationFailed => "quasar::Config",
                "shader_load_retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
