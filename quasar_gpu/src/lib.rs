/*!
# Quasar GPU

GPU resource management and command submission core.

This crate sits between a renderer and a native graphics API. It owns every
GPU resource behind typed handles, pipelines frame submission across a fixed
number of frames in flight, derives pipeline binding layouts from shader
reflection and records draws and dispatches with automatic state
transitions. Native APIs plug in through the `graphics_device` traits
(`quasar_gpu_vulkan` provides the Vulkan implementation).

## Architecture

- **Backend**: The context. Resource tables, frame pipelining, barriers, uploads, recording
- **GraphicsDevice**: Native factory for buffers, textures, pipelines, heaps and queues
- **BindingLayout**: Pipeline layout derived from the reflection of all stages
- **Descriptor heaps**: Staging heaps, per-frame render-pass heaps and the bindless table
- **FramePipeliner**: Slot rotation, fences and deferred destruction
- **UploadManager**: FIFO of staged copies into GPU-only resources
*/

// Internal modules
mod error;
mod config;
pub mod log;
pub mod utils;
pub mod graphics_device;
pub mod descriptor;
pub mod resource;
pub mod command;
pub mod frame;
pub mod upload;
pub mod shader;
pub mod backend;

// Main quasar namespace module
pub mod quasar {
    // Error types
    pub use crate::error::{Error, Result};

    // Context and its configuration
    pub use crate::backend::{Backend, ColorTarget, DepthTarget, PipelineDesc, ReloadOutcome, RenderPassDesc};
    pub use crate::config::{
        align_up, Config, ShaderLoadRetry, BINDLESS_REGISTER_SPACE, CONSTANT_BUFFER_ALIGNMENT,
        FRAMES_IN_FLIGHT, INVALID_PARAMETER, MAX_PUSH_CONSTANT_SIZE, PUSH_CONSTANT_REGISTER,
    };

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{reset_logger, set_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Native device contract, implemented by backend crates
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Shader compiler contract, reflection and binding layouts
    pub mod shader {
        pub use crate::shader::*;
    }

    // Descriptor allocators
    pub mod descriptor {
        pub use crate::descriptor::*;
    }

    // Handles and records
    pub mod resource {
        pub use crate::resource::{
            AnyHandle, BufferHandle, Handle, PipelineHandle, ResourceHandle, TextureHandle,
        };
    }

    // Frame pipelining
    pub mod frame {
        pub use crate::frame::*;
    }

    // Upload subsystem
    pub mod upload {
        pub use crate::upload::*;
    }
}

// Re-export math library at crate root
pub use glam;
