/*!
# Galaxy 3D Material

Material system of the Galaxy 3D rendering engine.

Materials describe how a mesh is shaded: shader files, per-stage parameters
(scalars, vectors, textures) and an optional compute task with structured
buffers. The manager turns them into GPU state through the backend-agnostic
`GraphicsDevice` trait and keeps that state in sync with edits and with the
files on disk.

## Architecture

- **Material / MaterialInstance**: CPU-side parameter tables; instances override a parent
- **MaterialAsset**: JSON material files and HLSL declaration synthesis
- **MaterialLayout**: set layouts, compiled shaders and pipelines of one material
- **MaterialResource**: per-frame binding groups, uniform buffers, textures and SSBOs of one instance
- **MaterialManager**: named registry, per-frame updates and hot reload

Backends provide concrete types implementing the `graphics_device` traits.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod asset;
pub mod material;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::{MaterialConfig, ERROR_MATERIAL_NAME};

    // Material system entry points
    pub use crate::material::{
        Material, MaterialInstance, MaterialManager, MaterialManagerDesc, DescriptorSetReferences, MaterialStage,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, CaptureLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Graphics device contracts
    pub mod graphics_device {
        pub use crate::graphics_device::*;
    }

    // Asset loading and monitoring
    pub mod asset {
        pub use crate::asset::*;
    }

    // Materials, layouts and resources
    pub mod material {
        pub use crate::material::*;
    }
}

// Re-export math library at crate root
pub use glam;
