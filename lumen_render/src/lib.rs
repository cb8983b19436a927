/*!
# Lumen Render

Backend-agnostic GPU render layer for a video-output pipeline.

This crate provides the hardware-independent rendering API sitting between a
player's video output code and concrete GPU backends. Backend implementations
(OpenGL, Direct3D 11, etc.) live in separate crates and plug in through the
`Ra` trait.

## Architecture

- **Ra**: backend trait — texture/buffer allocation, uploads, clears, blits,
  render pass creation and execution
- **Format / PixelFormat**: native texture format registry and the mapping of
  player pixel formats onto per-plane native formats
- **ShaderCache**: incremental shader assembly, program caching (in memory and
  on disk) and the draw/dispatch entry points
- **FboTex / Transform**: render-target and coordinate helpers for callers

Backend implementations provide concrete types that implement the `Ra`,
`Tex`, `MappedBuf`, `Buf` and `RenderPass` traits.
*/

// Internal modules
mod error;
pub mod log;
pub mod ra;
pub mod shader_cache;
pub mod timer;
pub mod utils;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render abstraction sub-module with all backend-facing types
    pub mod ra {
        pub use crate::ra::*;
    }

    // Shader assembly / caching sub-module
    pub mod shader {
        pub use crate::shader_cache::*;
    }

    // Timing telemetry
    pub mod timer {
        pub use crate::timer::{PassPerf, PassTimer};
    }

    // Render-target and transform helpers
    pub mod utils {
        pub use crate::utils::*;
    }
}

// Re-export math library at crate root
pub use glam;
