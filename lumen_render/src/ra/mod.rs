/// Render abstraction module - all backend-facing types and traits

// Module declarations
pub mod ra;
pub mod format;
pub mod imgfmt;
pub mod tex;
pub mod renderpass;

// Re-export everything from ra.rs
pub use ra::*;

// Re-export from other modules
pub use format::*;
pub use imgfmt::*;
pub use tex::*;
pub use renderpass::*;

// Mock backend for tests (no GPU required)
#[cfg(test)]
pub mod mock_ra;
