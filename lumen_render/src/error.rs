//! Error types for the Lumen render layer
//!
//! This module defines the error types used throughout the render layer,
//! covering backend failures, missing capabilities, resource creation and
//! shader compilation.

use std::fmt;

/// Result type for render layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Render layer errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (OpenGL, Direct3D 11, etc.)
    BackendError(String),

    /// Required capability is missing (backend version too low, feature
    /// not supported by the driver)
    Unsupported(String),

    /// Invalid resource, or resource creation failed a validation step
    InvalidResource(String),

    /// Shader compilation or program link failure
    ShaderFailed(String),

    /// Initialization failed (backend context, subsystems)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::ShaderFailed(msg) => write!(f, "Shader failed: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Log an ERROR message and produce an [`Error::BackendError`] with the same
/// text. Use where an error value is needed inline (e.g. in `map_err`).
///
/// # Example
///
/// ```ignore
/// device.do_thing().map_err(|e| ra_err!("lumen::gl", "Thing failed: {:?}", e))?;
/// ```
#[macro_export]
macro_rules! ra_err {
    ($source:expr, $($arg:tt)*) => {{
        $crate::ra_error!($source, $($arg)*);
        $crate::lumen::Error::BackendError(format!($($arg)*))
    }};
}

/// Log an ERROR message and return it as an `Err` from the current function.
///
/// # Example
///
/// ```ignore
/// if layer >= info.array_layers {
///     ra_bail!("lumen::gl", "layer {} out of range", layer);
/// }
/// ```
#[macro_export]
macro_rules! ra_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::ra_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
