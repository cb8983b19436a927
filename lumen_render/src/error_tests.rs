//! Unit tests for the error module
//!
//! Tests Display formatting of every variant and the ra_err!/ra_bail!
//! helper macros.

use crate::error::{Error, Result};

// ============================================================================
// DISPLAY FORMATTING
// ============================================================================

#[test]
fn test_error_display_all_variants() {
    let cases = [
        (Error::BackendError("gl".to_string()), "Backend error: gl"),
        (Error::Unsupported("pbo".to_string()), "Unsupported: pbo"),
        (
            Error::InvalidResource("tex".to_string()),
            "Invalid resource: tex",
        ),
        (Error::ShaderFailed("link".to_string()), "Shader failed: link"),
        (
            Error::InitializationFailed("ctx".to_string()),
            "Initialization failed: ctx",
        ),
    ];

    for (error, expected) in cases {
        assert_eq!(error.to_string(), expected);
    }
}

#[test]
fn test_error_implements_std_error() {
    // Boxing through the std Error trait must work for propagation into
    // caller error surfaces.
    let err: Box<dyn std::error::Error> = Box::new(Error::BackendError("x".to_string()));
    assert!(err.to_string().contains("Backend error"));
}

// ============================================================================
// MACROS
// ============================================================================

fn failing_operation() -> Result<i32> {
    crate::ra_bail!("lumen::tests", "operation failed with code {}", 42);
}

#[test]
fn test_ra_bail_returns_backend_error() {
    match failing_operation() {
        Err(Error::BackendError(msg)) => {
            assert_eq!(msg, "operation failed with code 42");
        }
        other => panic!("expected BackendError, got {:?}", other),
    }
}

#[test]
fn test_ra_err_produces_value() {
    let err = crate::ra_err!("lumen::tests", "mapping {} failed", "buffer");
    match err {
        Error::BackendError(msg) => assert_eq!(msg, "mapping buffer failed"),
        other => panic!("expected BackendError, got {:?}", other),
    }
}
