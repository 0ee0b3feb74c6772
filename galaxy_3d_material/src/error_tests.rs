//! Unit tests for error.rs
//!
//! Tests Error variants, Display output and the engine_err!/engine_bail! macros.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("descriptor pool exhausted".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("descriptor pool exhausted"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_asset_error_display() {
    let err = Error::AssetError("materials/rock.mat: expected value at line 1".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Asset error"));
    assert!(display.contains("rock.mat"));
}

#[test]
fn test_shader_compilation_display() {
    let err = Error::ShaderCompilation("undeclared identifier 'roughnes'".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Shader compilation failed"));
    assert!(display.contains("roughnes"));
}

#[test]
fn test_invalid_state_display() {
    let err = Error::InvalidState("material is compute only".to_string());
    assert_eq!(format!("{}", err), "Invalid state: material is compute only");
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug_names_variant() {
    assert!(format!("{:?}", Error::InvalidState("x".to_string())).contains("InvalidState"));
    assert!(format!("{:?}", Error::AssetError("x".to_string())).contains("AssetError"));
}

#[test]
fn test_error_clone() {
    let err1 = Error::ShaderCompilation("fragment".to_string());
    let err2 = err1.clone();
    assert_eq!(format!("{}", err1), format!("{}", err2));
}

// ============================================================================
// MACRO TESTS
// ============================================================================

fn bail_when_negative(value: i32) -> Result<i32> {
    if value < 0 {
        crate::engine_bail!("galaxy3d::tests", "Negative value {}", value);
    }
    Ok(value * 2)
}

#[test]
fn test_engine_bail_returns_backend_error() {
    match bail_when_negative(-3) {
        Err(Error::BackendError(msg)) => assert_eq!(msg, "Negative value -3"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_engine_bail_passes_through_ok() {
    assert_eq!(bail_when_negative(21).unwrap(), 42);
}

#[test]
fn test_engine_err_builds_error() {
    let err = crate::engine_err!("galaxy3d::tests", "Missing binding {}", 4);
    assert!(matches!(err, Error::BackendError(ref msg) if msg == "Missing binding 4"));
}

// ============================================================================
// ERROR PROPAGATION TESTS
// ============================================================================

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<i32> {
        Err(Error::OutOfMemory)
    }

    fn outer() -> Result<i32> {
        inner()?;
        Ok(42)
    }

    assert!(matches!(outer(), Err(Error::OutOfMemory)));
}
