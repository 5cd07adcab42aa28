//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkCreateBuffer failed: ERROR_OUT_OF_DEVICE_MEMORY".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkCreateBuffer failed"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("mip_count must be >= 1".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("mip_count"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("D3D11CreateDeviceAndSwapChain (0x887A0004)".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Initialization failed"));
    assert!(display.contains("0x887A0004"));
}

#[test]
fn test_incomplete_framebuffer_display() {
    let err = Error::IncompleteFramebuffer("GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Incomplete framebuffer"));
    assert!(display.contains("INCOMPLETE_ATTACHMENT"));
}

#[test]
fn test_mapping_failed_display() {
    let err = Error::MappingFailed("Failed to map buffer!".to_string());
    assert_eq!(format!("{}", err), "Mapping failed: Failed to map buffer!");
}

#[test]
fn test_invalid_state_display() {
    let err = Error::InvalidState("end() called while Idle".to_string());
    assert!(format!("{}", err).contains("Idle"));
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
fn test_error_debug() {
    let err = Error::BackendError("test".to_string());
    assert!(format!("{:?}", err).contains("BackendError"));
    assert_eq!(format!("{:?}", Error::OutOfMemory), "OutOfMemory");
}

#[test]
fn test_error_clone_and_eq() {
    let err = Error::MappingFailed("map".to_string());
    let cloned = err.clone();
    assert_eq!(err, cloned);
    assert_ne!(err, Error::OutOfMemory);
}

// ============================================================================
// RESULT ALIAS
// ============================================================================

fn fails() -> Result<u32> {
    Err(Error::InvalidState("not recording".to_string()))
}

fn propagates() -> Result<u32> {
    let value = fails()?;
    Ok(value + 1)
}

#[test]
fn test_result_question_mark_propagation() {
    match propagates() {
        Err(Error::InvalidState(msg)) => assert_eq!(msg, "not recording"),
        other => panic!("unexpected result: {:?}", other),
    }
}
