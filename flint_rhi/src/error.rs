//! Error types for the Flint RHI
//!
//! Native API failures, invalid descriptions, and recoverable state
//! inconsistencies (incomplete framebuffer, failed buffer map) all surface as
//! an `Error` value. Nothing in the library panics on a GPU failure.

use std::fmt;

/// Result type for Flint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Flint RHI errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL, Direct3D 11)
    BackendError(String),

    /// Out of GPU or host memory
    OutOfMemory,

    /// Invalid resource or description (texture, buffer, pipeline, etc.)
    InvalidResource(String),

    /// Device/context creation failed. Fatal: the caller must abort startup.
    InitializationFailed(String),

    /// The backend rejected a render-target combination
    IncompleteFramebuffer(String),

    /// A buffer could not be mapped for writing
    MappingFailed(String),

    /// Operation not allowed in the current command-list lifecycle state
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::IncompleteFramebuffer(msg) => write!(f, "Incomplete framebuffer: {}", msg),
            Error::MappingFailed(msg) => write!(f, "Mapping failed: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
