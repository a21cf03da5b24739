//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (validation failures, invalid phase transitions) and the error taxonomy
//! for everything that talks to the remote device.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid device path format or content
    #[error("Invalid device path: {0}")]
    InvalidDevicePath(String),

    /// Invalid content hash format
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors returned by device I/O
///
/// `NotFound` is an expected outcome for listings (the directory needs
/// creating) and is never counted as a failure by callers that handle it.
/// `ProtectedPath` is raised before any network call is made.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure, timeout, refused connection or 5xx response
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    /// The device reported the path as absent
    #[error("Not found on device: {0}")]
    NotFound(String),

    /// The device answered with a non-success status
    #[error("Device rejected request ({status}): {body}")]
    Rejected {
        /// HTTP status code returned by the device
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Attempted to delete one of the protected top-level directories
    #[error("Refusing to delete protected path: {0}")]
    ProtectedPath(String),

    /// The device answered, but the payload could not be understood
    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    /// Local filesystem failure while staging a transfer
    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Returns true for failures that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }

    /// Returns true when the device reported the path as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}
