//! Error types for the series store library
//!
//! This module provides a unified error handling system using `thiserror` for
//! the storage backends, the session collaborator and record conversion.

use thiserror::Error;

/// The main error type for the series store library
#[derive(Error, Debug)]
pub enum Error {
    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session provider errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Record conversion errors
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable message
        message: String,
    },

    /// Invalid input data
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable message
        message: String,
    },
}

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage backend not available
    #[error("Storage backend not available: {backend}")]
    BackendNotAvailable {
        /// Backend name
        backend: String,
    },

    /// Storage operation failed
    #[error("Storage operation failed: {operation}: {reason}")]
    OperationFailed {
        /// Operation name
        operation: String,
        /// Failure reason
        reason: String,
    },

    /// Authentication failed
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Failure reason
        reason: String,
    },

    /// Permission denied
    #[error("Permission denied: {resource}")]
    PermissionDenied {
        /// Resource that was denied
        resource: String,
    },

    /// Connection error
    #[error("Connection error: {reason}")]
    ConnectionError {
        /// Failure reason
        reason: String,
    },

    /// Non-success HTTP response from a remote backend
    #[error("HTTP error: {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Human-readable message
        message: String,
    },

    /// Operation did not complete within the configured timeout
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// Operation name
        operation: String,
    },

    /// JSON encoding/decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A store lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Session-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No user is signed in
    #[error("No user is signed in")]
    NotSignedIn,
}

/// Conversion-specific error types
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Raw node data does not have the shape of a series record
    #[error("Invalid series shape at '{key}': {reason}")]
    InvalidShape {
        /// Key of the offending node
        key: String,
        /// Failure reason
        reason: String,
    },

    /// A record could not be serialized for writing
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Convenience type alias for Conversion Results
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let storage_error = StorageError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        let error = Error::Storage(storage_error);
        assert!(error.to_string().contains("Storage error"));
        assert!(error.to_string().contains("503"));
    }

    #[test]
    fn test_session_error() {
        let error: Error = SessionError::NotSignedIn.into();
        assert!(matches!(error, Error::Session(SessionError::NotSignedIn)));
        assert!(error.to_string().contains("No user is signed in"));
    }

    #[test]
    fn test_convert_error_chain() {
        let convert_error = ConvertError::InvalidShape {
            key: "42".to_string(),
            reason: "missing field `title`".to_string(),
        };
        let error = Error::Convert(convert_error);
        assert!(error.to_string().contains("Conversion error"));
        assert!(error.to_string().contains("'42'"));
    }
}
