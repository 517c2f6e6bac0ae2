//! Error types for the uplink transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use uplink_transport::{Result, Error};
//!
//! async fn example(transport: &SocketTransport) -> Result<()> {
//!     let topic = "vehicle/door/status".parse()?;
//!     transport.register_listener(&topic, listener)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | [`Error::InvalidArgument`] |
//! | Registration | [`Error::NotFound`], [`Error::AlreadyExists`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Internal`] |
//! | Framing | [`Error::FrameTooLarge`], [`Error::Decode`] |
//! | Invocation | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Malformed URI, filter, or attributes.
    ///
    /// Returned when an addressing value fails validation, or when an
    /// envelope's attributes violate the invariants of its message kind.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Registration Errors
    // ========================================================================
    /// Listener or filter not found.
    ///
    /// Returned when unregistering a listener that was never registered
    /// (or was already removed).
    #[error("Not found: {message}")]
    NotFound {
        /// Description of the missing entry.
        message: String,
    },

    /// Request id collision in the correlation table.
    ///
    /// Ids are 128-bit random values, so a collision indicates a programming
    /// error (reusing an id), not a recoverable condition.
    #[error("Already exists: request {request_id} is still pending")]
    AlreadyExists {
        /// The colliding request id.
        request_id: RequestId,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection to the dispatcher failed.
    ///
    /// Returned when the initial TCP connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed.
    ///
    /// Returned when an operation is attempted after the dispatch loop has
    /// terminated, and used to fail pending calls on closure.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O failure on an established connection.
    ///
    /// The connection should be considered possibly-corrupted thereafter.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
    },

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Frame exceeds the maximum allowed length.
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge {
        /// Declared frame length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Frame body could not be decoded into an envelope.
    ///
    /// The dispatch loop treats this as fatal: the stream is assumed
    /// corrupted.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Invocation Errors
    // ========================================================================
    /// RPC call deadline exceeded.
    ///
    /// Returned by `invoke_method` when no response arrives in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request id that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[inline]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an already exists error.
    #[inline]
    pub fn already_exists(request_id: RequestId) -> Self {
        Self::AlreadyExists { request_id }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a frame too large error.
    #[inline]
    pub fn frame_too_large(len: usize, max: usize) -> Self {
        Self::FrameTooLarge { len, max }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::Internal { .. }
        )
    }

    /// Returns `true` if this is a validation error.
    #[inline]
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` if this is a not found error.
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("dispatcher unreachable");
        assert_eq!(err.to_string(), "Connection failed: dispatcher unreachable");
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::invalid_argument("empty URI");
        assert_eq!(err.to_string(), "Invalid argument: empty URI");
    }

    #[test]
    fn test_request_timeout_display() {
        let id = RequestId::generate();
        let err = Error::request_timeout(id, 50);
        assert_eq!(err.to_string(), format!("Request {id} timed out after 50ms"));
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(RequestId::generate(), 1000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        let conn_err = Error::connection("test");
        let closed_err = Error::ConnectionClosed;
        let internal_err = Error::internal("broken pipe");
        let other_err = Error::not_found("test");

        assert!(conn_err.is_connection_error());
        assert!(closed_err.is_connection_error());
        assert!(internal_err.is_connection_error());
        assert!(!other_err.is_connection_error());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("no listener").is_not_found());
        assert!(!Error::ConnectionClosed.is_not_found());
    }

    #[test]
    fn test_frame_too_large_display() {
        let err = Error::frame_too_large(5_000_000, 4_194_304);
        assert_eq!(
            err.to_string(),
            "Frame too large: 5000000 bytes (max 4194304)"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::BrokenPipe, "broken pipe");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
