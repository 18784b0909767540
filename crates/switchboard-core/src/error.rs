//! Unified error types for the Switchboard core.
//!
//! Every error is `Clone` so that a single failure can be fanned out to all
//! subscribers of a resolved value stream.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised by external collaborators (storage backends, remote document
/// sources). The core never inspects these, it only forwards them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A request to a remote endpoint failed.
    #[error("request to {url} failed: {reason}")]
    Request {
        /// The endpoint that was requested.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// The source was closed before it produced a value.
    #[error("source closed")]
    Closed,

    /// Other transport error.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Toggle Errors
// =============================================================================

/// Errors that can occur while addressing, decoding or resolving toggle values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToggleError {
    /// Nothing is stored at the requested key.
    #[error("key not found: '{key}'")]
    KeyNotFound {
        /// The key path that was requested.
        key: String,
    },

    /// A value exists but has the wrong shape.
    #[error("type mismatch at '{key}': found {actual}, expected {expected}")]
    TypeMismatch {
        /// The key path that was requested.
        key: String,
        /// The kind of value that was found.
        actual: String,
        /// The kind of value that was expected.
        expected: String,
    },

    /// An asynchronous source completed without producing a value.
    #[error("source produced no value")]
    NoValue,

    /// A structured document could not be parsed.
    #[error("failed to parse document: {reason}")]
    Parse {
        /// Reason for failure.
        reason: String,
    },

    /// Error surfaced unchanged from an external collaborator.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ToggleError {
    /// Creates a key-not-found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a type-mismatch error.
    pub fn type_mismatch(
        key: impl Into<String>,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error means "nothing stored here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

impl From<serde_json::Error> for ToggleError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for toggle operations.
pub type ToggleResult<T> = Result<T, ToggleError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
