//! Runtime error types.

use thiserror::Error;

use switchboard_core::{ToggleError, TransportError};

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A provider failed to set up or resolve.
    #[error("Toggle error: {0}")]
    Toggle(#[from] ToggleError),

    /// A storage or remote source failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The runtime has no remote provider configured.
    #[error("No remote source configured")]
    NoRemote,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
