//! Configuration for the Switchboard runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, override storage, the remote document source and the local
//! default values.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RemoteConfig, StorageConfig,
    SwitchboardConfig,
};
pub use validation::validate_config;
