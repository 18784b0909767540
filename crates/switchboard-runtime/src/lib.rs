//! Switchboard Runtime - application wiring for the Switchboard toggle framework.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `SwitchboardConfig`)
//! - Logging setup on `tracing-subscriber` (`LoggingBuilder`)
//! - A JSON file storage backend for overrides (`JsonFileStorage`)
//! - File and HTTP remote document sources (`FileDocumentSource`, `HttpDocumentSource`)
//! - Provider orchestration and the refresh loop (`ToggleRuntime`)
//!
//! # Example
//!
//! ```rust,ignore
//! use switchboard_runtime::ToggleRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = ToggleRuntime::builder().build()?;
//!     let beta = runtime.toggle("beta", false);
//!
//!     runtime.start().await;
//!     println!("beta = {}", beta.value_or_default());
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-remote`: HTTP(S) remote document sources via `reqwest`

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod runtime;
pub mod storage;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, RemoteConfig, StorageConfig, SwitchboardConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
#[cfg(feature = "http-remote")]
pub use remote::HttpDocumentSource;
pub use remote::{FileDocumentSource, source_from_config};
pub use runtime::{OverrideStore, RuntimeBuilder, ToggleRuntime};
pub use storage::JsonFileStorage;

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;
