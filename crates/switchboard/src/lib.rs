//! # Switchboard
//!
//! Typed feature toggles with layered providers, local overrides and live
//! updates.
//!
//! ## Overview
//!
//! A toggle is a named, typed value with a default. Switchboard resolves it
//! from a stack of providers: a base layer (local defaults or a remote JSON
//! document) and an override layer persisted on disk. Overrides always win;
//! groups merge override and base field by field.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌───────────────────────────────┐     ┌────────────────┐
//! │ ToggleRuntime │────▶│ local  = overrides ▸ defaults │────▶│ Toggle / Group │
//! │   (config)    │────▶│ remote = overrides ▸ document │────▶│ DebugRegistry  │
//! └───────────────┘     └───────────────────────────────┘     └────────────────┘
//! ```
//!
//! - **Core**: key paths, value trees, decoders, providers and toggle descriptors
//! - **Runtime**: configuration, logging, file storage, remote sources and the
//!   refresh loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchboard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ToggleRuntime::builder().build()?;
//!     let beta = runtime.toggle("beta", false);
//!
//!     runtime.start().await;
//!     if beta.value_or_default() {
//!         println!("beta enabled");
//!     }
//!     runtime.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output
//! - `http-remote`: HTTP(S) remote documents

pub use switchboard_core as core;
pub use switchboard_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use switchboard::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use switchboard_runtime::{RuntimeBuilder, SwitchboardConfig, ToggleRuntime};

    // Toggle descriptors
    pub use switchboard_core::{
        Group, GroupProperty, PropertyTable, Toggle, ToggleChoice, ToggleGroup, ToggleValue,
    };

    // Observation and debugging
    pub use switchboard_core::{DebugRegistry, DebugToggle, ObservableToggle};

    // Providers for custom wiring
    pub use switchboard_core::{
        KeyPath, ToggleOverriding, ToggleOverridingExt, ToggleProvider, ToggleProviderExt, Value,
    };

    // Errors
    pub use switchboard_core::{ToggleError, ToggleResult};
    pub use switchboard_runtime::{RuntimeError, RuntimeResult};
}
