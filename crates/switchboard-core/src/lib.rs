//! # Switchboard Core
//!
//! The value-resolution engine of the Switchboard toggle framework.
//!
//! A toggle is a named, typed value with a default. Its effective value comes
//! from a base provider, unless an override layer holds a value for the same
//! key. This crate provides everything between a raw source and a resolved
//! value:
//!
//! - **Addressing**: dotted [`KeyPath`]s into nested [`Value`] trees
//!   ([`tree::read`], [`tree::write`]).
//! - **Decoding**: [`ToggleDecoder`] backends over value trees and raw JSON
//!   documents, plus the [`GroupDecoder`] that merges override and base per
//!   field.
//! - **Providers**: [`ToggleProvider`] and [`ToggleOverriding`] with in-memory,
//!   persistent and document-backed implementations.
//! - **Descriptors**: [`Toggle`] and [`Group`] with explicit synchronous,
//!   defaulted and streaming resolution.
//! - **Publishing**: [`ObservableToggle`] keeps a deduplicated current value.
//! - **Introspection**: [`DebugToggle`] and [`DebugRegistry`] for debug UIs.
//!
//! ## Resolution
//!
//! ```text
//! ┌──────────┐  has key?  ┌──────────────┐
//! │  Toggle  │──────────▶ │   Override   │──yes──▶ decode override
//! └──────────┘            └──────────────┘
//!                                │ no
//!                                ▼
//!                         ┌──────────────┐
//!                         │     Base     │──────▶ decode base
//!                         └──────────────┘
//! ```
//!
//! Groups always decode through a [`GroupDecoder`], so each field falls back
//! from override to base on its own.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use switchboard_core::prelude::*;
//!
//! let defaults = InMemoryProvider::from_json("defaults", r#"{"search": {"limit": "20"}}"#)?;
//! let overrides = PersistentProvider::new("overrides", MemoryStorage::new())?;
//! let provider = Arc::new(OverridableProvider::new(
//!     "local",
//!     Arc::new(defaults),
//!     Arc::new(overrides),
//! ));
//!
//! let limit = Toggle::new("search.limit", 10_u32, provider);
//! assert_eq!(limit.value()?, 20);
//!
//! limit.set_override(&50)?;
//! assert_eq!(limit.value()?, 50);
//! # Ok::<(), switchboard_core::ToggleError>(())
//! ```

pub mod debug;
pub mod decoder;
pub mod error;
pub mod key;
pub mod provider;
pub mod publisher;
pub mod resolve;
pub mod storage;
pub mod stream;
pub mod toggle;
pub mod tree;
pub mod value;

pub use debug::{DebugProperty, DebugRegistry, DebugToggle};
pub use decoder::{
    BoxedDecoder, DocumentDecoder, FailedDecoder, GroupDecoder, ToggleDecoder, ToggleDecoderExt,
    TreeDecoder, decode_field,
};
pub use error::{ToggleError, ToggleResult, TransportError, TransportResult};
pub use key::{KeyPath, SEPARATOR, Segment};
pub use provider::{
    DocumentFeed, DocumentProvider, DocumentSource, InMemoryProvider, NoopProvider,
    OverridableProvider, PersistentProvider, RawDocument, ToggleOverriding, ToggleOverridingExt,
    ToggleProvider, ToggleProviderExt, ValueStore,
};
pub use publisher::ObservableToggle;
pub use resolve::{ToggleKind, effective_decoder, effective_decoder_stream};
pub use storage::{MemoryStorage, StorageBackend};
pub use toggle::{
    Group, GroupProperty, PropertyTable, Resolvable, Resolved, Toggle, ToggleChoice, ToggleGroup,
    ToggleValue,
};
pub use value::{Value, ValueMap};

/// Everything needed to define and resolve toggles.
pub mod prelude {
    pub use crate::debug::{DebugRegistry, DebugToggle};
    pub use crate::decoder::{ToggleDecoder, ToggleDecoderExt};
    pub use crate::error::{ToggleError, ToggleResult};
    pub use crate::key::KeyPath;
    pub use crate::provider::{
        DocumentFeed, DocumentProvider, InMemoryProvider, NoopProvider, OverridableProvider,
        PersistentProvider, ToggleOverriding, ToggleOverridingExt, ToggleProvider,
        ToggleProviderExt,
    };
    pub use crate::publisher::ObservableToggle;
    pub use crate::storage::{MemoryStorage, StorageBackend};
    pub use crate::toggle::{
        Group, GroupProperty, PropertyTable, Toggle, ToggleChoice, ToggleGroup, ToggleValue,
    };
    pub use crate::value::Value;
}
