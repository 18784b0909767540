//! Toggle providers.
//!
//! A [`ToggleProvider`] owns a named backing source and hands out decoders for
//! keys inside it, either once ([`decoder`](ToggleProvider::decoder)) or as a
//! live stream that re-emits whenever the source changes
//! ([`decoder_stream`](ToggleProvider::decoder_stream)).
//!
//! Every provider has an override layer, a [`ToggleOverriding`] provider that
//! is consulted before it. The default override is [`NoopProvider`], which
//! never has a value.
//!
//! # Implementations
//!
//! | Provider | Source | Overridable |
//! |----------|--------|-------------|
//! | [`NoopProvider`] | nothing | ignores writes |
//! | [`InMemoryProvider`] | immutable value tree | no |
//! | [`PersistentProvider`] | value tree backed by a [`StorageBackend`](crate::StorageBackend) | yes |
//! | [`DocumentProvider`] | stream of raw JSON documents | no |
//! | [`OverridableProvider`] | any base + any override | delegates |

mod document;
mod memory;
mod noop;
mod overridable;
mod persistent;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

pub use document::{DocumentFeed, DocumentProvider, DocumentSource, RawDocument};
pub use memory::InMemoryProvider;
pub use noop::NoopProvider;
pub use overridable::OverridableProvider;
pub use persistent::{PersistentProvider, ValueStore};

use crate::decoder::BoxedDecoder;
use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;
use crate::toggle::ToggleValue;
use crate::value::Value;

// =============================================================================
// Provider Traits
// =============================================================================

/// A named source of toggle values.
#[async_trait]
pub trait ToggleProvider: Send + Sync {
    /// Returns the provider name, used in logs and debug listings.
    fn name(&self) -> &str;

    /// Returns the override layer checked before this provider.
    fn override_provider(&self) -> Arc<dyn ToggleOverriding> {
        Arc::new(NoopProvider)
    }

    /// Returns a decoder keyed at `key` over the current source contents.
    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder>;

    /// Returns a stream of decoders keyed at `key`.
    ///
    /// The stream yields a decoder for the current contents as soon as they
    /// are available, then one for every later change. Sources that never
    /// change yield once.
    fn decoder_stream(&self, key: &KeyPath) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
        stream::once(futures::future::ready(self.decoder(key))).boxed()
    }

    /// Prepares the provider. Asynchronous sources wait for their first
    /// document here.
    async fn set_up(&self) -> ToggleResult<()> {
        Ok(())
    }

    /// Asks the underlying source for fresh data.
    async fn refresh(&self) -> ToggleResult<()> {
        Ok(())
    }

    /// Releases background resources held by the provider.
    fn tear_down(&self) {}
}

/// A provider that can store override values.
pub trait ToggleOverriding: ToggleProvider {
    /// Returns `true` if a value is stored at `key`.
    fn has_value(&self, key: &KeyPath) -> bool;

    /// Stores `value` at `key`.
    ///
    /// After this returns, [`has_value`](Self::has_value) is true for `key`
    /// and every read of `key` observes `value`.
    fn set_value(&self, key: &KeyPath, value: Value) -> ToggleResult<()>;

    /// Removes whatever is stored at `key`.
    fn clear_value(&self, key: &KeyPath) -> ToggleResult<()> {
        self.set_value(key, Value::Absent)
    }
}

// =============================================================================
// Typed Access
// =============================================================================

/// Typed lookups on any provider.
#[async_trait]
pub trait ToggleProviderExt: ToggleProvider {
    /// Decodes the value stored at `key`.
    fn value<T: ToggleValue>(&self, key: &KeyPath) -> ToggleResult<T> {
        let decoder = self.decoder(key)?;
        T::decode_from(decoder.as_ref(), &KeyPath::root())
    }

    /// Decodes the first value the decoder stream produces for `key`.
    ///
    /// Fails with [`ToggleError::NoValue`] if the stream ends
    /// without producing one.
    async fn fetch_value<T: ToggleValue>(&self, key: &KeyPath) -> ToggleResult<T> {
        let mut decoders = self.decoder_stream(key);
        match decoders.next().await {
            Some(decoder) => T::decode_from(decoder?.as_ref(), &KeyPath::root()),
            None => Err(ToggleError::NoValue),
        }
    }
}

impl<P: ToggleProvider + ?Sized> ToggleProviderExt for P {}

/// Typed writes on any override provider.
pub trait ToggleOverridingExt: ToggleOverriding {
    /// Stores a typed value at `key`.
    fn set<T: ToggleValue>(&self, key: &KeyPath, value: &T) -> ToggleResult<()> {
        self.set_value(key, value.to_value())
    }
}

impl<P: ToggleOverriding + ?Sized> ToggleOverridingExt for P {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_typed_reads_and_writes() {
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        let key = KeyPath::new("retry.limit");

        overrides.set(&key, &4_u32).unwrap();
        assert!(overrides.has_value(&key));
        assert_eq!(overrides.value::<u32>(&key).unwrap(), 4);

        overrides.clear_value(&key).unwrap();
        assert!(!overrides.has_value(&key));
    }

    #[test]
    fn test_fetch_value_takes_first_decoder() {
        let provider = InMemoryProvider::from_json("defaults", r#"{"beta": "yes"}"#).unwrap();
        let beta = tokio_test::block_on(provider.fetch_value::<bool>(&"beta".into()));
        assert!(beta.unwrap());
    }

    #[test]
    fn test_default_override_is_noop() {
        let provider = InMemoryProvider::from_json("defaults", "{}").unwrap();
        let overrides = provider.override_provider();
        overrides.set_value(&"beta".into(), Value::Bool(true)).unwrap();
        assert!(!overrides.has_value(&"beta".into()));
        assert_eq!(overrides.name(), NoopProvider.name());
    }
}
