use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::decoder::BoxedDecoder;
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::value::Value;

use super::{ToggleOverriding, ToggleProvider};

/// Attaches an override layer to a base provider.
///
/// Reads go to the base. Override presence checks and writes go to the
/// override. No merging happens here; that is the resolver's job.
///
/// ```rust
/// use std::sync::Arc;
/// use switchboard_core::{
///     InMemoryProvider, MemoryStorage, OverridableProvider, PersistentProvider, ToggleProvider,
/// };
///
/// let defaults = InMemoryProvider::from_json("defaults", r#"{"beta": false}"#).unwrap();
/// let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
/// let provider = OverridableProvider::new("local", Arc::new(defaults), Arc::new(overrides));
/// assert_eq!(provider.name(), "local");
/// ```
#[derive(Clone)]
pub struct OverridableProvider {
    name: String,
    base: Arc<dyn ToggleProvider>,
    overrides: Arc<dyn ToggleOverriding>,
}

impl OverridableProvider {
    /// Composes `base` with `overrides`.
    pub fn new(
        name: impl Into<String>,
        base: Arc<dyn ToggleProvider>,
        overrides: Arc<dyn ToggleOverriding>,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            overrides,
        }
    }

    /// The base provider.
    pub fn base(&self) -> &Arc<dyn ToggleProvider> {
        &self.base
    }
}

#[async_trait]
impl ToggleProvider for OverridableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn override_provider(&self) -> Arc<dyn ToggleOverriding> {
        Arc::clone(&self.overrides)
    }

    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        self.base.decoder(key)
    }

    fn decoder_stream(&self, key: &KeyPath) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
        self.base.decoder_stream(key)
    }

    async fn set_up(&self) -> ToggleResult<()> {
        self.overrides.set_up().await?;
        self.base.set_up().await
    }

    async fn refresh(&self) -> ToggleResult<()> {
        self.base.refresh().await
    }

    fn tear_down(&self) {
        self.base.tear_down();
    }
}

impl ToggleOverriding for OverridableProvider {
    fn has_value(&self, key: &KeyPath) -> bool {
        self.overrides.has_value(key)
    }

    fn set_value(&self, key: &KeyPath, value: Value) -> ToggleResult<()> {
        self.overrides.set_value(key, value)
    }

    fn clear_value(&self, key: &KeyPath) -> ToggleResult<()> {
        self.overrides.clear_value(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InMemoryProvider, PersistentProvider, ToggleProviderExt};
    use crate::storage::MemoryStorage;

    fn composed() -> OverridableProvider {
        let base = InMemoryProvider::from_json("defaults", r#"{"beta": false}"#).unwrap();
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        OverridableProvider::new("local", Arc::new(base), Arc::new(overrides))
    }

    #[test]
    fn test_reads_go_to_base() {
        let provider = composed();
        provider.set_value(&"beta".into(), Value::Bool(true)).unwrap();

        assert!(!provider.value::<bool>(&"beta".into()).unwrap());
        assert!(provider.has_value(&"beta".into()));
        assert!(
            provider
                .override_provider()
                .value::<bool>(&"beta".into())
                .unwrap()
        );
    }

    #[test]
    fn test_clear_goes_to_override() {
        let provider = composed();
        provider.set_value(&"beta".into(), Value::Bool(true)).unwrap();
        provider.clear_value(&"beta".into()).unwrap();
        assert!(!provider.has_value(&"beta".into()));
    }
}
