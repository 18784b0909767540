//! Toggle descriptors.
//!
//! A [`Toggle`] names a typed value inside a provider: its key, default,
//! debug candidates, description, and the rule that decodes it. Resolution is
//! always explicit: call [`Toggle::value`] for the effective value or error,
//! [`Toggle::value_or_default`] for a value that never fails, or
//! [`Toggle::stream`] / [`Toggle::observe`] to follow changes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use switchboard_core::{
//!     InMemoryProvider, MemoryStorage, OverridableProvider, PersistentProvider, Toggle,
//! };
//!
//! let defaults = InMemoryProvider::from_json("defaults", r#"{"checkout": {"v2": "yes"}}"#).unwrap();
//! let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
//! let provider = Arc::new(OverridableProvider::new(
//!     "local",
//!     Arc::new(defaults),
//!     Arc::new(overrides),
//! ));
//!
//! let v2 = Toggle::new("checkout.v2", false, provider).with_description("New checkout flow");
//! assert!(v2.value().unwrap());
//!
//! v2.set_override(&false).unwrap();
//! assert!(!v2.value().unwrap());
//! assert!(v2.base_value().unwrap());
//! ```

mod group;
mod value;

use std::fmt;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tracing::debug;

pub use group::{Group, GroupProperty, PropertyTable, ToggleGroup};
pub use value::{Resolvable, ToggleChoice, ToggleValue};

use crate::decoder::ToggleDecoder;
use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;
use crate::provider::ToggleProvider;
use crate::publisher::ObservableToggle;
use crate::resolve::{self, ToggleKind};
use crate::stream::dedup;
use crate::value::Value;

/// Decodes a toggle value at the decoder's root, given the toggle default.
pub(crate) type DecodeFn<T> =
    Arc<dyn Fn(&dyn ToggleDecoder, &T) -> ToggleResult<T> + Send + Sync>;

/// Produces the value tree form of a toggle value.
pub(crate) type EncodeFn<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// The outcome of a defaulted resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The effective value, or the default if resolution failed.
    pub value: T,
    /// Why resolution failed, if it did.
    pub error: Option<ToggleError>,
}

impl<T> Resolved<T> {
    /// Returns `true` if the value came from a provider rather than the
    /// default.
    pub fn is_resolved(&self) -> bool {
        self.error.is_none()
    }
}

/// A named, typed value with a default.
#[derive(Clone)]
pub struct Toggle<T: Resolvable> {
    key: KeyPath,
    default: T,
    debug_values: Vec<T>,
    description: String,
    kind: ToggleKind,
    decode: DecodeFn<T>,
    encode: EncodeFn<T>,
    provider: Arc<dyn ToggleProvider>,
}

impl<T: Resolvable> fmt::Debug for Toggle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggle")
            .field("key", &self.key)
            .field("default", &self.default)
            .field("kind", &self.kind)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl<T: ToggleValue> Toggle<T> {
    /// Creates a scalar toggle.
    pub fn new(key: impl Into<KeyPath>, default: T, provider: Arc<dyn ToggleProvider>) -> Self {
        Self::with_rules(
            key,
            default,
            provider,
            ToggleKind::Scalar,
            Arc::new(|decoder: &dyn ToggleDecoder, _: &T| {
                T::decode_from(decoder, &KeyPath::root())
            }),
            Arc::new(T::to_value),
        )
    }
}

impl<T: ToggleChoice> Toggle<T> {
    /// Creates a toggle over a closed set of cases.
    ///
    /// All cases become debug candidates. A stored raw value matching no case
    /// resolves to the default.
    pub fn choice(key: impl Into<KeyPath>, default: T, provider: Arc<dyn ToggleProvider>) -> Self {
        Self::with_rules(
            key,
            default,
            provider,
            ToggleKind::Scalar,
            Arc::new(|decoder: &dyn ToggleDecoder, default: &T| {
                value::decode_choice(decoder, &KeyPath::root(), default)
            }),
            Arc::new(value::choice_value::<T>),
        )
        .with_debug_values(T::all_cases())
    }
}

impl<T: Resolvable> Toggle<T> {
    /// Creates a scalar toggle with a custom decode rule.
    ///
    /// `encode` must produce a value that `decode` reads back, since it is
    /// what [`set_override`](Self::set_override) stores.
    pub fn custom<D, E>(
        key: impl Into<KeyPath>,
        default: T,
        provider: Arc<dyn ToggleProvider>,
        decode: D,
        encode: E,
    ) -> Self
    where
        D: Fn(&dyn ToggleDecoder) -> ToggleResult<T> + Send + Sync + 'static,
        E: Fn(&T) -> Value + Send + Sync + 'static,
    {
        Self::with_rules(
            key,
            default,
            provider,
            ToggleKind::Scalar,
            Arc::new(move |decoder: &dyn ToggleDecoder, _: &T| decode(decoder)),
            Arc::new(encode),
        )
    }

    pub(crate) fn with_rules(
        key: impl Into<KeyPath>,
        default: T,
        provider: Arc<dyn ToggleProvider>,
        kind: ToggleKind,
        decode: DecodeFn<T>,
        encode: EncodeFn<T>,
    ) -> Self {
        Self {
            key: key.into(),
            default,
            debug_values: Vec::new(),
            description: String::new(),
            kind,
            decode,
            encode,
            provider,
        }
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    /// Replaces the default value.
    pub fn with_default(mut self, default: T) -> Self {
        self.default = default;
        self
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the candidate values offered by debug tooling.
    pub fn with_debug_values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.debug_values = values.into_iter().collect();
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The key of this toggle.
    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// The default value.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// The candidate values offered by debug tooling.
    pub fn debug_values(&self) -> &[T] {
        &self.debug_values
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether this is a scalar or a group toggle.
    pub fn kind(&self) -> ToggleKind {
        self.kind
    }

    /// The provider this toggle resolves against.
    pub fn provider(&self) -> &Arc<dyn ToggleProvider> {
        &self.provider
    }

    /// Converts a value to the tree form stored as an override.
    pub fn encode(&self, value: &T) -> Value {
        (self.encode)(value)
    }

    pub(crate) fn decode(&self, decoder: &dyn ToggleDecoder) -> ToggleResult<T> {
        (self.decode)(decoder, &self.default)
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    /// Resolves the effective value.
    pub fn value(&self) -> ToggleResult<T> {
        let decoder = resolve::effective_decoder(self.provider.as_ref(), &self.key, self.kind)?;
        self.decode(decoder.as_ref())
    }

    /// Resolves the effective value, falling back to the default on error.
    pub fn value_or_default(&self) -> T {
        self.resolve().value
    }

    /// Resolves the effective value, keeping the error inspectable when the
    /// default is used.
    pub fn resolve(&self) -> Resolved<T> {
        match self.value() {
            Ok(value) => Resolved { value, error: None },
            Err(error) => {
                debug!(key = %self.key, error = %error, "Using default value");
                Resolved {
                    value: self.default.clone(),
                    error: Some(error),
                }
            }
        }
    }

    /// Resolves against the base provider only, ignoring any override.
    pub fn base_value(&self) -> ToggleResult<T> {
        let decoder = self.provider.decoder(&self.key)?;
        self.decode(decoder.as_ref())
    }

    /// Resolves the first value the asynchronous pipeline produces.
    ///
    /// Waits for asynchronous sources that have not delivered yet.
    pub async fn fetch(&self) -> ToggleResult<T> {
        self.stream().next().await.unwrap_or(Err(ToggleError::NoValue))
    }

    /// Returns a live stream of effective values.
    ///
    /// The stream re-resolves whenever the base or override source changes
    /// and skips results equal to the previous one.
    pub fn stream(&self) -> BoxStream<'static, ToggleResult<T>> {
        let decode = Arc::clone(&self.decode);
        let default = self.default.clone();
        let resolved =
            resolve::effective_decoder_stream(self.provider.as_ref(), &self.key, self.kind)
                .map(move |decoder| decode(decoder?.as_ref(), &default))
                .boxed();
        dedup(resolved)
    }

    /// Starts publishing this toggle's effective value.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn observe(&self) -> ObservableToggle<T> {
        ObservableToggle::spawn(self)
    }

    // -------------------------------------------------------------------------
    // Overrides
    // -------------------------------------------------------------------------

    /// Stores `value` in the override layer.
    pub fn set_override(&self, value: &T) -> ToggleResult<()> {
        self.provider
            .override_provider()
            .set_value(&self.key, self.encode(value))
    }

    /// Removes the override for this toggle.
    pub fn clear_override(&self) -> ToggleResult<()> {
        self.provider.override_provider().clear_value(&self.key)
    }

    /// Returns `true` if the override layer holds a value for this toggle.
    pub fn has_override(&self) -> bool {
        self.provider.override_provider().has_value(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        DocumentFeed, DocumentProvider, InMemoryProvider, OverridableProvider, PersistentProvider,
    };
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Tier {
        Free,
        Pro,
    }

    impl ToggleChoice for Tier {
        fn all_cases() -> Vec<Self> {
            vec![Tier::Free, Tier::Pro]
        }

        fn raw_value(&self) -> &str {
            match self {
                Tier::Free => "free",
                Tier::Pro => "pro",
            }
        }
    }

    fn local(defaults: serde_json::Value) -> Arc<dyn ToggleProvider> {
        let base = InMemoryProvider::new("defaults", defaults);
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        Arc::new(OverridableProvider::new(
            "local",
            Arc::new(base),
            Arc::new(overrides),
        ))
    }

    #[test]
    fn test_override_wins_over_base() {
        let toggle = Toggle::new("beta", false, local(json!({"beta": false})));
        assert!(!toggle.has_override());

        toggle.set_override(&true).unwrap();
        assert!(toggle.has_override());
        assert!(toggle.value().unwrap());
        assert!(!toggle.base_value().unwrap());

        toggle.clear_override().unwrap();
        assert!(!toggle.value().unwrap());
    }

    #[test]
    fn test_defaulted_access_keeps_error() {
        let toggle = Toggle::new("missing", 7_u32, local(json!({})));
        let resolved = toggle.resolve();
        assert_eq!(resolved.value, 7);
        assert_eq!(resolved.error, Some(ToggleError::key_not_found("missing")));
        assert_eq!(toggle.value_or_default(), 7);
    }

    #[test]
    fn test_bad_override_is_authoritative() {
        let provider = local(json!({"limit": "10"}));
        let toggle = Toggle::new("limit", 1_u32, provider.clone());
        provider
            .override_provider()
            .set_value(&"limit".into(), Value::from("many"))
            .unwrap();

        assert!(matches!(toggle.value(), Err(ToggleError::TypeMismatch { .. })));
        assert_eq!(toggle.value_or_default(), 1);
        assert_eq!(toggle.base_value().unwrap(), 10);
    }

    #[test]
    fn test_choice_toggle() {
        let provider = local(json!({"tier": "pro", "legacy": "platinum"}));
        let tier = Toggle::choice("tier", Tier::Free, provider.clone());
        assert_eq!(tier.value().unwrap(), Tier::Pro);
        assert_eq!(tier.debug_values(), &[Tier::Free, Tier::Pro]);

        let legacy = Toggle::choice("legacy", Tier::Free, provider);
        assert_eq!(legacy.value().unwrap(), Tier::Free);

        tier.set_override(&Tier::Free).unwrap();
        assert_eq!(tier.value().unwrap(), Tier::Free);
    }

    #[test]
    fn test_custom_decode_rule() {
        let toggle = Toggle::custom(
            "ratio",
            0.0_f64,
            local(json!({"ratio": "50%"})),
            |decoder| {
                let raw = decoder.decode_string()?;
                raw.trim_end_matches('%')
                    .parse::<f64>()
                    .map(|percent| percent / 100.0)
                    .map_err(|e| ToggleError::parse(e.to_string()))
            },
            |ratio| Value::from(format!("{}%", ratio * 100.0)),
        );
        assert_eq!(toggle.value().unwrap(), 0.5);

        toggle.set_override(&0.25).unwrap();
        assert_eq!(toggle.value().unwrap(), 0.25);
    }

    #[test]
    fn test_builder_sets_metadata() {
        let toggle = Toggle::new("beta", false, local(json!({})))
            .with_default(true)
            .with_description("Beta features")
            .with_debug_values([true, false]);
        assert!(*toggle.default_value());
        assert_eq!(toggle.description(), "Beta features");
        assert_eq!(toggle.debug_values(), &[true, false]);
        assert_eq!(toggle.kind(), ToggleKind::Scalar);
    }

    #[tokio::test]
    async fn test_stream_emits_changes_once() {
        let toggle = Toggle::new("beta", false, local(json!({"beta": false, "other": "x"})));
        let mut values = toggle.stream();

        assert_eq!(values.next().await, Some(Ok(false)));

        // Unrelated writes resolve to the same value and are skipped.
        toggle
            .provider()
            .override_provider()
            .set_value(&"other".into(), Value::from("y"))
            .unwrap();
        toggle.set_override(&true).unwrap();
        assert_eq!(values.next().await, Some(Ok(true)));
    }

    #[tokio::test]
    async fn test_fetch_waits_for_document() {
        let feed = Arc::new(DocumentFeed::new());
        let remote = Arc::new(DocumentProvider::new("remote", feed.clone()));
        let toggle = Toggle::new("beta", false, remote.clone());

        assert_eq!(toggle.value(), Err(ToggleError::NoValue));
        assert!(!toggle.value_or_default());

        let fetch = tokio::spawn({
            let toggle = toggle.clone();
            async move { toggle.fetch().await }
        });
        feed.push(br#"{"beta": "YES"}"#.to_vec());
        remote.set_up().await.unwrap();

        assert!(fetch.await.unwrap().unwrap());
        assert!(toggle.value().unwrap());
    }
}
