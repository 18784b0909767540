//! Effective-value resolution.
//!
//! Given a provider, pick the decoder a toggle should read from:
//!
//! - **Scalar** toggles read from the override layer when it holds a value
//!   for the key, otherwise from the base. Once the override holds a value it
//!   is authoritative: a failing override decode fails the resolution.
//! - **Group** toggles always read through a [`GroupDecoder`] over the base
//!   and override decoders, so each field falls back independently. A failed
//!   base only fails the fields the override does not hold.
//!
//! The synchronous and asynchronous paths share [`choose_decoder`], so they
//! agree on every input.

use futures::stream::{BoxStream, StreamExt};
use tracing::trace;

use crate::decoder::{BoxedDecoder, FailedDecoder, GroupDecoder};
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::provider::ToggleProvider;
use crate::stream::combine_latest;

/// How a toggle's value is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleKind {
    /// A single value; the override layer wins when it holds the key.
    Scalar,
    /// A composite value; fields merge override-over-base individually.
    Group,
}

impl ToggleKind {
    /// Short name used in logs and debug listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Group => "group",
        }
    }
}

/// Picks the decoder to read `key` from, given one base and one override
/// decoder taken from the same pair of snapshots.
pub fn choose_decoder(
    key: &KeyPath,
    kind: ToggleKind,
    base: ToggleResult<BoxedDecoder>,
    overlay: ToggleResult<BoxedDecoder>,
) -> ToggleResult<BoxedDecoder> {
    match kind {
        ToggleKind::Scalar => match overlay {
            Ok(overlay) if overlay.has_value() => {
                trace!(key = %key, "Resolving from override");
                Ok(overlay)
            }
            _ => base,
        },
        ToggleKind::Group => match (base, overlay) {
            (Ok(base), Ok(overlay)) => Ok(Box::new(GroupDecoder::new(key.clone(), base, overlay))),
            (Ok(base), Err(error)) => {
                trace!(key = %key, error = %error, "Override unavailable, resolving group from base");
                Ok(base)
            }
            (Err(error), Ok(overlay)) => {
                trace!(key = %key, error = %error, "Base unavailable, resolving group from override");
                let base = Box::new(FailedDecoder::new(key.clone(), error));
                Ok(Box::new(GroupDecoder::new(key.clone(), base, overlay)))
            }
            (Err(error), Err(_)) => Err(error),
        },
    }
}

/// Returns the decoder a toggle at `key` currently reads from.
pub fn effective_decoder(
    provider: &dyn ToggleProvider,
    key: &KeyPath,
    kind: ToggleKind,
) -> ToggleResult<BoxedDecoder> {
    let overrides = provider.override_provider();
    choose_decoder(key, kind, provider.decoder(key), overrides.decoder(key))
}

/// Returns a stream of the decoders a toggle at `key` reads from.
///
/// Base and override decoder streams are combined latest-with-latest, so the
/// choice is recomputed whenever either side changes.
pub fn effective_decoder_stream(
    provider: &dyn ToggleProvider,
    key: &KeyPath,
    kind: ToggleKind,
) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
    let overrides = provider.override_provider();
    let key = key.clone();
    combine_latest(provider.decoder_stream(&key), overrides.decoder_stream(&key))
        .map(move |(base, overlay)| choose_decoder(&key, kind, base, overlay))
        .boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::decoder::{ToggleDecoder, ToggleDecoderExt, TreeDecoder};
    use crate::error::ToggleError;
    use crate::provider::{
        InMemoryProvider, OverridableProvider, PersistentProvider, ToggleOverriding,
    };
    use crate::storage::MemoryStorage;
    use crate::value::Value;
    use serde_json::json;

    fn tree(value: serde_json::Value, key: &str) -> ToggleResult<BoxedDecoder> {
        Ok(Box::new(TreeDecoder::new(Arc::new(Value::from(value)), key)))
    }

    fn provider(base: serde_json::Value) -> OverridableProvider {
        let base = InMemoryProvider::new("defaults", base);
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        OverridableProvider::new("local", Arc::new(base), Arc::new(overrides))
    }

    #[test]
    fn test_scalar_prefers_override_with_value() {
        let chosen = choose_decoder(
            &"beta".into(),
            ToggleKind::Scalar,
            tree(json!({"beta": false}), "beta"),
            tree(json!({"beta": true}), "beta"),
        )
        .unwrap();
        assert!(chosen.decode_bool().unwrap());
    }

    #[test]
    fn test_scalar_falls_back_when_override_is_empty() {
        let chosen = choose_decoder(
            &"beta".into(),
            ToggleKind::Scalar,
            tree(json!({"beta": "yes"}), "beta"),
            tree(json!({"other": false}), "beta"),
        )
        .unwrap();
        assert!(chosen.decode_bool().unwrap());
    }

    #[test]
    fn test_scalar_override_error_is_not_masked() {
        let provider = provider(json!({"limit": "5"}));
        provider.set_value(&"limit".into(), Value::from("lots")).unwrap();

        let decoder = effective_decoder(&provider, &"limit".into(), ToggleKind::Scalar).unwrap();
        assert_eq!(decoder.decode_string().unwrap(), "lots");
        assert!(matches!(
            decoder.decode_parse::<u32>(),
            Err(ToggleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_group_merges_fields() {
        let provider = provider(json!({"config": {"f": "old", "g": false}}));
        provider.set_value(&"config.g".into(), Value::Bool(true)).unwrap();

        let decoder = effective_decoder(&provider, &"config".into(), ToggleKind::Group).unwrap();
        assert_eq!(decoder.decode_string_at(&"f".into()).unwrap(), "old");
        assert!(decoder.decode_bool_at(&"g".into()).unwrap());
    }

    #[test]
    fn test_group_base_error_only_fails_missing_fields() {
        let decoder = choose_decoder(
            &"config".into(),
            ToggleKind::Group,
            Err(ToggleError::NoValue),
            tree(json!({"config": {"f": "x", "g": true}}), "config"),
        )
        .unwrap();
        assert_eq!(decoder.decode_string_at(&"f".into()).unwrap(), "x");
        assert!(decoder.decode_bool_at(&"g".into()).unwrap());
        assert_eq!(
            decoder.decode_string_at(&"h".into()).unwrap_err(),
            ToggleError::NoValue
        );
    }

    #[test]
    fn test_group_fails_when_both_layers_fail() {
        let err = choose_decoder(
            &"config".into(),
            ToggleKind::Group,
            Err(ToggleError::NoValue),
            Err(ToggleError::key_not_found("config")),
        )
        .unwrap_err();
        assert_eq!(err, ToggleError::NoValue);
    }

    #[tokio::test]
    async fn test_stream_recombines_on_override_change() {
        let provider = provider(json!({"beta": false}));
        let key = KeyPath::new("beta");
        let mut decoders = effective_decoder_stream(&provider, &key, ToggleKind::Scalar);

        let first = decoders.next().await.unwrap().unwrap();
        assert!(!first.decode_bool().unwrap());

        provider.set_value(&key, Value::Bool(true)).unwrap();
        let second = decoders.next().await.unwrap().unwrap();
        assert!(second.decode_bool().unwrap());

        provider.clear_value(&key).unwrap();
        let third = decoders.next().await.unwrap().unwrap();
        assert!(!third.decode_bool().unwrap());
    }
}
