//! Override-over-base decoder used for groups.

use super::{BoxedDecoder, ToggleDecoder};
use crate::error::ToggleResult;
use crate::key::KeyPath;

/// Composes an override decoder over a base decoder.
///
/// Every lookup tries the override first. Any override error, including a
/// type mismatch, falls through to the base, whose error is surfaced if it
/// fails too. Re-keying re-keys both sides.
#[derive(Debug, Clone)]
pub struct GroupDecoder {
    key: KeyPath,
    base: BoxedDecoder,
    overlay: BoxedDecoder,
}

impl GroupDecoder {
    /// Creates a group decoder, re-keying both sides to `key`.
    pub fn new(key: impl Into<KeyPath>, mut base: BoxedDecoder, mut overlay: BoxedDecoder) -> Self {
        let key = key.into();
        base.set_key(key.clone());
        overlay.set_key(key.clone());
        Self { key, base, overlay }
    }

    /// The base-side decoder.
    pub fn base(&self) -> &dyn ToggleDecoder {
        self.base.as_ref()
    }

    /// The override-side decoder.
    pub fn overlay(&self) -> &dyn ToggleDecoder {
        self.overlay.as_ref()
    }
}

impl ToggleDecoder for GroupDecoder {
    fn key(&self) -> &KeyPath {
        &self.key
    }

    fn set_key(&mut self, key: KeyPath) {
        self.base.set_key(key.clone());
        self.overlay.set_key(key.clone());
        self.key = key;
    }

    fn decode_bool_at(&self, key: &KeyPath) -> ToggleResult<bool> {
        self.overlay
            .decode_bool_at(key)
            .or_else(|_| self.base.decode_bool_at(key))
    }

    fn decode_string_at(&self, key: &KeyPath) -> ToggleResult<String> {
        self.overlay
            .decode_string_at(key)
            .or_else(|_| self.base.decode_string_at(key))
    }

    fn has_value_at(&self, key: &KeyPath) -> bool {
        self.overlay.has_value_at(key) || self.base.has_value_at(key)
    }

    fn boxed_clone(&self) -> BoxedDecoder {
        Box::new(self.clone())
    }

    fn layers(&self) -> Option<(&dyn ToggleDecoder, &dyn ToggleDecoder)> {
        Some((self.overlay.as_ref(), self.base.as_ref()))
    }
}

/// Runs a whole field decode against each layer of `decoder` in turn.
///
/// Unlike the primitive lookups, this also falls through when the override
/// yields a string the field cannot parse. Non-layered decoders run `decode`
/// once.
pub fn decode_field<T, F>(decoder: &dyn ToggleDecoder, decode: F) -> ToggleResult<T>
where
    F: Fn(&dyn ToggleDecoder) -> ToggleResult<T>,
{
    decode_layers(decoder, &decode)
}

fn decode_layers<T>(
    decoder: &dyn ToggleDecoder,
    decode: &dyn Fn(&dyn ToggleDecoder) -> ToggleResult<T>,
) -> ToggleResult<T> {
    match decoder.layers() {
        Some((overlay, base)) => {
            decode_layers(overlay, decode).or_else(|_| decode_layers(base, decode))
        }
        None => decode(decoder),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::decoder::{ToggleDecoderExt, TreeDecoder};
    use crate::error::ToggleError;
    use crate::value::Value;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> BoxedDecoder {
        Box::new(TreeDecoder::new(Arc::new(Value::from(value)), ""))
    }

    fn group() -> GroupDecoder {
        GroupDecoder::new(
            "config",
            tree(json!({"config": {"a": "base-a", "b": "base-b", "flag": false}})),
            tree(json!({"config": {"a": "over-a", "flag": 12}})),
        )
    }

    #[test]
    fn test_override_field_wins() {
        assert_eq!(group().decode_string_at(&"a".into()).unwrap(), "over-a");
    }

    #[test]
    fn test_missing_override_field_falls_back() {
        assert_eq!(group().decode_string_at(&"b".into()).unwrap(), "base-b");
    }

    #[test]
    fn test_override_type_mismatch_falls_back() {
        assert!(!group().decode_bool_at(&"flag".into()).unwrap());
    }

    #[test]
    fn test_field_missing_in_both_raises_base_error() {
        let err = group().decode_string_at(&"c".into()).unwrap_err();
        assert_eq!(err, ToggleError::key_not_found("config.c"));
    }

    #[test]
    fn test_decode_field_falls_back_on_parse_error() {
        let d = GroupDecoder::new(
            "net",
            tree(json!({"net": {"retries": "3"}})),
            tree(json!({"net": {"retries": "many"}})),
        );
        let retries = decode_field(&d, |layer| layer.decode_parse_at::<u8>(&"retries".into()));
        assert_eq!(retries.unwrap(), 3);
        assert_eq!(d.decode_string_at(&"retries".into()).unwrap(), "many");
    }

    #[test]
    fn test_rekey_propagates_to_both_sides() {
        let mut d = GroupDecoder::new(
            "one",
            tree(json!({"one": {"x": "1"}, "two": {"x": "base-2"}})),
            tree(json!({"two": {"y": "over-2"}})),
        );
        d.set_key("two".into());
        assert_eq!(d.base().key().as_str(), "two");
        assert_eq!(d.overlay().key().as_str(), "two");
        assert_eq!(d.decode_string_at(&"x".into()).unwrap(), "base-2");
        assert_eq!(d.decode_string_at(&"y".into()).unwrap(), "over-2");
    }
}
