//! Decoder over an in-memory value tree.

use std::sync::Arc;

use super::{BoxedDecoder, ToggleDecoder, lenient_bool};
use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;
use crate::tree;
use crate::value::Value;

/// Reads primitives from a shared [`Value`] snapshot.
///
/// Booleans accept native `Bool` values and strings, where `"true"`, `"yes"`
/// and `"1"` (any case) are true and every other string is false. Strings
/// accept `String` and `Number` values; numbers are rendered in JSON form.
#[derive(Debug, Clone)]
pub struct TreeDecoder {
    tree: Arc<Value>,
    key: KeyPath,
}

impl TreeDecoder {
    /// Creates a decoder over `tree` rooted at `key`.
    pub fn new(tree: Arc<Value>, key: impl Into<KeyPath>) -> Self {
        Self {
            tree,
            key: key.into(),
        }
    }

    /// A decoder over an empty tree. Every lookup raises `KeyNotFound`.
    pub fn empty(key: impl Into<KeyPath>) -> Self {
        Self::new(Arc::new(Value::Absent), key)
    }

    /// The tree snapshot this decoder reads.
    pub fn tree(&self) -> &Arc<Value> {
        &self.tree
    }

    fn lookup(&self, key: &KeyPath) -> ToggleResult<(&Value, KeyPath)> {
        let full = self.key.join(key);
        let node = tree::read(&self.tree, &full)?;
        Ok((node, full))
    }
}

impl ToggleDecoder for TreeDecoder {
    fn key(&self) -> &KeyPath {
        &self.key
    }

    fn set_key(&mut self, key: KeyPath) {
        self.key = key;
    }

    fn decode_bool_at(&self, key: &KeyPath) -> ToggleResult<bool> {
        match self.lookup(key)? {
            (Value::Bool(b), _) => Ok(*b),
            (Value::String(s), _) => Ok(lenient_bool(s)),
            (other, full) => Err(ToggleError::type_mismatch(full.as_str(), other.kind(), "bool")),
        }
    }

    fn decode_string_at(&self, key: &KeyPath) -> ToggleResult<String> {
        match self.lookup(key)? {
            (Value::String(s), _) => Ok(s.clone()),
            (Value::Number(n), _) => Ok(n.to_string()),
            (other, full) => Err(ToggleError::type_mismatch(full.as_str(), other.kind(), "string")),
        }
    }

    fn has_value_at(&self, key: &KeyPath) -> bool {
        tree::contains(&self.tree, &self.key.join(key))
    }

    fn boxed_clone(&self) -> BoxedDecoder {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ToggleDecoderExt;
    use serde_json::json;

    fn decoder(value: serde_json::Value, key: &str) -> TreeDecoder {
        TreeDecoder::new(Arc::new(Value::from(value)), key)
    }

    #[test]
    fn test_string_to_bool_coercion() {
        let d = decoder(json!({"a": "YES", "b": "maybe", "c": true, "d": "1"}), "");
        assert!(d.decode_bool_at(&"a".into()).unwrap());
        assert!(!d.decode_bool_at(&"b".into()).unwrap());
        assert!(d.decode_bool_at(&"c".into()).unwrap());
        assert!(d.decode_bool_at(&"d".into()).unwrap());
    }

    #[test]
    fn test_bool_from_other_types_is_mismatch() {
        let d = decoder(json!({"n": 1, "l": []}), "");
        let err = d.decode_bool_at(&"n".into()).unwrap_err();
        assert_eq!(err, ToggleError::type_mismatch("n", "number", "bool"));
        assert!(d.decode_bool_at(&"l".into()).is_err());
    }

    #[test]
    fn test_nested_key_is_appended_to_root() {
        let d = decoder(json!({"config": {"f": "old", "items": ["x", "y"]}}), "config");
        assert_eq!(d.decode_string_at(&"f".into()).unwrap(), "old");
        assert_eq!(d.decode_string_at(&"items.1".into()).unwrap(), "y");

        let err = d.decode_string_at(&"missing".into()).unwrap_err();
        assert_eq!(err, ToggleError::key_not_found("config.missing"));
    }

    #[test]
    fn test_rekeying_readdresses_root_forms() {
        let mut d = decoder(json!({"a": "one", "b": "two"}), "a");
        assert_eq!(d.decode_string().unwrap(), "one");
        d.set_key("b".into());
        assert_eq!(d.decode_string().unwrap(), "two");
    }

    #[test]
    fn test_parse_numbers_from_strings_and_numbers() {
        let d = decoder(json!({"s": "42", "n": 7, "bad": "forty"}), "");
        assert_eq!(d.decode_parse_at::<u32>(&"s".into()).unwrap(), 42);
        assert_eq!(d.decode_parse_at::<i64>(&"n".into()).unwrap(), 7);

        let err = d.decode_parse_at::<u32>(&"bad".into()).unwrap_err();
        assert!(matches!(
            err,
            ToggleError::TypeMismatch { ref actual, ref expected, .. }
                if actual == "string" && expected == "u32"
        ));
    }

    #[test]
    fn test_has_value() {
        let d = decoder(json!({"config": {"g": false}}), "config");
        assert!(d.has_value_at(&"g".into()));
        assert!(!d.has_value_at(&"f".into()));
        assert!(d.has_value());
        assert!(!TreeDecoder::empty("config").has_value());
    }
}
