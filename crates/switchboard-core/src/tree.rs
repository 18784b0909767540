//! Reading and writing value trees by key path.
//!
//! Writes never mutate the tree they are given. Every container on the
//! written path is rebuilt and a new root is returned, so a caller holding
//! the old root keeps observing a consistent revision.

use crate::error::{ToggleError, ToggleResult};
use crate::key::{KeyPath, Segment};
use crate::value::{Value, ValueMap};

static ABSENT: Value = Value::Absent;

/// How far past the end of a list a write may pad with absent slots.
pub const MAX_LIST_PADDING: usize = 1024;

/// Reads the node addressed by `key`.
///
/// The root path returns `tree` itself. Missing map entries, out-of-range
/// indices and absent slots raise [`ToggleError::KeyNotFound`]; indexing into
/// a non-list or keying into a non-map raises [`ToggleError::TypeMismatch`].
pub fn read<'a>(tree: &'a Value, key: &KeyPath) -> ToggleResult<&'a Value> {
    let mut node = tree;
    for segment in key.segments() {
        node = match (segment, node) {
            (_, Value::Absent) => return Err(ToggleError::key_not_found(key.as_str())),
            (Segment::Index(index), Value::List(items)) => items
                .get(index)
                .filter(|item| !item.is_absent())
                .ok_or_else(|| ToggleError::key_not_found(key.as_str()))?,
            (Segment::Key(name), Value::Map(map)) => map
                .get(name)
                .filter(|item| !item.is_absent())
                .ok_or_else(|| ToggleError::key_not_found(key.as_str()))?,
            (Segment::Index(_), other) => {
                return Err(ToggleError::type_mismatch(key.as_str(), other.kind(), "list"));
            }
            (Segment::Key(_), other) => {
                return Err(ToggleError::type_mismatch(key.as_str(), other.kind(), "map"));
            }
        };
    }
    Ok(node)
}

/// Returns `true` if a non-absent value is stored at `key`.
pub fn contains(tree: &Value, key: &KeyPath) -> bool {
    read(tree, key).is_ok_and(|node| !node.is_absent())
}

/// Returns a new tree with `value` stored at `key`.
///
/// Missing maps and lists along the path are created. Lists are padded with
/// [`Value::Absent`] up to the written index. Writing [`Value::Absent`] into a
/// map removes the entry, which is how overrides are cleared. Clearing a path
/// that holds nothing leaves the tree unchanged.
///
/// Writing an index more than [`MAX_LIST_PADDING`] slots past the end of a
/// list fails with [`ToggleError::TypeMismatch`].
pub fn write(tree: &Value, key: &KeyPath, value: Value) -> ToggleResult<Value> {
    write_node(tree, key, key, value)
}

fn write_node(node: &Value, rest: &KeyPath, full: &KeyPath, value: Value) -> ToggleResult<Value> {
    let Some((segment, remainder)) = rest.head() else {
        return Ok(value);
    };
    if node.is_absent() && value.is_absent() {
        return Ok(Value::Absent);
    }

    match segment {
        Segment::Index(index) => {
            let mut items = match node {
                Value::Absent => Vec::new(),
                Value::List(items) => items.clone(),
                other => {
                    return Err(ToggleError::type_mismatch(full.as_str(), other.kind(), "list"));
                }
            };
            if index >= items.len() {
                let len = index
                    .checked_add(1)
                    .filter(|len| len - items.len() <= MAX_LIST_PADDING)
                    .ok_or_else(|| {
                        ToggleError::type_mismatch(
                            full.as_str(),
                            format!("index {index}"),
                            format!("index at most {} past the end", MAX_LIST_PADDING),
                        )
                    })?;
                items.resize(len, Value::Absent);
            }
            items[index] = write_node(&items[index], &remainder, full, value)?;
            Ok(Value::List(items))
        }
        Segment::Key(name) => {
            let mut map = match node {
                Value::Absent => ValueMap::new(),
                Value::Map(map) => map.clone(),
                other => {
                    return Err(ToggleError::type_mismatch(full.as_str(), other.kind(), "map"));
                }
            };
            let child = map.get(name).unwrap_or(&ABSENT);
            let updated = write_node(child, &remainder, full, value)?;
            if updated.is_absent() {
                map.remove(name);
            } else {
                map.insert(name.to_string(), updated);
            }
            Ok(Value::Map(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> Value {
        Value::from(value)
    }

    #[test]
    fn test_root_read_is_identity() {
        let t = tree(json!({"a": 1}));
        assert_eq!(read(&t, &KeyPath::root()).unwrap(), &t);
    }

    #[test]
    fn test_read_nested_map_and_list() {
        let t = tree(json!({"config": {"items": ["a", {"name": "b"}]}}));
        assert_eq!(
            read(&t, &"config.items.0".into()).unwrap(),
            &Value::from("a")
        );
        assert_eq!(
            read(&t, &"config.items.1.name".into()).unwrap(),
            &Value::from("b")
        );
    }

    #[test]
    fn test_read_out_of_range_is_key_not_found() {
        let t = tree(json!({"items": ["a", "b"]}));
        let err = read(&t, &"items.2".into()).unwrap_err();
        assert_eq!(err, ToggleError::key_not_found("items.2"));
    }

    #[test]
    fn test_read_wrong_container_is_type_mismatch() {
        let t = tree(json!({"items": "not a list"}));
        let err = read(&t, &"items.0".into()).unwrap_err();
        assert!(matches!(
            err,
            ToggleError::TypeMismatch { ref actual, ref expected, .. }
                if actual == "string" && expected == "list"
        ));

        let t = tree(json!({"items": ["a"]}));
        let err = read(&t, &"items.name".into()).unwrap_err();
        assert!(matches!(err, ToggleError::TypeMismatch { .. }));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let t = tree(json!({"config": {"f": "old", "g": false}}));
        for (key, value) in [
            ("config.g", Value::Bool(true)),
            ("config.h.0.x", Value::from("deep")),
            ("other", Value::from(3_i64)),
        ] {
            let key = KeyPath::new(key);
            let written = write(&t, &key, value.clone()).unwrap();
            assert_eq!(read(&written, &key).unwrap(), &value);
        }
    }

    #[test]
    fn test_write_leaves_siblings_untouched() {
        let t = tree(json!({"config": {"f": "old", "g": false}, "top": [1, 2]}));
        let written = write(&t, &"config.g".into(), Value::Bool(true)).unwrap();

        assert_eq!(
            read(&written, &"config.f".into()).unwrap(),
            &Value::from("old")
        );
        assert_eq!(read(&written, &"top".into()).unwrap(), read(&t, &"top".into()).unwrap());
        // The original revision is unchanged.
        assert_eq!(read(&t, &"config.g".into()).unwrap(), &Value::Bool(false));
    }

    #[test]
    fn test_write_pads_list_with_absent() {
        let t = tree(json!({"items": []}));
        let written = write(&t, &"items.5".into(), Value::from("x")).unwrap();
        let items = read(&written, &"items".into()).unwrap().as_list().unwrap();
        assert_eq!(items.len(), 6);
        assert!(items[..5].iter().all(Value::is_absent));

        let err = read(&written, &"items.3".into()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_far_past_list_end_fails() {
        let t = tree(json!({"items": []}));
        for key in ["items.18446744073709551615", "items.4000000000"] {
            let err = write(&t, &key.into(), Value::from("x")).unwrap_err();
            assert!(matches!(err, ToggleError::TypeMismatch { .. }));
        }

        let edge = format!("items.{}", MAX_LIST_PADDING - 1);
        let written = write(&t, &edge.as_str().into(), Value::from("x")).unwrap();
        assert_eq!(
            read(&written, &"items".into()).unwrap().as_list().unwrap().len(),
            MAX_LIST_PADDING
        );
    }

    #[test]
    fn test_write_extends_short_list() {
        let t = tree(json!({"items": ["a", "b"]}));
        let written = write(&t, &"items.2".into(), Value::from("c")).unwrap();
        assert_eq!(read(&written, &"items.2".into()).unwrap(), &Value::from("c"));
        assert_eq!(read(&written, &"items".into()).unwrap().as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_write_creates_missing_containers() {
        let written = write(&Value::Absent, &"a.0.b".into(), Value::Bool(true)).unwrap();
        assert_eq!(
            serde_json::Value::from(written),
            json!({"a": [{"b": true}]})
        );
    }

    #[test]
    fn test_write_through_scalar_fails() {
        let t = tree(json!({"a": "scalar"}));
        let err = write(&t, &"a.b".into(), Value::Bool(true)).unwrap_err();
        assert!(matches!(err, ToggleError::TypeMismatch { .. }));
    }

    #[test]
    fn test_writing_absent_clears_entry() {
        let t = tree(json!({"config": {"f": "x", "g": true}}));
        let cleared = write(&t, &"config.g".into(), Value::Absent).unwrap();
        assert!(!contains(&cleared, &"config.g".into()));
        assert!(contains(&cleared, &"config.f".into()));
    }

    #[test]
    fn test_clearing_missing_path_leaves_no_stub() {
        let t = tree(json!({"other": true}));
        let cleared = write(&t, &"a.b".into(), Value::Absent).unwrap();
        assert_eq!(cleared, t);

        let cleared = write(&t, &"list.3.x".into(), Value::Absent).unwrap();
        assert_eq!(cleared, t);
    }

    #[test]
    fn test_write_at_root_replaces_tree() {
        let t = tree(json!({"a": 1}));
        let replaced = write(&t, &KeyPath::root(), Value::from("new")).unwrap();
        assert_eq!(replaced, Value::from("new"));
    }
}
