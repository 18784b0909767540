//! Decoder over a raw JSON document.
//!
//! The document is kept as bytes and walked with a streaming deserializer on
//! every lookup. Map entries before the addressed key and list elements before
//! the addressed index are skipped without being materialised; only the leaf
//! is built.

use std::fmt;
use std::sync::Arc;

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};

use super::{BoxedDecoder, ToggleDecoder, lenient_bool};
use crate::error::{ToggleError, ToggleResult};
use crate::key::{KeyPath, Segment};

/// Reads primitives from a JSON document addressed by key path.
///
/// Primitives coerce the same way as in [`TreeDecoder`](super::TreeDecoder).
/// JSON `null` reads as absent, at the leaf or anywhere along the path.
#[derive(Clone)]
pub struct DocumentDecoder {
    document: Arc<[u8]>,
    root: KeyPath,
    key: KeyPath,
}

impl fmt::Debug for DocumentDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentDecoder")
            .field("document_len", &self.document.len())
            .field("root", &self.root)
            .field("key", &self.key)
            .finish()
    }
}

impl DocumentDecoder {
    /// Creates a decoder over `document` rooted at `key`.
    pub fn new(document: Arc<[u8]>, key: impl Into<KeyPath>) -> Self {
        Self::with_root(document, KeyPath::root(), key)
    }

    /// Creates a decoder whose keys are resolved below `root` in the document.
    pub fn with_root(document: Arc<[u8]>, root: KeyPath, key: impl Into<KeyPath>) -> Self {
        Self {
            document,
            root,
            key: key.into(),
        }
    }

    fn lookup(&self, key: &KeyPath) -> ToggleResult<(serde_json::Value, KeyPath)> {
        let full = self.root.join(&self.key).join(key);
        let segments: Vec<Segment<'_>> = full.segments().collect();

        let mut deserializer = serde_json::Deserializer::from_slice(&self.document);
        let walk = PathSeed {
            segments: &segments,
        }
        .deserialize(&mut deserializer)?;

        match walk {
            Walk::Found(serde_json::Value::Null) | Walk::Missing => {
                Err(ToggleError::key_not_found(full.as_str()))
            }
            Walk::Found(value) => Ok((value, full)),
            Walk::Mismatch { actual, expected } => {
                Err(ToggleError::type_mismatch(full.as_str(), actual, expected))
            }
        }
    }
}

impl ToggleDecoder for DocumentDecoder {
    fn key(&self) -> &KeyPath {
        &self.key
    }

    fn set_key(&mut self, key: KeyPath) {
        self.key = key;
    }

    fn decode_bool_at(&self, key: &KeyPath) -> ToggleResult<bool> {
        match self.lookup(key)? {
            (serde_json::Value::Bool(b), _) => Ok(b),
            (serde_json::Value::String(s), _) => Ok(lenient_bool(&s)),
            (other, full) => Err(ToggleError::type_mismatch(full.as_str(), json_kind(&other), "bool")),
        }
    }

    fn decode_string_at(&self, key: &KeyPath) -> ToggleResult<String> {
        match self.lookup(key)? {
            (serde_json::Value::String(s), _) => Ok(s),
            (serde_json::Value::Number(n), _) => Ok(n.to_string()),
            (other, full) => {
                Err(ToggleError::type_mismatch(full.as_str(), json_kind(&other), "string"))
            }
        }
    }

    fn has_value_at(&self, key: &KeyPath) -> bool {
        self.lookup(key).is_ok()
    }

    fn boxed_clone(&self) -> BoxedDecoder {
        Box::new(self.clone())
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "absent",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}

// =============================================================================
// Path Walking
// =============================================================================

/// Outcome of walking a path through a document.
enum Walk {
    Found(serde_json::Value),
    Missing,
    Mismatch {
        actual: &'static str,
        expected: &'static str,
    },
}

struct PathSeed<'a> {
    segments: &'a [Segment<'a>],
}

impl<'de> DeserializeSeed<'de> for PathSeed<'_> {
    type Value = Walk;

    fn deserialize<D>(self, deserializer: D) -> Result<Walk, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        match self.segments.split_first() {
            None => de::Deserialize::deserialize(deserializer).map(Walk::Found),
            Some((segment, rest)) => deserializer.deserialize_any(StepVisitor {
                segment: *segment,
                rest,
            }),
        }
    }
}

/// Descends one segment into the current node.
struct StepVisitor<'a> {
    segment: Segment<'a>,
    rest: &'a [Segment<'a>],
}

impl StepVisitor<'_> {
    fn expected(&self) -> &'static str {
        match self.segment {
            Segment::Index(_) => "list",
            Segment::Key(_) => "map",
        }
    }

    fn scalar<E>(&self, actual: &'static str) -> Result<Walk, E> {
        Ok(Walk::Mismatch {
            actual,
            expected: self.expected(),
        })
    }
}

impl<'de> Visitor<'de> for StepVisitor<'_> {
    type Value = Walk;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {} containing '{}'", self.expected(), self.segment)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Walk, E> {
        Ok(Walk::Missing)
    }

    fn visit_none<E: de::Error>(self) -> Result<Walk, E> {
        Ok(Walk::Missing)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Walk, E> {
        self.scalar("bool")
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Walk, E> {
        self.scalar("number")
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Walk, E> {
        self.scalar("number")
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Walk, E> {
        self.scalar("number")
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Walk, E> {
        self.scalar("string")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Walk, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let Segment::Index(index) = self.segment else {
            while seq.next_element::<IgnoredAny>()?.is_some() {}
            return Ok(Walk::Mismatch {
                actual: "list",
                expected: "map",
            });
        };

        for _ in 0..index {
            if seq.next_element::<IgnoredAny>()?.is_none() {
                return Ok(Walk::Missing);
            }
        }
        let found = seq
            .next_element_seed(PathSeed {
                segments: self.rest,
            })?
            .unwrap_or(Walk::Missing);
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(found)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Walk, A::Error>
    where
        A: MapAccess<'de>,
    {
        let Segment::Key(name) = self.segment else {
            while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
            return Ok(Walk::Mismatch {
                actual: "map",
                expected: "list",
            });
        };

        let mut found = Walk::Missing;
        let mut matched = false;
        while let Some(entry) = map.next_key::<String>()? {
            if !matched && entry == name {
                matched = true;
                found = map.next_value_seed(PathSeed {
                    segments: self.rest,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }
}
