//! Typed accessors over structured sources.
//!
//! A [`ToggleDecoder`] is keyed at a root [`KeyPath`] and extracts primitives
//! from the source at that key or at a sub-key appended to it. Decoders are
//! cheap to create and are built per resolution attempt.
//!
//! # Backends
//!
//! - [`TreeDecoder`]: reads an in-memory [`Value`](crate::Value) tree.
//! - [`DocumentDecoder`]: walks a raw JSON document without materialising it.
//! - [`GroupDecoder`]: tries an override decoder first and falls back to a
//!   base decoder, per field.
//! - [`FailedDecoder`]: replays a source error on every lookup.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use switchboard_core::{KeyPath, ToggleDecoder, ToggleDecoderExt, TreeDecoder, Value};
//!
//! let tree = Value::from_json_str(r#"{"net":{"retries":"3","fast":"yes"}}"#).unwrap();
//! let decoder = TreeDecoder::new(Arc::new(tree), "net");
//!
//! assert!(decoder.decode_bool_at(&KeyPath::new("fast")).unwrap());
//! assert_eq!(decoder.decode_parse_at::<u8>(&KeyPath::new("retries")).unwrap(), 3);
//! ```

mod document;
mod failed;
mod group;
mod tree;

use std::any::type_name;
use std::fmt;
use std::str::FromStr;

pub use document::DocumentDecoder;
pub use failed::FailedDecoder;
pub use group::{GroupDecoder, decode_field};
pub use tree::TreeDecoder;

use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;

/// A type-erased decoder.
pub type BoxedDecoder = Box<dyn ToggleDecoder>;

/// Extracts primitives from a structured source.
///
/// Implementors provide the nested (`*_at`) forms; the root forms read at the
/// decoder's own key.
pub trait ToggleDecoder: Send + Sync + fmt::Debug {
    /// The root key every decode call is relative to.
    fn key(&self) -> &KeyPath;

    /// Re-keys the decoder. All later decode calls address the new key.
    fn set_key(&mut self, key: KeyPath);

    /// Decodes a boolean at `key` appended to the decoder's root key.
    fn decode_bool_at(&self, key: &KeyPath) -> ToggleResult<bool>;

    /// Decodes a string at `key` appended to the decoder's root key.
    fn decode_string_at(&self, key: &KeyPath) -> ToggleResult<String>;

    /// Returns `true` if anything is stored at `key` appended to the root key.
    fn has_value_at(&self, key: &KeyPath) -> bool;

    /// Clones this decoder into a new box.
    fn boxed_clone(&self) -> BoxedDecoder;

    /// The `(override, base)` pair of a layered decoder, if this is one.
    fn layers(&self) -> Option<(&dyn ToggleDecoder, &dyn ToggleDecoder)> {
        None
    }

    /// Decodes a boolean at the decoder's root key.
    fn decode_bool(&self) -> ToggleResult<bool> {
        self.decode_bool_at(&KeyPath::root())
    }

    /// Decodes a string at the decoder's root key.
    fn decode_string(&self) -> ToggleResult<String> {
        self.decode_string_at(&KeyPath::root())
    }

    /// Returns `true` if anything is stored at the decoder's root key.
    fn has_value(&self) -> bool {
        self.has_value_at(&KeyPath::root())
    }
}

impl Clone for BoxedDecoder {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Generic decoding on top of [`ToggleDecoder`].
pub trait ToggleDecoderExt: ToggleDecoder {
    /// Decodes any type that round-trips through its string form.
    ///
    /// A string is decoded first and then parsed. A parse failure raises
    /// [`ToggleError::TypeMismatch`] with `"string"` as the actual type.
    fn decode_parse_at<T>(&self, key: &KeyPath) -> ToggleResult<T>
    where
        T: FromStr,
    {
        let raw = self.decode_string_at(key)?;
        raw.parse().map_err(|_| {
            ToggleError::type_mismatch(self.key().join(key).as_str(), "string", type_name::<T>())
        })
    }

    /// Root form of [`decode_parse_at`](Self::decode_parse_at).
    fn decode_parse<T>(&self) -> ToggleResult<T>
    where
        T: FromStr,
    {
        self.decode_parse_at(&KeyPath::root())
    }
}

impl<D: ToggleDecoder + ?Sized> ToggleDecoderExt for D {}

/// Interprets a string as a boolean: `"true"`, `"yes"` and `"1"` in any case
/// are true, every other string is false.
pub(crate) fn lenient_bool(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}
