//! Types a toggle can resolve to.

use std::fmt;

use tracing::debug;

use crate::decoder::{ToggleDecoder, ToggleDecoderExt};
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::value::Value;

/// Bounds shared by every resolved value: cloneable, comparable for
/// deduplication, and shareable across tasks.
pub trait Resolvable: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> Resolvable for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

/// A scalar toggle type.
pub trait ToggleValue: Resolvable {
    /// Decodes a value at `key` relative to the decoder's root.
    fn decode_from(decoder: &dyn ToggleDecoder, key: &KeyPath) -> ToggleResult<Self>;

    /// Returns the value tree form written when this value is stored as an
    /// override. Decoding the result yields `self` again.
    fn to_value(&self) -> Value;
}

impl ToggleValue for bool {
    fn decode_from(decoder: &dyn ToggleDecoder, key: &KeyPath) -> ToggleResult<Self> {
        decoder.decode_bool_at(key)
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToggleValue for String {
    fn decode_from(decoder: &dyn ToggleDecoder, key: &KeyPath) -> ToggleResult<Self> {
        decoder.decode_string_at(key)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

macro_rules! impl_parsed_toggle_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToggleValue for $ty {
                fn decode_from(decoder: &dyn ToggleDecoder, key: &KeyPath) -> ToggleResult<Self> {
                    decoder.decode_parse_at(key)
                }

                fn to_value(&self) -> Value {
                    Value::String(self.to_string())
                }
            }
        )*
    };
}

impl_parsed_toggle_value!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char,
);

/// A closed set of string-backed cases.
///
/// ```rust
/// use switchboard_core::ToggleChoice;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Theme {
///     Light,
///     Dark,
/// }
///
/// impl ToggleChoice for Theme {
///     fn all_cases() -> Vec<Self> {
///         vec![Theme::Light, Theme::Dark]
///     }
///
///     fn raw_value(&self) -> &str {
///         match self {
///             Theme::Light => "light",
///             Theme::Dark => "dark",
///         }
///     }
/// }
///
/// assert_eq!(Theme::from_raw("dark"), Some(Theme::Dark));
/// assert_eq!(Theme::from_raw("sepia"), None);
/// ```
pub trait ToggleChoice: Resolvable {
    /// Every case, in display order.
    fn all_cases() -> Vec<Self>;

    /// The stored string form of this case.
    fn raw_value(&self) -> &str;

    /// Looks up the case whose raw value is `raw`.
    fn from_raw(raw: &str) -> Option<Self> {
        Self::all_cases()
            .into_iter()
            .find(|case| case.raw_value() == raw)
    }
}

/// Decodes a choice at `key`, returning `fallback` for unknown raw values.
pub(crate) fn decode_choice<T: ToggleChoice>(
    decoder: &dyn ToggleDecoder,
    key: &KeyPath,
    fallback: &T,
) -> ToggleResult<T> {
    let raw = decoder.decode_string_at(key)?;
    Ok(T::from_raw(&raw).unwrap_or_else(|| {
        debug!(key = %decoder.key().join(key), raw = %raw, "Unknown choice, using default");
        fallback.clone()
    }))
}

/// The string form written when a choice is stored as an override.
pub(crate) fn choice_value<T: ToggleChoice>(choice: &T) -> Value {
    Value::from(choice.raw_value())
}
