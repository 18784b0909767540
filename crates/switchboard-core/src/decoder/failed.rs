//! A decoder standing in for a source that could not provide one.

use super::{BoxedDecoder, ToggleDecoder};
use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;

/// Fails every lookup with the error its source reported.
///
/// Used as the base side of a group whose base provider is unavailable, so
/// overridden fields still resolve and the rest surface the base error.
#[derive(Debug, Clone)]
pub struct FailedDecoder {
    key: KeyPath,
    error: ToggleError,
}

impl FailedDecoder {
    /// Creates a decoder at `key` failing with `error`.
    pub fn new(key: impl Into<KeyPath>, error: ToggleError) -> Self {
        Self {
            key: key.into(),
            error,
        }
    }

    /// The error every lookup returns.
    pub fn error(&self) -> &ToggleError {
        &self.error
    }
}

impl ToggleDecoder for FailedDecoder {
    fn key(&self) -> &KeyPath {
        &self.key
    }

    fn set_key(&mut self, key: KeyPath) {
        self.key = key;
    }

    fn decode_bool_at(&self, _key: &KeyPath) -> ToggleResult<bool> {
        Err(self.error.clone())
    }

    fn decode_string_at(&self, _key: &KeyPath) -> ToggleResult<String> {
        Err(self.error.clone())
    }

    fn has_value_at(&self, _key: &KeyPath) -> bool {
        false
    }

    fn boxed_clone(&self) -> BoxedDecoder {
        Box::new(self.clone())
    }
}
