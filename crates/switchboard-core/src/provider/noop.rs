use crate::decoder::{BoxedDecoder, TreeDecoder};
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::value::Value;

use super::{ToggleOverriding, ToggleProvider};

/// A provider that stores nothing.
///
/// Used as the default override layer: it never has a value and silently
/// drops writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

impl ToggleProvider for NoopProvider {
    fn name(&self) -> &str {
        "noop"
    }

    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        Ok(Box::new(TreeDecoder::empty(key)))
    }
}

impl ToggleOverriding for NoopProvider {
    fn has_value(&self, _key: &KeyPath) -> bool {
        false
    }

    fn set_value(&self, key: &KeyPath, _value: Value) -> ToggleResult<()> {
        tracing::trace!(key = %key, "Ignoring write to noop provider");
        Ok(())
    }
}
