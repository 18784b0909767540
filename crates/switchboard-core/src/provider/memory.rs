use std::sync::Arc;

use crate::decoder::{BoxedDecoder, TreeDecoder};
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::value::Value;

use super::ToggleProvider;

/// A provider over a fixed value tree, typically local defaults.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    name: String,
    tree: Arc<Value>,
}

impl InMemoryProvider {
    /// Creates a provider over `tree`.
    pub fn new(name: impl Into<String>, tree: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            tree: Arc::new(tree.into()),
        }
    }

    /// Creates a provider from a JSON document.
    pub fn from_json(name: impl Into<String>, json: &str) -> ToggleResult<Self> {
        Ok(Self::new(name, Value::from_json_str(json)?))
    }

    /// The tree this provider serves.
    pub fn tree(&self) -> &Value {
        &self.tree
    }
}

impl ToggleProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        Ok(Box::new(TreeDecoder::new(Arc::clone(&self.tree), key)))
    }
}
