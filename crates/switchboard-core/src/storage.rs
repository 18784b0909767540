//! Storage backends for persistent providers.

use parking_lot::Mutex;

use crate::error::TransportResult;
use crate::value::Value;

/// Loads and saves the value tree of a [`PersistentProvider`](crate::PersistentProvider).
pub trait StorageBackend: Send + Sync + 'static {
    /// Loads the tree stored by a previous run. An empty store returns an
    /// empty map.
    fn load_initial(&self) -> TransportResult<Value>;

    /// Saves `tree`, replacing whatever was stored before.
    fn persist(&self, tree: &Value) -> TransportResult<()>;
}

/// Keeps the persisted tree in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stored: Mutex<Option<Value>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-filled with `tree`.
    pub fn with_tree(tree: Value) -> Self {
        Self {
            stored: Mutex::new(Some(tree)),
        }
    }

    /// Returns the last persisted tree, if any.
    pub fn stored(&self) -> Option<Value> {
        self.stored.lock().clone()
    }
}

impl StorageBackend for MemoryStorage {
    fn load_initial(&self) -> TransportResult<Value> {
        Ok(self.stored().unwrap_or_else(Value::empty_map))
    }

    fn persist(&self, tree: &Value) -> TransportResult<()> {
        *self.stored.lock() = Some(tree.clone());
        Ok(())
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<S> {
    fn load_initial(&self) -> TransportResult<Value> {
        (**self).load_initial()
    }

    fn persist(&self, tree: &Value) -> TransportResult<()> {
        (**self).persist(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_storage_starts_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load_initial().unwrap(), Value::empty_map());
        assert!(storage.stored().is_none());
    }

    #[test]
    fn test_memory_storage_keeps_last_tree() {
        let storage = MemoryStorage::new();
        storage.persist(&Value::from(json!({"a": 1}))).unwrap();
        storage.persist(&Value::from(json!({"a": 2}))).unwrap();
        assert_eq!(storage.load_initial().unwrap(), Value::from(json!({"a": 2})));
    }
}
