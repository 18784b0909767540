//! File-backed override storage.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Map;
use tracing::{debug, trace};

use switchboard_core::{StorageBackend, TransportError, TransportResult, Value};

/// Stores the override tree under one top-level key of a JSON file.
///
/// Other top-level keys in the file are left as they are, so several
/// applications can share one settings file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    key: String,
    io: Mutex<()>,
}

impl JsonFileStorage {
    /// Creates a storage for `path`, keeping the tree under `key`.
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            io: Mutex::new(()),
        }
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The top-level key the tree is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn read_document(&self) -> TransportResult<Map<String, serde_json::Value>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "Storage file missing, starting empty");
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(&raw) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(TransportError::Other(format!(
                "{} holds {}, expected a JSON object",
                self.path.display(),
                Value::from(other).kind()
            ))),
            Err(e) => Err(TransportError::Io(format!(
                "{} is not valid JSON: {e}",
                self.path.display()
            ))),
        }
    }
}

impl StorageBackend for JsonFileStorage {
    fn load_initial(&self) -> TransportResult<Value> {
        let _guard = self.io.lock();
        let mut document = self.read_document()?;
        let tree = match document.remove(&self.key) {
            Some(stored) => Value::from(stored),
            None => Value::empty_map(),
        };
        debug!(path = %self.path.display(), key = %self.key, "Loaded stored overrides");
        Ok(tree)
    }

    fn persist(&self, tree: &Value) -> TransportResult<()> {
        let _guard = self.io.lock();
        let mut document = self.read_document()?;
        document.insert(self.key.clone(), serde_json::Value::from(tree.clone()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(&serde_json::Value::Object(document))
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;

        trace!(path = %self.path.display(), key = %self.key, "Persisted overrides");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::{
        KeyPath, PersistentProvider, ToggleOverriding, ToggleOverridingExt, ToggleProviderExt,
    };

    #[test]
    fn test_missing_file_loads_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("settings.json"), "toggles");
        assert_eq!(storage.load_initial().unwrap(), Value::empty_map());
    }

    #[test]
    fn test_persist_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let storage = JsonFileStorage::new(&path, "toggles");
        storage
            .persist(&Value::from(json!({"beta": true})))
            .unwrap();

        let written: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"theme": "dark", "toggles": {"beta": true}}));
    }

    #[test]
    fn test_non_object_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonFileStorage::new(&path, "toggles").load_initial().is_err());
    }

    #[test]
    fn test_overrides_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let key = KeyPath::new("search.limit");

        let first =
            PersistentProvider::new("overrides", JsonFileStorage::new(&path, "toggles")).unwrap();
        first.set(&key, &25_u32).unwrap();
        drop(first);

        let second =
            PersistentProvider::new("overrides", JsonFileStorage::new(&path, "toggles")).unwrap();
        assert!(second.has_value(&key));
        assert_eq!(second.value::<u32>(&key).unwrap(), 25);
    }
}
