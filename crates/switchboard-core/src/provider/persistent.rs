//! Copy-on-write value store and the provider built on it.

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::decoder::{BoxedDecoder, TreeDecoder};
use crate::error::{ToggleResult, TransportResult};
use crate::key::KeyPath;
use crate::storage::StorageBackend;
use crate::tree;
use crate::value::Value;

use super::{ToggleOverriding, ToggleProvider};

// =============================================================================
// ValueStore
// =============================================================================

/// A value tree replaced wholesale on every write.
///
/// Readers take an immutable snapshot without locking. Writers are serialised
/// so that a write always builds on the previous one, and the revision counter
/// is bumped only after the new tree is visible to readers.
#[derive(Debug)]
pub struct ValueStore {
    tree: ArcSwap<Value>,
    write_lock: Mutex<()>,
    revision: watch::Sender<u64>,
}

impl ValueStore {
    /// Creates a store holding `tree`.
    pub fn new(tree: Value) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            tree: ArcSwap::from_pointee(tree),
            write_lock: Mutex::new(()),
            revision,
        }
    }

    /// Returns the current tree.
    pub fn snapshot(&self) -> Arc<Value> {
        self.tree.load_full()
    }

    /// Returns the number of committed writes.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Subscribes to the change signal. The receiver observes the revision
    /// after each committed write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Writes `value` at `key`, hands the new tree to `persist`, then signals
    /// subscribers.
    ///
    /// A persistence failure is logged and does not roll back the write.
    pub fn write<F>(&self, key: &KeyPath, value: Value, persist: F) -> ToggleResult<()>
    where
        F: FnOnce(&Value) -> TransportResult<()>,
    {
        {
            let _guard = self.write_lock.lock();
            let next = Arc::new(tree::write(&self.tree.load(), key, value)?);
            self.tree.store(Arc::clone(&next));
            if let Err(error) = persist(&next) {
                warn!(key = %key, error = %error, "Failed to persist value store");
            }
        }
        self.revision.send_modify(|revision| *revision += 1);
        Ok(())
    }

    /// Returns a stream that yields a decoder keyed at `key` now and after
    /// every committed write.
    ///
    /// The stream holds the store weakly and ends once it is dropped. Writes
    /// that land while a decoder is pending are coalesced into the latest one.
    pub fn decoder_stream(
        self: &Arc<Self>,
        key: &KeyPath,
    ) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
        let mut changes = self.subscribe();
        changes.mark_changed();
        let state: (_, Weak<Self>, KeyPath) = (changes, Arc::downgrade(self), key.clone());

        stream::unfold(state, |(mut changes, store, key)| async move {
            changes.changed().await.ok()?;
            let snapshot = store.upgrade()?.snapshot();
            let decoder: BoxedDecoder = Box::new(TreeDecoder::new(snapshot, key.clone()));
            Some((Ok(decoder), (changes, store, key)))
        })
        .boxed()
    }
}

// =============================================================================
// PersistentProvider
// =============================================================================

/// An override-capable provider whose tree is loaded from and saved to a
/// [`StorageBackend`].
pub struct PersistentProvider<S: StorageBackend> {
    name: String,
    store: Arc<ValueStore>,
    backend: S,
}

impl<S: StorageBackend> PersistentProvider<S> {
    /// Creates a provider, loading its initial tree from `backend`.
    pub fn new(name: impl Into<String>, backend: S) -> ToggleResult<Self> {
        let name = name.into();
        let initial = backend.load_initial()?;
        debug!(provider = %name, "Loaded persisted values");
        Ok(Self {
            name,
            store: Arc::new(ValueStore::new(initial)),
            backend,
        })
    }

    /// The underlying value store.
    pub fn store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    /// The storage backend.
    pub fn backend(&self) -> &S {
        &self.backend
    }
}

impl<S: StorageBackend> ToggleProvider for PersistentProvider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        Ok(Box::new(TreeDecoder::new(self.store.snapshot(), key)))
    }

    fn decoder_stream(&self, key: &KeyPath) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
        self.store.decoder_stream(key)
    }
}

impl<S: StorageBackend> ToggleOverriding for PersistentProvider<S> {
    fn has_value(&self, key: &KeyPath) -> bool {
        tree::contains(&self.store.snapshot(), key)
    }

    fn set_value(&self, key: &KeyPath, value: Value) -> ToggleResult<()> {
        let cleared = value.is_absent();
        self.store.write(key, value, |tree| self.backend.persist(tree))?;
        debug!(provider = %self.name, key = %key, cleared, "Stored value");
        Ok(())
    }
}
