//! Live publication of effective values.
//!
//! An [`ObservableToggle`] resolves its toggle once synchronously, then keeps
//! a background task following [`Toggle::stream`]. Subscribers read the
//! latest value from a [`watch`] channel, so a burst of source changes that
//! settles on the same value is never re-delivered.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::ToggleError;
use crate::key::KeyPath;
use crate::toggle::{Resolvable, Toggle};

/// A toggle whose effective value is kept current in the background.
///
/// Dropping every handle stops the background task.
#[derive(Debug, Clone)]
pub struct ObservableToggle<T: Resolvable> {
    key: KeyPath,
    receiver: watch::Receiver<T>,
    last_error: Arc<RwLock<Option<ToggleError>>>,
}

impl<T: Resolvable> ObservableToggle<T> {
    pub(crate) fn spawn(toggle: &Toggle<T>) -> Self {
        let initial = toggle.resolve();
        let (sender, receiver) = watch::channel(initial.value);
        let last_error = Arc::new(RwLock::new(initial.error));

        let key = toggle.key().clone();
        let default = toggle.default_value().clone();
        let mut values = toggle.stream();
        let errors = Arc::clone(&last_error);
        let task_key = key.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sender.closed() => {
                        trace!(key = %task_key, "All observers dropped");
                        break;
                    }
                    next = values.next() => {
                        let Some(result) = next else {
                            debug!(key = %task_key, "Toggle stream ended");
                            break;
                        };
                        let value = match result {
                            Ok(value) => {
                                *errors.write() = None;
                                value
                            }
                            Err(error) => {
                                debug!(key = %task_key, error = %error, "Publishing default value");
                                *errors.write() = Some(error);
                                default.clone()
                            }
                        };
                        sender.send_if_modified(|current| {
                            if *current == value {
                                return false;
                            }
                            *current = value;
                            true
                        });
                    }
                }
            }
        });

        Self {
            key,
            receiver,
            last_error,
        }
    }

    /// The key of the observed toggle.
    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// The latest published value.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// The error behind the latest published value, if it is the default
    /// standing in for a failed resolution.
    pub fn last_error(&self) -> Option<ToggleError> {
        self.last_error.read().clone()
    }

    /// A raw receiver for the published value.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.receiver.clone()
    }

    /// A stream that yields the current value, then every change.
    pub fn updates(&self) -> BoxStream<'static, T> {
        let mut receiver = self.receiver.clone();
        receiver.mark_changed();
        futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.changed().await.ok()?;
            let value = receiver.borrow_and_update().clone();
            Some((value, receiver))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::{
        InMemoryProvider, OverridableProvider, PersistentProvider, ToggleProvider,
    };
    use crate::storage::MemoryStorage;
    use crate::value::Value;
    use serde_json::json;

    fn local(defaults: serde_json::Value) -> Arc<dyn ToggleProvider> {
        let base = InMemoryProvider::new("defaults", defaults);
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        Arc::new(OverridableProvider::new(
            "local",
            Arc::new(base),
            Arc::new(overrides),
        ))
    }

    #[tokio::test]
    async fn test_cold_start_value_is_available_immediately() {
        let toggle = Toggle::new("beta", false, local(json!({"beta": "yes"})));
        let observed = toggle.observe();
        assert!(observed.current());
        assert_eq!(observed.last_error(), None);
        assert_eq!(observed.key().as_str(), "beta");
    }

    #[tokio::test]
    async fn test_failed_resolution_publishes_default_with_error() {
        let toggle = Toggle::new("missing", 5_u32, local(json!({})));
        let observed = toggle.observe();
        assert_eq!(observed.current(), 5);
        assert_eq!(observed.last_error(), Some(ToggleError::key_not_found("missing")));
    }

    #[tokio::test]
    async fn test_updates_skip_unrelated_changes() {
        let provider = local(json!({"beta": false}));
        let toggle = Toggle::new("beta", false, provider.clone());
        let observed = toggle.observe();
        let mut updates = observed.updates();

        assert_eq!(updates.next().await, Some(false));

        provider
            .override_provider()
            .set_value(&"unrelated".into(), Value::from("x"))
            .unwrap();
        let quiet = tokio::time::timeout(Duration::from_millis(50), updates.next()).await;
        assert!(quiet.is_err());

        toggle.set_override(&true).unwrap();
        assert_eq!(updates.next().await, Some(true));
        assert!(observed.current());
    }

    #[tokio::test]
    async fn test_subscribers_share_latest_value() {
        let toggle = Toggle::new("limit", 1_u32, local(json!({"limit": "2"})));
        let observed = toggle.observe();
        let mut receiver = observed.subscribe();
        assert_eq!(*receiver.borrow(), 2);

        toggle.set_override(&9).unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), 9);
    }
}
