//! Providers over streams of raw JSON documents.
//!
//! A [`DocumentSource`] emits whole documents as bytes. The
//! [`DocumentProvider`] keeps the latest one and serves
//! [`DocumentDecoder`]s over it.
//!
//! ```rust,ignore
//! let feed = Arc::new(DocumentFeed::new());
//! let provider = DocumentProvider::new("remote", feed.clone());
//!
//! feed.push(br#"{"beta": true}"#.to_vec());
//! provider.set_up().await?;
//! assert!(provider.value::<bool>(&"beta".into())?);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde::de::IgnoredAny;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decoder::{BoxedDecoder, DocumentDecoder};
use crate::error::{ToggleError, ToggleResult, TransportError, TransportResult};
use crate::key::KeyPath;

use super::ToggleProvider;

/// A raw document as emitted by a [`DocumentSource`].
pub type RawDocument = TransportResult<Vec<u8>>;

type Latest = Option<ToggleResult<Arc<[u8]>>>;

// =============================================================================
// DocumentSource
// =============================================================================

/// A remote (or otherwise asynchronous) producer of JSON documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Returns the stream of documents. Called once, when the consuming
    /// provider is set up.
    fn documents(&self) -> BoxStream<'static, RawDocument>;

    /// Asks the source to emit a fresh document.
    async fn refresh(&self) -> TransportResult<()> {
        Ok(())
    }
}

/// A channel-backed [`DocumentSource`] fed programmatically.
#[derive(Debug)]
pub struct DocumentFeed {
    tx: mpsc::UnboundedSender<RawDocument>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<RawDocument>>>,
}

impl Default for DocumentFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Emits a document.
    pub fn push(&self, document: impl Into<Vec<u8>>) {
        self.send(Ok(document.into()));
    }

    /// Emits a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.send(Err(error));
    }

    fn send(&self, item: RawDocument) {
        if self.tx.send(item).is_err() {
            debug!("Document feed has no consumer, dropping document");
        }
    }
}

impl DocumentSource for DocumentFeed {
    fn documents(&self) -> BoxStream<'static, RawDocument> {
        match self.rx.lock().take() {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed(),
            None => {
                warn!("Document feed already consumed");
                stream::empty().boxed()
            }
        }
    }
}

// =============================================================================
// DocumentProvider
// =============================================================================

/// A provider serving the latest document from a [`DocumentSource`].
///
/// Synchronous reads fail with [`ToggleError::NoValue`] until the first
/// document arrives. Errors are kept only while no document has been received;
/// later errors are logged and the last good document stays in place.
pub struct DocumentProvider {
    name: String,
    root: KeyPath,
    source: Arc<dyn DocumentSource>,
    latest: Arc<watch::Sender<Latest>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl DocumentProvider {
    /// Creates a provider over `source`.
    pub fn new(name: impl Into<String>, source: Arc<dyn DocumentSource>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            name: name.into(),
            root: KeyPath::root(),
            source,
            latest: Arc::new(latest),
            pump: Mutex::new(None),
        }
    }

    /// Pins every key of this provider below `root` in the document.
    pub fn with_root(mut self, root: impl Into<KeyPath>) -> Self {
        self.root = root.into();
        self
    }

    /// The document root key.
    pub fn root(&self) -> &KeyPath {
        &self.root
    }

    /// Returns `true` once a document has been received.
    pub fn is_loaded(&self) -> bool {
        matches!(*self.latest.borrow(), Some(Ok(_)))
    }

    fn decoder_for(&self, latest: &Latest, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        match latest {
            None => Err(ToggleError::NoValue),
            Some(Err(error)) => Err(error.clone()),
            Some(Ok(document)) => Ok(Box::new(DocumentDecoder::with_root(
                Arc::clone(document),
                self.root.clone(),
                key.clone(),
            ))),
        }
    }

    fn start_pump(&self) {
        let mut pump = self.pump.lock();
        if pump.is_some() {
            return;
        }

        let mut documents = self.source.documents();
        let latest = Arc::clone(&self.latest);
        let name = self.name.clone();

        *pump = Some(tokio::spawn(async move {
            while let Some(item) = documents.next().await {
                let parsed = item.map_err(ToggleError::from).and_then(|bytes| {
                    serde_json::from_slice::<IgnoredAny>(&bytes)?;
                    Ok(Arc::<[u8]>::from(bytes))
                });
                match parsed {
                    Ok(document) => {
                        info!(provider = %name, bytes = document.len(), "Received document");
                        latest.send_replace(Some(Ok(document)));
                    }
                    Err(error) => {
                        warn!(provider = %name, error = %error, "Document source failed");
                        latest.send_if_modified(|current| match current {
                            Some(Ok(_)) => false,
                            _ => {
                                *current = Some(Err(error));
                                true
                            }
                        });
                    }
                }
            }
            debug!(provider = %name, "Document source ended");
            latest.send_if_modified(|current| {
                if current.is_some() {
                    return false;
                }
                *current = Some(Err(ToggleError::NoValue));
                true
            });
        }));
    }
}

#[async_trait]
impl ToggleProvider for DocumentProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn decoder(&self, key: &KeyPath) -> ToggleResult<BoxedDecoder> {
        self.decoder_for(&self.latest.borrow(), key)
    }

    fn decoder_stream(&self, key: &KeyPath) -> BoxStream<'static, ToggleResult<BoxedDecoder>> {
        let mut changes = self.latest.subscribe();
        changes.mark_changed();
        let root = self.root.clone();
        let key = key.clone();

        stream::unfold(changes, move |mut changes| {
            let root = root.clone();
            let key = key.clone();
            async move {
                loop {
                    changes.changed().await.ok()?;
                    let latest = changes.borrow_and_update().clone();
                    let item: ToggleResult<BoxedDecoder> = match latest {
                        None => continue,
                        Some(Err(error)) => Err(error),
                        Some(Ok(document)) => Ok(Box::new(DocumentDecoder::with_root(
                            document,
                            root.clone(),
                            key.clone(),
                        ))),
                    };
                    return Some((item, changes));
                }
            }
        })
        .boxed()
    }

    async fn set_up(&self) -> ToggleResult<()> {
        self.start_pump();
        let mut changes = self.latest.subscribe();
        let first = changes
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ToggleError::Transport(TransportError::Closed))?;
        match &*first {
            Some(Err(error)) => Err(error.clone()),
            _ => Ok(()),
        }
    }

    async fn refresh(&self) -> ToggleResult<()> {
        debug!(provider = %self.name, "Refreshing document source");
        Ok(self.source.refresh().await?)
    }

    fn tear_down(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
            debug!(provider = %self.name, "Stopped document pump");
        }
    }
}

impl Drop for DocumentProvider {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::ToggleDecoder;
    use crate::provider::ToggleProviderExt;

    fn provider() -> (Arc<DocumentFeed>, DocumentProvider) {
        let feed = Arc::new(DocumentFeed::new());
        let provider = DocumentProvider::new("remote", feed.clone());
        (feed, provider)
    }

    #[tokio::test]
    async fn test_reads_fail_before_first_document() {
        let (_feed, provider) = provider();
        assert_eq!(
            provider.value::<bool>(&"beta".into()).unwrap_err(),
            ToggleError::NoValue
        );
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn test_set_up_waits_for_first_document() {
        let (feed, provider) = provider();
        feed.push(br#"{"beta": true, "limits": {"max": 5}}"#.to_vec());

        provider.set_up().await.unwrap();
        assert!(provider.is_loaded());
        assert!(provider.value::<bool>(&"beta".into()).unwrap());
        assert_eq!(provider.value::<u8>(&"limits.max".into()).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_set_up_surfaces_first_error() {
        let (feed, provider) = provider();
        feed.push_error(TransportError::Request {
            url: "https://example.invalid".into(),
            reason: "timeout".into(),
        });

        let err = provider.set_up().await.unwrap_err();
        assert!(matches!(err, ToggleError::Transport(TransportError::Request { .. })));
    }

    #[tokio::test]
    async fn test_malformed_document_is_parse_error() {
        let (feed, provider) = provider();
        feed.push(b"{not json".to_vec());
        assert!(matches!(
            provider.set_up().await.unwrap_err(),
            ToggleError::Parse { .. }
        ));
    }

    #[tokio::test]
    async fn test_source_ending_without_document_is_no_value() {
        let feed = Arc::new(DocumentFeed::new());
        let provider = DocumentProvider::new("remote", feed.clone());
        drop(feed.documents());
        // The provider's own stream is now empty.
        assert_eq!(provider.set_up().await.unwrap_err(), ToggleError::NoValue);
    }

    #[tokio::test]
    async fn test_root_key_pins_sub_document() {
        let (feed, provider) = provider();
        let provider = provider.with_root("android");
        feed.push(br#"{"ios": {"beta": false}, "android": {"beta": true}}"#.to_vec());
        provider.set_up().await.unwrap();
        assert!(provider.value::<bool>(&"beta".into()).unwrap());
    }

    #[tokio::test]
    async fn test_later_errors_keep_last_document() {
        let (feed, provider) = provider();
        let mut decoders = provider.decoder_stream(&"beta".into());

        feed.push(br#"{"beta": true}"#.to_vec());
        provider.set_up().await.unwrap();
        assert!(decoders.next().await.unwrap().unwrap().decode_bool().unwrap());

        feed.push_error(TransportError::Closed);
        feed.push(br#"{"beta": false}"#.to_vec());
        let next = decoders.next().await.unwrap().unwrap();
        assert!(!next.decode_bool().unwrap());
    }
}
