//! Remote document sources.
//!
//! Both sources emit one document as soon as they are consumed and another on
//! every [`refresh`](DocumentSource::refresh). Failures are emitted as
//! documents too, so the consuming provider can keep its last good copy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::trace;

use switchboard_core::{DocumentFeed, DocumentSource, RawDocument, TransportResult};

use crate::config::RemoteConfig;
use crate::error::RuntimeResult;

/// Builds the document source described by `config`.
pub fn source_from_config(config: &RemoteConfig) -> RuntimeResult<Arc<dyn DocumentSource>> {
    if config.is_http() {
        #[cfg(feature = "http-remote")]
        {
            let source = HttpDocumentSource::new(&config.source, config.timeout())?;
            return Ok(Arc::new(source));
        }
        #[cfg(not(feature = "http-remote"))]
        {
            let error = crate::config::ConfigError::invalid_source(
                &config.source,
                "HTTP sources require the `http-remote` feature",
            );
            return Err(error.into());
        }
    }
    Ok(Arc::new(FileDocumentSource::new(&config.source)))
}

// =============================================================================
// File
// =============================================================================

/// Reads a JSON document from a local file.
#[derive(Debug)]
pub struct FileDocumentSource {
    path: PathBuf,
    feed: DocumentFeed,
}

impl FileDocumentSource {
    /// Creates a source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            feed: DocumentFeed::new(),
        }
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_file(path: &Path) -> RawDocument {
    trace!(path = %path.display(), "Reading document file");
    Ok(std::fs::read(path)?)
}

fn emit(feed: &DocumentFeed, document: RawDocument) -> TransportResult<()> {
    match document {
        Ok(bytes) => {
            feed.push(bytes);
            Ok(())
        }
        Err(error) => {
            feed.push_error(error.clone());
            Err(error)
        }
    }
}

#[async_trait]
impl DocumentSource for FileDocumentSource {
    fn documents(&self) -> BoxStream<'static, RawDocument> {
        let path = self.path.clone();
        stream::once(async move { read_file(&path) })
            .chain(self.feed.documents())
            .boxed()
    }

    async fn refresh(&self) -> TransportResult<()> {
        emit(&self.feed, read_file(&self.path))
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[cfg(feature = "http-remote")]
pub use http::HttpDocumentSource;

#[cfg(feature = "http-remote")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use reqwest::{Client, ClientBuilder};
    use tracing::{debug, info};

    use switchboard_core::{
        DocumentFeed, DocumentSource, RawDocument, TransportError, TransportResult,
    };

    use super::emit;

    /// Fetches a JSON document over HTTP(S).
    #[derive(Debug)]
    pub struct HttpDocumentSource {
        client: Client,
        url: String,
        feed: DocumentFeed,
    }

    impl HttpDocumentSource {
        /// Creates a source fetching `url`, failing requests after `timeout`.
        pub fn new(url: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
            let url = url.into();
            let client = ClientBuilder::new()
                .timeout(timeout)
                .build()
                .map_err(|e| request_error(&url, e))?;
            info!(url = %url, "Created HTTP document source");
            Ok(Self {
                client,
                url,
                feed: DocumentFeed::new(),
            })
        }

        /// The fetched URL.
        pub fn url(&self) -> &str {
            &self.url
        }
    }

    fn request_error(url: &str, error: impl std::fmt::Display) -> TransportError {
        TransportError::Request {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }

    async fn fetch(client: Client, url: String) -> RawDocument {
        debug!(url = %url, "Fetching document");
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(request_error(&url, format!("HTTP {}", status.as_u16())));
        }
        let body = response.bytes().await.map_err(|e| request_error(&url, e))?;
        Ok(body.to_vec())
    }

    #[async_trait]
    impl DocumentSource for HttpDocumentSource {
        fn documents(&self) -> BoxStream<'static, RawDocument> {
            stream::once(fetch(self.client.clone(), self.url.clone()))
                .chain(self.feed.documents())
                .boxed()
        }

        async fn refresh(&self) -> TransportResult<()> {
            emit(&self.feed, fetch(self.client.clone(), self.url.clone()).await)
        }
    }

}
