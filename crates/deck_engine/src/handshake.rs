use std::path::PathBuf;
use std::sync::Arc;

use deck_logging::{deck_error, deck_info, redact_url};
use tokio_util::task::TaskTracker;

use crate::http::{ensure_success, map_reqwest_error};
use crate::{AtomicFileWriter, DownloadGrant, FailureKind, ServiceError};

/// Mints a signed download URL for a job's output reference.
#[async_trait::async_trait]
pub trait LinkIssuer: Send + Sync {
    async fn issue(&self, output_reference: &str) -> Result<DownloadGrant, ServiceError>;
}

/// Saves the resource behind a signed URL under a fixed file name.
#[async_trait::async_trait]
pub trait DownloadSink: Send + Sync {
    async fn save(&self, url: &str, filename: &str) -> Result<PathBuf, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeFailure {
    #[error("download link exchange failed: {0}")]
    Transport(#[source] ServiceError),
    #[error("download link exchange returned an empty url")]
    EmptyUrl,
}

/// Turns a completed job's output reference into a saved file.
///
/// Grants are never cached: each `finalize` asks for a fresh one.
#[derive(Clone)]
pub struct CompletionHandshake {
    issuer: Arc<dyn LinkIssuer>,
    sink: Arc<dyn DownloadSink>,
    filename: String,
    tracker: TaskTracker,
}

impl CompletionHandshake {
    pub fn new(
        issuer: Arc<dyn LinkIssuer>,
        sink: Arc<dyn DownloadSink>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            issuer,
            sink,
            filename: filename.into(),
            tracker: TaskTracker::new(),
        }
    }

    pub async fn finalize(
        &self,
        output_reference: &str,
    ) -> Result<DownloadGrant, HandshakeFailure> {
        let grant = self
            .issuer
            .issue(output_reference)
            .await
            .map_err(HandshakeFailure::Transport)?;
        if grant.download_url.trim().is_empty() {
            return Err(HandshakeFailure::EmptyUrl);
        }
        deck_info!("Minted download link {}", redact_url(&grant.download_url));
        Ok(grant)
    }

    /// Starts the file save in the background. Failures are logged, never returned.
    pub fn trigger(&self, grant: &DownloadGrant) {
        let sink = Arc::clone(&self.sink);
        let url = grant.download_url.clone();
        let filename = self.filename.clone();
        self.tracker.spawn(async move {
            match sink.save(&url, &filename).await {
                Ok(path) => deck_info!("Saved {} to {}", redact_url(&url), path.display()),
                Err(err) => deck_error!("Download of {} failed: {}", redact_url(&url), err),
            }
        });
    }

    /// Waits for every triggered save to finish.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// Fetches the signed URL over HTTP and writes the body atomically into a directory.
#[derive(Debug, Clone)]
pub struct FileDownloadSink {
    client: reqwest::Client,
    writer: AtomicFileWriter,
}

impl FileDownloadSink {
    pub fn new(client: reqwest::Client, directory: PathBuf) -> Self {
        Self {
            client,
            writer: AtomicFileWriter::new(directory),
        }
    }
}

#[async_trait::async_trait]
impl DownloadSink for FileDownloadSink {
    async fn save(&self, url: &str, filename: &str) -> Result<PathBuf, ServiceError> {
        let url = reqwest::Url::parse(url).map_err(|err| {
            ServiceError::new(FailureKind::InvalidUrl, format!("{}: {err}", redact_url(url)))
        })?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = ensure_success(response)?
            .bytes()
            .await
            .map_err(map_reqwest_error)?;

        let writer = self.writer.clone();
        let filename = filename.to_string();
        tokio::task::spawn_blocking(move || writer.write(&filename, &body))
            .await
            .map_err(|err| ServiceError::new(FailureKind::Closed, err.to_string()))?
            .map_err(|err| ServiceError::new(FailureKind::Io, err.to_string()))
    }
}
