//! Feed retrieval over HTTP and the local filesystem.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;

use crate::source::Origin;

/// User agent sent with feed requests.
pub const USER_AGENT: &str = concat!("blackhole/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while retrieving a feed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// HTTP request completed with a non-success status code.
    #[error("HTTP request failed for {url}: status {status}")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// Network error during the HTTP request.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// URL that was requested.
        url: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Timeout fetching a remote feed or reading a feed file.
    #[error("timed out fetching {target}")]
    Timeout {
        /// URL or path that timed out.
        target: String,
    },

    /// Feed file was not found at the specified path.
    #[error("feed file not found: {0:?}")]
    NotFound(PathBuf),

    /// Permission denied when accessing the feed file.
    #[error("permission denied reading feed file: {0:?}")]
    PermissionDenied(PathBuf),

    /// I/O error while reading the feed file.
    #[error("I/O error reading feed file {path:?}: {source}")]
    Io {
        /// Path to the file that caused the error.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Task join error from the blocking parse task.
    #[error("feed parse task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Retrieves raw feed bodies from any [`Origin`].
///
/// One fetcher is shared across all sources of a run so HTTP connections
/// get pooled. The configured timeout bounds both remote requests and
/// local file reads.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client, timeout })
    }

    /// Returns the raw feed body for the origin.
    pub async fn fetch_raw(&self, origin: &Origin) -> Result<String, FetchError> {
        match origin {
            Origin::Url(url) => self.fetch_url(url).await,
            Origin::File(path) => self.read_file(path).await,
            Origin::Inline(lines) => Ok(lines.join("\n")),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "fetching remote feed");
        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout {
                    target: url.to_owned(),
                }
            } else {
                FetchError::Network {
                    url: url.to_owned(),
                    source: err,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|err| FetchError::Network {
            url: url.to_owned(),
            source: err,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<String, FetchError> {
        tracing::debug!(path = %path.display(), "reading feed file");
        let read = tokio::fs::read_to_string(path);
        tokio::time::timeout(self.timeout, read)
            .await
            .map_err(|_| FetchError::Timeout {
                target: path.display().to_string(),
            })?
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound(path.to_path_buf()),
                std::io::ErrorKind::PermissionDenied => {
                    FetchError::PermissionDenied(path.to_path_buf())
                }
                _ => FetchError::Io {
                    path: path.to_path_buf(),
                    source: err,
                },
            })
    }
}
