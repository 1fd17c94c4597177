//! Manifest and segment fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RANGE;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::classifier::TransportErrorKind;
use crate::manifest::ByteRange;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Transport error kind to report when fetching a resource of `what` fails.
    pub(crate) fn kind_for(&self, what: FetchTarget) -> TransportErrorKind {
        let timeout = matches!(self, FetchError::Timeout { .. });
        match (what, timeout) {
            (FetchTarget::Manifest, false) => TransportErrorKind::ManifestLoad,
            (FetchTarget::Manifest, true) => TransportErrorKind::ManifestLoadTimeout,
            (FetchTarget::Level, false) => TransportErrorKind::LevelLoad,
            (FetchTarget::Level, true) => TransportErrorKind::LevelLoadTimeout,
            (FetchTarget::Fragment, false) => TransportErrorKind::FragLoad,
            (FetchTarget::Fragment, true) => TransportErrorKind::FragLoadTimeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchTarget {
    Manifest,
    Level,
    Fragment,
}

/// Source of manifest text and segment bytes.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    async fn fetch_bytes(&self, url: &str, range: Option<ByteRange>) -> Result<Vec<u8>, FetchError>;
}

/// [`SegmentFetcher`] over HTTP.
#[derive(Clone)]
pub struct HttpSegmentFetcher {
    http: Client,
}

impl HttpSegmentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { http })
    }

    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<reqwest::Response, FetchError> {
        let mut request = self.http.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }

        let response = request.send().await.map_err(|e| map_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url = %url, "Fetching playlist");
        self.get(url, None)
            .await?
            .text()
            .await
            .map_err(|e| map_reqwest(url, e))
    }

    async fn fetch_bytes(&self, url: &str, range: Option<ByteRange>) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, range = ?range, "Fetching segment");
        let bytes = self
            .get(url, range)
            .await?
            .bytes()
            .await
            .map_err(|e| map_reqwest(url, e))?;
        Ok(bytes.to_vec())
    }
}

fn map_reqwest(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
