use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::FetchConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}")]
    Status { status: u16 },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Rate limits, server errors and transport timeouts are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status } => *status == 429 || (500..=599).contains(status),
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Io { .. } => false,
        }
    }
}

/// Retrieves the raw text of one playlist. An empty body is a success.
pub trait Fetch {
    async fn fetch(&self, source: &str) -> Result<String, FetchError>;
}

/// Fetches `http(s)://` sources over the network and anything else from disk.
pub struct SourceFetcher {
    client: reqwest::Client,
    max_retries: u32,
    backoff: Duration,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(SourceFetcher {
            client,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.backoff * 2u32.pow(attempt);
                    warn!(
                        "{} on {} (attempt {}/{}), backing off {:.1}s",
                        e,
                        url,
                        attempt + 1,
                        self.max_retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

impl Fetch for SourceFetcher {
    async fn fetch(&self, source: &str) -> Result<String, FetchError> {
        match local_path(source) {
            Some(path) => {
                info!("Reading {}", path);
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| FetchError::Io {
                        path: PathBuf::from(path),
                        source: e,
                    })
            }
            None => {
                info!("Fetching {}", source);
                self.fetch_with_retry(source).await
            }
        }
    }
}

/// `None` for http(s) URLs; otherwise the filesystem path, minus any `file://`.
fn local_path(source: &str) -> Option<&str> {
    let lower = source.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return None;
    }
    Some(source.strip_prefix("file://").unwrap_or(source))
}
