//! Byte retrieval for the download stage.
//!
//! The download stage only needs "URL in, bytes out". [`Fetcher`] is that
//! boundary; [`HttpFetcher`] is the production implementation on reqwest.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, ThumbnailerError};

/// Retrieves the raw bytes behind a URL.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the stages hold an `Arc<dyn Fetcher>`).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name for logging (e.g., "http").
    fn name(&self) -> &str;

    /// Fetch the full body for `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// HTTP(S) fetcher with a request timeout and a body size cap.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(limits: &LimitsConfig) -> Result<Self, ThumbnailerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(limits.fetch_timeout_ms))
            .connect_timeout(Duration::from_millis(limits.connect_timeout_ms))
            .user_agent(concat!("thumbnailer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ThumbnailerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_bytes: limits.max_download_mb.saturating_mul(1024 * 1024),
        })
    }

    fn too_large(&self, url: &str, size: u64) -> PipelineError {
        PipelineError::Fetch {
            url: url.to_string(),
            message: format!(
                "body of {size} bytes exceeds limit of {} bytes",
                self.max_bytes
            ),
            status_code: None,
        }
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> PipelineError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    PipelineError::Fetch {
        url: url.to_string(),
        message,
        status_code: err.status().map(|s| s.as_u16()),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        let declared = response.content_length();
        if let Some(size) = declared {
            if size > self.max_bytes {
                return Err(self.too_large(url, size));
            }
        }

        let capacity = declared.unwrap_or(0).min(self.max_bytes) as usize;
        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(url, e))?;
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_bytes {
                return Err(self.too_large(url, size));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::trace!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
