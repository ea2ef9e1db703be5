// src/artifact/fetch.rs

//! Network transfer of artifacts.
//!
//! [`HttpFetcher`] streams a `reqwest` response body chunk by chunk into the
//! writer it is given; it never buffers the whole artifact in memory.
//! Failures are reported as [`DownloadError`], which records whether trying
//! again could plausibly help. Nothing here retries on its own.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::{Result, StubRunnerError};
use crate::fs::WriteStream;

/// Why a download failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadErrorKind {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("downloading {url} failed: {kind}")]
pub struct DownloadError {
    pub url: String,
    pub kind: DownloadErrorKind,
    /// Whether the same request might succeed later.
    pub retryable: bool,
}

impl DownloadError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: DownloadErrorKind::Transport(message.into()),
            retryable: true,
        }
    }

    pub fn status(url: impl Into<String>, code: u16) -> Self {
        Self {
            url: url.into(),
            kind: DownloadErrorKind::Status(code),
            retryable: is_retryable_status(code),
        }
    }

    pub fn io(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: DownloadErrorKind::Io(message.into()),
            retryable: false,
        }
    }
}

fn is_retryable_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..=599).contains(&code)
}

pub type FetchFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<u64, DownloadError>> + Send + 'a>>;

/// Trait abstracting how a remote artifact is transferred.
pub trait ArtifactFetcher: Send + Sync + Debug {
    /// Stream the body at `url` into `sink`, returning the number of bytes
    /// written. Completes once the body reached end-of-stream.
    fn fetch<'a>(&'a self, url: &'a str, sink: &'a mut WriteStream) -> FetchFuture<'a>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stubrunner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                StubRunnerError::ConfigError(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str, sink: &'a mut WriteStream) -> FetchFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| DownloadError::transport(url, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(DownloadError::status(url, status.as_u16()));
            }

            let mut body = response.bytes_stream();
            let mut written: u64 = 0;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| DownloadError::transport(url, e.to_string()))?;
                sink.write_all(&chunk)
                    .await
                    .map_err(|e| DownloadError::io(url, e.to_string()))?;
                written += chunk.len() as u64;
            }
            sink.flush()
                .await
                .map_err(|e| DownloadError::io(url, e.to_string()))?;

            debug!(%url, bytes = written, "response body fully received");
            Ok(written)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_statuses_are_retryable() {
        for code in [408, 429, 500, 502, 503, 599] {
            assert!(DownloadError::status("u", code).retryable, "{code}");
        }
        for code in [301, 400, 401, 403, 404, 410] {
            assert!(!DownloadError::status("u", code).retryable, "{code}");
        }
    }

    #[test]
    fn transport_is_retryable_but_io_is_not() {
        assert!(DownloadError::transport("u", "connection reset").retryable);
        assert!(!DownloadError::io("u", "disk full").retryable);
    }

    #[test]
    fn error_message_names_url_and_cause() {
        let err = DownloadError::status("https://example.com/a.jar", 404);
        assert_eq!(
            err.to_string(),
            "downloading https://example.com/a.jar failed: unexpected HTTP status 404"
        );
    }
}
