use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use stubrunner::artifact::fetch::{ArtifactFetcher, DownloadError, FetchFuture};
use stubrunner::fs::WriteStream;

/// A fake fetcher that:
/// - records every requested URL
/// - writes a fixed body into the sink, optionally after a delay
/// - optionally fails after writing the body
#[derive(Debug, Clone)]
pub struct FakeFetcher {
    body: Vec<u8>,
    delay: Option<Duration>,
    failure: Option<DownloadError>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn serving(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            delay: None,
            failure: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Writes `partial_body`, then fails with `error`.
    pub fn failing(partial_body: impl Into<Vec<u8>>, error: DownloadError) -> Self {
        Self {
            failure: Some(error),
            ..Self::serving(partial_body)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ArtifactFetcher for FakeFetcher {
    fn fetch<'a>(&'a self, url: &'a str, sink: &'a mut WriteStream) -> FetchFuture<'a> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(url.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            sink.write_all(&self.body)
                .await
                .map_err(|e| DownloadError::io(url, e.to_string()))?;

            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(self.body.len() as u64),
            }
        })
    }
}
