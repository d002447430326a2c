use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use super::{RangeBody, RangeClient, RemoteMeta};
use anyhow::{Result, anyhow, bail};

/// HTTP transport for remote archives.
///
/// Wraps a [`reqwest::Client`] and a URL, exposing the metadata probe and
/// the ranged/full GET operations behind [`RangeClient`]. Connection and
/// timeout failures before a body starts streaming are retried with a
/// linear backoff; once a body is being consumed, errors propagate.
pub struct HttpClient {
    client: Client,
    url: String,
    max_retry: u32,
}

impl HttpClient {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url,
            max_retry: 10,
        })
    }

    /// Send a GET request, retrying transient connection failures.
    async fn send_get(&self, range: Option<&str>) -> Result<Response> {
        let mut retry_count = 0u32;
        loop {
            let mut req = self.client.get(&self.url);
            if let Some(range) = range {
                req = req.header("Range", range);
            }
            match req.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded: {e}");
                    }
                    debug!(retry = retry_count, max = self.max_retry, "connection error: {e}");
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl RangeClient for HttpClient {
    async fn probe(&self) -> Result<RemoteMeta> {
        let resp = self.client.head(&self.url).send().await?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let supports_range = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .contains("bytes");

        let total_length = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        debug!(total_length, supports_range, url = %self.url, "probed remote resource");

        Ok(RemoteMeta {
            total_length,
            supports_range,
        })
    }

    async fn get_range(&self, start: u64, end: u64) -> Result<Box<dyn RangeBody>> {
        let range = format!("bytes={start}-{end}");
        debug!(%range, url = %self.url, "fetching range");

        let resp = self.send_get(Some(&range)).await?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            bail!("HTTP range request failed with status: {}", resp.status());
        }
        Ok(Box::new(HttpBody(resp)))
    }

    async fn get_all(&self) -> Result<Box<dyn RangeBody>> {
        debug!(url = %self.url, "fetching full resource");

        let resp = self.send_get(None).await?;
        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }
        Ok(Box::new(HttpBody(resp)))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

struct HttpBody(Response);

#[async_trait]
impl RangeBody for HttpBody {
    async fn chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.0.chunk().await?)
    }
}
