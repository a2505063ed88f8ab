use crate::config::{Endpoint, FetcherConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetchError, FetchedPage, PageSource};

/// Single-shot HTTP client; body decompression (gzip, deflate, brotli) is
/// handled by reqwest according to the response's Content-Encoding.
pub struct HttpFetcher {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner, timeout })
    }

    fn headers_for(endpoint: &Endpoint) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in &endpoint.headers {
            match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!("Skipping invalid header {:?} for {}", k, endpoint.label()),
            }
        }
        map
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<FetchedPage, FetchError> {
        debug!("GET {}", endpoint.url);

        let resp = self
            .inner
            .get(&endpoint.url)
            .headers(Self::headers_for(endpoint))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            url: endpoint.url.clone(),
            status: status.as_u16(),
            body,
        })
    }
}
