pub mod cleaner;
pub mod http_client;

use crate::config::Endpoint;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use self::http_client::HttpFetcher;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source; one call is one GET against one endpoint.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode body: {0}")]
    Decode(String),
    #[error("page has no domain keyword")]
    Irrelevant,
    #[error("all {} endpoints failed", .0.len())]
    Exhausted(Vec<EndpointFailure>),
}

impl FetchError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() || e.is_body() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: FetchError,
}

impl std::fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.error)
    }
}

// ── Endpoint walk ─────────────────────────────────────────────────────────────

/// Try `endpoints` strictly in order, one request each. Returns every page
/// that contains a domain keyword; stops at the first such page unless
/// `exhaustive` is set. Failures never abort the walk.
pub async fn collect_pages(
    source: &dyn PageSource,
    endpoints: &[Endpoint],
    keywords: &[&str],
    exhaustive: bool,
) -> Result<Vec<FetchedPage>, FetchError> {
    let mut pages = Vec::new();
    let mut failures = Vec::new();

    for endpoint in endpoints {
        info!("Fetching {}", endpoint.label());
        let result = match source.fetch(endpoint).await {
            Ok(page) if cleaner::contains_any(&page.body, keywords) => Ok(page),
            Ok(_) => Err(FetchError::Irrelevant),
            Err(e) => Err(e),
        };

        match result {
            Ok(page) => {
                debug!("{}: {} chars, status {}", endpoint.label(), page.body.len(), page.status);
                pages.push(page);
                if !exhaustive {
                    break;
                }
            }
            Err(error) => {
                warn!("{} failed: {}", endpoint.label(), error);
                failures.push(EndpointFailure {
                    endpoint: endpoint.label().to_string(),
                    error,
                });
            }
        }
    }

    if pages.is_empty() {
        return Err(FetchError::Exhausted(failures));
    }
    Ok(pages)
}
