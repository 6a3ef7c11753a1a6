//! Metrics snapshot fetcher.
//!
//! Scrapes a plain-text exposition endpoint over HTTP or HTTPS and turns it
//! into a [`MetricsSnapshot`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use mender_core::MetricsConfig;
use mender_state::MetricsSnapshot;

use crate::exposition::{MetricNames, parse_exposition};

/// Errors raised while scraping an endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme in {0}")]
    UnsupportedScheme(String),

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("endpoint returned status {0}")]
    Status(u16),

    #[error("response body was not valid UTF-8")]
    Body,

    #[error("scrape timed out after {0:?}")]
    Timeout(Duration),
}

/// Anything that can produce a snapshot for a URL.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<MetricsSnapshot, FetchError>;
}

/// Scrapes over HTTP(S) with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    client: reqwest::Client,
    names: MetricNames,
    timeout: Duration,
}

impl HttpMetricsSource {
    pub fn new(names: MetricNames, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("mender/0.1")
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self {
            client,
            names,
            timeout,
        })
    }

    pub fn from_config(config: &MetricsConfig) -> Result<Self, FetchError> {
        Self::new(MetricNames::from(config), config.timeout)
    }

    fn classify(&self, url: &Url, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if e.is_connect() {
            FetchError::Connect {
                address: format!(
                    "{}:{}",
                    url.host_str().unwrap_or_default(),
                    url.port_or_known_default().unwrap_or_default()
                ),
                reason: e.to_string(),
            }
        } else {
            FetchError::Http(e.to_string())
        }
    }
}

/// Only `http` and `https` URLs with a host are scraped.
fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::UnsupportedScheme(raw.to_string()));
    }
    if url.host_str().is_none() {
        return Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn fetch(&self, raw: &str) -> Result<MetricsSnapshot, FetchError> {
        let url = parse_url(raw)?;

        let resp = self
            .client
            .get(url.clone())
            .header("accept", "text/plain")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, url = %raw, "metrics endpoint non-2xx");
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(&url, e))?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|_| FetchError::Body)?;
        Ok(parse_exposition(&body, &self.names))
    }
}
