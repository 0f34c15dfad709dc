// src/fetch.rs
//! Page fetching. One plain GET per source page, no retries or fallbacks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ScraperSection;
use crate::error::{Error, Result};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the HTML body at `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(cfg: &ScraperSection) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::http_status(
                status.as_u16(),
                format!("GET {url} returned {status}"),
            ));
        }
        let body = resp.text().await?;
        debug!(target: "fetch", %url, bytes = body.len(), "fetched page");
        Ok(body)
    }
}

/// Serves pages from memory; unknown URLs fail with a network error.
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::network(format!("no page for {url}")))
    }
}
