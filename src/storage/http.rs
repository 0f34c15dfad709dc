// src/storage/http.rs
//! HTTP client for the downstream article API.
//!
//! Endpoints:
//! - `GET  {base}/health`
//! - `GET  {base}/api/rss/exists?link=…` → `{"exists": bool}`
//! - `GET  {base}/api/rss?limit=500&since=<rfc3339>` → `{"data": [row, …]}`
//! - `POST {base}/api/rss` with an `ArticleRecord` (create and append alike)
//!
//! Retries live here, not in the pipeline: 429, 5xx and transport errors are
//! retried with exponential backoff up to `max_attempts`.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::article::{ArticleRecord, StorySnapshot};
use crate::config::StorageSection;
use crate::error::{Error, Result};
use crate::storage::{collapse_rows, StorageCollaborator, StoredRow};

/// How many rows to pull when building the recent-story window.
const RECENT_LIMIT: u32 = 500;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Cap for error bodies carried in `Error::Storage`.
const ERROR_BODY_MAX_CHARS: usize = 300;

pub struct HttpStorage {
    http: reqwest::Client,
    base_url: String,
    max_attempts: u32,
    retry_base_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct ExistsResp {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct ListResp {
    #[serde(default)]
    data: Vec<StoredRow>,
}

#[derive(Debug, Deserialize)]
struct CreatedResp {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

impl HttpStorage {
    pub fn new(cfg: &StorageSection) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("news-story-clusterer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            max_attempts: cfg.max_attempts.max(1),
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    /// Override the first backoff delay (tests use a tiny value).
    pub fn with_retry_base_delay(mut self, d: Duration) -> Self {
        self.retry_base_delay = d;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(
                        target: "storage",
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying storage call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_record(&self, record: &ArticleRecord) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/api/rss"))
            .json(record)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        Ok(created_id(&body).unwrap_or_else(|| record.link.clone()))
    }
}

/// Map a non-2xx response to `Error::Storage` carrying the status and a body excerpt.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(ERROR_BODY_MAX_CHARS).collect();
    Err(Error::storage(Some(status.as_u16()), excerpt))
}

/// Extract the storage-side id from a create/append response, if it has one.
fn created_id(body: &str) -> Option<String> {
    let parsed: CreatedResp = serde_json::from_str(body).ok()?;
    match parsed.id? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl StorageCollaborator for HttpStorage {
    async fn link_exists(&self, url: &str) -> Result<bool> {
        self.with_retry("link_exists", move || async move {
            let resp = self
                .http
                .get(self.url("/api/rss/exists"))
                .query(&[("link", url)])
                .send()
                .await?;
            let resp = check_status(resp).await?;
            let body: ExistsResp = resp.json().await?;
            Ok(body.exists)
        })
        .await
    }

    async fn get_recent_stories(&self, horizon_hours: u32) -> Result<Vec<StorySnapshot>> {
        let since = (Utc::now() - ChronoDuration::hours(i64::from(horizon_hours)))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let limit = RECENT_LIMIT.to_string();
        let (limit, since) = (limit.as_str(), since.as_str());

        let rows = self
            .with_retry("get_recent_stories", move || async move {
                let resp = self
                    .http
                    .get(self.url("/api/rss"))
                    .query(&[("limit", limit), ("since", since)])
                    .send()
                    .await?;
                let resp = check_status(resp).await?;
                let body: ListResp = resp.json().await?;
                Ok(body.data)
            })
            .await?;

        let stories = collapse_rows(rows);
        info!(
            target: "storage",
            count = stories.len(),
            horizon_hours,
            "retrieved recent stories"
        );
        Ok(stories)
    }

    async fn create_article(&self, record: &ArticleRecord) -> Result<String> {
        self.with_retry("create_article", || self.post_record(record))
            .await
    }

    async fn append_article(&self, record: &ArticleRecord, story_id: &str) -> Result<String> {
        if record.story_id != story_id {
            return Err(Error::parse(format!(
                "record story_id {} does not match target story {story_id}",
                record.story_id
            )));
        }
        self.with_retry("append_article", || self.post_record(record))
            .await
    }

    async fn health_check(&self) -> Result<()> {
        let resp = self.http.get(self.url("/health")).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
