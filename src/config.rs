// src/config.rs
//! Process-wide configuration, built once at startup and shared by `Arc`.
//!
//! Resolution order:
//! 1) `$CLUSTER_CONFIG_PATH` (must exist if set)
//! 2) `config/cluster.toml`
//! 3) built-in defaults
//!
//! then individual env overrides (`SIMILARITY_THRESHOLD`, `CLUSTERING_HOURS_BACK`, ...).
//! Anything malformed is a startup error; nothing here is read again per article.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::keywords::{KeywordExtractor, StopWords, DEFAULT_MIN_TOKEN_LEN};

// --- env defaults & names ---
pub const DEFAULT_CLUSTER_CONFIG_PATH: &str = "config/cluster.toml";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.4;
pub const DEFAULT_CLUSTERING_HOURS_BACK: u32 = 24;

pub const ENV_CLUSTER_CONFIG_PATH: &str = "CLUSTER_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "SIMILARITY_THRESHOLD";
pub const ENV_CLUSTERING_HOURS_BACK: &str = "CLUSTERING_HOURS_BACK";
pub const ENV_API_BASE_URL: &str = "NODEJS_API_URL";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "SCRAPER_TIMEOUT";
pub const ENV_MAX_ARTICLES_PER_SOURCE: &str = "MAX_ARTICLES_PER_SOURCE";
pub const ENV_MAX_CONCURRENCY: &str = "MAX_CONCURRENCY";
pub const ENV_SCRAPE_INTERVAL_SECS: &str = "SCRAPE_INTERVAL_SECS";
pub const ENV_STORAGE_MODE: &str = "STORAGE_MODE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub clustering: ClusteringSection,
    pub scraper: ScraperSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSection {
    /// Minimum Jaccard similarity to merge into an existing story.
    pub similarity_threshold: f64,
    /// Recency horizon for candidate stories, in hours.
    pub hours_back: u32,
    pub min_token_len: usize,
    /// Replaces the built-in stop-word list when present.
    pub stop_words: Option<Vec<String>>,
    /// Added on top of whichever list is in effect.
    pub extra_stop_words: Vec<String>,
}

impl Default for ClusteringSection {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            hours_back: DEFAULT_CLUSTERING_HOURS_BACK,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            stop_words: None,
            extra_stop_words: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSection {
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub max_articles_per_source: usize,
    /// Articles processed in parallel per source; 1 = sequential.
    pub max_concurrency: usize,
    /// Periodic scrape interval; 0 disables the scheduler.
    pub interval_secs: u64,
}

impl Default for ScraperSection {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            user_agent: concat!("news-story-clusterer/", env!("CARGO_PKG_VERSION")).to_string(),
            max_articles_per_source: 20,
            max_concurrency: 1,
            interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Http,
    Memory,
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(StorageMode::Http),
            "memory" => Ok(StorageMode::Memory),
            other => Err(anyhow!("unknown storage mode `{other}` (expected http|memory)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub mode: StorageMode,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Transport-level attempts for retryable failures (429, 5xx, network).
    pub max_attempts: u32,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            mode: StorageMode::Http,
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl ClusterConfig {
    /// Resolve path, parse, apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CLUSTER_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_CLUSTER_CONFIG_PATH} points to non-existent path {}", pb.display());
                }
                Self::from_path(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CLUSTER_CONFIG_PATH);
                if default.exists() {
                    Self::from_path(&default)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading cluster config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing cluster config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ClusterConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// Apply env overrides through `lookup` so tests need not touch the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_SIMILARITY_THRESHOLD) {
            self.clustering.similarity_threshold = parse_env(ENV_SIMILARITY_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_CLUSTERING_HOURS_BACK) {
            self.clustering.hours_back = parse_env(ENV_CLUSTERING_HOURS_BACK, &v)?;
        }
        if let Some(v) = lookup(ENV_API_BASE_URL) {
            self.storage.api_base_url = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_FETCH_TIMEOUT_SECS) {
            self.scraper.fetch_timeout_secs = parse_env(ENV_FETCH_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_ARTICLES_PER_SOURCE) {
            self.scraper.max_articles_per_source = parse_env(ENV_MAX_ARTICLES_PER_SOURCE, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_CONCURRENCY) {
            self.scraper.max_concurrency = parse_env(ENV_MAX_CONCURRENCY, &v)?;
        }
        if let Some(v) = lookup(ENV_SCRAPE_INTERVAL_SECS) {
            self.scraper.interval_secs = parse_env(ENV_SCRAPE_INTERVAL_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_STORAGE_MODE) {
            self.storage.mode = v.parse()?;
        }
        Ok(())
    }

    /// Reject values that would make clustering meaningless.
    pub fn validate(&self) -> Result<()> {
        let t = self.clustering.similarity_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            bail!("similarity_threshold must be within 0.0..=1.0, got {t}");
        }
        if self.clustering.hours_back == 0 {
            bail!("clustering hours_back must be > 0");
        }
        if self.clustering.min_token_len == 0 {
            bail!("min_token_len must be > 0");
        }
        if self.scraper.max_concurrency == 0 {
            bail!("max_concurrency must be > 0");
        }
        if self.scraper.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be > 0");
        }
        if self.storage.request_timeout_secs == 0 {
            bail!("storage request_timeout_secs must be > 0");
        }
        if self.storage.max_attempts == 0 {
            bail!("storage max_attempts must be > 0");
        }
        if self.storage.mode == StorageMode::Http {
            let u = url::Url::parse(&self.storage.api_base_url).with_context(|| {
                format!("invalid storage api_base_url `{}`", self.storage.api_base_url)
            })?;
            if !matches!(u.scheme(), "http" | "https") {
                bail!("storage api_base_url must be http(s), got `{}`", u.scheme());
            }
        }
        Ok(())
    }

    pub fn stop_words(&self) -> StopWords {
        let mut sw = match &self.clustering.stop_words {
            Some(list) => StopWords::from_words(list),
            None => StopWords::default(),
        };
        sw.extend(&self.clustering.extra_stop_words);
        sw
    }

    pub fn keyword_extractor(&self) -> KeywordExtractor {
        KeywordExtractor::new(self.stop_words(), self.clustering.min_token_len)
    }
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{name}=`{raw}` is not valid: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let c = ClusterConfig::default();
        c.validate().unwrap();
        assert_eq!(c.clustering.similarity_threshold, 0.4);
        assert_eq!(c.clustering.hours_back, 24);
        assert_eq!(c.storage.mode, StorageMode::Http);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ClusterConfig::from_toml_str(
            r#"
[clustering]
similarity_threshold = 0.55
extra_stop_words = ["sharjah"]
"#,
        )
        .unwrap();
        assert_eq!(c.clustering.similarity_threshold, 0.55);
        assert_eq!(c.clustering.hours_back, 24);
        assert_eq!(c.scraper.max_articles_per_source, 20);
        assert!(c.stop_words().contains("sharjah"));
        assert!(c.stop_words().contains("dubai"));
    }

    #[test]
    fn replacing_stop_words() {
        let c = ClusterConfig::from_toml_str(
            r#"
[clustering]
stop_words = ["metro"]
"#,
        )
        .unwrap();
        let sw = c.stop_words();
        assert!(sw.contains("metro"));
        assert!(!sw.contains("dubai"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut c = ClusterConfig::default();
        c.apply_env_overrides(env(&[
            (ENV_SIMILARITY_THRESHOLD, "0.6"),
            (ENV_CLUSTERING_HOURS_BACK, "48"),
            (ENV_STORAGE_MODE, "memory"),
            (ENV_MAX_CONCURRENCY, "4"),
        ]))
        .unwrap();
        assert_eq!(c.clustering.similarity_threshold, 0.6);
        assert_eq!(c.clustering.hours_back, 48);
        assert_eq!(c.storage.mode, StorageMode::Memory);
        assert_eq!(c.scraper.max_concurrency, 4);
        c.validate().unwrap();
    }

    #[test]
    fn malformed_threshold_fails_fast() {
        let mut c = ClusterConfig::default();
        assert!(c
            .apply_env_overrides(env(&[(ENV_SIMILARITY_THRESHOLD, "high")]))
            .is_err());

        let mut c = ClusterConfig::default();
        c.clustering.similarity_threshold = 1.5;
        assert!(c.validate().is_err());

        c.clustering.similarity_threshold = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_horizon_rejected() {
        let mut c = ClusterConfig::default();
        c.clustering.hours_back = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_timeouts_rejected() {
        let mut c = ClusterConfig::default();
        c.scraper.fetch_timeout_secs = 0;
        assert!(c.validate().is_err());

        let mut c = ClusterConfig::default();
        c.storage.request_timeout_secs = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));

        let c = ClusterConfig::from_toml_str("[storage]\nrequest_timeout_secs = 0\n").unwrap();
        assert!(c.validate().is_err());
    }

    #[test]
    fn bad_api_url_rejected_only_in_http_mode() {
        let mut c = ClusterConfig::default();
        c.storage.api_base_url = "not a url".into();
        assert!(c.validate().is_err());
        c.storage.mode = StorageMode::Memory;
        c.validate().unwrap();
    }

    #[test]
    fn unknown_toml_type_is_error() {
        assert!(ClusterConfig::from_toml_str("[clustering]\nhours_back = \"soon\"").is_err());
    }
}
