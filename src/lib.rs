// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod article;
pub mod category;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keywords;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod similarity;
pub mod sources;
pub mod storage;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::article::{Article, ArticleRecord, StorySnapshot};
pub use crate::category::Category;
pub use crate::config::ClusterConfig;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::keywords::{extract_keywords, KeywordExtractor, KeywordSet};
pub use crate::matcher::{find_matching_story, StoryMatch, StoryMatcher};
pub use crate::pipeline::{ArticlePipeline, BatchReport, ProcessingOutcome, SkipReason};
pub use crate::similarity::similarity;
pub use crate::storage::StorageCollaborator;

use std::sync::Arc;

use crate::config::StorageMode;
use crate::fetch::HttpFetcher;
use crate::orchestrator::Orchestrator;
use crate::sources::SourceConfig;
use crate::storage::{HttpStorage, MemoryStorage};

/// Storage backend selected by `storage.mode`.
pub fn build_storage(cfg: &ClusterConfig) -> anyhow::Result<Arc<dyn StorageCollaborator>> {
    Ok(match cfg.storage.mode {
        StorageMode::Http => Arc::new(HttpStorage::new(&cfg.storage)?),
        StorageMode::Memory => Arc::new(MemoryStorage::new()),
    })
}

/// Wire config, sources and storage into a ready orchestrator with an HTTP fetcher.
pub fn build_orchestrator(
    cfg: &ClusterConfig,
    sources: Vec<SourceConfig>,
    storage: Arc<dyn StorageCollaborator>,
) -> anyhow::Result<Orchestrator> {
    let pipeline = Arc::new(ArticlePipeline::from_config(cfg, storage));
    let fetcher = Arc::new(HttpFetcher::new(&cfg.scraper)?);
    Ok(Orchestrator::new(
        sources,
        fetcher,
        pipeline,
        cfg.keyword_extractor(),
        cfg.scraper.max_articles_per_source,
    ))
}
