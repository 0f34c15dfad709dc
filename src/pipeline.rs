// src/pipeline.rs
//! # Article Pipeline
//! Per article: duplicate check → recent-story lookup → match → append or create.
//!
//! New-story creation is serialized per category. Inside the category lock the
//! recent window is re-read and the matcher re-run, so two concurrent articles
//! about the same emerging event end up in one story.

use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::article::{mint_story_id, Article, StoryId};
use crate::category::Category;
use crate::config::ClusterConfig;
use crate::error::{ErrorKind, Result};
use crate::matcher::StoryMatcher;
use crate::storage::StorageCollaborator;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_articles_total",
            "Articles processed, labeled by outcome (created/merged/skipped/failed)."
        );
        describe_histogram!(
            "pipeline_similarity",
            "Similarity score of accepted story matches."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Skipped { reason: SkipReason },
    MergedIntoStory { story_id: StoryId, similarity: f64 },
    CreatedNewStory { story_id: StoryId },
}

impl ProcessingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingOutcome::Skipped { .. } => "skipped",
            ProcessingOutcome::MergedIntoStory { .. } => "merged",
            ProcessingOutcome::CreatedNewStory { .. } => "created",
        }
    }

    pub fn story_id(&self) -> Option<&str> {
        match self {
            ProcessingOutcome::Skipped { .. } => None,
            ProcessingOutcome::MergedIntoStory { story_id, .. }
            | ProcessingOutcome::CreatedNewStory { story_id } => Some(story_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleFailure {
    pub url: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

/// Aggregate of one batch. `processed` counts created + merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ArticleFailure>,
    /// Successful outcomes per category, keyed by category name.
    pub by_category: HashMap<Category, usize>,
}

impl BatchReport {
    fn record(&mut self, article: &Article, res: Result<ProcessingOutcome>) {
        match res {
            Ok(ProcessingOutcome::Skipped { .. }) => self.skipped += 1,
            Ok(ProcessingOutcome::MergedIntoStory { .. }) => {
                self.merged += 1;
                self.processed += 1;
                *self.by_category.entry(article.category).or_default() += 1;
            }
            Ok(ProcessingOutcome::CreatedNewStory { .. }) => {
                self.created += 1;
                self.processed += 1;
                *self.by_category.entry(article.category).or_default() += 1;
            }
            Err(e) => {
                self.failed += 1;
                self.failures.push(ArticleFailure {
                    url: article.url.clone(),
                    kind: e.kind(),
                    status: e.status(),
                    message: e.to_string(),
                });
            }
        }
    }
}

pub struct ArticlePipeline {
    storage: Arc<dyn StorageCollaborator>,
    matcher: StoryMatcher,
    hours_back: u32,
    max_concurrency: usize,
    creation_locks: Mutex<HashMap<Category, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArticlePipeline {
    pub fn new(
        storage: Arc<dyn StorageCollaborator>,
        matcher: StoryMatcher,
        hours_back: u32,
        max_concurrency: usize,
    ) -> Self {
        Self {
            storage,
            matcher,
            hours_back,
            max_concurrency: max_concurrency.max(1),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &ClusterConfig, storage: Arc<dyn StorageCollaborator>) -> Self {
        Self::new(
            storage,
            StoryMatcher::new(cfg.clustering.similarity_threshold),
            cfg.clustering.hours_back,
            cfg.scraper.max_concurrency,
        )
    }

    pub fn storage(&self) -> &Arc<dyn StorageCollaborator> {
        &self.storage
    }

    pub fn threshold(&self) -> f64 {
        self.matcher.threshold()
    }

    pub fn hours_back(&self) -> u32 {
        self.hours_back
    }

    fn creation_lock(&self, category: Category) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.creation_locks.lock().expect("creation lock table poisoned");
        locks.entry(category).or_default().clone()
    }

    /// Process one article end to end.
    pub async fn process(&self, article: &Article) -> Result<ProcessingOutcome> {
        ensure_metrics_described();
        let res = self.process_inner(article).await;
        let label = match &res {
            Ok(o) => o.label(),
            Err(_) => "failed",
        };
        counter!("pipeline_articles_total", "outcome" => label).increment(1);
        res
    }

    async fn process_inner(&self, article: &Article) -> Result<ProcessingOutcome> {
        if self.storage.link_exists(&article.url).await? {
            info!(target: "pipeline", url = %article.url, "duplicate article skipped");
            return Ok(ProcessingOutcome::Skipped {
                reason: SkipReason::Duplicate,
            });
        }

        let recent = self.storage.get_recent_stories(self.hours_back).await?;
        if let Some(m) = self.matcher.find(&article.keywords, article.category, &recent) {
            return self.merge(article, m.story_id, m.similarity).await;
        }

        // Double-checked creation: another task may have founded the story
        // while we were waiting for the category lock.
        let lock = self.creation_lock(article.category);
        let _guard = lock.lock().await;

        let recent = self.storage.get_recent_stories(self.hours_back).await?;
        if let Some(m) = self.matcher.find(&article.keywords, article.category, &recent) {
            return self.merge(article, m.story_id, m.similarity).await;
        }

        let story_id = mint_story_id();
        let record = article.to_record(&story_id, true);
        self.storage.create_article(&record).await?;
        info!(
            target: "pipeline",
            url = %article.url,
            story_id = %story_id,
            category = %article.category,
            keywords = article.keywords.len(),
            "created new story"
        );
        Ok(ProcessingOutcome::CreatedNewStory { story_id })
    }

    async fn merge(
        &self,
        article: &Article,
        story_id: StoryId,
        similarity: f64,
    ) -> Result<ProcessingOutcome> {
        let record = article.to_record(&story_id, false);
        self.storage.append_article(&record, &story_id).await?;
        histogram!("pipeline_similarity").record(similarity);
        info!(
            target: "pipeline",
            url = %article.url,
            story_id = %story_id,
            similarity,
            "merged into existing story"
        );
        Ok(ProcessingOutcome::MergedIntoStory {
            story_id,
            similarity,
        })
    }

    /// Process a batch with at most `max_concurrency` articles in flight.
    /// Per-article failures are collected, never propagated.
    pub async fn process_batch(&self, articles: Vec<Article>) -> BatchReport {
        let results: Vec<(Article, Result<ProcessingOutcome>)> = stream::iter(articles)
            .map(|a| async move {
                let res = self.process(&a).await;
                (a, res)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (article, res) in results {
            if let Err(e) = &res {
                warn!(target: "pipeline", url = %article.url, error = %e, "article failed");
            }
            report.record(&article, res);
        }
        report
    }
}
