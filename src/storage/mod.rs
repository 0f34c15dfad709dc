// src/storage/mod.rs
//! Storage collaborator: the narrow interface the pipeline needs from the
//! downstream article API, plus an HTTP client and an in-memory implementation.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::article::{ArticleRecord, StorySnapshot};
use crate::category::Category;
use crate::error::Result;

pub use http::HttpStorage;
pub use memory::MemoryStorage;

#[async_trait]
pub trait StorageCollaborator: Send + Sync {
    /// Whether an article with this link is already stored.
    async fn link_exists(&self, url: &str) -> Result<bool>;

    /// Stories touched within the last `horizon_hours`, one snapshot per story.
    async fn get_recent_stories(&self, horizon_hours: u32) -> Result<Vec<StorySnapshot>>;

    /// Store the founding article of a new story. Returns the storage-side id.
    async fn create_article(&self, record: &ArticleRecord) -> Result<String>;

    /// Store an article under an existing story. Returns the storage-side id.
    async fn append_article(&self, record: &ArticleRecord, story_id: &str) -> Result<String>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// One stored article as the storage tier reports it back.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRow {
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_primary_article: bool,
}

/// Collapse article rows into one snapshot per story.
///
/// The founding (primary) article's keywords win; if the primary fell outside the
/// window, the earliest row seen for that story stands in. Output is sorted by
/// `story_id`, which makes matcher tie-breaks independent of storage row order.
pub fn collapse_rows(rows: impl IntoIterator<Item = StoredRow>) -> Vec<StorySnapshot> {
    let mut by_story: BTreeMap<String, (bool, StorySnapshot)> = BTreeMap::new();

    for row in rows {
        let Some(story_id) = row.story_id.filter(|s| !s.is_empty()) else {
            continue;
        };
        let snapshot = StorySnapshot {
            story_id: story_id.clone(),
            keywords: row.keywords.into_iter().collect(),
            category: row
                .category
                .as_deref()
                .map(Category::parse_lenient)
                .unwrap_or_default(),
            title: row.title,
        };

        match by_story.get_mut(&story_id) {
            Some(existing) if !existing.0 && row.is_primary_article => {
                *existing = (true, snapshot);
            }
            Some(_) => {}
            None => {
                by_story.insert(story_id, (row.is_primary_article, snapshot));
            }
        }
    }

    by_story.into_values().map(|(_, s)| s).collect()
}
