// src/storage/memory.rs
//! In-process storage. Used for local runs (`STORAGE_MODE=memory`) and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use crate::article::{ArticleRecord, StorySnapshot};
use crate::error::{Error, Result};
use crate::storage::{collapse_rows, StorageCollaborator, StoredRow};

#[derive(Debug, Clone)]
pub struct StoredArticle {
    pub id: String,
    pub record: ArticleRecord,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Vec<StoredArticle>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with an explicit storage time (seeding and horizon tests).
    pub fn insert_at(&self, record: ArticleRecord, stored_at: DateTime<Utc>) -> String {
        let mut v = self.inner.lock().expect("memory storage mutex poisoned");
        push(&mut v, record, stored_at)
    }

    pub fn snapshot(&self) -> Vec<StoredArticle> {
        self.inner
            .lock()
            .expect("memory storage mutex poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory storage mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct stories stored.
    pub fn story_count(&self) -> usize {
        let v = self.inner.lock().expect("memory storage mutex poisoned");
        let mut ids: Vec<&str> = v.iter().map(|a| a.record.story_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[async_trait]
impl StorageCollaborator for MemoryStorage {
    async fn link_exists(&self, url: &str) -> Result<bool> {
        let v = self.inner.lock().expect("memory storage mutex poisoned");
        Ok(v.iter().any(|a| a.record.link == url))
    }

    async fn get_recent_stories(&self, horizon_hours: u32) -> Result<Vec<StorySnapshot>> {
        let cutoff = Utc::now() - Duration::hours(i64::from(horizon_hours));
        let rows: Vec<StoredRow> = {
            let v = self.inner.lock().expect("memory storage mutex poisoned");
            v.iter()
                .filter(|a| a.stored_at >= cutoff)
                .map(|a| StoredRow {
                    story_id: Some(a.record.story_id.clone()),
                    keywords: a.record.keywords.clone(),
                    title: a.record.title.clone(),
                    category: Some(a.record.category.as_str().to_string()),
                    is_primary_article: a.record.is_primary_article,
                })
                .collect()
        };
        Ok(collapse_rows(rows))
    }

    async fn create_article(&self, record: &ArticleRecord) -> Result<String> {
        let mut v = self.inner.lock().expect("memory storage mutex poisoned");
        if v.iter().any(|a| a.record.link == record.link) {
            return Err(Error::storage(Some(409), format!("duplicate link {}", record.link)));
        }
        if v.iter().any(|a| a.record.story_id == record.story_id) {
            return Err(Error::storage(
                Some(409),
                format!("story {} already exists", record.story_id),
            ));
        }
        Ok(push(&mut v, record.clone(), Utc::now()))
    }

    async fn append_article(&self, record: &ArticleRecord, story_id: &str) -> Result<String> {
        if record.story_id != story_id {
            return Err(Error::parse(format!(
                "record story_id {} does not match target story {story_id}",
                record.story_id
            )));
        }
        let mut v = self.inner.lock().expect("memory storage mutex poisoned");
        if v.iter().any(|a| a.record.link == record.link) {
            return Err(Error::storage(Some(409), format!("duplicate link {}", record.link)));
        }
        if !v.iter().any(|a| a.record.story_id == story_id) {
            return Err(Error::storage(Some(404), format!("unknown story {story_id}")));
        }
        Ok(push(&mut v, record.clone(), Utc::now()))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn push(v: &mut Vec<StoredArticle>, record: ArticleRecord, stored_at: DateTime<Utc>) -> String {
    let id = format!("mem-{}", v.len() + 1);
    v.push(StoredArticle {
        id: id.clone(),
        record,
        stored_at,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;

    fn rec(link: &str, story: &str, primary: bool) -> ArticleRecord {
        ArticleRecord {
            timestamp: "2025-01-01T00:00:00Z".into(),
            text_content: "t".into(),
            source: "Test".into(),
            link: link.into(),
            title: "title".into(),
            category: Category::Economy,
            story_id: story.into(),
            keywords: vec!["metro".into()],
            is_primary_article: primary,
        }
    }

    #[tokio::test]
    async fn create_then_append_then_exists() {
        let s = MemoryStorage::new();
        s.create_article(&rec("https://a/1", "s1", true)).await.unwrap();
        s.append_article(&rec("https://a/2", "s1", false), "s1").await.unwrap();
        assert!(s.link_exists("https://a/2").await.unwrap());
        assert!(!s.link_exists("https://a/3").await.unwrap());
        assert_eq!(s.story_count(), 1);
        assert_eq!(s.get_recent_stories(24).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_to_unknown_story_is_storage_error() {
        let s = MemoryStorage::new();
        let err = s
            .append_article(&rec("https://a/2", "nope", false), "nope")
            .await
            .unwrap_err();
        assert_eq!(err, Error::storage(Some(404), "unknown story nope"));
    }

    #[tokio::test]
    async fn horizon_excludes_old_stories() {
        let s = MemoryStorage::new();
        s.insert_at(rec("https://a/old", "old", true), Utc::now() - Duration::hours(30));
        s.insert_at(rec("https://a/new", "new", true), Utc::now() - Duration::hours(1));
        let ids: Vec<_> = s
            .get_recent_stories(24)
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.story_id)
            .collect();
        assert_eq!(ids, vec!["new"]);
    }

    #[tokio::test]
    async fn duplicate_create_rejected() {
        let s = MemoryStorage::new();
        s.create_article(&rec("https://a/1", "s1", true)).await.unwrap();
        let err = s.create_article(&rec("https://a/1", "s2", true)).await.unwrap_err();
        assert!(matches!(err, Error::Storage { status: Some(409), .. }));
    }
}
