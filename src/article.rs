// src/article.rs
//! Article, story snapshot and storage record types.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{Error, Result};
use crate::keywords::{KeywordExtractor, KeywordSet};

pub const MIN_HEADLINE_CHARS: usize = 10;
pub const MAX_CLEAN_TEXT_CHARS: usize = 500;

/// Opaque story identifier, minted by this crate when an article founds a story.
pub type StoryId = String;

pub fn mint_story_id() -> StoryId {
    uuid::Uuid::new_v4().to_string()
}

/// A freshly extracted article. Consumed once by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub headline: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub summary: String,
    pub category: Category,
    pub keywords: KeywordSet,
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Build an article from raw extracted text. Headline and summary are cleaned,
    /// keywords are derived from `headline + " " + summary`.
    pub fn new(
        headline: &str,
        url: &str,
        source: &str,
        summary: &str,
        category: Category,
        extractor: &KeywordExtractor,
    ) -> Result<Self> {
        let headline = clean_text(headline);
        if headline.chars().count() < MIN_HEADLINE_CHARS {
            return Err(Error::parse(format!(
                "headline shorter than {MIN_HEADLINE_CHARS} chars: `{headline}`"
            )));
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| Error::parse(format!("invalid article url `{url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::parse(format!("article url is not http(s): `{url}`")));
        }

        let summary = clean_text(summary);
        let keywords = extractor.extract(&format!("{headline} {summary}"));

        Ok(Self {
            headline,
            url: parsed.to_string(),
            source: source.to_string(),
            summary,
            category,
            keywords,
            scraped_at: Utc::now(),
        })
    }

    /// Build the storage record for this article.
    pub fn to_record(&self, story_id: &str, is_primary_article: bool) -> ArticleRecord {
        let text_content = if self.summary.is_empty() {
            self.headline.clone()
        } else {
            self.summary.clone()
        };
        ArticleRecord {
            timestamp: self.scraped_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            text_content,
            source: self.source.clone(),
            link: self.url.clone(),
            title: self.headline.clone(),
            category: self.category,
            story_id: story_id.to_string(),
            keywords: self.keywords.iter().cloned().collect(),
            is_primary_article,
        }
    }
}

/// Latest known state of a story, as returned by the storage tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySnapshot {
    pub story_id: StoryId,
    /// Keyword set of the founding article; the comparison basis for candidates.
    pub keywords: KeywordSet,
    pub category: Category,
    #[serde(default)]
    pub title: String,
}

/// Wire record sent to the storage API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub timestamp: String,
    pub text_content: String,
    pub source: String,
    pub link: String,
    pub title: String,
    pub category: Category,
    pub story_id: StoryId,
    /// Sorted; `KeywordSet` iteration order.
    pub keywords: Vec<String>,
    pub is_primary_article: bool,
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_ARTIFACTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+(share( this( story| article)?)?|tweet|email|print|read more|continue reading)[\s\W]*$",
    )
    .expect("artifact regex")
});

/// Clean extracted text: decode entities, collapse whitespace, drop trailing
/// share/read-more artifacts, cap at 500 chars.
pub fn clean_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let decoded = html_escape::decode_html_entities(s);
    let collapsed = RE_WS.replace_all(&decoded, " ");
    // Artifacts only count at the very end; peel them off one at a time.
    let mut out = collapsed.trim().to_string();
    loop {
        let next = RE_ARTIFACTS.replace(&out, "").trim_end().to_string();
        if next.len() == out.len() {
            break;
        }
        out = next;
    }

    if out.chars().count() > MAX_CLEAN_TEXT_CHARS {
        out.chars().take(MAX_CLEAN_TEXT_CHARS).collect()
    } else {
        out
    }
}
