// src/keywords.rs
//! Keyword extraction: raw article text → normalized set of significant terms.
//!
//! Clustering only looks at presence/absence of terms, so the output is a set.
//! Normalization keeps word characters, whitespace and the Arabic block
//! (U+0600–U+06FF); everything else becomes whitespace.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// Normalized, deduplicated keyword set. `BTreeSet` keeps iteration deterministic.
pub type KeywordSet = BTreeSet<String>;

pub const DEFAULT_MIN_TOKEN_LEN: usize = 3;

/// Generic English function words.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us",
    "them", "my", "your", "his", "its", "our", "their", "from", "into", "over", "after",
    "about", "than", "then", "also", "not", "who", "what", "when", "where", "which", "how",
];

/// Newsroom boilerplate that appears in every outlet's copy.
const NEWS_STOP_WORDS: &[&str] = &[
    "news", "report", "reports", "says", "said", "according", "sources", "breaking",
    "latest", "update", "today", "yesterday", "new", "first", "reuters", "bloomberg",
    "associated", "press",
];

/// Region names that would otherwise dominate every article's keyword set.
const REGIONAL_STOP_WORDS: &[&str] = &[
    "uae", "dubai", "abu", "dhabi", "emirates", "gulf", "middle", "east", "mena", "arab",
    "arabic", "region", "regional",
];

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\x{0600}-\x{06FF}]").expect("keyword char-class regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Lowercase stop-word list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for w in words {
            let w = w.as_ref().trim().to_lowercase();
            if !w.is_empty() {
                self.words.insert(w);
            }
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::from_words(
            ENGLISH_STOP_WORDS
                .iter()
                .chain(NEWS_STOP_WORDS)
                .chain(REGIONAL_STOP_WORDS),
        )
    }
}

/// Configured extractor. Cheap to share behind an `Arc`; holds no mutable state.
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stop_words: StopWords,
    min_token_len: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(StopWords::default(), DEFAULT_MIN_TOKEN_LEN)
    }
}

impl KeywordExtractor {
    pub fn new(stop_words: StopWords, min_token_len: usize) -> Self {
        Self {
            stop_words,
            min_token_len: min_token_len.max(1),
        }
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Extract the keyword set. Never fails; empty or junk input yields an empty set.
    pub fn extract(&self, text: &str) -> KeywordSet {
        if text.trim().is_empty() {
            return KeywordSet::new();
        }

        let lowered = text.to_lowercase();
        let cleaned = RE_DISALLOWED.replace_all(&lowered, " ");
        let collapsed = RE_WS.replace_all(&cleaned, " ");

        collapsed
            .split_whitespace()
            .filter(|w| self.keep(w))
            .map(str::to_string)
            .collect()
    }

    fn keep(&self, word: &str) -> bool {
        word.chars().count() >= self.min_token_len
            && !word.chars().all(char::is_numeric)
            && !self.stop_words.contains(word)
    }
}

/// Extract keywords with the built-in stop-word list.
pub fn extract_keywords(text: &str) -> KeywordSet {
    static DEFAULT: Lazy<KeywordExtractor> = Lazy::new(KeywordExtractor::default);
    DEFAULT.extract(text)
}
