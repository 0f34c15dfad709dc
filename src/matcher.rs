// src/matcher.rs
//! # Story Matcher
//! Pure logic that maps `(candidate keywords, category, recent stories)` → matching story.
//! No I/O, no mutation; the recent-story window is supplied by the caller.
//!
//! Policy: category is a hard gate; among same-category stories the best Jaccard
//! score wins if it clears the threshold. Ties keep the story encountered first,
//! so the result depends only on input order.

use serde::Serialize;
use tracing::debug;

use crate::article::{StoryId, StorySnapshot};
use crate::category::Category;
use crate::keywords::KeywordSet;
use crate::similarity::similarity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryMatch {
    pub story_id: StoryId,
    pub similarity: f64,
}

/// Best-match-above-threshold search.
pub fn find_matching_story(
    keywords: &KeywordSet,
    category: Category,
    recent_stories: &[StorySnapshot],
    threshold: f64,
) -> Option<StoryMatch> {
    let mut best: Option<(&StorySnapshot, f64)> = None;

    for story in recent_stories.iter().filter(|s| s.category == category) {
        let score = similarity(keywords, &story.keywords);
        // Zero overlap is never evidence, even with a 0.0 threshold.
        if score <= 0.0 || score < threshold {
            continue;
        }
        // Strictly better only: the first story at the max score is kept.
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((story, score));
        }
    }

    best.map(|(story, score)| {
        debug!(
            target: "matcher",
            story_id = %story.story_id,
            similarity = score,
            "story match"
        );
        StoryMatch {
            story_id: story.story_id.clone(),
            similarity: score,
        }
    })
}

/// Matcher bound to a configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct StoryMatcher {
    threshold: f64,
}

impl StoryMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn find(
        &self,
        keywords: &KeywordSet,
        category: Category,
        recent_stories: &[StorySnapshot],
    ) -> Option<StoryMatch> {
        find_matching_story(keywords, category, recent_stories, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> KeywordSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn story(id: &str, words: &[&str], category: Category) -> StorySnapshot {
        StorySnapshot {
            story_id: id.to_string(),
            keywords: kw(words),
            category,
            title: String::new(),
        }
    }

    #[test]
    fn picks_best_not_first_above_threshold() {
        let candidate = kw(&["a", "b", "c", "d"]);
        // s1: 3/5 = 0.6, s2: 4/5 = 0.8
        let stories = vec![
            story("s1", &["a", "b", "c", "x"], Category::Economy),
            story("s2", &["a", "b", "c", "d", "y"], Category::Economy),
        ];
        let m = find_matching_story(&candidate, Category::Economy, &stories, 0.4).unwrap();
        assert_eq!(m.story_id, "s2");
        assert!((m.similarity - 0.8).abs() < 1e-12);
    }

    #[test]
    fn category_gate_dominates_score() {
        let candidate = kw(&["a", "b", "c", "d"]);
        let stories = vec![story("s1", &["a", "b", "c", "d", "y"], Category::Sports)];
        assert!(find_matching_story(&candidate, Category::Politics, &stories, 0.4).is_none());
    }

    #[test]
    fn below_threshold_is_no_match() {
        let candidate = kw(&["a", "b", "c"]);
        let stories = vec![story("s1", &["a", "x", "y", "z"], Category::General)];
        // 1/6
        assert!(find_matching_story(&candidate, Category::General, &stories, 0.4).is_none());
    }

    #[test]
    fn threshold_is_inclusive() {
        let candidate = kw(&["metro", "expansion", "announced"]);
        let stories = vec![story("s1", &["metro", "expansion", "phase"], Category::Economy)];
        let m = find_matching_story(&candidate, Category::Economy, &stories, 0.5).unwrap();
        assert_eq!(m.story_id, "s1");
    }

    #[test]
    fn ties_keep_first_encountered() {
        let candidate = kw(&["a", "b"]);
        let stories = vec![
            story("first", &["a", "b", "x"], Category::General),
            story("second", &["a", "b", "y"], Category::General),
        ];
        let m = find_matching_story(&candidate, Category::General, &stories, 0.1).unwrap();
        assert_eq!(m.story_id, "first");

        let reversed: Vec<_> = stories.into_iter().rev().collect();
        let m = find_matching_story(&candidate, Category::General, &reversed, 0.1).unwrap();
        assert_eq!(m.story_id, "second");
    }

    #[test]
    fn empty_candidate_never_matches() {
        let stories = vec![story("s1", &["a"], Category::General)];
        assert!(find_matching_story(&KeywordSet::new(), Category::General, &stories, 0.0).is_none());
    }

    #[test]
    fn bound_matcher_uses_its_threshold() {
        let m = StoryMatcher::new(0.9);
        let stories = vec![story("s1", &["a", "b", "c"], Category::General)];
        assert!(m.find(&kw(&["a", "b"]), Category::General, &stories).is_none());
        assert_eq!(m.threshold(), 0.9);
    }
}
