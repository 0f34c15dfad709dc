// src/category.rs
//! Article categories and the rule that assigns them.
//!
//! Category is a hard partition for clustering: stories never absorb articles
//! from another category.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Economy,
    Technology,
    Politics,
    Sports,
    Lifestyle,
    Entertainment,
    Regional,
    Official,
    General,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Economy,
        Category::Technology,
        Category::Politics,
        Category::Sports,
        Category::Lifestyle,
        Category::Entertainment,
        Category::Regional,
        Category::Official,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Economy => "economy",
            Category::Technology => "technology",
            Category::Politics => "politics",
            Category::Sports => "sports",
            Category::Lifestyle => "lifestyle",
            Category::Entertainment => "entertainment",
            Category::Regional => "regional",
            Category::Official => "official",
            Category::General => "general",
        }
    }

    /// Lenient parse for values coming back from storage: unknown names are `General`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category `{s}`"))
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::General
    }
}

/// One entry of a source's URL-path → category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub path: String,
    pub category: Category,
}

impl PathRule {
    pub fn new(path: &str, category: Category) -> Self {
        Self {
            path: path.to_string(),
            category,
        }
    }
}

// Headline vocabulary, checked in this order. Substring match on the lowercased headline.
const HEADLINE_VOCAB: &[(Category, &[&str])] = &[
    (
        Category::Economy,
        &[
            "economy", "business", "financial", "market", "investment", "bank", "banking",
            "fund", "revenue", "profit", "economic", "finance", "money", "currency", "trade",
            "export", "import", "gdp", "inflation", "stock", "shares",
        ],
    ),
    (
        Category::Technology,
        &[
            "technology", "tech", "digital", "artificial intelligence", "startup",
            "innovation", "software", "platform", "online", "internet", "cyber", "cloud",
            "blockchain", "cryptocurrency",
        ],
    ),
    (
        Category::Politics,
        &[
            "government", "minister", "president", "politics", "policy", "parliament",
            "election", "summit", "diplomatic", "visa", "regulation", "legislation",
            "cabinet",
        ],
    ),
    (
        Category::Sports,
        &[
            "sport", "football", "soccer", "tennis", "golf", "cricket", "racing",
            "championship", "tournament", "olympic", "fifa", "league",
        ],
    ),
    (
        Category::Lifestyle,
        &[
            "lifestyle", "culture", "music", "fashion", "food", "travel", "entertainment",
            "celebrity", "festival", "exhibition", "restaurant", "hotel", "tourism",
        ],
    ),
];

/// One whole-word alternation per category, in `HEADLINE_VOCAB` order.
/// A trailing plural "s" is accepted.
static HEADLINE_PATTERNS: Lazy<Vec<(Category, Regex)>> = Lazy::new(|| {
    HEADLINE_VOCAB
        .iter()
        .map(|(category, vocab)| {
            let alts: Vec<String> = vocab.iter().map(|w| regex::escape(w)).collect();
            let re = Regex::new(&format!(r"\b(?:{})s?\b", alts.join("|")))
                .expect("headline vocabulary regex");
            (*category, re)
        })
        .collect()
});

/// Assign a category.
///
/// Order: first URL path rule contained in the lowercased URL, then headline
/// vocabulary, then the source's fallback (usually `General`).
pub fn classify(url: &str, headline: &str, path_rules: &[PathRule], fallback: Category) -> Category {
    let url_lower = url.to_lowercase();
    if let Some(rule) = path_rules
        .iter()
        .find(|r| url_lower.contains(&r.path.to_lowercase()))
    {
        return rule.category;
    }

    let headline_lower = headline.to_lowercase();
    for (category, re) in HEADLINE_PATTERNS.iter() {
        if re.is_match(&headline_lower) {
            return *category;
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip_and_lenient() {
        assert_eq!("Economy".parse::<Category>().unwrap(), Category::Economy);
        assert!("weather".parse::<Category>().is_err());
        assert_eq!(Category::parse_lenient("weather"), Category::General);
        assert_eq!(Category::Official.to_string(), "official");
    }

    #[test]
    fn url_path_wins_over_headline() {
        let rules = vec![PathRule::new("/sport", Category::Sports)];
        let c = classify(
            "https://example.ae/sport/2025/bank-cup-final",
            "Bank cup final draws record crowd",
            &rules,
            Category::General,
        );
        assert_eq!(c, Category::Sports);
    }

    #[test]
    fn first_matching_rule_is_used() {
        let rules = vec![
            PathRule::new("/technology", Category::Technology),
            PathRule::new("/", Category::Economy),
        ];
        assert_eq!(
            classify("https://gulfbusiness.com/technology/x", "x", &rules, Category::General),
            Category::Technology
        );
        assert_eq!(
            classify("https://gulfbusiness.com/markets/x", "x", &rules, Category::General),
            Category::Economy
        );
    }

    #[test]
    fn headline_vocabulary_order() {
        // "market" (economy) is checked before "football" (sports).
        let c = classify("https://x.test/a", "Football transfer market heats up", &[], Category::General);
        assert_eq!(c, Category::Economy);
        let c = classify("https://x.test/a", "Cricket league expands", &[], Category::General);
        assert_eq!(c, Category::Sports);
    }

    #[test]
    fn vocabulary_matches_whole_words_only() {
        for h in [
            "RTA opens new public transport corridor to Expo City",
            "Important changes to school calendar announced",
            "Colleagues honour veteran teacher at Sharjah school",
            "Residents embracing solar panels on villa rooftops",
        ] {
            assert_eq!(classify("https://x.test/a", h, &[], Category::General), Category::General, "{h}");
        }
        assert_eq!(
            classify("https://x.test/a", "Sports city hosts youth games", &[], Category::General),
            Category::Sports
        );
        assert_eq!(
            classify("https://x.test/a", "Artificial intelligence rules drafted", &[], Category::General),
            Category::Technology
        );
    }

    #[test]
    fn falls_back_when_nothing_matches() {
        let c = classify("https://x.test/a", "Weather stays mild", &[], Category::Official);
        assert_eq!(c, Category::Official);
    }
}
