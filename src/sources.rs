// src/sources.rs
//! # Source table and article extraction
//!
//! Every publisher is a typed `SourceConfig`: landing-page URL, priority, CSS
//! selectors for the article containers and their fields, and a URL-path →
//! category table.
//!
//! - Loads from TOML (`$SOURCES_CONFIG_PATH` or `config/sources.toml`).
//! - Falls back to the built-in `default_seed()` when no file exists.
//! - Selectors are compiled at load time so a typo fails startup, not a run.
//!
//! Extraction is pure: HTML in, validated `Article`s out.

use anyhow::{bail, Context};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::article::{clean_text, Article};
use crate::category::{classify, Category, PathRule};
use crate::error::{Error, Result};
use crate::keywords::KeywordExtractor;

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const ENV_SOURCES_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// Container for one article teaser.
    pub articles: String,
    pub headline: String,
    /// Element carrying `href`, searched inside the container.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub key: String,
    pub name: String,
    pub url: String,
    /// Lower runs first.
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub selectors: Selectors,
    #[serde(default)]
    pub category_map: Vec<PathRule>,
    #[serde(default)]
    pub default_category: Category,
}

fn default_priority() -> u32 {
    999
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default, rename = "source")]
    sources: Vec<SourceConfig>,
}

impl SourceConfig {
    fn selector(&self, field: &str, css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| {
            Error::parse(format!("{}: invalid {field} selector `{css}`: {e}", self.key))
        })
    }

    /// Check the landing URL and compile every selector.
    pub fn validate(&self) -> anyhow::Result<()> {
        let u = Url::parse(&self.url)
            .with_context(|| format!("source {}: invalid url `{}`", self.key, self.url))?;
        if !matches!(u.scheme(), "http" | "https") {
            bail!("source {}: url must be http(s), got `{}`", self.key, self.url);
        }
        self.selector("articles", &self.selectors.articles)?;
        self.selector("headline", &self.selectors.headline)?;
        self.selector("link", &self.selectors.link)?;
        if let Some(s) = &self.selectors.summary {
            self.selector("summary", s)?;
        }
        Ok(())
    }
}

/// URLs already handed to the pipeline during one orchestrator run.
#[derive(Debug, Default)]
pub struct RunScope {
    seen: HashSet<String>,
}

impl RunScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`; false if it was already seen in this run.
    pub fn mark(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Resolve the source table: env path (must exist), then the default path, then the seed.
/// Result is sorted by priority; equal priorities keep file order.
pub fn load_sources() -> anyhow::Result<Vec<SourceConfig>> {
    let sources = match std::env::var(ENV_SOURCES_CONFIG_PATH) {
        Ok(p) => {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_SOURCES_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            load_sources_from_path(&pb)?
        }
        Err(_) => {
            let default = PathBuf::from(DEFAULT_SOURCES_PATH);
            if default.exists() {
                load_sources_from_path(&default)?
            } else {
                info!(target: "sources", "no sources file, using built-in seed");
                sorted(default_seed())
            }
        }
    };
    Ok(sources)
}

pub fn load_sources_from_path(path: &Path) -> anyhow::Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    parse_sources_toml(&content).with_context(|| format!("parsing sources {}", path.display()))
}

pub fn parse_sources_toml(s: &str) -> anyhow::Result<Vec<SourceConfig>> {
    let file: SourcesFile = toml::from_str(s)?;
    if file.sources.is_empty() {
        bail!("no [[source]] entries");
    }
    let mut keys = HashSet::new();
    for src in &file.sources {
        if !keys.insert(src.key.as_str()) {
            bail!("duplicate source key `{}`", src.key);
        }
        src.validate()?;
    }
    Ok(sorted(file.sources))
}

fn sorted(mut v: Vec<SourceConfig>) -> Vec<SourceConfig> {
    v.sort_by_key(|s| s.priority);
    v
}

fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Pull articles out of a source landing page.
///
/// Only the first `max_articles` containers are considered. Containers without a
/// headline or link, headlines under 10 chars, non-http(s) links and URLs already
/// in `scope` are skipped. Fails only on an unparseable selector.
pub fn extract_articles(
    html: &str,
    source: &SourceConfig,
    extractor: &KeywordExtractor,
    max_articles: usize,
    scope: &mut RunScope,
) -> Result<Vec<Article>> {
    let base = Url::parse(&source.url)
        .map_err(|e| Error::parse(format!("{}: invalid url `{}`: {e}", source.key, source.url)))?;
    let articles_sel = source.selector("articles", &source.selectors.articles)?;
    let headline_sel = source.selector("headline", &source.selectors.headline)?;
    let link_sel = source.selector("link", &source.selectors.link)?;
    let summary_sel = match &source.selectors.summary {
        Some(s) => Some(source.selector("summary", s)?),
        None => None,
    };

    let document = Html::parse_document(html);
    let containers: Vec<ElementRef<'_>> = document.select(&articles_sel).collect();
    debug!(
        target: "sources",
        source = %source.key,
        containers = containers.len(),
        "article containers found"
    );

    let mut out = Vec::new();
    for el in containers.into_iter().take(max_articles) {
        let Some(headline_el) = el.select(&headline_sel).next() else {
            continue;
        };
        let headline = element_text(headline_el);

        let Some(href) = el
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
        else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            debug!(target: "sources", source = %source.key, %href, "unresolvable link");
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let url = resolved.to_string();
        if scope.contains(&url) {
            continue;
        }

        let summary = summary_sel
            .as_ref()
            .and_then(|s| el.select(s).next())
            .map(element_text)
            .unwrap_or_default();

        let category = classify(&url, &headline, &source.category_map, source.default_category);

        match Article::new(&headline, &url, &source.name, &summary, category, extractor) {
            Ok(article) => {
                scope.mark(&article.url);
                out.push(article);
            }
            Err(e) => {
                debug!(target: "sources", source = %source.key, %url, error = %e, "skipping element");
            }
        }
    }

    if out.is_empty() {
        warn!(target: "sources", source = %source.key, "no valid articles extracted");
    }
    Ok(out)
}

/// Built-in source table.
pub fn default_seed() -> Vec<SourceConfig> {
    fn src(
        key: &str,
        name: &str,
        url: &str,
        priority: u32,
        sel: [&str; 4],
        rules: &[(&str, Category)],
        default_category: Category,
    ) -> SourceConfig {
        SourceConfig {
            key: key.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            priority,
            selectors: Selectors {
                articles: sel[0].to_string(),
                headline: sel[1].to_string(),
                link: sel[2].to_string(),
                summary: Some(sel[3].to_string()),
            },
            category_map: rules.iter().map(|(p, c)| PathRule::new(p, *c)).collect(),
            default_category,
        }
    }

    use Category::*;
    vec![
        src(
            "the_national",
            "The National",
            "https://www.thenationalnews.com",
            1,
            [
                "article, .card, .story-card",
                "h1, h2, h3, .headline, .card__title a, .story-card__title a",
                "a[href]",
                ".standfirst, .summary, .excerpt, .card__excerpt",
            ],
            &[
                ("/business", Economy),
                ("/uae", Regional),
                ("/world", Politics),
                ("/sport", Sports),
                ("/lifestyle", Lifestyle),
                ("/arts-culture", Entertainment),
            ],
            General,
        ),
        src(
            "gulf_news",
            "Gulf News",
            "https://gulfnews.com",
            1,
            [
                ".story-card, .article-item, .news-item",
                ".story-card__headline a, .headline a, h3 a, h2 a",
                ".story-card__headline a, .headline a, h3 a, h2 a",
                ".story-card__summary, .excerpt, .summary",
            ],
            &[
                ("/business", Economy),
                ("/uae", Regional),
                ("/world", Politics),
                ("/sport", Sports),
                ("/lifestyle", Lifestyle),
                ("/technology", Technology),
            ],
            General,
        ),
        src(
            "khaleej_times",
            "Khaleej Times",
            "https://khaleejtimes.com",
            1,
            [
                ".story-card, .news-card, article",
                ".story-title a, .headline a, h3 a, h2 a",
                ".story-title a, .headline a, h3 a, h2 a",
                ".story-summary, .excerpt",
            ],
            &[
                ("/business", Economy),
                ("/uae", Regional),
                ("/world", Politics),
                ("/sport", Sports),
                ("/lifestyle", Lifestyle),
            ],
            General,
        ),
        src(
            "wam_news",
            "Emirates News Agency (WAM)",
            "https://wam.ae/en",
            1,
            [
                ".news-item, .article-card, article",
                ".news-title a, h3 a, h2 a",
                ".news-title a, h3 a, h2 a",
                ".news-summary, .excerpt",
            ],
            &[],
            Official,
        ),
        src(
            "arabian_business",
            "Arabian Business",
            "https://www.arabianbusiness.com",
            1,
            [
                ".article-card, .story-card, article",
                ".article-title a, .headline a, h3 a",
                ".article-title a, .headline a, h3 a",
                ".article-excerpt, .summary",
            ],
            &[("/technology", Technology), ("/", Economy)],
            Economy,
        ),
        src(
            "zawya",
            "Zawya",
            "https://www.zawya.com",
            1,
            [
                ".story-card, .news-item, article",
                ".story-title a, h3 a, h2 a",
                ".story-title a, h3 a, h2 a",
                ".story-summary, .excerpt",
            ],
            &[("/", Economy)],
            Economy,
        ),
        src(
            "gulf_business",
            "Gulf Business",
            "https://gulfbusiness.com",
            1,
            [
                ".post, .article-item, article",
                ".post-title a, h3 a, h2 a",
                ".post-title a, h3 a, h2 a",
                ".post-excerpt, .excerpt",
            ],
            &[("/technology", Technology), ("/", Economy)],
            Economy,
        ),
        src(
            "al_arabiya",
            "Al Arabiya English",
            "https://english.alarabiya.net",
            2,
            [
                ".article-item, .news-card, article",
                ".article-title a, h2 a, h3 a",
                ".article-title a, h2 a, h3 a",
                ".article-excerpt, .summary",
            ],
            &[
                ("/business", Economy),
                ("/politics", Politics),
                ("/sports", Sports),
            ],
            General,
        ),
        src(
            "arab_news",
            "Arab News",
            "https://www.arabnews.com",
            2,
            [
                ".article-item, .story-card, article",
                ".article-title a, h3 a, h2 a",
                ".article-title a, h3 a, h2 a",
                ".article-summary, .excerpt",
            ],
            &[
                ("/business", Economy),
                ("/saudi-arabia", Regional),
                ("/sports", Sports),
            ],
            General,
        ),
        src(
            "dubai_media_office",
            "Dubai Media Office",
            "https://www.mediaoffice.ae",
            4,
            [
                ".news-item, .press-release, article",
                ".news-title a, h3 a, h2 a",
                ".news-title a, h3 a, h2 a",
                ".news-summary, .excerpt",
            ],
            &[],
            Official,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceConfig {
        SourceConfig {
            key: "test".into(),
            name: "Test Times".into(),
            url: "https://news.test/home".into(),
            priority: 1,
            selectors: Selectors {
                articles: ".card".into(),
                headline: "h3".into(),
                link: "a[href]".into(),
                summary: Some(".excerpt".into()),
            },
            category_map: vec![PathRule::new("/business", Category::Economy)],
            default_category: Category::General,
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="card">
            <h3>Dubai Metro expansion announced</h3>
            <a href="/business/metro-expansion">read</a>
            <p class="excerpt">Phase two adds &amp; extends lines.</p>
          </div>
          <div class="card">
            <h3>Short</h3>
            <a href="/business/short">read</a>
          </div>
          <div class="card">
            <h3>Newsletter signup available now</h3>
            <a href="mailto:desk@news.test">mail</a>
          </div>
          <div class="card">
            <h3>Container without any link</h3>
          </div>
          <div class="card">
            <h3>Football league final set for Friday</h3>
            <a href="https://other.test/sport/final">read</a>
          </div>
        </body></html>
    "#;

    #[test]
    fn extracts_valid_articles_and_skips_the_rest() {
        let ex = KeywordExtractor::default();
        let mut scope = RunScope::new();
        let out = extract_articles(PAGE, &source(), &ex, 20, &mut scope).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://news.test/business/metro-expansion");
        assert_eq!(out[0].category, Category::Economy);
        assert_eq!(out[0].summary, "Phase two adds & extends lines.");
        assert_eq!(out[0].source, "Test Times");
        assert_eq!(out[1].url, "https://other.test/sport/final");
        assert_eq!(out[1].category, Category::Sports);
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn urls_seen_in_run_are_skipped() {
        let ex = KeywordExtractor::default();
        let mut scope = RunScope::new();
        scope.mark("https://news.test/business/metro-expansion");
        let out = extract_articles(PAGE, &source(), &ex, 20, &mut scope).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://other.test/sport/final");
    }

    #[test]
    fn max_articles_caps_containers() {
        let ex = KeywordExtractor::default();
        let mut scope = RunScope::new();
        let out = extract_articles(PAGE, &source(), &ex, 1, &mut scope).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn bad_selector_is_parse_error() {
        let mut s = source();
        s.selectors.articles = "div[".into();
        let mut scope = RunScope::new();
        let err = extract_articles(PAGE, &s, &KeywordExtractor::default(), 20, &mut scope)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(s.validate().is_err());
    }

    #[test]
    fn seed_is_valid_and_priority_sorted() {
        let seed = sorted(default_seed());
        assert!(!seed.is_empty());
        for s in &seed {
            s.validate().unwrap();
        }
        assert!(seed.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn toml_table_parses_and_sorts() {
        let toml = r#"
            [[source]]
            key = "b"
            name = "B"
            url = "https://b.test"
            priority = 2
            [source.selectors]
            articles = "article"
            headline = "h2"
            link = "a"

            [[source]]
            key = "a"
            name = "A"
            url = "https://a.test"
            priority = 1
            default_category = "official"
            [source.selectors]
            articles = "article"
            headline = "h2"
            link = "a"
            [[source.category_map]]
            path = "/sport"
            category = "sports"
        "#;
        let v = parse_sources_toml(toml).unwrap();
        assert_eq!(v[0].key, "a");
        assert_eq!(v[0].default_category, Category::Official);
        assert_eq!(v[0].category_map, vec![PathRule::new("/sport", Category::Sports)]);
        assert_eq!(v[1].selectors.summary, None);
    }

    #[test]
    fn duplicate_keys_rejected() {
        let toml = r#"
            [[source]]
            key = "a"
            name = "A"
            url = "https://a.test"
            [source.selectors]
            articles = "article"
            headline = "h2"
            link = "a"

            [[source]]
            key = "a"
            name = "A2"
            url = "https://a2.test"
            [source.selectors]
            articles = "article"
            headline = "h2"
            link = "a"
        "#;
        assert!(parse_sources_toml(toml).is_err());
    }
}
