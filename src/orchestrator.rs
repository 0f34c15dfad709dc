// src/orchestrator.rs
//! Source scrape orchestration: fetch each source page in priority order, extract
//! articles, push them through the pipeline, and summarize the run.
//!
//! A failing source never aborts the run. The seen-URL set lives for one run only.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::category::Category;
use crate::error::ErrorKind;
use crate::fetch::PageFetcher;
use crate::keywords::KeywordExtractor;
use crate::pipeline::{ArticleFailure, ArticlePipeline};
use crate::sources::{extract_articles, RunScope, SourceConfig};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "scrape_source_errors_total",
            "Sources whose page could not be fetched or parsed."
        );
        describe_counter!(
            "scrape_rate_limit_hits_total",
            "Source pages or storage calls answered with 429."
        );
        describe_counter!(
            "scrape_articles_found_total",
            "Articles extracted from source pages."
        );
        describe_histogram!("scrape_run_duration_ms", "Wall time of one scrape run.");
        describe_gauge!("scrape_last_run_ts", "Unix ts when the last scrape run finished.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub url: String,
    pub status: SourceStatus,
    pub articles_found: usize,
    /// Created or merged.
    pub articles_posted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// Fetch/extract error, if the page never made it to the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_status: Option<u16>,
    pub failures: Vec<ArticleFailure>,
}

impl SourceReport {
    fn new(source: &SourceConfig) -> Self {
        Self {
            source: source.name.clone(),
            url: source.url.clone(),
            status: SourceStatus::Failed,
            articles_found: 0,
            articles_posted: 0,
            skipped: 0,
            failed: 0,
            elapsed_ms: 0,
            error: None,
            error_kind: None,
            error_status: None,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub found: usize,
    pub posted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub total_sources: usize,
    pub successful_sources: usize,
    pub partial_sources: usize,
    pub failed_sources: usize,
    /// Percentage of sources with status `success`.
    pub success_rate: f64,
    pub articles_found: usize,
    pub articles_posted: usize,
    pub articles_skipped: usize,
    pub articles_failed: usize,
    pub by_category: BTreeMap<Category, CategorySummary>,
    /// Source-level and per-article errors, by kind.
    pub errors_by_kind: BTreeMap<ErrorKind, usize>,
    /// Responses with status 429, from source pages or the storage API.
    pub rate_limit_hits: usize,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    fn summarize(
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        sources: Vec<SourceReport>,
        by_category: BTreeMap<Category, CategorySummary>,
    ) -> Self {
        let count = |s: SourceStatus| sources.iter().filter(|r| r.status == s).count();
        let successful_sources = count(SourceStatus::Success);
        let partial_sources = count(SourceStatus::Partial);
        let failed_sources = count(SourceStatus::Failed);
        let total_sources = sources.len();
        let success_rate = if total_sources == 0 {
            0.0
        } else {
            successful_sources as f64 * 100.0 / total_sources as f64
        };

        let mut errors_by_kind: BTreeMap<ErrorKind, usize> = BTreeMap::new();
        let mut rate_limit_hits = 0;
        for r in &sources {
            let source_error = r.error_kind.map(|k| (k, r.error_status));
            let article_errors = r.failures.iter().map(|f| (f.kind, f.status));
            for (kind, status) in source_error.into_iter().chain(article_errors) {
                *errors_by_kind.entry(kind).or_default() += 1;
                if status == Some(429) {
                    rate_limit_hits += 1;
                }
            }
        }

        Self {
            started_at,
            elapsed_ms,
            total_sources,
            successful_sources,
            partial_sources,
            failed_sources,
            success_rate,
            articles_found: sources.iter().map(|r| r.articles_found).sum(),
            articles_posted: sources.iter().map(|r| r.articles_posted).sum(),
            articles_skipped: sources.iter().map(|r| r.skipped).sum(),
            articles_failed: sources.iter().map(|r| r.failed).sum(),
            by_category,
            errors_by_kind,
            rate_limit_hits,
            sources,
        }
    }
}

/// Status of one source from its article counts.
///
/// Nothing found or nothing handled is a failure; any per-article failure
/// alongside handled articles is partial. Duplicates count as handled.
pub fn source_status(found: usize, handled: usize, failed: usize) -> SourceStatus {
    if found == 0 || handled == 0 {
        SourceStatus::Failed
    } else if failed > 0 {
        SourceStatus::Partial
    } else {
        SourceStatus::Success
    }
}

/// Exclusive right to run a scrape. Dropping it lets the next run start.
pub struct RunGuard {
    _lock: tokio::sync::OwnedMutexGuard<()>,
}

pub struct Orchestrator {
    sources: Vec<SourceConfig>,
    fetcher: Arc<dyn PageFetcher>,
    pipeline: Arc<ArticlePipeline>,
    extractor: KeywordExtractor,
    max_articles_per_source: usize,
    run_lock: Arc<tokio::sync::Mutex<()>>,
    last_report: RwLock<Option<RunReport>>,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<SourceConfig>,
        fetcher: Arc<dyn PageFetcher>,
        pipeline: Arc<ArticlePipeline>,
        extractor: KeywordExtractor,
        max_articles_per_source: usize,
    ) -> Self {
        let mut sources = sources;
        sources.sort_by_key(|s| s.priority);
        Self {
            sources,
            fetcher,
            pipeline,
            extractor,
            max_articles_per_source,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            last_report: RwLock::new(None),
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn pipeline(&self) -> &Arc<ArticlePipeline> {
        &self.pipeline
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report
            .read()
            .expect("last report lock poisoned")
            .clone()
    }

    /// Take the run lock without waiting; `None` while another run holds it.
    pub fn try_begin_run(&self) -> Option<RunGuard> {
        self.run_lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(|lock| RunGuard { _lock: lock })
    }

    /// Run every source once. Concurrent calls queue behind the running one.
    pub async fn run_once(&self) -> RunReport {
        let guard = RunGuard {
            _lock: self.run_lock.clone().lock_owned().await,
        };
        self.run_with(guard).await
    }

    /// Run every source once under an already acquired lock.
    pub async fn run_with(&self, guard: RunGuard) -> RunReport {
        ensure_metrics_described();
        let _guard = guard;

        let started_at = Utc::now();
        let t0 = Instant::now();
        let mut scope = RunScope::new();
        let mut reports = Vec::with_capacity(self.sources.len());
        let mut by_category: BTreeMap<Category, CategorySummary> = BTreeMap::new();

        info!(target: "orchestrator", sources = self.sources.len(), "scrape run started");
        for source in &self.sources {
            let (report, found, posted) = self.scrape_source(source, &mut scope).await;
            for (cat, n) in found {
                by_category.entry(cat).or_default().found += n;
            }
            for (cat, n) in posted {
                by_category.entry(cat).or_default().posted += n;
            }
            reports.push(report);
        }

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        let report = RunReport::summarize(started_at, elapsed_ms, reports, by_category);

        histogram!("scrape_run_duration_ms").record(elapsed_ms as f64);
        gauge!("scrape_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "orchestrator",
            elapsed_ms,
            successful = report.successful_sources,
            partial = report.partial_sources,
            failed = report.failed_sources,
            found = report.articles_found,
            posted = report.articles_posted,
            success_rate = report.success_rate,
            rate_limit_hits = report.rate_limit_hits,
            "scrape run finished"
        );

        *self.last_report.write().expect("last report lock poisoned") = Some(report.clone());
        report
    }

    async fn scrape_source(
        &self,
        source: &SourceConfig,
        scope: &mut RunScope,
    ) -> (SourceReport, HashMap<Category, usize>, HashMap<Category, usize>) {
        let t0 = Instant::now();
        let mut report = SourceReport::new(source);

        let extracted = match self.fetcher.fetch(&source.url).await {
            Ok(html) => extract_articles(
                &html,
                source,
                &self.extractor,
                self.max_articles_per_source,
                scope,
            ),
            Err(e) => Err(e),
        };

        let articles = match extracted {
            Ok(a) => a,
            Err(e) => {
                error!(
                    target: "orchestrator",
                    source = %source.key,
                    kind = e.kind().as_str(),
                    error = %e,
                    "source failed"
                );
                counter!(
                    "scrape_source_errors_total",
                    "source" => source.key.clone(),
                    "kind" => e.kind().as_str()
                )
                .increment(1);
                report.error = Some(e.to_string());
                report.error_kind = Some(e.kind());
                report.error_status = e.status();
                if e.is_rate_limited() {
                    counter!("scrape_rate_limit_hits_total").increment(1);
                }
                report.elapsed_ms = t0.elapsed().as_millis() as u64;
                return (report, HashMap::new(), HashMap::new());
            }
        };

        let mut found_by_category: HashMap<Category, usize> = HashMap::new();
        for a in &articles {
            *found_by_category.entry(a.category).or_default() += 1;
        }
        report.articles_found = articles.len();
        counter!("scrape_articles_found_total").increment(articles.len() as u64);

        let batch = self.pipeline.process_batch(articles).await;
        report.articles_posted = batch.processed;
        report.skipped = batch.skipped;
        report.failed = batch.failed;
        let rate_limited = batch.failures.iter().filter(|f| f.status == Some(429)).count();
        report.failures = batch.failures;
        report.status = source_status(
            report.articles_found,
            batch.processed + batch.skipped,
            batch.failed,
        );
        report.elapsed_ms = t0.elapsed().as_millis() as u64;
        if rate_limited > 0 {
            counter!("scrape_rate_limit_hits_total").increment(rate_limited as u64);
        }

        if report.status == SourceStatus::Success {
            info!(
                target: "orchestrator",
                source = %source.key,
                found = report.articles_found,
                posted = report.articles_posted,
                skipped = report.skipped,
                elapsed_ms = report.elapsed_ms,
                "source done"
            );
        } else {
            warn!(
                target: "orchestrator",
                source = %source.key,
                status = ?report.status,
                found = report.articles_found,
                posted = report.articles_posted,
                failed = report.failed,
                "source finished with problems"
            );
        }

        (report, found_by_category, batch.by_category)
    }
}
