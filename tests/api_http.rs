// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /scraper/status
// - GET /scraper/sources
// - POST /scraper/run?wait=true
// - POST /scraper/run while a run holds the lock → 409

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use news_story_clusterer::api::{self, AppState};
use news_story_clusterer::fetch::StaticFetcher;
use news_story_clusterer::orchestrator::Orchestrator;
use news_story_clusterer::sources::default_seed;
use news_story_clusterer::storage::MemoryStorage;
use news_story_clusterer::{ArticlePipeline, ClusterConfig};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    test_app().0
}

fn test_app() -> (Router, Arc<Orchestrator>) {
    let cfg = Arc::new(ClusterConfig::default());
    let pipeline = Arc::new(ArticlePipeline::from_config(&cfg, Arc::new(MemoryStorage::new())));
    let orchestrator = Arc::new(Orchestrator::new(
        default_seed(),
        Arc::new(StaticFetcher::new()),
        pipeline,
        cfg.keyword_extractor(),
        cfg.scraper.max_articles_per_source,
    ));
    let app = api::router(AppState {
        config: cfg,
        orchestrator: orchestrator.clone(),
    });
    (app, orchestrator)
}

fn post_run(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .expect("build POST /scraper/run")
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = test_router().oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "OK");
}

#[tokio::test]
async fn api_status_exposes_clustering_settings() {
    let (status, v) = get_json(test_router(), "/scraper/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["similarity_threshold"], 0.4);
    assert_eq!(v["clustering_hours_back"], 24);
    assert_eq!(v["storage"], "memory");
    assert_eq!(v["storage_healthy"], true);
    assert_eq!(v["running"], false);
    assert!(v["last_run"].is_null());
    assert_eq!(v["sources_configured"], default_seed().len());
}

#[tokio::test]
async fn api_sources_lists_priority_ordered_table() {
    let (status, v) = get_json(test_router(), "/scraper/sources").await;
    assert_eq!(status, StatusCode::OK);
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), default_seed().len());
    let priorities: Vec<u64> = arr.iter().map(|s| s["priority"].as_u64().unwrap()).collect();
    assert!(priorities.windows(2).all(|w| w[0] <= w[1]));
    let wam = arr
        .iter()
        .find(|s| s["key"] == "wam_news")
        .expect("wam listed");
    assert_eq!(wam["categories"], serde_json::json!(["official"]));
}

#[tokio::test]
async fn api_run_wait_returns_report() {
    let app = test_router();
    let req = Request::builder()
        .method("POST")
        .uri("/scraper/run?wait=true")
        .body(Body::empty())
        .expect("build POST /scraper/run");
    let resp = app.oneshot(req).await.expect("oneshot /scraper/run");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read json");
    let v: Json = serde_json::from_slice(&bytes).expect("parse run report");
    // No pages are served, so every source fails but the run completes.
    assert_eq!(v["total_sources"], default_seed().len());
    assert_eq!(v["failed_sources"], default_seed().len());
    assert_eq!(v["articles_posted"], 0);
    assert_eq!(v["sources"][0]["status"], "failed");
}

#[tokio::test]
async fn api_run_conflicts_while_lock_is_held() {
    let (app, orch) = test_app();
    let guard = orch.try_begin_run().expect("lock free");

    for uri in ["/scraper/run", "/scraper/run?wait=true"] {
        let resp = app.clone().oneshot(post_run(uri)).await.expect("oneshot");
        assert_eq!(resp.status(), StatusCode::CONFLICT, "{uri}");
        let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
            .await
            .expect("read body");
        let v: Json = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(v["status"], "already_running");
    }
    let (_, v) = get_json(app.clone(), "/scraper/status").await;
    assert_eq!(v["running"], true);
    assert!(orch.try_begin_run().is_none());

    drop(guard);
    let resp = app.oneshot(post_run("/scraper/run")).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    // The background run releases the lock and publishes its report.
    for _ in 0..200 {
        if orch.last_report().is_some() && !orch.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(orch.last_report().is_some());
    assert!(orch.try_begin_run().is_some());
}
