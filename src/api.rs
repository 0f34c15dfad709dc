// src/api.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::category::Category;
use crate::config::ClusterConfig;
use crate::orchestrator::{Orchestrator, RunReport};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClusterConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/scraper/status", get(scraper_status))
        .route("/scraper/sources", get(scraper_sources))
        .route("/scraper/run", post(scraper_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResp {
    running: bool,
    storage: &'static str,
    storage_healthy: bool,
    similarity_threshold: f64,
    clustering_hours_back: u32,
    sources_configured: usize,
    scrape_interval_secs: u64,
    last_run: Option<RunReport>,
}

async fn scraper_status(State(state): State<AppState>) -> Json<StatusResp> {
    let orch = &state.orchestrator;
    let pipeline = orch.pipeline();
    let storage_healthy = match pipeline.storage().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(target: "api", error = %e, "storage health check failed");
            false
        }
    };
    Json(StatusResp {
        running: orch.is_running(),
        storage: pipeline.storage().name(),
        storage_healthy,
        similarity_threshold: pipeline.threshold(),
        clustering_hours_back: pipeline.hours_back(),
        sources_configured: orch.sources().len(),
        scrape_interval_secs: state.config.scraper.interval_secs,
        last_run: orch.last_report(),
    })
}

#[derive(Serialize)]
struct SourceInfo {
    key: String,
    name: String,
    url: String,
    priority: u32,
    categories: Vec<Category>,
}

async fn scraper_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    let out = state
        .orchestrator
        .sources()
        .iter()
        .map(|s| {
            let mut categories: Vec<Category> =
                s.category_map.iter().map(|r| r.category).collect();
            categories.push(s.default_category);
            categories.sort();
            categories.dedup();
            SourceInfo {
                key: s.key.clone(),
                name: s.name.clone(),
                url: s.url.clone(),
                priority: s.priority,
                categories,
            }
        })
        .collect();
    Json(out)
}

#[derive(Deserialize, Default)]
struct RunParams {
    /// Run in the foreground and return the report.
    #[serde(default)]
    wait: bool,
}

async fn scraper_run(State(state): State<AppState>, Query(params): Query<RunParams>) -> Response {
    let orch = state.orchestrator.clone();
    let Some(guard) = orch.try_begin_run() else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "status": "already_running" })),
        )
            .into_response();
    };

    if params.wait {
        let report = orch.run_with(guard).await;
        return Json(report).into_response();
    }

    // The guard moves into the task, so the lock is held until the run ends.
    tokio::spawn(async move {
        orch.run_with(guard).await;
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "started" })),
    )
        .into_response()
}
