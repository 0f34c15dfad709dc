//! News Story Clusterer — Binary Entrypoint
//! Boots the Axum HTTP server, the periodic scrape scheduler, and `/metrics`.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_story_clusterer::{
    api::{self, AppState},
    build_orchestrator, build_storage,
    metrics::Metrics,
    scheduler::spawn_scrape_scheduler,
    sources::load_sources,
    ClusterConfig,
};

/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_story_clusterer=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Shuttle may already have installed a subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Arc::new(ClusterConfig::load()?);
    let sources = load_sources()?;
    let storage = build_storage(&cfg)?;
    tracing::info!(
        target: "startup",
        storage = storage.name(),
        sources = sources.len(),
        threshold = cfg.clustering.similarity_threshold,
        hours_back = cfg.clustering.hours_back,
        "configuration loaded"
    );

    let metrics = Metrics::init(&cfg)?;
    let orchestrator = Arc::new(build_orchestrator(&cfg, sources, storage)?);
    spawn_scrape_scheduler(orchestrator.clone(), cfg.scraper.interval_secs);

    let state = AppState {
        config: cfg,
        orchestrator,
    };
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
