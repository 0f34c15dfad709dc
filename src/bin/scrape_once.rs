//! One-shot scrape: runs every configured source once and prints the run report as JSON.

use std::sync::Arc;

use news_story_clusterer::{build_orchestrator, build_storage, sources::load_sources, ClusterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = ClusterConfig::load()?;
    let storage = build_storage(&cfg)?;
    let orchestrator = Arc::new(build_orchestrator(&cfg, load_sources()?, storage)?);

    let report = orchestrator.run_once().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
