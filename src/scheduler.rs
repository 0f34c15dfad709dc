// src/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::orchestrator::Orchestrator;

/// Spawn a loop that runs a full scrape every `interval_secs`.
/// The first run happens immediately. Returns `None` when `interval_secs` is 0.
pub fn spawn_scrape_scheduler(
    orchestrator: Arc<Orchestrator>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!(target: "scheduler", "periodic scraping disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = orchestrator.run_once().await;
            counter!("scrape_runs_total").increment(1);
            tracing::info!(
                target: "scheduler",
                posted = report.articles_posted,
                failed_sources = report.failed_sources,
                "scheduled scrape tick"
            );
        }
    }))
}
