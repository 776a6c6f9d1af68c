//! Refresh command handler

use crate::config::Config;
use crate::state::SharedState;
use std::time::Duration;

pub async fn cmd_refresh(config: &Config, source: &str) -> anyhow::Result<()> {
    let (state, receiver) = SharedState::new(config.clone()).await?;
    let orchestrator = state.registry.resolve(source)?;

    // Reconciliation writes are queued; drain them before exiting.
    let workers = state.spawn_workers(receiver);

    println!("Refreshing {}...", orchestrator.source().display_name());
    let summary = orchestrator.full_refresh().await?;

    if !state.jobs.wait_idle(Duration::from_secs(120)).await {
        println!(
            "Warning: {} background jobs still pending",
            state.jobs.pending_count()
        );
    }
    workers.abort();

    println!(
        "✓ {} pages refreshed, {} failed",
        summary.pages_refreshed, summary.pages_failed
    );
    println!(
        "  Titles in catalog: {}",
        state.store.count_titles(orchestrator.source()).await?
    );

    Ok(())
}
