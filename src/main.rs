mod config;
mod logging;
mod model;
mod providers;
mod sync;

use anyhow::{Context, Result};
use tracing::{error, info};

use providers::freshdesk::FreshdeskSource;
use providers::github::GithubTracker;
use providers::IssueTracker;
use sync::bootstrap::{self, BootstrapError};
use sync::SyncEngine;

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = run().await {
        // A schema bootstrap failure means the helpdesk may be missing
        // fields the sync writes, so it gets its own exit status.
        if err.is::<BootstrapError>() {
            error!(error = %err, "helpdesk schema bootstrap failed");
            std::process::exit(2);
        }
        error!(error = %err, "sync failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = config::load_config()?;
    let api_key = config
        .freshdesk
        .api_key
        .clone()
        .context("missing Freshdesk API key")?;
    let token = config.github.token.clone().context("missing GitHub token")?;

    let source = FreshdeskSource::new(config.freshdesk.domain.clone(), api_key);
    let tracker = GithubTracker::new(&config.github, &config.board, token);

    // Repositories and board fields feed both the bootstrap and the pass
    // itself, so fetch them once.
    let repositories = tracker.list_repositories().await?;
    let project_fields = tracker.project_fields().await?;
    info!(
        repositories = repositories.len(),
        board_fields = project_fields.len(),
        "resolved sync scope"
    );

    bootstrap::ensure_schema(&source, &tracker, &project_fields, &repositories, &config.board)
        .await?;

    let engine = SyncEngine::new(&source, &tracker, &config);
    let stats = engine.run(&repositories, &project_fields).await?;
    info!(?stats, "reconciliation pass complete");
    Ok(())
}
