use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use pulse_analysis::{
    CancellationToken, Engine, EngineError, IdentityRuntime, RecalculateOutcome,
};
use pulse_config::PulseConfig;
use pulse_core::RepositoryId;
use pulse_store::SqliteStore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculateRequest {
    pub repositories: Vec<RepositoryId>,
    pub all: bool,
    pub horizon_end: Option<i64>,
}

/// Recalculates every requested repository, one blocking task per
/// repository. Identity state is shared across tasks; each task opens its
/// own store connection.
pub fn run_recalculate(
    workspace: &Path,
    config: PulseConfig,
    request: RecalculateRequest,
    out: &mut dyn Write,
) -> Result<()> {
    let mut repositories = if request.all {
        SqliteStore::open(workspace)
            .context("failed to initialize local store")?
            .list_repositories()
            .context("failed to list repositories")?
    } else {
        request.repositories
    };
    repositories.sort_unstable();
    repositories.dedup();

    if repositories.is_empty() {
        writeln!(out, "no repositories to recalculate")?;
        return Ok(());
    }

    let identities = IdentityRuntime::from_config(&config.identity);
    let cancellation = CancellationToken::new();
    let engine = Arc::new(
        Engine::new(workspace, config, identities)
            .context("failed to build calculation engine")?
            .with_cancellation(cancellation.clone()),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let results = runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after current windows");
                cancellation.cancel();
            }
        });
        recalculate_all(engine, repositories, request.horizon_end).await
    })?;

    let mut failures = 0usize;
    for (repo_id, result) in &results {
        match result {
            Ok(outcome) => write_outcome(outcome, out)?,
            Err(err) => {
                failures += 1;
                writeln!(out, "repository={repo_id} status=failed error=\"{err}\"")?;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!(
            "{failures} of {} repositories failed to recalculate",
            results.len()
        ));
    }
    Ok(())
}

pub async fn recalculate_all(
    engine: Arc<Engine>,
    repositories: Vec<RepositoryId>,
    horizon_end: Option<i64>,
) -> Result<Vec<(RepositoryId, Result<RecalculateOutcome, EngineError>)>> {
    let mut tasks = JoinSet::new();
    for repo_id in repositories {
        let engine = Arc::clone(&engine);
        tasks.spawn_blocking(move || {
            let result = match horizon_end {
                Some(horizon_end) => engine.recalculate_until(repo_id, horizon_end),
                None => engine.recalculate(repo_id),
            };
            (repo_id, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("recalculation task panicked")?);
    }
    results.sort_by_key(|(repo_id, _)| *repo_id);
    Ok(results)
}

fn write_outcome(outcome: &RecalculateOutcome, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        out,
        "repository={} status=ok windows={} skipped={} commits={} patches={}",
        outcome.repo_id,
        outcome.windows_processed,
        outcome.windows_skipped,
        outcome.commits_written,
        outcome.patches_written
    )
}
