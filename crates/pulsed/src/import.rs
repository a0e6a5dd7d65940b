use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pulse_core::WindowData;
use pulse_store::SqliteStore;

/// Reads a JSON document of raw records and upserts them into the store.
pub fn run_import(workspace: &Path, path: &Path, out: &mut dyn Write) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read raw records from {}", path.display()))?;
    let data: WindowData = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse raw records in {}", path.display()))?;

    let store = SqliteStore::open(workspace).context("failed to initialize local store")?;
    store
        .import_raw(&data)
        .context("failed to import raw records")?;

    tracing::info!(
        path = %path.display(),
        commits = data.commits.len(),
        patches = data.patches.len(),
        "imported raw records"
    );
    writeln!(
        out,
        "imported commits={} patches={} rewrites={} pull_request_commits={}",
        data.commits.len(),
        data.patches.len(),
        data.rewrites.len(),
        data.pull_request_commits.len()
    )?;
    Ok(())
}
