use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use pulse_analysis::{AuthorResolver, Engine, IdentityRuntime};
use pulse_config::PulseConfig;
use pulse_core::{AuthorId, AuthorIdentity};
use pulse_store::SqliteStore;

use crate::cli::OutputFormat;

fn open_resolver(workspace: &Path, config: PulseConfig) -> Result<(SqliteStore, AuthorResolver)> {
    let identities = IdentityRuntime::from_config(&config.identity);
    let engine = Engine::new(workspace, config, identities)
        .context("failed to build calculation engine")?;
    let store = SqliteStore::open(workspace).context("failed to initialize local store")?;
    Ok((store, engine.resolver()))
}

pub fn run_authors(
    workspace: &Path,
    config: PulseConfig,
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let (store, resolver) = open_resolver(workspace, config)?;
    let identities = resolver
        .list(&store)
        .context("failed to list author identities")?;
    write_identities(&identities, output, out)
}

pub fn run_merge_authors(
    workspace: &Path,
    config: PulseConfig,
    keep: AuthorId,
    merge: &[AuthorId],
    out: &mut dyn Write,
) -> Result<()> {
    let (store, resolver) = open_resolver(workspace, config)?;
    let merged = resolver
        .merge(&store, keep, merge)
        .with_context(|| format!("failed to merge identities into {keep}"))?;

    tracing::info!(keep, merged = merge.len(), "merged author identities");
    writeln!(
        out,
        "merged {} identities into {} ({} aliases)",
        merge.len(),
        merged.id,
        merged.aliases.len()
    )?;
    Ok(())
}

pub fn run_dedupe_authors(
    workspace: &Path,
    config: PulseConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let (store, resolver) = open_resolver(workspace, config)?;
    let survivors = resolver
        .deduplicate(&store)
        .context("failed to deduplicate author identities")?;

    if survivors.is_empty() {
        writeln!(out, "no duplicate identities found")?;
        return Ok(());
    }
    for identity in &survivors {
        writeln!(
            out,
            "kept {} {} ({} aliases)",
            identity.id,
            display_name(identity),
            identity.aliases.len()
        )?;
    }
    Ok(())
}

pub fn write_identities(
    identities: &[AuthorIdentity],
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    match output {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, identities)
                .context("failed to serialize identities")?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            writeln!(out, "id\tname\temail\taliases")?;
            for identity in identities {
                writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    identity.id,
                    display_name(identity),
                    normalize_table_field(identity.email.as_deref().unwrap_or("-")),
                    identity.aliases.len()
                )?;
            }
        }
    }
    Ok(())
}

fn display_name(identity: &AuthorIdentity) -> String {
    normalize_table_field(identity.name.as_deref().unwrap_or("-"))
}

fn normalize_table_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use pulse_core::AuthorAlias;
    use pulse_store::IdentityStore;
    use tempfile::tempdir;

    use super::*;

    fn seed(workspace: &Path, aliases: &[(&str, &str)]) -> Vec<AuthorId> {
        let store = SqliteStore::open(workspace).expect("open store");
        aliases
            .iter()
            .map(|(name, email)| {
                store
                    .create_identity(&AuthorAlias::new(name, email, None))
                    .expect("create identity")
                    .id
            })
            .collect()
    }

    #[test]
    fn authors_table_lists_every_identity() {
        let temp = tempdir().expect("tempdir");
        seed(temp.path(), &[("Jane Doe", "jane@co.com"), ("Bob Stone", "bob@co.com")]);

        let mut out = Vec::new();
        run_authors(
            temp.path(),
            PulseConfig::default(),
            OutputFormat::Table,
            &mut out,
        )
        .expect("list authors");
        let rendered = String::from_utf8(out).expect("utf8");
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id\tname\temail\taliases");
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().any(|line| line.contains("bob@co.com")));
    }

    #[test]
    fn merge_folds_aliases_into_kept_identity() {
        let temp = tempdir().expect("tempdir");
        let ids = seed(
            temp.path(),
            &[("Jane Doe", "jane@co.com"), ("J. Doe", "jd@home.net")],
        );

        let mut out = Vec::new();
        run_merge_authors(
            temp.path(),
            PulseConfig::default(),
            ids[0],
            &ids[1..],
            &mut out,
        )
        .expect("merge authors");

        let store = SqliteStore::open(temp.path()).expect("open store");
        let identities = store.list_identities().expect("identities");
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].id, ids[0]);
        assert_eq!(identities[0].aliases.len(), 2);
    }

    #[test]
    fn dedupe_reports_when_nothing_matches() {
        let temp = tempdir().expect("tempdir");
        seed(temp.path(), &[("Jane Doe", "jane@co.com"), ("Bob Stone", "bob@co.com")]);

        let mut out = Vec::new();
        run_dedupe_authors(temp.path(), PulseConfig::default(), &mut out).expect("dedupe");
        assert_eq!(
            String::from_utf8(out).expect("utf8").trim(),
            "no duplicate identities found"
        );
    }
}
