use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::DateTime;
use pulse_core::{CalculatedCommit, RepositoryId};
use pulse_store::SqliteStore;

use crate::cli::OutputFormat;

pub const MAX_REPORT_LIMIT: u32 = 1_000;

pub fn run_report(
    workspace: &Path,
    repo_id: RepositoryId,
    limit: u32,
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let limit = limit.clamp(1, MAX_REPORT_LIMIT);
    let store = SqliteStore::open(workspace).context("failed to initialize local store")?;
    let commits = store
        .list_calculated_commits(repo_id, Some(limit))
        .with_context(|| format!("failed to read calculated commits for repository {repo_id}"))?;

    match output {
        OutputFormat::Table => write_commit_table(&commits, out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &commits)
                .context("failed to serialize report")?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_commit_table(
    commits: &[CalculatedCommit],
    out: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        out,
        "commit_id\tauthored_at\taid\tauthor\tloc_i\tloc_d\tuploc\tnfiles\thours\tvelocity\tflags"
    )?;

    for commit in commits {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{}",
            normalize_table_field(&commit.commit_id),
            format_timestamp(commit.atime),
            commit.aid,
            normalize_table_field(&commit.aname),
            commit.loc_i_c,
            commit.loc_d_c,
            commit.uploc_c,
            commit.nfiles,
            commit.hours,
            commit.velocity,
            commit_flags(commit)
        )?;
    }

    Ok(())
}

fn commit_flags(commit: &CalculatedCommit) -> String {
    let flags = [
        (commit.is_merge, "merge"),
        (commit.is_bugfix, "bugfix"),
        (commit.is_pr_open, "pr-open"),
        (commit.is_pr_closed, "pr-closed"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect::<Vec<_>>();

    if flags.is_empty() {
        "-".to_owned()
    } else {
        flags.join(",")
    }
}

fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|timestamp| timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn normalize_table_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use pulse_core::{OutlierSums, TimeRange};
    use pulse_store::CalculatedStore;
    use tempfile::tempdir;

    use super::*;

    fn calculated(commit_id: &str, atime: i64) -> CalculatedCommit {
        CalculatedCommit {
            repo_id: 4,
            commit_id: commit_id.to_owned(),
            atime,
            aid: 1,
            aname: "Jane\tDoe".to_owned(),
            aemail: "jane@co.com".to_owned(),
            ctime: atime,
            cid: 1,
            cname: "Jane Doe".to_owned(),
            cemail: "jane@co.com".to_owned(),
            nparents: 1,
            message: "fix: crash".to_owned(),
            tree_id: String::new(),
            is_merge: false,
            is_bugfix: true,
            age: -1,
            loc_i_c: 12,
            loc_d_c: 3,
            comp_i_c: 4,
            comp_d_c: 1,
            uploc_c: 0,
            nfiles: 1,
            segments: OutlierSums::default(),
            loc_effort_c: 12.6,
            hours_measured: 0.0,
            hours_estimated: 0.5,
            hours: 0.5,
            velocity_measured: 0.0,
            velocity: 25.2,
            is_pr_exists: true,
            is_pr_open: false,
            is_pr_closed: true,
        }
    }

    #[test]
    fn table_has_stable_header_and_sanitized_columns() {
        let mut out = Vec::new();
        write_commit_table(&[calculated("c1", 86_400)], &mut out).expect("write table");
        let rendered = String::from_utf8(out).expect("utf8 output");
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("commit_id\tauthored_at\taid"));
        let columns = lines[1].split('\t').collect::<Vec<_>>();
        assert_eq!(columns.len(), 11);
        assert_eq!(columns[1], "1970-01-02T00:00:00Z");
        assert_eq!(columns[3], "Jane Doe");
        assert_eq!(columns[8], "0.50");
        assert_eq!(columns[10], "bugfix,pr-closed");
    }

    #[test]
    fn report_reads_most_recent_commits_first() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");
        store
            .persist_window(
                4,
                TimeRange::new(0, 1_000),
                &[calculated("old", 100), calculated("new", 200)],
                &[],
            )
            .expect("persist window");

        let mut out = Vec::new();
        run_report(temp.path(), 4, 0, OutputFormat::Json, &mut out).expect("report");
        let parsed: Vec<CalculatedCommit> =
            serde_json::from_slice(&out).expect("report should be json");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].commit_id, "new");
    }
}
