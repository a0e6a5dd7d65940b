use std::collections::{HashMap, HashSet};

use pulse_config::MetricsConfig;
use pulse_core::{
    AuthorId, CalculatedCommit, OutlierSums, RawPullRequestCommit, loc_effort, median, safe_ratio,
};

use crate::commits::PreparedCommit;
use crate::patches::WorkingPatch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PatchTotals {
    loc_i: i64,
    loc_d: i64,
    comp_i: i64,
    comp_d: i64,
    uploc: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PullRequestFlags {
    exists: bool,
    open: bool,
    closed: bool,
}

pub fn aggregate(
    commits: Vec<PreparedCommit>,
    patches: &[WorkingPatch],
    segments: &HashMap<String, OutlierSums>,
    pull_request_commits: &[RawPullRequestCommit],
    metrics: &MetricsConfig,
) -> Vec<CalculatedCommit> {
    let mut totals = HashMap::<&str, PatchTotals>::new();
    let mut paths = HashMap::<&str, HashSet<&str>>::new();
    for patch in patches {
        let commit_id = patch.raw.commit_id.as_str();
        let entry = totals.entry(commit_id).or_default();
        entry.loc_i += patch.raw.loc_i;
        entry.loc_d += patch.raw.loc_d;
        entry.comp_i += patch.raw.comp_i;
        entry.comp_d += patch.raw.comp_d;
        entry.uploc += patch.uploc;
        paths
            .entry(commit_id)
            .or_default()
            .insert(patch.raw.newpath.as_str());
    }

    let mut pull_requests = HashMap::<&str, PullRequestFlags>::new();
    for link in pull_request_commits {
        let flags = pull_requests.entry(link.commit_id.as_str()).or_default();
        flags.exists = true;
        flags.open |= !link.state.is_closed();
        flags.closed |= link.state.is_closed();
    }

    let velocities = commits
        .iter()
        .map(|commit| {
            let sums = totals
                .get(commit.raw.commit_id.as_str())
                .copied()
                .unwrap_or_default();
            safe_ratio(loc_effort(sums.loc_i, sums.loc_d), commit.hours_measured)
        })
        .collect::<Vec<_>>();
    let baselines = author_baselines(&commits, &velocities, metrics);

    commits
        .into_iter()
        .zip(velocities)
        .map(|(commit, velocity_measured)| {
            let commit_id = commit.raw.commit_id.as_str();
            let sums = totals.get(commit_id).copied().unwrap_or_default();
            let nfiles = paths.get(commit_id).map_or(0, HashSet::len) as i64;
            let segments = segments.get(commit_id).copied().unwrap_or_default();
            let pull_request = pull_requests.get(commit_id).copied().unwrap_or_default();

            let loc_effort_c = loc_effort(sums.loc_i, sums.loc_d);
            let hours_estimated =
                estimate_hours(sums.loc_i, baselines.get(&commit.aid).copied(), metrics);
            let hours = bounded_hours(commit.hours_measured, hours_estimated, metrics);

            let raw = commit.raw;
            CalculatedCommit {
                repo_id: raw.repo_id,
                atime: raw.atime,
                aid: commit.aid,
                aname: raw.aname,
                aemail: raw.aemail,
                ctime: raw.ctime,
                cid: commit.cid,
                cname: raw.cname,
                cemail: raw.cemail,
                nparents: raw.nparents,
                message: raw.message,
                tree_id: raw.tree_id,
                is_merge: commit.is_merge,
                is_bugfix: commit.is_bugfix,
                age: commit.age,
                loc_i_c: sums.loc_i,
                loc_d_c: sums.loc_d,
                comp_i_c: sums.comp_i,
                comp_d_c: sums.comp_d,
                uploc_c: sums.uploc,
                nfiles,
                segments,
                loc_effort_c,
                hours_measured: commit.hours_measured,
                hours_estimated,
                hours,
                velocity_measured,
                velocity: safe_ratio(loc_effort_c, hours),
                is_pr_exists: pull_request.exists,
                is_pr_open: pull_request.open,
                is_pr_closed: pull_request.closed,
                commit_id: raw.commit_id,
            }
        })
        .collect()
}

fn author_baselines(
    commits: &[PreparedCommit],
    velocities: &[f64],
    metrics: &MetricsConfig,
) -> HashMap<AuthorId, f64> {
    let mut samples = HashMap::<AuthorId, Vec<f64>>::new();
    for (commit, velocity) in commits.iter().zip(velocities) {
        let measured = commit.hours_measured;
        if commit.is_merge
            || measured <= metrics.baseline_min_hours
            || measured > metrics.baseline_max_hours
        {
            continue;
        }
        samples.entry(commit.aid).or_default().push(*velocity);
    }

    samples
        .into_iter()
        .filter_map(|(aid, velocities)| median(&velocities).map(|baseline| (aid, baseline)))
        .collect()
}

fn estimate_hours(loc_i: i64, baseline: Option<f64>, metrics: &MetricsConfig) -> f64 {
    match baseline {
        Some(baseline) => safe_ratio(loc_i as f64, baseline).max(metrics.min_hours),
        None => metrics.min_hours,
    }
}

fn bounded_hours(measured: f64, estimated: f64, metrics: &MetricsConfig) -> f64 {
    let hours = if measured > 0.0 {
        measured.min(estimated)
    } else {
        estimated
    };
    hours.max(metrics.min_hours).min(metrics.max_hours)
}
