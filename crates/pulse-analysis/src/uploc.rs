//! Unproductive lines of code: insertions that a later commit deleted again
//! within the grace period.

use std::collections::HashMap;

use pulse_core::{RawPatchRewrite, normalize_path};

use crate::commits::PreparedCommit;
use crate::patches::WorkingPatch;

pub type UplocTotals = HashMap<(String, String), i64>;

pub fn accumulate(
    rewrites: &[RawPatchRewrite],
    commits: &[PreparedCommit],
    grace_secs: i64,
) -> UplocTotals {
    let is_merge = commits
        .iter()
        .map(|commit| (commit.raw.commit_id.as_str(), commit.is_merge))
        .collect::<HashMap<_, _>>();
    let non_merge = |id: &str| is_merge.get(id).is_some_and(|merge| !merge);

    let mut totals = UplocTotals::new();
    for rewrite in rewrites {
        if !non_merge(rewrite.commit_id.as_str())
            || !non_merge(rewrite.rewritten_commit_id.as_str())
        {
            continue;
        }
        let gap = rewrite.atime - rewrite.rewritten_atime;
        if !(0..grace_secs).contains(&gap) {
            continue;
        }
        *totals
            .entry((
                rewrite.rewritten_commit_id.clone(),
                normalize_path(&rewrite.newpath),
            ))
            .or_default() += rewrite.loc_d.max(0);
    }
    totals
}

pub fn apply(patches: &mut [WorkingPatch], totals: &UplocTotals) {
    for patch in patches {
        patch.uploc = if patch.is_merge {
            0
        } else {
            let key = (patch.raw.commit_id.clone(), patch.raw.newpath.clone());
            totals
                .get(&key)
                .copied()
                .unwrap_or(0)
                .min(patch.raw.loc_i)
                .max(0)
        };
    }
}
