use std::collections::HashMap;

use pulse_config::MetricsConfig;
use pulse_core::{AuthorId, RepositoryId, SECONDS_PER_DAY, safe_ratio};

use crate::patches::WorkingPatch;

pub fn is_new_code(loc_i: i64, loc_d: i64, min_loc: i64, min_ratio: f64) -> bool {
    loc_i >= min_loc && (loc_d == 0 || safe_ratio(loc_i as f64, loc_d as f64) >= min_ratio)
}

pub fn classify(patches: &mut [WorkingPatch], metrics: &MetricsConfig) {
    let window_secs = i64::from(metrics.collaboration_window_days) * SECONDS_PER_DAY;

    let mut by_path = HashMap::<(RepositoryId, String), Vec<usize>>::new();
    for (position, patch) in patches.iter_mut().enumerate() {
        patch.is_collaboration = false;
        patch.is_new_code = false;
        if patch.is_merge {
            continue;
        }
        patch.is_new_code = is_new_code(
            patch.raw.loc_i,
            patch.raw.loc_d,
            metrics.new_code_min_loc,
            metrics.new_code_min_ratio,
        );
        by_path
            .entry((patch.raw.repo_id, patch.raw.newpath.clone()))
            .or_default()
            .push(position);
    }

    for mut positions in by_path.into_values() {
        positions.sort_by_key(|position| patches[*position].atime);
        let flags = scan_path(&positions, patches, window_secs);
        for (position, collaborative) in positions.into_iter().zip(flags) {
            patches[position].is_collaboration = collaborative;
        }
    }
}

fn scan_path(positions: &[usize], patches: &[WorkingPatch], window_secs: i64) -> Vec<bool> {
    let atime = |index: usize| patches[positions[index]].atime;
    let aid = |index: usize| patches[positions[index]].aid;

    let mut authors = HashMap::<AuthorId, usize>::new();
    let mut low = 0;
    let mut high = 0;
    let mut flags = Vec::with_capacity(positions.len());

    for current in 0..positions.len() {
        while high < positions.len() && atime(high) <= atime(current) + window_secs {
            *authors.entry(aid(high)).or_default() += 1;
            high += 1;
        }
        while atime(low) < atime(current) - window_secs {
            if let Some(count) = authors.get_mut(&aid(low)) {
                *count -= 1;
                if *count == 0 {
                    authors.remove(&aid(low));
                }
            }
            low += 1;
        }
        flags.push(authors.len() > 1);
    }

    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::working_patch;

    #[test]
    fn new_code_needs_volume_and_insert_ratio() {
        assert!(is_new_code(12, 3, 10, 2.0));
        assert!(!is_new_code(12, 8, 10, 2.0));
        assert!(is_new_code(10, 0, 10, 2.0));
        assert!(!is_new_code(9, 0, 10, 2.0));
        assert!(is_new_code(12, 6, 10, 2.0));
    }

    #[test]
    fn new_code_scenario_for_twelve_inserted_lines() {
        let metrics = MetricsConfig::default();
        let mut mostly_new = working_patch("c1", "a.rs", 0, 1);
        mostly_new.raw.loc_d = 3;
        let mut rework = working_patch("c2", "b.rs", 0, 1);
        rework.raw.loc_d = 8;
        let mut merge = working_patch("c3", "c.rs", 0, 1);
        merge.is_merge = true;

        let mut patches = vec![mostly_new, rework, merge];
        classify(&mut patches, &metrics);

        assert!(patches[0].is_new_code);
        assert!(!patches[1].is_new_code);
        assert!(!patches[2].is_new_code);
        assert!(patches.iter().all(|patch| !patch.is_new_code || patch.raw.loc_i >= 10));
    }

    #[test]
    fn collaboration_requires_another_author_within_window() {
        let day = SECONDS_PER_DAY;
        let metrics = MetricsConfig::default();
        let mut merge_by_other = working_patch("m", "solo.rs", 0, 9);
        merge_by_other.is_merge = true;

        let mut patches = vec![
            working_patch("c1", "shared.rs", 0, 1),
            working_patch("c2", "shared.rs", 21 * day, 2),
            working_patch("c3", "shared.rs", 60 * day, 1),
            working_patch("c4", "shared.rs", 80 * day, 1),
            working_patch("c5", "solo.rs", 0, 1),
            merge_by_other,
            working_patch("c6", "other.rs", day, 2),
        ];
        classify(&mut patches, &metrics);

        let flags = patches
            .iter()
            .map(|patch| patch.is_collaboration)
            .collect::<Vec<_>>();
        // The 21-day boundary is inclusive; c3/c4 only see the same author.
        assert_eq!(flags, vec![true, true, false, false, false, false, false]);
    }

    #[test]
    fn collaboration_window_is_symmetric() {
        let day = SECONDS_PER_DAY;
        let metrics = MetricsConfig::default();
        let mut patches = vec![
            working_patch("late", "a.rs", 30 * day, 1),
            working_patch("early", "a.rs", 10 * day, 2),
            working_patch("far", "a.rs", 52 * day, 1),
        ];
        classify(&mut patches, &metrics);

        assert!(patches[0].is_collaboration);
        assert!(patches[1].is_collaboration);
        assert!(!patches[2].is_collaboration);
    }
}
