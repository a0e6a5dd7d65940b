use pulse_core::{CalculatedPatch, loc_effort};

use crate::patches::WorkingPatch;

pub fn finalize_patches(patches: Vec<WorkingPatch>) -> Vec<CalculatedPatch> {
    let mut finalized = patches
        .into_iter()
        .filter_map(|patch| {
            let parent_commit_id = patch.parent_commit_id()?.to_owned();
            let raw = patch.raw;
            Some(CalculatedPatch {
                repo_id: raw.repo_id,
                commit_id: raw.commit_id,
                parent_commit_id,
                newpath: raw.newpath,
                oldpath: raw.oldpath,
                atime: patch.atime,
                aid: patch.aid,
                langname: raw.langname,
                langtype: patch.langtype,
                is_binary: raw.is_binary,
                is_test: patch.is_test,
                is_merge: patch.is_merge,
                is_collaboration: patch.is_collaboration,
                is_new_code: patch.is_new_code,
                outlier: patch.outlier,
                anomaly: patch.anomaly,
                loc_i: raw.loc_i,
                loc_d: raw.loc_d,
                comp_i: raw.comp_i,
                comp_d: raw.comp_d,
                uploc: patch.uploc,
                loc_effort_p: loc_effort(raw.loc_i, raw.loc_d),
            })
        })
        .collect::<Vec<_>>();

    finalized.sort_by(|left, right| {
        (left.atime, &left.commit_id, &left.parent_commit_id, &left.newpath).cmp(&(
            right.atime,
            &right.commit_id,
            &right.parent_commit_id,
            &right.newpath,
        ))
    });
    finalized
}
