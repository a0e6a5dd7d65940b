use std::collections::HashMap;

use pulse_core::OutlierSums;

use crate::patches::WorkingPatch;

pub fn segment(patches: &[WorkingPatch]) -> HashMap<String, OutlierSums> {
    let mut sums = HashMap::<String, OutlierSums>::new();
    for patch in patches {
        let entry = sums.entry(patch.raw.commit_id.clone()).or_default();
        let raw = &patch.raw;
        if patch.outlier {
            entry.loc_i_outlier += raw.loc_i;
            entry.loc_d_outlier += raw.loc_d;
            entry.comp_i_outlier += raw.comp_i;
            entry.comp_d_outlier += raw.comp_d;
        } else {
            entry.loc_i_inlier += raw.loc_i;
            entry.loc_d_inlier += raw.loc_d;
            entry.comp_i_inlier += raw.comp_i;
            entry.comp_d_inlier += raw.comp_d;
        }
    }
    sums
}
