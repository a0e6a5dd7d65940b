use std::collections::{HashMap, HashSet};

use pulse_config::MetricsConfig;
use pulse_core::{AuthorId, LanguageType, RawPatch, normalize_path};

use crate::commits::PreparedCommit;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingPatch {
    pub raw: RawPatch,
    pub langtype: LanguageType,
    pub is_test: bool,
    pub outlier: bool,
    pub anomaly: bool,
    pub atime: i64,
    pub aid: AuthorId,
    pub is_merge: bool,
    pub uploc: i64,
    pub is_new_code: bool,
    pub is_collaboration: bool,
}

impl WorkingPatch {
    pub fn parent_commit_id(&self) -> Option<&str> {
        self.raw
            .parent_commit_id
            .as_deref()
            .filter(|parent| !parent.is_empty())
    }
}

pub fn prepare_patches(patches: Vec<RawPatch>, metrics: &MetricsConfig) -> Vec<WorkingPatch> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(patches.len());

    for mut raw in patches {
        raw.newpath = normalize_path(&raw.newpath);
        raw.oldpath = normalize_path(&raw.oldpath);

        let key = (
            raw.repo_id,
            raw.commit_id.clone(),
            raw.parent_commit_id.clone().unwrap_or_default(),
            raw.newpath.clone(),
        );
        if !seen.insert(key) {
            continue;
        }

        let langtype = LanguageType::parse(&raw.langtype);
        if langtype == LanguageType::Unknown {
            raw.loc_i = 0;
            raw.loc_d = 0;
            raw.comp_i = 0;
            raw.comp_d = 0;
        }

        let oversized = metrics
            .outlier_patch_loc
            .is_some_and(|limit| raw.loc_i + raw.loc_d > limit);

        prepared.push(WorkingPatch {
            langtype,
            is_test: is_test_path(langtype, &raw.newpath),
            outlier: raw.outlier.unwrap_or(false) || oversized,
            anomaly: raw.anomaly.unwrap_or(false),
            atime: 0,
            aid: 0,
            is_merge: false,
            uploc: 0,
            is_new_code: false,
            is_collaboration: false,
            raw,
        });
    }

    prepared
}

pub fn is_test_path(langtype: LanguageType, path: &str) -> bool {
    langtype == LanguageType::Programming && path.contains("test")
}

pub fn join_commits(patches: Vec<WorkingPatch>, commits: &[PreparedCommit]) -> Vec<WorkingPatch> {
    let by_id = commits
        .iter()
        .map(|commit| (commit.raw.commit_id.as_str(), commit))
        .collect::<HashMap<_, _>>();

    let before = patches.len();
    let joined = patches
        .into_iter()
        .filter_map(|mut patch| {
            let commit = by_id.get(patch.raw.commit_id.as_str())?;
            patch.atime = commit.raw.atime;
            patch.aid = commit.aid;
            patch.is_merge = commit.is_merge;
            Some(patch)
        })
        .collect::<Vec<_>>();

    if joined.len() < before {
        tracing::debug!(
            dropped = before - joined.len(),
            "dropped patches without a commit in the window"
        );
    }
    joined
}
