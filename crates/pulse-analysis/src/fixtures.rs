use pulse_core::{AuthorId, LanguageType, RawCommit, RawPatch};

use crate::commits::{MISSING_PARENT_AGE, PreparedCommit};
use crate::patches::WorkingPatch;

pub fn raw_commit(id: &str, atime: i64, name: &str, email: &str) -> RawCommit {
    RawCommit {
        repo_id: 1,
        commit_id: id.to_owned(),
        atime,
        aname: name.to_owned(),
        aemail: email.to_owned(),
        alogin: None,
        ctime: atime,
        cname: name.to_owned(),
        cemail: email.to_owned(),
        clogin: None,
        nparents: 1,
        parent_ids: Vec::new(),
        message: String::new(),
        tree_id: String::new(),
    }
}

pub fn raw_patch(commit: &str, path: &str, loc_i: i64, loc_d: i64) -> RawPatch {
    RawPatch {
        repo_id: 1,
        commit_id: commit.to_owned(),
        parent_commit_id: Some(format!("{commit}^")),
        oldpath: path.to_owned(),
        newpath: path.to_owned(),
        oldsize: 0,
        newsize: 0,
        is_binary: false,
        langname: "Rust".to_owned(),
        langtype: "programming".to_owned(),
        loc_i,
        loc_d,
        comp_i: loc_i / 2,
        comp_d: loc_d / 2,
        nhunks: 1,
        nrewrites: 0,
        rewrites_loc: 0,
        outlier: None,
        anomaly: None,
    }
}

pub fn prepared_commit(id: &str, atime: i64, aid: AuthorId) -> PreparedCommit {
    PreparedCommit {
        raw: raw_commit(id, atime, "Author", "author@example.com"),
        aid,
        cid: aid,
        is_merge: false,
        is_bugfix: false,
        age: MISSING_PARENT_AGE,
        hours_measured: 0.0,
    }
}

pub fn working_patch(commit: &str, path: &str, atime: i64, aid: AuthorId) -> WorkingPatch {
    WorkingPatch {
        raw: raw_patch(commit, path, 12, 3),
        langtype: LanguageType::Programming,
        is_test: false,
        outlier: false,
        anomaly: false,
        atime,
        aid,
        is_merge: false,
        uploc: 0,
        is_new_code: false,
        is_collaboration: false,
    }
}
