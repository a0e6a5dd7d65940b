use serde::{Deserialize, Serialize};

use crate::identity::{AuthorAlias, AuthorId};
use crate::RepositoryId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub repo_id: RepositoryId,
    pub commit_id: String,
    pub atime: i64,
    pub aname: String,
    pub aemail: String,
    #[serde(default)]
    pub alogin: Option<String>,
    pub ctime: i64,
    pub cname: String,
    pub cemail: String,
    #[serde(default)]
    pub clogin: Option<String>,
    pub nparents: i64,
    #[serde(default)]
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tree_id: String,
}

impl RawCommit {
    pub fn author_alias(&self) -> AuthorAlias {
        AuthorAlias::new(&self.aname, &self.aemail, self.alogin.as_deref())
    }

    pub fn committer_alias(&self) -> AuthorAlias {
        AuthorAlias::new(&self.cname, &self.cemail, self.clogin.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageType {
    Programming,
    Markup,
    Data,
    Prose,
    #[default]
    Unknown,
}

impl LanguageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Programming => "programming",
            Self::Markup => "markup",
            Self::Data => "data",
            Self::Prose => "prose",
            Self::Unknown => "unknown",
        }
    }

    /// Maps the free-form language type reported by extractors onto the
    /// closed set used by the pipeline. Anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "programming" | "code" | "source" => Self::Programming,
            "markup" => Self::Markup,
            "data" | "config" | "configuration" => Self::Data,
            "prose" | "text" | "documentation" => Self::Prose,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPatch {
    pub repo_id: RepositoryId,
    pub commit_id: String,
    #[serde(default)]
    pub parent_commit_id: Option<String>,
    #[serde(default)]
    pub oldpath: String,
    pub newpath: String,
    #[serde(default)]
    pub oldsize: i64,
    #[serde(default)]
    pub newsize: i64,
    #[serde(default)]
    pub is_binary: bool,
    #[serde(default)]
    pub langname: String,
    #[serde(default)]
    pub langtype: String,
    #[serde(default)]
    pub loc_i: i64,
    #[serde(default)]
    pub loc_d: i64,
    #[serde(default)]
    pub comp_i: i64,
    #[serde(default)]
    pub comp_d: i64,
    #[serde(default)]
    pub nhunks: i64,
    #[serde(default)]
    pub nrewrites: i64,
    #[serde(default)]
    pub rewrites_loc: i64,
    #[serde(default)]
    pub outlier: Option<bool>,
    #[serde(default)]
    pub anomaly: Option<bool>,
}

/// "Lines added by `rewritten_commit_id` were removed by `commit_id`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPatchRewrite {
    pub repo_id: RepositoryId,
    pub commit_id: String,
    pub atime: i64,
    pub rewritten_commit_id: String,
    pub rewritten_atime: i64,
    pub newpath: String,
    pub loc_d: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

impl PullRequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Merged | Self::Closed)
    }
}

impl std::str::FromStr for PullRequestState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" | "opened" => Ok(Self::Open),
            "merged" => Ok(Self::Merged),
            "closed" | "declined" => Ok(Self::Closed),
            other => Err(format!(
                "invalid pull request state '{other}', expected one of: open, merged, closed"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPullRequestCommit {
    pub repo_id: RepositoryId,
    pub pr_number: i64,
    pub commit_id: String,
    pub state: PullRequestState,
}

/// Everything `load_window` returns for one repository and time range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowData {
    #[serde(default)]
    pub commits: Vec<RawCommit>,
    #[serde(default)]
    pub patches: Vec<RawPatch>,
    #[serde(default)]
    pub rewrites: Vec<RawPatchRewrite>,
    #[serde(default)]
    pub pull_request_commits: Vec<RawPullRequestCommit>,
}

impl WindowData {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Line and complexity sums split by the per-patch outlier flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierSums {
    pub loc_i_inlier: i64,
    pub loc_i_outlier: i64,
    pub loc_d_inlier: i64,
    pub loc_d_outlier: i64,
    pub comp_i_inlier: i64,
    pub comp_i_outlier: i64,
    pub comp_d_inlier: i64,
    pub comp_d_outlier: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedCommit {
    pub repo_id: RepositoryId,
    pub commit_id: String,
    pub atime: i64,
    pub aid: AuthorId,
    pub aname: String,
    pub aemail: String,
    pub ctime: i64,
    pub cid: AuthorId,
    pub cname: String,
    pub cemail: String,
    pub nparents: i64,
    pub message: String,
    pub tree_id: String,
    pub is_merge: bool,
    pub is_bugfix: bool,
    pub age: i64,
    pub loc_i_c: i64,
    pub loc_d_c: i64,
    pub comp_i_c: i64,
    pub comp_d_c: i64,
    pub uploc_c: i64,
    pub nfiles: i64,
    pub segments: OutlierSums,
    pub loc_effort_c: f64,
    pub hours_measured: f64,
    pub hours_estimated: f64,
    pub hours: f64,
    pub velocity_measured: f64,
    pub velocity: f64,
    pub is_pr_exists: bool,
    pub is_pr_open: bool,
    pub is_pr_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedPatch {
    pub repo_id: RepositoryId,
    pub commit_id: String,
    pub parent_commit_id: String,
    pub newpath: String,
    pub oldpath: String,
    pub atime: i64,
    pub aid: AuthorId,
    pub langname: String,
    pub langtype: LanguageType,
    pub is_binary: bool,
    pub is_test: bool,
    pub is_merge: bool,
    pub is_collaboration: bool,
    pub is_new_code: bool,
    pub outlier: bool,
    pub anomaly: bool,
    pub loc_i: i64,
    pub loc_d: i64,
    pub comp_i: i64,
    pub comp_d: i64,
    pub uploc: i64,
    pub loc_effort_p: f64,
}
