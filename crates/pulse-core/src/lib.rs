mod identity;
mod numeric;
mod records;
mod time;

pub use identity::{AuthorAlias, AuthorId, AuthorIdentity};
pub use numeric::{median, safe_ratio};
pub use records::{
    CalculatedCommit, CalculatedPatch, LanguageType, OutlierSums, PullRequestState, RawCommit,
    RawPatch, RawPatchRewrite, RawPullRequestCommit, WindowData,
};
pub use time::{SECONDS_PER_DAY, SECONDS_PER_HOUR, TimeRange};

pub type RepositoryId = i64;

/// Weight of a deleted line relative to an inserted one when computing effort.
pub const DELETION_EFFORT_WEIGHT: f64 = 0.2;

pub fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/")
}

pub fn loc_effort(loc_i: i64, loc_d: i64) -> f64 {
    loc_i as f64 + DELETION_EFFORT_WEIGHT * loc_d as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_uses_forward_slashes() {
        assert_eq!(normalize_path(" src\\lib.rs "), "src/lib.rs");
        assert_eq!(normalize_path("src/main.rs"), "src/main.rs");
    }

    #[test]
    fn loc_effort_weights_deletions() {
        assert!((loc_effort(10, 5) - 11.0).abs() < 1e-9);
        assert_eq!(loc_effort(0, 0), 0.0);
    }
}
