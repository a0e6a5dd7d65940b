mod aggregate;
mod collaboration;
mod commits;
mod engine;
mod error;
mod finalize;
pub mod identity;
mod outliers;
mod patches;
mod pipeline;
mod uploc;
mod window;

#[cfg(test)]
mod fixtures;

pub use aggregate::aggregate;
pub use collaboration::{classify as classify_collaboration, is_new_code};
pub use commits::{
    BugfixClassifier, MISSING_PARENT_AGE, PreparedCommit, commit_ages, prepare_commits,
};
pub use engine::{CancellationToken, Engine, RecalculateOutcome, WindowOutcome};
pub use error::EngineError;
pub use finalize::finalize_patches;
pub use identity::{AuthorResolver, IdentityCache, IdentityRuntime, TtlIdentityCache};
pub use outliers::segment as segment_outliers;
pub use patches::{WorkingPatch, is_test_path, join_commits, prepare_patches};
pub use pipeline::{CalculatedWindow, WindowContext, calculate_window};
pub use uploc::{UplocTotals, accumulate as accumulate_uploc, apply as apply_uploc};
pub use window::{
    CountFailure, ScheduledWindow, WindowQueue, align_horizon_end, horizon, horizon_for,
};
