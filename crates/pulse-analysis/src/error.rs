use pulse_core::{RepositoryId, TimeRange};
use pulse_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] pulse_config::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid bugfix pattern: {0}")]
    BugfixPattern(#[from] regex::Error),
    #[error("timed out after {waited_ms}ms waiting for the identity lock of scope '{scope}'")]
    IdentityLockTimeout { scope: String, waited_ms: u64 },
    #[error("window {range} of repository {repo_id} failed after {completed_windows} completed windows: {source}")]
    WindowFailed {
        repo_id: RepositoryId,
        range: TimeRange,
        completed_windows: usize,
        source: Box<EngineError>,
    },
    #[error("recalculation of repository {repo_id} cancelled after {completed_windows} windows")]
    Cancelled {
        repo_id: RepositoryId,
        completed_windows: usize,
    },
}

impl EngineError {
    /// Whether re-running the same window from raw data can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IdentityLockTimeout { .. } | Self::Store(_) => true,
            Self::WindowFailed { source, .. } => source.is_retryable(),
            Self::Config(_) | Self::BugfixPattern(_) | Self::Cancelled { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_failures_inherit_retryability_from_their_source() {
        let timeout = EngineError::IdentityLockTimeout {
            scope: "ws".to_owned(),
            waited_ms: 10,
        };
        assert!(timeout.is_retryable());

        let failed = EngineError::WindowFailed {
            repo_id: 1,
            range: TimeRange::new(0, 10),
            completed_windows: 2,
            source: Box::new(timeout),
        };
        assert!(failed.is_retryable());
        assert!(failed.to_string().contains("[0, 10)"));

        let cancelled = EngineError::Cancelled {
            repo_id: 1,
            completed_windows: 0,
        };
        assert!(!cancelled.is_retryable());
    }
}
