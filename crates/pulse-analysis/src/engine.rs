use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use pulse_config::{PulseConfig, load_workspace_config};
use pulse_core::{RepositoryId, TimeRange};
use pulse_store::{CalculatedStore, IdentityStore, RawStore, SqliteStore};
use serde::Serialize;

use crate::commits::BugfixClassifier;
use crate::error::EngineError;
use crate::identity::{AuthorResolver, IdentityRuntime};
use crate::pipeline::{WindowContext, calculate_window};
use crate::window::{WindowQueue, horizon_for};

/// Shared flag checked between windows; setting it stops every run holding a
/// clone once its current window completes.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecalculateOutcome {
    pub repo_id: RepositoryId,
    pub windows_processed: usize,
    pub windows_skipped: usize,
    pub commits_written: usize,
    pub patches_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Empty,
    Written { commits: usize, patches: usize },
}

pub struct Engine {
    workspace: PathBuf,
    config: PulseConfig,
    identities: IdentityRuntime,
    classifier: BugfixClassifier,
    cancellation: CancellationToken,
}

impl Engine {
    pub fn new(
        workspace: impl AsRef<Path>,
        config: PulseConfig,
        identities: IdentityRuntime,
    ) -> Result<Self, EngineError> {
        let classifier = BugfixClassifier::new(&config.metrics.bugfix_keywords)?;
        Ok(Self {
            workspace: workspace.as_ref().to_path_buf(),
            config,
            identities,
            classifier,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn open(workspace: impl AsRef<Path>) -> Result<Self, EngineError> {
        let workspace = workspace.as_ref();
        let config = load_workspace_config(workspace)?;
        let identities = IdentityRuntime::from_config(&config.identity);
        Self::new(workspace, config, identities)
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Identities are shared by every repository of the workspace.
    pub fn identity_scope(&self) -> String {
        self.workspace.display().to_string()
    }

    pub fn resolver(&self) -> AuthorResolver {
        self.identities
            .resolver(self.identity_scope(), &self.config.identity)
    }

    pub fn recalculate(&self, repo_id: RepositoryId) -> Result<RecalculateOutcome, EngineError> {
        self.recalculate_until(repo_id, unix_timestamp_secs())
    }

    pub fn recalculate_until(
        &self,
        repo_id: RepositoryId,
        horizon_end: i64,
    ) -> Result<RecalculateOutcome, EngineError> {
        let store = SqliteStore::open(&self.workspace)?;
        self.recalculate_with_store(&store, repo_id, horizon_end)
    }

    /// Processes the horizon ending at `horizon_end`, rounded up to the
    /// interval grid, most-recent-first. The first failing window stops the
    /// run; windows persisted before it stay valid.
    pub fn recalculate_with_store<S>(
        &self,
        store: &S,
        repo_id: RepositoryId,
        horizon_end: i64,
    ) -> Result<RecalculateOutcome, EngineError>
    where
        S: RawStore + IdentityStore + CalculatedStore + ?Sized,
    {
        let resolver = self.resolver();
        let mut outcome = RecalculateOutcome {
            repo_id,
            ..RecalculateOutcome::default()
        };

        let ranges = horizon_for(&self.config.windows, horizon_end);
        tracing::info!(
            repository = repo_id,
            horizon_end,
            intervals = ranges.len(),
            "recalculating repository"
        );

        let queue = WindowQueue::new(ranges, &self.config.windows, |range| {
            store.count_commits(repo_id, range)
        });
        for scheduled in queue {
            if self.cancellation.is_cancelled() {
                tracing::warn!(
                    repository = repo_id,
                    completed_windows = outcome.windows_processed,
                    "recalculation cancelled"
                );
                return Err(EngineError::Cancelled {
                    repo_id,
                    completed_windows: outcome.windows_processed,
                });
            }

            let window = match scheduled {
                Ok(window) => window,
                Err(failure) => {
                    return Err(self.window_failed(
                        repo_id,
                        failure.range,
                        outcome.windows_processed,
                        failure.source.into(),
                    ));
                }
            };

            if window.commits == 0 {
                outcome.windows_skipped += 1;
                continue;
            }

            match self.process_window(store, &resolver, repo_id, window.range) {
                Ok(WindowOutcome::Empty) => outcome.windows_skipped += 1,
                Ok(WindowOutcome::Written { commits, patches }) => {
                    outcome.windows_processed += 1;
                    outcome.commits_written += commits;
                    outcome.patches_written += patches;
                }
                Err(err) => {
                    return Err(self.window_failed(
                        repo_id,
                        window.range,
                        outcome.windows_processed,
                        err,
                    ));
                }
            }
        }

        tracing::info!(
            repository = repo_id,
            windows = outcome.windows_processed,
            skipped = outcome.windows_skipped,
            commits = outcome.commits_written,
            patches = outcome.patches_written,
            "recalculation finished"
        );
        Ok(outcome)
    }

    pub fn process_window<S>(
        &self,
        store: &S,
        resolver: &AuthorResolver,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<WindowOutcome, EngineError>
    where
        S: RawStore + IdentityStore + CalculatedStore + ?Sized,
    {
        let data = store.load_window(repo_id, range)?;
        if data.is_empty() {
            tracing::debug!(
                repository = repo_id,
                from = range.from,
                to = range.to,
                "skipping empty window"
            );
            return Ok(WindowOutcome::Empty);
        }

        let context = WindowContext {
            metrics: &self.config.metrics,
            resolver,
            classifier: &self.classifier,
        };
        let calculated = calculate_window(data, store, &context)?;
        store.persist_window(repo_id, range, &calculated.commits, &calculated.patches)?;

        let written = WindowOutcome::Written {
            commits: calculated.commits.len(),
            patches: calculated.patches.len(),
        };
        tracing::info!(
            repository = repo_id,
            from = range.from,
            to = range.to,
            commits = calculated.commits.len(),
            patches = calculated.patches.len(),
            "persisted window"
        );
        drop(calculated);
        Ok(written)
    }

    fn window_failed(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
        completed_windows: usize,
        source: EngineError,
    ) -> EngineError {
        tracing::error!(
            repository = repo_id,
            from = range.from,
            to = range.to,
            completed_windows,
            retryable = source.is_retryable(),
            error = %source,
            "window recalculation failed"
        );
        EngineError::WindowFailed {
            repo_id,
            range,
            completed_windows,
            source: Box::new(source),
        }
    }
}

fn unix_timestamp_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pulse_core::{
        AuthorAlias, AuthorId, AuthorIdentity, CalculatedCommit, CalculatedPatch, WindowData,
    };
    use pulse_store::StoreError;
    use tempfile::tempdir;

    use super::*;
    use crate::commits::MISSING_PARENT_AGE;
    use crate::fixtures::{raw_commit, raw_patch};

    const DAY: i64 = pulse_core::SECONDS_PER_DAY;

    fn engine(workspace: &Path) -> Engine {
        let mut config = PulseConfig::default();
        config.windows.interval_days = 10;
        config.windows.interval_count = 3;
        let identities = IdentityRuntime::from_config(&config.identity);
        Engine::new(workspace, config, identities).expect("engine")
    }

    fn seed(store: &SqliteStore) {
        let data = WindowData {
            commits: vec![
                raw_commit("old", 5 * DAY, "Jane Doe", "jane@co.com"),
                raw_commit("new", 25 * DAY, "J. Doe", "jane.doe@personal.com"),
            ],
            patches: vec![
                raw_patch("old", "src/lib.rs", 20, 0),
                raw_patch("new", "src/lib.rs", 12, 3),
            ],
            ..WindowData::default()
        };
        store.import_raw(&data).expect("import raw");
    }

    #[test]
    fn recalculate_writes_non_empty_windows_only() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");
        seed(&store);
        let engine = engine(temp.path());

        let outcome = engine
            .recalculate_with_store(&store, 1, 30 * DAY)
            .expect("recalculate");

        assert_eq!(outcome.windows_processed, 2);
        assert_eq!(outcome.windows_skipped, 1);
        assert_eq!(outcome.commits_written, 2);
        assert_eq!(outcome.patches_written, 2);

        let commits = store
            .list_calculated_commits(1, None)
            .expect("list commits");
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].aid, commits[1].aid);
    }

    #[test]
    fn recalculation_is_stable_while_the_clock_moves_within_an_interval() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");
        let mut child_patch = raw_patch("child", "src/lib.rs", 12, 3);
        child_patch.parent_commit_id = Some("parent".to_owned());
        store
            .import_raw(&WindowData {
                commits: vec![
                    raw_commit("parent", 20 * DAY - 1_800, "Jane Doe", "jane@co.com"),
                    raw_commit("child", 20 * DAY + 1_800, "Jane Doe", "jane@co.com"),
                ],
                patches: vec![raw_patch("parent", "src/lib.rs", 20, 0), child_patch],
                ..WindowData::default()
            })
            .expect("import raw");
        let engine = engine(temp.path());

        let first = engine
            .recalculate_with_store(&store, 1, 21 * DAY)
            .expect("first run");
        let commits = store.list_calculated_commits(1, None).expect("commits");
        let patches = store.list_calculated_patches(1).expect("patches");

        let second = engine
            .recalculate_with_store(&store, 1, 30 * DAY)
            .expect("second run");
        assert_eq!(first, second);
        assert_eq!(
            store.list_calculated_commits(1, None).expect("commits"),
            commits
        );
        assert_eq!(store.list_calculated_patches(1).expect("patches"), patches);

        // The 20-day boundary separates the pair on every run.
        let child = commits
            .iter()
            .find(|commit| commit.commit_id == "child")
            .expect("child commit");
        assert_eq!(child.age, MISSING_PARENT_AGE);
    }

    #[test]
    fn cancelled_engine_stops_at_window_boundary() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");
        seed(&store);
        let token = CancellationToken::new();
        let engine = engine(temp.path()).with_cancellation(token.clone());
        token.cancel();

        let err = engine
            .recalculate_with_store(&store, 1, 30 * DAY)
            .expect_err("cancelled run");
        assert!(matches!(
            err,
            EngineError::Cancelled {
                completed_windows: 0,
                ..
            }
        ));
        assert!(
            store
                .list_calculated_commits(1, None)
                .expect("list commits")
                .is_empty()
        );
    }

    /// Delegates to SQLite but fails every persist after the first.
    struct FlakyStore {
        inner: SqliteStore,
        persists: Cell<usize>,
    }

    impl RawStore for FlakyStore {
        fn load_window(
            &self,
            repo_id: RepositoryId,
            range: TimeRange,
        ) -> Result<WindowData, StoreError> {
            self.inner.load_window(repo_id, range)
        }

        fn count_commits(
            &self,
            repo_id: RepositoryId,
            range: TimeRange,
        ) -> Result<u64, StoreError> {
            self.inner.count_commits(repo_id, range)
        }
    }

    impl IdentityStore for FlakyStore {
        fn list_identities(&self) -> Result<Vec<AuthorIdentity>, StoreError> {
            self.inner.list_identities()
        }

        fn create_identity(&self, alias: &AuthorAlias) -> Result<AuthorIdentity, StoreError> {
            self.inner.create_identity(alias)
        }

        fn update_identity_aliases(
            &self,
            id: AuthorId,
            aliases: &[AuthorAlias],
        ) -> Result<(), StoreError> {
            self.inner.update_identity_aliases(id, aliases)
        }

        fn merge_identities(
            &self,
            keep: AuthorId,
            aliases: &[AuthorAlias],
            absorbed: &[AuthorId],
        ) -> Result<(), StoreError> {
            self.inner.merge_identities(keep, aliases, absorbed)
        }
    }

    impl CalculatedStore for FlakyStore {
        fn persist_window(
            &self,
            repo_id: RepositoryId,
            range: TimeRange,
            commits: &[CalculatedCommit],
            patches: &[CalculatedPatch],
        ) -> Result<(), StoreError> {
            let persisted = self.persists.get();
            self.persists.set(persisted + 1);
            if persisted > 0 {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.persist_window(repo_id, range, commits, patches)
        }
    }

    #[test]
    fn failed_window_keeps_newer_prefix() {
        let temp = tempdir().expect("tempdir");
        let inner = SqliteStore::open(temp.path()).expect("open store");
        seed(&inner);
        let store = FlakyStore {
            inner,
            persists: Cell::new(0),
        };
        let engine = engine(temp.path());

        let err = engine
            .recalculate_with_store(&store, 1, 30 * DAY)
            .expect_err("second window fails");
        match &err {
            EngineError::WindowFailed {
                range,
                completed_windows,
                ..
            } => {
                assert_eq!(*range, TimeRange::new(0, 10 * DAY));
                assert_eq!(*completed_windows, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());

        let commits = store
            .inner
            .list_calculated_commits(1, None)
            .expect("list commits");
        assert_eq!(
            commits
                .iter()
                .map(|commit| commit.commit_id.as_str())
                .collect::<Vec<_>>(),
            vec!["new"]
        );
    }
}
