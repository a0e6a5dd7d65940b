use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pulse_core::{
    AuthorAlias, AuthorId, AuthorIdentity, CalculatedCommit, CalculatedPatch, RepositoryId,
    TimeRange, WindowData,
};
use rusqlite::Connection;
use thiserror::Error;

mod authors;
mod calculated;
mod raw;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("author {0} not found")]
    AuthorNotFound(AuthorId),
}

/// Read side of the raw records produced by extraction.
pub trait RawStore {
    /// Commits authored in `range`, their patches and pull-request links, and
    /// the rewrite events whose rewriting commit was authored in `range`.
    fn load_window(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<WindowData, StoreError>;
    fn count_commits(&self, repo_id: RepositoryId, range: TimeRange) -> Result<u64, StoreError>;
}

pub trait IdentityStore {
    fn list_identities(&self) -> Result<Vec<AuthorIdentity>, StoreError>;
    fn create_identity(&self, alias: &AuthorAlias) -> Result<AuthorIdentity, StoreError>;
    fn update_identity_aliases(
        &self,
        id: AuthorId,
        aliases: &[AuthorAlias],
    ) -> Result<(), StoreError>;
    /// Stores `aliases` on `keep` and deletes `absorbed`, all or nothing.
    fn merge_identities(
        &self,
        keep: AuthorId,
        aliases: &[AuthorAlias],
        absorbed: &[AuthorId],
    ) -> Result<(), StoreError>;
}

pub trait CalculatedStore {
    /// Atomically replaces every derived row authored inside `range`.
    fn persist_window(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
        commits: &[CalculatedCommit],
        patches: &[CalculatedPatch],
    ) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
    pulse_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(workspace_root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let workspace_root = workspace_root.as_ref();
        let pulse_dir = pulse_config::pulse_dir(workspace_root);
        let sqlite_path = pulse_config::database_path(workspace_root);

        fs::create_dir_all(&pulse_dir)?;

        let conn = Connection::open(sqlite_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        run_migrations(&conn)?;

        Ok(Self { conn, pulse_dir })
    }

    pub fn pulse_dir(&self) -> &Path {
        &self.pulse_dir
    }

    pub fn list_repositories(&self) -> Result<Vec<RepositoryId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT repo_id FROM raw_commits ORDER BY repo_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS raw_commits (
            repo_id INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            atime INTEGER NOT NULL,
            aname TEXT NOT NULL,
            aemail TEXT NOT NULL,
            alogin TEXT,
            ctime INTEGER NOT NULL,
            cname TEXT NOT NULL,
            cemail TEXT NOT NULL,
            clogin TEXT,
            nparents INTEGER NOT NULL,
            parent_ids TEXT NOT NULL DEFAULT '[]',
            message TEXT NOT NULL,
            tree_id TEXT NOT NULL,
            PRIMARY KEY (repo_id, commit_id)
        );
        CREATE INDEX IF NOT EXISTS idx_raw_commits_atime ON raw_commits(repo_id, atime);

        CREATE TABLE IF NOT EXISTS raw_patches (
            repo_id INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            parent_commit_id TEXT NOT NULL DEFAULT '',
            oldpath TEXT NOT NULL,
            newpath TEXT NOT NULL,
            oldsize INTEGER NOT NULL,
            newsize INTEGER NOT NULL,
            is_binary INTEGER NOT NULL,
            langname TEXT NOT NULL,
            langtype TEXT NOT NULL,
            loc_i INTEGER NOT NULL,
            loc_d INTEGER NOT NULL,
            comp_i INTEGER NOT NULL,
            comp_d INTEGER NOT NULL,
            nhunks INTEGER NOT NULL,
            nrewrites INTEGER NOT NULL,
            rewrites_loc INTEGER NOT NULL,
            outlier INTEGER,
            anomaly INTEGER,
            PRIMARY KEY (repo_id, commit_id, parent_commit_id, newpath)
        );

        CREATE TABLE IF NOT EXISTS raw_patch_rewrites (
            repo_id INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            atime INTEGER NOT NULL,
            rewritten_commit_id TEXT NOT NULL,
            rewritten_atime INTEGER NOT NULL,
            newpath TEXT NOT NULL,
            loc_d INTEGER NOT NULL,
            PRIMARY KEY (repo_id, commit_id, rewritten_commit_id, newpath)
        );
        CREATE INDEX IF NOT EXISTS idx_raw_patch_rewrites_atime
            ON raw_patch_rewrites(repo_id, atime);

        CREATE TABLE IF NOT EXISTS raw_pull_request_commits (
            repo_id INTEGER NOT NULL,
            pr_number INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            state TEXT NOT NULL,
            PRIMARY KEY (repo_id, pr_number, commit_id)
        );

        CREATE TABLE IF NOT EXISTS authors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            aliases TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS calculated_commits (
            repo_id INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            atime INTEGER NOT NULL,
            aid INTEGER NOT NULL,
            aname TEXT NOT NULL,
            aemail TEXT NOT NULL,
            ctime INTEGER NOT NULL,
            cid INTEGER NOT NULL,
            cname TEXT NOT NULL,
            cemail TEXT NOT NULL,
            nparents INTEGER NOT NULL,
            message TEXT NOT NULL,
            tree_id TEXT NOT NULL,
            is_merge INTEGER NOT NULL,
            is_bugfix INTEGER NOT NULL,
            age INTEGER NOT NULL,
            loc_i_c INTEGER NOT NULL,
            loc_d_c INTEGER NOT NULL,
            comp_i_c INTEGER NOT NULL,
            comp_d_c INTEGER NOT NULL,
            uploc_c INTEGER NOT NULL,
            nfiles INTEGER NOT NULL,
            loc_i_inlier INTEGER NOT NULL,
            loc_i_outlier INTEGER NOT NULL,
            loc_d_inlier INTEGER NOT NULL,
            loc_d_outlier INTEGER NOT NULL,
            comp_i_inlier INTEGER NOT NULL,
            comp_i_outlier INTEGER NOT NULL,
            comp_d_inlier INTEGER NOT NULL,
            comp_d_outlier INTEGER NOT NULL,
            loc_effort_c REAL NOT NULL,
            hours_measured REAL NOT NULL,
            hours_estimated REAL NOT NULL,
            hours REAL NOT NULL,
            velocity_measured REAL NOT NULL,
            velocity REAL NOT NULL,
            is_pr_exists INTEGER NOT NULL,
            is_pr_open INTEGER NOT NULL,
            is_pr_closed INTEGER NOT NULL,
            PRIMARY KEY (repo_id, commit_id)
        );
        CREATE INDEX IF NOT EXISTS idx_calculated_commits_atime
            ON calculated_commits(repo_id, atime);

        CREATE TABLE IF NOT EXISTS calculated_patches (
            repo_id INTEGER NOT NULL,
            commit_id TEXT NOT NULL,
            parent_commit_id TEXT NOT NULL,
            newpath TEXT NOT NULL,
            oldpath TEXT NOT NULL,
            atime INTEGER NOT NULL,
            aid INTEGER NOT NULL,
            langname TEXT NOT NULL,
            langtype TEXT NOT NULL,
            is_binary INTEGER NOT NULL,
            is_test INTEGER NOT NULL,
            is_merge INTEGER NOT NULL,
            is_collaboration INTEGER NOT NULL,
            is_new_code INTEGER NOT NULL,
            outlier INTEGER NOT NULL,
            anomaly INTEGER NOT NULL,
            loc_i INTEGER NOT NULL,
            loc_d INTEGER NOT NULL,
            comp_i INTEGER NOT NULL,
            comp_d INTEGER NOT NULL,
            uploc INTEGER NOT NULL,
            loc_effort_p REAL NOT NULL,
            PRIMARY KEY (repo_id, commit_id, parent_commit_id, newpath)
        );
        CREATE INDEX IF NOT EXISTS idx_calculated_patches_atime
            ON calculated_patches(repo_id, atime);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn open_creates_layout_and_is_reentrant() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let store = SqliteStore::open(workspace).expect("open store");
        assert!(store.pulse_dir().exists());
        assert!(store.pulse_dir().join("pulse.sqlite").exists());
        assert!(store.list_repositories().expect("list repos").is_empty());
        drop(store);

        SqliteStore::open(workspace).expect("reopen store");
    }
}
