use pulse_core::{
    PullRequestState, RawCommit, RawPatch, RawPatchRewrite, RawPullRequestCommit, RepositoryId,
    TimeRange, WindowData,
};
use rusqlite::{Connection, Row, params};

use crate::{RawStore, SqliteStore, StoreError};

impl SqliteStore {
    pub fn insert_raw_commits(&self, commits: &[RawCommit]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_raw_commits(&tx, commits)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_raw_patches(&self, patches: &[RawPatch]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_raw_patches(&tx, patches)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_raw_patch_rewrites(&self, rewrites: &[RawPatchRewrite]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_raw_patch_rewrites(&tx, rewrites)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_raw_pull_request_commits(
        &self,
        pr_commits: &[RawPullRequestCommit],
    ) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_raw_pull_request_commits(&tx, pr_commits)?;
        tx.commit()?;
        Ok(())
    }

    /// Inserts every record of `data` in one transaction.
    pub fn import_raw(&self, data: &WindowData) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        write_raw_commits(&tx, &data.commits)?;
        write_raw_patches(&tx, &data.patches)?;
        write_raw_patch_rewrites(&tx, &data.rewrites)?;
        write_raw_pull_request_commits(&tx, &data.pull_request_commits)?;
        tx.commit()?;
        Ok(())
    }

    fn load_commits(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<Vec<RawCommit>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT repo_id, commit_id, atime, aname, aemail, alogin, ctime, cname, cemail, clogin,
                   nparents, parent_ids, message, tree_id
            FROM raw_commits
            WHERE repo_id = ?1 AND atime >= ?2 AND atime < ?3
            ORDER BY atime ASC, commit_id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![repo_id, range.from, range.to], |row| {
            let parent_ids: String = row.get(11)?;
            Ok((
                RawCommit {
                    repo_id: row.get(0)?,
                    commit_id: row.get(1)?,
                    atime: row.get(2)?,
                    aname: row.get(3)?,
                    aemail: row.get(4)?,
                    alogin: row.get(5)?,
                    ctime: row.get(6)?,
                    cname: row.get(7)?,
                    cemail: row.get(8)?,
                    clogin: row.get(9)?,
                    nparents: row.get(10)?,
                    parent_ids: Vec::new(),
                    message: row.get(12)?,
                    tree_id: row.get(13)?,
                },
                parent_ids,
            ))
        })?;

        let mut commits = Vec::new();
        for row in rows {
            let (mut commit, parent_ids) = row?;
            commit.parent_ids = serde_json::from_str(&parent_ids)?;
            commits.push(commit);
        }
        Ok(commits)
    }

    fn load_patches(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<Vec<RawPatch>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.repo_id, p.commit_id, p.parent_commit_id, p.oldpath, p.newpath, p.oldsize,
                   p.newsize, p.is_binary, p.langname, p.langtype, p.loc_i, p.loc_d, p.comp_i,
                   p.comp_d, p.nhunks, p.nrewrites, p.rewrites_loc, p.outlier, p.anomaly
            FROM raw_patches p
            JOIN raw_commits c ON c.repo_id = p.repo_id AND c.commit_id = p.commit_id
            WHERE p.repo_id = ?1 AND c.atime >= ?2 AND c.atime < ?3
            ORDER BY p.commit_id ASC, p.parent_commit_id ASC, p.newpath ASC
            "#,
        )?;

        let rows = stmt.query_map(params![repo_id, range.from, range.to], raw_patch_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn load_rewrites(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<Vec<RawPatchRewrite>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT repo_id, commit_id, atime, rewritten_commit_id, rewritten_atime, newpath, loc_d
            FROM raw_patch_rewrites
            WHERE repo_id = ?1 AND atime >= ?2 AND atime < ?3
            ORDER BY atime ASC, commit_id ASC, rewritten_commit_id ASC, newpath ASC
            "#,
        )?;

        let rows = stmt.query_map(params![repo_id, range.from, range.to], |row| {
            Ok(RawPatchRewrite {
                repo_id: row.get(0)?,
                commit_id: row.get(1)?,
                atime: row.get(2)?,
                rewritten_commit_id: row.get(3)?,
                rewritten_atime: row.get(4)?,
                newpath: row.get(5)?,
                loc_d: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn load_pull_request_commits(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<Vec<RawPullRequestCommit>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT pr.repo_id, pr.pr_number, pr.commit_id, pr.state
            FROM raw_pull_request_commits pr
            JOIN raw_commits c ON c.repo_id = pr.repo_id AND c.commit_id = pr.commit_id
            WHERE pr.repo_id = ?1 AND c.atime >= ?2 AND c.atime < ?3
            ORDER BY pr.commit_id ASC, pr.pr_number ASC
            "#,
        )?;

        let rows = stmt.query_map(params![repo_id, range.from, range.to], |row| {
            let state: String = row.get(3)?;
            let state = state.parse::<PullRequestState>().map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    err.into(),
                )
            })?;
            Ok(RawPullRequestCommit {
                repo_id: row.get(0)?,
                pr_number: row.get(1)?,
                commit_id: row.get(2)?,
                state,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl RawStore for SqliteStore {
    fn load_window(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
    ) -> Result<WindowData, StoreError> {
        Ok(WindowData {
            commits: self.load_commits(repo_id, range)?,
            patches: self.load_patches(repo_id, range)?,
            rewrites: self.load_rewrites(repo_id, range)?,
            pull_request_commits: self.load_pull_request_commits(repo_id, range)?,
        })
    }

    fn count_commits(&self, repo_id: RepositoryId, range: TimeRange) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM raw_commits WHERE repo_id = ?1 AND atime >= ?2 AND atime < ?3",
            params![repo_id, range.from, range.to],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn raw_patch_from_row(row: &Row<'_>) -> rusqlite::Result<RawPatch> {
    let parent_commit_id: String = row.get(2)?;
    Ok(RawPatch {
        repo_id: row.get(0)?,
        commit_id: row.get(1)?,
        parent_commit_id: (!parent_commit_id.is_empty()).then_some(parent_commit_id),
        oldpath: row.get(3)?,
        newpath: row.get(4)?,
        oldsize: row.get(5)?,
        newsize: row.get(6)?,
        is_binary: row.get(7)?,
        langname: row.get(8)?,
        langtype: row.get(9)?,
        loc_i: row.get(10)?,
        loc_d: row.get(11)?,
        comp_i: row.get(12)?,
        comp_d: row.get(13)?,
        nhunks: row.get(14)?,
        nrewrites: row.get(15)?,
        rewrites_loc: row.get(16)?,
        outlier: row.get(17)?,
        anomaly: row.get(18)?,
    })
}

fn write_raw_commits(conn: &Connection, commits: &[RawCommit]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO raw_commits (
            repo_id, commit_id, atime, aname, aemail, alogin, ctime, cname, cemail,
            clogin, nparents, parent_ids, message, tree_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )?;
    for commit in commits {
        stmt.execute(params![
            commit.repo_id,
            commit.commit_id,
            commit.atime,
            commit.aname,
            commit.aemail,
            commit.alogin,
            commit.ctime,
            commit.cname,
            commit.cemail,
            commit.clogin,
            commit.nparents,
            serde_json::to_string(&commit.parent_ids)?,
            commit.message,
            commit.tree_id,
        ])?;
    }
    Ok(())
}

fn write_raw_patches(conn: &Connection, patches: &[RawPatch]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO raw_patches (
            repo_id, commit_id, parent_commit_id, oldpath, newpath, oldsize, newsize,
            is_binary, langname, langtype, loc_i, loc_d, comp_i, comp_d, nhunks,
            nrewrites, rewrites_loc, outlier, anomaly
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                  ?16, ?17, ?18, ?19)
        "#,
    )?;
    for patch in patches {
        stmt.execute(params![
            patch.repo_id,
            patch.commit_id,
            patch.parent_commit_id.as_deref().unwrap_or_default(),
            patch.oldpath,
            patch.newpath,
            patch.oldsize,
            patch.newsize,
            patch.is_binary,
            patch.langname,
            patch.langtype,
            patch.loc_i,
            patch.loc_d,
            patch.comp_i,
            patch.comp_d,
            patch.nhunks,
            patch.nrewrites,
            patch.rewrites_loc,
            patch.outlier,
            patch.anomaly,
        ])?;
    }
    Ok(())
}

fn write_raw_patch_rewrites(
    conn: &Connection,
    rewrites: &[RawPatchRewrite],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO raw_patch_rewrites (
            repo_id, commit_id, atime, rewritten_commit_id, rewritten_atime, newpath, loc_d
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;
    for rewrite in rewrites {
        stmt.execute(params![
            rewrite.repo_id,
            rewrite.commit_id,
            rewrite.atime,
            rewrite.rewritten_commit_id,
            rewrite.rewritten_atime,
            rewrite.newpath,
            rewrite.loc_d,
        ])?;
    }
    Ok(())
}

fn write_raw_pull_request_commits(
    conn: &Connection,
    pr_commits: &[RawPullRequestCommit],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT OR REPLACE INTO raw_pull_request_commits (repo_id, pr_number, commit_id, state)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )?;
    for pr_commit in pr_commits {
        stmt.execute(params![
            pr_commit.repo_id,
            pr_commit.pr_number,
            pr_commit.commit_id,
            pr_commit.state.as_str(),
        ])?;
    }
    Ok(())
}
