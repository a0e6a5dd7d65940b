use pulse_core::{
    CalculatedCommit, CalculatedPatch, LanguageType, OutlierSums, RepositoryId, TimeRange,
};
use rusqlite::{Row, params};

use crate::{CalculatedStore, SqliteStore, StoreError};

const COMMIT_COLUMNS: &str = r#"
    repo_id, commit_id, atime, aid, aname, aemail, ctime, cid, cname, cemail, nparents, message,
    tree_id, is_merge, is_bugfix, age, loc_i_c, loc_d_c, comp_i_c, comp_d_c, uploc_c, nfiles,
    loc_i_inlier, loc_i_outlier, loc_d_inlier, loc_d_outlier, comp_i_inlier, comp_i_outlier,
    comp_d_inlier, comp_d_outlier, loc_effort_c, hours_measured, hours_estimated, hours,
    velocity_measured, velocity, is_pr_exists, is_pr_open, is_pr_closed
"#;

const PATCH_COLUMNS: &str = r#"
    repo_id, commit_id, parent_commit_id, newpath, oldpath, atime, aid, langname, langtype,
    is_binary, is_test, is_merge, is_collaboration, is_new_code, outlier, anomaly, loc_i, loc_d,
    comp_i, comp_d, uploc, loc_effort_p
"#;

impl CalculatedStore for SqliteStore {
    fn persist_window(
        &self,
        repo_id: RepositoryId,
        range: TimeRange,
        commits: &[CalculatedCommit],
        patches: &[CalculatedPatch],
    ) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM calculated_commits WHERE repo_id = ?1 AND atime >= ?2 AND atime < ?3",
            params![repo_id, range.from, range.to],
        )?;
        tx.execute(
            "DELETE FROM calculated_patches WHERE repo_id = ?1 AND atime >= ?2 AND atime < ?3",
            params![repo_id, range.from, range.to],
        )?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO calculated_commits ({COMMIT_COLUMNS}) VALUES ({})",
                placeholders(39)
            ))?;
            for commit in commits {
                let segments = &commit.segments;
                stmt.execute(params![
                    commit.repo_id,
                    commit.commit_id,
                    commit.atime,
                    commit.aid,
                    commit.aname,
                    commit.aemail,
                    commit.ctime,
                    commit.cid,
                    commit.cname,
                    commit.cemail,
                    commit.nparents,
                    commit.message,
                    commit.tree_id,
                    commit.is_merge,
                    commit.is_bugfix,
                    commit.age,
                    commit.loc_i_c,
                    commit.loc_d_c,
                    commit.comp_i_c,
                    commit.comp_d_c,
                    commit.uploc_c,
                    commit.nfiles,
                    segments.loc_i_inlier,
                    segments.loc_i_outlier,
                    segments.loc_d_inlier,
                    segments.loc_d_outlier,
                    segments.comp_i_inlier,
                    segments.comp_i_outlier,
                    segments.comp_d_inlier,
                    segments.comp_d_outlier,
                    commit.loc_effort_c,
                    commit.hours_measured,
                    commit.hours_estimated,
                    commit.hours,
                    commit.velocity_measured,
                    commit.velocity,
                    commit.is_pr_exists,
                    commit.is_pr_open,
                    commit.is_pr_closed,
                ])?;
            }

            let mut stmt = tx.prepare(&format!(
                "INSERT INTO calculated_patches ({PATCH_COLUMNS}) VALUES ({})",
                placeholders(22)
            ))?;
            for patch in patches {
                stmt.execute(params![
                    patch.repo_id,
                    patch.commit_id,
                    patch.parent_commit_id,
                    patch.newpath,
                    patch.oldpath,
                    patch.atime,
                    patch.aid,
                    patch.langname,
                    patch.langtype.as_str(),
                    patch.is_binary,
                    patch.is_test,
                    patch.is_merge,
                    patch.is_collaboration,
                    patch.is_new_code,
                    patch.outlier,
                    patch.anomaly,
                    patch.loc_i,
                    patch.loc_d,
                    patch.comp_i,
                    patch.comp_d,
                    patch.uploc,
                    patch.loc_effort_p,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl SqliteStore {
    pub fn list_calculated_commits(
        &self,
        repo_id: RepositoryId,
        limit: Option<u32>,
    ) -> Result<Vec<CalculatedCommit>, StoreError> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COMMIT_COLUMNS}
            FROM calculated_commits
            WHERE repo_id = ?1
            ORDER BY atime DESC, commit_id ASC
            LIMIT ?2
            "#
        ))?;
        let rows = stmt.query_map(params![repo_id, limit], calculated_commit_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_calculated_patches(
        &self,
        repo_id: RepositoryId,
    ) -> Result<Vec<CalculatedPatch>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {PATCH_COLUMNS}
            FROM calculated_patches
            WHERE repo_id = ?1
            ORDER BY atime DESC, commit_id ASC, parent_commit_id ASC, newpath ASC
            "#
        ))?;
        let rows = stmt.query_map(params![repo_id], calculated_patch_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn calculated_commit_from_row(row: &Row<'_>) -> rusqlite::Result<CalculatedCommit> {
    Ok(CalculatedCommit {
        repo_id: row.get(0)?,
        commit_id: row.get(1)?,
        atime: row.get(2)?,
        aid: row.get(3)?,
        aname: row.get(4)?,
        aemail: row.get(5)?,
        ctime: row.get(6)?,
        cid: row.get(7)?,
        cname: row.get(8)?,
        cemail: row.get(9)?,
        nparents: row.get(10)?,
        message: row.get(11)?,
        tree_id: row.get(12)?,
        is_merge: row.get(13)?,
        is_bugfix: row.get(14)?,
        age: row.get(15)?,
        loc_i_c: row.get(16)?,
        loc_d_c: row.get(17)?,
        comp_i_c: row.get(18)?,
        comp_d_c: row.get(19)?,
        uploc_c: row.get(20)?,
        nfiles: row.get(21)?,
        segments: OutlierSums {
            loc_i_inlier: row.get(22)?,
            loc_i_outlier: row.get(23)?,
            loc_d_inlier: row.get(24)?,
            loc_d_outlier: row.get(25)?,
            comp_i_inlier: row.get(26)?,
            comp_i_outlier: row.get(27)?,
            comp_d_inlier: row.get(28)?,
            comp_d_outlier: row.get(29)?,
        },
        loc_effort_c: row.get(30)?,
        hours_measured: row.get(31)?,
        hours_estimated: row.get(32)?,
        hours: row.get(33)?,
        velocity_measured: row.get(34)?,
        velocity: row.get(35)?,
        is_pr_exists: row.get(36)?,
        is_pr_open: row.get(37)?,
        is_pr_closed: row.get(38)?,
    })
}

fn calculated_patch_from_row(row: &Row<'_>) -> rusqlite::Result<CalculatedPatch> {
    let langtype: String = row.get(8)?;
    Ok(CalculatedPatch {
        repo_id: row.get(0)?,
        commit_id: row.get(1)?,
        parent_commit_id: row.get(2)?,
        newpath: row.get(3)?,
        oldpath: row.get(4)?,
        atime: row.get(5)?,
        aid: row.get(6)?,
        langname: row.get(7)?,
        langtype: LanguageType::parse(&langtype),
        is_binary: row.get(9)?,
        is_test: row.get(10)?,
        is_merge: row.get(11)?,
        is_collaboration: row.get(12)?,
        is_new_code: row.get(13)?,
        outlier: row.get(14)?,
        anomaly: row.get(15)?,
        loc_i: row.get(16)?,
        loc_d: row.get(17)?,
        comp_i: row.get(18)?,
        comp_d: row.get(19)?,
        uploc: row.get(20)?,
        loc_effort_p: row.get(21)?,
    })
}
