use pulse_core::{AuthorAlias, AuthorId, AuthorIdentity};
use rusqlite::params;

use crate::{IdentityStore, SqliteStore, StoreError};

impl IdentityStore for SqliteStore {
    fn list_identities(&self) -> Result<Vec<AuthorIdentity>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, email, active, aliases
            FROM authors
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let aliases: String = row.get(4)?;
            Ok((
                AuthorIdentity {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    active: row.get(3)?,
                    aliases: Vec::new(),
                },
                aliases,
            ))
        })?;

        let mut identities = Vec::new();
        for row in rows {
            let (mut identity, aliases) = row?;
            identity.aliases = serde_json::from_str(&aliases)?;
            identities.push(identity);
        }
        Ok(identities)
    }

    fn create_identity(&self, alias: &AuthorAlias) -> Result<AuthorIdentity, StoreError> {
        let aliases = vec![alias.clone()];
        self.conn.execute(
            "INSERT INTO authors (name, email, active, aliases) VALUES (?1, ?2, 1, ?3)",
            params![alias.name, alias.email, serde_json::to_string(&aliases)?],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(author_id = id, "created author identity");

        Ok(AuthorIdentity {
            id,
            name: alias.name.clone(),
            email: alias.email.clone(),
            active: true,
            aliases,
        })
    }

    fn update_identity_aliases(
        &self,
        id: AuthorId,
        aliases: &[AuthorAlias],
    ) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE authors SET aliases = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(aliases)?],
        )?;
        if updated == 0 {
            return Err(StoreError::AuthorNotFound(id));
        }
        Ok(())
    }

    fn merge_identities(
        &self,
        keep: AuthorId,
        aliases: &[AuthorAlias],
        absorbed: &[AuthorId],
    ) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE authors SET aliases = ?2 WHERE id = ?1",
            params![keep, serde_json::to_string(aliases)?],
        )?;
        if updated == 0 {
            return Err(StoreError::AuthorNotFound(keep));
        }
        for id in absorbed {
            let deleted = tx.execute("DELETE FROM authors WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(StoreError::AuthorNotFound(*id));
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn identities_round_trip_with_aliases() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");

        let jane = AuthorAlias::new("Jane Doe", "jane@co.com", None);
        let created = store.create_identity(&jane).expect("create identity");
        assert!(created.active);
        assert_eq!(created.aliases, vec![jane.clone()]);

        let personal = AuthorAlias::new("J. Doe", "jane.doe@personal.com", Some("jdoe"));
        store
            .update_identity_aliases(created.id, &[jane.clone(), personal.clone()])
            .expect("update aliases");

        let listed = store.list_identities().expect("list identities");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(listed[0].aliases, vec![jane, personal]);
    }

    #[test]
    fn updating_unknown_identity_fails() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");

        let err = store
            .update_identity_aliases(42, &[])
            .expect_err("unknown author update must fail");
        assert!(matches!(err, StoreError::AuthorNotFound(42)));
    }

    #[test]
    fn merge_identities_is_all_or_nothing() {
        let temp = tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path()).expect("open store");

        let jane = AuthorAlias::new("Jane Doe", "jane@co.com", None);
        let personal = AuthorAlias::new("J. Doe", "jane.doe@personal.com", None);
        let kept = store.create_identity(&jane).expect("create kept");
        let other = store.create_identity(&personal).expect("create other");
        let merged = vec![jane.clone(), personal.clone()];

        let err = store
            .merge_identities(kept.id, &merged, &[other.id, 999])
            .expect_err("unknown absorbed identity must fail");
        assert!(matches!(err, StoreError::AuthorNotFound(999)));
        let listed = store.list_identities().expect("list identities");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].aliases, vec![jane.clone()]);

        store
            .merge_identities(kept.id, &merged, &[other.id])
            .expect("merge identities");
        let listed = store.list_identities().expect("list identities");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
        assert_eq!(listed[0].aliases, merged);
    }
}
