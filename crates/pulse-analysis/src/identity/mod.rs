//! Author identity resolution: maps raw name/email/login signatures onto
//! stable identities, merging signatures that evidently belong to the same
//! person.

mod cache;
mod cluster;
mod index;
mod similarity;

use std::sync::Arc;
use std::time::Duration;

use pulse_config::IdentityConfig;
use pulse_core::{AuthorAlias, AuthorId, AuthorIdentity};
use pulse_store::{IdentityStore, StoreError};

pub use cache::{IdentityCache, IdentityLocks, TtlIdentityCache};
pub use cluster::duplicate_clusters;
pub use index::IdentityIndex;
pub use similarity::{AliasFingerprint, MatchPolicy, levenshtein_ratio, tokens};

use crate::error::EngineError;

/// Process-wide identity state shared by every resolver: the index cache and
/// the per-scope mutation locks.
#[derive(Clone)]
pub struct IdentityRuntime {
    cache: Arc<dyn IdentityCache>,
    locks: Arc<IdentityLocks>,
}

impl IdentityRuntime {
    pub fn new(cache: Arc<dyn IdentityCache>) -> Self {
        Self {
            cache,
            locks: Arc::new(IdentityLocks::new()),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(Arc::new(TtlIdentityCache::new(Duration::from_secs(
            config.cache_ttl_secs,
        ))))
    }

    pub fn resolver(&self, scope: impl Into<String>, config: &IdentityConfig) -> AuthorResolver {
        AuthorResolver {
            scope: scope.into(),
            policy: MatchPolicy::from_config(config),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            cache: Arc::clone(&self.cache),
            locks: Arc::clone(&self.locks),
        }
    }
}

pub struct AuthorResolver {
    scope: String,
    policy: MatchPolicy,
    lock_timeout: Duration,
    cache: Arc<dyn IdentityCache>,
    locks: Arc<IdentityLocks>,
}

impl AuthorResolver {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the identity owning `alias`, attaching the alias to a matching
    /// identity or creating a new identity when nothing matches.
    pub fn resolve<S>(&self, store: &S, alias: &AuthorAlias) -> Result<AuthorIdentity, EngineError>
    where
        S: IdentityStore + ?Sized,
    {
        if let Some(found) = self
            .cache
            .get(&self.scope)
            .and_then(|index| index.find_exact(alias).cloned())
        {
            return Ok(found);
        }

        self.locks.with_lock(&self.scope, self.lock_timeout, || {
            // Re-read under the lock so identities created by a concurrent
            // resolver are matched instead of duplicated.
            let index = self.reload(store)?;
            if let Some(found) = index.find_exact(alias) {
                return Ok(found.clone());
            }

            if let Some(found) = index.find_fuzzy(alias, &self.policy) {
                let mut identity = found.clone();
                identity.add_alias(alias.clone());
                store.update_identity_aliases(identity.id, &identity.aliases)?;
                self.cache.invalidate(&self.scope);
                tracing::debug!(
                    scope = %self.scope,
                    author_id = identity.id,
                    aliases = identity.aliases.len(),
                    "attached alias to existing author"
                );
                return Ok(identity);
            }

            let identity = store.create_identity(alias)?;
            self.cache.invalidate(&self.scope);
            Ok(identity)
        })
    }

    pub fn list<S>(&self, store: &S) -> Result<Vec<AuthorIdentity>, EngineError>
    where
        S: IdentityStore + ?Sized,
    {
        let index = match self.cache.get(&self.scope) {
            Some(index) => index,
            None => self.reload(store)?,
        };
        Ok(index.identities().to_vec())
    }

    /// Folds every alias of `others` into `keep` and deletes `others`.
    pub fn merge<S>(
        &self,
        store: &S,
        keep: AuthorId,
        others: &[AuthorId],
    ) -> Result<AuthorIdentity, EngineError>
    where
        S: IdentityStore + ?Sized,
    {
        self.locks.with_lock(&self.scope, self.lock_timeout, || {
            let identities = store.list_identities()?;
            let merged = merge_into(store, &identities, keep, others);
            self.cache.invalidate(&self.scope);
            merged
        })
    }

    /// Merges every cluster of mutually matching identities into its lowest
    /// id. Returns the surviving identities that absorbed others.
    pub fn deduplicate<S>(&self, store: &S) -> Result<Vec<AuthorIdentity>, EngineError>
    where
        S: IdentityStore + ?Sized,
    {
        self.locks.with_lock(&self.scope, self.lock_timeout, || {
            let identities = store.list_identities()?;
            let clusters = duplicate_clusters(&identities, &self.policy);

            let mut merged = Vec::with_capacity(clusters.len());
            for cluster in &clusters {
                let Some((keep, others)) = cluster.split_first() else {
                    continue;
                };
                match merge_into(store, &identities, *keep, others) {
                    Ok(identity) => merged.push(identity),
                    Err(err) => {
                        self.cache.invalidate(&self.scope);
                        return Err(err);
                    }
                }
            }
            self.cache.invalidate(&self.scope);

            tracing::info!(
                scope = %self.scope,
                clusters = merged.len(),
                "deduplicated author identities"
            );
            Ok(merged)
        })
    }

    fn reload<S>(&self, store: &S) -> Result<Arc<IdentityIndex>, EngineError>
    where
        S: IdentityStore + ?Sized,
    {
        let index = Arc::new(IdentityIndex::build(
            store.list_identities()?,
            &self.policy,
        ));
        self.cache.set(&self.scope, Arc::clone(&index));
        Ok(index)
    }
}

fn merge_into<S>(
    store: &S,
    identities: &[AuthorIdentity],
    keep: AuthorId,
    others: &[AuthorId],
) -> Result<AuthorIdentity, EngineError>
where
    S: IdentityStore + ?Sized,
{
    let find = |id: AuthorId| {
        identities
            .iter()
            .find(|identity| identity.id == id)
            .ok_or(StoreError::AuthorNotFound(id))
    };

    let mut kept = find(keep)?.clone();
    let mut absorbed = Vec::new();
    for other in others {
        if *other == keep || absorbed.contains(other) {
            continue;
        }
        for alias in &find(*other)?.aliases {
            kept.add_alias(alias.clone());
        }
        absorbed.push(*other);
    }

    store.merge_identities(kept.id, &kept.aliases, &absorbed)?;
    tracing::debug!(author_id = kept.id, absorbed = ?absorbed, "merged author identities");
    Ok(kept)
}
