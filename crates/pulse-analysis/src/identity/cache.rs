use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::index::IdentityIndex;
use crate::error::EngineError;

pub trait IdentityCache: Send + Sync {
    fn get(&self, scope: &str) -> Option<Arc<IdentityIndex>>;
    fn set(&self, scope: &str, index: Arc<IdentityIndex>);
    fn invalidate(&self, scope: &str);
}

struct CacheEntry {
    index: Arc<IdentityIndex>,
    expires_at: Instant,
}

pub struct TtlIdentityCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlIdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl IdentityCache for TtlIdentityCache {
    fn get(&self, scope: &str) -> Option<Arc<IdentityIndex>> {
        let mut entries = self.entries.lock();
        match entries.get(scope) {
            Some(entry) if entry.expires_at > Instant::now() => Some(Arc::clone(&entry.index)),
            Some(_) => {
                entries.remove(scope);
                None
            }
            None => None,
        }
    }

    fn set(&self, scope: &str, index: Arc<IdentityIndex>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(
            scope.to_owned(),
            CacheEntry {
                index,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn invalidate(&self, scope: &str) {
        self.entries.lock().remove(scope);
    }
}

#[derive(Default)]
pub struct IdentityLocks {
    scopes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock<T>(
        &self,
        scope: &str,
        timeout: Duration,
        f: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let lock = {
            let mut scopes = self.scopes.lock();
            Arc::clone(scopes.entry(scope.to_owned()).or_default())
        };

        let Some(_guard) = lock.try_lock_for(timeout) else {
            return Err(EngineError::IdentityLockTimeout {
                scope: scope.to_owned(),
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        };
        f()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use pulse_config::IdentityConfig;

    use super::*;
    use crate::identity::similarity::MatchPolicy;

    fn empty_index() -> Arc<IdentityIndex> {
        Arc::new(IdentityIndex::build(
            Vec::new(),
            &MatchPolicy::from_config(&IdentityConfig::default()),
        ))
    }

    #[test]
    fn cache_serves_until_invalidated() {
        let cache = TtlIdentityCache::new(Duration::from_secs(60));
        assert!(cache.get("ws").is_none());

        cache.set("ws", empty_index());
        assert!(cache.get("ws").is_some());
        assert!(cache.get("other").is_none());

        cache.invalidate("ws");
        assert!(cache.get("ws").is_none());
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = TtlIdentityCache::new(Duration::ZERO);
        cache.set("ws", empty_index());
        assert!(cache.get("ws").is_none());
    }

    #[test]
    fn lock_wait_is_bounded() {
        let locks = Arc::new(IdentityLocks::new());
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                locks
                    .with_lock("ws", Duration::from_secs(5), || {
                        held_tx.send(()).expect("signal lock held");
                        release_rx.recv().expect("wait for release");
                        Ok(())
                    })
                    .expect("holder acquires lock");
            })
        };

        held_rx.recv().expect("holder took the lock");
        let err = locks
            .with_lock("ws", Duration::from_millis(20), || Ok(()))
            .expect_err("second caller should time out");
        assert!(matches!(
            err,
            EngineError::IdentityLockTimeout { waited_ms: 20, .. }
        ));

        // Other scopes are independent.
        locks
            .with_lock("elsewhere", Duration::from_millis(20), || Ok(()))
            .expect("different scope is free");

        release_tx.send(()).expect("release holder");
        holder.join().expect("holder thread");
        locks
            .with_lock("ws", Duration::from_millis(20), || Ok(()))
            .expect("lock free after release");
    }
}
