//! Persistence for the per-actor seen-id set.
//!
//! The set is stored as a JSON array of record ids under a versioned key.
//! Bumping the schema version orphans entries stored under the old key;
//! there is no migration. Dedup is keyed on the bare record id, so a record
//! seen while pending stays seen when it later reappears in history.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use tesoro_core::{AuthorizationId, KeyValueStore};

use crate::error::NotifyResult;

/// Bump when the stored shape changes; old entries are left behind.
pub const SEEN_SCHEMA_VERSION: u32 = 2;

fn seen_key() -> String {
    format!("tesoro.seen-authorizations.v{}", SEEN_SCHEMA_VERSION)
}

/// Seen-id set backed by a `KeyValueStore`. Reads go to an in-memory cache;
/// every mutation writes the full set back.
pub struct SeenSetStore {
    kv: Arc<dyn KeyValueStore>,
    cache: Mutex<HashSet<AuthorizationId>>,
}

impl SeenSetStore {
    /// Load the set stored under the current version key. A corrupt payload
    /// is logged and treated as empty rather than failing the session.
    pub fn load(kv: Arc<dyn KeyValueStore>) -> NotifyResult<Self> {
        let cache = match kv.read(&seen_key())? {
            Some(raw) => match serde_json::from_str::<Vec<AuthorizationId>>(&raw) {
                Ok(ids) => ids.into_iter().collect(),
                Err(err) => {
                    warn!(error = %err, "discarding corrupt seen-id set");
                    HashSet::new()
                }
            },
            None => HashSet::new(),
        };
        Ok(Self {
            kv,
            cache: Mutex::new(cache),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<AuthorizationId>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self, cache: &HashSet<AuthorizationId>) -> NotifyResult<()> {
        let mut ids: Vec<&AuthorizationId> = cache.iter().collect();
        ids.sort();
        let raw = serde_json::to_string(&ids)?;
        self.kv.write(&seen_key(), &raw)?;
        Ok(())
    }

    pub fn contains(&self, id: &AuthorizationId) -> bool {
        self.lock().contains(id)
    }

    pub fn insert(&self, id: &AuthorizationId) -> NotifyResult<()> {
        let mut cache = self.lock();
        if cache.insert(id.clone()) {
            self.persist(&cache)?;
        }
        Ok(())
    }

    /// Insert a batch with a single write-back.
    pub fn insert_many<'a, I>(&self, ids: I) -> NotifyResult<()>
    where
        I: IntoIterator<Item = &'a AuthorizationId>,
    {
        let mut cache = self.lock();
        let mut changed = false;
        for id in ids {
            changed |= cache.insert(id.clone());
        }
        if changed {
            self.persist(&cache)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
