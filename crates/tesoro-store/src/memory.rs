//! In-memory fakes for the storage contracts, used by unit tests across
//! the workspace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tesoro_core::{
    ActorId, AuthorizationFields, AuthorizationId, AuthorizationRecord, AuthorizationRepository,
    CapabilitySet, KeyValueStore, PermissionSource, Status, TesoroError, TesoroResult, Timestamp,
};

/// HashMap-backed repository with the same conditional-update semantics as
/// the SQLite store. Reads can be made to fail on demand to exercise the
/// degrade-to-empty paths.
pub struct MemoryRepository {
    records: Mutex<HashMap<AuthorizationId, AuthorizationRecord>>,
    fail_reads: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// When set, `pending` and `history` return a storage error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> TesoroResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TesoroError::Storage("injected read failure".into()));
        }
        Ok(())
    }

    fn lock(&self) -> TesoroResult<std::sync::MutexGuard<'_, HashMap<AuthorizationId, AuthorizationRecord>>> {
        self.records
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationRepository for MemoryRepository {
    fn create(&self, record: &AuthorizationRecord) -> TesoroResult<()> {
        let mut records = self.lock()?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &AuthorizationId) -> TesoroResult<Option<AuthorizationRecord>> {
        let records = self.lock()?;
        Ok(records.get(id).cloned())
    }

    fn update_fields(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let mut records = self.lock()?;
        match records.get_mut(id) {
            Some(record) => {
                record.fields = fields.clone();
                record.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_status_checked(
        &self,
        id: &AuthorizationId,
        expected: Status,
        target: Status,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let mut records = self.lock()?;
        match records.get_mut(id) {
            Some(record) if record.status == expected => {
                record.status = target;
                record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn rectify_checked(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool> {
        let mut records = self.lock()?;
        match records.get_mut(id) {
            Some(record) if record.status == Status::Rejected => {
                record.fields = fields.clone();
                record.status = Status::Pending;
                record.is_rectified = true;
                record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete(&self, id: &AuthorizationId) -> TesoroResult<bool> {
        let mut records = self.lock()?;
        Ok(records.remove(id).is_some())
    }

    fn pending(&self) -> TesoroResult<Vec<AuthorizationRecord>> {
        self.check_reads()?;
        let records = self.lock()?;
        let mut pending: Vec<AuthorizationRecord> = records
            .values()
            .filter(|r| r.status == Status::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    fn history(&self, limit: usize) -> TesoroResult<Vec<AuthorizationRecord>> {
        self.check_reads()?;
        let records = self.lock()?;
        let mut history: Vec<AuthorizationRecord> = records
            .values()
            .filter(|r| r.status != Status::Pending)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        history.truncate(limit);
        Ok(history)
    }
}

/// HashMap-backed capability source.
pub struct MemoryPermissionSource {
    caps: Mutex<HashMap<ActorId, CapabilitySet>>,
}

impl MemoryPermissionSource {
    pub fn new() -> Self {
        Self {
            caps: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPermissionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionSource for MemoryPermissionSource {
    fn capabilities(&self, actor: &ActorId) -> TesoroResult<Option<CapabilitySet>> {
        let caps = self
            .caps
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(caps.get(actor).copied())
    }

    fn set_capabilities(&self, actor: &ActorId, value: &CapabilitySet) -> TesoroResult<()> {
        let mut caps = self
            .caps
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        caps.insert(actor.clone(), *value);
        Ok(())
    }

    fn remove_capabilities(&self, actor: &ActorId) -> TesoroResult<bool> {
        let mut caps = self
            .caps
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(caps.remove(actor).is_some())
    }
}

/// HashMap-backed key-value store.
pub struct MemoryKeyValueStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn read(&self, key: &str) -> TesoroResult<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> TesoroResult<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> TesoroResult<bool> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| TesoroError::Storage(format!("lock poisoned: {}", e)))?;
        Ok(slots.remove(key).is_some())
    }
}
