use std::sync::Arc;

use crate::error::TesoroResult;
use crate::record::{AuthorizationFields, AuthorizationRecord};
use crate::types::{
    ActorId, AuthorizationId, CapabilitySet, ChangeEvent, Status, SubscriptionId, Table, Timestamp,
};

// ---------------------------------------------------------------------------
// AuthorizationRepository — durable storage for payment orders
//
// The repository is the single source of truth. Status transitions are
// conditional writes: the update applies only while the stored status still
// matches the expectation, and a zero-row match is reported as `false`,
// never papered over. Two managers racing on the same record cannot both
// win.
// ---------------------------------------------------------------------------

pub trait AuthorizationRepository: Send + Sync {
    fn create(&self, record: &AuthorizationRecord) -> TesoroResult<()>;

    fn get(&self, id: &AuthorizationId) -> TesoroResult<Option<AuthorizationRecord>>;

    /// Ordinary edit: replace the editable fields, leaving status and the
    /// rectification flag untouched. Returns false when the id is unknown.
    fn update_fields(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool>;

    /// Conditional status transition: applies only while the stored status
    /// equals `expected`. Returns false when no row matched (unknown id or
    /// a lost race against a concurrent transition).
    fn update_status_checked(
        &self,
        id: &AuthorizationId,
        expected: Status,
        target: Status,
        now: Timestamp,
    ) -> TesoroResult<bool>;

    /// Rectification: in one conditional write, replace the fields, return
    /// the record to `pending` and set the permanent rectified flag. Applies
    /// only while the stored status is `rejected`.
    fn rectify_checked(
        &self,
        id: &AuthorizationId,
        fields: &AuthorizationFields,
        now: Timestamp,
    ) -> TesoroResult<bool>;

    /// Hard delete. Returns false when the id is unknown.
    fn delete(&self, id: &AuthorizationId) -> TesoroResult<bool>;

    /// All records with status `pending`, newest first.
    fn pending(&self) -> TesoroResult<Vec<AuthorizationRecord>>;

    /// The most recently updated non-pending records, newest first.
    fn history(&self, limit: usize) -> TesoroResult<Vec<AuthorizationRecord>>;
}

// ---------------------------------------------------------------------------
// PermissionSource — durable capability records, keyed by actor identity
// ---------------------------------------------------------------------------

pub trait PermissionSource: Send + Sync {
    /// The stored capability set, or None when no record exists.
    fn capabilities(&self, actor: &ActorId) -> TesoroResult<Option<CapabilitySet>>;

    fn set_capabilities(&self, actor: &ActorId, caps: &CapabilitySet) -> TesoroResult<()>;

    /// Returns false when no record existed.
    fn remove_capabilities(&self, actor: &ActorId) -> TesoroResult<bool>;
}

// ---------------------------------------------------------------------------
// KeyValueStore — actor-local persisted state (the seen-id set)
// ---------------------------------------------------------------------------

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> TesoroResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> TesoroResult<()>;
    fn clear(&self, key: &str) -> TesoroResult<bool>;
}

// ---------------------------------------------------------------------------
// ChangeFeed — payload-free "re-fetch now" push signal
// ---------------------------------------------------------------------------

pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

pub trait ChangeFeed: Send + Sync {
    /// Register a listener for one table. Events for other tables are not
    /// delivered to it.
    fn subscribe(&self, table: Table, listener: Arc<dyn ChangeListener>) -> SubscriptionId;

    /// Returns false when the subscription was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
