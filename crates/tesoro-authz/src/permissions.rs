//! Capability resolution and the single permission gate.
//!
//! Identity checks used to be scattered "is this email the admin" string
//! comparisons at every call site; here they are centralized into one
//! resolver plus one guard function. Every mutating operation resolves the
//! actor fresh at the moment of action; UI-level hiding of controls is not
//! a substitute, since capabilities can change between render and click.

use std::sync::Arc;

use tracing::info;

use tesoro_core::{ActorId, Capability, CapabilitySet, Deadline, PermissionSource};

use crate::error::{AuthzError, AuthzResult};

/// The hardcoded super-admin identity. It bypasses the stored capability
/// table entirely and is the only identity allowed to hard-delete records.
pub const SENTINEL_IDENTITY: &str = "admin@tesoro.app";

/// What an operation demands of the acting identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Approve/reject payment orders: sentinel or `ManagePaymentOrders`.
    Manage,
    /// Grant or revoke capabilities: sentinel or `AssignAccess`.
    Assign,
    /// Hard delete: sentinel only, no capability suffices.
    Delete,
}

/// An actor with its capabilities resolved at a single point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedActor {
    pub id: ActorId,
    sentinel: bool,
    caps: CapabilitySet,
}

impl ResolvedActor {
    pub fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.sentinel || self.caps.has(capability)
    }

    pub fn can_manage(&self) -> bool {
        self.has(Capability::ManagePaymentOrders)
    }

    pub fn can_assign(&self) -> bool {
        self.has(Capability::AssignAccess)
    }

    pub fn can_delete(&self) -> bool {
        self.sentinel
    }
}

/// The single guard applied to every gated operation.
pub fn require(actor: &ResolvedActor, requirement: Requirement) -> AuthzResult<()> {
    let allowed = match requirement {
        Requirement::Manage => actor.can_manage(),
        Requirement::Assign => actor.can_assign(),
        Requirement::Delete => actor.can_delete(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AuthzError::PermissionDenied)
    }
}

/// Maps actor identities to capability sets.
///
/// The sentinel identity short-circuits to an all-true set without touching
/// the source; any other identity without a stored record resolves to the
/// all-false default.
pub struct PermissionResolver {
    source: Arc<dyn PermissionSource>,
    sentinel: ActorId,
}

impl PermissionResolver {
    pub fn new(source: Arc<dyn PermissionSource>) -> Self {
        Self::with_sentinel(source, ActorId::new(SENTINEL_IDENTITY))
    }

    pub fn with_sentinel(source: Arc<dyn PermissionSource>, sentinel: ActorId) -> Self {
        Self { source, sentinel }
    }

    pub fn resolve(&self, actor: &ActorId) -> AuthzResult<ResolvedActor> {
        if *actor == self.sentinel {
            return Ok(ResolvedActor {
                id: actor.clone(),
                sentinel: true,
                caps: CapabilitySet::all(),
            });
        }
        let caps = self.source.capabilities(actor)?.unwrap_or_default();
        Ok(ResolvedActor {
            id: actor.clone(),
            sentinel: false,
            caps,
        })
    }
}

/// Gated writes to the capability table.
///
/// Capability records are read-only from the core's perspective except
/// through these two operations, which pass the same gate as every other
/// mutation.
pub struct CapabilityGrants {
    source: Arc<dyn PermissionSource>,
    resolver: PermissionResolver,
}

impl CapabilityGrants {
    pub fn new(source: Arc<dyn PermissionSource>, resolver: PermissionResolver) -> Self {
        Self { source, resolver }
    }

    pub fn assign(
        &self,
        target: &ActorId,
        caps: &CapabilitySet,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<()> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let resolved = self.resolver.resolve(actor)?;
        require(&resolved, Requirement::Assign)?;
        self.source.set_capabilities(target, caps)?;
        info!(target = %target, by = %actor, "capabilities assigned");
        Ok(())
    }

    pub fn revoke(
        &self,
        target: &ActorId,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<bool> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let resolved = self.resolver.resolve(actor)?;
        require(&resolved, Requirement::Assign)?;
        let removed = self.source.remove_capabilities(target)?;
        info!(target = %target, by = %actor, removed, "capabilities revoked");
        Ok(removed)
    }
}
