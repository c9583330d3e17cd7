//! The payment-order state machine.
//!
//! States: `pending → approved` (terminal), `pending → rejected`, and the
//! single permitted reversal `rejected → pending` (rectification, which
//! permanently sets the rectified flag). All transitions are applied as
//! repository-side conditional updates; observing `pending` and then losing
//! the race to a concurrent manager fails with `InvalidTransition` instead
//! of double-applying.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use tesoro_core::{
    ActorId, AuthorizationId, AuthorizationRecord, AuthorizationRepository, Deadline, Status,
    Timestamp,
};

use crate::error::{AuthzError, AuthzResult};
use crate::fields::{validate, AuthorizationDraft};
use crate::permissions::{require, PermissionResolver, Requirement};

/// A manager's decision on a pending payment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn target_status(&self) -> Status {
        match self {
            Verdict::Approve => Status::Approved,
            Verdict::Reject => Status::Rejected,
        }
    }
}

pub struct AuthorizationMachine {
    repo: Arc<dyn AuthorizationRepository>,
    resolver: PermissionResolver,
}

impl AuthorizationMachine {
    pub fn new(repo: Arc<dyn AuthorizationRepository>, resolver: PermissionResolver) -> Self {
        Self { repo, resolver }
    }

    /// Create a payment order in the `pending` state.
    ///
    /// Any authenticated actor may create; no capability is required.
    pub fn create(
        &self,
        draft: &AuthorizationDraft,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<AuthorizationRecord> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let fields = validate(draft)?;
        let record = AuthorizationRecord::new(fields, actor.clone());
        self.repo.create(&record)?;
        info!(id = %record.id, by = %actor, "authorization created");
        Ok(record)
    }

    /// Approve or reject a pending payment order.
    ///
    /// Requires manage rights, resolved fresh at the moment of action. The
    /// status write is conditioned on the record still being `pending`; a
    /// zero-row match is re-read and reported as `NotFound` or
    /// `InvalidTransition`, never silently absorbed.
    pub fn transition(
        &self,
        id: &AuthorizationId,
        verdict: Verdict,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<AuthorizationRecord> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let resolved = self.resolver.resolve(actor)?;
        require(&resolved, Requirement::Manage)?;

        let target = verdict.target_status();
        let applied =
            self.repo
                .update_status_checked(id, Status::Pending, target, Timestamp::now())?;
        if !applied {
            return match self.repo.get(id)? {
                None => Err(AuthzError::NotFound(id.clone())),
                Some(record) => Err(AuthzError::InvalidTransition {
                    from: record.status,
                    to: target,
                }),
            };
        }
        info!(id = %id, status = %target, by = %actor, "authorization transitioned");
        self.repo
            .get(id)?
            .ok_or_else(|| AuthzError::NotFound(id.clone()))
    }

    /// Edit a payment order, rectifying it when it is currently rejected.
    ///
    /// Fields are re-validated either way. A rejected record returns to
    /// `pending` with the rectified flag set permanently; a pending record
    /// keeps its status and flag. There is no ownership check on the
    /// ordinary-edit path: any authenticated actor may correct a pending
    /// record. Approved records are terminal and cannot be edited.
    pub fn update(
        &self,
        id: &AuthorizationId,
        draft: &AuthorizationDraft,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<AuthorizationRecord> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let fields = validate(draft)?;
        let record = self
            .repo
            .get(id)?
            .ok_or_else(|| AuthzError::NotFound(id.clone()))?;

        match record.status {
            Status::Rejected => {
                let applied = self.repo.rectify_checked(id, &fields, Timestamp::now())?;
                if !applied {
                    // The record moved under us between the read and the write.
                    return match self.repo.get(id)? {
                        None => Err(AuthzError::NotFound(id.clone())),
                        Some(current) => Err(AuthzError::InvalidTransition {
                            from: current.status,
                            to: Status::Pending,
                        }),
                    };
                }
                info!(id = %id, by = %actor, "authorization rectified");
            }
            Status::Pending => {
                let applied = self.repo.update_fields(id, &fields, Timestamp::now())?;
                if !applied {
                    return Err(AuthzError::NotFound(id.clone()));
                }
                info!(id = %id, by = %actor, "authorization edited");
            }
            Status::Approved => {
                return Err(AuthzError::InvalidTransition {
                    from: Status::Approved,
                    to: Status::Pending,
                });
            }
        }

        self.repo
            .get(id)?
            .ok_or_else(|| AuthzError::NotFound(id.clone()))
    }

    /// Hard-delete a payment order. Sentinel only; manage rights do not
    /// suffice.
    pub fn delete(
        &self,
        id: &AuthorizationId,
        actor: &ActorId,
        deadline: Deadline,
    ) -> AuthzResult<()> {
        if deadline.is_expired() {
            return Err(AuthzError::DeadlineExceeded);
        }
        let resolved = self.resolver.resolve(actor)?;
        require(&resolved, Requirement::Delete)?;

        if !self.repo.delete(id)? {
            return Err(AuthzError::NotFound(id.clone()));
        }
        info!(id = %id, by = %actor, "authorization deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tesoro_core::{CapabilitySet, Currency, PaymentMethod, PermissionSource};
    use tesoro_store::{MemoryPermissionSource, MemoryRepository};

    use crate::permissions::SENTINEL_IDENTITY;

    struct Fixture {
        machine: AuthorizationMachine,
        repo: Arc<MemoryRepository>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let source = Arc::new(MemoryPermissionSource::new());
        source
            .set_capabilities(
                &ActorId::new("gerente@example.com"),
                &CapabilitySet {
                    manage_payment_orders: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let machine =
            AuthorizationMachine::new(repo.clone(), PermissionResolver::new(source));
        Fixture { machine, repo }
    }

    fn creator() -> ActorId {
        ActorId::new("ana@example.com")
    }

    fn manager() -> ActorId {
        ActorId::new("gerente@example.com")
    }

    fn sentinel() -> ActorId {
        ActorId::new(SENTINEL_IDENTITY)
    }

    fn bank_transfer_draft() -> AuthorizationDraft {
        AuthorizationDraft {
            description: "Pago proveedor".into(),
            amount: 150.0,
            currency: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            payment_method: PaymentMethod::BankTransfer,
            bank_name: Some("Banco X".into()),
            phone_number: Some("04141234567".into()),
            document_type: Some("V".into()),
            document_number: Some("12345678".into()),
            account_number: Some("01020304050607080910".into()),
            email: None,
            category: None,
        }
    }

    #[test]
    fn test_create_starts_pending() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        assert_eq!(record.status, Status::Pending);
        assert!(!record.is_rectified);
        assert_eq!(record.created_by, creator());
        assert_eq!(record.fields.currency, Currency::Bs);
    }

    #[test]
    fn test_create_rejects_invalid_fields() {
        let fx = fixture();
        let mut draft = bank_transfer_draft();
        draft.phone_number = Some("0414123456".into()); // 10 digits
        let err = fx
            .machine
            .create(&draft, &creator(), Deadline::unbounded())
            .unwrap_err();
        assert!(matches!(
            err,
            AuthzError::Validation {
                field: "phone_number",
                ..
            }
        ));
    }

    #[test]
    fn test_transition_requires_manage() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        let err = fx
            .machine
            .transition(&record.id, Verdict::Approve, &creator(), Deadline::unbounded())
            .unwrap_err();
        assert_eq!(err, AuthzError::PermissionDenied);
        // Record untouched.
        assert_eq!(
            fx.repo.get(&record.id).unwrap().unwrap().status,
            Status::Pending
        );
    }

    #[test]
    fn test_manager_can_approve() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        let approved = fx
            .machine
            .transition(&record.id, Verdict::Approve, &manager(), Deadline::unbounded())
            .unwrap();
        assert_eq!(approved.status, Status::Approved);
    }

    #[test]
    fn test_approved_is_terminal() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        fx.machine
            .transition(&record.id, Verdict::Approve, &manager(), Deadline::unbounded())
            .unwrap();

        let err = fx
            .machine
            .transition(&record.id, Verdict::Reject, &manager(), Deadline::unbounded())
            .unwrap_err();
        assert_eq!(
            err,
            AuthzError::InvalidTransition {
                from: Status::Approved,
                to: Status::Rejected,
            }
        );
        assert_eq!(
            fx.repo.get(&record.id).unwrap().unwrap().status,
            Status::Approved
        );
    }

    #[test]
    fn test_lost_race_reports_invalid_transition() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        // A concurrent manager rejects first.
        fx.repo
            .update_status_checked(
                &record.id,
                Status::Pending,
                Status::Rejected,
                Timestamp::now(),
            )
            .unwrap();

        // Our manager observed pending before that commit; the conditional
        // update must fail rather than overwrite.
        let err = fx
            .machine
            .transition(&record.id, Verdict::Approve, &manager(), Deadline::unbounded())
            .unwrap_err();
        assert_eq!(
            err,
            AuthzError::InvalidTransition {
                from: Status::Rejected,
                to: Status::Approved,
            }
        );
    }

    #[test]
    fn test_transition_unknown_id() {
        let fx = fixture();
        let err = fx
            .machine
            .transition(
                &AuthorizationId::new("missing"),
                Verdict::Approve,
                &manager(),
                Deadline::unbounded(),
            )
            .unwrap_err();
        assert_eq!(err, AuthzError::NotFound(AuthorizationId::new("missing")));
    }

    #[test]
    fn test_rectify_returns_to_pending_and_flags() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        fx.machine
            .transition(&record.id, Verdict::Reject, &manager(), Deadline::unbounded())
            .unwrap();

        let mut draft = bank_transfer_draft();
        draft.description = "Pago proveedor corregido".into();
        let rectified = fx
            .machine
            .update(&record.id, &draft, &creator(), Deadline::unbounded())
            .unwrap();
        assert_eq!(rectified.status, Status::Pending);
        assert!(rectified.is_rectified);
        assert_eq!(rectified.fields.description, "Pago proveedor corregido");
    }

    #[test]
    fn test_rectified_flag_survives_second_cycle() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        for _ in 0..2 {
            fx.machine
                .transition(&record.id, Verdict::Reject, &manager(), Deadline::unbounded())
                .unwrap();
            let rectified = fx
                .machine
                .update(
                    &record.id,
                    &bank_transfer_draft(),
                    &creator(),
                    Deadline::unbounded(),
                )
                .unwrap();
            assert!(rectified.is_rectified);
        }
    }

    #[test]
    fn test_ordinary_edit_keeps_status_and_flag() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        let mut draft = bank_transfer_draft();
        draft.amount = 200.0;
        // A different authenticated actor may edit: no ownership check.
        let edited = fx
            .machine
            .update(
                &record.id,
                &draft,
                &ActorId::new("otro@example.com"),
                Deadline::unbounded(),
            )
            .unwrap();
        assert_eq!(edited.status, Status::Pending);
        assert!(!edited.is_rectified);
        assert!((edited.fields.amount - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_rejects_approved_record() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        fx.machine
            .transition(&record.id, Verdict::Approve, &manager(), Deadline::unbounded())
            .unwrap();

        let err = fx
            .machine
            .update(
                &record.id,
                &bank_transfer_draft(),
                &creator(),
                Deadline::unbounded(),
            )
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidTransition { .. }));
    }

    #[test]
    fn test_update_revalidates_fields() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        let mut draft = bank_transfer_draft();
        draft.account_number = Some("123".into());
        let err = fx
            .machine
            .update(&record.id, &draft, &creator(), Deadline::unbounded())
            .unwrap_err();
        assert!(matches!(
            err,
            AuthzError::Validation {
                field: "account_number",
                ..
            }
        ));
    }

    #[test]
    fn test_delete_is_sentinel_only() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();

        // A manager with manage_payment_orders is still denied.
        let err = fx
            .machine
            .delete(&record.id, &manager(), Deadline::unbounded())
            .unwrap_err();
        assert_eq!(err, AuthzError::PermissionDenied);
        assert!(fx.repo.get(&record.id).unwrap().is_some());

        fx.machine
            .delete(&record.id, &sentinel(), Deadline::unbounded())
            .unwrap();
        assert!(fx.repo.get(&record.id).unwrap().is_none());
    }

    #[test]
    fn test_expired_deadline_aborts_every_operation() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        let expired = Deadline::at(Timestamp::from_seconds(1_000));

        assert_eq!(
            fx.machine
                .create(&bank_transfer_draft(), &creator(), expired)
                .unwrap_err(),
            AuthzError::DeadlineExceeded
        );
        assert_eq!(
            fx.machine
                .transition(&record.id, Verdict::Approve, &manager(), expired)
                .unwrap_err(),
            AuthzError::DeadlineExceeded
        );
        assert_eq!(
            fx.machine
                .update(&record.id, &bank_transfer_draft(), &creator(), expired)
                .unwrap_err(),
            AuthzError::DeadlineExceeded
        );
        assert_eq!(
            fx.machine
                .delete(&record.id, &sentinel(), expired)
                .unwrap_err(),
            AuthzError::DeadlineExceeded
        );
        // Nothing changed.
        assert_eq!(
            fx.repo.get(&record.id).unwrap().unwrap().status,
            Status::Pending
        );
    }

    #[test]
    fn test_full_lifecycle_reject_rectify_approve() {
        let fx = fixture();
        let record = fx
            .machine
            .create(&bank_transfer_draft(), &creator(), Deadline::unbounded())
            .unwrap();
        assert_eq!(record.status, Status::Pending);
        assert!(!record.is_rectified);

        let rejected = fx
            .machine
            .transition(&record.id, Verdict::Reject, &manager(), Deadline::unbounded())
            .unwrap();
        assert_eq!(rejected.status, Status::Rejected);

        let rectified = fx
            .machine
            .update(
                &record.id,
                &bank_transfer_draft(),
                &creator(),
                Deadline::unbounded(),
            )
            .unwrap();
        assert_eq!(rectified.status, Status::Pending);
        assert!(rectified.is_rectified);

        let approved = fx
            .machine
            .transition(&record.id, Verdict::Approve, &manager(), Deadline::unbounded())
            .unwrap();
        assert_eq!(approved.status, Status::Approved);
        assert!(approved.is_rectified);

        // Terminal: any further transition fails.
        assert!(fx
            .machine
            .transition(&record.id, Verdict::Reject, &manager(), Deadline::unbounded())
            .is_err());
    }
}
