//! Per-session notification state.
//!
//! The aggregator owns the pending and history lists, the persisted seen-id
//! set and the in-memory known-id set. Alerts fire only for ids that were
//! not known before the current refresh, and the very first refresh of a
//! session populates the known set silently so a reconnect does not replay
//! the whole backlog.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use tesoro_core::{AuthorizationId, AuthorizationRecord, AuthorizationRepository, Deadline};

use crate::error::{NotifyError, NotifyResult};
use crate::seen::SeenSetStore;
use crate::types::{Alert, AlertSink, FocusView, NotificationItem, NotificationSnapshot, SessionActor};

pub struct NotificationAggregator {
    repo: Arc<dyn AuthorizationRepository>,
    seen: SeenSetStore,
    actor: SessionActor,
    history_limit: usize,
    known: HashSet<AuthorizationId>,
    primed: bool,
    pending: Vec<AuthorizationRecord>,
    history: Vec<AuthorizationRecord>,
}

impl NotificationAggregator {
    pub fn new(
        repo: Arc<dyn AuthorizationRepository>,
        seen: SeenSetStore,
        actor: SessionActor,
        history_limit: usize,
    ) -> Self {
        Self {
            repo,
            seen,
            actor,
            history_limit,
            known: HashSet::new(),
            primed: false,
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Re-fetch both lists and emit alerts for ids that are new to this
    /// session.
    ///
    /// A failed read degrades to an empty list; the refresh itself still
    /// succeeds. An expired deadline discards the fetched state without
    /// applying it.
    pub fn refresh(&mut self, deadline: Deadline, sink: &dyn AlertSink) -> NotifyResult<()> {
        // The pending queue is visible to managers only. Leaving it out of
        // a non-manager's fetch also keeps those ids out of the known set,
        // so the later status change still reads as new.
        let pending = if !self.actor.can_manage {
            Vec::new()
        } else {
            match self.repo.pending() {
                Ok(records) => records,
                Err(err) => {
                    warn!(error = %err, "pending fetch failed, showing empty list");
                    Vec::new()
                }
            }
        };
        let history = match self.repo.history(self.history_limit) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "history fetch failed, showing empty list");
                Vec::new()
            }
        };

        if deadline.is_expired() {
            return Err(NotifyError::DeadlineExceeded);
        }

        if self.primed {
            for record in &pending {
                if self.known.contains(&record.id) {
                    continue;
                }
                sink.deliver(&Alert::PendingAuthorization {
                    id: record.id.clone(),
                    description: record.fields.description.clone(),
                });
            }
            for record in &history {
                if self.known.contains(&record.id) || record.created_by != self.actor.id {
                    continue;
                }
                sink.deliver(&Alert::StatusChanged {
                    id: record.id.clone(),
                    status: record.status,
                    description: record.fields.description.clone(),
                });
            }
        } else {
            self.primed = true;
        }

        // Known ids only ever grow within a session.
        self.known
            .extend(pending.iter().chain(history.iter()).map(|r| r.id.clone()));
        self.pending = pending;
        self.history = history;
        Ok(())
    }

    /// Mark one item seen; reports which view currently holds it so the
    /// UI can navigate there.
    pub fn mark_seen(&self, id: &AuthorizationId) -> NotifyResult<FocusView> {
        self.seen.insert(id)?;
        if self.pending.iter().any(|r| &r.id == id) {
            Ok(FocusView::Pending)
        } else {
            Ok(FocusView::History)
        }
    }

    /// Mark every currently loaded item seen in one batch write.
    pub fn mark_all_seen(&self) -> NotifyResult<FocusView> {
        self.seen
            .insert_many(self.pending.iter().chain(self.history.iter()).map(|r| &r.id))?;
        Ok(FocusView::History)
    }

    fn relevant_items(&self) -> impl Iterator<Item = &AuthorizationRecord> {
        // Pending is already manager-filtered at fetch time; history is
        // relevant only for the actor's own records.
        self.pending.iter().chain(
            self.history
                .iter()
                .filter(move |r| r.created_by == self.actor.id),
        )
    }

    /// Badge count: pending items (managers only) plus the actor's own
    /// history items, minus everything already seen.
    pub fn unread_count(&self) -> usize {
        self.relevant_items()
            .filter(|r| !self.seen.contains(&r.id))
            .count()
    }

    /// The display lists, split by seen state, newest first within each.
    pub fn snapshot(&self) -> NotificationSnapshot {
        let mut unseen = Vec::new();
        let mut seen = Vec::new();
        for record in self.relevant_items() {
            let item = NotificationItem::from_record(record);
            if self.seen.contains(&record.id) {
                seen.push(item);
            } else {
                unseen.push(item);
            }
        }
        let unread_count = unseen.len();
        NotificationSnapshot {
            unseen,
            seen,
            unread_count,
        }
    }

    pub fn pending(&self) -> &[AuthorizationRecord] {
        &self.pending
    }

    pub fn history(&self) -> &[AuthorizationRecord] {
        &self.history
    }
}
