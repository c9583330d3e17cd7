//! Per-actor session wiring.
//!
//! A `SessionController` ties one logged-in actor to the state machine, the
//! notification gate and the change feed. Feed events trigger silent gate
//! refreshes; a torn-down session drops further callbacks instead of
//! writing into stale state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use tesoro_authz::{AuthorizationDraft, AuthorizationMachine, PermissionResolver, Verdict};
use tesoro_core::{
    ActorId, AuthorizationId, AuthorizationRecord, AuthorizationRepository, ChangeEvent,
    ChangeFeed, ChangeListener, Deadline, KeyValueStore, PermissionSource, SubscriptionId, Table,
};
use tesoro_notify::{
    AlertSink, FocusView, NotificationAggregator, NotificationSnapshot, RefreshGate, SeenSetStore,
    SessionActor,
};
use tesoro_store::ChangeFeedHub;

use crate::config::RootConfig;
use crate::error::RootResult;

/// Change-feed listener that funnels events into the refresh gate. The
/// active flag is shared with the controller; once cleared, events are
/// dropped without touching the aggregator.
struct FeedRefresher {
    gate: Arc<RefreshGate>,
    active: Arc<AtomicBool>,
}

impl ChangeListener for FeedRefresher {
    fn on_change(&self, _event: &ChangeEvent) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        self.gate.request_refresh();
    }
}

pub struct SessionController {
    actor: ActorId,
    machine: AuthorizationMachine,
    gate: Arc<RefreshGate>,
    feed: Arc<ChangeFeedHub>,
    subscription: Option<SubscriptionId>,
    active: Arc<AtomicBool>,
    refresh_timeout_secs: u64,
}

impl SessionController {
    /// Open a session for `actor`: resolve the capability view, load the
    /// seen set, build the aggregator behind its gate and subscribe to the
    /// authorizations change feed.
    pub fn open(
        actor: ActorId,
        repo: Arc<dyn AuthorizationRepository>,
        permissions: Arc<dyn PermissionSource>,
        kv: Arc<dyn KeyValueStore>,
        feed: Arc<ChangeFeedHub>,
        sink: Arc<dyn AlertSink>,
        config: &RootConfig,
    ) -> RootResult<Self> {
        let sentinel = ActorId::new(config.sentinel_identity.clone());
        let resolver = PermissionResolver::with_sentinel(permissions.clone(), sentinel.clone());
        let resolved = resolver.resolve(&actor)?;

        let seen = SeenSetStore::load(kv)?;
        let aggregator = NotificationAggregator::new(
            repo.clone(),
            seen,
            SessionActor {
                id: actor.clone(),
                can_manage: resolved.can_manage(),
            },
            config.notifications.history_limit,
        );
        let gate = Arc::new(RefreshGate::new(
            aggregator,
            sink,
            config.notifications.refresh_timeout_secs,
        ));
        let machine = AuthorizationMachine::new(
            repo,
            PermissionResolver::with_sentinel(permissions, sentinel),
        );

        let active = Arc::new(AtomicBool::new(true));
        let subscription = feed.subscribe(
            Table::Authorizations,
            Arc::new(FeedRefresher {
                gate: gate.clone(),
                active: active.clone(),
            }),
        );

        info!(actor = %actor, can_manage = resolved.can_manage(), "session opened");

        Ok(Self {
            actor,
            machine,
            gate,
            feed,
            subscription: Some(subscription),
            active,
            refresh_timeout_secs: config.notifications.refresh_timeout_secs,
        })
    }

    fn deadline(&self) -> Deadline {
        Deadline::within_seconds(self.refresh_timeout_secs)
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Payment-order operations
    // -----------------------------------------------------------------------

    pub fn create(&self, draft: &AuthorizationDraft) -> RootResult<AuthorizationRecord> {
        let record = self.machine.create(draft, &self.actor, self.deadline())?;
        self.refresh();
        Ok(record)
    }

    pub fn decide(
        &self,
        id: &AuthorizationId,
        verdict: Verdict,
    ) -> RootResult<AuthorizationRecord> {
        let record = self
            .machine
            .transition(id, verdict, &self.actor, self.deadline())?;
        self.refresh();
        Ok(record)
    }

    pub fn update(
        &self,
        id: &AuthorizationId,
        draft: &AuthorizationDraft,
    ) -> RootResult<AuthorizationRecord> {
        let record = self.machine.update(id, draft, &self.actor, self.deadline())?;
        self.refresh();
        Ok(record)
    }

    pub fn delete(&self, id: &AuthorizationId) -> RootResult<()> {
        self.machine.delete(id, &self.actor, self.deadline())?;
        self.refresh();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Refresh through the gate; overlapping requests collapse to one in
    /// flight plus one queued.
    pub fn refresh(&self) {
        self.gate.request_refresh();
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.gate.aggregator().snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.gate.aggregator().unread_count()
    }

    /// Mark one notification seen; returns the view holding the item so
    /// the UI can navigate to it.
    pub fn mark_seen(&self, id: &AuthorizationId) -> RootResult<FocusView> {
        Ok(self.gate.aggregator().mark_seen(id)?)
    }

    pub fn mark_all_seen(&self) -> RootResult<FocusView> {
        Ok(self.gate.aggregator().mark_all_seen()?)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Close the session: unsubscribe from the feed and drop any callback
    /// that is still in flight. Idempotent.
    pub fn teardown(&mut self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            self.feed.unsubscribe(subscription);
        }
        info!(actor = %self.actor, "session closed");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
