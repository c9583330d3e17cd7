use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use tesoro_core::{ActorId, AuthorizationId, AuthorizationRecord, Status, Timestamp};

// ---------------------------------------------------------------------------
// Alert — a one-shot "something new happened" signal for the UI layer
// ---------------------------------------------------------------------------

/// An alert emitted at most once per record id per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Alert {
    /// A payment order newly awaiting a decision. Routed only to actors
    /// who can manage payment orders.
    PendingAuthorization {
        id: AuthorizationId,
        description: String,
    },
    /// A payment order the actor created was approved or rejected.
    StatusChanged {
        id: AuthorizationId,
        status: Status,
        description: String,
    },
}

impl Alert {
    pub fn id(&self) -> &AuthorizationId {
        match self {
            Alert::PendingAuthorization { id, .. } => id,
            Alert::StatusChanged { id, .. } => id,
        }
    }
}

/// Delivery target for alerts. The aggregator never blocks on delivery;
/// a sink that needs to defer work should queue internally.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &Alert);
}

/// Collects alerts in memory, for tests and for UIs that poll.
#[derive(Default)]
pub struct InMemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(alerts) => alerts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the collected alerts and empties the sink.
    pub fn drain(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(mut alerts) => std::mem::take(&mut *alerts),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl AlertSink for InMemoryAlertSink {
    fn deliver(&self, alert: &Alert) {
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.push(alert.clone()),
            Err(poisoned) => poisoned.into_inner().push(alert.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Session actor and display items
// ---------------------------------------------------------------------------

/// The aggregator's view of the logged-in actor: identity plus the single
/// capability that changes notification routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionActor {
    pub id: ActorId,
    pub can_manage: bool,
}

/// One row in the notification dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: AuthorizationId,
    pub description: String,
    pub status: Status,
    pub is_rectified: bool,
    pub updated_at: Timestamp,
}

impl NotificationItem {
    pub fn from_record(record: &AuthorizationRecord) -> Self {
        Self {
            id: record.id.clone(),
            description: record.fields.description.clone(),
            status: record.status,
            is_rectified: record.is_rectified,
            updated_at: record.updated_at,
        }
    }
}

/// The display lists the UI renders: unseen first, then seen, with the
/// badge count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationSnapshot {
    pub unseen: Vec<NotificationItem>,
    pub seen: Vec<NotificationItem>,
    pub unread_count: usize,
}

/// Which view the UI should switch to after a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusView {
    Pending,
    History,
}
