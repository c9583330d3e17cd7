//! Notification aggregation for the tesoro back office.
//!
//! Turns the raw pending and history lists into per-actor alerts and an
//! unread badge, with dedup persisted across sessions:
//!
//! - [`SeenSetStore`]: seen ids as JSON under a versioned key.
//! - [`NotificationAggregator`]: cold-start guard, known-id diffing,
//!   unread count and the mark-seen operations.
//! - [`RefreshGate`]: collapses overlapping refresh requests to at most
//!   one in flight plus one queued.
//! - [`AlertSink`]: delivery seam, with an in-memory sink for tests.

pub mod aggregator;
pub mod error;
pub mod gate;
pub mod seen;
pub mod types;

pub use aggregator::NotificationAggregator;
pub use error::{NotifyError, NotifyResult};
pub use gate::{AggregatorGuard, RefreshGate};
pub use seen::{SeenSetStore, SEEN_SCHEMA_VERSION};
pub use types::{
    Alert, AlertSink, FocusView, InMemoryAlertSink, NotificationItem, NotificationSnapshot,
    SessionActor,
};
