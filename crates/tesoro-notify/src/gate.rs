//! Serialization of overlapping refresh requests.
//!
//! Change-feed callbacks and timers can fire from any thread while the UI
//! thread is already mid-refresh or reading a snapshot. The gate guarantees
//! at most one refresh in flight; a request arriving meanwhile is queued
//! (collapsed, not counted) and drained by whichever thread releases the
//! aggregator lock next.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::warn;

use tesoro_core::Deadline;

use crate::aggregator::NotificationAggregator;
use crate::types::AlertSink;

pub struct RefreshGate {
    inner: Mutex<NotificationAggregator>,
    queued: AtomicBool,
    sink: Arc<dyn AlertSink>,
    refresh_timeout_secs: u64,
}

impl RefreshGate {
    pub fn new(
        aggregator: NotificationAggregator,
        sink: Arc<dyn AlertSink>,
        refresh_timeout_secs: u64,
    ) -> Self {
        Self {
            inner: Mutex::new(aggregator),
            queued: AtomicBool::new(false),
            sink,
            refresh_timeout_secs,
        }
    }

    /// Ask for a refresh. Returns immediately when another thread holds the
    /// aggregator; that holder drains the queued request when its guard is
    /// released. Refresh failures are logged, not surfaced, since the caller
    /// is usually a feed callback with nowhere to report.
    pub fn request_refresh(&self) {
        self.queued.store(true, Ordering::SeqCst);
        let guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        // The guard's release path performs the drain.
        drop(AggregatorGuard {
            gate: self,
            guard: Some(guard),
        });
    }

    /// Direct access for same-thread callers (mark-seen, snapshots). Any
    /// refresh queued while the guard is held runs when it drops.
    pub fn aggregator(&self) -> AggregatorGuard<'_> {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        AggregatorGuard {
            gate: self,
            guard: Some(guard),
        }
    }
}

/// Lock guard over the aggregator. Releasing it drains the queued flag, and
/// re-checks after the unlock so a request that raced the release is picked
/// up instead of lost.
pub struct AggregatorGuard<'a> {
    gate: &'a RefreshGate,
    // Some until drop; taken there so the lock can be released mid-drain.
    guard: Option<MutexGuard<'a, NotificationAggregator>>,
}

impl Deref for AggregatorGuard<'_> {
    type Target = NotificationAggregator;

    fn deref(&self) -> &NotificationAggregator {
        match &self.guard {
            Some(guard) => guard,
            None => unreachable!("aggregator guard accessed after release"),
        }
    }
}

impl DerefMut for AggregatorGuard<'_> {
    fn deref_mut(&mut self) -> &mut NotificationAggregator {
        match &mut self.guard {
            Some(guard) => guard,
            None => unreachable!("aggregator guard accessed after release"),
        }
    }
}

impl Drop for AggregatorGuard<'_> {
    fn drop(&mut self) {
        let mut guard = match self.guard.take() {
            Some(guard) => guard,
            None => return,
        };
        loop {
            while self.gate.queued.swap(false, Ordering::SeqCst) {
                // The deadline starts when the request runs, not when it
                // was queued behind a long-held guard.
                let deadline = Deadline::within_seconds(self.gate.refresh_timeout_secs);
                if let Err(err) = guard.refresh(deadline, self.gate.sink.as_ref()) {
                    warn!(error = %err, "queued refresh failed");
                }
            }
            drop(guard);
            // A request may have queued between the last swap and the
            // unlock. Re-acquire and drain it; if another thread already
            // took the lock, its release drains instead.
            if !self.gate.queued.load(Ordering::SeqCst) {
                return;
            }
            guard = match self.gate.inner.try_lock() {
                Ok(reacquired) => reacquired,
                Err(TryLockError::WouldBlock) => return,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
        }
    }
}
