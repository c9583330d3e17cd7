use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tesoro_core::{ChangeEvent, ChangeFeed, ChangeListener, SubscriptionId, Table};

/// In-process realtime change feed.
///
/// Carries no payload beyond the typed event: subscribers treat delivery
/// purely as a "re-fetch now" trigger. Listeners run on the publisher's
/// thread, so they must stay short and must not call back into the hub.
pub struct ChangeFeedHub {
    subscribers: Mutex<Vec<(SubscriptionId, Table, Arc<dyn ChangeListener>)>>,
    next_id: AtomicU64,
}

impl ChangeFeedHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver an event to every listener subscribed to its table.
    pub fn publish(&self, event: ChangeEvent) {
        let listeners: Vec<Arc<dyn ChangeListener>> = {
            let subs = match self.subscribers.lock() {
                Ok(subs) => subs,
                Err(poisoned) => poisoned.into_inner(),
            };
            subs.iter()
                .filter(|(_, table, _)| *table == event.table)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        // Deliver outside the lock so a listener may subscribe/unsubscribe.
        for listener in listeners {
            listener.on_change(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.lock() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for ChangeFeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for ChangeFeedHub {
    fn subscribe(&self, table: Table, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push((id, table, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = match self.subscribers.lock() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subs.len();
        subs.retain(|(sub_id, _, _)| *sub_id != id);
        subs.len() < before
    }
}
