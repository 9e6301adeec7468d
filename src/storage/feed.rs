//! Per-subscriber change feed shared by the store backends
//!
//! Each subscriber owns an unbounded mpsc receiver so notifications are
//! delivered losslessly and in publish order. Dropping the receiver or
//! calling `unsubscribe` releases the slot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::types::ChangeEvent;

/// Handle identifying one change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An active subscription: its handle plus the ordered event stream.
#[derive(Debug)]
pub struct ChangeSubscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Fan-out of change events to every live subscriber.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<ChangeEvent>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> ChangeSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        tracing::debug!(subscription = %id, "Change subscriber registered");
        ChangeSubscription { id, events: rx }
    }

    /// Release a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            tracing::debug!(subscription = %id, "Change subscriber released");
        }
    }

    /// Deliver `event` to every subscriber, dropping any whose receiver is
    /// gone.
    pub fn publish(&self, event: &ChangeEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                tracing::debug!(subscription = %id, "Dropping closed change subscriber");
            }
            alive
        });
    }

    /// Drop every subscriber, ending their streams.
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(count = subscribers.len(), "Closing all change subscribers");
        subscribers.clear();
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
