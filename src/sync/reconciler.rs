//! Realtime reconciliation of store change notifications
//!
//! Merge rules:
//! - insert: ignored when the id already exists (redelivery), else prepended
//! - update: replaced in place; an unknown id is prepended (missed insert)
//! - delete: removed; an unknown id is ignored

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::collection::LeadCollection;
use crate::types::{ChangeEvent, ChangeKind, Lead};

/// Next collection state after `event`, or `None` when the event changes
/// nothing.
pub fn reconcile(current: &[Lead], event: &ChangeEvent) -> Option<Vec<Lead>> {
    let record = &event.record;
    let position = current.iter().position(|lead| lead.id == record.id);

    match (event.kind, position) {
        (ChangeKind::Insert, Some(_)) | (ChangeKind::Delete, None) => None,
        (ChangeKind::Insert | ChangeKind::Update, None) => {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.push(record.clone());
            next.extend_from_slice(current);
            Some(next)
        }
        (ChangeKind::Update, Some(idx)) => {
            if current[idx] == *record {
                return None;
            }
            let mut next = current.to_vec();
            next[idx] = record.clone();
            Some(next)
        }
        (ChangeKind::Delete, Some(idx)) => {
            let mut next = current.to_vec();
            next.remove(idx);
            Some(next)
        }
    }
}

/// Why a reconciliation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The session asked it to stop.
    Cancelled,
    /// The store closed the change stream.
    Closed,
}

/// Applies change notifications to the authoritative collection.
#[derive(Debug)]
pub struct RealtimeReconciler {
    collection: LeadCollection,
    applied: AtomicU64,
    ignored: AtomicU64,
}

impl RealtimeReconciler {
    pub fn new(collection: LeadCollection) -> Self {
        Self {
            collection,
            applied: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Apply one event. Returns whether the collection changed.
    pub fn apply(&self, event: &ChangeEvent) -> bool {
        let changed = self.collection.update_with(|current| reconcile(current, event));
        if changed {
            self.applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(kind = %event.kind, id = %event.record.id, changed, "Reconciled change");
        changed
    }

    /// Drain `events` in arrival order until cancelled or the stream ends.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<ChangeEvent>,
        cancel: CancellationToken,
    ) -> StreamExit {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return StreamExit::Cancelled,
                next = events.recv() => match next {
                    Some(event) => {
                        self.apply(&event);
                    }
                    None => return StreamExit::Closed,
                },
            }
        }
    }

    /// (applied, ignored) event counts since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.applied.load(Ordering::Relaxed), self.ignored.load(Ordering::Relaxed))
    }
}
