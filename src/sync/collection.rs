//! Authoritative in-memory lead collection
//!
//! The collection is a `watch` channel of immutable snapshots. Every write
//! builds a new `Vec` and swaps it in whole, so readers never observe a
//! half-applied change, and observers are woken once per swap.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{Lead, LeadId, QualificationStatus};

/// Immutable view of the collection at one instant, newest lead first.
pub type Snapshot = Arc<Vec<Lead>>;

/// Single owner of the dashboard's lead list. Cloning shares the same
/// underlying collection.
#[derive(Debug, Clone)]
pub struct LeadCollection {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl LeadCollection {
    /// Build from an initial load. Duplicate ids keep their first
    /// occurrence.
    pub fn new(leads: Vec<Lead>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(dedup_by_id(leads)));
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Observe snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the lead with `id`, if present.
    pub fn get(&self, id: LeadId) -> Option<Lead> {
        self.tx.borrow().iter().find(|lead| lead.id == id).cloned()
    }

    /// Swap in a whole new list (initial load, reload, rollback).
    pub fn replace(&self, leads: Snapshot) {
        self.tx.send_replace(leads);
    }

    /// Replace the collection with `f(current)` when it returns `Some`.
    /// Returns whether a new snapshot was published.
    pub fn update_with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&[Lead]) -> Option<Vec<Lead>>,
    {
        self.tx.send_if_modified(|current| match f(current.as_slice()) {
            Some(next) => {
                *current = Arc::new(next);
                true
            }
            None => false,
        })
    }

    /// Set `status` on every listed lead that is present and differs.
    /// Returns the number of leads changed.
    pub fn set_qualification(&self, ids: &[LeadId], status: QualificationStatus) -> usize {
        let targets: HashSet<LeadId> = ids.iter().copied().collect();
        let mut changed = 0;
        self.update_with(|current| {
            let next: Vec<Lead> = current
                .iter()
                .map(|lead| {
                    if targets.contains(&lead.id) && lead.qualification_status != status {
                        changed += 1;
                        lead.with_qualification(status)
                    } else {
                        lead.clone()
                    }
                })
                .collect();
            (changed > 0).then_some(next)
        });
        changed
    }

    /// Put back the status each of `ids` had in `previous`, leaving every
    /// other lead as it is now. Leads inserted or removed since `previous`
    /// stay that way. Returns whether a new snapshot was published.
    pub fn restore_qualification(&self, previous: &[Lead], ids: &[LeadId]) -> bool {
        let targets: HashSet<LeadId> = ids.iter().copied().collect();
        let before: HashMap<LeadId, QualificationStatus> = previous
            .iter()
            .filter(|lead| targets.contains(&lead.id))
            .map(|lead| (lead.id, lead.qualification_status))
            .collect();

        self.update_with(|current| {
            let mut restored = false;
            let next: Vec<Lead> = current
                .iter()
                .map(|lead| match before.get(&lead.id) {
                    Some(&status) if status != lead.qualification_status => {
                        restored = true;
                        lead.with_qualification(status)
                    }
                    _ => lead.clone(),
                })
                .collect();
            restored.then_some(next)
        })
    }
}

fn dedup_by_id(leads: Vec<Lead>) -> Vec<Lead> {
    let mut seen = HashSet::with_capacity(leads.len());
    let total = leads.len();
    let unique: Vec<Lead> = leads.into_iter().filter(|lead| seen.insert(lead.id)).collect();
    if unique.len() != total {
        tracing::warn!(dropped = total - unique.len(), "Dropped duplicate lead ids from initial load");
    }
    unique
}
