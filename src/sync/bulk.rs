//! Optimistic qualification changes with all-or-nothing rollback
//!
//! Every mutation follows the same steps: snapshot the collection, apply
//! the change locally, ask the store, and on any store failure put the
//! targeted leads back to their snapshot status and raise an error notice.
//! Realtime changes to other leads that land while the store call is in
//! flight are kept.

use std::sync::{Arc, Mutex, PoisonError};

use super::collection::LeadCollection;
use super::notice::NoticeBus;
use crate::analytics::AnnotatedLead;
use crate::storage::{LeadStore, StoreError};
use crate::types::{LeadId, QualificationStatus};

/// Result of a mutation request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Empty target set or no status given; nothing was sent.
    Ignored,
    /// The store accepted the change. `changed` counts local leads whose
    /// status actually moved.
    Applied { changed: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("qualification change for {count} lead(s) rolled back: {source}")]
    RolledBack {
        count: usize,
        #[source]
        source: StoreError,
    },
}

/// Writes qualification changes through the store and keeps the pending
/// row selection.
pub struct BulkMutationCoordinator {
    collection: LeadCollection,
    store: Arc<dyn LeadStore>,
    notices: NoticeBus,
    selection: Mutex<Vec<LeadId>>,
}

impl BulkMutationCoordinator {
    pub fn new(collection: LeadCollection, store: Arc<dyn LeadStore>, notices: NoticeBus) -> Self {
        Self {
            collection,
            store,
            notices,
            selection: Mutex::new(Vec::new()),
        }
    }

    // ========================================================================
    // Row selection
    // ========================================================================

    /// Select `id` if unselected, else unselect it. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&self, id: LeadId) -> bool {
        let mut selection = self.selection.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(idx) = selection.iter().position(|&s| s == id) {
            selection.remove(idx);
            false
        } else {
            selection.push(id);
            true
        }
    }

    /// Select every row of `rows`, or clear the selection when all of them
    /// are already selected.
    pub fn select_all(&self, rows: &[AnnotatedLead<'_>]) {
        let mut selection = self.selection.lock().unwrap_or_else(PoisonError::into_inner);
        let all_selected = !rows.is_empty() && rows.iter().all(|row| selection.contains(&row.lead.id));
        selection.clear();
        if !all_selected {
            selection.extend(rows.iter().map(|row| row.lead.id));
        }
    }

    pub fn clear_selection(&self) {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Selected ids in selection order.
    pub fn selected(&self) -> Vec<LeadId> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Set `status` on every lead in `ids`.
    ///
    /// On success the optimistic state stays and the selection is cleared.
    /// On failure every targeted lead gets its pre-call status back, an
    /// error notice is emitted, and the selection is kept.
    pub async fn bulk_update(
        &self,
        ids: &[LeadId],
        status: Option<QualificationStatus>,
    ) -> Result<MutationOutcome, MutationError> {
        let Some(status) = status.filter(|_| !ids.is_empty()) else {
            tracing::debug!(ids = ids.len(), "Ignoring bulk update without targets or status");
            return Ok(MutationOutcome::Ignored);
        };

        let snapshot = self.collection.snapshot();
        let changed = self.collection.set_qualification(ids, status);

        match self.store.bulk_update_qualification(ids, status).await {
            Ok(()) => {
                self.clear_selection();
                tracing::info!(requested = ids.len(), changed, %status, "Bulk qualification applied");
                self.notices.info(format!("{} lead(s) atualizados para {}", ids.len(), status.label()));
                Ok(MutationOutcome::Applied { changed })
            }
            Err(source) => {
                self.collection.restore_qualification(&snapshot, ids);
                tracing::error!(
                    requested = ids.len(),
                    %status,
                    backend = self.store.backend_name(),
                    error = %source,
                    "Bulk qualification rejected, rolled back"
                );
                self.notices.error(format!("Erro ao atualizar leads: {source}"));
                Err(MutationError::RolledBack { count: ids.len(), source })
            }
        }
    }

    /// Bulk-update the current selection.
    pub async fn bulk_update_selection(
        &self,
        status: Option<QualificationStatus>,
    ) -> Result<MutationOutcome, MutationError> {
        let ids = self.selected();
        self.bulk_update(&ids, status).await
    }

    /// Set `status` on one lead, rolling back on failure. Does not touch
    /// the selection.
    pub async fn change_qualification(
        &self,
        id: LeadId,
        status: QualificationStatus,
    ) -> Result<MutationOutcome, MutationError> {
        let snapshot = self.collection.snapshot();
        let changed = self.collection.set_qualification(&[id], status);

        match self.store.update_qualification(id, status).await {
            Ok(()) => {
                tracing::info!(%id, %status, "Qualification changed");
                Ok(MutationOutcome::Applied { changed })
            }
            Err(source) => {
                self.collection.restore_qualification(&snapshot, &[id]);
                tracing::error!(%id, %status, error = %source, "Qualification change rejected, rolled back");
                self.notices.error(format!("Erro ao atualizar lead {id}: {source}"));
                Err(MutationError::RolledBack { count: 1, source })
            }
        }
    }
}
