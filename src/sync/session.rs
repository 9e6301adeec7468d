//! Dashboard session lifecycle
//!
//! A session owns one authoritative collection for as long as the dashboard
//! is open:
//!
//! 1. subscribe to store changes (before loading, so nothing committed
//!    during the load is missed; reconciliation is idempotent)
//! 2. load every lead; a load failure ends startup with no partial data
//! 3. drive the reconciler from a background task
//! 4. on shutdown cancel the task and release the subscription
//!
//! If the store closes the change stream while the session is live, the
//! task resubscribes and reloads the collection once.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::bulk::{BulkMutationCoordinator, MutationError, MutationOutcome};
use super::collection::{LeadCollection, Snapshot};
use super::notice::{Notice, NoticeBus};
use super::reconciler::{RealtimeReconciler, StreamExit};
use crate::analytics::{
    annotate, daily_counts, metrics_view, table_view, DailyCount, DashboardMetrics,
    FilterCriteria, MetricsAggregator, Origin,
};
use crate::config::defaults;
use crate::storage::{ChangeSubscription, LeadStore, StoreError, SubscriptionId};
use crate::types::{ChangeEvent, Lead, LeadId, NewLead, QualificationStatus};

/// Startup parameters for a [`DashboardSession`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Filters in effect when the session opens.
    pub criteria: FilterCriteria,
    pub notice_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            criteria: FilterCriteria::default(),
            notice_capacity: defaults::NOTICE_CAPACITY,
        }
    }
}

/// One table row with its derived origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRow {
    #[serde(flatten)]
    pub lead: Lead,
    pub origin: Origin,
}

/// Everything the dashboard renders for one snapshot and filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub criteria: FilterCriteria,
    pub rows: Vec<LeadRow>,
    pub metrics: DashboardMetrics,
    pub daily: Vec<DailyCount>,
    pub generated_at: DateTime<Utc>,
}

/// A live dashboard over one [`LeadStore`].
pub struct DashboardSession {
    store: Arc<dyn LeadStore>,
    collection: LeadCollection,
    notices: NoticeBus,
    mutations: BulkMutationCoordinator,
    reconciler: Arc<RealtimeReconciler>,
    criteria: RwLock<FilterCriteria>,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DashboardSession {
    /// Subscribe, load, and start reconciling.
    pub async fn start(store: Arc<dyn LeadStore>, settings: SessionSettings) -> Result<Self, StoreError> {
        let ChangeSubscription { id, events } = store.subscribe_to_changes()?;

        let leads = match store.load_all().await {
            Ok(leads) => leads,
            Err(e) => {
                store.unsubscribe(id);
                tracing::error!(backend = store.backend_name(), error = %e, "Initial lead load failed");
                return Err(e);
            }
        };

        let collection = LeadCollection::new(leads);
        let notices = NoticeBus::new(settings.notice_capacity);
        let reconciler = Arc::new(RealtimeReconciler::new(collection.clone()));
        let mutations = BulkMutationCoordinator::new(collection.clone(), store.clone(), notices.clone());
        let subscription = Arc::new(Mutex::new(Some(id)));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(reconcile_loop(
            store.clone(),
            collection.clone(),
            reconciler.clone(),
            subscription.clone(),
            events,
            cancel.clone(),
        ));

        tracing::info!(
            backend = store.backend_name(),
            leads = collection.len(),
            subscription = %id,
            range = %settings.criteria.range,
            "Dashboard session started"
        );

        Ok(Self {
            store,
            collection,
            notices,
            mutations,
            reconciler,
            criteria: RwLock::new(settings.criteria),
            subscription,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn snapshot(&self) -> Snapshot {
        self.collection.snapshot()
    }

    /// Observe collection snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.collection.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn collection(&self) -> &LeadCollection {
        &self.collection
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.criteria.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_criteria(&self, criteria: FilterCriteria) {
        tracing::debug!(range = %criteria.range, search = %criteria.search, "Filters changed");
        *self.criteria.write().unwrap_or_else(PoisonError::into_inner) = criteria;
    }

    /// Rows of the table under the current filters.
    pub fn table(&self) -> Vec<LeadRow> {
        let snapshot = self.snapshot();
        let annotated = annotate(&snapshot);
        table_view(&annotated, &self.criteria())
            .into_iter()
            .map(|entry| LeadRow { lead: entry.lead.clone(), origin: entry.origin })
            .collect()
    }

    pub fn metrics(&self) -> DashboardMetrics {
        MetricsAggregator::new().compute(&self.snapshot(), &self.criteria())
    }

    pub fn daily_counts(&self) -> Vec<DailyCount> {
        let snapshot = self.snapshot();
        let criteria = self.criteria();
        let annotated = annotate(&snapshot);
        daily_counts(&metrics_view(&annotated, &criteria), &criteria.range)
    }

    /// Table, cards and chart computed from one snapshot.
    pub fn view(&self) -> DashboardView {
        let snapshot = self.snapshot();
        let criteria = self.criteria();
        let annotated = annotate(&snapshot);

        let rows = table_view(&annotated, &criteria)
            .into_iter()
            .map(|entry| LeadRow { lead: entry.lead.clone(), origin: entry.origin })
            .collect();
        let daily = daily_counts(&metrics_view(&annotated, &criteria), &criteria.range);
        let metrics = MetricsAggregator::new().compute(&snapshot, &criteria);

        DashboardView { criteria, rows, metrics, daily, generated_at: Utc::now() }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a lead in the store and show it immediately. The store's own
    /// insert notification is then a no-op.
    pub async fn add_lead(&self, fields: NewLead) -> Result<Lead, StoreError> {
        match self.store.insert(fields).await {
            Ok(lead) => {
                self.reconciler.apply(&ChangeEvent::insert(lead.clone()));
                tracing::info!(id = %lead.id, "Lead added");
                self.notices.info("Lead adicionado com sucesso");
                Ok(lead)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lead insert rejected");
                self.notices.error(format!("Erro ao adicionar lead: {e}"));
                Err(e)
            }
        }
    }

    pub fn mutations(&self) -> &BulkMutationCoordinator {
        &self.mutations
    }

    /// Select every row of the current table, or clear when all are
    /// already selected.
    pub fn select_all_visible(&self) {
        let snapshot = self.snapshot();
        let annotated = annotate(&snapshot);
        self.mutations.select_all(&table_view(&annotated, &self.criteria()));
    }

    pub async fn change_qualification(
        &self,
        id: LeadId,
        status: QualificationStatus,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutations.change_qualification(id, status).await
    }

    pub async fn bulk_update(
        &self,
        ids: &[LeadId],
        status: Option<QualificationStatus>,
    ) -> Result<MutationOutcome, MutationError> {
        self.mutations.bulk_update(ids, status).await
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Stop reconciling and release the store subscription.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Reconcile task ended abnormally");
            }
        }

        let id = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(id) = id {
            self.store.unsubscribe(id);
        }

        let (applied, ignored) = self.reconciler.stats();
        tracing::info!(applied, ignored, "Dashboard session closed");
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        let id = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(id) = id {
            self.store.unsubscribe(id);
        }
    }
}

async fn reconcile_loop(
    store: Arc<dyn LeadStore>,
    collection: LeadCollection,
    reconciler: Arc<RealtimeReconciler>,
    subscription: Arc<Mutex<Option<SubscriptionId>>>,
    events: tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
) {
    if reconciler.run(events, cancel.clone()).await == StreamExit::Cancelled {
        return;
    }

    tracing::warn!(backend = store.backend_name(), "Change stream closed, reloading leads");
    let Some(events) = resubscribe_and_reload(&*store, &collection, &subscription).await else {
        return;
    };

    if reconciler.run(events, cancel).await == StreamExit::Closed {
        tracing::warn!("Change stream closed again, realtime updates stopped");
    }
}

async fn resubscribe_and_reload(
    store: &dyn LeadStore,
    collection: &LeadCollection,
    subscription: &Mutex<Option<SubscriptionId>>,
) -> Option<tokio::sync::mpsc::UnboundedReceiver<ChangeEvent>> {
    let ChangeSubscription { id, events } = match store.subscribe_to_changes() {
        Ok(sub) => sub,
        Err(e) => {
            tracing::error!(error = %e, "Resubscribe failed, realtime updates stopped");
            return None;
        }
    };
    if let Some(old) = subscription.lock().unwrap_or_else(PoisonError::into_inner).replace(id) {
        store.unsubscribe(old);
    }

    match store.load_all().await {
        Ok(leads) => {
            let fresh = LeadCollection::new(leads).snapshot();
            tracing::info!(leads = fresh.len(), subscription = %id, "Collection reloaded");
            collection.replace(fresh);
        }
        Err(e) => {
            // Keep the stale collection; new events still reconcile onto it.
            tracing::error!(error = %e, "Reload after stream loss failed");
        }
    }
    Some(events)
}
