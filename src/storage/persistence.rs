//! LeadStore trait: pluggable lead persistence
//!
//! Abstracts where leads live so the dashboard core never talks to a
//! transport directly:
//! - `InMemoryLeadStore`: in-memory store for tests and minimal deployments
//! - `SledLeadStore`: durable embedded store (see `sled_store`)

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::feed::{ChangeFeed, ChangeSubscription, SubscriptionId};
use crate::types::{ChangeEvent, ChangeKind, Lead, LeadId, NewLead, QualificationStatus};

/// Persistence backend for leads.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks. No operation retries internally.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Every lead, newest first.
    async fn load_all(&self) -> Result<Vec<Lead>, StoreError>;

    /// Create a lead from submitted fields.
    async fn insert(&self, fields: NewLead) -> Result<Lead, StoreError>;

    /// Set the qualification of one lead.
    async fn update_qualification(
        &self,
        id: LeadId,
        status: QualificationStatus,
    ) -> Result<(), StoreError>;

    /// Set the qualification of many leads. Success or failure is reported
    /// for the batch as a whole.
    async fn bulk_update_qualification(
        &self,
        ids: &[LeadId],
        status: QualificationStatus,
    ) -> Result<(), StoreError>;

    /// Start receiving change notifications in commit order.
    fn subscribe_to_changes(&self) -> Result<ChangeSubscription, StoreError>;

    /// Release a subscription.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Lead store errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("failed to load leads: {0}")]
    Load(String),
    #[error("invalid lead: {0}")]
    Validation(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("lead {0} not found")]
    NotFound(LeadId),
}

impl StoreError {
    /// Whether the store rejected a mutation (as opposed to a load or
    /// validation problem).
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Persistence(_) | StoreError::NotFound(_))
    }
}

/// In-memory lead store for testing and minimal deployments
///
/// Thread-safe via `RwLock`. Not durable, data is lost on restart. Loads
/// and writes can be switched to fail to exercise rollback paths.
#[derive(Debug)]
pub struct InMemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
    next_id: AtomicI64,
    feed: ChangeFeed,
    load_failure: RwLock<Option<String>>,
    write_failure: RwLock<Option<String>>,
}

impl InMemoryLeadStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_leads(Vec::new())
    }

    /// Create a store seeded with `leads`.
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let max_id = leads.iter().map(|lead| lead.id.0).max().unwrap_or(0);
        Self {
            leads: RwLock::new(leads),
            next_id: AtomicI64::new(max_id.saturating_add(1)),
            feed: ChangeFeed::new(),
            load_failure: RwLock::new(None),
            write_failure: RwLock::new(None),
        }
    }

    /// Make every subsequent `load_all` fail with `reason` (`None` clears).
    pub fn set_load_failure(&self, reason: Option<&str>) {
        *self.load_failure.write().unwrap_or_else(PoisonError::into_inner) =
            reason.map(str::to_string);
    }

    /// Make every subsequent mutation fail with `reason` (`None` clears).
    pub fn set_write_failure(&self, reason: Option<&str>) {
        *self.write_failure.write().unwrap_or_else(PoisonError::into_inner) =
            reason.map(str::to_string);
    }

    /// Apply an externally-originated change (another user's edit, a
    /// webhook insert...) and notify subscribers.
    pub fn push_external(&self, event: ChangeEvent) {
        let mut leads = self.leads.write().unwrap_or_else(PoisonError::into_inner);
        let id = event.record.id;
        let position = leads.iter().position(|lead| lead.id == id);
        match (event.kind, position) {
            (ChangeKind::Delete, Some(idx)) => {
                leads.remove(idx);
            }
            (ChangeKind::Delete, None) => {}
            (_, Some(idx)) => leads[idx] = event.record.clone(),
            (_, None) => leads.push(event.record.clone()),
        }
        self.next_id.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
        self.feed.publish(&event);
    }

    /// End every change stream, as a dropped realtime connection would.
    pub fn close_subscriptions(&self) {
        self.feed.close_all();
    }

    /// Number of live change subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        match self.write_failure.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(reason) => Err(StoreError::Persistence(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryLeadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn load_all(&self) -> Result<Vec<Lead>, StoreError> {
        if let Some(reason) = self.load_failure.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Err(StoreError::Load(reason.clone()));
        }
        let mut leads = self.leads.read().map_err(|e| StoreError::Load(e.to_string()))?.clone();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn insert(&self, fields: NewLead) -> Result<Lead, StoreError> {
        fields.validate().map_err(StoreError::Validation)?;
        self.check_writable()?;

        let mut leads = self
            .leads
            .write()
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        let id = self.next_id.load(Ordering::Relaxed);
        let next = id
            .checked_add(1)
            .ok_or_else(|| StoreError::Persistence("lead id space exhausted".to_string()))?;
        self.next_id.store(next, Ordering::Relaxed);

        let lead = fields.into_lead(LeadId(id), Utc::now());
        leads.push(lead.clone());
        self.feed.publish(&ChangeEvent::insert(lead.clone()));
        Ok(lead)
    }

    async fn update_qualification(
        &self,
        id: LeadId,
        status: QualificationStatus,
    ) -> Result<(), StoreError> {
        self.check_writable()?;

        let mut leads = self
            .leads
            .write()
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        let lead = leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or(StoreError::NotFound(id))?;
        lead.qualification_status = status;

        // Published under the write lock so notifications follow commit order.
        self.feed.publish(&ChangeEvent::update(lead.clone()));
        Ok(())
    }

    async fn bulk_update_qualification(
        &self,
        ids: &[LeadId],
        status: QualificationStatus,
    ) -> Result<(), StoreError> {
        self.check_writable()?;

        let mut leads = self
            .leads
            .write()
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        for lead in leads.iter_mut().filter(|lead| ids.contains(&lead.id)) {
            lead.qualification_status = status;
            self.feed.publish(&ChangeEvent::update(lead.clone()));
        }
        Ok(())
    }

    fn subscribe_to_changes(&self) -> Result<ChangeSubscription, StoreError> {
        Ok(self.feed.subscribe())
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.unsubscribe(id);
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn seeded() -> InMemoryLeadStore {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let leads = (1..=3)
            .map(|i| Lead::new(LeadId(i), base + Duration::days(i)))
            .collect();
        InMemoryLeadStore::with_leads(leads)
    }

    #[tokio::test]
    async fn test_load_all_is_newest_first() {
        let store = seeded();
        let ids: Vec<i64> = store.load_all().await.unwrap().iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_load_failure() {
        let store = seeded();
        store.set_load_failure(Some("connection refused"));
        assert_eq!(
            store.load_all().await,
            Err(StoreError::Load("connection refused".into()))
        );
    }

    #[tokio::test]
    async fn test_insert_assigns_next_id_and_notifies() {
        let store = seeded();
        let mut sub = store.subscribe_to_changes().unwrap();

        let lead = store
            .insert(NewLead { name: "Joana".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(lead.id, LeadId(4));

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record, lead);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_fields() {
        let store = seeded();
        let result = store.insert(NewLead::default()).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.load_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_lead() {
        let store = seeded();
        let result = store.update_qualification(LeadId(99), QualificationStatus::Hot).await;
        assert_eq!(result, Err(StoreError::NotFound(LeadId(99))));
        assert!(result.unwrap_err().is_persistence());
    }

    #[tokio::test]
    async fn test_bulk_update_and_write_failure() {
        let store = seeded();
        store
            .bulk_update_qualification(&[LeadId(1), LeadId(3)], QualificationStatus::Warm)
            .await
            .unwrap();
        let leads = store.load_all().await.unwrap();
        let warm: Vec<i64> = leads
            .iter()
            .filter(|l| l.qualification_status == QualificationStatus::Warm)
            .map(|l| l.id.0)
            .collect();
        assert_eq!(warm, vec![3, 1]);

        store.set_write_failure(Some("timeout"));
        let result = store
            .bulk_update_qualification(&[LeadId(2)], QualificationStatus::Won)
            .await;
        assert_eq!(result, Err(StoreError::Persistence("timeout".into())));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_notify_in_commit_order() {
        let store = std::sync::Arc::new(seeded());
        let mut sub = store.subscribe_to_changes().unwrap();
        let statuses = [
            QualificationStatus::Hot,
            QualificationStatus::Warm,
            QualificationStatus::Cold,
            QualificationStatus::Won,
        ];

        let writers: Vec<_> = (0..64)
            .map(|i| {
                let store = store.clone();
                let status = statuses[i % statuses.len()];
                tokio::spawn(async move {
                    store.update_qualification(LeadId(1), status).await.unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let mut last = None;
        while let Ok(event) = sub.events.try_recv() {
            last = Some(event.record.qualification_status);
        }
        let stored = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.id == LeadId(1))
            .unwrap();
        assert_eq!(last, Some(stored.qualification_status));
    }

    #[tokio::test]
    async fn test_insert_fails_when_ids_are_exhausted() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let store = InMemoryLeadStore::with_leads(vec![Lead::new(LeadId(i64::MAX), base)]);
        let result = store.insert(NewLead { name: "Ana".into(), ..Default::default() }).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn LeadStore> = Box::new(InMemoryLeadStore::new());
        assert_eq!(store.backend_name(), "InMemory");
    }
}
