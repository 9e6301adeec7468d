//! Sled-backed lead store
//!
//! Leads live in the `leads` tree keyed by id as big-endian bytes, with
//! JSON-serialized values. Bulk qualification changes are applied as a
//! single `sled::Batch`, so the batch either lands entirely or not at all.
//!
//! The highest id ever stored is kept in the `meta` tree. New ids are
//! allocated from it rather than from the last key, since negative ids sort
//! after positive ones in big-endian order.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::feed::{ChangeFeed, ChangeSubscription, SubscriptionId};
use super::persistence::{LeadStore, StoreError};
use crate::types::{ChangeEvent, Lead, LeadId, NewLead, QualificationStatus};

const LEADS_TREE: &str = "leads";
const META_TREE: &str = "meta";
const LAST_ID_KEY: &[u8] = b"last_lead_id";

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Durable lead store on an embedded sled database.
#[derive(Clone)]
pub struct SledLeadStore {
    db: Arc<sled::Db>,
    leads: sled::Tree,
    meta: sled::Tree,
    feed: Arc<ChangeFeed>,
    /// Serializes writes so ids are unique and notifications follow commit
    /// order.
    write_lock: Arc<Mutex<()>>,
}

impl SledLeadStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let leads = db.open_tree(LEADS_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        if meta.get(LAST_ID_KEY)?.is_none() {
            let mut highest: i64 = 0;
            for k in leads.iter().keys() {
                highest = highest.max(decode_key(&k?)?.0);
            }
            meta.insert(LAST_ID_KEY, highest.to_be_bytes().to_vec())?;
        }

        tracing::info!(path = ?path_ref, count = leads.len(), "Lead store opened");

        Ok(Self {
            db: Arc::new(db),
            leads,
            meta,
            feed: Arc::new(ChangeFeed::new()),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write `leads` as-is (ids preserved), replacing existing records with
    /// the same id. Returns the number written.
    pub fn import(&self, leads: &[Lead]) -> Result<usize, StoreError> {
        let mut batch = sled::Batch::default();
        for lead in leads {
            batch.insert(key(lead.id).to_vec(), serde_json::to_vec(lead)?);
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(highest) = leads.iter().map(|lead| lead.id.0).max() {
            self.raise_last_id(highest)?;
        }
        self.leads.apply_batch(batch)?;
        self.db.flush()?;
        tracing::info!(count = leads.len(), "Imported leads");
        Ok(leads.len())
    }

    /// Number of stored leads
    pub fn count(&self) -> usize {
        self.leads.len()
    }

    fn get(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        match self.leads.get(key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn last_id(&self) -> Result<i64, StoreError> {
        Ok(self.meta.get(LAST_ID_KEY)?.map_or(0, |bytes| decode_counter(&bytes)))
    }

    fn raise_last_id(&self, id: i64) -> Result<(), StoreError> {
        self.meta.fetch_and_update(LAST_ID_KEY, |old| {
            let current = old.map_or(0, decode_counter);
            Some(current.max(id).to_be_bytes().to_vec())
        })?;
        Ok(())
    }

    /// Reserve the id after the highest one ever stored. Callers hold
    /// `write_lock`.
    fn next_id(&self) -> Result<LeadId, StoreError> {
        let next = self
            .last_id()?
            .checked_add(1)
            .ok_or_else(|| StoreError::Persistence("lead id space exhausted".to_string()))?;
        self.raise_last_id(next)?;
        Ok(LeadId(next))
    }
}

fn key(id: LeadId) -> [u8; 8] {
    id.0.to_be_bytes()
}

fn decode_key(bytes: &[u8]) -> Result<LeadId, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Persistence(format!("corrupt lead key ({} bytes)", bytes.len())))?;
    Ok(LeadId(i64::from_be_bytes(raw)))
}

fn decode_counter(bytes: &[u8]) -> i64 {
    <[u8; 8]>::try_from(bytes).map_or(0, i64::from_be_bytes)
}

/// Key as shown in error messages: the lead id when it decodes.
fn describe_key(bytes: &[u8]) -> String {
    decode_key(bytes).map_or_else(|_| format!("{bytes:?}"), |id| id.to_string())
}

#[async_trait]
impl LeadStore for SledLeadStore {
    async fn load_all(&self) -> Result<Vec<Lead>, StoreError> {
        let mut leads = Vec::with_capacity(self.leads.len());
        for item in self.leads.iter() {
            let (key, value) = item.map_err(|e| StoreError::Load(e.to_string()))?;
            let lead = serde_json::from_slice::<Lead>(&value).map_err(|e| {
                tracing::error!(key = %describe_key(&key), error = %e, "Unreadable lead record");
                StoreError::Load(format!("unreadable lead record {}: {e}", describe_key(&key)))
            })?;
            leads.push(lead);
        }
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tracing::debug!(count = leads.len(), "Loaded leads from sled");
        Ok(leads)
    }

    async fn insert(&self, fields: NewLead) -> Result<Lead, StoreError> {
        fields.validate().map_err(StoreError::Validation)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let lead = fields.into_lead(self.next_id()?, Utc::now());
        self.leads.insert(key(lead.id), serde_json::to_vec(&lead)?)?;
        self.leads.flush()?;

        self.feed.publish(&ChangeEvent::insert(lead.clone()));
        Ok(lead)
    }

    async fn update_qualification(
        &self,
        id: LeadId,
        status: QualificationStatus,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let lead = self
            .get(id)?
            .ok_or(StoreError::NotFound(id))?
            .with_qualification(status);
        self.leads.insert(key(id), serde_json::to_vec(&lead)?)?;
        self.leads.flush()?;

        self.feed.publish(&ChangeEvent::update(lead));
        Ok(())
    }

    async fn bulk_update_qualification(
        &self,
        ids: &[LeadId],
        status: QualificationStatus,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut batch = sled::Batch::default();
        let mut updated = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(lead) = self.get(id)? {
                let lead = lead.with_qualification(status);
                batch.insert(key(id).to_vec(), serde_json::to_vec(&lead)?);
                updated.push(lead);
            }
        }
        self.leads.apply_batch(batch)?;
        self.leads.flush()?;

        tracing::debug!(requested = ids.len(), updated = updated.len(), %status, "Bulk qualification stored");
        for lead in updated {
            self.feed.publish(&ChangeEvent::update(lead));
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
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample(id: i64, day_offset: i64) -> Lead {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        Lead {
            name: Some(format!("Lead {id}")),
            ..Lead::new(LeadId(id), base + Duration::days(day_offset))
        }
    }

    #[tokio::test]
    async fn test_import_and_load_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(1, 0), sample(2, 5), sample(3, 2)]).unwrap();

        let ids: Vec<i64> = store.load_all().await.unwrap().iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_insert_continues_after_highest_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(7, 0)]).unwrap();

        let lead = store
            .insert(NewLead { name: "Marcos".into(), source: Some("website".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(lead.id, LeadId(8));
        assert_eq!(store.count(), 2);
    }

    #[tokio::test]
    async fn test_negative_imported_id_does_not_reuse_insert_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(-1, 0), sample(5, 1)]).unwrap();

        let a = store.insert(NewLead { name: "Ana".into(), ..Default::default() }).await.unwrap();
        let b = store.insert(NewLead { name: "Bruno".into(), ..Default::default() }).await.unwrap();
        assert_eq!((a.id, b.id), (LeadId(6), LeadId(7)));
        assert_eq!(store.count(), 4);
    }

    #[tokio::test]
    async fn test_id_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledLeadStore::open(dir.path()).unwrap();
            store.import(&[sample(3, 0)]).unwrap();
            store.insert(NewLead { name: "Ana".into(), ..Default::default() }).await.unwrap();
        }
        let store = SledLeadStore::open(dir.path()).unwrap();
        let lead = store.insert(NewLead { name: "Bruno".into(), ..Default::default() }).await.unwrap();
        assert_eq!(lead.id, LeadId(5));
    }

    #[tokio::test]
    async fn test_insert_fails_when_ids_are_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(i64::MAX, 0)]).unwrap();

        let result = store.insert(NewLead { name: "Ana".into(), ..Default::default() }).await;
        assert!(matches!(result, Err(StoreError::Persistence(_))));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_record_fails_the_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(1, 0)]).unwrap();
        store.leads.insert(key(LeadId(2)), b"not json".to_vec()).unwrap();

        match store.load_all().await {
            Err(StoreError::Load(message)) => assert!(message.contains("lead record 2"), "{message}"),
            other => panic!("expected a load error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bulk_update_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        store.import(&[sample(1, 0), sample(2, 1)]).unwrap();
        let mut sub = store.subscribe_to_changes().unwrap();

        store
            .bulk_update_qualification(&[LeadId(1), LeadId(2), LeadId(42)], QualificationStatus::Hot)
            .await
            .unwrap();

        let leads = store.load_all().await.unwrap();
        assert!(leads.iter().all(|l| l.qualification_status == QualificationStatus::Hot));
        assert_eq!(sub.events.recv().await.unwrap().record.id, LeadId(1));
        assert_eq!(sub.events.recv().await.unwrap().record.id, LeadId(2));
    }

    #[tokio::test]
    async fn test_update_unknown_lead_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledLeadStore::open(dir.path()).unwrap();
        let result = store.update_qualification(LeadId(5), QualificationStatus::Cold).await;
        assert_eq!(result, Err(StoreError::NotFound(LeadId(5))));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledLeadStore::open(dir.path()).unwrap();
            store.import(&[sample(1, 0)]).unwrap();
        }
        let store = SledLeadStore::open(dir.path()).unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
