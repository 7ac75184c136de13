//! The delivery registry: single shared source of truth for dispatch state.
//!
//! Every mutation takes the write lock for exactly one operation; bulk scans
//! copy the map contents out under the read lock and never do per-item work
//! while holding it. Callers never reach the raw storage.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{RelayError, Result};
use crate::record::{DeliveryRecord, DeliveryStatus, DispatchId};

#[derive(Clone, Debug, Default)]
pub struct DeliveryRegistry {
    records: Arc<RwLock<HashMap<DispatchId, DeliveryRecord>>>,
}

impl DeliveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record. Refuses to overwrite an existing dispatch so an
    /// identifier collision can never clobber live state.
    pub async fn insert(&self, id: DispatchId, record: DeliveryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(RelayError::DuplicateDispatch(id));
        }
        records.insert(id, record);
        Ok(())
    }

    pub async fn status(&self, id: DispatchId) -> Option<DeliveryStatus> {
        let records = self.records.read().await;
        records.get(&id).map(|record| record.status)
    }

    pub async fn get(&self, id: DispatchId) -> Option<DeliveryRecord> {
        let records = self.records.read().await;
        records.get(&id).cloned()
    }

    /// Advance a record to `new`. Backward or skipping transitions are
    /// rejected, so concurrent writers can never push a record off the
    /// `Ongoing -> Finished -> Archived` path.
    ///
    /// `Archived` is never accepted here: archival stamps a transition time
    /// and goes through [`DeliveryRegistry::mark_archived`] only, so an
    /// archived record always carries its timestamp.
    pub async fn advance_status(&self, id: DispatchId, new: DeliveryStatus) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(RelayError::DispatchNotFound(id))?;
        if new == DeliveryStatus::Archived || !record.status.can_advance_to(new) {
            return Err(RelayError::InvalidTransition {
                from: record.status,
                to: new,
            });
        }
        record.status = new;
        Ok(())
    }

    /// Promote a finished record to archived, stamping the transition time in
    /// the same lock acquisition. A concurrent scan can never observe an
    /// archived record without a timestamp.
    ///
    /// Returns `Ok(true)` if the record transitioned, `Ok(false)` if it is
    /// already archived or gone (the sweep is idempotent), and an error if the
    /// record is still ongoing.
    pub async fn mark_archived(&self, id: DispatchId, at: DateTime<Utc>) -> Result<bool> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(false);
        };
        match record.status {
            DeliveryStatus::Finished => {
                record.status = DeliveryStatus::Archived;
                record.archived_at = Some(at);
                Ok(true)
            }
            DeliveryStatus::Archived => Ok(false),
            DeliveryStatus::Ongoing => Err(RelayError::InvalidTransition {
                from: DeliveryStatus::Ongoing,
                to: DeliveryStatus::Archived,
            }),
        }
    }

    /// Remove a record. Returns whether it was present.
    pub async fn remove(&self, id: DispatchId) -> bool {
        let mut records = self.records.write().await;
        records.remove(&id).is_some()
    }

    /// Consistent point-in-time copy for sweep and reap scans.
    pub async fn snapshot(&self) -> Vec<(DispatchId, DeliveryRecord)> {
        let records = self.records.read().await;
        records
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProviderKind;

    #[tokio::test]
    async fn insert_refuses_duplicates() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
            .await
            .unwrap();

        let result = registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Standard))
            .await;
        assert!(matches!(result, Err(RelayError::DuplicateDispatch(_))));

        // Original record survives untouched.
        let record = registry.get(id).await.unwrap();
        assert_eq!(record.provider, ProviderKind::Express);
    }

    #[tokio::test]
    async fn advance_rejects_backward_and_skipping_transitions() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
            .await
            .unwrap();

        let skip = registry.advance_status(id, DeliveryStatus::Archived).await;
        assert!(matches!(skip, Err(RelayError::InvalidTransition { .. })));

        registry
            .advance_status(id, DeliveryStatus::Finished)
            .await
            .unwrap();

        let backward = registry.advance_status(id, DeliveryStatus::Ongoing).await;
        assert!(matches!(backward, Err(RelayError::InvalidTransition { .. })));
        assert_eq!(registry.status(id).await, Some(DeliveryStatus::Finished));
    }

    #[tokio::test]
    async fn advance_unknown_dispatch_fails() {
        let registry = DeliveryRegistry::new();
        let result = registry
            .advance_status(DispatchId::new(), DeliveryStatus::Finished)
            .await;
        assert!(matches!(result, Err(RelayError::DispatchNotFound(_))));
    }

    #[tokio::test]
    async fn archived_is_unreachable_without_a_timestamp() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
            .await
            .unwrap();
        registry
            .advance_status(id, DeliveryStatus::Finished)
            .await
            .unwrap();

        // The plain transition path refuses Archived even from Finished.
        let result = registry.advance_status(id, DeliveryStatus::Archived).await;
        assert!(matches!(result, Err(RelayError::InvalidTransition { .. })));
        let record = registry.get(id).await.unwrap();
        assert_eq!(record.status, DeliveryStatus::Finished);
        assert!(record.archived_at.is_none());

        // The sanctioned path stamps the transition time.
        let at = Utc::now();
        assert!(registry.mark_archived(id, at).await.unwrap());
        let record = registry.get(id).await.unwrap();
        assert_eq!(record.status, DeliveryStatus::Archived);
        assert_eq!(record.archived_at, Some(at));
    }

    #[tokio::test]
    async fn mark_archived_sets_timestamp_exactly_once() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Standard))
            .await
            .unwrap();
        registry
            .advance_status(id, DeliveryStatus::Finished)
            .await
            .unwrap();

        let first = Utc::now();
        assert!(registry.mark_archived(id, first).await.unwrap());

        let record = registry.get(id).await.unwrap();
        assert_eq!(record.status, DeliveryStatus::Archived);
        assert_eq!(record.archived_at, Some(first));

        // Re-archiving is a no-op and keeps the original timestamp.
        let later = first + chrono::TimeDelta::seconds(30);
        assert!(!registry.mark_archived(id, later).await.unwrap());
        assert_eq!(registry.get(id).await.unwrap().archived_at, Some(first));
    }

    #[tokio::test]
    async fn mark_archived_on_ongoing_record_is_an_error() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
            .await
            .unwrap();

        let result = registry.mark_archived(id, Utc::now()).await;
        assert!(matches!(result, Err(RelayError::InvalidTransition { .. })));
        assert_eq!(registry.status(id).await, Some(DeliveryStatus::Ongoing));
    }

    #[tokio::test]
    async fn snapshot_is_a_copy() {
        let registry = DeliveryRegistry::new();
        let id = DispatchId::new();
        registry
            .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
            .await
            .unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);

        registry.remove(id).await;
        // The snapshot still holds the old view.
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn no_lost_updates_under_concurrent_writers() {
        let registry = DeliveryRegistry::new();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = DispatchId::new();
                registry
                    .insert(id, DeliveryRecord::ongoing(ProviderKind::Express))
                    .await
                    .unwrap();
                registry
                    .advance_status(id, DeliveryStatus::Finished)
                    .await
                    .unwrap();
                id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        assert_eq!(registry.len().await, 64);
        for id in ids {
            assert_eq!(registry.status(id).await, Some(DeliveryStatus::Finished));
        }
    }
}
