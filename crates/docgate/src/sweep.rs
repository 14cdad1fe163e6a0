//! Periodic removal of expired custom permissions.
//!
//! The store only reports expired records; deleting them is this job's
//! responsibility. Deletes are by id and the expiry that was read, one
//! record at a time. A record renewed after the scan survives, and a failure
//! part-way leaves the remaining records for the next sweep.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use docgate_store::CustomPermStore;

use crate::error::Result;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Expired records found.
    pub scanned: u64,
    /// Records actually deleted. Lower than `scanned` when a record was
    /// renewed or removed concurrently.
    pub deleted: u64,
}

/// Deletes custom permissions whose expiry has passed.
pub struct ExpirySweeper<S> {
    store: Arc<S>,
}

impl<S> Clone for ExpirySweeper<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CustomPermStore> ExpirySweeper<S> {
    /// Create a sweeper over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Delete every allow/deny record with `end_time < now`.
    pub async fn sweep(&self, now: i64) -> Result<SweepReport> {
        let expired = self.store.get_expire_perm_infos(now).await?;
        let mut report = SweepReport {
            scanned: expired.len() as u64,
            deleted: 0,
        };

        for record in &expired {
            report.deleted += self
                .store
                .delete_custom_perm_by_end_time(record.id, record.end_time)
                .await?;
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                deleted = report.deleted,
                "expired custom permissions swept"
            );
        }
        Ok(report)
    }

    /// [`sweep`](Self::sweep) at the current wall-clock time.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        self.sweep(now_millis()).await
    }

    /// Sweep every `period` until the task is dropped.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_now().await {
                tracing::warn!(error = %e, "expiry sweep failed");
            }
        }
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docgate_core::{AccessorType, CustomPermRecord, GnsPath, PermBits, PermKind, PrincipalId};
    use docgate_store::{MemoryStore, Result as StoreResult};

    /// Extends every expiring grant right after the sweeper has scanned it.
    struct RenewOnScan(MemoryStore);

    #[async_trait]
    impl CustomPermStore for RenewOnScan {
        async fn add_custom_perm(&self, record: &CustomPermRecord) -> StoreResult<i64> {
            self.0.add_custom_perm(record).await
        }
        async fn add_custom_perms(&self, records: &[CustomPermRecord]) -> StoreResult<Vec<i64>> {
            self.0.add_custom_perms(records).await
        }
        async fn update_custom_perm(&self, record: &CustomPermRecord) -> StoreResult<bool> {
            self.0.update_custom_perm(record).await
        }
        async fn delete_custom_perm(&self, id: i64) -> StoreResult<u64> {
            self.0.delete_custom_perm(id).await
        }
        async fn delete_custom_perm_by_end_time(&self, id: i64, end_time: i64) -> StoreResult<u64> {
            self.0.delete_custom_perm_by_end_time(id, end_time).await
        }
        async fn delete_custom_perm_by_file_id(&self, path: &GnsPath) -> StoreResult<u64> {
            self.0.delete_custom_perm_by_file_id(path).await
        }
        async fn delete_custom_perm_by_dir_id(&self, path: &GnsPath) -> StoreResult<u64> {
            self.0.delete_custom_perm_by_dir_id(path).await
        }
        async fn delete_custom_perm_by_user_id(&self, id: &PrincipalId) -> StoreResult<u64> {
            self.0.delete_custom_perm_by_user_id(id).await
        }
        async fn delete_custom_perm_by_doc_user_id(
            &self,
            path: &GnsPath,
            id: &PrincipalId,
        ) -> StoreResult<u64> {
            self.0.delete_custom_perm_by_doc_user_id(path, id).await
        }
        async fn get_custom_perm_by_doc_ids(
            &self,
            paths: &[GnsPath],
        ) -> StoreResult<Vec<CustomPermRecord>> {
            self.0.get_custom_perm_by_doc_ids(paths).await
        }
        async fn get_custom_perm_by_id(&self, id: i64) -> StoreResult<Option<CustomPermRecord>> {
            self.0.get_custom_perm_by_id(id).await
        }
        async fn get_custom_perm_by_end_time(
            &self,
            path: &GnsPath,
            accessor_id: &PrincipalId,
            accessor_type: AccessorType,
            kind: PermKind,
            end_time: i64,
        ) -> StoreResult<Option<CustomPermRecord>> {
            self.0
                .get_custom_perm_by_end_time(path, accessor_id, accessor_type, kind, end_time)
                .await
        }
        async fn get_custom_perms_by_accessor(
            &self,
            id: &PrincipalId,
        ) -> StoreResult<Vec<CustomPermRecord>> {
            self.0.get_custom_perms_by_accessor(id).await
        }
        async fn get_expire_perm_infos(&self, threshold: i64) -> StoreResult<Vec<CustomPermRecord>> {
            let expired = self.0.get_expire_perm_infos(threshold).await?;
            for record in &expired {
                let mut renewed = record.clone();
                renewed.end_time = threshold + 1_000;
                self.0.update_custom_perm(&renewed).await?;
            }
            Ok(expired)
        }
        async fn get_all_custom_perm(&self) -> StoreResult<Vec<CustomPermRecord>> {
            self.0.get_all_custom_perm().await
        }
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_expired() {
        let store = Arc::new(MemoryStore::new());
        let mk = |user: &str| {
            CustomPermRecord::new("/A", user, AccessorType::User, PermKind::Allow, PermBits::READ)
        };
        store
            .add_custom_perms(&[
                mk("u1").expires_at(100),
                mk("u2").expires_at(10_000),
                mk("u3"),
            ])
            .await
            .unwrap();

        let sweeper = ExpirySweeper::new(Arc::clone(&store));
        let report = sweeper.sweep(5_000).await.unwrap();
        assert_eq!(report, SweepReport { scanned: 1, deleted: 1 });

        let left = store.get_all_custom_perm().await.unwrap();
        assert_eq!(left.len(), 2);

        let report = sweeper.sweep(5_000).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_keeps_grant_renewed_after_scan() {
        let store = Arc::new(RenewOnScan(MemoryStore::new()));
        store
            .add_custom_perm(
                &CustomPermRecord::new("/A", "u1", AccessorType::User, PermKind::Allow, PermBits::READ)
                    .expires_at(100),
            )
            .await
            .unwrap();

        let report = ExpirySweeper::new(Arc::clone(&store)).sweep(200).await.unwrap();
        assert_eq!(report, SweepReport { scanned: 1, deleted: 0 });

        let left = store.get_all_custom_perm().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].end_time, 1_200);
    }
}
