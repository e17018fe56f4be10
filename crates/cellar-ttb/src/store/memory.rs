//! In-memory store and cache implementations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use cellar_core::{BatchId, CellarError, OrganizationId, Result, SnapshotId};

use super::{
    CacheScope, LegacyBatchRecord, NewLegacyBatch, OnboardingStore, OnboardingTransaction,
    OnboardingWrites, ReadCacheInvalidator,
};
use crate::balances::OpeningBalanceSnapshot;
use crate::snapshot::{ReconciliationSnapshot, ReconciliationSnapshotRecord};

/// Store operation that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    SaveOpeningBalances,
    CreateLegacyBatch,
    SaveReconciliationSnapshot,
    MarkOnboardingComplete,
    TransactionCommit,
}

#[derive(Debug, Default)]
struct StoreData {
    opening_balances: HashMap<OrganizationId, OpeningBalanceSnapshot>,
    legacy_batches: HashMap<OrganizationId, Vec<LegacyBatchRecord>>,
    snapshots: HashMap<OrganizationId, Vec<ReconciliationSnapshotRecord>>,
    completed_at: HashMap<OrganizationId, DateTime<Utc>>,
}

/// A write, staged or applied.
#[derive(Debug)]
enum Write {
    OpeningBalances(OrganizationId, OpeningBalanceSnapshot),
    LegacyBatch(LegacyBatchRecord),
    Snapshot(ReconciliationSnapshotRecord),
    Completed(OrganizationId, DateTime<Utc>),
}

impl StoreData {
    fn apply(&mut self, write: Write) {
        match write {
            Write::OpeningBalances(org, snapshot) => {
                self.opening_balances.insert(org, snapshot);
            }
            Write::LegacyBatch(record) => {
                self.legacy_batches
                    .entry(record.organization_id)
                    .or_default()
                    .push(record);
            }
            Write::Snapshot(record) => {
                self.snapshots
                    .entry(record.organization_id)
                    .or_default()
                    .push(record);
            }
            Write::Completed(org, at) => {
                self.completed_at.insert(org, at);
            }
        }
    }
}

type Failures = Arc<RwLock<HashSet<FailurePoint>>>;

async fn check(failures: &Failures, point: FailurePoint) -> Result<()> {
    if failures.read().await.contains(&point) {
        let message = format!("injected failure at {point:?}");
        return Err(CellarError::storage(message));
    }
    Ok(())
}

fn legacy_record(organization_id: OrganizationId, batch: &NewLegacyBatch) -> LegacyBatchRecord {
    LegacyBatchRecord {
        id: BatchId::new(),
        organization_id,
        is_legacy: true,
        created_at: Utc::now(),
        batch: batch.clone(),
    }
}

fn snapshot_record(
    organization_id: OrganizationId,
    snapshot: &ReconciliationSnapshot,
) -> ReconciliationSnapshotRecord {
    ReconciliationSnapshotRecord {
        id: SnapshotId::new(),
        organization_id,
        created_at: Utc::now(),
        snapshot: snapshot.clone(),
    }
}

/// In-memory onboarding store for tests and the CLI.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOnboardingStore {
    data: Arc<RwLock<StoreData>>,
    failures: Failures,
}

impl InMemoryOnboardingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `point` fail until [`Self::clear_failures`] is called.
    pub async fn fail_on(&self, point: FailurePoint) {
        self.failures.write().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }
}

#[async_trait::async_trait]
impl OnboardingWrites for InMemoryOnboardingStore {
    async fn save_opening_balances(
        &self,
        organization_id: OrganizationId,
        snapshot: &OpeningBalanceSnapshot,
    ) -> Result<()> {
        check(&self.failures, FailurePoint::SaveOpeningBalances).await?;
        self.data
            .write()
            .await
            .apply(Write::OpeningBalances(organization_id, snapshot.clone()));
        Ok(())
    }

    async fn create_legacy_batch(
        &self,
        organization_id: OrganizationId,
        batch: &NewLegacyBatch,
    ) -> Result<LegacyBatchRecord> {
        check(&self.failures, FailurePoint::CreateLegacyBatch).await?;
        let record = legacy_record(organization_id, batch);
        self.data
            .write()
            .await
            .apply(Write::LegacyBatch(record.clone()));
        Ok(record)
    }

    async fn save_reconciliation_snapshot(
        &self,
        organization_id: OrganizationId,
        snapshot: &ReconciliationSnapshot,
    ) -> Result<ReconciliationSnapshotRecord> {
        check(&self.failures, FailurePoint::SaveReconciliationSnapshot).await?;
        let record = snapshot_record(organization_id, snapshot);
        self.data
            .write()
            .await
            .apply(Write::Snapshot(record.clone()));
        Ok(record)
    }

    async fn mark_onboarding_complete(
        &self,
        organization_id: OrganizationId,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        check(&self.failures, FailurePoint::MarkOnboardingComplete).await?;
        self.data
            .write()
            .await
            .apply(Write::Completed(organization_id, completed_at));
        Ok(())
    }
}

#[async_trait::async_trait]
impl OnboardingStore for InMemoryOnboardingStore {
    async fn get_opening_balances(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<OpeningBalanceSnapshot>> {
        Ok(self
            .data
            .read()
            .await
            .opening_balances
            .get(&organization_id)
            .cloned())
    }

    async fn list_reconciliation_snapshots(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ReconciliationSnapshotRecord>> {
        Ok(self
            .data
            .read()
            .await
            .snapshots
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_legacy_batches(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<LegacyBatchRecord>> {
        Ok(self
            .data
            .read()
            .await
            .legacy_batches
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn onboarding_completed_at(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .data
            .read()
            .await
            .completed_at
            .get(&organization_id)
            .copied())
    }

    async fn begin(&self) -> Result<Box<dyn OnboardingTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            data: Arc::clone(&self.data),
            failures: Arc::clone(&self.failures),
            staged: Mutex::new(Vec::new()),
        }))
    }
}

/// Transaction that buffers writes and applies them under one lock on commit.
#[derive(Debug)]
struct InMemoryTransaction {
    data: Arc<RwLock<StoreData>>,
    failures: Failures,
    staged: Mutex<Vec<Write>>,
}

#[async_trait::async_trait]
impl OnboardingWrites for InMemoryTransaction {
    async fn save_opening_balances(
        &self,
        organization_id: OrganizationId,
        snapshot: &OpeningBalanceSnapshot,
    ) -> Result<()> {
        check(&self.failures, FailurePoint::SaveOpeningBalances).await?;
        self.staged
            .lock()
            .await
            .push(Write::OpeningBalances(organization_id, snapshot.clone()));
        Ok(())
    }

    async fn create_legacy_batch(
        &self,
        organization_id: OrganizationId,
        batch: &NewLegacyBatch,
    ) -> Result<LegacyBatchRecord> {
        check(&self.failures, FailurePoint::CreateLegacyBatch).await?;
        let record = legacy_record(organization_id, batch);
        self.staged
            .lock()
            .await
            .push(Write::LegacyBatch(record.clone()));
        Ok(record)
    }

    async fn save_reconciliation_snapshot(
        &self,
        organization_id: OrganizationId,
        snapshot: &ReconciliationSnapshot,
    ) -> Result<ReconciliationSnapshotRecord> {
        check(&self.failures, FailurePoint::SaveReconciliationSnapshot).await?;
        let record = snapshot_record(organization_id, snapshot);
        self.staged
            .lock()
            .await
            .push(Write::Snapshot(record.clone()));
        Ok(record)
    }

    async fn mark_onboarding_complete(
        &self,
        organization_id: OrganizationId,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        check(&self.failures, FailurePoint::MarkOnboardingComplete).await?;
        self.staged
            .lock()
            .await
            .push(Write::Completed(organization_id, completed_at));
        Ok(())
    }
}

#[async_trait::async_trait]
impl OnboardingTransaction for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            data,
            failures,
            staged,
        } = *self;
        check(&failures, FailurePoint::TransactionCommit).await?;
        let mut data = data.write().await;
        for write in staged.into_inner() {
            data.apply(write);
        }
        Ok(())
    }
}

/// Read cache tracking a generation counter per organization and scope.
#[derive(Debug, Default)]
pub struct InMemoryReadCache {
    generations: Arc<RwLock<HashMap<(OrganizationId, CacheScope), u64>>>,
    failing: AtomicBool,
}

impl InMemoryReadCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `scope` has been invalidated for the organization.
    pub async fn generation(&self, organization_id: OrganizationId, scope: CacheScope) -> u64 {
        self.generations
            .read()
            .await
            .get(&(organization_id, scope))
            .copied()
            .unwrap_or(0)
    }

    /// Make every invalidation fail (for testing).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ReadCacheInvalidator for InMemoryReadCache {
    async fn invalidate(
        &self,
        organization_id: OrganizationId,
        scopes: &[CacheScope],
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CellarError::storage("cache invalidation unavailable"));
        }
        let mut generations = self.generations.write().await;
        for scope in scopes {
            *generations.entry((organization_id, *scope)).or_insert(0) += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balances::OpeningBalances;
    use crate::gap::LegacyBatchInput;
    use crate::tax_class::TaxClass;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn opening() -> OpeningBalanceSnapshot {
        OpeningBalanceSnapshot {
            date: date(),
            balances: OpeningBalances::default(),
            reconciliation_notes: None,
        }
    }

    fn batch(name: &str) -> NewLegacyBatch {
        NewLegacyBatch::from_input(
            &LegacyBatchInput::new(name, Decimal::from(5), TaxClass::HardCider),
            date(),
        )
    }

    #[tokio::test]
    async fn test_opening_balances_upsert() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();
        assert!(store.get_opening_balances(org).await.unwrap().is_none());

        store.save_opening_balances(org, &opening()).await.unwrap();
        let mut updated = opening();
        updated.reconciliation_notes = Some("revised".to_string());
        store.save_opening_balances(org, &updated).await.unwrap();

        assert_eq!(
            store.get_opening_balances(org).await.unwrap(),
            Some(updated)
        );
    }

    #[tokio::test]
    async fn test_legacy_batches_are_flagged_and_scoped() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();
        let record = store.create_legacy_batch(org, &batch("A")).await.unwrap();

        assert!(record.is_legacy);
        assert_eq!(store.list_legacy_batches(org).await.unwrap().len(), 1);
        assert!(store
            .list_legacy_batches(OrganizationId::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();
        store.fail_on(FailurePoint::CreateLegacyBatch).await;

        let err = store
            .create_legacy_batch(org, &batch("A"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        store.clear_failures().await;
        assert!(store.create_legacy_batch(org, &batch("A")).await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_writes_invisible_until_commit() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();

        let tx = store.begin().await.unwrap();
        tx.save_opening_balances(org, &opening()).await.unwrap();
        tx.create_legacy_batch(org, &batch("A")).await.unwrap();
        assert!(store.get_opening_balances(org).await.unwrap().is_none());

        tx.commit().await.unwrap();
        assert!(store.get_opening_balances(org).await.unwrap().is_some());
        assert_eq!(store.list_legacy_batches(org).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();

        {
            let tx = store.begin().await.unwrap();
            tx.save_opening_balances(org, &opening()).await.unwrap();
        }

        assert!(store.get_opening_balances(org).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = InMemoryOnboardingStore::new();
        let org = OrganizationId::new();
        store.fail_on(FailurePoint::TransactionCommit).await;

        let tx = store.begin().await.unwrap();
        tx.save_opening_balances(org, &opening()).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert!(store.get_opening_balances(org).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_generations() {
        let cache = InMemoryReadCache::new();
        let org = OrganizationId::new();
        cache.invalidate(org, &CacheScope::ALL).await.unwrap();
        cache.invalidate(org, &[CacheScope::Batches]).await.unwrap();

        assert_eq!(cache.generation(org, CacheScope::Batches).await, 2);
        assert_eq!(cache.generation(org, CacheScope::OpeningBalances).await, 1);

        cache.set_failing(true);
        assert!(cache.invalidate(org, &[CacheScope::Batches]).await.is_err());
        assert_eq!(cache.generation(org, CacheScope::Batches).await, 2);
    }
}
