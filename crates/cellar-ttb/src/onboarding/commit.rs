//! Final commit of a confirmed onboarding run.
//!
//! A [`CommitPlan`] is built purely from wizard state and then executed
//! against the store in strict order: opening balances, legacy batches,
//! reconciliation snapshot, completion flag, cache invalidation.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use cellar_core::{BatchId, OrganizationId, SnapshotId};

use super::state::OnboardingState;
use crate::balances::OpeningBalanceSnapshot;
use crate::config::OnboardingConfig;
use crate::error::{OnboardingError, OnboardingResult};
use crate::snapshot::ReconciliationSnapshot;
use crate::store::{
    CacheScope, NewLegacyBatch, OnboardingStore, OnboardingWrites, ReadCacheInvalidator,
};

/// How commit writes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Every write inside one store transaction; a failure persists nothing.
    #[default]
    Transactional,
    /// Independent writes in order; a failure leaves earlier writes in place.
    Sequential,
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transactional => write!(f, "transactional"),
            Self::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transactional" => Ok(Self::Transactional),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!(
                "unknown commit mode '{other}' (expected transactional or sequential)"
            )),
        }
    }
}

/// Sub-step of the commit, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStep {
    SaveOpeningBalances,
    CreateLegacyBatches,
    SaveReconciliationSnapshot,
    MarkOnboardingComplete,
    InvalidateCaches,
    /// Opening or committing the store transaction.
    Transaction,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaveOpeningBalances => write!(f, "save_opening_balances"),
            Self::CreateLegacyBatches => write!(f, "create_legacy_batches"),
            Self::SaveReconciliationSnapshot => write!(f, "save_reconciliation_snapshot"),
            Self::MarkOnboardingComplete => write!(f, "mark_onboarding_complete"),
            Self::InvalidateCaches => write!(f, "invalidate_caches"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// Everything a confirmation will write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitPlan {
    pub opening_balances: OpeningBalanceSnapshot,
    pub legacy_batches: Vec<NewLegacyBatch>,
    pub reconciliation_snapshot: ReconciliationSnapshot,
    pub completed_at: DateTime<Utc>,
}

impl CommitPlan {
    /// Build the plan from wizard state. Requires a date and a calculation.
    pub fn from_state(
        state: &OnboardingState,
        config: &OnboardingConfig,
        now: DateTime<Utc>,
    ) -> OnboardingResult<Self> {
        let opening_balances = state.step1.to_snapshot()?;
        let inventory = match (&state.step2.system_inventory, state.step2.calculated) {
            (Some(inventory), true) => inventory,
            _ => {
                return Err(OnboardingError::PreconditionFailed {
                    operation: "commit onboarding",
                    reason: "reconciliation has not been calculated".to_string(),
                })
            }
        };

        let date = opening_balances.date;
        let legacy_batches = state
            .step3
            .legacy_batches
            .iter()
            .map(|batch| NewLegacyBatch::from_input(batch, date))
            .collect();

        let reconciliation_snapshot = ReconciliationSnapshot::build(
            format!("{} - {}", config.snapshot_name_prefix, date),
            date,
            &state.step2.by_tax_class,
            inventory,
            &state.step3.legacy_batches,
            opening_balances.reconciliation_notes.clone(),
            state.step3.discrepancy_notes.clone(),
        );

        Ok(Self {
            opening_balances,
            legacy_batches,
            reconciliation_snapshot,
            completed_at: now,
        })
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub mode: CommitMode,
    pub legacy_batch_ids: Vec<BatchId>,
    pub snapshot_id: SnapshotId,
    pub completed_at: DateTime<Utc>,
    /// False when caches could not be invalidated after a durable commit.
    pub caches_invalidated: bool,
}

struct Written {
    legacy_batch_ids: Vec<BatchId>,
    snapshot_id: SnapshotId,
}

async fn run_step<T, F>(
    organization_id: OrganizationId,
    step: CommitStep,
    operation: F,
) -> OnboardingResult<T>
where
    F: Future<Output = cellar_core::Result<T>>,
{
    info!(organization_id = %organization_id, step = %step, "Commit step started");
    match operation.await {
        Ok(value) => {
            info!(organization_id = %organization_id, step = %step, "Commit step finished");
            Ok(value)
        }
        Err(source) => {
            error!(
                organization_id = %organization_id,
                step = %step,
                error = %source,
                "Commit step failed"
            );
            Err(OnboardingError::Commit { step, source })
        }
    }
}

async fn write_plan<W>(
    writes: &W,
    organization_id: OrganizationId,
    plan: &CommitPlan,
) -> OnboardingResult<Written>
where
    W: OnboardingWrites + ?Sized,
{
    run_step(
        organization_id,
        CommitStep::SaveOpeningBalances,
        writes.save_opening_balances(organization_id, &plan.opening_balances),
    )
    .await?;

    let legacy_batch_ids = run_step(organization_id, CommitStep::CreateLegacyBatches, async {
        let mut ids = Vec::with_capacity(plan.legacy_batches.len());
        for batch in &plan.legacy_batches {
            ids.push(writes.create_legacy_batch(organization_id, batch).await?.id);
        }
        Ok::<_, cellar_core::CellarError>(ids)
    })
    .await?;

    let snapshot = run_step(
        organization_id,
        CommitStep::SaveReconciliationSnapshot,
        writes.save_reconciliation_snapshot(organization_id, &plan.reconciliation_snapshot),
    )
    .await?;

    run_step(
        organization_id,
        CommitStep::MarkOnboardingComplete,
        writes.mark_onboarding_complete(organization_id, plan.completed_at),
    )
    .await?;

    Ok(Written {
        legacy_batch_ids,
        snapshot_id: snapshot.id,
    })
}

/// Execute `plan` for the organization in the given mode.
pub async fn execute(
    plan: &CommitPlan,
    organization_id: OrganizationId,
    mode: CommitMode,
    store: &dyn OnboardingStore,
    invalidator: &dyn ReadCacheInvalidator,
) -> OnboardingResult<CommitReceipt> {
    info!(
        organization_id = %organization_id,
        mode = %mode,
        legacy_batches = plan.legacy_batches.len(),
        "Committing onboarding"
    );

    let written = match mode {
        CommitMode::Sequential => write_plan(store, organization_id, plan).await?,
        CommitMode::Transactional => {
            let tx = run_step(organization_id, CommitStep::Transaction, store.begin()).await?;
            let written = write_plan(&*tx, organization_id, plan).await?;
            run_step(organization_id, CommitStep::Transaction, tx.commit()).await?;
            written
        }
    };

    let invalidation = invalidator.invalidate(organization_id, &CacheScope::ALL);
    let caches_invalidated = match mode {
        CommitMode::Sequential => {
            run_step(organization_id, CommitStep::InvalidateCaches, invalidation).await?;
            true
        }
        CommitMode::Transactional => match invalidation.await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    organization_id = %organization_id,
                    error = %e,
                    "Onboarding committed but read caches were not invalidated"
                );
                false
            }
        },
    };

    info!(
        organization_id = %organization_id,
        snapshot_id = %written.snapshot_id,
        "Onboarding committed"
    );

    Ok(CommitReceipt {
        mode,
        legacy_batch_ids: written.legacy_batch_ids,
        snapshot_id: written.snapshot_id,
        completed_at: plan.completed_at,
        caches_invalidated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::LegacyBatchInput;
    use crate::inventory::SystemInventory;
    use crate::store::{FailurePoint, InMemoryOnboardingStore, InMemoryReadCache};
    use crate::tax_class::TaxClass;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn ready_state() -> OnboardingState {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut state = OnboardingState::new();
        state.step1.date = Some(date);
        state
            .step1
            .balances
            .bulk
            .set(TaxClass::HardCider, Decimal::from(150));
        state.step2.calculated = true;
        state.step2.system_inventory = Some(SystemInventory::empty(date));
        let a = LegacyBatchInput::new("A", Decimal::from(5), TaxClass::HardCider);
        state.step3.legacy_batches.add(a).unwrap();
        let b = LegacyBatchInput::new("B", Decimal::from(5), TaxClass::HardCider);
        state.step3.legacy_batches.add(b).unwrap();
        state
    }

    #[test]
    fn test_commit_mode_parsing() {
        assert_eq!(
            "Sequential".parse::<CommitMode>(),
            Ok(CommitMode::Sequential)
        );
        assert_eq!(
            " transactional ".parse::<CommitMode>(),
            Ok(CommitMode::Transactional)
        );
        assert!("atomic".parse::<CommitMode>().is_err());
        assert_eq!(CommitMode::default(), CommitMode::Transactional);
    }

    #[test]
    fn test_plan_backdates_legacy_batches() {
        let plan =
            CommitPlan::from_state(&ready_state(), &OnboardingConfig::default(), Utc::now())
                .unwrap();

        assert_eq!(plan.legacy_batches.len(), 2);
        assert!(plan
            .legacy_batches
            .iter()
            .all(|b| b.as_of_date == plan.opening_balances.date));
        assert_eq!(
            plan.reconciliation_snapshot.name,
            "TTB Opening Balance Reconciliation - 2024-12-31"
        );
    }

    #[test]
    fn test_plan_requires_calculation() {
        let mut state = ready_state();
        state.step2.calculated = false;
        let err = CommitPlan::from_state(&state, &OnboardingConfig::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, OnboardingError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_sequential_failure_keeps_earlier_writes() {
        let store = InMemoryOnboardingStore::new();
        let cache = InMemoryReadCache::new();
        let org = OrganizationId::new();
        store.fail_on(FailurePoint::CreateLegacyBatch).await;
        let plan =
            CommitPlan::from_state(&ready_state(), &OnboardingConfig::default(), Utc::now())
                .unwrap();

        let err = execute(&plan, org, CommitMode::Sequential, &store, &cache)
            .await
            .unwrap_err();

        assert_eq!(err.commit_step(), Some(CommitStep::CreateLegacyBatches));
        assert!(store.get_opening_balances(org).await.unwrap().is_some());
        let snapshots = store.list_reconciliation_snapshots(org).await.unwrap();
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_transactional_invalidation_failure_is_not_fatal() {
        let store = InMemoryOnboardingStore::new();
        let cache = InMemoryReadCache::new();
        cache.set_failing(true);
        let org = OrganizationId::new();
        let plan =
            CommitPlan::from_state(&ready_state(), &OnboardingConfig::default(), Utc::now())
                .unwrap();

        let receipt = execute(&plan, org, CommitMode::Transactional, &store, &cache)
            .await
            .unwrap();

        assert!(!receipt.caches_invalidated);
        assert_eq!(receipt.legacy_batch_ids.len(), 2);
        assert!(store.onboarding_completed_at(org).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sequential_invalidation_failure_is_reported() {
        let store = InMemoryOnboardingStore::new();
        let cache = InMemoryReadCache::new();
        cache.set_failing(true);
        let org = OrganizationId::new();
        let plan =
            CommitPlan::from_state(&ready_state(), &OnboardingConfig::default(), Utc::now())
                .unwrap();

        let err = execute(&plan, org, CommitMode::Sequential, &store, &cache)
            .await
            .unwrap_err();
        assert_eq!(err.commit_step(), Some(CommitStep::InvalidateCaches));
    }
}
