//! Persistence collaborators.
//!
//! The onboarding workflow reads the current opening balance to seed step one
//! and writes its results only at final confirmation. Writes go either
//! straight to an [`OnboardingStore`] or through an [`OnboardingTransaction`]
//! obtained from [`OnboardingStore::begin`].

mod memory;

pub use memory::{FailurePoint, InMemoryOnboardingStore, InMemoryReadCache};

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellar_core::{BatchId, OrganizationId, OrganizationScoped, Result, VesselId};

use crate::balances::OpeningBalanceSnapshot;
use crate::gap::LegacyBatchInput;
use crate::snapshot::{ReconciliationSnapshot, ReconciliationSnapshotRecord};
use crate::tax_class::{LegacyTaxClass, ProductType};

/// Batch creation request for one legacy batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLegacyBatch {
    pub name: String,
    pub volume_gallons: Decimal,
    pub product_type: ProductType,
    pub tax_class: LegacyTaxClass,
    /// Opening balance date the batch is back-dated to.
    pub as_of_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_gravity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_gravity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_id: Option<VesselId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

impl NewLegacyBatch {
    /// Request for `input`, back-dated to `as_of_date`.
    #[must_use]
    pub fn from_input(input: &LegacyBatchInput, as_of_date: NaiveDate) -> Self {
        Self {
            name: input.name.trim().to_string(),
            volume_gallons: input.volume_gallons,
            product_type: input.product_type(),
            tax_class: input.tax_class,
            as_of_date,
            notes: input.notes.clone(),
            original_gravity: input.original_gravity,
            final_gravity: input.final_gravity,
            ph: input.ph,
            vessel_id: input.vessel_id,
            start_date: input.start_date,
        }
    }
}

/// A created legacy batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyBatchRecord {
    pub id: BatchId,
    pub organization_id: OrganizationId,
    /// Always true; distinguishes these from production batches.
    pub is_legacy: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub batch: NewLegacyBatch,
}

impl OrganizationScoped for LegacyBatchRecord {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}

/// Writes performed by the onboarding commit.
#[async_trait::async_trait]
pub trait OnboardingWrites: Send + Sync {
    /// Upsert the organization's single current opening balance.
    async fn save_opening_balances(
        &self,
        organization_id: OrganizationId,
        snapshot: &OpeningBalanceSnapshot,
    ) -> Result<()>;

    async fn create_legacy_batch(
        &self,
        organization_id: OrganizationId,
        batch: &NewLegacyBatch,
    ) -> Result<LegacyBatchRecord>;

    /// Append a reconciliation snapshot. Existing snapshots are never updated.
    async fn save_reconciliation_snapshot(
        &self,
        organization_id: OrganizationId,
        snapshot: &ReconciliationSnapshot,
    ) -> Result<ReconciliationSnapshotRecord>;

    /// Set the organization-level onboarding-completed flag.
    async fn mark_onboarding_complete(
        &self,
        organization_id: OrganizationId,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Store backing the onboarding workflow.
#[async_trait::async_trait]
pub trait OnboardingStore: OnboardingWrites {
    async fn get_opening_balances(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<OpeningBalanceSnapshot>>;

    async fn list_reconciliation_snapshots(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ReconciliationSnapshotRecord>>;

    async fn list_legacy_batches(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<LegacyBatchRecord>>;

    async fn onboarding_completed_at(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Start a unit of work. Writes made through it become visible together
    /// on [`OnboardingTransaction::commit`].
    async fn begin(&self) -> Result<Box<dyn OnboardingTransaction>>;
}

/// A unit of work. Dropping it without committing discards every write.
#[async_trait::async_trait]
pub trait OnboardingTransaction: OnboardingWrites {
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Read caches that may hold pre-commit data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    OpeningBalances,
    SystemInventory,
    Batches,
    ReconciliationSnapshots,
    OrganizationSettings,
}

impl CacheScope {
    /// Every scope touched by an onboarding commit.
    pub const ALL: [CacheScope; 5] = [
        CacheScope::OpeningBalances,
        CacheScope::SystemInventory,
        CacheScope::Batches,
        CacheScope::ReconciliationSnapshots,
        CacheScope::OrganizationSettings,
    ];
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpeningBalances => write!(f, "opening_balances"),
            Self::SystemInventory => write!(f, "system_inventory"),
            Self::Batches => write!(f, "batches"),
            Self::ReconciliationSnapshots => write!(f, "reconciliation_snapshots"),
            Self::OrganizationSettings => write!(f, "organization_settings"),
        }
    }
}

/// Invalidates read caches after a commit.
#[async_trait::async_trait]
pub trait ReadCacheInvalidator: Send + Sync {
    async fn invalidate(&self, organization_id: OrganizationId, scopes: &[CacheScope])
        -> Result<()>;
}
