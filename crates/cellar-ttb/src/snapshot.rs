//! Immutable reconciliation audit record.
//!
//! One snapshot is written per completed onboarding run. It captures the
//! totals, the bulk/packaged breakdown and the full per-class table including
//! each class's share of legacy-batch volume, so history survives later
//! edits to the current opening balance.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellar_core::{OrganizationId, OrganizationScoped, SnapshotId};

use crate::gap::LegacyBatches;
use crate::inventory::SystemInventory;
use crate::reconciliation::{is_within_tolerance, saturating_sum, TaxClassReconciliation};
use crate::tax_class::TaxClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTotals {
    pub ttb_balance: Decimal,
    pub current_inventory: Decimal,
    pub legacy_batches: Decimal,
    /// `ttb_balance - (current_inventory + legacy_batches)`.
    pub difference: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBreakdown {
    pub bulk: Decimal,
    pub packaged: Decimal,
}

/// One row of the per-class table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTaxClassRow {
    pub tax_class: TaxClass,
    pub label: String,
    pub ttb_balance: Decimal,
    pub current_inventory: Decimal,
    /// Legacy volume filed under this class.
    pub legacy_batches: Decimal,
    /// Difference before legacy batches.
    pub difference: Decimal,
    pub adjusted_difference: Decimal,
    /// Judged on [`Self::adjusted_difference`].
    pub is_reconciled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub totals: SnapshotTotals,
    pub breakdown: InventoryBreakdown,
    pub tax_classes: Vec<SnapshotTaxClassRow>,
}

/// Snapshot content as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    pub name: String,
    pub reconciliation_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrepancy_explanation: Option<String>,
    pub summary: ReconciliationSummary,
}

impl ReconciliationSnapshot {
    /// Assemble the snapshot from a finished reconciliation.
    ///
    /// Rows follow report order and cover every class that was reconciled
    /// or carries legacy volume.
    #[must_use]
    pub fn build(
        name: String,
        reconciliation_date: NaiveDate,
        reconciliation: &[TaxClassReconciliation],
        inventory: &SystemInventory,
        legacy_batches: &LegacyBatches,
        notes: Option<String>,
        discrepancy_explanation: Option<String>,
    ) -> Self {
        let tax_classes: Vec<SnapshotTaxClassRow> = TaxClass::ALL
            .into_iter()
            .filter_map(|class| {
                let reconciled = reconciliation.iter().find(|r| r.tax_class == class);
                let legacy = legacy_batches.volume_for(class);
                if reconciled.is_none() && legacy.is_zero() {
                    return None;
                }
                let ttb_balance = reconciled.map_or(Decimal::ZERO, |r| r.ttb_balance);
                let current_inventory = reconciled.map_or(Decimal::ZERO, |r| r.system_inventory);
                let difference = ttb_balance.saturating_sub(current_inventory);
                let adjusted_difference = difference.saturating_sub(legacy);
                Some(SnapshotTaxClassRow {
                    tax_class: class,
                    label: class.label().to_string(),
                    ttb_balance,
                    current_inventory,
                    legacy_batches: legacy,
                    difference,
                    adjusted_difference,
                    is_reconciled: is_within_tolerance(adjusted_difference),
                })
            })
            .collect();

        let ttb_balance = saturating_sum(tax_classes.iter().map(|r| r.ttb_balance));
        let current_inventory = saturating_sum(tax_classes.iter().map(|r| r.current_inventory));
        let legacy = legacy_batches.total_volume();

        Self {
            name,
            reconciliation_date,
            notes,
            discrepancy_explanation,
            summary: ReconciliationSummary {
                totals: SnapshotTotals {
                    ttb_balance,
                    current_inventory,
                    legacy_batches: legacy,
                    difference: ttb_balance
                        .saturating_sub(current_inventory.saturating_add(legacy)),
                },
                breakdown: InventoryBreakdown {
                    bulk: inventory.bulk,
                    packaged: inventory.packaged,
                },
                tax_classes,
            },
        }
    }

    /// Whether the snapshot closes within tolerance once legacy batches count.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        is_within_tolerance(self.summary.totals.difference)
    }
}

/// A persisted snapshot. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSnapshotRecord {
    pub id: SnapshotId,
    pub organization_id: OrganizationId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub snapshot: ReconciliationSnapshot,
}

impl OrganizationScoped for ReconciliationSnapshotRecord {
    fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }
}
