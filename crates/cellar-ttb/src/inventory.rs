//! System-tracked inventory as of a date.
//!
//! The aggregation itself (walking batches, vessels and packaged goods)
//! belongs to the production side of the application; this module defines
//! the shape it hands to the reconciliation engine and the
//! [`InventoryAggregator`] seam it is fetched through.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use cellar_core::{BatchId, CellarError, OrganizationId, Result, VesselId};

use crate::reconciliation::saturating_sum;
use crate::tax_class::TaxClass;

/// Whether a volume is still in a vessel or already packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryForm {
    Bulk,
    Packaged,
}

/// One batch's contribution to inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub batch_id: BatchId,
    pub batch_name: String,
    pub tax_class: TaxClass,
    pub form: InventoryForm,
    pub volume_gallons: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_id: Option<VesselId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_name: Option<String>,
}

/// Per-class inventory with supporting batch detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxClassInventory {
    pub tax_class: TaxClass,
    pub label: String,
    pub bulk: Decimal,
    pub packaged: Decimal,
    /// Bulk plus packaged.
    pub volume: Decimal,
    #[serde(default)]
    pub batches: Vec<InventoryItem>,
}

/// Inventory computed by the aggregator at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInventory {
    pub as_of: NaiveDate,
    pub bulk: Decimal,
    pub packaged: Decimal,
    /// Grand total as reported by the aggregator.
    pub total: Decimal,
    pub by_tax_class: Vec<TaxClassInventory>,
}

impl SystemInventory {
    /// Empty inventory, e.g. for an organization with no batches yet.
    #[must_use]
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            bulk: Decimal::ZERO,
            packaged: Decimal::ZERO,
            total: Decimal::ZERO,
            by_tax_class: Vec::new(),
        }
    }

    /// Group batch-level items into the per-class breakdown.
    ///
    /// Classes appear in report order; classes with no items are omitted.
    #[must_use]
    pub fn from_items(as_of: NaiveDate, items: Vec<InventoryItem>) -> Self {
        let mut grouped: BTreeMap<TaxClass, Vec<InventoryItem>> = BTreeMap::new();
        for item in items {
            grouped.entry(item.tax_class).or_default().push(item);
        }

        let mut by_tax_class = Vec::with_capacity(grouped.len());
        for class in TaxClass::ALL {
            let Some(batches) = grouped.remove(&class) else {
                continue;
            };
            let bulk = sum_form(&batches, InventoryForm::Bulk);
            let packaged = sum_form(&batches, InventoryForm::Packaged);
            by_tax_class.push(TaxClassInventory {
                tax_class: class,
                label: class.label().to_string(),
                bulk,
                packaged,
                volume: bulk.saturating_add(packaged),
                batches,
            });
        }

        let bulk = saturating_sum(by_tax_class.iter().map(|c| c.bulk));
        let packaged = saturating_sum(by_tax_class.iter().map(|c| c.packaged));
        Self {
            as_of,
            bulk,
            packaged,
            total: bulk.saturating_add(packaged),
            by_tax_class,
        }
    }

    /// Volume for one class, zero when the aggregator reported none.
    #[must_use]
    pub fn volume_for(&self, class: TaxClass) -> Decimal {
        let volumes = self
            .by_tax_class
            .iter()
            .filter(|c| c.tax_class == class)
            .map(|c| c.volume);
        saturating_sum(volumes)
    }

    /// Copy with every volume in canonical form, so `100` and `100.0` encode alike.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut inventory = self.clone();
        inventory.bulk = inventory.bulk.normalize();
        inventory.packaged = inventory.packaged.normalize();
        inventory.total = inventory.total.normalize();
        for class in &mut inventory.by_tax_class {
            class.bulk = class.bulk.normalize();
            class.packaged = class.packaged.normalize();
            class.volume = class.volume.normalize();
            for item in &mut class.batches {
                item.volume_gallons = item.volume_gallons.normalize();
            }
        }
        inventory
    }

    /// Sum of the per-class volumes, independent of [`Self::total`].
    #[must_use]
    pub fn class_sum(&self) -> Decimal {
        saturating_sum(self.by_tax_class.iter().map(|c| c.volume))
    }
}

fn sum_form(items: &[InventoryItem], form: InventoryForm) -> Decimal {
    let volumes = items
        .iter()
        .filter(|i| i.form == form)
        .map(|i| i.volume_gallons);
    saturating_sum(volumes)
}

// ============================================================================
// Aggregator seam
// ============================================================================

/// Computes system inventory for an organization as of a date.
///
/// Read-only; callers may retry freely.
#[async_trait::async_trait]
pub trait InventoryAggregator: Send + Sync {
    async fn system_inventory_as_of(
        &self,
        organization_id: OrganizationId,
        as_of: NaiveDate,
    ) -> Result<SystemInventory>;
}

/// Aggregator serving pre-computed inventories.
///
/// A request for a date returns the latest inventory recorded on or before
/// that date, re-stamped with the requested date.
#[derive(Debug, Default)]
pub struct StaticInventoryAggregator {
    inventories: Arc<RwLock<BTreeMap<(OrganizationId, NaiveDate), SystemInventory>>>,
    calls: AtomicUsize,
}

impl StaticInventoryAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inventory an organization had on `inventory.as_of`.
    pub async fn insert(&self, organization_id: OrganizationId, inventory: SystemInventory) {
        self.inventories
            .write()
            .await
            .insert((organization_id, inventory.as_of), inventory);
    }

    /// Number of aggregation requests served (for testing).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InventoryAggregator for StaticInventoryAggregator {
    async fn system_inventory_as_of(
        &self,
        organization_id: OrganizationId,
        as_of: NaiveDate,
    ) -> Result<SystemInventory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inventories = self.inventories.read().await;
        inventories
            .range((organization_id, NaiveDate::MIN)..=(organization_id, as_of))
            .next_back()
            .map(|(_, inventory)| SystemInventory {
                as_of,
                ..inventory.clone()
            })
            .ok_or_else(|| CellarError::NotFound {
                resource: "SystemInventory".to_string(),
                id: Some(format!("{organization_id}@{as_of}")),
            })
    }
}
