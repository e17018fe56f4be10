//! Reconciliation engine.
//!
//! Compares the regulator-reported opening balance against system inventory
//! per tax class. The comparison is a pure function of its inputs: running
//! it twice on the same data yields identical output.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balances::OpeningBalances;
use crate::inventory::SystemInventory;
use crate::tax_class::TaxClass;

/// Absolute tolerance, in gallons, under which a difference counts as reconciled.
///
/// Fixed regardless of operation size.
pub const RECONCILIATION_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Whether `difference` is inside [`RECONCILIATION_TOLERANCE`].
#[must_use]
pub fn is_within_tolerance(difference: Decimal) -> bool {
    difference.abs() < RECONCILIATION_TOLERANCE
}

/// Sum of volumes, clamped at the `Decimal` range instead of overflowing.
#[must_use]
pub fn saturating_sum(volumes: impl IntoIterator<Item = Decimal>) -> Decimal {
    volumes
        .into_iter()
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Reconciliation of one tax class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxClassReconciliation {
    pub tax_class: TaxClass,
    pub label: String,
    /// Bulk plus bottled opening balance.
    pub ttb_balance: Decimal,
    pub system_inventory: Decimal,
    /// `ttb_balance - system_inventory`; positive when the system under-counts.
    pub difference: Decimal,
    pub is_reconciled: bool,
}

impl TaxClassReconciliation {
    fn compute(class: TaxClass, ttb_balance: Decimal, system_inventory: Decimal) -> Self {
        let difference = ttb_balance.saturating_sub(system_inventory);
        Self {
            tax_class: class,
            label: class.label().to_string(),
            ttb_balance,
            system_inventory,
            difference,
            is_reconciled: is_within_tolerance(difference),
        }
    }

    fn is_empty(&self) -> bool {
        self.ttb_balance.is_zero() && self.system_inventory.is_zero()
    }
}

/// Overall totals across every tax class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationTotals {
    pub ttb_total: Decimal,
    /// Sum of per-class system volumes.
    pub system_total: Decimal,
    pub difference: Decimal,
    pub is_fully_reconciled: bool,
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Classes with a non-zero figure on either side, in report order.
    pub by_tax_class: Vec<TaxClassReconciliation>,
    pub totals: ReconciliationTotals,
    /// Per-class sum minus the aggregator's own grand total.
    pub aggregator_drift: Decimal,
}

impl Reconciliation {
    /// Whether the aggregator's grand total disagrees with its own breakdown.
    #[must_use]
    pub fn has_aggregator_drift(&self) -> bool {
        !is_within_tolerance(self.aggregator_drift)
    }

    /// Classes that are outside tolerance.
    pub fn discrepancies(&self) -> impl Iterator<Item = &TaxClassReconciliation> {
        self.by_tax_class.iter().filter(|c| !c.is_reconciled)
    }
}

/// Reconcile opening balances against system inventory.
#[must_use]
pub fn reconcile(opening: &OpeningBalances, inventory: &SystemInventory) -> Reconciliation {
    let all: Vec<TaxClassReconciliation> = TaxClass::ALL
        .into_iter()
        .map(|class| {
            TaxClassReconciliation::compute(
                class,
                opening.ttb_balance(class),
                inventory.volume_for(class),
            )
        })
        .collect();

    let ttb_total = saturating_sum(all.iter().map(|c| c.ttb_balance));
    let system_total = saturating_sum(all.iter().map(|c| c.system_inventory));
    let difference = ttb_total.saturating_sub(system_total);

    Reconciliation {
        by_tax_class: all.into_iter().filter(|c| !c.is_empty()).collect(),
        totals: ReconciliationTotals {
            ttb_total,
            system_total,
            difference,
            is_fully_reconciled: is_within_tolerance(difference),
        },
        aggregator_drift: system_total.saturating_sub(inventory.total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balances::TaxClassBalances;
    use crate::inventory::TaxClassInventory;
    use crate::tax_class::SpiritsClass;
    use chrono::NaiveDate;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn inventory(classes: &[(TaxClass, Decimal)]) -> SystemInventory {
        let by_tax_class: Vec<_> = classes
            .iter()
            .map(|&(class, volume)| TaxClassInventory {
                tax_class: class,
                label: class.label().to_string(),
                bulk: volume,
                packaged: Decimal::ZERO,
                volume,
                batches: vec![],
            })
            .collect();
        let total = by_tax_class.iter().map(|c| c.volume).sum();
        SystemInventory {
            as_of: as_of(),
            bulk: total,
            packaged: Decimal::ZERO,
            total,
            by_tax_class,
        }
    }

    fn cider_opening(bulk: i64, bottled: i64) -> OpeningBalances {
        OpeningBalances {
            bulk: TaxClassBalances::new().with(TaxClass::HardCider, Decimal::from(bulk)),
            bottled: TaxClassBalances::new().with(TaxClass::HardCider, Decimal::from(bottled)),
            ..Default::default()
        }
    }

    #[test]
    fn test_tolerance_constant_is_half_a_gallon() {
        assert_eq!(RECONCILIATION_TOLERANCE, Decimal::new(5, 1));
        assert!(is_within_tolerance(Decimal::new(49, 2)));
        assert!(!is_within_tolerance(Decimal::new(5, 1)));
        assert!(!is_within_tolerance(Decimal::new(-5, 1)));
    }

    #[test]
    fn test_system_under_count_is_not_reconciled() {
        let result = reconcile(
            &cider_opening(100, 50),
            &inventory(&[(TaxClass::HardCider, Decimal::from(130))]),
        );

        assert_eq!(result.by_tax_class.len(), 1);
        let cider = &result.by_tax_class[0];
        assert_eq!(cider.ttb_balance, Decimal::from(150));
        assert_eq!(cider.system_inventory, Decimal::from(130));
        assert_eq!(cider.difference, Decimal::from(20));
        assert!(!cider.is_reconciled);
        assert!(!result.totals.is_fully_reconciled);
        assert_eq!(result.discrepancies().count(), 1);
    }

    #[test]
    fn test_slight_system_surplus_is_within_tolerance() {
        let result = reconcile(
            &cider_opening(500, 0),
            &inventory(&[(TaxClass::HardCider, Decimal::new(5003, 1))]),
        );

        assert_eq!(result.totals.difference, Decimal::new(-3, 1));
        assert!(result.totals.is_fully_reconciled);
        assert!(result.by_tax_class[0].is_reconciled);
    }

    #[test]
    fn test_zero_classes_are_hidden_but_totals_cover_all() {
        let mut opening = cider_opening(10, 0);
        opening.bulk.set(TaxClass::WineUnder16, Decimal::ZERO);
        let result = reconcile(
            &opening,
            &inventory(&[(TaxClass::SparklingWine, Decimal::from(4))]),
        );

        let shown: Vec<_> = result.by_tax_class.iter().map(|c| c.tax_class).collect();
        assert_eq!(shown, vec![TaxClass::HardCider, TaxClass::SparklingWine]);
        assert_eq!(result.totals.ttb_total, Decimal::from(10));
        assert_eq!(result.totals.system_total, Decimal::from(4));
        assert_eq!(result.totals.difference, Decimal::from(6));
    }

    #[test]
    fn test_reconciled_flag_matches_tolerance_for_every_class() {
        let mut opening = OpeningBalances::default();
        let mut classes = Vec::new();
        let offsets = [0, 3, 5, 7, -4, -6];
        for (class, offset) in TaxClass::ALL.into_iter().zip(offsets) {
            opening.bulk.set(class, Decimal::from(100));
            classes.push((class, Decimal::from(100) + Decimal::new(offset, 1)));
        }
        let result = reconcile(&opening, &inventory(&classes));

        for class in &result.by_tax_class {
            assert_eq!(
                class.is_reconciled,
                (class.ttb_balance - class.system_inventory).abs() < RECONCILIATION_TOLERANCE
            );
        }
        assert_eq!(
            result.totals.is_fully_reconciled,
            (result.totals.ttb_total - result.totals.system_total).abs()
                < RECONCILIATION_TOLERANCE
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let opening = cider_opening(100, 50);
        let inv = inventory(&[(TaxClass::HardCider, Decimal::new(1301, 1))]);

        let first = reconcile(&opening, &inv);
        let second = reconcile(&opening, &inv);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_system_total_ignores_aggregator_grand_total() {
        let mut inv = inventory(&[(TaxClass::HardCider, Decimal::from(130))]);
        inv.total = Decimal::from(135);

        let result = reconcile(&cider_opening(100, 50), &inv);
        assert_eq!(result.totals.system_total, Decimal::from(130));
        assert_eq!(result.aggregator_drift, Decimal::from(-5));
        assert!(result.has_aggregator_drift());
    }

    #[test]
    fn test_spirits_do_not_enter_wine_totals() {
        let mut opening = cider_opening(0, 0);
        opening
            .spirits
            .set(SpiritsClass::AppleBrandy, Decimal::from(30));
        let result = reconcile(&opening, &inventory(&[]));

        assert!(result.by_tax_class.is_empty());
        assert_eq!(result.totals.ttb_total, Decimal::ZERO);
        assert!(result.totals.is_fully_reconciled);
    }

    #[test]
    fn test_extreme_volumes_saturate_instead_of_overflowing() {
        let mut opening = OpeningBalances::default();
        opening.bulk.set(TaxClass::HardCider, Decimal::MAX);
        opening.bottled.set(TaxClass::HardCider, Decimal::ONE);
        opening.bulk.set(TaxClass::WineUnder16, Decimal::MAX);
        let mut inv = inventory(&[
            (TaxClass::HardCider, Decimal::MAX),
            (TaxClass::SparklingWine, Decimal::MAX),
        ]);
        inv.total = Decimal::MIN;

        let result = reconcile(&opening, &inv);
        assert_eq!(result.totals.ttb_total, Decimal::MAX);
        assert_eq!(result.totals.system_total, Decimal::MAX);
        assert_eq!(result.aggregator_drift, Decimal::MAX);
    }

    #[test]
    fn test_saturating_sum_clamps_at_range() {
        assert_eq!(saturating_sum([Decimal::MAX, Decimal::ONE]), Decimal::MAX);
        assert_eq!(saturating_sum([Decimal::MIN, -Decimal::ONE]), Decimal::MIN);
        assert_eq!(saturating_sum(Vec::new()), Decimal::ZERO);
    }
}
