//! Gap resolution through legacy batches.
//!
//! When the system under-counts relative to the regulator figure, the
//! difference is explained by entering legacy batches: synthetic records of
//! inventory that predates the system. Resolution is tracked at the
//! aggregate level; per-class attribution is carried into the snapshot.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellar_core::VesselId;

use crate::balances::MAX_VOLUME_GALLONS;
use crate::reconciliation::{is_within_tolerance, saturating_sum, RECONCILIATION_TOLERANCE};
use crate::tax_class::{LegacyTaxClass, ProductType, TaxClass};

/// A legacy batch entered during gap resolution. Held in the draft until commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyBatchInput {
    pub name: String,
    pub volume_gallons: Decimal,
    pub tax_class: LegacyTaxClass,
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

impl LegacyBatchInput {
    /// Minimal legacy batch with no extended fields.
    pub fn new(
        name: impl Into<String>,
        volume_gallons: Decimal,
        tax_class: impl Into<LegacyTaxClass>,
    ) -> Self {
        Self {
            name: name.into(),
            volume_gallons,
            tax_class: tax_class.into(),
            notes: None,
            original_gravity: None,
            final_gravity: None,
            ph: None,
            vessel_id: None,
            start_date: None,
        }
    }

    #[must_use]
    pub fn product_type(&self) -> ProductType {
        self.tax_class.product_type()
    }

    /// Form-level checks performed before the batch is accepted.
    pub fn validate(&self) -> Result<(), LegacyBatchRejection> {
        if self.name.trim().is_empty() {
            return Err(LegacyBatchRejection::EmptyName);
        }
        if self.volume_gallons <= Decimal::ZERO {
            return Err(LegacyBatchRejection::NonPositiveVolume {
                volume_gallons: self.volume_gallons,
            });
        }
        if self.volume_gallons > MAX_VOLUME_GALLONS {
            return Err(LegacyBatchRejection::VolumeTooLarge {
                volume_gallons: self.volume_gallons,
                max: MAX_VOLUME_GALLONS,
            });
        }
        if let Some(ph) = self.ph {
            if ph < Decimal::ZERO || ph > Decimal::from(14) {
                return Err(LegacyBatchRejection::PhOutOfRange { ph });
            }
        }
        for (field, gravity) in [
            ("original_gravity", self.original_gravity),
            ("final_gravity", self.final_gravity),
        ] {
            if let Some(value) = gravity {
                if value <= Decimal::ZERO {
                    return Err(LegacyBatchRejection::NonPositiveGravity { field, value });
                }
            }
        }
        Ok(())
    }
}

/// Reason a legacy batch was not added.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegacyBatchRejection {
    #[error("Batch name is required")]
    EmptyName,

    #[error("Volume must be greater than zero (got {volume_gallons})")]
    NonPositiveVolume { volume_gallons: Decimal },

    #[error("Volume must not exceed {max} (got {volume_gallons})")]
    VolumeTooLarge {
        volume_gallons: Decimal,
        max: Decimal,
    },

    #[error("pH must be between 0 and 14 (got {ph})")]
    PhOutOfRange { ph: Decimal },

    #[error("{field} must be greater than zero (got {value})")]
    NonPositiveGravity { field: &'static str, value: Decimal },
}

/// Ordered list of legacy batch drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyBatches(Vec<LegacyBatchInput>);

impl LegacyBatches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append. Returns the new batch's index.
    pub fn add(&mut self, batch: LegacyBatchInput) -> Result<usize, LegacyBatchRejection> {
        batch.validate()?;
        self.0.push(batch);
        Ok(self.0.len() - 1)
    }

    /// Remove by position; remaining entries keep their order.
    pub fn remove(&mut self, index: usize) -> Option<LegacyBatchInput> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }

    #[must_use]
    pub fn total_volume(&self) -> Decimal {
        saturating_sum(self.0.iter().map(|b| b.volume_gallons))
    }

    /// Legacy volume filed under one wine-gallon class.
    #[must_use]
    pub fn volume_for(&self, class: TaxClass) -> Decimal {
        let volumes = self
            .0
            .iter()
            .filter(|b| b.tax_class.wine_class() == Some(class))
            .map(|b| b.volume_gallons);
        saturating_sum(volumes)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LegacyBatchInput> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a LegacyBatches {
    type Item = &'a LegacyBatchInput;
    type IntoIter = std::slice::Iter<'a, LegacyBatchInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Gap left after legacy batches, summed across every class.
#[must_use]
pub fn remaining_gap(original_difference: Decimal, batches: &LegacyBatches) -> Decimal {
    original_difference.saturating_sub(batches.total_volume())
}

/// Whether the remaining gap is inside tolerance.
#[must_use]
pub fn is_resolved(remaining_gap: Decimal) -> bool {
    is_within_tolerance(remaining_gap)
}

/// How the gap stands, for presenting the resolve-gaps step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GapStatus {
    /// Regulator and system already agree; nothing to explain.
    Reconciled,
    /// The system shows more than the regulator figure. Needs no legacy batches.
    SystemSurplus { surplus: Decimal },
    /// Legacy batches closed a positive gap.
    ResolvedByLegacyBatches,
    /// Part of the gap is still unexplained.
    Unresolved { remaining: Decimal },
    /// Legacy batches exceed the gap.
    OverExplained { excess: Decimal },
}

impl GapStatus {
    #[must_use]
    pub fn classify(original_difference: Decimal, batches: &LegacyBatches) -> Self {
        let remaining = remaining_gap(original_difference, batches);
        if batches.is_empty() {
            if is_within_tolerance(original_difference) {
                return Self::Reconciled;
            }
            if original_difference < Decimal::ZERO {
                return Self::SystemSurplus {
                    surplus: -original_difference,
                };
            }
        }
        if is_resolved(remaining) {
            Self::ResolvedByLegacyBatches
        } else if remaining >= RECONCILIATION_TOLERANCE {
            Self::Unresolved { remaining }
        } else {
            Self::OverExplained { excess: -remaining }
        }
    }

    /// Whether the step can be considered done without a warning.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        matches!(
            self,
            Self::Reconciled | Self::SystemSurplus { .. } | Self::ResolvedByLegacyBatches
        )
    }
}
