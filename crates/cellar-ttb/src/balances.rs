//! Opening balances reported to the regulator.
//!
//! An [`OpeningBalanceSnapshot`] is the starting inventory at the reporting
//! cutoff (usually Dec 31 of the prior year), split into bulk and bottled
//! wine gallons per tax class plus proof gallons of spirits.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{OnboardingError, OnboardingResult};
use crate::reconciliation::saturating_sum;
use crate::tax_class::{SpiritsClass, TaxClass};

/// Largest volume accepted for a single balance or legacy batch.
pub const MAX_VOLUME_GALLONS: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Wine-gallon volume per tax class. Unset classes read as zero.
///
/// Equality compares volumes, so an explicit zero equals an unset class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxClassBalances(BTreeMap<TaxClass, Decimal>);

impl TaxClassBalances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Volume for `class`, zero when unset.
    #[must_use]
    pub fn get(&self, class: TaxClass) -> Decimal {
        self.0.get(&class).copied().unwrap_or(Decimal::ZERO)
    }

    /// Set the volume for `class`. Zero unsets it.
    pub fn set(&mut self, class: TaxClass, gallons: Decimal) {
        if gallons.is_zero() {
            self.0.remove(&class);
        } else {
            self.0.insert(class, gallons);
        }
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, class: TaxClass, gallons: Decimal) -> Self {
        self.set(class, gallons);
        self
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        saturating_sum(self.0.values().copied())
    }

    /// Every class in report order, including unset ones as zero.
    pub fn iter(&self) -> impl Iterator<Item = (TaxClass, Decimal)> + '_ {
        TaxClass::ALL
            .into_iter()
            .map(|class| (class, self.get(class)))
    }
}

impl PartialEq for TaxClassBalances {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for TaxClassBalances {}

/// Proof-gallon volume per spirits class. Unset classes read as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpiritsBalances(BTreeMap<SpiritsClass, Decimal>);

impl SpiritsBalances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, class: SpiritsClass) -> Decimal {
        self.0.get(&class).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, class: SpiritsClass, proof_gallons: Decimal) {
        if proof_gallons.is_zero() {
            self.0.remove(&class);
        } else {
            self.0.insert(class, proof_gallons);
        }
    }

    #[must_use]
    pub fn with(mut self, class: SpiritsClass, proof_gallons: Decimal) -> Self {
        self.set(class, proof_gallons);
        self
    }

    #[must_use]
    pub fn total(&self) -> Decimal {
        saturating_sum(self.0.values().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpiritsClass, Decimal)> + '_ {
        SpiritsClass::ALL
            .into_iter()
            .map(|class| (class, self.get(class)))
    }
}

impl PartialEq for SpiritsBalances {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for SpiritsBalances {}

/// Section of the opening balance a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSection {
    Bulk,
    Bottled,
    Spirits,
}

impl fmt::Display for BalanceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk => write!(f, "bulk"),
            Self::Bottled => write!(f, "bottled"),
            Self::Spirits => write!(f, "spirits"),
        }
    }
}

/// Reason an opening balance was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BalanceRejection {
    #[error("{section}.{key} must not be negative (got {value})")]
    Negative {
        section: BalanceSection,
        key: &'static str,
        value: Decimal,
    },
    #[error("{section}.{key} must not exceed {max} (got {value})")]
    TooLarge {
        section: BalanceSection,
        key: &'static str,
        value: Decimal,
        max: Decimal,
    },
}

fn check_volume(
    section: BalanceSection,
    key: &'static str,
    value: Decimal,
) -> Result<(), BalanceRejection> {
    if value < Decimal::ZERO {
        return Err(BalanceRejection::Negative {
            section,
            key,
            value,
        });
    }
    if value > MAX_VOLUME_GALLONS {
        return Err(BalanceRejection::TooLarge {
            section,
            key,
            value,
            max: MAX_VOLUME_GALLONS,
        });
    }
    Ok(())
}

/// Bulk, bottled and spirits balances together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalances {
    #[serde(default)]
    pub bulk: TaxClassBalances,
    #[serde(default)]
    pub bottled: TaxClassBalances,
    #[serde(default)]
    pub spirits: SpiritsBalances,
}

impl OpeningBalances {
    /// Regulator figure for a class: bulk plus bottled.
    #[must_use]
    pub fn ttb_balance(&self, class: TaxClass) -> Decimal {
        self.bulk.get(class).saturating_add(self.bottled.get(class))
    }

    /// Wine gallons across every class, bulk and bottled.
    #[must_use]
    pub fn wine_total(&self) -> Decimal {
        self.bulk.total().saturating_add(self.bottled.total())
    }

    /// Proof gallons of spirits. Not part of the wine-gallon reconciliation.
    #[must_use]
    pub fn spirits_total(&self) -> Decimal {
        self.spirits.total()
    }

    /// Whether any balance at all has been entered.
    #[must_use]
    pub fn has_any_balance(&self) -> bool {
        self.wine_total() > Decimal::ZERO || self.spirits_total() > Decimal::ZERO
    }

    /// Reject negative or oversized volumes anywhere.
    pub fn validate(&self) -> Result<(), BalanceRejection> {
        for (section, balances) in [
            (BalanceSection::Bulk, &self.bulk),
            (BalanceSection::Bottled, &self.bottled),
        ] {
            for (class, value) in balances.iter() {
                check_volume(section, class.key(), value)?;
            }
        }
        for (class, value) in self.spirits.iter() {
            check_volume(BalanceSection::Spirits, class.key(), value)?;
        }
        Ok(())
    }
}

/// The organization's current opening balance. Overwritten on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalanceSnapshot {
    /// Reporting cutoff.
    pub date: NaiveDate,
    pub balances: OpeningBalances,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_notes: Option<String>,
}

/// Step-one draft of an opening balance; the date may not be chosen yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalanceDraft {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub balances: OpeningBalances,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_notes: Option<String>,
}

impl OpeningBalanceDraft {
    #[must_use]
    pub fn has_date(&self) -> bool {
        self.date.is_some()
    }

    /// Finalize the draft. Fails when no date has been chosen.
    pub fn to_snapshot(&self) -> OnboardingResult<OpeningBalanceSnapshot> {
        let date = self.date.ok_or_else(|| OnboardingError::PreconditionFailed {
            operation: "save opening balances",
            reason: "opening balance date is not set".to_string(),
        })?;
        Ok(OpeningBalanceSnapshot {
            date,
            balances: self.balances.clone(),
            reconciliation_notes: self.reconciliation_notes.clone(),
        })
    }
}

impl From<OpeningBalanceSnapshot> for OpeningBalanceDraft {
    fn from(snapshot: OpeningBalanceSnapshot) -> Self {
        Self {
            date: Some(snapshot.date),
            balances: snapshot.balances,
            reconciliation_notes: snapshot.reconciliation_notes,
        }
    }
}
