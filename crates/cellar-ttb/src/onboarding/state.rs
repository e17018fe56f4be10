//! Wizard session state.
//!
//! [`OnboardingState`] is owned by a single wizard session. It is serialized
//! whole into the draft store after every change so the session can resume.

use std::collections::BTreeSet;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::balances::OpeningBalanceDraft;
use crate::gap::{self, GapStatus, LegacyBatches};
use crate::inventory::SystemInventory;
use crate::reconciliation::{is_within_tolerance, TaxClassReconciliation};

/// Wizard step. Serialized as its number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    #[default]
    StartingPoint,
    Reconciliation,
    ResolveGaps,
    SaveConfirm,
}

impl Step {
    pub const FIRST: Step = Step::StartingPoint;
    pub const LAST: Step = Step::SaveConfirm;

    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::StartingPoint => 1,
            Self::Reconciliation => 2,
            Self::ResolveGaps => 3,
            Self::SaveConfirm => 4,
        }
    }

    #[must_use]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::StartingPoint),
            2 => Some(Self::Reconciliation),
            3 => Some(Self::ResolveGaps),
            4 => Some(Self::SaveConfirm),
            _ => None,
        }
    }

    /// Following step, capped at the last.
    #[must_use]
    pub fn next(self) -> Self {
        Self::from_number(self.number() + 1).unwrap_or(Self::LAST)
    }

    /// Preceding step, floored at the first.
    #[must_use]
    pub fn prev(self) -> Self {
        Self::from_number(self.number().saturating_sub(1)).unwrap_or(Self::FIRST)
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::StartingPoint => "Starting Point",
            Self::Reconciliation => "Reconciliation",
            Self::ResolveGaps => "Resolve Gaps",
            Self::SaveConfirm => "Save & Confirm",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.number()
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::from_number(number).ok_or_else(|| format!("invalid wizard step: {number}"))
    }
}

/// Reconciliation results held for step two.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step2State {
    pub calculated: bool,
    pub ttb_total: Decimal,
    pub system_total: Decimal,
    pub difference: Decimal,
    pub by_tax_class: Vec<TaxClassReconciliation>,
    pub aggregator_drift: Decimal,
    pub system_inventory: Option<SystemInventory>,
    /// Fingerprint of the inputs the figures were computed from.
    pub inputs_fingerprint: Option<String>,
}

impl Step2State {
    /// Drop a stale calculation.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step3State {
    pub legacy_batches: LegacyBatches,
    pub discrepancy_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step4State {
    pub confirmed: bool,
}

/// Condition worth surfacing that does not block the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OnboardingWarning {
    /// Part of the gap is still unexplained.
    UnresolvedGap { remaining: Decimal },
    /// Legacy batches exceed the gap.
    OverExplainedGap { excess: Decimal },
    /// The inventory grand total disagrees with its per-class breakdown.
    AggregatorDrift { drift: Decimal },
}

impl fmt::Display for OnboardingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedGap { remaining } => {
                write!(f, "{remaining} gal of the difference is still unexplained")
            }
            Self::OverExplainedGap { excess } => {
                write!(f, "legacy batches exceed the difference by {excess} gal")
            }
            Self::AggregatorDrift { drift } => write!(
                f,
                "system inventory total differs from its tax-class breakdown by {drift} gal"
            ),
        }
    }
}

/// Full wizard state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingState {
    pub current_step: Step,
    pub step1: OpeningBalanceDraft,
    pub step2: Step2State,
    pub step3: Step3State,
    pub step4: Step4State,
}

impl OnboardingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps whose completion gate is met. Step three has no gate.
    #[must_use]
    pub fn completed_steps(&self) -> BTreeSet<Step> {
        let mut completed = BTreeSet::new();
        if self.step1.has_date() {
            completed.insert(Step::StartingPoint);
        }
        if self.step2.calculated {
            completed.insert(Step::Reconciliation);
        }
        if self.step4.confirmed {
            completed.insert(Step::SaveConfirm);
        }
        completed
    }

    /// Step one needs a date and at least one non-zero balance.
    #[must_use]
    pub fn can_advance_from_step1(&self) -> bool {
        let balances = &self.step1.balances;
        self.step1.has_date()
            && (balances.wine_total() > Decimal::ZERO || balances.spirits_total() > Decimal::ZERO)
    }

    #[must_use]
    pub fn remaining_gap(&self) -> Decimal {
        gap::remaining_gap(self.step2.difference, &self.step3.legacy_batches)
    }

    #[must_use]
    pub fn gap_status(&self) -> GapStatus {
        GapStatus::classify(self.step2.difference, &self.step3.legacy_batches)
    }

    /// Non-blocking warnings for the current figures.
    #[must_use]
    pub fn warnings(&self) -> Vec<OnboardingWarning> {
        let mut warnings = Vec::new();
        if !self.step2.calculated {
            return warnings;
        }
        match self.gap_status() {
            GapStatus::Unresolved { remaining } => {
                warnings.push(OnboardingWarning::UnresolvedGap { remaining });
            }
            GapStatus::OverExplained { excess } => {
                warnings.push(OnboardingWarning::OverExplainedGap { excess });
            }
            GapStatus::Reconciled
            | GapStatus::SystemSurplus { .. }
            | GapStatus::ResolvedByLegacyBatches => {}
        }
        if !is_within_tolerance(self.step2.aggregator_drift) {
            warnings.push(OnboardingWarning::AggregatorDrift {
                drift: self.step2.aggregator_drift,
            });
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::LegacyBatchInput;
    use crate::tax_class::{SpiritsClass, TaxClass};
    use chrono::NaiveDate;

    fn dated() -> OnboardingState {
        let mut state = OnboardingState::new();
        state.step1.date = NaiveDate::from_ymd_opt(2024, 12, 31);
        state
    }

    #[test]
    fn test_step_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Step::ResolveGaps).unwrap(), "3");
        assert_eq!(
            serde_json::from_str::<Step>("4").unwrap(),
            Step::SaveConfirm
        );
        assert!(serde_json::from_str::<Step>("5").is_err());
    }

    #[test]
    fn test_step_navigation_bounds() {
        assert_eq!(Step::SaveConfirm.next(), Step::SaveConfirm);
        assert_eq!(Step::StartingPoint.prev(), Step::StartingPoint);
        assert_eq!(Step::Reconciliation.next(), Step::ResolveGaps);
        assert_eq!(Step::ResolveGaps.prev(), Step::Reconciliation);
    }

    #[test]
    fn test_completed_steps() {
        let mut state = OnboardingState::new();
        assert!(state.completed_steps().is_empty());

        state = dated();
        state.step2.calculated = true;
        state.step4.confirmed = true;
        let completed: Vec<_> = state.completed_steps().into_iter().collect();
        assert_eq!(
            completed,
            vec![Step::StartingPoint, Step::Reconciliation, Step::SaveConfirm]
        );
    }

    #[test]
    fn test_zero_balances_block_step1() {
        let mut state = dated();
        assert!(!state.can_advance_from_step1());

        state
            .step1
            .balances
            .spirits
            .set(SpiritsClass::GrapeSpirits, Decimal::ONE);
        assert!(state.can_advance_from_step1());
    }

    #[test]
    fn test_balances_without_date_block_step1() {
        let mut state = OnboardingState::new();
        state
            .step1
            .balances
            .bulk
            .set(TaxClass::HardCider, Decimal::from(10));
        assert!(!state.can_advance_from_step1());
    }

    #[test]
    fn test_warnings_report_unresolved_gap_and_drift() {
        let mut state = dated();
        state.step2.calculated = true;
        state.step2.difference = Decimal::from(20);
        state.step2.aggregator_drift = Decimal::from(3);
        let half = LegacyBatchInput::new("Half", Decimal::from(10), TaxClass::HardCider);
        state.step3.legacy_batches.add(half).unwrap();

        assert_eq!(
            state.warnings(),
            vec![
                OnboardingWarning::UnresolvedGap {
                    remaining: Decimal::from(10)
                },
                OnboardingWarning::AggregatorDrift {
                    drift: Decimal::from(3)
                },
            ]
        );
    }

    #[test]
    fn test_state_roundtrips_through_json() {
        let mut state = dated();
        state.current_step = Step::ResolveGaps;
        state.step3.discrepancy_notes = Some("pre-system stock".to_string());

        let json = serde_json::to_string(&state).unwrap();
        let parsed: OnboardingState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
