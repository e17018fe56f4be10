//! Terminal rendering of wizard state.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::Serialize;

use cellar_ttb::gap::GapStatus;
use cellar_ttb::onboarding::{OnboardingState, Step};
use cellar_ttb::tax_class::TaxClass;

use crate::error::CliResult;

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn gallons(value: Decimal) -> String {
    format!("{} gal", value.round_dp(2).normalize())
}

fn step_line(state: &OnboardingState, step: Step) -> String {
    let marker = if step == state.current_step {
        ">"
    } else if state.completed_steps().contains(&step) {
        "x"
    } else {
        " "
    };
    format!("[{marker}] {}. {}", step.number(), step.title())
}

pub fn gap_status(status: GapStatus) -> String {
    match status {
        GapStatus::Reconciled => "reconciled".to_string(),
        GapStatus::SystemSurplus { surplus } => {
            format!("system shows {} more than reported", gallons(surplus))
        }
        GapStatus::ResolvedByLegacyBatches => "resolved by legacy batches".to_string(),
        GapStatus::Unresolved { remaining } => format!("{} unexplained", gallons(remaining)),
        GapStatus::OverExplained { excess } => {
            format!("legacy batches exceed the gap by {}", gallons(excess))
        }
    }
}

/// Multi-line status report.
pub fn status(state: &OnboardingState) -> String {
    let mut out = String::new();
    for step in [
        Step::StartingPoint,
        Step::Reconciliation,
        Step::ResolveGaps,
        Step::SaveConfirm,
    ] {
        let _ = writeln!(out, "{}", step_line(state, step));
    }

    let step1 = &state.step1;
    let _ = writeln!(out);
    match step1.date {
        Some(date) => {
            let _ = writeln!(out, "Opening date:     {date}");
        }
        None => {
            let _ = writeln!(out, "Opening date:     (not set)");
        }
    }
    let _ = writeln!(
        out,
        "Wine total:       {}",
        gallons(step1.balances.wine_total())
    );
    let _ = writeln!(
        out,
        "Spirits total:    {} proof gal",
        step1.balances.spirits_total().round_dp(2).normalize()
    );

    let step2 = &state.step2;
    if step2.calculated {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<20} {:>12} {:>12} {:>12}",
            "Tax class", "TTB", "System", "Difference"
        );
        for row in &step2.by_tax_class {
            let _ = writeln!(
                out,
                "{:<20} {:>12} {:>12} {:>12}{}",
                row.label,
                gallons(row.ttb_balance),
                gallons(row.system_inventory),
                gallons(row.difference),
                if row.is_reconciled { "" } else { "  !" }
            );
        }
        let _ = writeln!(
            out,
            "{:<20} {:>12} {:>12} {:>12}",
            "Total",
            gallons(step2.ttb_total),
            gallons(step2.system_total),
            gallons(step2.difference)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Gap:              {}", gap_status(state.gap_status()));
    }

    if !state.step3.legacy_batches.is_empty() {
        let _ = writeln!(out);
        let _ = write!(out, "{}", legacy_batches(state));
    }

    for warning in state.warnings() {
        let _ = writeln!(out, "Warning: {warning}");
    }
    out
}

/// Numbered legacy batch listing.
pub fn legacy_batches(state: &OnboardingState) -> String {
    let mut out = String::new();
    if state.step3.legacy_batches.is_empty() {
        let _ = writeln!(out, "No legacy batches.");
        return out;
    }
    for (index, batch) in state.step3.legacy_batches.iter().enumerate() {
        let _ = writeln!(
            out,
            "{index:>3}  {:<30} {:>12}  {}",
            batch.name,
            gallons(batch.volume_gallons),
            batch.tax_class.label()
        );
    }
    let _ = writeln!(out, "Remaining gap: {}", gallons(state.remaining_gap()));
    out
}

/// Per-class legacy volume, for the confirmation summary.
pub fn legacy_by_class(state: &OnboardingState) -> Vec<(TaxClass, Decimal)> {
    let batches = &state.step3.legacy_batches;
    TaxClass::ALL
        .into_iter()
        .map(|class| (class, batches.volume_for(class)))
        .filter(|(_, volume)| !volume.is_zero())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_ttb::gap::LegacyBatchInput;

    #[test]
    fn test_gallons_formatting() {
        assert_eq!(gallons(Decimal::new(150, 0)), "150 gal");
        assert_eq!(gallons(Decimal::new(12346, 3)), "12.35 gal");
    }

    #[test]
    fn test_status_marks_current_step() {
        let state = OnboardingState::new();
        let report = status(&state);
        assert!(report.contains("[>] 1. Starting Point"));
        assert!(report.contains("Opening date:     (not set)"));
    }

    #[test]
    fn test_legacy_listing_shows_index_and_gap() {
        let mut state = OnboardingState::new();
        state.step2.difference = Decimal::from(20);
        let batch = LegacyBatchInput::new("Pre-system", Decimal::from(5), TaxClass::HardCider);
        state.step3.legacy_batches.add(batch).unwrap();

        let listing = legacy_batches(&state);
        assert!(listing.contains("0  Pre-system"));
        assert!(listing.contains("Remaining gap: 15 gal"));
        assert_eq!(
            legacy_by_class(&state),
            vec![(TaxClass::HardCider, Decimal::from(5))]
        );
    }
}
