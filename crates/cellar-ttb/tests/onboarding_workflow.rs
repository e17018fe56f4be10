//! Integration tests for the onboarding wizard: navigation guards,
//! reconciliation memoisation, gap resolution and draft resumption.

mod common;

use rust_decimal::Decimal;

use cellar_ttb::balances::OpeningBalances;
use cellar_ttb::gap::{GapStatus, LegacyBatchInput};
use cellar_ttb::onboarding::{
    DraftStore, OnboardingWarning, Step, Step1Update, DRAFT_SCHEMA_VERSION,
};
use cellar_ttb::store::OnboardingWrites;
use cellar_ttb::tax_class::TaxClass;
use cellar_ttb::{OnboardingError, OpeningBalanceSnapshot};

use common::fixtures::{cider_balances, gallons, inventory, opening_date, step1};
use common::TestContext;

// ============================================================================
// Step guards
// ============================================================================

#[tokio::test]
async fn test_zero_balances_block_advance_from_step1() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard
        .update_step1(step1(OpeningBalances::default()))
        .unwrap();

    let err = wizard.go_next().unwrap_err();
    assert!(matches!(
        err,
        OnboardingError::StepBlocked {
            from: Step::StartingPoint,
            to: Step::Reconciliation,
            ..
        }
    ));
    assert_eq!(wizard.current_step(), Step::StartingPoint);

    wizard.update_step1(step1(cider_balances(1, 0))).unwrap();
    assert_eq!(wizard.go_next().unwrap(), Step::Reconciliation);
}

#[tokio::test]
async fn test_jump_to_resolve_gaps_from_step1_is_rejected() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();

    assert!(!wizard.state().step2.calculated);
    assert!(wizard.go_to_step(Step::ResolveGaps).is_err());
    assert_eq!(wizard.current_step(), Step::StartingPoint);
}

#[tokio::test]
async fn test_jump_to_confirm_requires_confirmation() {
    let ctx = TestContext::new();
    ctx.seed_inventory(inventory(TaxClass::HardCider, gallons(130)))
        .await;
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();
    wizard
        .refresh_reconciliation(ctx.stores.aggregator.as_ref())
        .await
        .unwrap();

    // Step 2 is complete, so it may be jumped to; step 4 is not.
    assert!(wizard.go_to_step(Step::SaveConfirm).is_err());
    assert_eq!(
        wizard.go_to_step(Step::Reconciliation).unwrap(),
        Step::Reconciliation
    );

    wizard.go_to_step(Step::StartingPoint).unwrap();
    wizard.set_confirmed(true);
    assert_eq!(
        wizard.go_to_step(Step::SaveConfirm).unwrap(),
        Step::SaveConfirm
    );
}

#[tokio::test]
async fn test_resolve_gaps_never_blocks_advancing() {
    let ctx = TestContext::new();
    ctx.seed_inventory(inventory(TaxClass::HardCider, gallons(130)))
        .await;
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();
    wizard.go_next().unwrap();
    wizard
        .refresh_reconciliation(ctx.stores.aggregator.as_ref())
        .await
        .unwrap();
    wizard.go_next().unwrap();

    assert_eq!(
        wizard.gap_status(),
        GapStatus::Unresolved {
            remaining: gallons(20)
        }
    );
    assert_eq!(wizard.go_next().unwrap(), Step::SaveConfirm);
    assert_eq!(wizard.go_next().unwrap(), Step::SaveConfirm);
    assert_eq!(
        wizard.warnings(),
        vec![OnboardingWarning::UnresolvedGap {
            remaining: gallons(20)
        }]
    );
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_refresh_requires_date_and_skips_aggregator() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();

    let err = wizard
        .refresh_reconciliation(ctx.stores.aggregator.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::PreconditionFailed { .. }));
    assert_eq!(ctx.stores.aggregator.call_count(), 0);
}

#[tokio::test]
async fn test_unchanged_inputs_are_not_recomputed() {
    let ctx = TestContext::new();
    ctx.seed_inventory(inventory(TaxClass::HardCider, gallons(130)))
        .await;
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();

    let aggregator = ctx.stores.aggregator.as_ref();
    assert!(wizard.refresh_reconciliation(aggregator).await.unwrap());
    assert!(!wizard.refresh_reconciliation(aggregator).await.unwrap());
    assert_eq!(aggregator.call_count(), 2);

    wizard
        .update_step1(Step1Update {
            balances: Some(cider_balances(100, 60)),
            ..Default::default()
        })
        .unwrap();
    assert!(wizard.refresh_reconciliation(aggregator).await.unwrap());
    assert_eq!(wizard.state().step2.difference, gallons(30));
}

#[tokio::test]
async fn test_new_inventory_triggers_recompute() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();

    assert!(wizard
        .calculate(&inventory(TaxClass::HardCider, gallons(130)))
        .unwrap());
    assert!(wizard
        .calculate(&inventory(TaxClass::HardCider, gallons(145)))
        .unwrap());
    assert_eq!(wizard.state().step2.difference, gallons(5));
}

#[tokio::test]
async fn test_inventory_failure_is_surfaced() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();

    let err = wizard
        .refresh_reconciliation(ctx.stores.aggregator.as_ref())
        .await
        .unwrap_err();
    assert!(matches!(err, OnboardingError::Inventory(_)));
    assert!(!wizard.state().step2.calculated);
}

// ============================================================================
// Gap resolution
// ============================================================================

#[tokio::test]
async fn test_legacy_batch_resolves_gap() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();
    wizard
        .calculate(&inventory(TaxClass::HardCider, gallons(130)))
        .unwrap();

    let cider = LegacyBatchInput::new("Pre-system cider", gallons(20), TaxClass::HardCider);
    let index = wizard.add_legacy_batch(cider).unwrap();
    assert_eq!(wizard.remaining_gap(), Decimal::ZERO);
    assert_eq!(wizard.gap_status(), GapStatus::ResolvedByLegacyBatches);
    assert!(wizard.warnings().is_empty());

    wizard.remove_legacy_batch(index).unwrap();
    assert_eq!(wizard.remaining_gap(), gallons(20));
}

#[tokio::test]
async fn test_invalid_legacy_batch_is_not_added() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();

    let err = wizard
        .add_legacy_batch(LegacyBatchInput::new(" ", gallons(5), TaxClass::HardCider))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(wizard.state().step3.legacy_batches.is_empty());
    assert!(wizard.remove_legacy_batch(0).is_none());
}

// ============================================================================
// Drafts
// ============================================================================

#[tokio::test]
async fn test_has_draft_after_reset_and_date() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();

    wizard.reset().unwrap();
    assert!(!wizard.has_draft());

    wizard
        .update_step1(Step1Update {
            date: Some(opening_date()),
            ..Default::default()
        })
        .unwrap();
    assert!(wizard.has_draft());
}

#[tokio::test]
async fn test_wizard_resumes_from_draft() {
    let ctx = TestContext::new();
    {
        let mut wizard = ctx.wizard();
        wizard.update_step1(step1(cider_balances(100, 50))).unwrap();
        wizard.go_next().unwrap();
        wizard
            .calculate(&inventory(TaxClass::HardCider, gallons(130)))
            .unwrap();
    }

    let resumed = ctx.wizard();
    assert_eq!(resumed.current_step(), Step::Reconciliation);
    assert!(resumed.state().step2.calculated);
    assert_eq!(resumed.state().step2.difference, gallons(20));
}

#[tokio::test]
async fn test_draft_with_other_schema_starts_fresh() {
    let ctx = TestContext::new();
    let key = {
        let mut wizard = ctx.wizard();
        wizard.update_step1(step1(cider_balances(100, 50))).unwrap();
        wizard.draft_key().to_string()
    };

    let raw = ctx.stores.drafts.raw(&key).unwrap();
    let mut envelope: serde_json::Value = serde_json::from_str(&raw).unwrap();
    envelope["schema_version"] = serde_json::json!(DRAFT_SCHEMA_VERSION + 1);
    ctx.stores
        .drafts
        .insert_raw(&key, envelope.to_string())
        .unwrap();

    let wizard = ctx.wizard();
    assert!(wizard.state().step1.date.is_none());
    assert!(!ctx.stores.drafts.exists(&key));
}

#[tokio::test]
async fn test_drafts_are_per_organization() {
    let ctx = TestContext::new();
    let mut wizard = ctx.wizard();
    wizard.update_step1(step1(cider_balances(100, 50))).unwrap();

    let other = cellar_ttb::OnboardingWizard::open(
        cellar_core::OrganizationId::new(),
        ctx.stores.drafts.clone(),
        ctx.config.clone(),
    );
    assert!(other.state().step1.date.is_none());
}

#[tokio::test]
async fn test_prefill_from_saved_opening_balances() {
    let ctx = TestContext::new();
    ctx.stores
        .store
        .save_opening_balances(
            ctx.organization_id,
            &OpeningBalanceSnapshot {
                date: opening_date(),
                balances: cider_balances(80, 0),
                reconciliation_notes: Some("entered in settings".to_string()),
            },
        )
        .await
        .unwrap();

    let store = ctx.stores.store.as_ref();
    let mut wizard = ctx.wizard();
    assert!(wizard.prefill_from(store).await.unwrap());
    assert_eq!(wizard.state().step1.date, Some(opening_date()));
    let balances = &wizard.state().step1.balances;
    assert_eq!(balances.ttb_balance(TaxClass::HardCider), gallons(80));

    // A dated draft is never overwritten.
    assert!(!wizard.prefill_from(store).await.unwrap());
}
