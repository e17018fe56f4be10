//! The four-step onboarding wizard.
//!
//! Starting Point, Reconciliation, Resolve Gaps, Save & Confirm. The wizard
//! owns one [`OnboardingState`] and writes it to the draft store after every
//! mutation so an interrupted session can be resumed.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use cellar_core::OrganizationId;

use super::commit::{self, CommitPlan, CommitReceipt};
use super::draft::DraftStore;
use super::state::{OnboardingState, OnboardingWarning, Step};
use crate::balances::{OpeningBalanceDraft, OpeningBalances, TaxClassBalances};
use crate::config::OnboardingConfig;
use crate::error::{OnboardingError, OnboardingResult};
use crate::gap::{GapStatus, LegacyBatchInput};
use crate::inventory::{InventoryAggregator, SystemInventory};
use crate::reconciliation::reconcile;
use crate::store::{OnboardingStore, ReadCacheInvalidator};
use crate::tax_class::{SpiritsClass, TaxClass};

/// Partial update of the step-one draft. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct Step1Update {
    pub date: Option<NaiveDate>,
    pub balances: Option<OpeningBalances>,
    /// An empty string clears the notes.
    pub reconciliation_notes: Option<String>,
}

/// Wizard session for one organization.
pub struct OnboardingWizard {
    organization_id: OrganizationId,
    draft_key: String,
    drafts: Arc<dyn DraftStore>,
    config: OnboardingConfig,
    state: OnboardingState,
}

impl std::fmt::Debug for OnboardingWizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingWizard")
            .field("organization_id", &self.organization_id)
            .field("draft_key", &self.draft_key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl OnboardingWizard {
    /// Open a session, resuming the stored draft if there is a usable one.
    pub fn open(
        organization_id: OrganizationId,
        drafts: Arc<dyn DraftStore>,
        config: OnboardingConfig,
    ) -> Self {
        let draft_key = format!("{}-{}", config.draft_key, organization_id);
        let resumed = drafts.load(&draft_key);
        info!(
            organization_id = %organization_id,
            resumed = resumed.is_some(),
            "Opened onboarding wizard"
        );
        Self {
            organization_id,
            draft_key,
            drafts,
            config,
            state: resumed.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    #[must_use]
    pub fn state(&self) -> &OnboardingState {
        &self.state
    }

    #[must_use]
    pub fn current_step(&self) -> Step {
        self.state.current_step
    }

    #[must_use]
    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    #[must_use]
    pub fn draft_key(&self) -> &str {
        &self.draft_key
    }

    fn persist(&self) {
        if let Err(e) = self.drafts.save(&self.draft_key, &self.state) {
            warn!(
                organization_id = %self.organization_id,
                error = %e,
                "Failed to save onboarding draft"
            );
        }
    }

    fn blocked(&self, to: Step, reason: impl Into<String>) -> OnboardingError {
        let reason = reason.into();
        debug!(
            organization_id = %self.organization_id,
            from = %self.state.current_step,
            to = %to,
            reason = %reason,
            "Wizard navigation rejected"
        );
        OnboardingError::StepBlocked {
            from: self.state.current_step,
            to,
            reason,
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Advance one step. No-op on the last step.
    pub fn go_next(&mut self) -> OnboardingResult<Step> {
        let current = self.state.current_step;
        if current == Step::StartingPoint && !self.state.can_advance_from_step1() {
            let reason = if self.state.step1.has_date() {
                "enter at least one non-zero opening balance"
            } else {
                "choose the opening balance date"
            };
            return Err(self.blocked(current.next(), reason));
        }
        if current != Step::LAST {
            self.state.current_step = current.next();
            self.persist();
        }
        Ok(self.state.current_step)
    }

    /// Go back one step. No-op on the first step.
    pub fn go_back(&mut self) -> Step {
        let current = self.state.current_step;
        if current != Step::FIRST {
            self.state.current_step = current.prev();
            self.persist();
        }
        self.state.current_step
    }

    /// Jump to any visited step, or to a later one whose gate is met.
    pub fn go_to_step(&mut self, target: Step) -> OnboardingResult<Step> {
        if target > self.state.current_step && !self.state.completed_steps().contains(&target) {
            let reason = format!("step {target} is not complete");
            return Err(self.blocked(target, reason));
        }
        if target != self.state.current_step {
            self.state.current_step = target;
            self.persist();
        }
        Ok(target)
    }

    // ------------------------------------------------------------------
    // Step 1: starting point
    // ------------------------------------------------------------------

    /// Seed step one from the organization's saved opening balance.
    ///
    /// Does nothing when the draft already has a date. Returns whether the
    /// draft was seeded.
    pub async fn prefill_from(&mut self, store: &dyn OnboardingStore) -> OnboardingResult<bool> {
        if self.state.step1.has_date() {
            return Ok(false);
        }
        let Some(saved) = store
            .get_opening_balances(self.organization_id)
            .await
            .map_err(OnboardingError::Store)?
        else {
            return Ok(false);
        };

        debug!(
            organization_id = %self.organization_id,
            date = %saved.date,
            "Prefilled opening balances from saved snapshot"
        );
        self.state.step1 = OpeningBalanceDraft::from(saved);
        self.state.step2.invalidate();
        self.persist();
        Ok(true)
    }

    /// Apply a partial step-one update. A change clears the reconciliation.
    pub fn update_step1(&mut self, update: Step1Update) -> OnboardingResult<()> {
        if let Some(balances) = &update.balances {
            balances.validate()?;
        }

        let step1 = &mut self.state.step1;
        let mut inputs_changed = false;
        if let Some(date) = update.date {
            inputs_changed |= step1.date != Some(date);
            step1.date = Some(date);
        }
        if let Some(balances) = update.balances {
            inputs_changed |= step1.balances != balances;
            step1.balances = balances;
        }
        if let Some(notes) = update.reconciliation_notes {
            let notes = notes.trim();
            step1.reconciliation_notes = (!notes.is_empty()).then(|| notes.to_string());
        }

        if inputs_changed {
            if self.state.step2.calculated || self.state.step4.confirmed {
                debug!(
                    organization_id = %self.organization_id,
                    "Opening balances changed, reconciliation and confirmation cleared"
                );
            }
            self.state.step2.invalidate();
            self.state.step4.confirmed = false;
        }
        self.persist();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Step 2: reconciliation
    // ------------------------------------------------------------------

    /// Fetch inventory as of the opening date and reconcile against it.
    pub async fn refresh_reconciliation(
        &mut self,
        aggregator: &dyn InventoryAggregator,
    ) -> OnboardingResult<bool> {
        let as_of = self.required_date("calculate reconciliation")?;
        let inventory = aggregator
            .system_inventory_as_of(self.organization_id, as_of)
            .await
            .map_err(OnboardingError::Inventory)?;
        self.calculate(&inventory)
    }

    /// Reconcile against `inventory`, reusing the stored result when the
    /// inputs are unchanged. Returns whether the figures were recomputed.
    pub fn calculate(&mut self, inventory: &SystemInventory) -> OnboardingResult<bool> {
        let as_of = self.required_date("calculate reconciliation")?;
        let fingerprint = inputs_fingerprint(as_of, &self.state.step1.balances, inventory);

        if self.state.step2.calculated
            && fingerprint.is_some()
            && self.state.step2.inputs_fingerprint == fingerprint
        {
            debug!(
                organization_id = %self.organization_id,
                "Reconciliation inputs unchanged, reusing result"
            );
            return Ok(false);
        }

        let result = reconcile(&self.state.step1.balances, inventory);
        info!(
            organization_id = %self.organization_id,
            as_of = %as_of,
            ttb_total = %result.totals.ttb_total,
            system_total = %result.totals.system_total,
            difference = %result.totals.difference,
            fully_reconciled = result.totals.is_fully_reconciled,
            "Reconciliation computed"
        );
        if result.has_aggregator_drift() {
            warn!(
                organization_id = %self.organization_id,
                class_sum = %result.totals.system_total,
                reported_total = %inventory.total,
                drift = %result.aggregator_drift,
                "System inventory total disagrees with tax-class breakdown"
            );
        }

        let step2 = &mut self.state.step2;
        step2.calculated = true;
        step2.ttb_total = result.totals.ttb_total;
        step2.system_total = result.totals.system_total;
        step2.difference = result.totals.difference;
        step2.by_tax_class = result.by_tax_class;
        step2.aggregator_drift = result.aggregator_drift;
        step2.system_inventory = Some(inventory.clone());
        step2.inputs_fingerprint = fingerprint;
        self.persist();
        Ok(true)
    }

    fn required_date(&self, operation: &'static str) -> OnboardingResult<NaiveDate> {
        self.state
            .step1
            .date
            .ok_or_else(|| OnboardingError::PreconditionFailed {
                operation,
                reason: "opening balance date is not set".to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Step 3: resolve gaps
    // ------------------------------------------------------------------

    /// Validate and append a legacy batch. Returns its index.
    pub fn add_legacy_batch(&mut self, batch: LegacyBatchInput) -> OnboardingResult<usize> {
        let index = self.state.step3.legacy_batches.add(batch)?;
        debug!(
            organization_id = %self.organization_id,
            index,
            remaining_gap = %self.state.remaining_gap(),
            "Legacy batch added"
        );
        self.persist();
        Ok(index)
    }

    pub fn remove_legacy_batch(&mut self, index: usize) -> Option<LegacyBatchInput> {
        let removed = self.state.step3.legacy_batches.remove(index)?;
        debug!(
            organization_id = %self.organization_id,
            index,
            remaining_gap = %self.state.remaining_gap(),
            "Legacy batch removed"
        );
        self.persist();
        Some(removed)
    }

    pub fn set_discrepancy_notes(&mut self, notes: Option<String>) {
        self.state.step3.discrepancy_notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.persist();
    }

    #[must_use]
    pub fn remaining_gap(&self) -> Decimal {
        self.state.remaining_gap()
    }

    #[must_use]
    pub fn gap_status(&self) -> GapStatus {
        self.state.gap_status()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<OnboardingWarning> {
        self.state.warnings()
    }

    // ------------------------------------------------------------------
    // Step 4: save & confirm
    // ------------------------------------------------------------------

    pub fn set_confirmed(&mut self, confirmed: bool) {
        self.state.step4.confirmed = confirmed;
        self.persist();
    }

    /// Whether a resumable draft exists with real progress in it.
    #[must_use]
    pub fn has_draft(&self) -> bool {
        self.drafts.exists(&self.draft_key)
            && (self.state.step1.has_date() || self.state.current_step > Step::FIRST)
    }

    /// Discard the draft and start over at step one.
    ///
    /// The in-memory state is always reinitialised; a failure to clear the
    /// stored draft is reported afterwards.
    pub fn reset(&mut self) -> OnboardingResult<()> {
        self.state = OnboardingState::new();
        info!(organization_id = %self.organization_id, "Onboarding wizard reset");
        self.drafts.clear(&self.draft_key)?;
        Ok(())
    }

    /// What a confirmation would write, without writing it.
    pub fn preview_commit(&self) -> OnboardingResult<CommitPlan> {
        CommitPlan::from_state(&self.state, &self.config, Utc::now())
    }

    /// Persist the confirmed onboarding.
    ///
    /// On success the draft is cleared and the wizard starts over. On failure
    /// the wizard stays on the last step with its state intact.
    pub async fn commit(
        &mut self,
        store: &dyn OnboardingStore,
        invalidator: &dyn ReadCacheInvalidator,
    ) -> OnboardingResult<CommitReceipt> {
        if self.state.current_step != Step::SaveConfirm {
            return Err(OnboardingError::PreconditionFailed {
                operation: "commit onboarding",
                reason: format!(
                    "wizard is on step {}, not step {}",
                    self.state.current_step,
                    Step::SaveConfirm
                ),
            });
        }
        if !self.state.step4.confirmed {
            return Err(OnboardingError::NotConfirmed);
        }

        let plan = CommitPlan::from_state(&self.state, &self.config, Utc::now())?;
        let receipt = commit::execute(
            &plan,
            self.organization_id,
            self.config.commit_mode,
            store,
            invalidator,
        )
        .await?;

        if let Err(e) = self.drafts.clear(&self.draft_key) {
            warn!(
                organization_id = %self.organization_id,
                error = %e,
                "Failed to clear onboarding draft after commit"
            );
        }
        self.state = OnboardingState::new();
        Ok(receipt)
    }
}

/// SHA-256 over the reconciliation inputs in canonical form, or `None` if
/// they cannot be encoded.
fn inputs_fingerprint(
    as_of: NaiveDate,
    balances: &OpeningBalances,
    inventory: &SystemInventory,
) -> Option<String> {
    let wine = |b: &TaxClassBalances| -> Vec<(TaxClass, Decimal)> {
        b.iter().map(|(class, v)| (class, v.normalize())).collect()
    };
    let spirits: Vec<(SpiritsClass, Decimal)> = balances
        .spirits
        .iter()
        .map(|(class, v)| (class, v.normalize()))
        .collect();
    let canonical = (
        as_of,
        wine(&balances.bulk),
        wine(&balances.bottled),
        spirits,
        inventory.normalized(),
    );
    let encoded = serde_json::to_vec(&canonical).ok()?;
    Some(hex::encode(Sha256::digest(&encoded)))
}
