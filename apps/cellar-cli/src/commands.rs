//! Command handlers.
//!
//! Each invocation opens the organization's wizard over a file-backed draft,
//! applies one action, and prints the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use cellar_core::OrganizationId;
use cellar_ttb::balances::OpeningBalances;
use cellar_ttb::gap::LegacyBatchInput;
use cellar_ttb::inventory::{InventoryItem, StaticInventoryAggregator, SystemInventory};
use cellar_ttb::onboarding::{FileDraftStore, Step, Step1Update};
use cellar_ttb::tax_class::LegacyTaxClass;
use cellar_ttb::{OnboardingConfig, OnboardingError, OnboardingWizard};

use crate::error::{CliError, CliResult};
use crate::output;

/// Inventory export accepted by `reconcile`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InventoryFile {
    Inventory(SystemInventory),
    Items(Vec<InventoryItem>),
}

impl InventoryFile {
    /// Inventory as of `as_of`, whatever date the export carried.
    pub fn into_inventory(self, as_of: NaiveDate) -> SystemInventory {
        match self {
            Self::Inventory(inventory) => SystemInventory { as_of, ..inventory },
            Self::Items(items) => SystemInventory::from_items(as_of, items),
        }
    }
}

/// Fields for `legacy add`.
pub struct NewLegacy {
    pub name: String,
    pub gallons: Decimal,
    pub tax_class: LegacyTaxClass,
    pub notes: Option<String>,
    pub ph: Option<Decimal>,
    pub original_gravity: Option<Decimal>,
    pub final_gravity: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> CliResult<T> {
    let contents = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub struct Session {
    wizard: OnboardingWizard,
    json: bool,
}

impl Session {
    pub fn open(
        org: Option<OrganizationId>,
        draft_dir: Option<PathBuf>,
        config: OnboardingConfig,
        json: bool,
    ) -> CliResult<Self> {
        let organization_id = org.ok_or_else(|| {
            CliError::Validation("pass --org or set CELLAR_ORG_ID".to_string())
        })?;
        let dir = draft_dir
            .or_else(|| config.resolved_draft_dir())
            .ok_or(CliError::NoDraftDir)?;
        let drafts = Arc::new(FileDraftStore::new(dir));
        Ok(Self {
            wizard: OnboardingWizard::open(organization_id, drafts, config),
            json,
        })
    }

    fn show_status(&self) -> CliResult<()> {
        if self.json {
            return output::print_json(&json!({
                "organization_id": self.wizard.organization_id(),
                "has_draft": self.wizard.has_draft(),
                "completed_steps": self.wizard.state().completed_steps(),
                "gap_status": self.wizard.gap_status(),
                "remaining_gap": self.wizard.remaining_gap(),
                "warnings": self.wizard.warnings(),
                "state": self.wizard.state(),
            }));
        }
        print!("{}", output::status(self.wizard.state()));
        Ok(())
    }

    fn show_step(&self, step: Step) -> CliResult<()> {
        if self.json {
            return output::print_json(&json!({ "current_step": step }));
        }
        println!("Now on step {}: {}", step.number(), step.title());
        Ok(())
    }

    pub fn status(&self) -> CliResult<()> {
        self.show_status()
    }

    pub fn balances(
        &mut self,
        date: Option<NaiveDate>,
        file: Option<PathBuf>,
        notes: Option<String>,
    ) -> CliResult<()> {
        let balances = file
            .map(|path| read_json::<OpeningBalances>(&path))
            .transpose()?;
        self.wizard.update_step1(Step1Update {
            date,
            balances,
            reconciliation_notes: notes,
        })?;
        self.show_status()
    }

    pub async fn reconcile(&mut self, path: &Path) -> CliResult<()> {
        let as_of = self.wizard.state().step1.date.ok_or_else(|| {
            OnboardingError::PreconditionFailed {
                operation: "calculate reconciliation",
                reason: "opening balance date is not set".to_string(),
            }
        })?;
        let inventory = read_json::<InventoryFile>(path)?.into_inventory(as_of);

        let aggregator = StaticInventoryAggregator::new();
        aggregator
            .insert(self.wizard.organization_id(), inventory)
            .await;
        let recomputed = self.wizard.refresh_reconciliation(&aggregator).await?;
        if !recomputed && !self.json {
            println!("Inputs unchanged; reconciliation is current.");
        }
        self.show_status()
    }

    pub fn legacy_list(&self) -> CliResult<()> {
        if self.json {
            return output::print_json(&self.wizard.state().step3.legacy_batches);
        }
        print!("{}", output::legacy_batches(self.wizard.state()));
        Ok(())
    }

    pub fn legacy_add(&mut self, new: NewLegacy) -> CliResult<()> {
        let mut batch = LegacyBatchInput::new(new.name, new.gallons, new.tax_class);
        batch.notes = new.notes;
        batch.ph = new.ph;
        batch.original_gravity = new.original_gravity;
        batch.final_gravity = new.final_gravity;
        batch.start_date = new.start_date;

        let index = self.wizard.add_legacy_batch(batch)?;
        if self.json {
            return output::print_json(&json!({
                "index": index,
                "remaining_gap": self.wizard.remaining_gap(),
                "gap_status": self.wizard.gap_status(),
            }));
        }
        println!(
            "Added legacy batch {index}. Gap: {}",
            output::gap_status(self.wizard.gap_status())
        );
        Ok(())
    }

    pub fn legacy_remove(&mut self, index: usize) -> CliResult<()> {
        let removed = self
            .wizard
            .remove_legacy_batch(index)
            .ok_or_else(|| {
                CliError::Validation(format!("no legacy batch at index {index}"))
            })?;
        if self.json {
            return output::print_json(&json!({
                "removed": removed,
                "remaining_gap": self.wizard.remaining_gap(),
            }));
        }
        println!(
            "Removed '{}'. Gap: {}",
            removed.name,
            output::gap_status(self.wizard.gap_status())
        );
        Ok(())
    }

    pub fn explain(&mut self, text: Option<String>) -> CliResult<()> {
        self.wizard.set_discrepancy_notes(text);
        if !self.json {
            println!("Discrepancy explanation updated.");
        }
        Ok(())
    }

    pub fn next(&mut self) -> CliResult<()> {
        let step = self.wizard.go_next()?;
        self.show_step(step)
    }

    pub fn back(&mut self) -> CliResult<()> {
        let step = self.wizard.go_back();
        self.show_step(step)
    }

    pub fn goto(&mut self, number: u8) -> CliResult<()> {
        let target = Step::from_number(number).ok_or_else(|| {
            CliError::Validation(format!("step must be 1-4 (got {number})"))
        })?;
        let step = self.wizard.go_to_step(target)?;
        self.show_step(step)
    }

    pub fn confirm(&mut self, yes: bool) -> CliResult<()> {
        if self.wizard.current_step() != Step::SaveConfirm {
            return Err(CliError::Validation(format!(
                "confirmation happens on step {}; currently on step {}",
                Step::SaveConfirm,
                self.wizard.current_step()
            )));
        }
        let plan = self.wizard.preview_commit()?;
        if !yes {
            if self.json {
                return output::print_json(&plan);
            }
            println!(
                "Will save opening balances as of {}, create {} legacy batch(es) and record '{}'.",
                plan.opening_balances.date,
                plan.legacy_batches.len(),
                plan.reconciliation_snapshot.name
            );
            for (class, volume) in output::legacy_by_class(self.wizard.state()) {
                println!("  {}: {} gal from legacy batches", class.label(), volume);
            }
            println!("Re-run with --yes to confirm.");
            return Ok(());
        }

        self.wizard.set_confirmed(true);
        if self.json {
            return output::print_json(&json!({ "confirmed": true, "persisted": false }));
        }
        println!(
            "Onboarding confirmed in the draft. Nothing has been persisted; run `plan` to review."
        );
        Ok(())
    }

    pub fn plan(&self) -> CliResult<()> {
        let plan = self.wizard.preview_commit()?;
        output::print_json(&plan)
    }

    pub fn reset(&mut self) -> CliResult<()> {
        self.wizard.reset()?;
        if !self.json {
            println!("Onboarding draft discarded.");
        }
        Ok(())
    }
}
