//! Common test utilities for cellar-ttb integration tests.
//!
//! Every test gets its own organization and in-memory collaborators, so tests
//! are isolated from each other and from the filesystem.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use cellar_core::{BatchId, OrganizationId};
use cellar_ttb::balances::{OpeningBalances, TaxClassBalances};
use cellar_ttb::inventory::{
    InventoryForm, InventoryItem, StaticInventoryAggregator, SystemInventory,
};
use cellar_ttb::onboarding::{InMemoryDraftStore, OnboardingWizard, Step1Update};
use cellar_ttb::store::{InMemoryOnboardingStore, InMemoryReadCache};
use cellar_ttb::tax_class::TaxClass;
use cellar_ttb::{CommitMode, OnboardingConfig};

static INIT: Once = Once::new();

/// Install a test-writer subscriber when `RUST_LOG` is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        }
    });
}

/// Isolated collaborators for one test.
#[derive(Clone)]
pub struct TestStores {
    pub store: Arc<InMemoryOnboardingStore>,
    pub cache: Arc<InMemoryReadCache>,
    pub drafts: Arc<InMemoryDraftStore>,
    pub aggregator: Arc<StaticInventoryAggregator>,
}

impl TestStores {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryOnboardingStore::new()),
            cache: Arc::new(InMemoryReadCache::new()),
            drafts: Arc::new(InMemoryDraftStore::new()),
            aggregator: Arc::new(StaticInventoryAggregator::new()),
        }
    }
}

impl Default for TestStores {
    fn default() -> Self {
        Self::new()
    }
}

/// Test context with an organization and its collaborators.
pub struct TestContext {
    pub organization_id: OrganizationId,
    pub stores: TestStores,
    pub config: OnboardingConfig,
}

impl TestContext {
    pub fn new() -> Self {
        init_test_logging();
        Self {
            organization_id: OrganizationId::new(),
            stores: TestStores::new(),
            config: OnboardingConfig::default(),
        }
    }

    pub fn with_commit_mode(mode: CommitMode) -> Self {
        let mut ctx = Self::new();
        ctx.config.commit_mode = mode;
        ctx
    }

    /// Open a wizard over this context's draft store.
    pub fn wizard(&self) -> OnboardingWizard {
        OnboardingWizard::open(
            self.organization_id,
            self.stores.drafts.clone(),
            self.config.clone(),
        )
    }

    /// Register the system inventory for this organization.
    pub async fn seed_inventory(&self, inventory: SystemInventory) {
        self.stores
            .aggregator
            .insert(self.organization_id, inventory)
            .await;
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub mod fixtures {
    use super::*;

    pub fn opening_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    pub fn gallons(value: i64) -> Decimal {
        Decimal::from(value)
    }

    /// Cider opening balance split into bulk and bottled.
    pub fn cider_balances(bulk: i64, bottled: i64) -> OpeningBalances {
        OpeningBalances {
            bulk: TaxClassBalances::new().with(TaxClass::HardCider, gallons(bulk)),
            bottled: TaxClassBalances::new().with(TaxClass::HardCider, gallons(bottled)),
            ..Default::default()
        }
    }

    pub fn step1(balances: OpeningBalances) -> Step1Update {
        Step1Update {
            date: Some(opening_date()),
            balances: Some(balances),
            reconciliation_notes: None,
        }
    }

    pub fn item(class: TaxClass, form: InventoryForm, volume: Decimal) -> InventoryItem {
        InventoryItem {
            batch_id: BatchId::new(),
            batch_name: format!("{} batch", class.label()),
            tax_class: class,
            form,
            volume_gallons: volume,
            vessel_id: None,
            vessel_name: None,
        }
    }

    /// All-bulk inventory for one class at the opening date.
    pub fn inventory(class: TaxClass, volume: Decimal) -> SystemInventory {
        SystemInventory::from_items(
            opening_date(),
            vec![item(class, InventoryForm::Bulk, volume)],
        )
    }
}
