//! TTB opening-balance reconciliation.
//!
//! Reconciles the inventory an operation reported to the regulator at its
//! opening cutoff against the inventory the system tracks, lets the user
//! explain the gap with legacy batches, and commits the result together with
//! an immutable reconciliation snapshot.
//!
//! # Modules
//!
//! - [`tax_class`] - Regulator tax classes and product types
//! - [`balances`] - Opening balance data contract
//! - [`inventory`] - System inventory and the aggregator seam
//! - [`reconciliation`] - Per-class reconciliation engine
//! - [`gap`] - Legacy batches and gap resolution
//! - [`snapshot`] - Reconciliation audit snapshot
//! - [`store`] - Persistence collaborators and in-memory implementations
//! - [`onboarding`] - Wizard state machine, drafts and commit protocol
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//! use cellar_ttb::balances::OpeningBalances;
//! use cellar_ttb::inventory::SystemInventory;
//! use cellar_ttb::reconciliation::reconcile;
//! use cellar_ttb::tax_class::TaxClass;
//!
//! let mut opening = OpeningBalances::default();
//! opening.bulk.set(TaxClass::HardCider, Decimal::from(100));
//!
//! let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//! let result = reconcile(&opening, &SystemInventory::empty(as_of));
//! assert_eq!(result.totals.difference, Decimal::from(100));
//! assert!(!result.totals.is_fully_reconciled);
//! ```

pub mod balances;
pub mod config;
pub mod error;
pub mod gap;
pub mod inventory;
pub mod onboarding;
pub mod reconciliation;
pub mod snapshot;
pub mod store;
pub mod tax_class;

pub use balances::{OpeningBalanceDraft, OpeningBalanceSnapshot, OpeningBalances};
pub use config::{ConfigError, OnboardingConfig};
pub use error::{OnboardingError, OnboardingResult};
pub use gap::{GapStatus, LegacyBatchInput, LegacyBatchRejection, LegacyBatches};
pub use inventory::{InventoryAggregator, StaticInventoryAggregator, SystemInventory};
pub use onboarding::{CommitMode, CommitReceipt, OnboardingWizard, Step};
pub use reconciliation::{reconcile, Reconciliation, RECONCILIATION_TOLERANCE};
pub use snapshot::ReconciliationSnapshot;
pub use store::{InMemoryOnboardingStore, InMemoryReadCache, OnboardingStore};
pub use tax_class::{LegacyTaxClass, SpiritsClass, TaxClass};
