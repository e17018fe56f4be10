//! Onboarding error types.

use cellar_core::CellarError;
use thiserror::Error;

use crate::balances::BalanceRejection;
use crate::gap::LegacyBatchRejection;
use crate::onboarding::commit::CommitStep;
use crate::onboarding::draft::DraftError;
use crate::onboarding::state::Step;

/// Errors produced by the onboarding workflow.
#[derive(Debug, Error)]
pub enum OnboardingError {
    /// A legacy batch failed form validation and was not added.
    #[error("Invalid legacy batch: {0}")]
    InvalidLegacyBatch(#[from] LegacyBatchRejection),

    /// An opening balance value was rejected.
    #[error("Invalid opening balance: {0}")]
    InvalidBalance(#[from] BalanceRejection),

    /// The operation's inputs are not ready.
    #[error("Cannot {operation}: {reason}")]
    PreconditionFailed {
        operation: &'static str,
        reason: String,
    },

    /// Navigation was refused by the step guard.
    #[error("Cannot move from step {from} to step {to}: {reason}")]
    StepBlocked {
        from: Step,
        to: Step,
        reason: String,
    },

    /// Commit was requested before the user confirmed.
    #[error("Onboarding has not been confirmed")]
    NotConfirmed,

    /// A commit sub-step failed. Earlier sub-steps may have taken effect
    /// depending on the commit mode.
    #[error("Commit failed at {step}: {source}")]
    Commit {
        step: CommitStep,
        #[source]
        source: CellarError,
    },

    /// The onboarding store could not be read.
    #[error("Failed to read onboarding data: {0}")]
    Store(#[source] CellarError),

    /// System inventory could not be fetched.
    #[error("Failed to load system inventory: {0}")]
    Inventory(#[source] CellarError),

    /// The draft could not be written or cleared.
    #[error(transparent)]
    Draft(#[from] DraftError),
}

impl OnboardingError {
    /// Whether the error is a validation rejection the user can correct.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidLegacyBatch(_) | Self::InvalidBalance(_))
    }

    /// The commit sub-step that failed, if any.
    #[must_use]
    pub fn commit_step(&self) -> Option<CommitStep> {
        match self {
            Self::Commit { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Result type alias for onboarding operations.
pub type OnboardingResult<T> = Result<T, OnboardingError>;
