//! Onboarding workflow: session state, resumable drafts, the step wizard and
//! the final commit.

pub mod commit;
pub mod draft;
pub mod state;
pub mod wizard;

pub use commit::{CommitMode, CommitPlan, CommitReceipt, CommitStep};
pub use draft::{
    DraftEnvelope, DraftError, DraftStore, FileDraftStore, InMemoryDraftStore, DRAFT_KEY,
    DRAFT_SCHEMA_VERSION,
};
pub use state::{OnboardingState, OnboardingWarning, Step, Step2State, Step3State, Step4State};
pub use wizard::{OnboardingWizard, Step1Update};
