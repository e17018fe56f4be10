//! CLI error types and exit codes

use std::path::PathBuf;

use cellar_ttb::{ConfigError, OnboardingError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Configuration error
/// - 3: Commit or store failure
/// - 4: Validation error or blocked step
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No draft directory. Set CELLAR_TTB_DRAFT_DIR or pass --draft-dir.")]
    NoDraftDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::NoDraftDir => 2,
            CliError::Onboarding(
                OnboardingError::Commit { .. }
                | OnboardingError::Store(_)
                | OnboardingError::Inventory(_),
            ) => 3,
            CliError::Onboarding(
                OnboardingError::InvalidBalance(_)
                | OnboardingError::InvalidLegacyBatch(_)
                | OnboardingError::StepBlocked { .. }
                | OnboardingError::PreconditionFailed { .. }
                | OnboardingError::NotConfirmed,
            )
            | CliError::Validation(_) => 4,
            _ => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}
