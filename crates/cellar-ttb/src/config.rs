//! Onboarding configuration.
//!
//! Loaded from environment variables with fail-fast validation. Every field
//! has a default so an empty environment yields a working configuration.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::onboarding::commit::CommitMode;
use crate::onboarding::draft::DRAFT_KEY;

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Onboarding workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// How the final commit applies its writes.
    #[serde(default)]
    pub commit_mode: CommitMode,

    /// Prefix of the key the wizard draft is stored under.
    #[serde(default = "default_draft_key")]
    pub draft_key: String,

    /// Directory for file-backed drafts. `None` uses the platform data dir.
    #[serde(default)]
    pub draft_dir: Option<PathBuf>,

    /// Name prefix for persisted reconciliation snapshots.
    #[serde(default = "default_snapshot_name_prefix")]
    pub snapshot_name_prefix: String,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_draft_key() -> String {
    DRAFT_KEY.to_string()
}

fn default_snapshot_name_prefix() -> String {
    "TTB Opening Balance Reconciliation".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            commit_mode: CommitMode::default(),
            draft_key: default_draft_key(),
            draft_dir: None,
            snapshot_name_prefix: default_snapshot_name_prefix(),
            log_filter: default_log_filter(),
        }
    }
}

impl OnboardingConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup("CELLAR_TTB_COMMIT_MODE") {
            config.commit_mode = mode.parse().map_err(|message| ConfigError::InvalidValue {
                var: "CELLAR_TTB_COMMIT_MODE".to_string(),
                message,
            })?;
        }
        if let Some(key) = lookup("CELLAR_TTB_DRAFT_KEY") {
            config.draft_key = non_empty("CELLAR_TTB_DRAFT_KEY", key)?;
        }
        if let Some(dir) = lookup("CELLAR_TTB_DRAFT_DIR") {
            config.draft_dir = Some(PathBuf::from(non_empty("CELLAR_TTB_DRAFT_DIR", dir)?));
        }
        if let Some(prefix) = lookup("CELLAR_TTB_SNAPSHOT_PREFIX") {
            config.snapshot_name_prefix = non_empty("CELLAR_TTB_SNAPSHOT_PREFIX", prefix)?;
        }
        if let Some(filter) = lookup("CELLAR_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Draft directory, falling back to `<data dir>/cellar`.
    #[must_use]
    pub fn resolved_draft_dir(&self) -> Option<PathBuf> {
        self.draft_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("cellar")))
    }
}

fn non_empty(var: &str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
