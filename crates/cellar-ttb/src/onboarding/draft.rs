//! Resumable draft storage for the wizard.
//!
//! Drafts are stored as a [`DraftEnvelope`] carrying an explicit schema
//! version. Reading a draft never fails: a missing, unreadable, unparsable or
//! wrong-version draft is treated as no draft at all.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::state::OnboardingState;

/// Default draft key.
pub const DRAFT_KEY: &str = "ttb-onboarding-draft";

/// Version of the serialized [`OnboardingState`] layout.
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// Errors writing or clearing a draft.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Failed to access draft file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize draft: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to create draft directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Draft store lock poisoned")]
    Poisoned,
}

/// Persisted wrapper around the wizard state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEnvelope {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: OnboardingState,
}

impl DraftEnvelope {
    #[must_use]
    pub fn new(state: OnboardingState) -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }

    fn encode(state: &OnboardingState) -> Result<String, DraftError> {
        Ok(serde_json::to_string_pretty(&Self::new(state.clone()))?)
    }

    /// Decode a stored draft, or `None` if it should be discarded.
    #[must_use]
    pub fn decode(key: &str, contents: &str) -> Option<OnboardingState> {
        #[derive(Deserialize)]
        struct Header {
            schema_version: u32,
        }

        let header = match serde_json::from_str::<Header>(contents) {
            Ok(header) => header,
            Err(e) => {
                debug!(key = %key, error = %e, "Discarding unreadable draft");
                return None;
            }
        };
        if header.schema_version != DRAFT_SCHEMA_VERSION {
            debug!(
                key = %key,
                found = header.schema_version,
                expected = DRAFT_SCHEMA_VERSION,
                "Discarding draft with mismatched schema version"
            );
            return None;
        }
        match serde_json::from_str::<Self>(contents) {
            Ok(envelope) => Some(envelope.state),
            Err(e) => {
                debug!(key = %key, error = %e, "Discarding corrupted draft");
                None
            }
        }
    }
}

/// Key-value store for wizard drafts.
pub trait DraftStore: Send + Sync {
    /// The stored state, or `None` when absent or unusable.
    fn load(&self, key: &str) -> Option<OnboardingState>;

    fn save(&self, key: &str, state: &OnboardingState) -> Result<(), DraftError>;

    /// Remove the draft. Succeeds when nothing is stored.
    fn clear(&self, key: &str) -> Result<(), DraftError>;

    /// Whether a usable draft is stored under `key`.
    fn exists(&self, key: &str) -> bool {
        self.load(key).is_some()
    }
}

/// Draft store writing one `<key>.json` file per draft.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn draft_path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }

    fn ensure_dir(&self) -> Result<(), DraftError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|source| DraftError::Directory {
                path: self.dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self, key: &str) -> Option<OnboardingState> {
        let path = self.draft_path(key);
        if !path.exists() {
            return None;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to read draft file");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        let state = DraftEnvelope::decode(key, &contents);
        if state.is_none() {
            let _ = fs::remove_file(&path);
        }
        state
    }

    fn save(&self, key: &str, state: &OnboardingState) -> Result<(), DraftError> {
        self.ensure_dir()?;
        let path = self.draft_path(key);
        let contents = DraftEnvelope::encode(state)?;
        fs::write(&path, contents).map_err(|source| DraftError::Io { path, source })
    }

    fn clear(&self, key: &str) -> Result<(), DraftError> {
        let path = self.draft_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| DraftError::Io { path, source })?;
        }
        Ok(())
    }
}

/// Draft store holding serialized envelopes in memory.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<String, String>>,
}

impl InMemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw contents under `key`, bypassing encoding (for testing).
    pub fn insert_raw(&self, key: &str, contents: impl Into<String>) -> Result<(), DraftError> {
        self.drafts
            .write()
            .map_err(|_| DraftError::Poisoned)?
            .insert(key.to_string(), contents.into());
        Ok(())
    }

    /// Raw stored contents, if any.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.drafts.read().ok()?.get(key).cloned()
    }
}

impl DraftStore for InMemoryDraftStore {
    fn load(&self, key: &str) -> Option<OnboardingState> {
        let contents = self.raw(key)?;
        let state = DraftEnvelope::decode(key, &contents);
        if state.is_none() {
            if let Ok(mut drafts) = self.drafts.write() {
                drafts.remove(key);
            }
        }
        state
    }

    fn save(&self, key: &str, state: &OnboardingState) -> Result<(), DraftError> {
        let contents = DraftEnvelope::encode(state)?;
        self.insert_raw(key, contents)
    }

    fn clear(&self, key: &str) -> Result<(), DraftError> {
        self.drafts
            .write()
            .map_err(|_| DraftError::Poisoned)?
            .remove(key);
        Ok(())
    }
}
