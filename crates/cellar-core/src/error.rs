//! Error Types
//!
//! The error type returned by every collaborator seam (stores, aggregators,
//! caches). Domain crates wrap it with their own context.
//!
//! # Example
//!
//! ```
//! use cellar_core::{CellarError, Result};
//!
//! fn find_batch(id: &str) -> Result<String> {
//!     if id.is_empty() {
//!         return Err(CellarError::NotFound {
//!             resource: "Batch".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("Batch {}", id))
//! }
//! # let _ = find_batch("");
//! ```

use crate::ids::OrganizationId;
use serde::Serialize;
use thiserror::Error;

/// Standardized error type for cellar collaborators.
///
/// # Variants
///
/// - `NotFound` - Resource not found
/// - `OrganizationMismatch` - Organization isolation violation
/// - `ValidationError` - Input rejected by the collaborator
/// - `Storage` - The backing store failed
/// - `Conflict` - Write rejected because of existing state
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellarError {
    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "Batch")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// An operation touched data owned by another organization.
    #[error("Organization mismatch: expected {expected}, got {actual}")]
    OrganizationMismatch {
        /// The expected organization ID
        expected: OrganizationId,
        /// The organization ID that was provided
        actual: OrganizationId,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// The backing store failed (connection, query, I/O).
    #[error("Storage error: {message}")]
    Storage {
        /// Message from the underlying store
        message: String,
    },

    /// The write conflicts with existing state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },
}

impl CellarError {
    /// Shorthand for a storage failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Type alias for Results using `CellarError`.
pub type Result<T> = std::result::Result<T, CellarError>;
