//! cellar Core Library
//!
//! Shared types and traits for the cellar production tracker.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (OrganizationId, BatchId, VesselId, SnapshotId)
//! - [`traits`] - Organization scoping (OrganizationScoped)
//! - [`error`] - Standardized collaborator error type (CellarError)
//!
//! # Example
//!
//! ```
//! use cellar_core::{BatchId, CellarError, OrganizationId, Result};
//!
//! let organization_id = OrganizationId::new();
//! let batch_id = BatchId::new();
//!
//! fn example() -> Result<()> {
//!     Err(CellarError::Storage {
//!         message: "connection reset".to_string(),
//!     })
//! }
//! # let _ = (organization_id, batch_id, example());
//! ```

pub mod error;
pub mod ids;
pub mod traits;

pub use error::{CellarError, Result};
pub use ids::{BatchId, OrganizationId, ParseIdError, SnapshotId, VesselId};
pub use traits::OrganizationScoped;
