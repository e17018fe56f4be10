//! Organization scoping
//!
//! Records persisted on behalf of an organization implement
//! [`OrganizationScoped`] so stores can verify ownership generically.
//!
//! # Example
//!
//! ```
//! use cellar_core::{OrganizationId, OrganizationScoped};
//!
//! struct Batch {
//!     organization_id: OrganizationId,
//! }
//!
//! impl OrganizationScoped for Batch {
//!     fn organization_id(&self) -> OrganizationId {
//!         self.organization_id
//!     }
//! }
//!
//! let org = OrganizationId::new();
//! let batch = Batch { organization_id: org };
//! assert!(batch.belongs_to(org));
//! ```

use crate::ids::OrganizationId;

/// Trait for records that belong to a specific organization.
pub trait OrganizationScoped {
    /// Returns the organization that owns this record.
    fn organization_id(&self) -> OrganizationId;

    /// Whether the record is owned by `organization_id`.
    fn belongs_to(&self, organization_id: OrganizationId) -> bool {
        self.organization_id() == organization_id
    }
}
