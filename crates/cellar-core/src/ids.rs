//! Strongly Typed Identifiers
//!
//! Newtype wrappers around UUIDs so that an organization id can never be
//! passed where a batch id is expected.
//!
//! # Example
//!
//! ```
//! use cellar_core::{BatchId, OrganizationId};
//!
//! let organization = OrganizationId::new();
//! let batch = BatchId::new();
//!
//! fn requires_organization(id: OrganizationId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_organization(organization);
//! // requires_organization(batch); // This would not compile!
//! # let _ = (result, batch);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Consumes the ID and returns the underlying UUID.
            #[must_use]
            pub fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(
    /// Identifier for a producer organization.
    ///
    /// Every opening balance, batch and reconciliation snapshot belongs to
    /// exactly one organization.
    ///
    /// ```
    /// use cellar_core::OrganizationId;
    /// use uuid::Uuid;
    ///
    /// let uuid = Uuid::new_v4();
    /// let organization_id = OrganizationId::from_uuid(uuid);
    /// assert_eq!(organization_id.as_uuid(), &uuid);
    ///
    /// let parsed: OrganizationId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
    /// # let _ = parsed;
    /// ```
    OrganizationId
);

define_id!(
    /// Identifier for a production batch, including legacy batches.
    BatchId
);

define_id!(
    /// Identifier for a vessel (tank, barrel, fermenter).
    VesselId
);

define_id!(
    /// Identifier for a persisted reconciliation snapshot.
    SnapshotId
);
