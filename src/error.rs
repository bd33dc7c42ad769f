//! Error taxonomy for the inventory core.
//!
//! Every public operation returns [`InventoryError`]. Store implementations
//! report [`StoreError`](crate::store::StoreError), which is classified here:
//! unique-constraint violations become [`InventoryError::Conflict`], missing
//! rows become [`InventoryError::NotFound`], everything else is a transient
//! [`InventoryError::Persistence`] failure.

use crate::store::StoreError;
use std::fmt;

/// Which uniqueness rule a conflicting write broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Two cells in the same storage share an address
    CellAddress,
    /// A storage with the same code already exists
    StorageCode,
}

/// Kind of entity a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Storage,
    Partition,
    Cell,
    Item,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Storage => "storage",
            EntityKind::Partition => "partition",
            EntityKind::Cell => "cell",
            EntityKind::Item => "item",
        };
        f.write_str(name)
    }
}

/// Inventory error type
#[derive(Debug)]
pub enum InventoryError {
    /// Malformed input, rejected before any persistence call
    Validation {
        field: &'static str,
        reason: String,
    },
    /// A referenced storage, partition or cell does not exist
    NotFound { entity: EntityKind, id: i64 },
    /// Address or code uniqueness violated; `value` is the colliding address or code
    Conflict { kind: ConflictKind, value: String },
    /// Transaction or IO failure from the persistence collaborator
    Persistence(StoreError),
}

impl InventoryError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        InventoryError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: EntityKind, id: i64) -> Self {
        InventoryError::NotFound { entity, id }
    }

    pub(crate) fn address_conflict(address: impl Into<String>) -> Self {
        InventoryError::Conflict {
            kind: ConflictKind::CellAddress,
            value: address.into(),
        }
    }

    /// True for failures the caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Persistence(_))
    }
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::Validation { field, reason } => {
                write!(f, "Validation error on `{field}`: {reason}")
            }
            InventoryError::NotFound { entity, id } => {
                write!(f, "Not found: {entity} {id} does not exist")
            }
            InventoryError::Conflict { kind, value } => match kind {
                ConflictKind::CellAddress => {
                    write!(f, "Conflict: address {value} is already used in this storage")
                }
                ConflictKind::StorageCode => {
                    write!(f, "Conflict: storage code {value} already exists")
                }
            },
            InventoryError::Persistence(e) => {
                write!(f, "Persistence error: {e}")
            }
        }
    }
}

impl std::error::Error for InventoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InventoryError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint, value } => InventoryError::Conflict {
                kind: constraint,
                value,
            },
            StoreError::RowNotFound { entity, id } => InventoryError::NotFound { entity, id },
            other => InventoryError::Persistence(other),
        }
    }
}
