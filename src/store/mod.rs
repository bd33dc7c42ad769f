//! Persistence collaborator.
//!
//! The core never talks to a database directly. It opens a
//! [`StoreTransaction`] through an [`InventoryStore`], performs inserts and
//! reads through that handle, and commits or rolls back. Implementations must
//! enforce two uniqueness constraints: `storages.code`, and
//! `(cells.storage_id, cells.address)`. Violations are reported as
//! [`StoreError::UniqueViolation`], either at insert time or at commit.
//!
//! A transaction that is dropped without `commit` must leave no trace.

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::{MemoryStore, MemoryTransaction};
pub use postgres::{PgStore, PgTransaction};

use crate::error::{ConflictKind, EntityKind};
use crate::model::{Cell, CellRecord, Item, ItemRecord, NewPartition, Partition, Storage};
use crate::search::{ItemStatistics, SearchHit, SearchRequest};
use may_postgres::Error as PostgresError;
use std::fmt;
use std::time::Duration;

/// Store error type
#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    UniqueViolation {
        constraint: ConflictKind,
        value: String,
    },
    /// A row the operation depends on is missing
    RowNotFound { entity: EntityKind, id: i64 },
    /// Transaction already committed or rolled back
    TransactionClosed,
    /// PostgreSQL error from may_postgres
    Postgres(PostgresError),
    /// No pooled connection became free in time
    PoolTimeout(Duration),
    /// Other backend failures (poisoned lock, row decoding, ...)
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueViolation { constraint, value } => {
                let name = match constraint {
                    ConflictKind::CellAddress => "cells(storage_id, address)",
                    ConflictKind::StorageCode => "storages(code)",
                };
                write!(f, "unique constraint {name} violated by `{value}`")
            }
            StoreError::RowNotFound { entity, id } => {
                write!(f, "{entity} row {id} not found")
            }
            StoreError::TransactionClosed => {
                write!(f, "Transaction has already been committed or rolled back")
            }
            StoreError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            StoreError::PoolTimeout(waited) => {
                write!(f, "no database connection available after {waited:?}")
            }
            StoreError::Backend(s) => write!(f, "Store error: {s}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Postgres(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        StoreError::Postgres(err)
    }
}

/// Opens transactions against a backing store.
pub trait InventoryStore: Send + Sync {
    type Transaction: StoreTransaction;

    /// Begin a new transaction. The handle is released on commit, rollback or drop.
    fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// Row operations available inside one transaction.
///
/// Reads observe the transaction's own uncommitted writes.
pub trait StoreTransaction {
    fn insert_storage(
        &mut self,
        code: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Storage, StoreError>;

    fn insert_partition(
        &mut self,
        storage_id: i64,
        partition: &NewPartition,
    ) -> Result<Partition, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] if the storage already has a
    /// cell at `cell.address`.
    fn insert_cell(&mut self, cell: &CellRecord) -> Result<Cell, StoreError>;

    fn insert_item(&mut self, item: &ItemRecord) -> Result<Item, StoreError>;

    /// Set or clear a cell's alias. `None` if the cell does not exist.
    fn update_cell_alias(
        &mut self,
        cell_id: i64,
        alias: Option<&str>,
    ) -> Result<Option<Cell>, StoreError>;

    fn find_storage(&mut self, id: i64) -> Result<Option<Storage>, StoreError>;

    fn find_cell(&mut self, id: i64) -> Result<Option<Cell>, StoreError>;

    /// All storages, ascending id
    fn list_storages(&mut self) -> Result<Vec<Storage>, StoreError>;

    /// Partitions of a storage, ascending id
    fn list_partitions(&mut self, storage_id: i64) -> Result<Vec<Partition>, StoreError>;

    /// Cells of a storage, ascending id
    fn list_cells(&mut self, storage_id: i64) -> Result<Vec<Cell>, StoreError>;

    /// Items matching `request`, ascending id, at most `request.limit`
    fn search_items(&mut self, request: &SearchRequest) -> Result<Vec<SearchHit>, StoreError>;

    /// Items at or below their alert threshold, ascending id, at most `limit`
    fn low_stock_items(&mut self, limit: usize) -> Result<Vec<SearchHit>, StoreError>;

    /// One item with its live cell and storage
    fn find_item(&mut self, id: i64) -> Result<Option<SearchHit>, StoreError>;

    /// Aggregates over every item
    fn item_statistics(&mut self) -> Result<ItemStatistics, StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}
