//! Atomic construction of storage hierarchies.
//!
//! [`StorageHierarchyManager::create_storage_with_partitions`] inserts a
//! storage, its partitions in caller order and every partition's cells in
//! row-major order inside one transaction. Before the transaction commits, the
//! generated addresses are checked for duplicates across all partitions of the
//! storage; a duplicate aborts the whole creation with a conflict naming the
//! address. The store's `(storage_id, address)` constraint backs this up
//! against concurrent writers.

use crate::address::{self, GridAddress};
use crate::config::InventoryConfig;
use crate::error::{EntityKind, InventoryError};
use crate::model::{
    Cell, CellRecord, NewPartition, NewStorage, Partition, PartitionNode, Storage, StorageGraph,
};
use crate::store::{InventoryStore, StoreTransaction};
use crate::transaction::run_in_transaction;
use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

pub struct StorageHierarchyManager<S> {
    store: S,
    limits: InventoryConfig,
}

impl<S: InventoryStore> StorageHierarchyManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, InventoryConfig::default())
    }

    pub fn with_config(store: S, limits: InventoryConfig) -> Self {
        Self { store, limits }
    }

    /// Create a storage with all its partitions and cells, or nothing at all.
    ///
    /// # Errors
    ///
    /// - `Validation` for empty codes/names or a zero dimension
    /// - `Conflict` when the storage code exists or two cells share an address
    /// - `Persistence` when the store fails; no rows survive
    pub fn create_storage_with_partitions(
        &self,
        definition: NewStorage,
    ) -> Result<StorageGraph, InventoryError> {
        definition.validate(&self.limits)?;
        #[cfg(feature = "tracing")]
        let _span =
            tracing_helpers::create_storage_span(&definition.code, definition.partitions.len())
                .entered();

        let result = run_in_transaction(&self.store, "create_storage", |tx| {
            build_storage_graph(tx, &definition)
        });

        match &result {
            Ok(graph) => {
                let cells = graph.cells().count();
                #[cfg(feature = "metrics")]
                METRICS.record_storage_created(cells);
                log::info!(
                    "created storage {} (id {}) with {} partitions and {} cells",
                    graph.storage.code,
                    graph.storage.id,
                    graph.partitions.len(),
                    cells
                );
            }
            Err(err) => report_failure("create storage", &definition.code, err),
        }
        result
    }

    /// Add one partition, with its cells, to an existing storage.
    ///
    /// Fails with `NotFound` if the storage does not exist and with `Conflict`
    /// if any generated address is already used in that storage.
    pub fn add_partition(
        &self,
        storage_id: i64,
        definition: NewPartition,
    ) -> Result<PartitionNode, InventoryError> {
        definition.validate(&self.limits)?;
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::add_partition_span(storage_id, &definition.code).entered();

        let result = run_in_transaction(&self.store, "add_partition", |tx| {
            if tx.find_storage(storage_id)?.is_none() {
                return Err(InventoryError::not_found(EntityKind::Storage, storage_id));
            }
            let mut taken: HashSet<String> = tx
                .list_cells(storage_id)?
                .into_iter()
                .map(|cell| cell.address)
                .collect();
            insert_partition(tx, storage_id, &definition, &mut taken)
        });

        match &result {
            Ok(node) => {
                #[cfg(feature = "metrics")]
                METRICS.record_partition_added(node.cells.len());
                log::info!(
                    "added partition {} (id {}) with {} cells to storage {}",
                    node.partition.code,
                    node.partition.id,
                    node.cells.len(),
                    storage_id
                );
            }
            Err(err) => report_failure("add partition", &definition.code, err),
        }
        result
    }

    /// Create a storage without partitions.
    pub fn create_storage(
        &self,
        code: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Storage, InventoryError> {
        let mut definition = NewStorage::new(code, name);
        definition.description = description.map(str::to_string);
        Ok(self.create_storage_with_partitions(definition)?.storage)
    }

    /// Set or clear the human-readable alias of a cell. Blank aliases clear it.
    pub fn set_cell_alias(&self, cell_id: i64, alias: Option<&str>) -> Result<Cell, InventoryError> {
        let alias = alias.map(str::trim).filter(|a| !a.is_empty());
        let cell = run_in_transaction(&self.store, "set_cell_alias", |tx| {
            tx.update_cell_alias(cell_id, alias)?
                .ok_or_else(|| InventoryError::not_found(EntityKind::Cell, cell_id))
        })?;
        log::info!("cell {} ({}) alias set to {:?}", cell.id, cell.address, cell.alias);
        Ok(cell)
    }

    /// All storages, ascending id.
    pub fn list_storages(&self) -> Result<Vec<Storage>, InventoryError> {
        run_in_transaction(&self.store, "list_storages", |tx| Ok(tx.list_storages()?))
    }

    /// Load a storage with its partitions (creation order) and cells (row-major).
    pub fn load_storage(&self, storage_id: i64) -> Result<StorageGraph, InventoryError> {
        run_in_transaction(&self.store, "load_storage", |tx| {
            let storage = tx
                .find_storage(storage_id)?
                .ok_or_else(|| InventoryError::not_found(EntityKind::Storage, storage_id))?;
            let partitions = tx.list_partitions(storage_id)?;
            let cells = tx.list_cells(storage_id)?;
            Ok(assemble_graph(storage, partitions, cells))
        })
    }
}

/// Insert `definition` through an already-open transaction.
///
/// Useful when the caller owns the transaction scope; nothing is committed here.
pub fn build_storage_graph<T: StoreTransaction>(
    tx: &mut T,
    definition: &NewStorage,
) -> Result<StorageGraph, InventoryError> {
    let storage = tx.insert_storage(
        &definition.code,
        &definition.name,
        definition.description.as_deref(),
    )?;
    log::debug!("inserted storage {} as id {}", storage.code, storage.id);

    let mut taken = HashSet::new();
    let mut partitions = Vec::with_capacity(definition.partitions.len());
    for partition in &definition.partitions {
        partitions.push(insert_partition(tx, storage.id, partition, &mut taken)?);
    }

    Ok(StorageGraph {
        storage,
        partitions,
    })
}

/// Insert one partition and its cells. `taken` holds every address already
/// used in the storage and grows with each inserted cell.
fn insert_partition<T: StoreTransaction>(
    tx: &mut T,
    storage_id: i64,
    definition: &NewPartition,
    taken: &mut HashSet<String>,
) -> Result<PartitionNode, InventoryError> {
    let partition = tx.insert_partition(storage_id, definition)?;
    let mut cells = Vec::with_capacity(partition.cell_count());

    for GridAddress {
        row,
        column,
        address,
    } in address::addresses(partition.rows, partition.cols, partition.cell_type)
    {
        if !taken.insert(address.clone()) {
            return Err(InventoryError::address_conflict(address));
        }
        cells.push(tx.insert_cell(&CellRecord {
            storage_id,
            partition_id: partition.id,
            row,
            col: column - 1,
            address,
        })?);
    }
    log::debug!(
        "inserted partition {} (id {}) with {} cells",
        partition.code,
        partition.id,
        cells.len()
    );

    Ok(PartitionNode { partition, cells })
}

fn assemble_graph(storage: Storage, partitions: Vec<Partition>, cells: Vec<Cell>) -> StorageGraph {
    let mut by_partition: BTreeMap<i64, Vec<Cell>> = BTreeMap::new();
    for cell in cells {
        by_partition.entry(cell.partition_id).or_default().push(cell);
    }
    let partitions = partitions
        .into_iter()
        .map(|partition| {
            let mut cells = by_partition.remove(&partition.id).unwrap_or_default();
            cells.sort_by_key(|c| (c.row, c.col));
            PartitionNode { partition, cells }
        })
        .collect();
    StorageGraph {
        storage,
        partitions,
    }
}

fn report_failure(operation: &str, code: &str, err: &InventoryError) {
    match err {
        InventoryError::Conflict { .. } => {
            #[cfg(feature = "metrics")]
            METRICS.record_conflict();
            log::warn!("{operation} {code} rejected: {err}");
        }
        InventoryError::Validation { .. } | InventoryError::NotFound { .. } => {
            log::warn!("{operation} {code} rejected: {err}");
        }
        InventoryError::Persistence(_) => {
            log::error!("{operation} {code} failed: {err}");
        }
    }
}
