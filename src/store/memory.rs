//! In-process store.
//!
//! Committed rows live behind one mutex. A transaction stages its inserts in
//! a private set of tables and merges them at commit, re-checking both
//! uniqueness constraints against whatever other transactions committed in
//! the meantime. Ids come from per-table sequences that are never rolled back,
//! so ids are unique and increasing but may have gaps, like `BIGSERIAL`.

use super::{InventoryStore, StoreError, StoreTransaction};
use crate::error::{ConflictKind, EntityKind};
use crate::model::{Cell, CellRecord, Item, ItemRecord, NewPartition, Partition, Storage};
use crate::search::{ItemMatcher, ItemStatistics, SearchHit, SearchRequest};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default, Clone)]
struct Tables {
    storages: BTreeMap<i64, Storage>,
    partitions: BTreeMap<i64, Partition>,
    cells: BTreeMap<i64, Cell>,
    items: BTreeMap<i64, Item>,
    storage_codes: HashMap<String, i64>,
    cell_addresses: HashSet<(i64, String)>,
}

impl Tables {
    fn merge(&mut self, staged: Tables) {
        self.storages.extend(staged.storages);
        self.partitions.extend(staged.partitions);
        self.cells.extend(staged.cells);
        self.items.extend(staged.items);
        self.storage_codes.extend(staged.storage_codes);
        self.cell_addresses.extend(staged.cell_addresses);
    }

    /// First staged row that collides with a committed one.
    fn first_conflict_with(&self, staged: &Tables) -> Option<StoreError> {
        if let Some(code) = staged
            .storage_codes
            .keys()
            .find(|code| self.storage_codes.contains_key(*code))
        {
            return Some(StoreError::UniqueViolation {
                constraint: ConflictKind::StorageCode,
                value: code.clone(),
            });
        }
        // only newly inserted cells claim an address; alias updates do not
        staged
            .cell_addresses
            .iter()
            .find(|key| self.cell_addresses.contains(*key))
            .map(|(_, address)| StoreError::UniqueViolation {
                constraint: ConflictKind::CellAddress,
                value: address.clone(),
            })
    }
}

#[derive(Debug, Default)]
struct Sequences {
    storages: AtomicI64,
    partitions: AtomicI64,
    cells: AtomicI64,
    items: AtomicI64,
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    sequences: Sequences,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

/// Cheaply cloneable handle; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InventoryStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn begin(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            staged: Tables::default(),
            closed: false,
        })
    }
}

/// Uncommitted writes of one transaction. Dropping it discards them.
#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: Tables,
    closed: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }

    fn storage(&self, committed: &Tables, id: i64) -> Option<Storage> {
        self.staged
            .storages
            .get(&id)
            .or_else(|| committed.storages.get(&id))
            .cloned()
    }

    fn cell(&self, committed: &Tables, id: i64) -> Option<Cell> {
        self.staged
            .cells
            .get(&id)
            .or_else(|| committed.cells.get(&id))
            .cloned()
    }

    /// Resolve live hierarchy context for each item, in the order given.
    fn hits<'a>(
        &self,
        committed: &Tables,
        items: impl Iterator<Item = &'a Item>,
        limit: usize,
        mut keep: impl FnMut(&Item, &Cell) -> bool,
    ) -> Vec<SearchHit> {
        let mut hits = Vec::new();
        for item in items {
            if hits.len() >= limit {
                break;
            }
            let Some(cell) = self.cell(committed, item.location_cell_id) else {
                continue;
            };
            let Some(storage) = self.storage(committed, cell.storage_id) else {
                continue;
            };
            if keep(item, &cell) {
                hits.push(SearchHit {
                    item: item.clone(),
                    storage_name: storage.name,
                    storage_code: storage.code,
                    cell_address: cell.address,
                    cell_alias: cell.alias,
                });
            }
        }
        hits
    }

    fn ordered<'a, T>(staged: &'a BTreeMap<i64, T>, committed: &'a BTreeMap<i64, T>) -> Vec<&'a T> {
        let mut merged: BTreeMap<i64, &T> = committed.iter().map(|(id, row)| (*id, row)).collect();
        merged.extend(staged.iter().map(|(id, row)| (*id, row)));
        merged.into_values().collect()
    }
}

impl StoreTransaction for MemoryTransaction {
    fn insert_storage(
        &mut self,
        code: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Storage, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        if committed.storage_codes.contains_key(code) || self.staged.storage_codes.contains_key(code) {
            return Err(StoreError::UniqueViolation {
                constraint: ConflictKind::StorageCode,
                value: code.to_string(),
            });
        }
        drop(committed);

        let storage = Storage {
            id: next_id(&self.shared.sequences.storages),
            code: code.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        self.staged.storage_codes.insert(storage.code.clone(), storage.id);
        self.staged.storages.insert(storage.id, storage.clone());
        Ok(storage)
    }

    fn insert_partition(
        &mut self,
        storage_id: i64,
        partition: &NewPartition,
    ) -> Result<Partition, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        if self.storage(&committed, storage_id).is_none() {
            return Err(StoreError::RowNotFound {
                entity: EntityKind::Storage,
                id: storage_id,
            });
        }
        drop(committed);

        let row = Partition {
            id: next_id(&self.shared.sequences.partitions),
            storage_id,
            code: partition.code.clone(),
            rows: partition.rows,
            cols: partition.cols,
            cell_type: partition.cell_type,
        };
        self.staged.partitions.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_cell(&mut self, cell: &CellRecord) -> Result<Cell, StoreError> {
        self.ensure_open()?;
        let key = (cell.storage_id, cell.address.clone());
        let committed = self.shared.lock()?;
        if committed.cell_addresses.contains(&key) || self.staged.cell_addresses.contains(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: ConflictKind::CellAddress,
                value: cell.address.clone(),
            });
        }
        if !self.staged.partitions.contains_key(&cell.partition_id)
            && !committed.partitions.contains_key(&cell.partition_id)
        {
            return Err(StoreError::RowNotFound {
                entity: EntityKind::Partition,
                id: cell.partition_id,
            });
        }
        drop(committed);

        let row = Cell {
            id: next_id(&self.shared.sequences.cells),
            storage_id: cell.storage_id,
            partition_id: cell.partition_id,
            row: cell.row,
            col: cell.col,
            address: cell.address.clone(),
            alias: None,
        };
        self.staged.cell_addresses.insert(key);
        self.staged.cells.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_item(&mut self, record: &ItemRecord) -> Result<Item, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        if self.cell(&committed, record.location_cell_id).is_none() {
            return Err(StoreError::RowNotFound {
                entity: EntityKind::Cell,
                id: record.location_cell_id,
            });
        }
        drop(committed);

        let attrs = &record.item;
        let item = Item {
            id: next_id(&self.shared.sequences.items),
            location_cell_id: record.location_cell_id,
            storage_code: record.storage_code.clone(),
            address: record.address.clone(),
            name: attrs.name.clone(),
            item_type: attrs.item_type.clone(),
            specs: attrs.specs.clone(),
            quantity: attrs.quantity,
            unit: attrs.unit.clone(),
            min_qty_alert: attrs.min_qty_alert,
            tags: attrs.tags.clone(),
            vendor: attrs.vendor.clone(),
            purchase_link: attrs.purchase_link.clone(),
            created_at: Utc::now(),
        };
        self.staged.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn update_cell_alias(
        &mut self,
        cell_id: i64,
        alias: Option<&str>,
    ) -> Result<Option<Cell>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        let Some(mut cell) = self.cell(&committed, cell_id) else {
            return Ok(None);
        };
        drop(committed);

        cell.alias = alias.map(str::to_string);
        self.staged.cells.insert(cell.id, cell.clone());
        Ok(Some(cell))
    }

    fn find_storage(&mut self, id: i64) -> Result<Option<Storage>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(self.storage(&committed, id))
    }

    fn find_cell(&mut self, id: i64) -> Result<Option<Cell>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(self.cell(&committed, id))
    }

    fn list_storages(&mut self) -> Result<Vec<Storage>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(Self::ordered(&self.staged.storages, &committed.storages)
            .into_iter()
            .cloned()
            .collect())
    }

    fn list_partitions(&mut self, storage_id: i64) -> Result<Vec<Partition>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(Self::ordered(&self.staged.partitions, &committed.partitions)
            .into_iter()
            .filter(|p| p.storage_id == storage_id)
            .cloned()
            .collect())
    }

    fn list_cells(&mut self, storage_id: i64) -> Result<Vec<Cell>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(Self::ordered(&self.staged.cells, &committed.cells)
            .into_iter()
            .filter(|c| c.storage_id == storage_id)
            .cloned()
            .collect())
    }

    fn search_items(&mut self, request: &SearchRequest) -> Result<Vec<SearchHit>, StoreError> {
        self.ensure_open()?;
        let matcher = ItemMatcher::new(request);
        let committed = self.shared.lock()?;
        let items = Self::ordered(&self.staged.items, &committed.items);
        Ok(self.hits(&committed, items.into_iter(), request.limit, |item, cell| {
            matcher.matches(item, &cell.address)
        }))
    }

    fn low_stock_items(&mut self, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        let items = Self::ordered(&self.staged.items, &committed.items);
        Ok(self.hits(&committed, items.into_iter(), limit, |item, _| {
            item.is_low_stock()
        }))
    }

    fn find_item(&mut self, id: i64) -> Result<Option<SearchHit>, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        let item = self
            .staged
            .items
            .get(&id)
            .or_else(|| committed.items.get(&id));
        Ok(self
            .hits(&committed, item.into_iter(), 1, |_, _| true)
            .pop())
    }

    fn item_statistics(&mut self) -> Result<ItemStatistics, StoreError> {
        self.ensure_open()?;
        let committed = self.shared.lock()?;
        Ok(Self::ordered(&self.staged.items, &committed.items)
            .into_iter()
            .collect())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.closed = true;
        let staged = std::mem::take(&mut self.staged);
        let mut committed = self.shared.lock()?;
        if let Some(conflict) = committed.first_conflict_with(&staged) {
            return Err(conflict);
        }
        committed.merge(staged);
        Ok(())
    }

    fn rollback(mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.closed = true;
        self.staged = Tables::default();
        Ok(())
    }
}
