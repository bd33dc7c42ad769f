//! Entities of the storage hierarchy and the typed inputs that create them.
//!
//! Rows reference their parent by surrogate id only. Ordered ownership lives
//! in the graph types ([`StorageGraph`], [`PartitionNode`]), which the
//! hierarchy manager assembles from the rows it inserted or loaded.

use crate::address::CellType;
use crate::config::InventoryConfig;
use crate::error::InventoryError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Free-form key/value specification attached to an item (`{"resistance": "10k"}`).
pub type Specs = serde_json::Map<String, serde_json::Value>;

/// Top-level named container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rectangular grid subdivision of a storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i64,
    pub storage_id: i64,
    pub code: String,
    pub rows: u32,
    pub cols: u32,
    pub cell_type: CellType,
}

impl Partition {
    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// One grid position (tray).
///
/// `row` and `col` are both 0-based; the address renders the column 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: i64,
    pub storage_id: i64,
    pub partition_id: i64,
    pub row: u32,
    pub col: u32,
    pub address: String,
    pub alias: Option<String>,
}

/// A stored good placed in exactly one cell.
///
/// `storage_code` and `address` are copied from the hierarchy when the item is
/// placed and are never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub location_cell_id: i64,
    pub storage_code: String,
    pub address: String,
    pub name: String,
    pub item_type: Option<String>,
    pub specs: Specs,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub min_qty_alert: Decimal,
    pub tags: Option<String>,
    pub vendor: Option<String>,
    pub purchase_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// True when an alert threshold is set and stock has fallen to or below it.
    pub fn is_low_stock(&self) -> bool {
        self.min_qty_alert > Decimal::ZERO && self.quantity <= self.min_qty_alert
    }
}

/// A partition with its cells in row-major order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionNode {
    pub partition: Partition,
    pub cells: Vec<Cell>,
}

/// A storage with its partitions in creation order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageGraph {
    pub storage: Storage,
    pub partitions: Vec<PartitionNode>,
}

impl StorageGraph {
    /// Every cell of the storage, partition by partition, row-major within each.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.partitions.iter().flat_map(|p| p.cells.iter())
    }

    pub fn cell_by_address(&self, address: &str) -> Option<&Cell> {
        self.cells().find(|c| c.address == address)
    }
}

/// Input for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartition {
    pub code: String,
    pub rows: u32,
    pub cols: u32,
    #[serde(default)]
    pub cell_type: CellType,
}

impl NewPartition {
    pub fn new(code: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            code: code.into(),
            rows,
            cols,
            cell_type: CellType::Normal,
        }
    }

    pub fn large(mut self) -> Self {
        self.cell_type = CellType::Large;
        self
    }

    pub fn validate(&self, limits: &InventoryConfig) -> Result<(), InventoryError> {
        require_text("partition.code", &self.code)?;
        if self.rows < 1 {
            return Err(InventoryError::validation("rows", "must be at least 1"));
        }
        if self.cols < 1 {
            return Err(InventoryError::validation("cols", "must be at least 1"));
        }
        let cells = u64::from(self.rows) * u64::from(self.cols);
        if cells > limits.max_cells_per_partition {
            return Err(InventoryError::validation(
                "rows",
                format!(
                    "{}x{} partition has {} cells, limit is {}",
                    self.rows, self.cols, cells, limits.max_cells_per_partition
                ),
            ));
        }
        Ok(())
    }
}

/// Input for a storage and its initial partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStorage {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// May be empty; partitions can be added later with `add_partition`.
    #[serde(default)]
    pub partitions: Vec<NewPartition>,
}

impl NewStorage {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: None,
            partitions: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn partition(mut self, partition: NewPartition) -> Self {
        self.partitions.push(partition);
        self
    }

    pub fn validate(&self, limits: &InventoryConfig) -> Result<(), InventoryError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)?;
        self.partitions
            .iter()
            .try_for_each(|partition| partition.validate(limits))
    }
}

/// Item attributes supplied by the caller; hierarchy fields are filled in on placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub specs: Specs,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub min_qty_alert: Decimal,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub purchase_link: Option<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), InventoryError> {
        require_text("name", &self.name)?;
        if self.quantity < Decimal::ZERO {
            return Err(InventoryError::validation(
                "quantity",
                format!("must not be negative, got {}", self.quantity),
            ));
        }
        if self.min_qty_alert < Decimal::ZERO {
            return Err(InventoryError::validation(
                "min_qty_alert",
                format!("must not be negative, got {}", self.min_qty_alert),
            ));
        }
        Ok(())
    }
}

/// Row handed to [`StoreTransaction::insert_item`](crate::store::StoreTransaction::insert_item):
/// caller attributes plus the snapshot taken from the hierarchy.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub location_cell_id: i64,
    pub storage_code: String,
    pub address: String,
    pub item: NewItem,
}

/// Row handed to [`StoreTransaction::insert_cell`](crate::store::StoreTransaction::insert_cell).
#[derive(Debug, Clone)]
pub struct CellRecord {
    pub storage_id: i64,
    pub partition_id: i64,
    pub row: u32,
    pub col: u32,
    pub address: String,
}

fn require_text(field: &'static str, value: &str) -> Result<(), InventoryError> {
    if value.trim().is_empty() {
        return Err(InventoryError::validation(field, "must not be empty"));
    }
    Ok(())
}
