//! # Trayhouse
//!
//! Addressing and hierarchy engine for a small-parts inventory.
//!
//! A storage is split into partitions, each partition is a grid of cells with
//! spreadsheet-style addresses (`A1`, `B3`, `LARGE-AA12`), and items are
//! placed into cells. The crate generates the addresses, creates a storage
//! and all of its cells atomically, places items, and searches them.
//!
//! Persistence goes through [`store::InventoryStore`]. [`MemoryStore`] keeps
//! everything in process; [`PgStore`] talks to PostgreSQL via `may_postgres`
//! and is safe to use from `may` coroutines.
//!
//! ```no_run
//! use trayhouse::{MemoryStore, NewPartition, NewStorage, StorageHierarchyManager};
//!
//! let manager = StorageHierarchyManager::new(MemoryStore::new());
//! let graph = manager
//!     .create_storage_with_partitions(
//!         NewStorage::new("TYPE1-01", "Resistor drawer").partition(NewPartition::new("TOP", 4, 6)),
//!     )
//!     .unwrap();
//! assert_eq!(graph.cells().count(), 24);
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod metrics;
pub mod model;
pub mod placement;
pub mod search;
pub mod store;
pub mod transaction;

pub use address::{generate, parse_address, CellType, GridAddress, ParsedAddress};
pub use config::{DatabaseConfig, InventoryConfig, TrayhouseConfig};
pub use error::{ConflictKind, EntityKind, InventoryError};
pub use hierarchy::StorageHierarchyManager;
pub use model::{
    Cell, Item, NewItem, NewPartition, NewStorage, Partition, PartitionNode, Specs, Storage,
    StorageGraph,
};
pub use placement::ItemPlacement;
pub use search::{InventoryIndex, SearchHit, SearchRequest, SearchScope};
pub use store::{InventoryStore, MemoryStore, PgStore, StoreError, StoreTransaction};
pub use transaction::{run_in_transaction, IsolationLevel};
