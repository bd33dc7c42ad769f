//! Placing items into cells.
//!
//! The item keeps a copy of its storage code and cell address as they were at
//! placement time. Nothing refreshes that copy; the search index resolves the
//! live hierarchy separately.

use crate::error::{EntityKind, InventoryError};
use crate::model::{Item, ItemRecord, NewItem};
use crate::store::{InventoryStore, StoreTransaction};
use crate::transaction::run_in_transaction;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

pub struct ItemPlacement<S> {
    store: S,
}

impl<S: InventoryStore> ItemPlacement<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate `attributes`, resolve the cell and persist the item.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty name or a negative quantity/threshold
    /// - `NotFound` if `cell_id` does not resolve; no item is written
    pub fn place_item(&self, cell_id: i64, attributes: NewItem) -> Result<Item, InventoryError> {
        attributes.validate()?;
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::place_item_span(cell_id).entered();

        let result = run_in_transaction(&self.store, "place_item", |tx| {
            let cell = tx
                .find_cell(cell_id)?
                .ok_or_else(|| InventoryError::not_found(EntityKind::Cell, cell_id))?;
            let storage = tx
                .find_storage(cell.storage_id)?
                .ok_or_else(|| InventoryError::not_found(EntityKind::Storage, cell.storage_id))?;

            Ok(tx.insert_item(&ItemRecord {
                location_cell_id: cell.id,
                storage_code: storage.code,
                address: cell.address,
                item: attributes,
            })?)
        });

        match &result {
            Ok(item) => {
                #[cfg(feature = "metrics")]
                METRICS.record_item_placed();
                log::info!(
                    "placed item {} (id {}) in {}/{}",
                    item.name,
                    item.id,
                    item.storage_code,
                    item.address
                );
            }
            Err(err) => log::warn!("placing item into cell {cell_id} failed: {err}"),
        }
        result
    }
}
