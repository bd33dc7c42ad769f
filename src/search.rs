//! Substring search over placed items.
//!
//! Matching is a case-insensitive substring test over a fixed set of fields;
//! there is no tokenizing or ranking. Hits come back in ascending item id and
//! carry the owning storage and cell as they are *now*, which may differ from
//! the snapshot stored on the item itself.

use crate::config::InventoryConfig;
use crate::error::{EntityKind, InventoryError};
use crate::model::{Item, Specs};
use crate::store::{InventoryStore, StoreTransaction};
use crate::transaction::run_in_transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Which fields a query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// `name`, `tags`, and the item's own `address` and `storage_code`
    #[default]
    Items,
    /// Everything in `Items` plus `item_type`, `specs`, `vendor` and the
    /// current address of the containing cell
    Components,
}

impl SearchScope {
    /// Item columns searched in this scope, in SQL column names
    pub fn item_columns(&self) -> &'static [&'static str] {
        match self {
            SearchScope::Items => &["name", "tags", "address", "storage_code"],
            SearchScope::Components => &[
                "name",
                "tags",
                "address",
                "storage_code",
                "item_type",
                "vendor",
            ],
        }
    }
}

/// A normalized search: `limit` is already clamped to the configured maximum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub scope: SearchScope,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            scope: SearchScope::Items,
        }
    }

    pub fn components(mut self) -> Self {
        self.scope = SearchScope::Components;
        self
    }

    /// Lowercased query text, or `None` when the query is blank and matches
    /// everything. Surrounding whitespace is part of a non-blank query.
    pub fn needle(&self) -> Option<String> {
        if self.query.trim().is_empty() {
            None
        } else {
            Some(self.query.to_lowercase())
        }
    }
}

/// Searchable text of an item's `specs`: scalar values only, in key order,
/// one per line. Keys, nulls and nested objects or arrays are not searched.
pub fn specs_text(specs: &Specs) -> String {
    let mut entries: Vec<(&String, String)> = specs
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key, text))
        })
        .collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    entries
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inventory-wide aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStatistics {
    pub item_count: u64,
    pub total_quantity: Decimal,
    /// Distinct non-empty `item_type` values
    pub distinct_types: u64,
    pub low_stock_count: u64,
}

impl<'a> FromIterator<&'a Item> for ItemStatistics {
    fn from_iter<I: IntoIterator<Item = &'a Item>>(items: I) -> Self {
        let mut stats = ItemStatistics::default();
        let mut types = HashSet::new();
        for item in items {
            stats.item_count += 1;
            stats.total_quantity += item.quantity;
            if item.is_low_stock() {
                stats.low_stock_count += 1;
            }
            if let Some(kind) = item.item_type.as_deref() {
                types.insert(kind);
            }
        }
        stats.distinct_types = types.len() as u64;
        stats
    }
}

/// One matching item with its live hierarchy context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub item: Item,
    pub storage_name: String,
    pub storage_code: String,
    pub cell_address: String,
    pub cell_alias: Option<String>,
}

/// Case-insensitive substring predicate for one request.
#[derive(Debug, Clone)]
pub struct ItemMatcher {
    needle: String,
    scope: SearchScope,
}

impl ItemMatcher {
    pub fn new(request: &SearchRequest) -> Self {
        Self {
            needle: request.needle().unwrap_or_default(),
            scope: request.scope,
        }
    }

    fn hit(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.needle)
    }

    fn hit_opt(&self, haystack: Option<&str>) -> bool {
        haystack.is_some_and(|h| self.hit(h))
    }

    /// `cell_address` is the current address of the item's cell.
    pub fn matches(&self, item: &Item, cell_address: &str) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let base = self.hit(&item.name)
            || self.hit_opt(item.tags.as_deref())
            || self.hit(&item.address)
            || self.hit(&item.storage_code);
        match self.scope {
            SearchScope::Items => base,
            SearchScope::Components => {
                base || self.hit_opt(item.item_type.as_deref())
                    || self.hit_opt(item.vendor.as_deref())
                    || self.hit(cell_address)
                    || (!item.specs.is_empty() && self.hit(&specs_text(&item.specs)))
            }
        }
    }
}

/// Read-side entry point for item lookups.
pub struct InventoryIndex<S> {
    store: S,
    limits: InventoryConfig,
}

impl<S: InventoryStore> InventoryIndex<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, InventoryConfig::default())
    }

    pub fn with_config(store: S, limits: InventoryConfig) -> Self {
        Self { store, limits }
    }

    /// Search items with the default scope.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, InventoryError> {
        self.search_with(SearchRequest::new(query, limit))
    }

    /// Search with the configured default limit.
    pub fn search_default(&self, query: &str) -> Result<Vec<SearchHit>, InventoryError> {
        self.search(query, self.limits.default_search_limit)
    }

    pub fn search_with(&self, request: SearchRequest) -> Result<Vec<SearchHit>, InventoryError> {
        let request = self.normalize(request)?;
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::search_span(&request.query, request.limit).entered();

        let hits = run_in_transaction(&self.store, "search", |tx| {
            Ok(tx.search_items(&request)?)
        })?;

        #[cfg(feature = "metrics")]
        METRICS.record_search();
        log::debug!(
            "search {:?} ({:?}) returned {} of at most {} hits",
            request.query,
            request.scope,
            hits.len(),
            request.limit
        );
        Ok(hits)
    }

    /// Items whose quantity fell to or below their alert threshold.
    pub fn low_stock(&self, limit: usize) -> Result<Vec<SearchHit>, InventoryError> {
        let limit = self.clamp_limit(limit)?;
        run_in_transaction(&self.store, "low_stock", |tx| {
            Ok(tx.low_stock_items(limit)?)
        })
    }

    /// One item with its live cell and storage.
    pub fn find_item(&self, item_id: i64) -> Result<SearchHit, InventoryError> {
        run_in_transaction(&self.store, "find_item", |tx| {
            tx.find_item(item_id)?
                .ok_or_else(|| InventoryError::not_found(EntityKind::Item, item_id))
        })
    }

    /// Item count, total quantity, distinct types and low-stock count.
    pub fn statistics(&self) -> Result<ItemStatistics, InventoryError> {
        let stats = run_in_transaction(&self.store, "statistics", |tx| {
            Ok(tx.item_statistics()?)
        })?;
        log::debug!("statistics over {} items", stats.item_count);
        Ok(stats)
    }

    fn clamp_limit(&self, limit: usize) -> Result<usize, InventoryError> {
        if limit == 0 {
            return Err(InventoryError::validation("limit", "must be at least 1"));
        }
        Ok(limit.min(self.limits.max_search_limit))
    }

    fn normalize(&self, request: SearchRequest) -> Result<SearchRequest, InventoryError> {
        Ok(SearchRequest {
            limit: self.clamp_limit(request.limit)?,
            query: request.query,
            scope: request.scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn item(name: &str) -> Item {
        Item {
            id: 1,
            location_cell_id: 1,
            storage_code: "TYPE1-01".to_string(),
            address: "B3".to_string(),
            name: name.to_string(),
            item_type: Some("Resistor".to_string()),
            specs: serde_json::json!({"resistance": "10k", "tolerance": "1%"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            quantity: Decimal::new(100, 0),
            unit: Some("pcs".to_string()),
            min_qty_alert: Decimal::new(10, 0),
            tags: Some("smd, 0805".to_string()),
            vendor: Some("Yageo".to_string()),
            purchase_link: None,
            created_at: Utc::now(),
        }
    }

    fn matcher(query: &str, scope: SearchScope) -> ItemMatcher {
        ItemMatcher::new(&SearchRequest {
            query: query.to_string(),
            limit: 10,
            scope,
        })
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(matcher("", SearchScope::Items).matches(&item("anything"), "Z9"));
        assert!(matcher("   ", SearchScope::Components).matches(&item("anything"), "Z9"));
    }

    #[test]
    fn test_item_scope_fields() {
        let it = item("10k Resistor");
        for q in ["10K", "resistor", "0805", "b3", "type1-01"] {
            assert!(matcher(q, SearchScope::Items).matches(&it, "B3"), "{q}");
        }
        // vendor and specs are only searched in the component scope
        assert!(!matcher("yageo", SearchScope::Items).matches(&it, "B3"));
        assert!(!matcher("tolerance", SearchScope::Items).matches(&it, "B3"));
    }

    #[test]
    fn test_component_scope_fields() {
        let it = item("Pull-up");
        for q in ["yageo", "RESISTOR", "10K", "1%"] {
            assert!(matcher(q, SearchScope::Components).matches(&it, "B3"), "{q}");
        }
        // spec keys are not searched, only their values
        assert!(!matcher("tolerance", SearchScope::Components).matches(&it, "B3"));
        // the live cell address is searched even if the snapshot differs
        assert!(matcher("large-a1", SearchScope::Components).matches(&it, "LARGE-A1"));
        assert!(!matcher("large-a1", SearchScope::Items).matches(&it, "LARGE-A1"));
    }

    #[test]
    fn test_query_whitespace_is_kept() {
        let it = item("ab");
        assert!(!matcher("a ", SearchScope::Items).matches(&it, "B3"));
        assert!(matcher("a ", SearchScope::Items).matches(&item("a b"), "B3"));
        assert_eq!(SearchRequest::new("  ", 5).needle(), None);
        assert_eq!(SearchRequest::new(" A1", 5).needle().as_deref(), Some(" a1"));
    }

    #[test]
    fn test_specs_text_renders_scalar_values_in_key_order() {
        let specs = serde_json::json!({
            "voltage": 5,
            "package": "SOT-23",
            "rohs": true,
            "notes": null,
            "pins": [1, 2, 3],
        });
        let text = specs_text(specs.as_object().unwrap());
        assert_eq!(text, "SOT-23\ntrue\n5");
    }

    #[test]
    fn test_statistics_from_items() {
        let mut low = item("LED");
        low.quantity = Decimal::new(5, 0);
        let mut other = item("NE555");
        other.item_type = Some("IC".to_string());
        other.min_qty_alert = Decimal::ZERO;
        let mut untyped = item("Wire");
        untyped.item_type = None;

        let stats: ItemStatistics = [&low, &other, &untyped].into_iter().collect();
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.total_quantity, Decimal::new(205, 0));
        assert_eq!(stats.distinct_types, 2);
        assert_eq!(stats.low_stock_count, 1);
    }

    #[test]
    fn test_index_find_item_and_statistics() {
        use crate::hierarchy::StorageHierarchyManager;
        use crate::model::{NewItem, NewPartition, NewStorage};
        use crate::placement::ItemPlacement;
        use crate::store::MemoryStore;

        let store = MemoryStore::new();
        let graph = StorageHierarchyManager::new(store.clone())
            .create_storage_with_partitions(
                NewStorage::new("TYPE1-01", "Drawer").partition(NewPartition::new("TOP", 1, 2)),
            )
            .unwrap();
        let placed = ItemPlacement::new(store.clone())
            .place_item(graph.partitions[0].cells[1].id, NewItem::new("NE555", Decimal::TEN))
            .unwrap();

        let index = InventoryIndex::new(store);
        let hit = index.find_item(placed.id).unwrap();
        assert_eq!(hit.item, placed);
        assert_eq!(hit.cell_address, "A2");
        assert!(matches!(
            index.find_item(placed.id + 100),
            Err(InventoryError::NotFound {
                entity: EntityKind::Item,
                ..
            })
        ));

        let stats = index.statistics().unwrap();
        assert_eq!(stats.item_count, 1);
        assert_eq!(stats.total_quantity, Decimal::TEN);
        assert_eq!(stats.low_stock_count, 0);
    }

    #[test]
    fn test_scope_columns() {
        assert!(SearchScope::Items.item_columns().contains(&"tags"));
        assert!(!SearchScope::Items.item_columns().contains(&"vendor"));
        assert!(SearchScope::Components.item_columns().contains(&"vendor"));
    }
}
