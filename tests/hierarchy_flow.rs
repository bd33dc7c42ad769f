//! End-to-end flows over the in-memory store: hierarchy creation, placement,
//! search and concurrent writers.

use fake::faker::lorem::en::Word;
use fake::Fake;
use rust_decimal::Decimal;
use trayhouse::{
    ConflictKind, InventoryError, InventoryIndex, ItemPlacement, MemoryStore, NewItem,
    NewPartition, NewStorage, SearchRequest, StorageHierarchyManager,
};

fn drawer(code: &str) -> NewStorage {
    NewStorage::new(code, "Drawer")
        .partition(NewPartition::new("TOP", 2, 3))
        .partition(NewPartition::new("BIG", 1, 2).large())
}

/// Coroutine stacks are sized in words; the default is too small for the
/// logging and metrics paths.
fn coroutine_stack() {
    may::config().set_stack_size(0x10000);
}

#[test]
fn test_create_place_and_search() {
    let store = MemoryStore::new();
    let manager = StorageHierarchyManager::new(store.clone());
    let graph = manager
        .create_storage_with_partitions(drawer("TYPE1-01"))
        .expect("storage should be created");

    let addresses: Vec<&str> = graph.cells().map(|c| c.address.as_str()).collect();
    assert_eq!(
        addresses,
        ["A1", "A2", "A3", "B1", "B2", "B3", "LARGE-A1", "LARGE-A2"]
    );

    let b3 = graph.cell_by_address("B3").expect("B3 exists").id;
    let placement = ItemPlacement::new(store.clone());
    let item = placement
        .place_item(b3, NewItem::new("10k resistor", Decimal::new(200, 0)))
        .expect("placement succeeds");
    assert_eq!(item.storage_code, "TYPE1-01");
    assert_eq!(item.address, "B3");

    let index = InventoryIndex::new(store);
    let hits = index.search("b3", 10).expect("search succeeds");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.id, item.id);
    assert_eq!(hits[0].storage_name, "Drawer");
    assert_eq!(hits[0].cell_address, "B3");
}

#[test]
fn test_failed_creation_leaves_no_trace() {
    let store = MemoryStore::new();
    let manager = StorageHierarchyManager::new(store.clone());
    let overlapping = NewStorage::new("DUP-ADDR", "Overlap")
        .partition(NewPartition::new("LEFT", 1, 1))
        .partition(NewPartition::new("RIGHT", 1, 1));

    let err = manager
        .create_storage_with_partitions(overlapping)
        .unwrap_err();
    assert!(matches!(
        err,
        InventoryError::Conflict {
            kind: ConflictKind::CellAddress,
            ref value,
        } if value == "A1"
    ));
    assert!(manager.list_storages().unwrap().is_empty());

    // the code is still free
    manager
        .create_storage_with_partitions(drawer("DUP-ADDR"))
        .expect("code can be reused after rollback");
}

#[test]
fn test_search_is_case_insensitive_ordered_and_limited() {
    let store = MemoryStore::new();
    let graph = StorageHierarchyManager::new(store.clone())
        .create_storage_with_partitions(drawer("CAB-A1"))
        .unwrap();
    let placement = ItemPlacement::new(store.clone());
    let cells: Vec<i64> = graph.cells().map(|c| c.id).collect();

    let mut placed = Vec::new();
    for (n, cell) in cells.iter().enumerate() {
        let word: String = Word().fake();
        let item = placement
            .place_item(*cell, NewItem::new(format!("{word}-{n}"), Decimal::ONE))
            .unwrap();
        placed.push(item.id);
    }

    // every item's storage code contains "A1"
    let index = InventoryIndex::new(store);
    let hits = index.search("a1", 3).unwrap();
    let ids: Vec<i64> = hits.iter().map(|h| h.item.id).collect();
    assert_eq!(ids, placed[..3]);

    let all = index.search("A1", 100).unwrap();
    assert_eq!(all.len(), placed.len());
    assert!(all.windows(2).all(|w| w[0].item.id < w[1].item.id));

    assert!(index.search("no such thing", 10).unwrap().is_empty());
    assert!(matches!(
        index.search("a1", 0),
        Err(InventoryError::Validation { field: "limit", .. })
    ));
}

#[test]
fn test_component_search_and_low_stock() {
    let store = MemoryStore::new();
    let graph = StorageHierarchyManager::new(store.clone())
        .create_storage_with_partitions(drawer("PARTS"))
        .unwrap();
    let placement = ItemPlacement::new(store.clone());
    let cell = graph.cell_by_address("A2").unwrap().id;

    let mut specs = trayhouse::Specs::new();
    specs.insert("package".into(), serde_json::json!("SOT-23"));
    let low = placement
        .place_item(
            cell,
            NewItem {
                vendor: Some("Nexperia".into()),
                specs,
                min_qty_alert: Decimal::new(10, 0),
                ..NewItem::new("BC847", Decimal::new(4, 0))
            },
        )
        .unwrap();
    placement
        .place_item(cell, NewItem::new("BC857", Decimal::new(400, 0)))
        .unwrap();

    let index = InventoryIndex::new(store);
    assert!(index.search("sot-23", 10).unwrap().is_empty());
    let hits = index
        .search_with(SearchRequest::new("sot-23", 10).components())
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].item.id, low.id);

    let alerts = index.low_stock(10).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].item.name, "BC847");
}

#[test]
fn test_concurrent_creation_of_distinct_storages() {
    coroutine_stack();
    let store = MemoryStore::new();
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = store.clone();
            may::go!(move || {
                StorageHierarchyManager::new(store)
                    .create_storage_with_partitions(drawer(&format!("RACK-{n}")))
                    .map(|graph| graph.cells().count())
            })
        })
        .collect();

    for handle in handles {
        let cells = handle.join().expect("coroutine panicked").expect("creation succeeds");
        assert_eq!(cells, 8);
    }
    let manager = StorageHierarchyManager::new(store);
    let storages = manager.list_storages().unwrap();
    assert_eq!(storages.len(), 8);
    for storage in storages {
        let graph = manager.load_storage(storage.id).unwrap();
        assert_eq!(graph.cells().count(), 8);
    }
}

#[test]
fn test_concurrent_creation_with_same_code() {
    coroutine_stack();
    let store = MemoryStore::new();
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            may::go!(move || {
                StorageHierarchyManager::new(store).create_storage_with_partitions(drawer("SHARED"))
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("coroutine panicked"))
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(
            err,
            InventoryError::Conflict {
                kind: ConflictKind::StorageCode,
                ..
            }
        ));
    }
    assert_eq!(
        StorageHierarchyManager::new(store).list_storages().unwrap().len(),
        1
    );
}

#[test]
fn test_concurrent_overlapping_partitions() {
    coroutine_stack();
    let store = MemoryStore::new();
    let storage = StorageHierarchyManager::new(store.clone())
        .create_storage("SHELF-01", "Shelf", None)
        .unwrap();
    let storage_id = storage.id;

    // both shapes generate A1 and A2
    let handles: Vec<_> = [NewPartition::new("LEFT", 2, 2), NewPartition::new("RIGHT", 1, 3)]
        .into_iter()
        .map(|partition| {
            let store = store.clone();
            may::go!(move || {
                StorageHierarchyManager::new(store).add_partition(storage_id, partition)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("coroutine panicked"))
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

    let mut winner = None;
    for result in results {
        match result {
            Ok(node) => winner = Some(node),
            Err(err) => assert!(matches!(
                err,
                InventoryError::Conflict {
                    kind: ConflictKind::CellAddress,
                    ..
                }
            )),
        }
    }
    let winner = winner.expect("one partition was added");
    let graph = StorageHierarchyManager::new(store).load_storage(storage_id).unwrap();
    assert_eq!(graph.partitions.len(), 1);
    assert_eq!(graph.partitions[0], winner);
    assert_eq!(graph.cells().count(), winner.cells.len());
}

#[test]
fn test_cell_alias_shows_in_search() {
    let store = MemoryStore::new();
    let manager = StorageHierarchyManager::new(store.clone());
    let graph = manager
        .create_storage_with_partitions(drawer("TYPE1-07"))
        .unwrap();
    let a1 = graph.cell_by_address("A1").unwrap().id;
    manager.set_cell_alias(a1, Some("front left")).unwrap();

    let item = ItemPlacement::new(store.clone())
        .place_item(a1, NewItem::new("LM358", Decimal::new(4, 0)))
        .unwrap();
    let hit = InventoryIndex::new(store).find_item(item.id).unwrap();
    assert_eq!(hit.cell_address, "A1");
    assert_eq!(hit.cell_alias.as_deref(), Some("front left"));
}
