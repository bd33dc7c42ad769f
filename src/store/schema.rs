//! PostgreSQL schema for the inventory tables.
//!
//! Every statement is idempotent (`IF NOT EXISTS`), so [`apply`] can run on
//! each start-up.

use super::{InventoryStore, PgStore, StoreError, StoreTransaction};
use sea_query::{
    ColumnDef, Expr, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement,
    PostgresQueryBuilder, Table, TableCreateStatement,
};

/// Unique index backing the storage code conflict.
pub const STORAGE_CODE_INDEX: &str = "uq_storages_code";
/// Unique index backing the cell address conflict.
pub const CELL_ADDRESS_INDEX: &str = "uq_cells_storage_address";

fn id_column() -> ColumnDef {
    ColumnDef::new("id")
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn created_at_column() -> ColumnDef {
    ColumnDef::new("created_at")
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

pub fn storages_table() -> TableCreateStatement {
    Table::create()
        .table("storages")
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new("code").text().not_null())
        .col(ColumnDef::new("name").text().not_null())
        .col(ColumnDef::new("description").text().null())
        .col(created_at_column())
        .to_owned()
}

pub fn partitions_table() -> TableCreateStatement {
    Table::create()
        .table("partitions")
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new("storage_id").big_integer().not_null())
        .col(ColumnDef::new("code").text().not_null())
        .col(ColumnDef::new("rows").integer().not_null())
        .col(ColumnDef::new("cols").integer().not_null())
        .col(
            ColumnDef::new("cell_type")
                .text()
                .not_null()
                .default("normal"),
        )
        .foreign_key(
            ForeignKey::create()
                .name("fk_partitions_storage")
                .from("partitions", "storage_id")
                .to("storages", "id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

pub fn cells_table() -> TableCreateStatement {
    Table::create()
        .table("cells")
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new("storage_id").big_integer().not_null())
        .col(ColumnDef::new("partition_id").big_integer().not_null())
        .col(ColumnDef::new("row_index").integer().not_null())
        .col(ColumnDef::new("col_index").integer().not_null())
        .col(ColumnDef::new("address").text().not_null())
        .col(ColumnDef::new("alias").text().null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_cells_storage")
                .from("cells", "storage_id")
                .to("storages", "id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name("fk_cells_partition")
                .from("cells", "partition_id")
                .to("partitions", "id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

pub fn items_table() -> TableCreateStatement {
    Table::create()
        .table("items")
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new("location_cell_id").big_integer().not_null())
        .col(ColumnDef::new("storage_code").text().not_null())
        .col(ColumnDef::new("address").text().not_null())
        .col(ColumnDef::new("name").text().not_null())
        .col(ColumnDef::new("item_type").text().null())
        .col(
            ColumnDef::new("specs")
                .json_binary()
                .not_null()
                .default(Expr::cust("'{}'::jsonb")),
        )
        .col(ColumnDef::new("quantity").decimal().not_null())
        .col(ColumnDef::new("unit").text().null())
        .col(ColumnDef::new("min_qty_alert").decimal().not_null().default(0))
        .col(ColumnDef::new("tags").text().null())
        .col(ColumnDef::new("vendor").text().null())
        .col(ColumnDef::new("purchase_link").text().null())
        .col(created_at_column())
        .foreign_key(
            ForeignKey::create()
                .name("fk_items_cell")
                .from("items", "location_cell_id")
                .to("cells", "id")
                .on_delete(ForeignKeyAction::Restrict),
        )
        .to_owned()
}

pub fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name(STORAGE_CODE_INDEX)
            .table("storages")
            .col(Expr::col("code"))
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name(CELL_ADDRESS_INDEX)
            .table("cells")
            .col(Expr::col("storage_id"))
            .col(Expr::col("address"))
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_cells_partition")
            .table("cells")
            .col(Expr::col("partition_id"))
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_items_location_cell")
            .table("items")
            .col(Expr::col("location_cell_id"))
            .if_not_exists()
            .to_owned(),
    ]
}

/// All DDL in dependency order.
pub fn statements() -> Vec<String> {
    let tables = [
        storages_table(),
        partitions_table(),
        cells_table(),
        items_table(),
    ];
    tables
        .iter()
        .map(|t| t.build(PostgresQueryBuilder))
        .chain(indexes().iter().map(|i| i.build(PostgresQueryBuilder)))
        .collect()
}

/// Create any missing tables and indexes in one transaction.
pub fn apply(store: &PgStore) -> Result<(), StoreError> {
    let tx = store.begin()?;
    for sql in statements() {
        log::debug!("applying: {sql}");
        tx.execute(&sql)?;
    }
    tx.commit()?;
    log::info!("inventory schema is up to date");
    Ok(())
}
