use tracing::{debug, warn};

use super::referential::check_restrict;
use crate::error::Result;
use crate::storage::{Catalog, Schema, StorageEngine, TableDef};
use crate::types::Row;

/// Registers the table in the catalog and allocates its files. A storage
/// failure takes the catalog entry back out.
pub fn create_table(catalog: &mut Catalog, storage: &mut dyn StorageEngine, def: TableDef) -> Result<Schema> {
    let schema = catalog.create_table(def)?.clone();
    if let Err(e) = storage.create_table(&schema) {
        if let Err(undo) = catalog.drop_table(&schema.name) {
            warn!(table = %schema.name, error = %undo, "could not unregister table after failed create");
        }
        return Err(e);
    }
    Ok(schema)
}

/// Unregisters the table, then removes its files. If the files cannot be
/// removed the schema goes back into the catalog.
pub fn drop_table(catalog: &mut Catalog, storage: &mut dyn StorageEngine, table: &str) -> Result<Schema> {
    let schema = catalog.drop_table(table)?;
    if let Err(e) = storage.drop_table(table) {
        warn!(table, error = %e, "table files not removed; keeping catalog entry");
        catalog.restore(schema);
        return Err(e);
    }
    Ok(schema)
}

/// Removes every row, keeping the table. Refused while a child table still
/// references any of them. Returns the number of rows removed.
pub fn truncate_table(catalog: &Catalog, storage: &mut dyn StorageEngine, table: &str) -> Result<usize> {
    let schema = catalog.schema(table)?;
    let rows = storage.scan(table)?;
    let before: Vec<(u64, &Row)> = rows.iter().map(|(loc, row)| (*loc, row)).collect();
    check_restrict(catalog, storage, schema, &before, &[], "truncate")?;
    storage.replace_rows(table, &[])?;
    debug!(table, rows = rows.len(), "truncated table");
    Ok(rows.len())
}
