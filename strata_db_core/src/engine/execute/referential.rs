use std::collections::HashSet;

use crate::error::{DbError, Result};
use crate::storage::index::IndexKey;
use crate::storage::{Catalog, Schema, StorageEngine};
use crate::types::value::coerce;
use crate::types::{Row, Value};

/// Every non-NULL foreign key value in `rows` must exist in the referenced
/// column. A self-referencing key may also be satisfied by another row of
/// the same batch.
pub(super) fn check_outgoing(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    schema: &Schema,
    rows: &[&Row],
) -> Result<()> {
    for fk in &schema.foreign_keys {
        let cidx = schema
            .column_index(&fk.column)
            .ok_or_else(|| DbError::NotFound(format!("Column '{}' in table '{}'", fk.column, schema.name)))?;
        for row in rows {
            let value = &row[cidx];
            if value.is_null() {
                continue;
            }
            let parent = catalog.schema(&fk.ref_table).map_err(|_| {
                DbError::ConstraintViolation(format!(
                    "FOREIGN KEY {}.{} references missing table '{}'",
                    schema.name, fk.column, fk.ref_table
                ))
            })?;
            let pidx = parent.column_index(&fk.ref_column).ok_or_else(|| {
                DbError::ConstraintViolation(format!(
                    "FOREIGN KEY {}.{} references missing column {}.{}",
                    schema.name, fk.column, fk.ref_table, fk.ref_column
                ))
            })?;
            let key = coerce(parent.columns[pidx].data_type, value.clone()).map_err(|e| {
                DbError::ConstraintViolation(format!("FOREIGN KEY {}.{}: {e}", schema.name, fk.column))
            })?;

            let mut found = !storage.index_lookup(&fk.ref_table, &fk.ref_column, &key)?.is_empty();
            if !found && fk.ref_table == schema.name {
                found = rows.iter().any(|r| same_key(&r[pidx], &key));
            }
            if !found {
                return Err(DbError::ConstraintViolation(format!(
                    "FOREIGN KEY violation: {}.{} = {value} has no match in {}.{}",
                    schema.name, fk.column, fk.ref_table, fk.ref_column
                )));
            }
        }
    }
    Ok(())
}

/// RESTRICT: a parent value may not disappear while a child row still
/// refers to it. `before` holds the rows leaving `parent` with their
/// locations (deleted rows, or the old image of updated rows); `after`
/// holds the rows taking their place, empty for a delete.
///
/// Declared CASCADE and SET NULL actions are enforced as RESTRICT too.
pub(super) fn check_restrict(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    parent: &Schema,
    before: &[(u64, &Row)],
    after: &[&Row],
    action: &str,
) -> Result<()> {
    let touched: HashSet<u64> = before.iter().map(|(loc, _)| *loc).collect();
    for (child, fk) in catalog.referencing(&parent.name) {
        let Some(pidx) = parent.column_index(&fk.ref_column) else {
            continue;
        };
        let child_schema = catalog.schema(&child)?;
        let cidx = child_schema
            .column_index(&fk.column)
            .ok_or_else(|| DbError::NotFound(format!("Column '{}' in table '{child}'", fk.column)))?;
        let child_type = child_schema.columns[cidx].data_type;

        for (_, row) in before {
            let value = &row[pidx];
            if value.is_null() || after.iter().any(|r| same_key(&r[pidx], value)) {
                continue;
            }
            let survivors = storage.index_lookup(&parent.name, &fk.ref_column, value)?;
            if survivors.iter().any(|loc| !touched.contains(loc)) {
                continue;
            }

            let Ok(key) = coerce(child_type, value.clone()) else {
                continue;
            };
            let mut refs = storage.index_lookup(&child, &fk.column, &key)?;
            let mut self_ref = false;
            if child == parent.name {
                refs.retain(|loc| !touched.contains(loc));
                self_ref = after.iter().any(|r| same_key(&r[cidx], &key));
            }
            if !refs.is_empty() || self_ref {
                return Err(DbError::ConstraintViolation(format!(
                    "Cannot {action} {}.{} = {value}: still referenced by {child}.{}",
                    parent.name, fk.ref_column, fk.column
                )));
            }
        }
    }
    Ok(())
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (IndexKey::from_value(a), IndexKey::from_value(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
