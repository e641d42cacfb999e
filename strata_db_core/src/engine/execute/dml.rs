use std::collections::HashSet;

use tracing::debug;

use super::constraints::{check_unique, coerce_for, prepare_named_row, prepare_row};
use super::referential::{check_outgoing, check_restrict};
use super::select::matching_rows;
use crate::engine::format::ResultSet;
use crate::engine::predicate::RowFilter;
use crate::error::{DbError, Result};
use crate::storage::{Catalog, Schema, StorageEngine};
use crate::types::{Row, Value};

/// Outcome of an update or delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResult {
    pub affected: usize,
    /// New images for an update, removed rows for a delete; only filled
    /// when the caller asked for them.
    pub returning: Option<ResultSet>,
}

/// Validates positional `values` for `table` and returns the row exactly as
/// it will be stored. Nothing is written.
pub fn prepare_insert(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    table: &str,
    values: Vec<Value>,
) -> Result<Row> {
    let schema = catalog.schema(table)?;
    let row = prepare_row(schema, values)?;
    validate_new_row(catalog, storage, schema, &row)?;
    Ok(row)
}

/// Like [`prepare_insert`], with omitted columns taking their defaults.
pub fn prepare_insert_named(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    table: &str,
    assignments: &[(&str, Value)],
) -> Result<Row> {
    let schema = catalog.schema(table)?;
    let row = prepare_named_row(schema, assignments)?;
    validate_new_row(catalog, storage, schema, &row)?;
    Ok(row)
}

fn validate_new_row(catalog: &Catalog, storage: &mut dyn StorageEngine, schema: &Schema, row: &Row) -> Result<()> {
    check_unique(schema, storage, &[row], &HashSet::new())?;
    check_outgoing(catalog, storage, schema, &[row])
}

pub fn apply_insert(storage: &mut dyn StorageEngine, table: &str, row: &Row) -> Result<u64> {
    let location = storage.append_row(table, row)?;
    debug!(table, location, "inserted row");
    Ok(location)
}

/// Rows an update will rewrite: `(location, old, new)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<(u64, Row, Row)>,
}

/// Works out and validates an update without writing anything.
pub fn plan_update(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    table: &str,
    assignments: &[(&str, Value)],
    filter: Option<&dyn RowFilter>,
) -> Result<UpdatePlan> {
    let schema = catalog.schema(table)?;
    if assignments.is_empty() {
        return Err(DbError::InvalidArgument("UPDATE needs at least one assignment".to_string()));
    }

    let mut set: Vec<(usize, Value)> = Vec::with_capacity(assignments.len());
    for (name, value) in assignments {
        let idx = schema
            .column_index(name)
            .ok_or_else(|| DbError::NotFound(format!("Column '{name}' in table '{table}'")))?;
        if set.iter().any(|(i, _)| *i == idx) {
            return Err(DbError::InvalidArgument(format!("Column '{name}' assigned twice")));
        }
        set.push((idx, coerce_for(&schema.columns[idx], value.clone())?));
    }

    let rows: Vec<(u64, Row, Row)> = matching_rows(schema, storage, filter)?
        .into_iter()
        .map(|(location, old)| {
            let mut new = old.clone();
            for (idx, value) in &set {
                new[*idx] = value.clone();
            }
            (location, old, new)
        })
        .collect();

    let assigned = |name: &str| set.iter().any(|(i, _)| schema.columns[*i].name == name);
    let replacing: HashSet<u64> = rows.iter().map(|(loc, _, _)| *loc).collect();
    let new_rows: Vec<&Row> = rows.iter().map(|(_, _, new)| new).collect();
    check_unique(schema, storage, &new_rows, &replacing)?;
    if schema.foreign_keys.iter().any(|fk| assigned(&fk.column)) {
        check_outgoing(catalog, storage, schema, &new_rows)?;
    }
    if catalog.referencing(table).iter().any(|(_, fk)| assigned(&fk.ref_column)) {
        let before: Vec<(u64, &Row)> = rows.iter().map(|(loc, old, _)| (*loc, old)).collect();
        check_restrict(catalog, storage, schema, &before, &new_rows, "update")?;
    }

    Ok(UpdatePlan {
        table: table.to_string(),
        columns: schema.column_names(),
        rows,
    })
}

/// Rewrites each planned row in place; locations do not move.
pub fn apply_update(storage: &mut dyn StorageEngine, plan: &UpdatePlan) -> Result<usize> {
    for (location, old, new) in &plan.rows {
        if old != new {
            storage.overwrite_row(&plan.table, *location, new)?;
        }
    }
    debug!(table = %plan.table, rows = plan.rows.len(), "updated rows");
    Ok(plan.rows.len())
}

/// Rows a delete will remove, with their locations.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<(u64, Row)>,
}

pub fn plan_delete(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    table: &str,
    filter: Option<&dyn RowFilter>,
) -> Result<DeletePlan> {
    let schema = catalog.schema(table)?;
    let rows = matching_rows(schema, storage, filter)?;
    let before: Vec<(u64, &Row)> = rows.iter().map(|(loc, row)| (*loc, row)).collect();
    check_restrict(catalog, storage, schema, &before, &[], "delete")?;
    Ok(DeletePlan {
        table: table.to_string(),
        columns: schema.column_names(),
        rows,
    })
}

/// Compacts the heap without the planned rows, then rebuilds every index
/// of the table since surviving rows change location.
pub fn apply_delete(storage: &mut dyn StorageEngine, plan: &DeletePlan) -> Result<usize> {
    if plan.rows.is_empty() {
        return Ok(0);
    }
    remove_locations(storage, &plan.table, &plan.rows.iter().map(|(loc, _)| *loc).collect())?;
    debug!(table = %plan.table, rows = plan.rows.len(), "deleted rows");
    Ok(plan.rows.len())
}

pub(crate) fn remove_locations(storage: &mut dyn StorageEngine, table: &str, doomed: &HashSet<u64>) -> Result<()> {
    let kept: Vec<Row> = storage
        .scan(table)?
        .into_iter()
        .filter(|(loc, _)| !doomed.contains(loc))
        .map(|(_, row)| row)
        .collect();
    storage.replace_rows(table, &kept)
}

impl UpdatePlan {
    pub fn result(&self, returning: bool) -> MutationResult {
        MutationResult {
            affected: self.rows.len(),
            returning: returning.then(|| {
                ResultSet::new(
                    self.columns.clone(),
                    self.rows.iter().map(|(_, _, new)| new.clone()).collect(),
                )
            }),
        }
    }
}

impl DeletePlan {
    pub fn result(&self, returning: bool) -> MutationResult {
        MutationResult {
            affected: self.rows.len(),
            returning: returning.then(|| {
                ResultSet::new(self.columns.clone(), self.rows.iter().map(|(_, r)| r.clone()).collect())
            }),
        }
    }
}
