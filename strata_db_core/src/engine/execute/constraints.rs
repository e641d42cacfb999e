use std::collections::{HashMap, HashSet};

use crate::error::{DbError, Result};
use crate::storage::index::IndexKey;
use crate::storage::{Column, Schema, StorageEngine};
use crate::types::value::coerce;
use crate::types::{Row, Value};

/// Turns positional input into a storable row: right cardinality, every
/// value coerced to its column type, NOT NULL honoured.
pub(super) fn prepare_row(schema: &Schema, values: Vec<Value>) -> Result<Row> {
    if values.len() != schema.column_count() {
        return Err(DbError::ConstraintViolation(format!(
            "Table '{}' expects {} values but got {}",
            schema.name,
            schema.column_count(),
            values.len()
        )));
    }
    schema
        .columns
        .iter()
        .zip(values)
        .map(|(col, value)| coerce_for(col, value))
        .collect()
}

/// Builds a full row from `(column, value)` pairs; columns left out take
/// their declared default, or NULL.
pub(super) fn prepare_named_row(schema: &Schema, assignments: &[(&str, Value)]) -> Result<Row> {
    let mut given: HashMap<&str, &Value> = HashMap::new();
    for (name, value) in assignments {
        if schema.column(name).is_none() {
            return Err(DbError::NotFound(format!("Column '{name}' in table '{}'", schema.name)));
        }
        if given.insert(*name, value).is_some() {
            return Err(DbError::InvalidArgument(format!("Column '{name}' assigned twice")));
        }
    }
    let values = schema
        .columns
        .iter()
        .map(|col| match given.get(col.name.as_str()) {
            Some(v) => (*v).clone(),
            None => col.default.clone().unwrap_or(Value::Null),
        })
        .collect();
    prepare_row(schema, values)
}

/// Coerces `value` into `col` and checks NOT NULL. Type problems surface as
/// constraint violations since nothing was encoded yet.
pub(super) fn coerce_for(col: &Column, value: Value) -> Result<Value> {
    let value = coerce(col.data_type, value).map_err(|e| {
        DbError::ConstraintViolation(format!("Column '{}' ({}): {e}", col.name, col.data_type))
    })?;
    if value.is_null() && !col.is_nullable {
        return Err(DbError::ConstraintViolation(format!("Column '{}' is NOT NULL", col.name)));
    }
    Ok(value)
}

/// Checks the PRIMARY KEY and UNIQUE columns of `candidates` against the
/// rows already stored and against each other. Locations in `replacing`
/// are rows the candidates will overwrite, so they do not count as clashes.
pub(super) fn check_unique(
    schema: &Schema,
    storage: &mut dyn StorageEngine,
    candidates: &[&Row],
    replacing: &HashSet<u64>,
) -> Result<()> {
    for idx in schema.unique_columns() {
        let col = &schema.columns[idx];
        let kind = if col.is_primary { "PRIMARY KEY" } else { "UNIQUE" };
        let mut seen: HashSet<IndexKey> = HashSet::new();
        for row in candidates {
            let value = &row[idx];
            let Some(key) = IndexKey::from_value(value) else {
                continue;
            };
            let clash = !seen.insert(key)
                || storage
                    .index_lookup(&schema.name, &col.name, value)?
                    .iter()
                    .any(|loc| !replacing.contains(loc));
            if clash {
                return Err(DbError::ConstraintViolation(format!(
                    "{kind} constraint violation on {}.{}: duplicate value {value}",
                    schema.name, col.name
                )));
            }
        }
    }
    Ok(())
}
