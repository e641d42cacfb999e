use std::collections::HashMap;

use super::select::{finish, Query};
use crate::engine::format::ResultSet;
use crate::error::{DbError, Result};
use crate::storage::index::IndexKey;
use crate::storage::{Catalog, Schema, StorageEngine};
use crate::types::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

/// `left.left_column = right.right_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub left: String,
    pub right: String,
    pub left_column: String,
    pub right_column: String,
    pub kind: JoinKind,
}

impl JoinSpec {
    pub fn new(
        kind: JoinKind,
        left: impl Into<String>,
        left_column: impl Into<String>,
        right: impl Into<String>,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            left_column: left_column.into(),
            right_column: right_column.into(),
            kind,
        }
    }
}

/// Equi-join of two tables. Output columns are every left column then every
/// right column, each qualified as `table.column`; the query's filter,
/// ordering, page window and projection run over that joined row.
pub fn join(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    spec: &JoinSpec,
    query: &Query<'_>,
) -> Result<ResultSet> {
    if spec.left == spec.right {
        return Err(DbError::InvalidArgument(format!(
            "JOIN needs two different tables, got '{}' twice",
            spec.left
        )));
    }
    let left_schema = catalog.schema(&spec.left)?;
    let right_schema = catalog.schema(&spec.right)?;
    let lidx = join_column(left_schema, &spec.left_column)?;
    let ridx = join_column(right_schema, &spec.right_column)?;
    let (ltype, rtype) = (left_schema.columns[lidx].data_type, right_schema.columns[ridx].data_type);
    if ltype != rtype {
        return Err(DbError::InvalidArgument(format!(
            "JOIN columns must share a type: {}.{} is {ltype}, {}.{} is {rtype}",
            spec.left, spec.left_column, spec.right, spec.right_column
        )));
    }

    let left_rows: Vec<Row> = storage.scan(&spec.left)?.into_iter().map(|(_, r)| r).collect();
    let right_rows: Vec<Row> = storage.scan(&spec.right)?.into_iter().map(|(_, r)| r).collect();
    let (lwidth, rwidth) = (left_schema.column_count(), right_schema.column_count());

    let mut out: Vec<Row> = Vec::new();
    match spec.kind {
        JoinKind::Inner | JoinKind::Left | JoinKind::Full => {
            // Build on the right side, probe with left rows to keep left order.
            let built = build(&right_rows, ridx);
            let mut right_matched = vec![false; right_rows.len()];
            for lr in &left_rows {
                let hits = probe(&built, &lr[lidx]);
                for &ri in hits {
                    right_matched[ri] = true;
                    out.push(concat(lr, &right_rows[ri]));
                }
                if hits.is_empty() && spec.kind != JoinKind::Inner {
                    out.push(concat(lr, &nulls(rwidth)));
                }
            }
            if spec.kind == JoinKind::Full {
                for (ri, rr) in right_rows.iter().enumerate() {
                    if !right_matched[ri] {
                        out.push(concat(&nulls(lwidth), rr));
                    }
                }
            }
        }
        JoinKind::Right => {
            let built = build(&left_rows, lidx);
            for rr in &right_rows {
                let hits = probe(&built, &rr[ridx]);
                for &li in hits {
                    out.push(concat(&left_rows[li], rr));
                }
                if hits.is_empty() {
                    out.push(concat(&nulls(lwidth), rr));
                }
            }
        }
    }

    let columns = qualified(left_schema)
        .into_iter()
        .chain(qualified(right_schema))
        .collect::<Vec<_>>();
    let rows = match query.filter {
        Some(filter) => {
            let mut kept = Vec::with_capacity(out.len());
            for row in out {
                if filter.matches(&columns, &row)? {
                    kept.push(row);
                }
            }
            kept
        }
        None => out,
    };
    finish(columns, rows, query)
}

/// Accepts `col` or `table.col` for the side's own table.
fn join_column(schema: &Schema, name: &str) -> Result<usize> {
    let bare = match name.split_once('.') {
        Some((table, col)) if table == schema.name => col,
        Some(_) => {
            return Err(DbError::InvalidArgument(format!(
                "JOIN column '{name}' does not belong to table '{}'",
                schema.name
            )));
        }
        None => name,
    };
    schema
        .column_index(bare)
        .ok_or_else(|| DbError::NotFound(format!("Column '{bare}' in table '{}'", schema.name)))
}

/// Join key -> positions of the rows carrying it. NULL keys never match.
fn build(rows: &[Row], idx: usize) -> HashMap<IndexKey, Vec<usize>> {
    let mut map: HashMap<IndexKey, Vec<usize>> = HashMap::new();
    for (pos, row) in rows.iter().enumerate() {
        if let Some(key) = IndexKey::from_value(&row[idx]) {
            map.entry(key).or_default().push(pos);
        }
    }
    map
}

fn probe<'m>(built: &'m HashMap<IndexKey, Vec<usize>>, value: &Value) -> &'m [usize] {
    IndexKey::from_value(value)
        .and_then(|k| built.get(&k))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn concat(left: &Row, right: &Row) -> Row {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend(left.iter().cloned());
    row.extend(right.iter().cloned());
    row
}

fn nulls(width: usize) -> Row {
    vec![Value::Null; width]
}

fn qualified(schema: &Schema) -> Vec<String> {
    schema
        .columns
        .iter()
        .map(|c| format!("{}.{}", schema.name, c.name))
        .collect()
}
