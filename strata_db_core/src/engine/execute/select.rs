use std::cmp::Ordering;

use crate::engine::format::ResultSet;
use crate::engine::predicate::{resolve_column, RowFilter};
use crate::error::Result;
use crate::storage::{Catalog, Schema, StorageEngine};
use crate::types::value::{coerce, compare_values};
use crate::types::{Row, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Shape of a read: projection, filter, ordering and a page window.
#[derive(Clone, Copy, Default)]
pub struct Query<'a> {
    pub columns: Option<&'a [&'a str]>,
    pub filter: Option<&'a dyn RowFilter>,
    pub order_by: Option<&'a OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl<'a> Query<'a> {
    /// Every column of every row, in file order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &'a [&'a str]) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn filter(mut self, filter: &'a dyn RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: &'a OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

pub fn select(
    catalog: &Catalog,
    storage: &mut dyn StorageEngine,
    table: &str,
    query: &Query<'_>,
) -> Result<ResultSet> {
    let schema = catalog.schema(table)?;
    let rows = matching_rows(schema, storage, query.filter)?
        .into_iter()
        .map(|(_, row)| row)
        .collect();
    finish(schema.column_names(), rows, query)
}

/// Rows of the table that pass `filter`, with their heap locations.
///
/// A single equality on a column is answered from that column's index;
/// every other filter scans the heap.
pub fn matching_rows(
    schema: &Schema,
    storage: &mut dyn StorageEngine,
    filter: Option<&dyn RowFilter>,
) -> Result<Vec<(u64, Row)>> {
    let columns = schema.column_names();
    let Some(filter) = filter else {
        return storage.scan(&schema.name);
    };

    if let Some(locations) = point_locations(schema, storage, filter)? {
        let mut out = Vec::with_capacity(locations.len());
        for location in locations {
            let row = storage.read_row(&schema.name, location)?;
            if filter.matches(&columns, &row)? {
                out.push((location, row));
            }
        }
        out.sort_by_key(|(location, _)| *location);
        return Ok(out);
    }

    let mut out = Vec::new();
    for (location, row) in storage.scan(&schema.name)? {
        if filter.matches(&columns, &row)? {
            out.push((location, row));
        }
    }
    Ok(out)
}

fn point_locations(
    schema: &Schema,
    storage: &mut dyn StorageEngine,
    filter: &dyn RowFilter,
) -> Result<Option<Vec<u64>>> {
    let Some((name, value)) = filter.point_lookup() else {
        return Ok(None);
    };
    let Ok(idx) = resolve_column(&schema.column_names(), name, "WHERE") else {
        return Ok(None);
    };
    let column = &schema.columns[idx];
    // A literal the column type cannot hold is left to the evaluator to report.
    let Ok(key) = coerce(column.data_type, value.clone()) else {
        return Ok(None);
    };
    storage.index_lookup(&schema.name, &column.name, &key).map(Some)
}

/// Applies ordering, the page window and the projection, in that order.
pub(crate) fn finish(columns: Vec<String>, mut rows: Vec<Row>, query: &Query<'_>) -> Result<ResultSet> {
    if let Some(order) = query.order_by {
        let idx = resolve_column(&columns, &order.column, "ORDER BY")?;
        rows.sort_by(|a, b| compare_for_order(&a[idx], &b[idx], order.descending));
    }

    let rows: Vec<Row> = match query.limit {
        Some(n) => rows.into_iter().skip(query.offset).take(n).collect(),
        None => rows.into_iter().skip(query.offset).collect(),
    };

    let Some(wanted) = query.columns else {
        return Ok(ResultSet::new(columns, rows));
    };
    let idxs = wanted
        .iter()
        .map(|name| resolve_column(&columns, name, "SELECT list"))
        .collect::<Result<Vec<_>>>()?;
    let projected = rows
        .into_iter()
        .map(|row| idxs.iter().map(|i| row[*i].clone()).collect())
        .collect();
    let names = idxs.iter().map(|i| columns[*i].clone()).collect();
    Ok(ResultSet::new(names, projected))
}

/// NULLs sort first ascending; incomparable values tie so the sort stays stable.
fn compare_for_order(a: &Value, b: &Value, descending: bool) -> Ordering {
    let ord = match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => compare_values(a, b).unwrap_or(Ordering::Equal),
    };
    if descending { ord.reverse() } else { ord }
}
