use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{DbError, Result};
use crate::storage::codec::{decode_row, encode_row};
use crate::storage::heap::HeapFile;
use crate::storage::index::ColumnIndex;
use crate::storage::Schema;
use crate::types::Row;

mod engine_impl;
mod lifecycle;

pub const HEAP_FILE: &str = "data.bin";
pub const TABLE_DESCRIPTOR: &str = "table.json";
pub const INDEX_EXTENSION: &str = "idx";

/// Disk-backed storage: one directory per table under `<root>/tables`,
/// holding the heap file, the table descriptor and one index snapshot per
/// column.
#[derive(Debug)]
pub struct DiskStorage {
    root: PathBuf,
    tables: HashMap<String, TableFiles>,
}

#[derive(Debug)]
struct TableFiles {
    schema: Schema,
    heap: HeapFile,
    indexes: BTreeMap<String, ColumnIndex>,
}

impl DiskStorage {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join("tables").join(table)
    }

    fn files(&self, table: &str) -> Result<&TableFiles> {
        self.tables
            .get(table)
            .ok_or_else(|| DbError::NotFound(format!("Table '{table}' in storage")))
    }

    fn files_mut(&mut self, table: &str) -> Result<&mut TableFiles> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DbError::NotFound(format!("Table '{table}' in storage")))
    }
}

pub(crate) fn index_path(dir: &Path, column: &str) -> PathBuf {
    dir.join(format!("{column}.{INDEX_EXTENSION}"))
}

impl TableFiles {
    fn decode_all(&self) -> Result<Vec<(u64, Row)>> {
        let mut out = Vec::new();
        for item in self.heap.scan()? {
            let (location, bytes) = item?;
            let row = decode_row(&self.schema.columns, &bytes).map_err(|e| DbError::CorruptRow {
                location,
                reason: e.to_string(),
            })?;
            out.push((location, row));
        }
        Ok(out)
    }

    fn encode(&self, row: &Row) -> Result<Vec<u8>> {
        encode_row(&self.schema.columns, row)
    }

    fn rebuild_indexes(&mut self) -> Result<()> {
        let rows = self.decode_all()?;
        for (i, col) in self.schema.columns.iter().enumerate() {
            let idx = self
                .indexes
                .get_mut(&col.name)
                .ok_or_else(|| DbError::NotFound(format!("Index for column '{}'", col.name)))?;
            idx.rebuild(rows.iter().map(|(loc, row)| (row[i].clone(), *loc)))?;
        }
        Ok(())
    }

    /// Index of `column`, loaded and checked against the heap. A snapshot
    /// that cannot be trusted is rebuilt from the heap instead.
    fn index_mut(&mut self, column: &str) -> Result<&mut ColumnIndex> {
        let heap_len = self.heap.len_bytes()?;
        let row_width = self.heap.row_width();
        let failure = {
            let idx = self
                .indexes
                .get_mut(column)
                .ok_or_else(|| DbError::NotFound(format!("Column '{column}' in table '{}'", self.schema.name)))?;
            if idx.is_loaded() {
                None
            } else {
                idx.load().and_then(|_| idx.validate(heap_len, row_width)).err()
            }
        };
        if let Some(err) = failure {
            warn!(
                table = %self.schema.name,
                column,
                error = %err,
                "index snapshot unusable, rebuilding from heap"
            );
            let pos = self
                .schema
                .column_index(column)
                .ok_or_else(|| DbError::NotFound(format!("Column '{column}'")))?;
            let rows = self.decode_all()?;
            let idx = self
                .indexes
                .get_mut(column)
                .ok_or_else(|| DbError::NotFound(format!("Index for column '{column}'")))?;
            idx.rebuild(rows.into_iter().map(|(loc, mut row)| (row.swap_remove(pos), loc)))?;
            idx.flush()?;
        }
        self.indexes
            .get_mut(column)
            .ok_or_else(|| DbError::NotFound(format!("Index for column '{column}'")))
    }
}
