use super::DiskStorage;
use crate::error::{DbError, Result};
use crate::storage::codec::decode_row;
use crate::storage::engine::StorageEngine;
use crate::storage::Schema;
use crate::types::{Row, Value};

impl StorageEngine for DiskStorage {
    fn create_table(&mut self, schema: &Schema) -> Result<()> {
        self.create_files(schema)
    }

    fn open_table(&mut self, schema: &Schema) -> Result<()> {
        self.open_files(schema)
    }

    fn drop_table(&mut self, table: &str) -> Result<()> {
        self.remove_files(table)
    }

    fn append_row(&mut self, table: &str, row: &Row) -> Result<u64> {
        let files = self.files_mut(table)?;
        let bytes = files.encode(row)?;
        let columns: Vec<String> = files.schema.column_names();
        // Load indexes before the heap grows so a snapshot is validated
        // against the heap it was taken from.
        for col in &columns {
            files.index_mut(col)?;
        }
        let location = files.heap.append(&bytes)?;
        for (col, value) in columns.iter().zip(row) {
            files.index_mut(col)?.insert(value, location)?;
        }
        Ok(location)
    }

    fn read_row(&self, table: &str, location: u64) -> Result<Row> {
        let files = self.files(table)?;
        let bytes = files.heap.read_at(location)?;
        decode_row(&files.schema.columns, &bytes).map_err(|e| DbError::CorruptRow {
            location,
            reason: e.to_string(),
        })
    }

    fn overwrite_row(&mut self, table: &str, location: u64, row: &Row) -> Result<()> {
        let old = self.read_row(table, location)?;
        let files = self.files_mut(table)?;
        let bytes = files.encode(row)?;
        let columns: Vec<String> = files.schema.column_names();
        for col in &columns {
            files.index_mut(col)?;
        }
        files.heap.overwrite_at(location, &bytes)?;
        for ((col, before), after) in columns.iter().zip(&old).zip(row) {
            if before == after {
                continue;
            }
            let idx = files.index_mut(col)?;
            idx.delete_entry(before, location)?;
            idx.insert(after, location)?;
        }
        Ok(())
    }

    fn scan(&self, table: &str) -> Result<Vec<(u64, Row)>> {
        self.files(table)?.decode_all()
    }

    fn replace_rows(&mut self, table: &str, rows: &[Row]) -> Result<()> {
        let files = self.files_mut(table)?;
        let encoded = rows
            .iter()
            .map(|r| files.encode(r))
            .collect::<Result<Vec<_>>>()?;
        files.heap.rewrite(encoded.iter().map(Vec::as_slice))?;
        files.rebuild_indexes()
    }

    fn rebuild_indexes(&mut self, table: &str) -> Result<()> {
        self.files_mut(table)?.rebuild_indexes()
    }

    fn locate_row(&self, table: &str, row: &Row) -> Result<Vec<u64>> {
        let files = self.files(table)?;
        let target = files.encode(row)?;
        let mut out = Vec::new();
        for item in files.heap.scan()? {
            let (location, bytes) = item?;
            if bytes == target {
                out.push(location);
            }
        }
        Ok(out)
    }

    fn index_lookup(&mut self, table: &str, column: &str, key: &Value) -> Result<Vec<u64>> {
        self.files_mut(table)?.index_mut(column)?.search_all(key)
    }

    fn index_range(
        &mut self,
        table: &str,
        column: &str,
        low: Option<&Value>,
        high: Option<&Value>,
    ) -> Result<Vec<u64>> {
        self.files_mut(table)?.index_mut(column)?.range(low, high)
    }

    fn index_len(&mut self, table: &str, column: &str) -> Result<usize> {
        self.files_mut(table)?.index_mut(column)?.len()
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        self.files(table)?.heap.row_count()
    }

    fn flush(&mut self, table: &str) -> Result<()> {
        let files = self.files_mut(table)?;
        for idx in files.indexes.values_mut() {
            idx.flush()?;
        }
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        for table in names {
            self.flush(&table)?;
        }
        Ok(())
    }
}
