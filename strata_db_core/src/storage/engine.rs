use crate::error::Result;
use crate::storage::Schema;
use crate::types::{Row, Value};

/// Storage engine trait - physical rows and column indexes, one set per
/// table. Schema validation happens above this layer; callers hand in rows
/// that already match the table layout.
pub trait StorageEngine {
    /// Allocates the table's heap file and one empty index per column.
    fn create_table(&mut self, schema: &Schema) -> Result<()>;

    /// Attaches an existing table's files. Indexes load lazily.
    fn open_table(&mut self, schema: &Schema) -> Result<()>;

    /// Removes all on-disk state of the table.
    fn drop_table(&mut self, table: &str) -> Result<()>;

    /// Appends a row and indexes it; returns its location.
    fn append_row(&mut self, table: &str, row: &Row) -> Result<u64>;

    fn read_row(&self, table: &str, location: u64) -> Result<Row>;

    /// Re-encodes the row at `location` in place and patches the indexes.
    fn overwrite_row(&mut self, table: &str, location: u64, row: &Row) -> Result<()>;

    /// Every row with its location, in file order.
    fn scan(&self, table: &str) -> Result<Vec<(u64, Row)>>;

    /// Replaces the heap with `rows` (compaction) and rebuilds every index.
    fn replace_rows(&mut self, table: &str, rows: &[Row]) -> Result<()>;

    /// Rebuilds every column index of the table from a heap scan.
    fn rebuild_indexes(&mut self, table: &str) -> Result<()>;

    /// Locations whose encoded bytes equal the encoding of `row`.
    fn locate_row(&self, table: &str, row: &Row) -> Result<Vec<u64>>;

    fn index_lookup(&mut self, table: &str, column: &str, key: &Value) -> Result<Vec<u64>>;

    fn index_range(
        &mut self,
        table: &str,
        column: &str,
        low: Option<&Value>,
        high: Option<&Value>,
    ) -> Result<Vec<u64>>;

    /// Number of (key, location) entries in a column index.
    fn index_len(&mut self, table: &str, column: &str) -> Result<usize>;

    fn row_count(&self, table: &str) -> Result<u64>;

    /// Snapshots the table's dirty indexes to disk.
    fn flush(&mut self, table: &str) -> Result<()>;

    fn flush_all(&mut self) -> Result<()>;
}
