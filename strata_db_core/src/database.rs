use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::execute::{self, JoinSpec, MutationResult, Query};
use crate::engine::{ResultSet, RowFilter};
use crate::error::{DbError, Result};
use crate::storage::{Catalog, DiskStorage, Schema, StorageEngine, TableDef};
use crate::transaction::{Change, LockMode, TransactionManager, TxnId, TxnStatus, UndoTarget};
use crate::types::value::coerce;
use crate::types::{Row, Value};

pub const DATABASE_DESCRIPTOR: &str = "database.json";

/// One open database: its catalog, table files and transaction manager.
///
/// Every data operation takes an optional transaction id. With one, the
/// table locks it needs are taken first (SHARED to read, EXCLUSIVE to
/// write) and writes are recorded for undo before they are applied.
/// Without one, nothing is locked.
#[derive(Debug)]
pub struct Database {
    name: String,
    dir: PathBuf,
    catalog: Catalog,
    storage: DiskStorage,
    txns: Arc<TransactionManager>,
    config: EngineConfig,
    closed: bool,
}

impl Database {
    pub(crate) fn create(dir: PathBuf, name: &str, config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Catalog::new(name).save_to_path(&dir.join(DATABASE_DESCRIPTOR))?;
        info!(database = name, "created database");
        Self::open(dir, config)
    }

    pub(crate) fn open(dir: PathBuf, config: EngineConfig) -> Result<Self> {
        let catalog = Catalog::load_from_path(&dir.join(DATABASE_DESCRIPTOR))?;
        let mut storage = DiskStorage::new(&dir)?;
        for schema in catalog.schemas() {
            storage.open_table(schema)?;
        }
        let txns = TransactionManager::open(&dir, config.transaction_log)?;
        debug!(database = %catalog.name(), tables = catalog.table_names().len(), "opened database");
        Ok(Self {
            name: catalog.name().to_string(),
            dir,
            catalog,
            storage,
            txns: Arc::new(txns),
            config,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn schema(&self, table: &str) -> Result<&Schema> {
        self.catalog.schema(table)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.table_names()
    }

    /// Shared handle to the transaction manager, e.g. for lock calls from
    /// other threads.
    pub fn transactions(&self) -> Arc<TransactionManager> {
        Arc::clone(&self.txns)
    }

    fn save_catalog(&self) -> Result<()> {
        self.catalog.save_to_path(&self.dir.join(DATABASE_DESCRIPTOR))
    }

    pub fn create_table(&mut self, def: TableDef) -> Result<Schema> {
        let schema = execute::create_table(&mut self.catalog, &mut self.storage, def)?;
        self.save_catalog()?;
        Ok(schema)
    }

    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        execute::drop_table(&mut self.catalog, &mut self.storage, table)?;
        self.save_catalog()
    }

    /// Empties a table; returns how many rows it held.
    pub fn truncate_table(&mut self, table: &str) -> Result<usize> {
        execute::truncate_table(&self.catalog, &mut self.storage, table)
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        self.catalog.schema(table)?;
        self.storage.row_count(table)
    }

    /// Number of entries in one column index.
    pub fn index_len(&mut self, table: &str, column: &str) -> Result<usize> {
        self.storage.index_len(table, column)
    }

    fn lock(&self, txn: Option<TxnId>, table: &str, mode: LockMode) -> Result<()> {
        let Some(id) = txn else {
            return Ok(());
        };
        if self.txns.acquire_lock(id, table, mode)? {
            Ok(())
        } else {
            Err(DbError::LockConflict {
                txn: id,
                resource: table.to_string(),
            })
        }
    }

    /// EXCLUSIVE on the table, SHARED on every table its constraint checks
    /// read: referenced parents and referencing children.
    fn lock_for_write(&self, txn: Option<TxnId>, table: &str) -> Result<()> {
        let schema = self.catalog.schema(table)?;
        if txn.is_none() {
            return Ok(());
        }
        self.lock(txn, table, LockMode::Exclusive)?;
        for fk in &schema.foreign_keys {
            self.lock(txn, &fk.ref_table, LockMode::Shared)?;
        }
        for (child, _) in self.catalog.referencing(table) {
            self.lock(txn, &child, LockMode::Shared)?;
        }
        Ok(())
    }

    fn record(&self, txn: Option<TxnId>, change: Change) -> Result<()> {
        match txn {
            Some(id) => self.txns.record(id, change),
            None => Ok(()),
        }
    }

    fn discard(&self, txn: Option<TxnId>) {
        if let Some(id) = txn {
            if let Err(e) = self.txns.discard_last(id) {
                warn!(transaction_id = id, error = %e, "could not drop undo record of a failed write");
            }
        }
    }

    /// Inserts one row given in column order; returns its location.
    pub fn insert(&mut self, txn: Option<TxnId>, table: &str, values: Vec<Value>) -> Result<u64> {
        self.lock_for_write(txn, table)?;
        let row = execute::prepare_insert(&self.catalog, &mut self.storage, table, values)?;
        self.write_row(txn, table, row)
    }

    /// Inserts one row from `(column, value)` pairs; omitted columns take
    /// their default or NULL.
    pub fn insert_named(&mut self, txn: Option<TxnId>, table: &str, values: &[(&str, Value)]) -> Result<u64> {
        self.lock_for_write(txn, table)?;
        let row = execute::prepare_insert_named(&self.catalog, &mut self.storage, table, values)?;
        self.write_row(txn, table, row)
    }

    fn write_row(&mut self, txn: Option<TxnId>, table: &str, row: Row) -> Result<u64> {
        self.record(
            txn,
            Change::Insert {
                table: table.to_string(),
                values: row.clone(),
            },
        )?;
        execute::apply_insert(&mut self.storage, table, &row).inspect_err(|_| self.discard(txn))
    }

    pub fn select(&mut self, txn: Option<TxnId>, table: &str, query: &Query<'_>) -> Result<ResultSet> {
        self.catalog.schema(table)?;
        self.lock(txn, table, LockMode::Shared)?;
        execute::select(&self.catalog, &mut self.storage, table, query)
    }

    pub fn join(&mut self, txn: Option<TxnId>, spec: &JoinSpec, query: &Query<'_>) -> Result<ResultSet> {
        self.catalog.schema(&spec.left)?;
        self.catalog.schema(&spec.right)?;
        self.lock(txn, &spec.left, LockMode::Shared)?;
        self.lock(txn, &spec.right, LockMode::Shared)?;
        execute::join(&self.catalog, &mut self.storage, spec, query)
    }

    pub fn update(
        &mut self,
        txn: Option<TxnId>,
        table: &str,
        assignments: &[(&str, Value)],
        filter: Option<&dyn RowFilter>,
        returning: bool,
    ) -> Result<MutationResult> {
        self.lock_for_write(txn, table)?;
        let plan = execute::plan_update(&self.catalog, &mut self.storage, table, assignments, filter)?;
        if !plan.rows.is_empty() {
            self.record(
                txn,
                Change::Update {
                    table: table.to_string(),
                    rows: plan.rows.iter().map(|(_, old, new)| (old.clone(), new.clone())).collect(),
                },
            )?;
            // A partly applied update keeps its undo record: undo skips the
            // rows that were never rewritten.
            execute::apply_update(&mut self.storage, &plan)?;
        }
        Ok(plan.result(returning))
    }

    pub fn delete(
        &mut self,
        txn: Option<TxnId>,
        table: &str,
        filter: Option<&dyn RowFilter>,
        returning: bool,
    ) -> Result<MutationResult> {
        self.lock_for_write(txn, table)?;
        let plan = execute::plan_delete(&self.catalog, &mut self.storage, table, filter)?;
        if !plan.rows.is_empty() {
            self.record(
                txn,
                Change::Delete {
                    table: table.to_string(),
                    rows: plan.rows.iter().map(|(_, row)| row.clone()).collect(),
                },
            )?;
            execute::apply_delete(&mut self.storage, &plan).inspect_err(|_| self.discard(txn))?;
        }
        Ok(plan.result(returning))
    }

    /// Rows whose `column` equals `value`, found through the column index.
    pub fn lookup(&mut self, txn: Option<TxnId>, table: &str, column: &str, value: impl Into<Value>) -> Result<Vec<Row>> {
        let key = self.index_key(table, column, value.into())?;
        self.lock(txn, table, LockMode::Shared)?;
        let locations = self.storage.index_lookup(table, column, &key)?;
        self.read_rows(table, locations)
    }

    /// Rows whose `column` lies in `[low, high]`, in key order. A `None`
    /// bound leaves that side open.
    pub fn range(
        &mut self,
        txn: Option<TxnId>,
        table: &str,
        column: &str,
        low: Option<Value>,
        high: Option<Value>,
    ) -> Result<Vec<Row>> {
        let low = low.map(|v| self.index_key(table, column, v)).transpose()?;
        let high = high.map(|v| self.index_key(table, column, v)).transpose()?;
        self.lock(txn, table, LockMode::Shared)?;
        let locations = self
            .storage
            .index_range(table, column, low.as_ref(), high.as_ref())?;
        self.read_rows(table, locations)
    }

    fn index_key(&self, table: &str, column: &str, value: Value) -> Result<Value> {
        let schema = self.catalog.schema(table)?;
        let col = schema
            .column(column)
            .ok_or_else(|| DbError::NotFound(format!("Column '{column}' in table '{table}'")))?;
        if value.is_null() {
            return Err(DbError::InvalidArgument("NULL is never indexed".to_string()));
        }
        coerce(col.data_type, value)
    }

    fn read_rows(&self, table: &str, locations: Vec<u64>) -> Result<Vec<Row>> {
        locations
            .into_iter()
            .map(|loc| self.storage.read_row(table, loc))
            .collect()
    }

    pub fn begin(&self) -> Result<TxnId> {
        self.txns.begin()
    }

    /// Commits and, when configured, snapshots the indexes of every table
    /// the transaction wrote.
    pub fn commit(&mut self, id: TxnId) -> Result<()> {
        let written = self.txns.commit(id)?;
        if self.config.flush_on_commit {
            for table in written.iter().filter(|t| self.catalog.exists(t)) {
                self.storage.flush(table)?;
            }
        }
        Ok(())
    }

    /// Rolls the transaction's writes back, newest first.
    pub fn abort(&mut self, id: TxnId) -> Result<()> {
        self.txns.abort(id, &mut Undo { storage: &mut self.storage })
    }

    pub fn acquire_lock(&self, id: TxnId, resource: &str, mode: LockMode) -> Result<bool> {
        self.txns.acquire_lock(id, resource, mode)
    }

    pub fn release_lock(&self, id: TxnId, resource: &str) -> Result<bool> {
        self.txns.release_lock(id, resource)
    }

    pub fn status(&self, id: TxnId) -> Option<TxnStatus> {
        self.txns.status(id)
    }

    /// Snapshots dirty indexes, rewrites the catalog descriptor and writes
    /// a transaction checkpoint.
    pub fn flush(&mut self) -> Result<()> {
        self.storage.flush_all()?;
        self.save_catalog()?;
        self.txns.checkpoint()
    }

    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.closed || !self.dir.exists() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(database = %self.name, error = %e, "flush on drop failed");
        }
    }
}

/// Logical undo against the table files.
struct Undo<'a> {
    storage: &'a mut DiskStorage,
}

impl UndoTarget for Undo<'_> {
    fn undo(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::Insert { table, values } => {
                let location = self
                    .storage
                    .locate_row(table, values)?
                    .pop()
                    .ok_or_else(|| DbError::NotFound(format!("Inserted row in table '{table}'")))?;
                execute::remove_locations(&mut *self.storage, table, &HashSet::from([location]))
            }
            Change::Update { table, rows } => {
                let mut restored: HashSet<u64> = HashSet::new();
                for (old, new) in rows {
                    if old == new {
                        continue;
                    }
                    let found = self
                        .storage
                        .locate_row(table, new)?
                        .into_iter()
                        .find(|loc| !restored.contains(loc));
                    match found {
                        Some(location) => {
                            self.storage.overwrite_row(table, location, old)?;
                            restored.insert(location);
                        }
                        // never rewritten
                        None if !self.storage.locate_row(table, old)?.is_empty() => {}
                        None => {
                            return Err(DbError::NotFound(format!("Updated row in table '{table}'")));
                        }
                    }
                }
                Ok(())
            }
            Change::Delete { table, rows } => {
                for row in rows {
                    self.storage.append_row(table, row)?;
                }
                Ok(())
            }
        }
    }
}
