use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::{index_path, DiskStorage, TableFiles, HEAP_FILE, TABLE_DESCRIPTOR};
use crate::error::{DbError, Result};
use crate::storage::catalog::save_table_descriptor;
use crate::storage::heap::HeapFile;
use crate::storage::index::ColumnIndex;
use crate::storage::Schema;

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("tables"))?;
        Ok(Self {
            root,
            tables: HashMap::new(),
        })
    }

    pub(super) fn create_files(&mut self, schema: &Schema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(DbError::AlreadyExists(format!("Table '{}' in storage", schema.name)));
        }
        let dir = self.table_dir(&schema.name);
        if dir.exists() {
            return Err(DbError::AlreadyExists(format!("Table directory '{}'", dir.display())));
        }
        fs::create_dir_all(&dir)?;
        save_table_descriptor(schema, &dir.join(TABLE_DESCRIPTOR))?;
        let heap = HeapFile::create(dir.join(HEAP_FILE), schema.row_width())?;
        let mut indexes = BTreeMap::new();
        for col in &schema.columns {
            let idx = ColumnIndex::create(index_path(&dir, &col.name), &col.name, col.data_type)?;
            indexes.insert(col.name.clone(), idx);
        }
        debug!(table = %schema.name, row_width = schema.row_width(), "allocated table files");
        self.tables.insert(
            schema.name.clone(),
            TableFiles {
                schema: schema.clone(),
                heap,
                indexes,
            },
        );
        Ok(())
    }

    pub(super) fn open_files(&mut self, schema: &Schema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Ok(());
        }
        let dir = self.table_dir(&schema.name);
        let heap_path = dir.join(HEAP_FILE);
        if !heap_path.exists() {
            return Err(DbError::NotFound(format!("Heap file for table '{}'", schema.name)));
        }
        let heap = HeapFile::open(heap_path, schema.row_width())?;
        let indexes = schema
            .columns
            .iter()
            .map(|col| {
                (
                    col.name.clone(),
                    ColumnIndex::new(index_path(&dir, &col.name), &col.name, col.data_type),
                )
            })
            .collect();
        self.tables.insert(
            schema.name.clone(),
            TableFiles {
                schema: schema.clone(),
                heap,
                indexes,
            },
        );
        Ok(())
    }

    pub(super) fn remove_files(&mut self, table: &str) -> Result<()> {
        let dir = self.table_dir(table);
        if !dir.exists() {
            return Err(DbError::NotFound(format!("Table directory for '{table}'")));
        }
        fs::remove_dir_all(&dir)?;
        self.tables.remove(table);
        debug!(table, "removed table files");
        Ok(())
    }
}
