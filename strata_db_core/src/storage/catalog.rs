use std::collections::BTreeMap;

use tracing::info;

use crate::error::{DbError, Result};
use crate::storage::codec;
use crate::storage::schema::{Column, ForeignKey, ForeignKeyAction, Schema};
use crate::types::value::coerce;
use crate::types::Value;

mod persistence;

pub use persistence::{load_table_descriptor, save_table_descriptor};

/// Everything `create_table` needs, gathered in one request.
#[derive(Debug, Clone, Default)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub unique: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            ..Self::default()
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }
}

/// Table schemas of one database.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    tables: BTreeMap<String, Schema>,
}

impl Catalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks if a table exists in the catalog
    pub fn exists(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Retrieves the schema for a given table
    pub fn schema(&self, table: &str) -> Result<&Schema> {
        self.tables
            .get(table)
            .ok_or_else(|| DbError::NotFound(format!("Table '{table}'")))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.tables.values()
    }

    /// Validates `def` and registers the resulting schema.
    ///
    /// Foreign keys are checked against this table's own columns only: the
    /// referenced table may not exist yet, so its side is checked on insert.
    pub fn create_table(&mut self, def: TableDef) -> Result<&Schema> {
        validate_name("table", &def.name)?;
        if self.exists(&def.name) {
            return Err(DbError::AlreadyExists(format!("Table '{}'", def.name)));
        }
        if def.columns.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "Table '{}' must declare at least one column",
                def.name
            )));
        }

        let mut columns: Vec<Column> = Vec::with_capacity(def.columns.len());
        for mut col in def.columns {
            validate_name("column", &col.name)?;
            if columns.iter().any(|c| c.name == col.name) {
                return Err(DbError::InvalidArgument(format!(
                    "Duplicate column '{}' in table '{}'",
                    col.name, def.name
                )));
            }
            col.default = match col.default.take() {
                None | Some(Value::Null) => None,
                // Encoded once here so an oversized default fails at DDL
                // time rather than on every insert that relies on it.
                Some(v) => Some(
                    coerce(col.data_type, v)
                        .and_then(|v| codec::encode(col.data_type, &v).map(|_| v))
                        .map_err(|e| {
                            DbError::ConstraintViolation(format!(
                                "DEFAULT for column '{}' is not a valid {}: {e}",
                                col.name, col.data_type
                            ))
                        })?,
                ),
            };
            columns.push(col);
        }

        let flagged: Vec<String> = columns
            .iter()
            .filter(|c| c.is_primary)
            .map(|c| c.name.clone())
            .collect();
        let primary_key = match (flagged.as_slice(), def.primary_key) {
            ([], None) => None,
            ([one], None) => Some(one.clone()),
            ([], Some(pk)) => Some(pk),
            ([one], Some(pk)) if *one == pk => Some(pk),
            _ => {
                return Err(DbError::ConstraintViolation(
                    "Only one PRIMARY KEY column is supported".to_string(),
                ))
            }
        };
        if let Some(pk) = &primary_key {
            let col = columns
                .iter_mut()
                .find(|c| c.name == *pk)
                .ok_or_else(|| DbError::NotFound(format!("PRIMARY KEY column '{pk}'")))?;
            // PK implies NOT NULL.
            col.is_primary = true;
            col.is_nullable = false;
        }

        let mut unique: Vec<String> = Vec::new();
        for u in def.unique {
            if columns.iter().all(|c| c.name != u) {
                return Err(DbError::NotFound(format!("UNIQUE column '{u}'")));
            }
            if !unique.contains(&u) {
                unique.push(u);
            }
        }

        for fk in &def.foreign_keys {
            let child = columns
                .iter()
                .find(|c| c.name == fk.column)
                .ok_or_else(|| DbError::NotFound(format!("FOREIGN KEY column '{}'", fk.column)))?;
            if (fk.on_delete == ForeignKeyAction::SetNull || fk.on_update == ForeignKeyAction::SetNull)
                && !child.is_nullable
            {
                return Err(DbError::ConstraintViolation(format!(
                    "FOREIGN KEY SET NULL requires nullable column '{}'",
                    fk.column
                )));
            }
            let parent_columns = if fk.ref_table == def.name {
                Some(&columns)
            } else {
                self.tables.get(&fk.ref_table).map(|s| &s.columns)
            };
            if let Some(parent_columns) = parent_columns {
                let parent = parent_columns
                    .iter()
                    .find(|c| c.name == fk.ref_column)
                    .ok_or_else(|| {
                        DbError::NotFound(format!(
                            "Referenced column '{}.{}'",
                            fk.ref_table, fk.ref_column
                        ))
                    })?;
                if parent.data_type != child.data_type {
                    return Err(DbError::ConstraintViolation(format!(
                        "FOREIGN KEY '{}' is {} but '{}.{}' is {}",
                        fk.column, child.data_type, fk.ref_table, fk.ref_column, parent.data_type
                    )));
                }
            }
        }

        let schema = Schema {
            name: def.name.clone(),
            columns,
            primary_key,
            foreign_keys: def.foreign_keys,
            unique_constraints: unique,
        };
        info!(database = %self.name, table = %def.name, "created table");
        Ok(self.tables.entry(def.name).or_insert(schema))
    }

    /// Removes a table; refused while any other table declares a foreign key
    /// into it, whatever its ON DELETE policy says.
    pub fn drop_table(&mut self, table: &str) -> Result<Schema> {
        if !self.exists(table) {
            return Err(DbError::NotFound(format!("Table '{table}'")));
        }
        let dependents: Vec<String> = self
            .referencing(table)
            .into_iter()
            .filter(|(child, _)| child != table)
            .map(|(child, fk)| format!("{child}.{}", fk.column))
            .collect();
        if !dependents.is_empty() {
            return Err(DbError::ReferentialIntegrity(format!(
                "Cannot drop '{table}': referenced by {}",
                dependents.join(", ")
            )));
        }
        let schema = self
            .tables
            .remove(table)
            .ok_or_else(|| DbError::NotFound(format!("Table '{table}'")))?;
        info!(database = %self.name, table, "dropped table");
        Ok(schema)
    }

    /// Puts back a schema taken out by `drop_table`.
    pub(crate) fn restore(&mut self, schema: Schema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    /// Foreign keys, by child table, whose `ref_table` is `parent`.
    pub fn referencing(&self, parent: &str) -> Vec<(String, ForeignKey)> {
        let mut out = Vec::new();
        for (name, schema) in &self.tables {
            for fk in &schema.foreign_keys {
                if fk.ref_table == parent {
                    out.push((name.clone(), fk.clone()));
                }
            }
        }
        out
    }
}

/// Names become directory and file names, so keep them to identifiers.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidArgument(format!(
            "Invalid {kind} name '{name}': use letters, digits and '_'"
        )))
    }
}
