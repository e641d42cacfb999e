use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Catalog;
use crate::error::{DbError, Result};
use crate::storage::schema::{Column, ForeignKey, ForeignKeyAction, Schema};
use crate::types::datatype::parse_datatype;
use crate::types::value::{parse_value, value_to_string};

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseFile {
    name: String,
    tables: Vec<TableFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    name: String,
    columns: Vec<ColumnFile>,
    primary_key: Option<String>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKeyFile>,
    #[serde(default)]
    unique: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ColumnFile {
    name: String,
    data_type: String,
    is_primary: bool,
    is_nullable: bool,
    default: Option<String>,
    is_unique: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForeignKeyFile {
    column: String,
    ref_table: String,
    ref_column: String,
    on_delete: String,
    on_update: String,
}

impl Catalog {
    /// Saves the database descriptor (every table schema) to disk.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let file = DatabaseFile {
            name: self.name.clone(),
            tables: self.tables.values().map(table_to_file).collect(),
        };
        let payload = serde_json::to_string_pretty(&file)?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Loads a database descriptor written by [`Catalog::save_to_path`].
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: DatabaseFile = serde_json::from_str(&content)?;
        let mut tables: BTreeMap<String, Schema> = BTreeMap::new();
        for t in file.tables {
            let schema = table_from_file(t)?;
            tables.insert(schema.name.clone(), schema);
        }
        Ok(Self {
            name: file.name,
            tables,
        })
    }
}

/// Writes the per-table descriptor kept next to the heap file.
pub fn save_table_descriptor(schema: &Schema, path: &Path) -> Result<()> {
    let payload = serde_json::to_string_pretty(&table_to_file(schema))?;
    fs::write(path, payload)?;
    Ok(())
}

pub fn load_table_descriptor(path: &Path) -> Result<Schema> {
    let content = fs::read_to_string(path)?;
    table_from_file(serde_json::from_str(&content)?)
}

fn table_to_file(schema: &Schema) -> TableFile {
    TableFile {
        name: schema.name.clone(),
        columns: schema
            .columns
            .iter()
            .map(|c| ColumnFile {
                name: c.name.clone(),
                data_type: c.data_type.name().to_string(),
                is_primary: c.is_primary,
                is_nullable: c.is_nullable,
                default: c.default.as_ref().map(value_to_string),
                is_unique: c.is_unique,
            })
            .collect(),
        primary_key: schema.primary_key.clone(),
        foreign_keys: schema
            .foreign_keys
            .iter()
            .map(|fk| ForeignKeyFile {
                column: fk.column.clone(),
                ref_table: fk.ref_table.clone(),
                ref_column: fk.ref_column.clone(),
                on_delete: fk.on_delete.as_str().to_string(),
                on_update: fk.on_update.as_str().to_string(),
            })
            .collect(),
        unique: schema.unique_constraints.clone(),
    }
}

fn table_from_file(file: TableFile) -> Result<Schema> {
    let mut columns: Vec<Column> = Vec::with_capacity(file.columns.len());
    for c in file.columns {
        let data_type = parse_datatype(&c.data_type)?;
        let default = c
            .default
            .map(|text| parse_value(data_type, &text))
            .transpose()
            .map_err(|e| DbError::Decoding(format!("Bad default for column '{}': {e}", c.name)))?;
        columns.push(Column {
            name: c.name,
            data_type,
            is_primary: c.is_primary,
            is_nullable: c.is_nullable,
            default,
            is_unique: c.is_unique,
        });
    }
    let mut foreign_keys: Vec<ForeignKey> = Vec::with_capacity(file.foreign_keys.len());
    for fk in file.foreign_keys {
        foreign_keys.push(ForeignKey {
            on_delete: parse_action(&fk.on_delete)?,
            on_update: parse_action(&fk.on_update)?,
            column: fk.column,
            ref_table: fk.ref_table,
            ref_column: fk.ref_column,
        });
    }
    Ok(Schema {
        name: file.name,
        columns,
        primary_key: file.primary_key,
        foreign_keys,
        unique_constraints: file.unique,
    })
}

fn parse_action(s: &str) -> Result<ForeignKeyAction> {
    ForeignKeyAction::parse(s)
        .ok_or_else(|| DbError::Decoding(format!("Unknown foreign key action '{s}'")))
}
