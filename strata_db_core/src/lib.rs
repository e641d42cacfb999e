use std::fs;
use std::path::PathBuf;

use tracing::info;

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod storage;
pub mod transaction;
pub mod types;

pub use config::EngineConfig;
pub use database::Database;
pub use error::{DbError, Result};

use database::DATABASE_DESCRIPTOR;
use storage::catalog::validate_name;

/// Owns a root directory holding one subdirectory per database.
#[derive(Debug, Clone)]
pub struct Instance {
    config: EngineConfig,
}

impl Instance {
    pub fn new(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.root)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn database_dir(&self, name: &str) -> PathBuf {
        self.config.root.join(name)
    }

    pub fn database_exists(&self, name: &str) -> bool {
        validate_name("database", name).is_ok()
            && self.database_dir(name).join(DATABASE_DESCRIPTOR).is_file()
    }

    pub fn create_database(&self, name: &str) -> Result<Database> {
        validate_name("database", name)?;
        let dir = self.database_dir(name);
        if dir.exists() {
            return Err(DbError::AlreadyExists(format!("Database '{name}'")));
        }
        Database::create(dir, name, self.config.clone())
    }

    pub fn open_database(&self, name: &str) -> Result<Database> {
        validate_name("database", name)?;
        if !self.database_exists(name) {
            return Err(DbError::NotFound(format!("Database '{name}'")));
        }
        Database::open(self.database_dir(name), self.config.clone())
    }

    /// Deletes the database directory and everything in it.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        validate_name("database", name)?;
        let dir = self.database_dir(name);
        if !dir.join(DATABASE_DESCRIPTOR).is_file() {
            return Err(DbError::NotFound(format!("Database '{name}'")));
        }
        fs::remove_dir_all(&dir)?;
        info!(database = name, "dropped database");
        Ok(())
    }

    /// Names of every database under the root, sorted.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.root)? {
            let entry = entry?;
            if !entry.path().join(DATABASE_DESCRIPTOR).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
