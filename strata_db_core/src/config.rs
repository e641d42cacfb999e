use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine settings shared by every database under one root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub root: PathBuf,
    /// Snapshot the indexes of every table a transaction wrote when it commits.
    #[serde(default = "enabled")]
    pub flush_on_commit: bool,
    /// Keep the `transaction.log` audit file.
    #[serde(default = "enabled")]
    pub transaction_log: bool,
}

fn enabled() -> bool {
    true
}

impl EngineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            flush_on_commit: true,
            transaction_log: true,
        }
    }

    /// Reads a JSON config file; omitted flags keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn flush_on_commit(mut self, on: bool) -> Self {
        self.flush_on_commit = on;
        self
    }

    pub fn transaction_log(mut self, on: bool) -> Self {
        self.transaction_log = on;
        self
    }
}
