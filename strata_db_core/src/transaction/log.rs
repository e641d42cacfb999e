use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::TxnId;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogAction {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub action: LogAction,
    pub transaction_id: TxnId,
}

/// Append-only audit trail of transaction boundaries, one JSON object per
/// line. It is read back only to resume id allocation and to close out
/// transactions a previous process left open; data is never replayed.
#[derive(Debug)]
pub struct TransactionLog {
    path: Option<PathBuf>,
}

impl TransactionLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn append(&self, action: LogAction, transaction_id: TxnId) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let record = LogRecord {
            timestamp: Utc::now().to_rfc3339(),
            action,
            transaction_id,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Every record in the log; empty when logging is off or nothing was
    /// written yet.
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}
