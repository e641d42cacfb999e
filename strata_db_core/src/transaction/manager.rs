use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::lock::{LockMode, LockTable};
use super::log::{LogAction, TransactionLog};
use super::TxnId;
use crate::error::{DbError, Result};
use crate::types::Row;

pub const LOG_FILE: &str = "transaction.log";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One mutation recorded before it is applied, carrying what is needed to
/// reverse it.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert { table: String, values: Row },
    /// `(old, new)` per updated row.
    Update { table: String, rows: Vec<(Row, Row)> },
    Delete { table: String, rows: Vec<Row> },
}

impl Change {
    pub fn table(&self) -> &str {
        match self {
            Change::Insert { table, .. } | Change::Update { table, .. } | Change::Delete { table, .. } => {
                table
            }
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert { .. } => ChangeKind::Insert,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
        }
    }
}

/// Whatever owns the data a transaction touched. `abort` hands it each
/// recorded change, newest first, to reverse.
pub trait UndoTarget {
    fn undo(&mut self, change: &Change) -> Result<()>;
}

#[derive(Debug)]
struct Transaction {
    start_time: DateTime<Utc>,
    status: TxnStatus,
    changes: Vec<Change>,
}

#[derive(Debug)]
struct State {
    next_id: TxnId,
    transactions: HashMap<TxnId, Transaction>,
    locks: LockTable,
}

impl State {
    fn active_mut(&mut self, id: TxnId) -> Result<&mut Transaction> {
        match self.transactions.get_mut(&id) {
            Some(t) if t.status == TxnStatus::Active => Ok(t),
            _ => Err(DbError::NoActiveTransaction(id)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    timestamp: String,
    next_transaction_id: TxnId,
    active_transactions: Vec<CheckpointEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointEntry {
    transaction_id: TxnId,
    start_time: String,
    status: TxnStatus,
}

/// Tracks transactions, the table lock table and per-transaction undo
/// logs. Every operation runs inside one critical section over that state,
/// so the manager can be shared between threads behind an `Arc`.
#[derive(Debug)]
pub struct TransactionManager {
    state: Mutex<State>,
    log: TransactionLog,
    checkpoint_path: Option<PathBuf>,
}

impl TransactionManager {
    /// Manager with no log and no checkpoint file.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                transactions: HashMap::new(),
                locks: LockTable::new(),
            }),
            log: TransactionLog::disabled(),
            checkpoint_path: None,
        }
    }

    /// Opens the manager for a database directory. Id allocation resumes
    /// after the highest id seen in the log or checkpoint; transactions a
    /// previous process left open are closed out with a ROLLBACK record.
    pub fn open(dir: &Path, log_enabled: bool) -> Result<Self> {
        let log = if log_enabled {
            TransactionLog::open(dir.join(LOG_FILE))
        } else {
            TransactionLog::disabled()
        };
        let checkpoint_path = dir.join(CHECKPOINT_FILE);

        let mut next_id: TxnId = 1;
        let mut open_ids: BTreeSet<TxnId> = BTreeSet::new();
        if checkpoint_path.exists() {
            let content = fs::read_to_string(&checkpoint_path)?;
            let checkpoint: CheckpointFile = serde_json::from_str(&content)?;
            next_id = next_id.max(checkpoint.next_transaction_id);
            open_ids.extend(
                checkpoint
                    .active_transactions
                    .iter()
                    .filter(|t| t.status == TxnStatus::Active)
                    .map(|t| t.transaction_id),
            );
        }
        for record in log.records()? {
            next_id = next_id.max(record.transaction_id + 1);
            match record.action {
                LogAction::Begin => {
                    open_ids.insert(record.transaction_id);
                }
                LogAction::Commit | LogAction::Rollback => {
                    open_ids.remove(&record.transaction_id);
                }
            }
        }
        for id in &open_ids {
            warn!(transaction_id = id, "closing transaction left open by a previous process");
            log.append(LogAction::Rollback, *id)?;
            next_id = next_id.max(id + 1);
        }

        Ok(Self {
            state: Mutex::new(State {
                next_id,
                transactions: HashMap::new(),
                locks: LockTable::new(),
            }),
            log,
            checkpoint_path: Some(checkpoint_path),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn begin(&self) -> Result<TxnId> {
        let mut state = self.state();
        let id = state.next_id;
        self.log.append(LogAction::Begin, id)?;
        state.next_id += 1;
        state.transactions.insert(
            id,
            Transaction {
                start_time: Utc::now(),
                status: TxnStatus::Active,
                changes: Vec::new(),
            },
        );
        info!(transaction_id = id, "transaction started");
        Ok(id)
    }

    /// `Ok(false)` means the lock conflicts with another transaction; it is
    /// never an error, and the request is not queued.
    pub fn acquire_lock(&self, id: TxnId, resource: &str, mode: LockMode) -> Result<bool> {
        let mut state = self.state();
        state.active_mut(id)?;
        let granted = state.locks.acquire(id, resource, mode);
        debug!(transaction_id = id, resource, %mode, granted, "lock request");
        Ok(granted)
    }

    pub fn release_lock(&self, id: TxnId, resource: &str) -> Result<bool> {
        let mut state = self.state();
        state.active_mut(id)?;
        Ok(state.locks.release(id, resource))
    }

    pub fn lock_mode(&self, id: TxnId, resource: &str) -> Option<LockMode> {
        self.state().locks.mode_held(id, resource)
    }

    /// Appends a change to the transaction's undo log.
    pub fn record(&self, id: TxnId, change: Change) -> Result<()> {
        let mut state = self.state();
        state.active_mut(id)?.changes.push(change);
        Ok(())
    }

    /// Drops the newest change, for a write that failed after recording.
    pub fn discard_last(&self, id: TxnId) -> Result<Option<Change>> {
        let mut state = self.state();
        Ok(state.active_mut(id)?.changes.pop())
    }

    pub fn changes(&self, id: TxnId) -> Result<Vec<Change>> {
        let mut state = self.state();
        Ok(state.active_mut(id)?.changes.clone())
    }

    /// Makes the transaction's writes final. They are already in the heap;
    /// commit checks that every written table is held EXCLUSIVE, then
    /// releases the locks. Returns the tables the transaction wrote.
    pub fn commit(&self, id: TxnId) -> Result<Vec<String>> {
        let mut state = self.state();
        let written: BTreeSet<String> = state
            .active_mut(id)?
            .changes
            .iter()
            .map(|c| c.table().to_string())
            .collect();
        for table in &written {
            if state.locks.mode_held(id, table) != Some(LockMode::Exclusive) {
                return Err(DbError::LockConflict {
                    txn: id,
                    resource: table.clone(),
                });
            }
        }
        self.log.append(LogAction::Commit, id)?;
        state.locks.release_all(id);
        let txn = state.active_mut(id)?;
        txn.status = TxnStatus::Committed;
        txn.changes.clear();
        info!(transaction_id = id, tables = written.len(), "transaction committed");
        Ok(written.into_iter().collect())
    }

    /// Reverses the transaction's changes newest first through `target`.
    ///
    /// If one undo step fails the transaction stays ACTIVE with that change
    /// and everything older still recorded, locks held, and the error is
    /// returned as `UndoFailed` so the caller can retry.
    pub fn abort(&self, id: TxnId, target: &mut dyn UndoTarget) -> Result<()> {
        let mut state = self.state();
        let txn = state.active_mut(id)?;
        while let Some(change) = txn.changes.last() {
            if let Err(e) = target.undo(change) {
                return Err(DbError::UndoFailed(format!(
                    "transaction {id}: reversing {:?} on '{}' failed: {e}",
                    change.kind(),
                    change.table()
                )));
            }
            txn.changes.pop();
        }
        self.log.append(LogAction::Rollback, id)?;
        state.locks.release_all(id);
        let txn = state.active_mut(id)?;
        txn.status = TxnStatus::Aborted;
        info!(transaction_id = id, "transaction aborted");
        Ok(())
    }

    pub fn status(&self, id: TxnId) -> Option<TxnStatus> {
        self.state().transactions.get(&id).map(|t| t.status)
    }

    pub fn is_active(&self, id: TxnId) -> bool {
        self.status(id) == Some(TxnStatus::Active)
    }

    pub fn active_transactions(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self
            .state()
            .transactions
            .iter()
            .filter(|(_, t)| t.status == TxnStatus::Active)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Writes the checkpoint file: next id plus the active transactions.
    pub fn checkpoint(&self) -> Result<()> {
        let Some(path) = &self.checkpoint_path else {
            return Ok(());
        };
        let state = self.state();
        let mut active: Vec<CheckpointEntry> = state
            .transactions
            .iter()
            .filter(|(_, t)| t.status == TxnStatus::Active)
            .map(|(id, t)| CheckpointEntry {
                transaction_id: *id,
                start_time: t.start_time.to_rfc3339(),
                status: t.status,
            })
            .collect();
        active.sort_by_key(|e| e.transaction_id);
        let file = CheckpointFile {
            timestamp: Utc::now().to_rfc3339(),
            next_transaction_id: state.next_id,
            active_transactions: active,
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        debug!(path = %path.display(), "wrote transaction checkpoint");
        Ok(())
    }
}
