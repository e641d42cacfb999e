use thiserror::Error;

use crate::transaction::TxnId;

/// Every failure the engine reports. All of them are recoverable by the
/// caller; the engine never aborts the process on its own.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Referential integrity error: {0}")]
    ReferentialIntegrity(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Lock conflict: transaction {txn} cannot lock '{resource}'")]
    LockConflict { txn: TxnId, resource: String },

    #[error("No active transaction with id {0}")]
    NoActiveTransaction(TxnId),

    #[error("Corrupt row at offset {location}: {reason}")]
    CorruptRow { location: u64, reason: String },

    #[error("Undo failed: {0}")]
    UndoFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
