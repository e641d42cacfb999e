pub mod lock;
pub mod log;
pub mod manager;

pub use lock::{LockMode, LockTable};
pub use log::{LogAction, LogRecord, TransactionLog};
pub use manager::{Change, ChangeKind, TransactionManager, TxnStatus, UndoTarget};

pub type TxnId = u64;
