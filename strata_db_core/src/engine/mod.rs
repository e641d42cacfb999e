pub mod execute;
pub mod format;
pub mod predicate;

pub use execute::{JoinKind, JoinSpec, MutationResult, OrderBy, Query};
pub use format::ResultSet;
pub use predicate::{Comparison, Condition, Connector, Predicate, RowFilter};
