//! Query execution over a [`Catalog`](crate::storage::Catalog) and a
//! [`StorageEngine`](crate::storage::StorageEngine).
//!
//! Writes come in two steps: a `prepare_*`/`plan_*` call runs every check
//! and returns what will change, then an `apply_*` call writes it. A caller
//! running a transaction records the plan between the two.

mod constraints;
mod ddl;
mod dml;
mod join;
mod referential;
mod select;

pub use ddl::{create_table, drop_table, truncate_table};
pub use dml::{
    apply_delete, apply_insert, apply_update, plan_delete, plan_update, prepare_insert,
    prepare_insert_named, DeletePlan, MutationResult, UpdatePlan,
};
pub(crate) use dml::remove_locations;
pub use join::{join, JoinKind, JoinSpec};
pub use select::{matching_rows, select, OrderBy, Query};
