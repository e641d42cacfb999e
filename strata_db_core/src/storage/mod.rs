pub mod catalog;
pub mod codec;
pub mod disk;
pub mod engine;
pub mod heap;
pub mod index;
pub mod schema;

// Re-export main types for convenience
pub use catalog::{Catalog, TableDef};
pub use disk::DiskStorage;
pub use engine::StorageEngine;
pub use heap::HeapFile;
pub use index::ColumnIndex;
pub use schema::{Column, ForeignKey, ForeignKeyAction, Schema};
