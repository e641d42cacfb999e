pub mod datatype;
pub mod value;

pub use datatype::DataType;
pub use value::Value;

/// A row is a vector of values, one per column
pub type Row = Vec<Value>;
