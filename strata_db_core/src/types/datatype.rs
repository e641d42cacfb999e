use std::fmt;

use crate::error::{DbError, Result};

/// Column types supported by the row codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    Date,
    String,
}

impl DataType {
    /// Fixed payload width of an encoded value of this type, in bytes.
    pub fn width(self) -> usize {
        match self {
            DataType::Integer => 4,
            DataType::Float => 4,
            DataType::Boolean => 1,
            DataType::Date => 10,
            DataType::String => 20,
        }
    }

    /// Width of a full column slot: presence byte plus payload.
    pub fn slot_width(self) -> usize {
        1 + self.width()
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::String => "STRING",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn parse_datatype(s: &str) -> Result<DataType> {
    match s.to_uppercase().as_str() {
        "INTEGER" | "INT" => Ok(DataType::Integer),
        "FLOAT" => Ok(DataType::Float),
        "BOOLEAN" | "BOOL" => Ok(DataType::Boolean),
        "DATE" => Ok(DataType::Date),
        "STRING" | "TEXT" => Ok(DataType::String),
        other => Err(DbError::InvalidArgument(format!(
            "Unknown type '{other}'. Use INTEGER|FLOAT|BOOLEAN|DATE|STRING"
        ))),
    }
}
