use std::fmt;

use crate::engine::predicate::resolve_column;
use crate::error::Result;
use crate::types::value::value_to_string;
use crate::types::{Row, Value};

/// Rows plus the names of their columns, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<Value>> {
        let idx = resolve_column(&self.columns, name, "result set")?;
        Ok(self.rows.iter().map(|r| r[idx].clone()).collect())
    }
}

/// Tab-separated header line, then one line per row.
impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.columns.join("\t"))?;
        for row in &self.rows {
            let line = row.iter().map(value_to_string).collect::<Vec<_>>().join("\t");
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}
