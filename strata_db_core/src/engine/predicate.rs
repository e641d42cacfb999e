//! Row predicates for select, join, update and delete.
//!
//! A [`Predicate`] is a flat chain of conditions joined by AND/OR and folded
//! strictly left to right: `a OR b AND c` means `(a OR b) AND c`. Each
//! condition may carry a leading NOT. Any comparison against a NULL cell is
//! false before negation; use [`Comparison::IsNull`] to test for NULL.

use std::cmp::Ordering;

use crate::error::{DbError, Result};
use crate::types::value::{coerce, compare_values};
use crate::types::{DataType, Row, Value};

/// Anything that can decide whether a row belongs in a result. `columns`
/// names the row's values positionally (qualified `table.column` for joins).
pub trait RowFilter {
    fn matches(&self, columns: &[String], row: &Row) -> Result<bool>;

    /// `(column, value)` when the filter is a single equality that an index
    /// can answer.
    fn point_lookup(&self) -> Option<(&str, &Value)> {
        None
    }
}

impl<F> RowFilter for F
where
    F: Fn(&[String], &Row) -> Result<bool>,
{
    fn matches(&self, columns: &[String], row: &Row) -> Result<bool> {
        self(columns, row)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    /// Inclusive on both ends.
    Between(Value, Value),
    /// `%` matches any run of characters, `_` exactly one.
    Like(String),
    In(Vec<Value>),
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparison: Comparison,
    pub negated: bool,
}

impl Condition {
    pub fn new(column: impl Into<String>, comparison: Comparison) -> Self {
        Self {
            column: column.into(),
            comparison,
            negated: false,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Eq(value.into()))
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Ne(value.into()))
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Lt(value.into()))
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Le(value.into()))
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Gt(value.into()))
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Ge(value.into()))
    }

    pub fn between(column: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::new(column, Comparison::Between(low.into(), high.into()))
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, Comparison::Like(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(column, Comparison::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, Comparison::IsNull)
    }

    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn evaluate(&self, columns: &[String], row: &Row) -> Result<bool> {
        let idx = resolve_column(columns, &self.column, "WHERE")?;
        let cell = row.get(idx).ok_or_else(|| {
            DbError::InvalidArgument(format!("Row has no value for column '{}'", self.column))
        })?;
        let hit = self.test(cell)?;
        Ok(hit != self.negated)
    }

    fn test(&self, cell: &Value) -> Result<bool> {
        if let Comparison::IsNull = self.comparison {
            return Ok(cell.is_null());
        }
        if cell.is_null() {
            return Ok(false);
        }
        match &self.comparison {
            Comparison::Eq(v) => Ok(self.order(cell, v)? == Some(Ordering::Equal)),
            Comparison::Ne(v) => Ok(matches!(self.order(cell, v)?, Some(o) if o != Ordering::Equal)),
            Comparison::Lt(v) => Ok(self.order(cell, v)? == Some(Ordering::Less)),
            Comparison::Le(v) => Ok(matches!(self.order(cell, v)?, Some(Ordering::Less | Ordering::Equal))),
            Comparison::Gt(v) => Ok(self.order(cell, v)? == Some(Ordering::Greater)),
            Comparison::Ge(v) => Ok(matches!(
                self.order(cell, v)?,
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Comparison::Between(low, high) => {
                let above = matches!(self.order(cell, low)?, Some(Ordering::Greater | Ordering::Equal));
                let below = matches!(self.order(cell, high)?, Some(Ordering::Less | Ordering::Equal));
                Ok(above && below)
            }
            Comparison::Like(pattern) => match cell {
                Value::String(text) => Ok(like_match(text, pattern)),
                _ => Err(DbError::InvalidArgument(format!(
                    "LIKE is only valid for STRING columns, '{}' is not one",
                    self.column
                ))),
            },
            Comparison::In(values) => {
                for v in values {
                    if self.order(cell, v)? == Some(Ordering::Equal) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Comparison::IsNull => Ok(false),
        }
    }

    /// Compares a non-null cell with a literal, converting the literal to
    /// the cell's type first. `None` when the literal is NULL.
    fn order(&self, cell: &Value, literal: &Value) -> Result<Option<Ordering>> {
        if literal.is_null() {
            return Ok(None);
        }
        let literal = align_literal(cell, literal).map_err(|e| {
            DbError::InvalidArgument(format!("Cannot compare column '{}': {e}", self.column))
        })?;
        compare_values(cell, &literal).map(Some).ok_or_else(|| {
            DbError::InvalidArgument(format!(
                "Type mismatch comparing column '{}' with '{}'",
                self.column, literal
            ))
        })
    }
}

fn align_literal(cell: &Value, literal: &Value) -> Result<Value> {
    let numeric = |v: &Value| matches!(v.data_type(), Some(DataType::Integer | DataType::Float));
    match cell.data_type() {
        Some(dtype) if literal.data_type() != Some(dtype) && !(numeric(cell) && numeric(literal)) => {
            coerce(dtype, literal.clone())
        }
        _ => Ok(literal.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    first: Condition,
    rest: Vec<(Connector, Condition)>,
}

impl Predicate {
    pub fn new(first: Condition) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    pub fn and(mut self, cond: Condition) -> Self {
        self.rest.push((Connector::And, cond));
        self
    }

    pub fn or(mut self, cond: Condition) -> Self {
        self.rest.push((Connector::Or, cond));
        self
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, c)| c))
    }

    /// Every condition is evaluated, so an unknown column fails even when
    /// the outcome is already decided.
    pub fn evaluate(&self, columns: &[String], row: &Row) -> Result<bool> {
        let mut acc = self.first.evaluate(columns, row)?;
        for (connector, cond) in &self.rest {
            let next = cond.evaluate(columns, row)?;
            acc = match connector {
                Connector::And => acc && next,
                Connector::Or => acc || next,
            };
        }
        Ok(acc)
    }
}

impl From<Condition> for Predicate {
    fn from(cond: Condition) -> Self {
        Predicate::new(cond)
    }
}

impl RowFilter for Predicate {
    fn matches(&self, columns: &[String], row: &Row) -> Result<bool> {
        self.evaluate(columns, row)
    }

    fn point_lookup(&self) -> Option<(&str, &Value)> {
        match (&self.first, self.rest.is_empty()) {
            (
                Condition {
                    column,
                    comparison: Comparison::Eq(value),
                    negated: false,
                },
                true,
            ) if !value.is_null() => Some((column.as_str(), value)),
            _ => None,
        }
    }
}

/// Finds `name` among `columns`: an exact match first, else a unique
/// `table.name` suffix match.
pub fn resolve_column(columns: &[String], name: &str, clause: &str) -> Result<usize> {
    if let Some(idx) = columns.iter().position(|c| c == name) {
        return Ok(idx);
    }
    if name.contains('.') {
        return Err(DbError::NotFound(format!("Column '{name}' in {clause}")));
    }

    let suffix = format!(".{name}");
    let matches: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.ends_with(&suffix))
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(DbError::NotFound(format!("Column '{name}' in {clause}"))),
        _ => Err(DbError::InvalidArgument(format!(
            "Ambiguous column '{name}' in {clause}. Use qualified name table.column"
        ))),
    }
}

/// SQL LIKE matching: '%' => zero or more characters, '_' => exactly one.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text_chars: Vec<char> = text.chars().collect();
    let pat_chars: Vec<char> = pattern.chars().collect();

    let t_len = text_chars.len();
    let p_len = pat_chars.len();

    let mut dp = vec![vec![false; p_len + 1]; t_len + 1];
    dp[0][0] = true;

    for j in 1..=p_len {
        if pat_chars[j - 1] == '%' {
            dp[0][j] = dp[0][j - 1];
        }
    }

    for i in 1..=t_len {
        for j in 1..=p_len {
            dp[i][j] = match pat_chars[j - 1] {
                '%' => dp[i][j - 1] || dp[i - 1][j],
                '_' => dp[i - 1][j - 1],
                ch => dp[i - 1][j - 1] && text_chars[i - 1] == ch,
            };
        }
    }

    dp[t_len][p_len]
}
