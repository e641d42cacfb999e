use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;

use crate::error::{DbError, Result};
use crate::types::datatype::DataType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i32),
    Float(f32),
    Boolean(bool),
    Date(NaiveDate),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Date(_) => Some(DataType::Date),
            Value::String(_) => Some(DataType::String),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&value_to_string(self))
    }
}

/// Parses the textual form of a value of `dtype`.
pub fn parse_value(dtype: DataType, token: &str) -> Result<Value> {
    match dtype {
        DataType::Integer => token
            .trim()
            .parse::<i32>()
            .map(Value::Integer)
            .map_err(|_| DbError::Encoding(format!("Expected INTEGER but got '{token}'"))),
        DataType::Float => token
            .trim()
            .parse::<f32>()
            .map(|x| Value::Float(if x == 0.0 { 0.0 } else { x }))
            .map_err(|_| DbError::Encoding(format!("Expected FLOAT but got '{token}'"))),
        DataType::Boolean => parse_bool(token).map(Value::Boolean),
        DataType::Date => NaiveDate::parse_from_str(token.trim(), DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| DbError::Encoding(format!("Expected DATE YYYY-MM-DD but got '{token}'"))),
        DataType::String => Ok(Value::String(token.to_string())),
    }
}

/// Converts `value` into the representation `dtype` stores. NULL passes
/// through untouched; NOT NULL is the caller's concern.
pub fn coerce(dtype: DataType, value: Value) -> Result<Value> {
    match (dtype, value) {
        (_, Value::Null) => Ok(Value::Null),
        (DataType::Integer, Value::Integer(n)) => Ok(Value::Integer(n)),
        (DataType::Integer, Value::Float(x)) => {
            // i32::MAX rounds up to 2^31 as f32, so compare in f64
            let wide = f64::from(x);
            if x.fract() == 0.0 && wide >= f64::from(i32::MIN) && wide <= f64::from(i32::MAX) {
                Ok(Value::Integer(x as i32))
            } else {
                Err(DbError::Encoding(format!("Expected INTEGER but got float {x}")))
            }
        }
        (DataType::Integer, Value::Boolean(b)) => Ok(Value::Integer(i32::from(b))),
        // -0.0 is stored as 0.0 so the two never coexist under a key
        (DataType::Float, Value::Float(x)) => Ok(Value::Float(if x == 0.0 { 0.0 } else { x })),
        (DataType::Float, Value::Integer(n)) => Ok(Value::Float(n as f32)),
        (DataType::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(b)),
        (DataType::Boolean, Value::Integer(0)) => Ok(Value::Boolean(false)),
        (DataType::Boolean, Value::Integer(1)) => Ok(Value::Boolean(true)),
        (DataType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (DataType::String, Value::String(s)) => Ok(Value::String(s)),
        (DataType::String, other) => Ok(Value::String(value_to_string(&other))),
        (dtype, Value::String(s)) => parse_value(dtype, &s),
        (dtype, other) => Err(DbError::Encoding(format!(
            "Cannot store {} value '{}' in a {dtype} column",
            other.data_type().map_or("NULL", DataType::name),
            value_to_string(&other)
        ))),
    }
}

pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        Value::String(s) => s.clone(),
    }
}

/// Orders two non-null values of compatible types. Integers and floats
/// compare numerically with each other; anything else mismatched, or any
/// NULL, yields `None`.
pub fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => Some(cmp_f32(*a, *b)),
        (Value::Integer(a), Value::Float(b)) => Some(cmp_f32(*a as f32, *b)),
        (Value::Float(a), Value::Integer(b)) => Some(cmp_f32(*a, *b as f32)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Numeric order with `-0.0 == 0.0`; NaN falls back to the total order.
fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

fn parse_bool(token: &str) -> Result<bool> {
    match token.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(DbError::Encoding(format!("Expected BOOLEAN but got '{token}'"))),
    }
}
