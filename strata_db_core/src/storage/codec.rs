//! Fixed-width binary encoding of column values.
//!
//! A column slot is one presence byte followed by the payload width of the
//! column's type. The presence byte is the explicit null flag: the payload
//! is never inspected to decide whether a value is NULL, so an all-zero
//! INTEGER stays a legitimate `0`. A NULL slot carries the reserved
//! [`NULL_SENTINEL`] in its payload so raw dumps of the heap stay readable.
//!
//! The sentinel is four bytes but payloads are not all four wide: wider
//! payloads repeat it, and a BOOLEAN payload holds only its first byte
//! (`N`). Only the presence byte decides NULL, so the shortened sentinel
//! is never ambiguous.

use chrono::NaiveDate;

use crate::error::{DbError, Result};
use crate::storage::schema::Column;
use crate::types::value::{coerce, DATE_FORMAT};
use crate::types::{DataType, Row, Value};

pub const NULL_SENTINEL: [u8; 4] = *b"NULL";

const SLOT_NULL: u8 = 0x00;
const SLOT_PRESENT: u8 = 0x01;

/// Encodes a non-null value into exactly `dtype.width()` bytes.
pub fn encode(dtype: DataType, value: &Value) -> Result<Vec<u8>> {
    let value = coerce(dtype, value.clone())?;
    let mut out = Vec::with_capacity(dtype.width());
    match value {
        Value::Null => {
            return Err(DbError::Encoding(
                "NULL has no payload encoding; use a NULL slot".to_string(),
            ))
        }
        Value::Integer(n) => out.extend_from_slice(&n.to_le_bytes()),
        Value::Float(x) => out.extend_from_slice(&x.to_le_bytes()),
        Value::Boolean(b) => out.push(u8::from(b)),
        Value::Date(d) => {
            let text = d.format(DATE_FORMAT).to_string();
            if text.len() != dtype.width() {
                return Err(DbError::Encoding(format!(
                    "Date '{text}' does not fit the {}-byte DATE layout",
                    dtype.width()
                )));
            }
            out.extend_from_slice(text.as_bytes());
        }
        Value::String(s) => {
            if s.as_bytes().contains(&0) {
                return Err(DbError::Encoding(
                    "STRING values may not contain NUL bytes".to_string(),
                ));
            }
            if s.len() > dtype.width() {
                return Err(DbError::Encoding(format!(
                    "STRING '{s}' is {} bytes, longer than the {}-byte column width",
                    s.len(),
                    dtype.width()
                )));
            }
            out.extend_from_slice(s.as_bytes());
            out.resize(dtype.width(), 0);
        }
    }
    Ok(out)
}

/// Decodes a payload produced by [`encode`].
pub fn decode(dtype: DataType, bytes: &[u8]) -> Result<Value> {
    if bytes.len() != dtype.width() {
        return Err(DbError::Decoding(format!(
            "{dtype} payload must be {} bytes, got {}",
            dtype.width(),
            bytes.len()
        )));
    }
    match dtype {
        DataType::Integer => {
            let raw: [u8; 4] = bytes
                .try_into()
                .map_err(|_| DbError::Decoding("Malformed INTEGER payload".to_string()))?;
            Ok(Value::Integer(i32::from_le_bytes(raw)))
        }
        DataType::Float => {
            let raw: [u8; 4] = bytes
                .try_into()
                .map_err(|_| DbError::Decoding("Malformed FLOAT payload".to_string()))?;
            Ok(Value::Float(f32::from_le_bytes(raw)))
        }
        DataType::Boolean => match bytes[0] {
            0 => Ok(Value::Boolean(false)),
            1 => Ok(Value::Boolean(true)),
            other => Err(DbError::Decoding(format!("Malformed BOOLEAN byte {other:#04x}"))),
        },
        DataType::Date => {
            let text = std::str::from_utf8(trim_padding(bytes))
                .map_err(|e| DbError::Decoding(format!("DATE payload is not UTF-8: {e}")))?;
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| DbError::Decoding(format!("Malformed DATE payload '{text}'")))
        }
        DataType::String => {
            let text = std::str::from_utf8(trim_padding(bytes))
                .map_err(|e| DbError::Decoding(format!("STRING payload is not UTF-8: {e}")))?;
            Ok(Value::String(text.to_string()))
        }
    }
}

/// Appends a full slot (presence byte + payload) for `value` to `out`.
pub fn encode_slot(dtype: DataType, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    if value.is_null() {
        out.push(SLOT_NULL);
        out.extend(NULL_SENTINEL.iter().cycle().take(dtype.width()));
        return Ok(());
    }
    out.push(SLOT_PRESENT);
    out.extend(encode(dtype, value)?);
    Ok(())
}

pub fn decode_slot(dtype: DataType, slot: &[u8]) -> Result<Value> {
    let (flag, payload) = slot
        .split_first()
        .ok_or_else(|| DbError::Decoding("Empty column slot".to_string()))?;
    match *flag {
        SLOT_NULL => Ok(Value::Null),
        SLOT_PRESENT => decode(dtype, payload),
        other => Err(DbError::Decoding(format!("Unknown slot flag {other:#04x}"))),
    }
}

pub fn row_width(columns: &[Column]) -> usize {
    columns.iter().map(|c| c.data_type.slot_width()).sum()
}

/// Encodes a full row laid out in column declaration order.
pub fn encode_row(columns: &[Column], row: &Row) -> Result<Vec<u8>> {
    if row.len() != columns.len() {
        return Err(DbError::Encoding(format!(
            "Row has {} values but the table has {} columns",
            row.len(),
            columns.len()
        )));
    }
    let mut out = Vec::with_capacity(row_width(columns));
    for (col, value) in columns.iter().zip(row) {
        encode_slot(col.data_type, value, &mut out)?;
    }
    Ok(out)
}

pub fn decode_row(columns: &[Column], bytes: &[u8]) -> Result<Row> {
    let width = row_width(columns);
    if bytes.len() != width {
        return Err(DbError::Decoding(format!(
            "Row must be {width} bytes, got {}",
            bytes.len()
        )));
    }
    let mut row = Vec::with_capacity(columns.len());
    let mut offset = 0;
    for col in columns {
        let end = offset + col.data_type.slot_width();
        row.push(decode_slot(col.data_type, &bytes[offset..end])?);
        offset = end;
    }
    Ok(row)
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}
