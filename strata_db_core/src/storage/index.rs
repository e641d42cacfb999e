use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::types::datatype::parse_datatype;
use crate::types::value::{parse_value, value_to_string};
use crate::types::{DataType, Value};

/// Totally ordered f32 so floats can key an ordered map. `-0.0` and `0.0`
/// are the same key.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f32);

impl FloatKey {
    fn canonical(self) -> f32 {
        if self.0 == 0.0 { 0.0 } else { self.0 }
    }
}

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().total_cmp(&other.canonical())
    }
}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().to_bits().hash(state);
    }
}

/// Ordered key for a non-null column value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Integer(i32),
    Float(FloatKey),
    Boolean(bool),
    Date(NaiveDate),
    String(String),
}

impl IndexKey {
    /// NULL has no key; NULL values are never indexed.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Integer(n) => Some(IndexKey::Integer(*n)),
            Value::Float(x) => Some(IndexKey::Float(FloatKey(*x))),
            Value::Boolean(b) => Some(IndexKey::Boolean(*b)),
            Value::Date(d) => Some(IndexKey::Date(*d)),
            Value::String(s) => Some(IndexKey::String(s.clone())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            IndexKey::Integer(n) => Value::Integer(*n),
            IndexKey::Float(x) => Value::Float(x.0),
            IndexKey::Boolean(b) => Value::Boolean(*b),
            IndexKey::Date(d) => Value::Date(*d),
            IndexKey::String(s) => Value::String(s.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    column: String,
    data_type: String,
    location_type: String,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    locations: Vec<u64>,
}

const LOCATION_TYPE: &str = "u64";

/// Ordered map from one column's values to the heap locations holding them.
///
/// The map is read from its snapshot file the first time it is touched and
/// written back only by [`ColumnIndex::flush`]. Mutations between flushes
/// live in memory only, so a crash in between leaves a stale snapshot.
#[derive(Debug)]
pub struct ColumnIndex {
    column: String,
    data_type: DataType,
    path: PathBuf,
    entries: Option<BTreeMap<IndexKey, Vec<u64>>>,
    dirty: bool,
}

impl ColumnIndex {
    /// Handle on an index snapshot; nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>, column: impl Into<String>, data_type: DataType) -> Self {
        Self {
            column: column.into(),
            data_type,
            path: path.into(),
            entries: None,
            dirty: false,
        }
    }

    /// Writes an empty snapshot for a brand new column.
    pub fn create(path: impl Into<PathBuf>, column: impl Into<String>, data_type: DataType) -> Result<Self> {
        let mut idx = Self::new(path, column, data_type);
        idx.entries = Some(BTreeMap::new());
        idx.dirty = true;
        idx.flush()?;
        Ok(idx)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Loads the snapshot if needed. Does not validate locations against the
    /// heap; see [`ColumnIndex::validate`].
    pub fn load(&mut self) -> Result<()> {
        if self.entries.is_some() {
            return Ok(());
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot: IndexSnapshot = serde_json::from_str(&content)?;
        let dtype = parse_datatype(&snapshot.data_type)?;
        if dtype != self.data_type || snapshot.column != self.column {
            return Err(DbError::Decoding(format!(
                "Index snapshot for '{}' ({}) does not match column '{}' ({})",
                snapshot.column, snapshot.data_type, self.column, self.data_type
            )));
        }
        if snapshot.location_type != LOCATION_TYPE {
            return Err(DbError::Decoding(format!(
                "Unsupported index location type '{}'",
                snapshot.location_type
            )));
        }
        let mut map: BTreeMap<IndexKey, Vec<u64>> = BTreeMap::new();
        for entry in snapshot.entries {
            let value = parse_value(dtype, &entry.key)
                .map_err(|e| DbError::Decoding(format!("Bad index key '{}': {e}", entry.key)))?;
            let key = IndexKey::from_value(&value)
                .ok_or_else(|| DbError::Decoding("NULL key in index snapshot".to_string()))?;
            if entry.locations.is_empty() {
                return Err(DbError::Decoding("Index entry has no locations".to_string()));
            }
            if map.insert(key, entry.locations).is_some() {
                return Err(DbError::Decoding(format!("Duplicate key '{}' in index snapshot", entry.key)));
            }
        }
        debug!(column = %self.column, keys = map.len(), "loaded index snapshot");
        self.entries = Some(map);
        self.dirty = false;
        Ok(())
    }

    /// Fails if any location is not a whole row inside a heap of `heap_len`
    /// bytes.
    pub fn validate(&mut self, heap_len: u64, row_width: usize) -> Result<()> {
        for locs in self.map()?.values() {
            for loc in locs {
                if loc % row_width as u64 != 0 || loc + row_width as u64 > heap_len {
                    return Err(DbError::Decoding(format!("Index location {loc} is outside the heap")));
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: &Value, location: u64) -> Result<()> {
        let Some(k) = IndexKey::from_value(key) else {
            return Ok(());
        };
        let locs = self.map_mut()?.entry(k).or_default();
        if !locs.contains(&location) {
            locs.push(location);
            locs.sort_unstable();
        }
        self.dirty = true;
        Ok(())
    }

    /// Removes every location stored under `key`.
    pub fn delete(&mut self, key: &Value) -> Result<bool> {
        let Some(k) = IndexKey::from_value(key) else {
            return Ok(false);
        };
        let removed = self.map_mut()?.remove(&k).is_some();
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// Removes one location from `key`, dropping the key when it empties.
    pub fn delete_entry(&mut self, key: &Value, location: u64) -> Result<bool> {
        let Some(k) = IndexKey::from_value(key) else {
            return Ok(false);
        };
        let map = self.map_mut()?;
        let Some(locs) = map.get_mut(&k) else {
            return Ok(false);
        };
        let before = locs.len();
        locs.retain(|l| *l != location);
        let removed = locs.len() != before;
        if locs.is_empty() {
            map.remove(&k);
        }
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// First location holding `key`.
    pub fn search(&mut self, key: &Value) -> Result<Option<u64>> {
        Ok(self.search_all(key)?.first().copied())
    }

    pub fn search_all(&mut self, key: &Value) -> Result<Vec<u64>> {
        let Some(k) = IndexKey::from_value(key) else {
            return Ok(Vec::new());
        };
        Ok(self.map()?.get(&k).cloned().unwrap_or_default())
    }

    /// Locations whose keys fall in `[low, high]`, in key order. A missing
    /// bound leaves that side open.
    pub fn range(&mut self, low: Option<&Value>, high: Option<&Value>) -> Result<Vec<u64>> {
        let low = bound_for(low)?;
        let high = bound_for(high)?;
        if let (Bound::Included(l), Bound::Included(h)) = (&low, &high) {
            if l > h {
                return Ok(Vec::new());
            }
        }
        Ok(self
            .map()?
            .range((low, high))
            .flat_map(|(_, locs)| locs.iter().copied())
            .collect())
    }

    /// Number of (key, location) entries.
    pub fn len(&mut self) -> Result<usize> {
        Ok(self.map()?.values().map(Vec::len).sum())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.map()?.is_empty())
    }

    /// Replaces the whole map with `entries`.
    pub fn rebuild<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Value, u64)>,
    {
        let mut map: BTreeMap<IndexKey, Vec<u64>> = BTreeMap::new();
        for (value, location) in entries {
            if let Some(k) = IndexKey::from_value(&value) {
                map.entry(k).or_default().push(location);
            }
        }
        for locs in map.values_mut() {
            locs.sort_unstable();
            locs.dedup();
        }
        self.entries = Some(map);
        self.dirty = true;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries = Some(BTreeMap::new());
        self.dirty = true;
    }

    /// Writes the in-memory map back to its snapshot file if it changed.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(map) = &self.entries else {
            return Ok(());
        };
        let snapshot = IndexSnapshot {
            column: self.column.clone(),
            data_type: self.data_type.name().to_string(),
            location_type: LOCATION_TYPE.to_string(),
            entries: map
                .iter()
                .map(|(k, locs)| IndexEntry {
                    key: value_to_string(&k.to_value()),
                    locations: locs.clone(),
                })
                .collect(),
        };
        let payload = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.path, payload)?;
        self.dirty = false;
        debug!(column = %self.column, path = %self.path.display(), "flushed index snapshot");
        Ok(())
    }

    fn map(&mut self) -> Result<&BTreeMap<IndexKey, Vec<u64>>> {
        self.load()?;
        self.entries
            .as_ref()
            .ok_or_else(|| DbError::NotFound(format!("Index for column '{}'", self.column)))
    }

    fn map_mut(&mut self) -> Result<&mut BTreeMap<IndexKey, Vec<u64>>> {
        self.load()?;
        self.entries
            .as_mut()
            .ok_or_else(|| DbError::NotFound(format!("Index for column '{}'", self.column)))
    }
}

fn bound_for(value: Option<&Value>) -> Result<Bound<IndexKey>> {
    match value {
        None => Ok(Bound::Unbounded),
        Some(v) => IndexKey::from_value(v)
            .map(Bound::Included)
            .ok_or_else(|| DbError::InvalidArgument("NULL is not a valid range bound".to_string())),
    }
}
