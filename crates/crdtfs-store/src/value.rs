//! Register values and map snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Value held by one register inside a keyed map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterValue {
    /// UTF-8 text (path entries hold inode keys).
    Text(String),
    /// Integer register (mode, size).
    Int(i64),
    /// Opaque bytes (file content).
    Bytes(Vec<u8>),
}

impl RegisterValue {
    /// Short name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            RegisterValue::Text(_) => "text",
            RegisterValue::Int(_) => "int",
            RegisterValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RegisterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RegisterValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RegisterValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<String> for RegisterValue {
    fn from(s: String) -> Self {
        RegisterValue::Text(s)
    }
}

impl From<&str> for RegisterValue {
    fn from(s: &str) -> Self {
        RegisterValue::Text(s.to_string())
    }
}

impl From<i64> for RegisterValue {
    fn from(n: i64) -> Self {
        RegisterValue::Int(n)
    }
}

impl From<Vec<u8>> for RegisterValue {
    fn from(b: Vec<u8>) -> Self {
        RegisterValue::Bytes(b)
    }
}

/// Point-in-time copy of one keyed map, ordered by entry key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapSnapshot {
    map: String,
    entries: BTreeMap<String, RegisterValue>,
}

impl MapSnapshot {
    /// Build a snapshot of `map` from its entries.
    pub fn new(map: impl Into<String>, entries: BTreeMap<String, RegisterValue>) -> Self {
        Self {
            map: map.into(),
            entries,
        }
    }

    /// Key of the map this snapshot was read from.
    pub fn map_key(&self) -> &str {
        &self.map
    }

    pub fn get(&self, entry: &str) -> Option<&RegisterValue> {
        self.entries.get(entry)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read an integer register, `None` if absent.
    pub fn get_int(&self, entry: &str) -> StoreResult<Option<i64>> {
        self.typed(entry, "int", RegisterValue::as_int)
    }

    /// Read a bytes register, `None` if absent.
    pub fn get_bytes(&self, entry: &str) -> StoreResult<Option<&[u8]>> {
        self.typed(entry, "bytes", RegisterValue::as_bytes)
    }

    /// Read a text register, `None` if absent.
    pub fn get_text(&self, entry: &str) -> StoreResult<Option<&str>> {
        self.typed(entry, "text", RegisterValue::as_text)
    }

    fn typed<'a, T>(
        &'a self,
        entry: &str,
        expected: &'static str,
        extract: impl Fn(&'a RegisterValue) -> Option<T>,
    ) -> StoreResult<Option<T>> {
        match self.entries.get(entry) {
            None => Ok(None),
            Some(value) => extract(value)
                .map(Some)
                .ok_or_else(|| StoreError::TypeMismatch {
                    map: self.map.clone(),
                    entry: entry.to_string(),
                    expected,
                    found: value.type_name(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MapSnapshot {
        let mut entries = BTreeMap::new();
        entries.insert("SIZE".to_string(), RegisterValue::Int(5));
        entries.insert("CONT".to_string(), RegisterValue::Bytes(b"hello".to_vec()));
        MapSnapshot::new("ns/FILE_x", entries)
    }

    #[test]
    fn test_typed_reads() {
        let snap = snapshot();
        assert_eq!(snap.get_int("SIZE").unwrap(), Some(5));
        assert_eq!(snap.get_bytes("CONT").unwrap(), Some(&b"hello"[..]));
        assert_eq!(snap.get_int("MODE").unwrap(), None);
    }

    #[test]
    fn test_type_mismatch() {
        let snap = snapshot();
        let err = snap.get_text("SIZE").unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                expected: "text",
                found: "int",
                ..
            }
        ));
        assert_eq!(err.to_string(), "type mismatch at ns/FILE_x[SIZE]: expected text, found int");
    }

    #[test]
    fn test_iter_is_key_ordered() {
        let snap = snapshot();
        let keys: Vec<_> = snap.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["CONT", "SIZE"]);
    }
}
