//! Client-side transaction staging.
//!
//! A [`Transaction`] is a plain list of staged operations across any number
//! of maps. Nothing reaches the store until it is handed to
//! [`RemoteStore::commit`](crate::RemoteStore::commit), which applies all of
//! it or none of it.

use crate::value::RegisterValue;

/// One staged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOp {
    /// Assign a register.
    Write {
        map: String,
        entry: String,
        value: RegisterValue,
    },
    /// Remove an entry from a map.
    Remove { map: String, entry: String },
}

impl TxnOp {
    /// Map key this operation touches.
    pub fn map(&self) -> &str {
        match self {
            TxnOp::Write { map, .. } | TxnOp::Remove { map, .. } => map,
        }
    }

    /// Entry key this operation touches.
    pub fn entry(&self) -> &str {
        match self {
            TxnOp::Write { entry, .. } | TxnOp::Remove { entry, .. } => entry,
        }
    }
}

/// Guard checked at commit time, before any operation is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The entry must not be present in the map.
    Absent { map: String, entry: String },
}

/// Staged multi-key transaction.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    ops: Vec<TxnOp>,
    guards: Vec<Guard>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a register assignment.
    pub fn write(
        &mut self,
        map: impl Into<String>,
        entry: impl Into<String>,
        value: impl Into<RegisterValue>,
    ) -> &mut Self {
        self.ops.push(TxnOp::Write {
            map: map.into(),
            entry: entry.into(),
            value: value.into(),
        });
        self
    }

    /// Stage several register assignments in one map.
    pub fn write_all<I, K, V>(&mut self, map: &str, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RegisterValue>,
    {
        for (entry, value) in entries {
            self.write(map, entry, value);
        }
        self
    }

    /// Stage removal of an entry.
    pub fn remove(&mut self, map: impl Into<String>, entry: impl Into<String>) -> &mut Self {
        self.ops.push(TxnOp::Remove {
            map: map.into(),
            entry: entry.into(),
        });
        self
    }

    /// Require `map[entry]` to be absent when the transaction commits.
    ///
    /// Only honoured by stores whose capabilities report
    /// `conditional_writes`; others reject guarded transactions.
    pub fn require_absent(
        &mut self,
        map: impl Into<String>,
        entry: impl Into<String>,
    ) -> &mut Self {
        self.guards.push(Guard::Absent {
            map: map.into(),
            entry: entry.into(),
        });
        self
    }

    pub fn ops(&self) -> &[TxnOp] {
        &self.ops
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.guards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Split into staged operations and guards.
    pub fn into_parts(self) -> (Vec<TxnOp>, Vec<Guard>) {
        (self.ops, self.guards)
    }
}
