//! In-process store.
//!
//! Used for tests and the shell. All data is ephemeral. Several filesystem
//! clients sharing one `Arc<MemoryStore>` behave like replicas of a single
//! store that each keep their own cached view.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{RemoteStore, StoreCapabilities};
use crate::txn::{Guard, Transaction, TxnOp};
use crate::value::{MapSnapshot, RegisterValue};

type Maps = HashMap<String, BTreeMap<String, RegisterValue>>;

/// Call counters, for tests and debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub reads: u64,
    pub commits: u64,
    pub rejected: u64,
}

/// In-memory transactional store.
///
/// Thread-safe via an internal `RwLock`. A commit validates its guards and
/// applies its operations under one write lock, so readers never see half a
/// transaction.
#[derive(Debug)]
pub struct MemoryStore {
    maps: RwLock<Maps>,
    reachable: AtomicBool,
    conditional_writes: bool,
    reads: AtomicU64,
    commits: AtomicU64,
    rejected: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store that honours `require_absent` guards.
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            conditional_writes: true,
            reads: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Create an empty store without conditional writes, like a plain
    /// add-wins/last-writer-wins store.
    pub fn without_conditional_writes() -> Self {
        Self {
            conditional_writes: false,
            ..Self::new()
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            reads: self.reads.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
        }
    }

    /// Number of non-empty maps currently stored.
    pub fn map_count(&self) -> usize {
        self.maps.read().len()
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(StoreError::Unreachable("memory store marked unreachable".into()))
        }
    }

    fn check_guards(maps: &Maps, guards: &[Guard]) -> StoreResult<()> {
        for guard in guards {
            match guard {
                Guard::Absent { map, entry } => {
                    let present = maps.get(map).is_some_and(|m| m.contains_key(entry));
                    if present {
                        return Err(StoreError::PreconditionFailed {
                            map: map.clone(),
                            entry: entry.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(maps: &mut Maps, ops: Vec<TxnOp>) {
        for op in ops {
            match op {
                TxnOp::Write { map, entry, value } => {
                    maps.entry(map).or_default().insert(entry, value);
                }
                TxnOp::Remove { map, entry } => {
                    if let Some(m) = maps.get_mut(&map) {
                        m.remove(&entry);
                        if m.is_empty() {
                            maps.remove(&map);
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_map(&self, map: &str) -> StoreResult<MapSnapshot> {
        self.check_reachable()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let maps = self.maps.read();
        let entries = maps.get(map).cloned().unwrap_or_default();
        Ok(MapSnapshot::new(map, entries))
    }

    async fn commit(&self, txn: Transaction) -> StoreResult<()> {
        self.check_reachable()?;
        let (ops, guards) = txn.into_parts();

        if !guards.is_empty() && !self.conditional_writes {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Aborted(
                "conditional writes are not supported by this store".into(),
            ));
        }

        let mut maps = self.maps.write();
        if let Err(e) = Self::check_guards(&maps, &guards) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }

        tracing::trace!(ops = ops.len(), guards = guards.len(), "memory store commit");
        Self::apply(&mut maps, ops);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            conditional_writes: self.conditional_writes,
        }
    }
}
