//! Path index: the shared path → inode-key map and its local snapshot.
//!
//! All existence checks, type checks and listings are answered from an
//! immutable [`PathSnapshot`] held behind `RwLock<Arc<_>>`. A refresh reads the
//! whole path map, builds a new snapshot off-lock and swaps the `Arc` in one
//! step, so readers either see the old map or the new one, never a mix.
//!
//! A failed refresh leaves the current snapshot in place.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crdtfs_store::{RegisterValue, Transaction};
use crdtfs_types::{InodeKey, path};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::remote::StoreClient;
use crate::vfs::FsResult;

/// Immutable point-in-time copy of the path map.
#[derive(Debug, Clone)]
pub struct PathSnapshot {
    entries: BTreeMap<String, InodeKey>,
    fetched_at: Option<Instant>,
    generation: u64,
    skipped: usize,
}

impl PathSnapshot {
    /// A snapshot that has never been fetched.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            fetched_at: None,
            generation: 0,
            skipped: 0,
        }
    }

    fn fetched(entries: BTreeMap<String, InodeKey>, generation: u64, skipped: usize) -> Self {
        Self {
            entries,
            fetched_at: Some(Instant::now()),
            generation,
            skipped,
        }
    }

    /// Exact-match lookup.
    pub fn lookup(&self, path: &str) -> Option<&InodeKey> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InodeKey)> {
        self.entries.iter().map(|(p, k)| (p.as_str(), k))
    }

    /// Refresh generation that produced this snapshot; 0 if never fetched.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time since the snapshot was read from the store.
    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.map(|at| at.elapsed())
    }

    /// Path-map entries dropped because their value was not a valid inode key.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Immediate children of `dir` as `(name, key)` pairs, in path order.
    pub fn children<'a>(&'a self, dir: &str) -> Vec<(&'a str, &'a InodeKey)> {
        let prefix = path::child_prefix(dir);
        self.entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter_map(|(p, k)| {
                let name = &p[prefix.len()..];
                (!name.is_empty() && !name.contains(path::SEPARATOR)).then_some((name, k))
            })
            .collect()
    }

    /// Every strict descendant of `dir` as `(path, key)` pairs, in path order.
    pub fn descendants<'a>(&'a self, dir: &str) -> Vec<(&'a str, &'a InodeKey)> {
        let prefix = path::child_prefix(dir);
        self.entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| p.len() > prefix.len())
            .map(|(p, k)| (p.as_str(), k))
            .collect()
    }

    /// Returns true if anything lives below `dir`.
    pub fn has_children(&self, dir: &str) -> bool {
        let prefix = path::child_prefix(dir);
        self.entries
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(p, _)| p.starts_with(&prefix))
            .any(|(p, _)| p.len() > prefix.len())
    }
}

/// Counters describing refresh activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub refreshes: u64,
    pub failures: u64,
    pub entries: usize,
    pub generation: u64,
}

/// Owner of the path map and its cached snapshot.
pub struct PathIndex {
    client: StoreClient,
    snapshot: RwLock<Arc<PathSnapshot>>,
    next_generation: AtomicU64,
    refreshes: AtomicU64,
    failures: AtomicU64,
}

impl PathIndex {
    pub fn new(client: StoreClient) -> Self {
        Self {
            client,
            snapshot: RwLock::new(Arc::new(PathSnapshot::empty())),
            next_generation: AtomicU64::new(1),
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &StoreClient {
        &self.client
    }

    /// Re-read the whole path map and install it as the current snapshot.
    ///
    /// Returns the number of entries in the new snapshot. On failure the
    /// previous snapshot stays in use and the error is returned.
    pub async fn refresh(&self) -> FsResult<usize> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let map = self.client.paths_map();

        let fetched = match self.client.read_map(&map).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let age_ms = self.snapshot().age().map(|a| a.as_millis() as u64);
                tracing::warn!(error = %e, ?age_ms, "path map refresh failed; keeping stale snapshot");
                return Err(e.into());
            }
        };

        let mut entries = BTreeMap::new();
        let mut skipped = 0;
        for (entry, value) in fetched.iter() {
            match decode_entry(value) {
                Some(key) => {
                    entries.insert(entry.to_string(), key);
                }
                None => {
                    skipped += 1;
                    tracing::warn!(path = entry, value = ?value, "skipping undecodable path entry");
                }
            }
        }

        let count = entries.len();
        let next = Arc::new(PathSnapshot::fetched(entries, generation, skipped));
        {
            let mut current = self.snapshot.write();
            // A slower refresh that started earlier must not replace a newer one.
            if current.generation > generation {
                tracing::debug!(generation, installed = current.generation, "discarding out-of-order refresh");
                return Ok(current.len());
            }
            *current = next;
        }
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(entries = count, generation, "path map refreshed");
        Ok(count)
    }

    /// The current snapshot. Cheap; holds the lock only to clone the `Arc`.
    pub fn snapshot(&self) -> Arc<PathSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn lookup(&self, path: &str) -> Option<InodeKey> {
        self.snapshot().lookup(path).copied()
    }

    /// Type from the key tag; never touches the store.
    pub fn is_directory(&self, key: &InodeKey) -> bool {
        key.is_dir()
    }

    /// Names of the immediate children of `dir`.
    pub fn list_children(&self, dir: &str) -> Vec<String> {
        self.snapshot()
            .children(dir)
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn parent_of<'a>(&self, path: &'a str) -> &'a str {
        path::parent_of(path)
    }

    /// Stage `path → key` in the path map.
    pub fn stage_insert(&self, txn: &mut Transaction, path: &str, key: &InodeKey) {
        txn.write(self.client.paths_map(), path, key.to_string());
    }

    /// Stage removal of `path` from the path map.
    pub fn stage_remove(&self, txn: &mut Transaction, path: &str) {
        txn.remove(self.client.paths_map(), path);
    }

    /// Require `path` to be absent from the path map at commit.
    pub fn stage_guard_absent(&self, txn: &mut Transaction, path: &str) {
        txn.require_absent(self.client.paths_map(), path);
    }

    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        IndexStats {
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries: snapshot.len(),
            generation: snapshot.generation(),
        }
    }
}

fn decode_entry(value: &RegisterValue) -> Option<InodeKey> {
    value.as_text()?.parse().ok()
}
