//! The remote store trait.
//!
//! The filesystem only needs four things from the replicated store: read a
//! keyed map, assign registers, remove entries, and commit a batch of those
//! atomically. Reads are served from the replica's latest local state and
//! take no transaction.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::txn::Transaction;
use crate::value::{MapSnapshot, RegisterValue};

/// Optional features a store may offer beyond the required surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Commits honour [`Transaction::require_absent`] guards.
    pub conditional_writes: bool,
}

/// Client surface of an eventually-consistent, transactional CRDT store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ========================================================================
    // Required
    // ========================================================================

    /// Read every entry of a keyed map. Absent maps read as empty.
    async fn read_map(&self, map: &str) -> StoreResult<MapSnapshot>;

    /// Apply all staged operations of `txn` atomically, in staging order.
    ///
    /// Either every operation becomes visible or none does.
    async fn commit(&self, txn: Transaction) -> StoreResult<()>;

    /// Features this store supports.
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Assign several registers of one map in a single commit.
    async fn write_registers(
        &self,
        map: &str,
        entries: Vec<(String, RegisterValue)>,
    ) -> StoreResult<()> {
        let mut txn = Transaction::new();
        txn.write_all(map, entries);
        self.commit(txn).await
    }

    /// Remove one entry of a map in a single commit.
    async fn remove_entry(&self, map: &str, entry: &str) -> StoreResult<()> {
        let mut txn = Transaction::new();
        txn.remove(map, entry);
        self.commit(txn).await
    }
}
