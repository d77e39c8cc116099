//! Namespaced, deadline-bounded handle on the remote store.
//!
//! Every map the filesystem touches lives under one namespace:
//!
//! - `{ns}/PATHS` - the shared path map, entry = absolute path, value = inode key text
//! - `{ns}/<InodeKey>` - one map per inode holding the `MODE`, `SIZE`, `CONT` registers

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crdtfs_store::{
    MapSnapshot, RemoteStore, StoreCapabilities, StoreError, StoreResult, Transaction,
};
use crdtfs_types::InodeKey;

/// Entry name of the path map inside a namespace.
pub const PATHS_MAP: &str = "PATHS";

/// Cloneable store handle shared by the path index and the inode store.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn RemoteStore>,
    namespace: Arc<str>,
    timeout: Option<Duration>,
}

impl StoreClient {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        namespace: impl AsRef<str>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            namespace: Arc::from(namespace.as_ref().trim_end_matches('/')),
            timeout,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Map key of the shared path map.
    pub fn paths_map(&self) -> String {
        format!("{}/{}", self.namespace, PATHS_MAP)
    }

    /// Map key of one inode's record.
    pub fn inode_map(&self, key: &InodeKey) -> String {
        format!("{}/{}", self.namespace, key)
    }

    pub fn capabilities(&self) -> StoreCapabilities {
        self.store.capabilities()
    }

    /// Read one map under the call deadline.
    pub async fn read_map(&self, map: &str) -> StoreResult<MapSnapshot> {
        self.deadline(self.store.read_map(map)).await
    }

    /// Commit a transaction under the call deadline. Empty transactions are
    /// not sent.
    pub async fn commit(&self, txn: Transaction) -> StoreResult<()> {
        if txn.is_empty() {
            return Ok(());
        }
        let ops = txn.len();
        self.deadline(self.store.commit(txn)).await?;
        tracing::trace!(ops, "committed");
        Ok(())
    }

    async fn deadline<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| StoreError::Timeout(limit))?,
            None => call.await,
        }
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crdtfs_store::MemoryStore;

    /// Store whose reads never finish.
    struct HangingStore;

    #[async_trait]
    impl RemoteStore for HangingStore {
        async fn read_map(&self, _map: &str) -> StoreResult<MapSnapshot> {
            std::future::pending().await
        }

        async fn commit(&self, _txn: Transaction) -> StoreResult<()> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_map_keys() {
        let client = StoreClient::new(Arc::new(MemoryStore::new()), "team/", None);
        assert_eq!(client.paths_map(), "team/PATHS");
        let key = InodeKey::directory();
        assert_eq!(client.inode_map(&key), format!("team/{}", key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_calls_time_out() {
        let client = StoreClient::new(
            Arc::new(HangingStore),
            "ns",
            Some(Duration::from_millis(200)),
        );
        let err = client.read_map("ns/PATHS").await.unwrap_err();
        assert_eq!(err, StoreError::Timeout(Duration::from_millis(200)));

        let mut txn = Transaction::new();
        txn.write("ns/PATHS", "/", "x");
        assert!(matches!(
            client.commit(txn).await,
            Err(StoreError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_commit_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let client = StoreClient::new(store.clone(), "ns", None);
        client.commit(Transaction::new()).await.unwrap();
        assert_eq!(store.stats().commits, 0);
    }
}
