//! Structural operations over the path index and inode store.
//!
//! Every operation that changes the path → key mapping runs the same way:
//! check preconditions against the current snapshot, stage all path-map and
//! inode writes into one [`Transaction`], commit, then refresh the snapshot so
//! the caller's own change is visible immediately.
//!
//! Concurrent structural operations from different replicas are not mutually
//! excluded. Each commit is atomic over the keys it touches; everything else
//! is left to the store's merge rules.

use std::sync::Arc;

use async_trait::async_trait;
use crdtfs_store::{RemoteStore, StoreError, Transaction};
use crdtfs_types::{InodeKey, InodeKind, path};

use crate::config::FsConfig;
use crate::index::{IndexStats, PathIndex, PathSnapshot};
use crate::inode::InodeStore;
use crate::refresh::RefreshScheduler;
use crate::remote::StoreClient;
use crate::vfs::{
    DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, DirEntry, FileAttr, FileType, FsError, FsResult,
    SetAttr, VfsOps, mode_for,
};

/// A filesystem replica backed by a remote CRDT store.
pub struct CrdtFs {
    index: Arc<PathIndex>,
    inodes: InodeStore,
    config: FsConfig,
}

impl CrdtFs {
    /// Connect to `store`, load the path map and make sure `/` exists.
    ///
    /// Unlike later refreshes, a failure to load the initial snapshot is fatal.
    pub async fn open(store: Arc<dyn RemoteStore>, config: FsConfig) -> FsResult<Self> {
        let client = StoreClient::new(store, &config.store.namespace, config.store.timeout());
        let fs = Self {
            index: Arc::new(PathIndex::new(client.clone())),
            inodes: InodeStore::new(client),
            config,
        };

        let entries = fs.index.refresh().await?;
        fs.ensure_root().await?;
        tracing::info!(
            namespace = fs.index.client().namespace(),
            entries,
            "filesystem opened"
        );
        Ok(fs)
    }

    async fn ensure_root(&self) -> FsResult<()> {
        if self.index.lookup(path::ROOT).is_some() {
            return Ok(());
        }

        let key = InodeKey::directory();
        let mut txn = Transaction::new();
        if self.guarded() {
            self.index.stage_guard_absent(&mut txn, path::ROOT);
        }
        self.index.stage_insert(&mut txn, path::ROOT, &key);
        self.inodes
            .stage_record(&mut txn, &key, mode_for(FileType::Directory, DEFAULT_DIR_PERM));

        match self.index.client().commit(txn).await {
            Ok(()) => tracing::info!(root = ?key, "created root directory"),
            // Another replica got there first.
            Err(StoreError::PreconditionFailed { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.index.refresh().await?;
        Ok(())
    }

    /// Start the periodic refresh task at the configured interval.
    pub fn spawn_refresh(&self) -> RefreshScheduler {
        RefreshScheduler::spawn(self.index.clone(), self.config.refresh_interval())
    }

    /// Re-read the path map now.
    pub async fn refresh(&self) -> FsResult<usize> {
        self.index.refresh().await
    }

    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    pub fn inodes(&self) -> &InodeStore {
        &self.inodes
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Inode key for `path` in the current snapshot.
    pub fn lookup(&self, path: &str) -> FsResult<Option<InodeKey>> {
        let path = path::normalize(path)?;
        Ok(self.index.lookup(&path))
    }

    /// Names of the immediate children of a directory.
    pub fn list_children(&self, dir: &str) -> FsResult<Vec<String>> {
        let (dir, key) = self.resolve(dir)?;
        if !key.is_dir() {
            return Err(FsError::not_a_directory(dir));
        }
        Ok(self.index.list_children(&dir))
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    /// Create an empty file with default permissions.
    pub async fn create(&self, path: &str) -> FsResult<FileAttr> {
        self.create_with_mode(path, DEFAULT_FILE_PERM).await
    }

    #[tracing::instrument(skip(self), name = "fs.create")]
    pub async fn create_with_mode(&self, path: &str, perm: u32) -> FsResult<FileAttr> {
        self.create_node(path, InodeKind::File, perm).await
    }

    /// Create an empty directory with default permissions.
    pub async fn mkdir(&self, path: &str) -> FsResult<FileAttr> {
        self.mkdir_with_mode(path, DEFAULT_DIR_PERM).await
    }

    #[tracing::instrument(skip(self), name = "fs.mkdir")]
    pub async fn mkdir_with_mode(&self, path: &str, perm: u32) -> FsResult<FileAttr> {
        self.create_node(path, InodeKind::Directory, perm).await
    }

    async fn create_node(&self, path: &str, kind: InodeKind, perm: u32) -> FsResult<FileAttr> {
        let path = path::normalize(path)?;
        let snapshot = self.index.snapshot();
        if snapshot.contains(&path) {
            return Err(FsError::already_exists(path));
        }
        check_parent(&snapshot, &path)?;

        let key = InodeKey::generate(kind);
        let mode = mode_for(kind.into(), perm);
        let mut txn = Transaction::new();
        if self.guarded() {
            self.index.stage_guard_absent(&mut txn, &path);
        }
        self.index.stage_insert(&mut txn, &path, &key);
        let attr = self.inodes.stage_record(&mut txn, &key, mode);

        self.commit(txn, &path).await?;
        tracing::debug!(key = ?key, "created");
        Ok(attr.file_attr(key))
    }

    /// Remove a file's path entry.
    #[tracing::instrument(skip(self), name = "fs.unlink")]
    pub async fn unlink(&self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        if path::is_root(&path) {
            return Err(FsError::permission_denied(path));
        }
        let key = self.existing(&self.index.snapshot(), &path)?;
        if key.is_dir() {
            return Err(FsError::is_a_directory(path));
        }
        self.remove_entry(&path, &key).await
    }

    /// Remove an empty directory's path entry.
    #[tracing::instrument(skip(self), name = "fs.rmdir")]
    pub async fn rmdir(&self, path: &str) -> FsResult<()> {
        let path = path::normalize(path)?;
        if path::is_root(&path) {
            return Err(FsError::permission_denied(path));
        }
        let snapshot = self.index.snapshot();
        let key = self.existing(&snapshot, &path)?;
        if !key.is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        if snapshot.has_children(&path) {
            return Err(FsError::directory_not_empty(path));
        }
        self.remove_entry(&path, &key).await
    }

    async fn remove_entry(&self, path: &str, key: &InodeKey) -> FsResult<()> {
        let mut txn = Transaction::new();
        self.index.stage_remove(&mut txn, path);
        if self.config.reclaim_inodes {
            self.inodes.stage_reclaim(&mut txn, key);
        }
        self.commit(txn, path).await
    }

    /// Move `from` to `to`. A directory takes its whole subtree with it, in
    /// the same transaction.
    #[tracing::instrument(skip(self), name = "fs.rename")]
    pub async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        if path::is_root(&from) {
            return Err(FsError::permission_denied(from));
        }
        if path::is_root(&to) {
            return Err(FsError::permission_denied(to));
        }

        let snapshot = self.index.snapshot();
        let key = self.existing(&snapshot, &from)?;
        if from == to {
            return Ok(());
        }
        if key.is_dir() && path::is_descendant(&from, &to) {
            return Err(FsError::invalid_argument(format!(
                "cannot move {} into its own subtree {}",
                from, to
            )));
        }
        check_parent(&snapshot, &to)?;

        let mut txn = Transaction::new();
        if let Some(target) = snapshot.lookup(&to) {
            match (key.is_dir(), target.is_dir()) {
                (true, false) => return Err(FsError::not_a_directory(to)),
                (false, true) => return Err(FsError::is_a_directory(to)),
                (true, true) if snapshot.has_children(&to) => {
                    return Err(FsError::directory_not_empty(to));
                }
                _ => {}
            }
            if self.config.reclaim_inodes {
                self.inodes.stage_reclaim(&mut txn, target);
            }
        }

        let moved: Vec<(String, String, InodeKey)> = snapshot
            .descendants(&from)
            .into_iter()
            .filter_map(|(old, k)| {
                let suffix = path::strip_ancestor(&from, old)?;
                Some((old.to_string(), path::join(&to, suffix), *k))
            })
            .collect();

        // New entries first, then removal of the old ones.
        self.index.stage_insert(&mut txn, &to, &key);
        for (_, new, k) in &moved {
            self.index.stage_insert(&mut txn, new, k);
        }
        self.index.stage_remove(&mut txn, &from);
        for (old, _, _) in &moved {
            self.index.stage_remove(&mut txn, old);
        }

        self.commit(txn, &to).await?;
        tracing::debug!(descendants = moved.len(), "renamed");
        Ok(())
    }

    // ========================================================================
    // Attributes and content
    // ========================================================================

    pub async fn getattr(&self, path: &str) -> FsResult<FileAttr> {
        let (_, key) = self.resolve(path)?;
        let attr = self.inodes.get_attributes(&key).await?;
        Ok(attr.file_attr(key))
    }

    /// Immediate children with their types, sorted by name.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let (dir, key) = self.resolve(path)?;
        if !key.is_dir() {
            return Err(FsError::not_a_directory(dir));
        }
        // Path-ordered children of one directory are already name-ordered.
        Ok(self
            .index
            .snapshot()
            .children(&dir)
            .into_iter()
            .map(|(name, k)| DirEntry::new(name, k.kind().into()))
            .collect())
    }

    pub async fn read(&self, path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        let (_, key) = self.resolve(path)?;
        self.inodes.read_content(&key, offset, u64::from(size)).await
    }

    pub async fn write(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<u32> {
        let (_, key) = self.resolve(path)?;
        let written = self.inodes.write_content(&key, offset, data, None).await?;
        u32::try_from(written)
            .map_err(|_| FsError::invalid_argument(format!("write of {} bytes too large", written)))
    }

    pub async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        let (_, key) = self.resolve(path)?;
        self.inodes.truncate(&key, size).await
    }

    /// Change size, permission bits and/or times.
    ///
    /// A size change commits on its own first, like `truncate`. Mode and
    /// times are then rewritten together in one commit.
    #[tracing::instrument(skip(self), name = "fs.setattr")]
    pub async fn setattr(&self, path: &str, attr: SetAttr) -> FsResult<FileAttr> {
        let (_, key) = self.resolve(path)?;
        if let Some(size) = attr.size {
            self.inodes.truncate(&key, size).await?;
        }
        let mut stored = self.inodes.get_attributes(&key).await?;
        if attr.changes_record() {
            if let Some(perm) = attr.perm {
                stored = stored.with_perm(perm);
            }
            stored = stored.with_times(attr.atime, attr.mtime);
            self.inodes.set_attributes(&key, &stored, None).await?;
        }
        Ok(stored.file_attr(key))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn guarded(&self) -> bool {
        self.config.guard_creates && self.index.client().capabilities().conditional_writes
    }

    fn resolve(&self, path: &str) -> FsResult<(String, InodeKey)> {
        let path = path::normalize(path)?;
        let key = self.existing(&self.index.snapshot(), &path)?;
        Ok((path, key))
    }

    fn existing(&self, snapshot: &PathSnapshot, path: &str) -> FsResult<InodeKey> {
        snapshot
            .lookup(path)
            .copied()
            .ok_or_else(|| FsError::not_found(path))
    }

    /// Commit a structural transaction, then refresh.
    ///
    /// A failed refresh does not fail the committed operation; the scheduler
    /// will catch up.
    async fn commit(&self, txn: Transaction, path: &str) -> FsResult<()> {
        match self.index.client().commit(txn).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                return Err(FsError::already_exists(path));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = self.index.refresh().await {
            tracing::debug!(error = %e, "refresh after commit failed");
        }
        Ok(())
    }
}

/// The parent of `path` must exist in `snapshot` and be a directory.
fn check_parent(snapshot: &PathSnapshot, path: &str) -> FsResult<()> {
    let parent = path::parent_of(path);
    match snapshot.lookup(parent) {
        None => Err(FsError::not_found(parent)),
        Some(key) if !key.is_dir() => Err(FsError::not_a_directory(parent)),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl VfsOps for CrdtFs {
    async fn getattr(&self, path: &str) -> FsResult<FileAttr> {
        CrdtFs::getattr(self, path).await
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        CrdtFs::readdir(self, path)
    }

    async fn read(&self, path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>> {
        CrdtFs::read(self, path, offset, size).await
    }

    async fn write(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<u32> {
        CrdtFs::write(self, path, offset, data).await
    }

    async fn create(&self, path: &str, mode: u32) -> FsResult<FileAttr> {
        self.create_with_mode(path, mode).await
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<FileAttr> {
        self.mkdir_with_mode(path, mode).await
    }

    async fn unlink(&self, path: &str) -> FsResult<()> {
        CrdtFs::unlink(self, path).await
    }

    async fn rmdir(&self, path: &str) -> FsResult<()> {
        CrdtFs::rmdir(self, path).await
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        CrdtFs::rename(self, from, to).await
    }

    async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        CrdtFs::truncate(self, path, size).await
    }

    async fn setattr(&self, path: &str, attr: SetAttr) -> FsResult<FileAttr> {
        CrdtFs::setattr(self, path, attr).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdtfs_store::MemoryStore;

    async fn open() -> CrdtFs {
        CrdtFs::open(Arc::new(MemoryStore::new()), FsConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_root_once() {
        let store = Arc::new(MemoryStore::new());
        let first = CrdtFs::open(store.clone(), FsConfig::default()).await.unwrap();
        let root = first.lookup("/").unwrap().unwrap();
        assert!(root.is_dir());

        let second = CrdtFs::open(store, FsConfig::default()).await.unwrap();
        assert_eq!(second.lookup("/").unwrap(), Some(root));
    }

    #[tokio::test]
    async fn test_open_fails_when_store_is_down() {
        let store = Arc::new(MemoryStore::new());
        store.set_reachable(false);
        let result = CrdtFs::open(store, FsConfig::default()).await;
        assert!(matches!(result, Err(FsError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_create_checks_parent() {
        let fs = open().await;
        assert!(matches!(fs.create("/missing/f").await, Err(FsError::NotFound(_))));
        fs.create("/f").await.unwrap();
        assert!(matches!(fs.create("/f/g").await, Err(FsError::NotADirectory(_))));
        assert!(matches!(fs.mkdir("/").await, Err(FsError::AlreadyExists(_))));
        assert!(matches!(fs.create("rel").await, Err(FsError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_unlink_and_rmdir_route_by_type() {
        let fs = open().await;
        fs.mkdir("/d").await.unwrap();
        fs.create("/d/f").await.unwrap();

        assert!(matches!(fs.unlink("/d").await, Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.rmdir("/d/f").await, Err(FsError::NotADirectory(_))));
        assert!(matches!(fs.rmdir("/d").await, Err(FsError::DirectoryNotEmpty(_))));
        assert!(matches!(fs.rmdir("/").await, Err(FsError::PermissionDenied(_))));
        assert!(matches!(fs.unlink("/nope").await, Err(FsError::NotFound(_))));

        fs.unlink("/d/f").await.unwrap();
        fs.rmdir("/d").await.unwrap();
        assert_eq!(fs.lookup("/d").unwrap(), None);
    }

    #[tokio::test]
    async fn test_readdir_reports_kinds() {
        let fs = open().await;
        fs.mkdir("/b").await.unwrap();
        fs.create("/a").await.unwrap();
        let entries = fs.readdir("/").unwrap();
        assert_eq!(entries, vec![DirEntry::file("a"), DirEntry::directory("b")]);
        assert!(matches!(fs.readdir("/a"), Err(FsError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_getattr_and_setattr() {
        let fs = open().await;
        let created = fs.create_with_mode("/f", 0o600).await.unwrap();
        let attr = fs.getattr("/f").await.unwrap();
        assert_eq!(attr, created);
        assert_eq!(attr.mode, 0o100600);
        assert_eq!(attr.atime, attr.mtime);
        assert_eq!(attr.mtime, attr.ctime);

        fs.write("/f", 0, b"abcdef").await.unwrap();
        let attr = fs
            .setattr("/f", SetAttr::new().with_size(3).with_perm(0o640))
            .await
            .unwrap();
        assert_eq!(attr.size, 3);
        assert_eq!(attr.mode, 0o100640);
        assert_eq!(fs.getattr("/f").await.unwrap(), attr);

        let stamp = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let attr = fs
            .setattr("/f", SetAttr::new().with_atime(stamp).with_mtime(stamp))
            .await
            .unwrap();
        assert_eq!((attr.atime, attr.mtime), (stamp, stamp));
        assert!(attr.ctime > stamp);
        assert_eq!(attr.mode, 0o100640);
        assert_eq!(fs.getattr("/f").await.unwrap(), attr);

        let root = fs.getattr("/").await.unwrap();
        assert!(root.is_dir());
        assert_eq!(root.nlink, 2);
    }
}
