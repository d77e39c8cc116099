//! Inode records: attributes and content keyed by [`InodeKey`].
//!
//! Each inode is one map in the store holding these registers:
//!
//! | entry   | value   | meaning                                   |
//! |---------|---------|-------------------------------------------|
//! | `MODE`  | `Int`   | type and permission bits                  |
//! | `SIZE`  | `Int`   | authoritative byte length (files only)    |
//! | `CONT`  | `Bytes` | file content                              |
//! | `ATIME` | `Int`   | last access, Unix milliseconds            |
//! | `MTIME` | `Int`   | last content change, Unix milliseconds    |
//! | `CTIME` | `Int`   | last attribute change, Unix milliseconds  |
//!
//! Content updates are read-modify-write: the whole content register is read,
//! patched and written back together with `SIZE` and the change times in one
//! transaction. Nothing is buffered between calls.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crdtfs_store::{MapSnapshot, Transaction};
use crdtfs_types::InodeKey;

use crate::remote::StoreClient;
use crate::vfs::{FileAttr, FileType, FsError, FsResult, PERM_MASK, S_IFMT, mode_for};

/// Register holding the mode word.
pub const MODE: &str = "MODE";
/// Register holding the content length.
pub const SIZE: &str = "SIZE";
/// Register holding the content bytes.
pub const CONT: &str = "CONT";
/// Register holding the access time.
pub const ATIME: &str = "ATIME";
/// Register holding the modification time.
pub const MTIME: &str = "MTIME";
/// Register holding the status change time.
pub const CTIME: &str = "CTIME";

const REGISTERS: [&str; 6] = [MODE, SIZE, CONT, ATIME, MTIME, CTIME];

/// Largest content a single record may hold.
///
/// The whole content lives in one register and is rewritten on every write.
pub const MAX_FILE_SIZE: u64 = 1 << 30;

/// Stored attributes of one inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeAttr {
    pub mode: u32,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl InodeAttr {
    /// Attributes of a record created now.
    pub fn fresh(mode: u32) -> Self {
        let now = now();
        Self {
            mode,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    /// Replace the permission bits, keeping the type bits.
    pub fn with_perm(mut self, perm: u32) -> Self {
        self.mode = (self.mode & S_IFMT) | (perm & PERM_MASK);
        self.ctime = now();
        self
    }

    /// Set access and/or modification time. Either one counts as a status change.
    pub fn with_times(mut self, atime: Option<SystemTime>, mtime: Option<SystemTime>) -> Self {
        if let Some(atime) = atime {
            self.atime = to_resolution(atime);
        }
        if let Some(mtime) = mtime {
            self.mtime = to_resolution(mtime);
        }
        if atime.is_some() || mtime.is_some() {
            self.ctime = now();
        }
        self
    }

    /// Full attributes for the inode `key`.
    pub fn file_attr(&self, key: InodeKey) -> FileAttr {
        FileAttr::new(key, self.mode, self.size).with_times(self.atime, self.mtime, self.ctime)
    }
}

/// Attribute and content access for inode records.
#[derive(Debug, Clone)]
pub struct InodeStore {
    client: StoreClient,
}

impl InodeStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Read an inode's attributes.
    ///
    /// Missing time registers read as the Unix epoch.
    pub async fn get_attributes(&self, key: &InodeKey) -> FsResult<InodeAttr> {
        let record = self.load(key).await?;
        let mode = record
            .get_int(MODE)?
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or_else(|| mode_for(FileType::from(key.kind()), 0));
        let size = record
            .get_int(SIZE)?
            .map(|s| u64::try_from(s).unwrap_or(0))
            .unwrap_or(0);
        let time = |entry: &str| -> FsResult<SystemTime> {
            Ok(record.get_int(entry)?.map(from_millis).unwrap_or(UNIX_EPOCH))
        };
        Ok(InodeAttr {
            mode,
            size,
            atime: time(ATIME)?,
            mtime: time(MTIME)?,
            ctime: time(CTIME)?,
        })
    }

    /// Write mode, size and times, into `txn` if given, otherwise in a commit
    /// of its own. This is the setattr path; content is left alone.
    pub async fn set_attributes(
        &self,
        key: &InodeKey,
        attr: &InodeAttr,
        txn: Option<&mut Transaction>,
    ) -> FsResult<()> {
        let map = self.client.inode_map(key);
        let size = size_register(attr.size)?;
        self.stage_or_commit(txn, |txn| {
            txn.write(&map, MODE, i64::from(attr.mode))
                .write(&map, SIZE, size)
                .write(&map, ATIME, to_millis(attr.atime))
                .write(&map, MTIME, to_millis(attr.mtime))
                .write(&map, CTIME, to_millis(attr.ctime));
        })
        .await
    }

    /// Stage a fresh record for a newly created inode and return what was staged.
    pub fn stage_record(&self, txn: &mut Transaction, key: &InodeKey, mode: u32) -> InodeAttr {
        let attr = InodeAttr::fresh(mode);
        let map = self.client.inode_map(key);
        let now = to_millis(attr.ctime);
        txn.write(&map, MODE, i64::from(mode))
            .write(&map, SIZE, 0i64)
            .write(&map, ATIME, now)
            .write(&map, MTIME, now)
            .write(&map, CTIME, now);
        if key.is_file() {
            txn.write(&map, CONT, Vec::<u8>::new());
        }
        attr
    }

    /// Stage removal of every register of an inode's record.
    pub fn stage_reclaim(&self, txn: &mut Transaction, key: &InodeKey) {
        let map = self.client.inode_map(key);
        for entry in REGISTERS {
            txn.remove(&map, entry);
        }
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Out-of-range offsets are not an error; they read as empty.
    pub async fn read_content(&self, key: &InodeKey, offset: u64, len: u64) -> FsResult<Vec<u8>> {
        Self::require_file(key)?;
        let record = self.load(key).await?;
        let content = record.get_bytes(CONT)?.unwrap_or_default();

        let Ok(start) = usize::try_from(offset) else {
            return Ok(Vec::new());
        };
        if start >= content.len() {
            return Ok(Vec::new());
        }
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(content.len());
        Ok(content[start..end].to_vec())
    }

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    ///
    /// Content, size and change times are staged together. Returns `data.len()`.
    pub async fn write_content(
        &self,
        key: &InodeKey,
        offset: u64,
        data: &[u8],
        txn: Option<&mut Transaction>,
    ) -> FsResult<usize> {
        Self::require_file(key)?;
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset.checked_add(data.len() as u64).ok_or_else(|| {
            FsError::invalid_argument(format!("write of {} bytes at {} overflows", data.len(), offset))
        })?;
        let end = content_len(end)?;
        let start = end - data.len();

        let record = self.load(key).await?;
        let mut content = record.get_bytes(CONT)?.unwrap_or_default().to_vec();
        grow(&mut content, end)?;
        content[start..end].copy_from_slice(data);

        self.stage_content(txn, key, content).await?;
        Ok(data.len())
    }

    /// Set the content length: shrinking discards the tail, growing zero-fills.
    pub async fn truncate(&self, key: &InodeKey, size: u64) -> FsResult<()> {
        Self::require_file(key)?;
        let new_len = content_len(size)?;

        let record = self.load(key).await?;
        let mut content = record.get_bytes(CONT)?.unwrap_or_default().to_vec();
        if content.len() == new_len && record.get_int(SIZE)? == Some(new_len as i64) {
            return Ok(());
        }
        if new_len > content.len() {
            grow(&mut content, new_len)?;
        } else {
            content.truncate(new_len);
        }
        self.stage_content(None, key, content).await
    }

    async fn stage_content(
        &self,
        txn: Option<&mut Transaction>,
        key: &InodeKey,
        content: Vec<u8>,
    ) -> FsResult<()> {
        let map = self.client.inode_map(key);
        let size = size_register(content.len() as u64)?;
        let now = to_millis(now());
        self.stage_or_commit(txn, |txn| {
            txn.write(&map, CONT, content)
                .write(&map, SIZE, size)
                .write(&map, MTIME, now)
                .write(&map, CTIME, now);
        })
        .await
    }

    async fn stage_or_commit(
        &self,
        txn: Option<&mut Transaction>,
        stage: impl FnOnce(&mut Transaction),
    ) -> FsResult<()> {
        match txn {
            Some(txn) => {
                stage(txn);
                Ok(())
            }
            None => {
                let mut own = Transaction::new();
                stage(&mut own);
                self.client.commit(own).await?;
                Ok(())
            }
        }
    }

    /// Read the record; a record with no registers does not exist.
    async fn load(&self, key: &InodeKey) -> FsResult<MapSnapshot> {
        let record = self.client.read_map(&self.client.inode_map(key)).await?;
        if record.is_empty() {
            return Err(FsError::not_found(key.to_string()));
        }
        Ok(record)
    }

    fn require_file(key: &InodeKey) -> FsResult<()> {
        if key.is_dir() {
            return Err(FsError::is_a_directory(key.to_string()));
        }
        Ok(())
    }
}

fn size_register(size: u64) -> FsResult<i64> {
    i64::try_from(size).map_err(|_| FsError::invalid_argument(format!("size {} out of range", size)))
}

/// Check a requested content length against [`MAX_FILE_SIZE`] before any allocation.
fn content_len(len: u64) -> FsResult<usize> {
    if len > MAX_FILE_SIZE {
        return Err(FsError::invalid_argument(format!(
            "size {} exceeds the {} byte limit",
            len, MAX_FILE_SIZE
        )));
    }
    usize::try_from(len).map_err(|_| FsError::invalid_argument(format!("size {} out of range", len)))
}

/// Zero-extend `content` to `len` bytes.
fn grow(content: &mut Vec<u8>, len: usize) -> FsResult<()> {
    if len <= content.len() {
        return Ok(());
    }
    content.try_reserve(len - content.len()).map_err(|e| {
        FsError::invalid_argument(format!("cannot grow content to {} bytes: {}", len, e))
    })?;
    content.resize(len, 0);
    Ok(())
}

/// Current time at the resolution the time registers keep.
pub fn now() -> SystemTime {
    to_resolution(SystemTime::now())
}

fn to_resolution(time: SystemTime) -> SystemTime {
    from_millis(to_millis(time))
}

fn to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(i64::MIN),
    }
}

fn from_millis(ms: i64) -> SystemTime {
    let offset = Duration::from_millis(ms.unsigned_abs());
    let time = if ms >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.unwrap_or(UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crdtfs_store::{MemoryStore, RemoteStore};
    use std::sync::Arc;

    async fn store_with_file() -> (Arc<MemoryStore>, InodeStore, InodeKey) {
        let store = Arc::new(MemoryStore::new());
        let inodes = InodeStore::new(StoreClient::new(store.clone(), "t", None));
        let key = InodeKey::file();
        let mut txn = Transaction::new();
        inodes.stage_record(&mut txn, &key, 0o100644);
        store.commit(txn).await.unwrap();
        (store, inodes, key)
    }

    #[tokio::test]
    async fn test_writes_grow_content() {
        let (_store, inodes, key) = store_with_file().await;
        assert_eq!(inodes.write_content(&key, 0, b"hello", None).await.unwrap(), 5);
        assert_eq!(inodes.write_content(&key, 5, b"world", None).await.unwrap(), 5);
        assert_eq!(inodes.read_content(&key, 0, 10).await.unwrap(), b"helloworld");
        assert_eq!(inodes.get_attributes(&key).await.unwrap().size, 10);
    }

    #[tokio::test]
    async fn test_gap_is_zero_filled() {
        let (_store, inodes, key) = store_with_file().await;
        inodes.write_content(&key, 3, b"xy", None).await.unwrap();
        assert_eq!(inodes.read_content(&key, 0, 100).await.unwrap(), b"\0\0\0xy");
        inodes.write_content(&key, 1, b"Q", None).await.unwrap();
        assert_eq!(inodes.read_content(&key, 0, 100).await.unwrap(), b"\0Q\0xy");
    }

    #[tokio::test]
    async fn test_read_clipping() {
        let (_store, inodes, key) = store_with_file().await;
        inodes.write_content(&key, 0, b"abcdef", None).await.unwrap();
        assert_eq!(inodes.read_content(&key, 4, 10).await.unwrap(), b"ef");
        assert!(inodes.read_content(&key, 11, 10).await.unwrap().is_empty());
        assert!(inodes.read_content(&key, u64::MAX, 1).await.unwrap().is_empty());
        assert_eq!(inodes.read_content(&key, 0, u64::MAX).await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_truncate_shrinks_and_grows() {
        let (_store, inodes, key) = store_with_file().await;
        inodes.write_content(&key, 0, b"abcdef", None).await.unwrap();
        inodes.truncate(&key, 2).await.unwrap();
        assert_eq!(inodes.read_content(&key, 0, 10).await.unwrap(), b"ab");
        assert_eq!(inodes.get_attributes(&key).await.unwrap().size, 2);

        inodes.truncate(&key, 4).await.unwrap();
        assert_eq!(inodes.read_content(&key, 0, 10).await.unwrap(), b"ab\0\0");
    }

    #[tokio::test]
    async fn test_staged_write_waits_for_commit() {
        let (store, inodes, key) = store_with_file().await;
        let mut txn = Transaction::new();
        inodes.write_content(&key, 0, b"later", Some(&mut txn)).await.unwrap();
        assert!(inodes.read_content(&key, 0, 5).await.unwrap().is_empty());
        store.commit(txn).await.unwrap();
        assert_eq!(inodes.read_content(&key, 0, 5).await.unwrap(), b"later");
    }

    #[tokio::test]
    async fn test_attributes_round_trip_through_setattr_path() {
        let (_store, inodes, key) = store_with_file().await;
        let created = inodes.get_attributes(&key).await.unwrap();
        assert_eq!(created.atime, created.mtime);
        assert_eq!(created.mtime, created.ctime);
        assert!(created.ctime > UNIX_EPOCH);

        let stamp = UNIX_EPOCH + Duration::from_secs(1_000_000);
        let changed = created.with_perm(0o40600).with_times(Some(stamp), None);
        assert_eq!(changed.mode, 0o100600);
        inodes.set_attributes(&key, &changed, None).await.unwrap();

        let stored = inodes.get_attributes(&key).await.unwrap();
        assert_eq!(stored, changed);
        assert_eq!(stored.atime, stamp);
        assert_eq!(stored.mtime, created.mtime);
    }

    #[tokio::test]
    async fn test_content_changes_touch_mtime_and_ctime() {
        let (_store, inodes, key) = store_with_file().await;
        let old = UNIX_EPOCH + Duration::from_secs(60);
        let attr = inodes.get_attributes(&key).await.unwrap();
        let backdated = InodeAttr {
            atime: old,
            mtime: old,
            ctime: old,
            ..attr
        };
        inodes.set_attributes(&key, &backdated, None).await.unwrap();

        inodes.write_content(&key, 0, b"abc", None).await.unwrap();
        let written = inodes.get_attributes(&key).await.unwrap();
        assert!(written.mtime > old);
        assert!(written.ctime > old);
        assert_eq!(written.atime, old);

        inodes.set_attributes(&key, &backdated, None).await.unwrap();
        inodes.truncate(&key, 1).await.unwrap();
        let truncated = inodes.get_attributes(&key).await.unwrap();
        assert!(truncated.mtime > old);
        assert_eq!(truncated.size, 1);
    }

    #[tokio::test]
    async fn test_sizes_past_the_limit_are_rejected() {
        let (_store, inodes, key) = store_with_file().await;
        inodes.write_content(&key, 0, b"keep", None).await.unwrap();

        for offset in [u64::MAX - 8, u64::MAX / 2, MAX_FILE_SIZE] {
            assert!(matches!(
                inodes.write_content(&key, offset, b"x", None).await,
                Err(FsError::InvalidArgument(_))
            ));
        }
        for size in [u64::MAX, u64::MAX / 2 + 10, MAX_FILE_SIZE + 1] {
            assert!(matches!(
                inodes.truncate(&key, size).await,
                Err(FsError::InvalidArgument(_))
            ));
        }
        assert_eq!(inodes.read_content(&key, 0, 10).await.unwrap(), b"keep");
        assert_eq!(inodes.get_attributes(&key).await.unwrap().size, 4);
    }

    #[test]
    fn test_time_registers_keep_milliseconds() {
        let t = UNIX_EPOCH + Duration::from_nanos(1_500_700_000);
        assert_eq!(from_millis(to_millis(t)), UNIX_EPOCH + Duration::from_millis(1500));
        let before = UNIX_EPOCH - Duration::from_millis(250);
        assert_eq!(to_millis(before), -250);
        assert_eq!(from_millis(-250), before);
    }

    #[tokio::test]
    async fn test_directories_reject_content() {
        let (_store, inodes, _key) = store_with_file().await;
        let dir = InodeKey::directory();
        assert!(matches!(
            inodes.read_content(&dir, 0, 1).await,
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            inodes.write_content(&dir, 0, b"x", None).await,
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(inodes.truncate(&dir, 0).await, Err(FsError::IsADirectory(_))));
    }

    #[tokio::test]
    async fn test_missing_and_reclaimed_records() {
        let (store, inodes, key) = store_with_file().await;
        assert!(matches!(
            inodes.get_attributes(&InodeKey::file()).await,
            Err(FsError::NotFound(_))
        ));

        let mut txn = Transaction::new();
        inodes.stage_reclaim(&mut txn, &key);
        store.commit(txn).await.unwrap();
        assert!(matches!(inodes.get_attributes(&key).await, Err(FsError::NotFound(_))));
        assert_eq!(store.map_count(), 0);
    }
}
