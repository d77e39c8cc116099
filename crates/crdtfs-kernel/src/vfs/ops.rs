//! VFS operations trait.
//!
//! One call per filesystem primitive, keyed by absolute path, with explicit
//! offset/size for content. A POSIX/FUSE front end maps the results onto
//! status codes (see the `io::Error` conversion of [`FsError`](super::FsError))
//! and synthesizes `.` and `..` itself.

use async_trait::async_trait;

use super::types::{DirEntry, FileAttr, SetAttr};
use super::FsResult;

/// Core VFS operations trait.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, path: &str) -> FsResult<FileAttr>;

    /// Read directory entries.
    ///
    /// Returns all immediate children (no pagination, no `.`/`..`).
    async fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Read file contents.
    ///
    /// Reads up to `size` bytes starting at `offset`.
    /// Returns fewer bytes (possibly none) if EOF is reached.
    async fn read(&self, path: &str, offset: u64, size: u32) -> FsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write data to a file.
    ///
    /// Writes `data` at the specified `offset`, zero-filling any gap.
    /// Returns the number of bytes written.
    async fn write(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<u32>;

    /// Create a new file with the given permission bits.
    async fn create(&self, path: &str, mode: u32) -> FsResult<FileAttr>;

    /// Create a new directory with the given permission bits.
    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<FileAttr>;

    /// Remove a file.
    async fn unlink(&self, path: &str) -> FsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &str) -> FsResult<()>;

    /// Rename a file or directory, moving a directory's whole subtree.
    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Truncate a file to the specified size.
    async fn truncate(&self, path: &str, size: u64) -> FsResult<()>;

    /// Set file attributes.
    async fn setattr(&self, path: &str, attr: SetAttr) -> FsResult<FileAttr>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents.
    async fn read_all(&self, path: &str) -> FsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let size = u32::try_from(attr.size).unwrap_or(u32::MAX);
        self.read(path, 0, size).await
    }

    /// Write entire file contents.
    ///
    /// Convenience method that creates or truncates, then writes.
    async fn write_all(&self, path: &str, data: &[u8]) -> FsResult<()> {
        if self.exists(path).await {
            self.truncate(path, 0).await?;
        } else {
            self.create(path, super::types::DEFAULT_FILE_PERM).await?;
        }
        self.write(path, 0, data).await?;
        Ok(())
    }
}
