//! Core VFS types.
//!
//! Attributes are assembled from two sources: the kind comes from the inode
//! key's tag, everything else from the inode record.

use std::time::{SystemTime, UNIX_EPOCH};

use crdtfs_types::{InodeKey, InodeKind};
use serde::{Deserialize, Serialize};

/// File type bit mask.
pub const S_IFMT: u32 = 0o170000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;
/// Permission bit mask (including setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

/// Default permissions for new files.
pub const DEFAULT_FILE_PERM: u32 = 0o644;
/// Default permissions for new directories.
pub const DEFAULT_DIR_PERM: u32 = 0o755;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Type bits for a mode word.
    pub fn type_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

impl From<InodeKind> for FileType {
    fn from(kind: InodeKind) -> Self {
        match kind {
            InodeKind::Directory => FileType::Directory,
            InodeKind::File => FileType::File,
        }
    }
}

/// Combine a kind and permission bits into a full mode word.
pub fn mode_for(kind: FileType, perm: u32) -> u32 {
    kind.type_bits() | (perm & PERM_MASK)
}

/// File attributes (metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// Inode this path resolves to.
    pub key: InodeKey,
    /// File type.
    pub kind: FileType,
    /// Full mode word (type bits and permissions).
    pub mode: u32,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    /// Number of hard links.
    pub nlink: u32,
    /// Last access time.
    pub atime: SystemTime,
    /// Last content modification time.
    pub mtime: SystemTime,
    /// Last status change time.
    pub ctime: SystemTime,
}

impl FileAttr {
    /// Build attributes from an inode key and its stored record.
    ///
    /// Records written without type bits get them from the key. Times start
    /// at the Unix epoch; see [`FileAttr::with_times`].
    pub fn new(key: InodeKey, mode: u32, size: u64) -> Self {
        let kind = FileType::from(key.kind());
        let mode = if mode & S_IFMT == 0 {
            mode | kind.type_bits()
        } else {
            mode
        };
        Self {
            key,
            kind,
            mode,
            perm: mode & PERM_MASK,
            size: if kind.is_dir() { 0 } else { size },
            nlink: if kind.is_dir() { 2 } else { 1 }, // . and ..
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
        }
    }

    pub fn with_times(mut self, atime: SystemTime, mtime: SystemTime, ctime: SystemTime) -> Self {
        self.atime = atime;
        self.mtime = mtime;
        self.ctime = ctime;
        self
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Attributes to set (for setattr operation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAttr {
    /// New size (truncate/extend).
    pub size: Option<u64>,
    /// New permissions. Type bits are ignored.
    pub perm: Option<u32>,
    /// New access time.
    pub atime: Option<SystemTime>,
    /// New modification time.
    pub mtime: Option<SystemTime>,
}

impl SetAttr {
    /// Create a new empty SetAttr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set permissions.
    pub fn with_perm(mut self, perm: u32) -> Self {
        self.perm = Some(perm);
        self
    }

    /// Set access time.
    pub fn with_atime(mut self, atime: SystemTime) -> Self {
        self.atime = Some(atime);
        self
    }

    /// Set modification time.
    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Set both times to now, as `touch` does.
    pub fn touch() -> Self {
        let now = SystemTime::now();
        Self::new().with_atime(now).with_mtime(now)
    }

    /// Returns true if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.size.is_none() && !self.changes_record()
    }

    /// Returns true if mode or times would change.
    pub fn changes_record(&self) -> bool {
        self.perm.is_some() || self.atime.is_some() || self.mtime.is_some()
    }
}
