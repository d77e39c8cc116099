//! crdtfs kernel: a POSIX-shaped filesystem over a replicated CRDT store.
//!
//! Durable state is flat: one shared map from absolute path to inode key, and
//! one record per inode. Hierarchy is derived from path prefixes.
//!
//! - [`PathIndex`] - the path map and its atomically swapped local snapshot
//! - [`InodeStore`] - mode, size and content of each inode
//! - [`CrdtFs`] - create, mkdir, rename, unlink, rmdir and content access,
//!   each committed as one transaction; implements [`VfsOps`]
//! - [`RefreshScheduler`] - background task bounding snapshot staleness
//!
//! Reads of the path map are served from the local snapshot, so another
//! replica's changes become visible after at most one refresh interval. A
//! replica's own changes are visible immediately.

pub mod config;
pub mod fs;
pub mod index;
pub mod inode;
pub mod refresh;
pub mod remote;
pub mod vfs;

pub use config::{ConfigError, FsConfig, StoreConfig, StoreEndpoint};
pub use fs::CrdtFs;
pub use index::{IndexStats, PathIndex, PathSnapshot};
pub use inode::{InodeAttr, InodeStore};
pub use refresh::RefreshScheduler;
pub use remote::StoreClient;
pub use vfs::{DirEntry, FileAttr, FileType, FsError, FsResult, SetAttr, VfsOps};

pub use crdtfs_store as store;
pub use crdtfs_types as types;
