//! Dispatch-facing filesystem surface.
//!
//! - [`VfsOps`] - one call per filesystem primitive, implemented by
//!   [`CrdtFs`](crate::CrdtFs)
//! - [`FsError`] - the error taxonomy, convertible to `std::io::Error`
//! - [`FileAttr`], [`DirEntry`], [`SetAttr`] - wire-friendly value types
//!
//! ## Design Decisions
//!
//! - **Path-based**: operations take absolute path strings. Inode keys are
//!   an internal detail; a FUSE client keeps its own inode-number mapping.
//! - **Explicit offset/size**: read/write carry offset and size, so no
//!   handle state is kept between calls.

mod error;
mod ops;
mod types;

pub use error::{FsError, FsResult};
pub use ops::VfsOps;
pub use types::{
    DEFAULT_DIR_PERM, DEFAULT_FILE_PERM, DirEntry, FileAttr, FileType, PERM_MASK, S_IFDIR,
    S_IFMT, S_IFREG, SetAttr, mode_for,
};
