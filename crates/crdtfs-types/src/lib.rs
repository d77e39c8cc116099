//! Identifiers and path-key codec for crdtfs.
//!
//! This is the leaf crate of the workspace. It has no I/O and no internal
//! dependencies:
//!
//! | Item          | Purpose                                           |
//! |---------------|---------------------------------------------------|
//! | [`InodeKey`]  | Type-tagged, unique inode identity (`DIR_…`/`FILE_…`) |
//! | [`InodeKind`] | Directory or regular file, decoded from the tag   |
//! | [`path`]      | Pure functions over absolute path strings         |

pub mod ids;
pub mod path;

pub use ids::{InodeKey, InodeKind, KeyError};
pub use path::PathError;
