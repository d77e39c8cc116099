//! Filesystem error types.

use std::io;

use crdtfs_store::StoreError;
use crdtfs_types::PathError;
use thiserror::Error;

/// Filesystem error type.
///
/// Everything except `StoreUnavailable` is decided from the local path
/// snapshot and the operation's preconditions, and is never retried.
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Operation not allowed on this path (the root).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed path, impossible rename, or out-of-range offset.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote store failed or could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a PermissionDenied error.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns true if the error came from the remote store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, FsError::StoreUnavailable(_))
    }
}

impl From<PathError> for FsError {
    fn from(e: PathError) -> Self {
        FsError::InvalidArgument(e.to_string())
    }
}

/// Convert FsError to std::io::Error for the dispatch adapter.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            FsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            FsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            FsError::PermissionDenied(msg) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            FsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::StoreUnavailable(e) => io::Error::other(e),
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds() {
        let cases = [
            (FsError::not_found("/a"), io::ErrorKind::NotFound),
            (FsError::already_exists("/a"), io::ErrorKind::AlreadyExists),
            (FsError::not_a_directory("/a"), io::ErrorKind::NotADirectory),
            (FsError::is_a_directory("/a"), io::ErrorKind::IsADirectory),
            (FsError::directory_not_empty("/a"), io::ErrorKind::DirectoryNotEmpty),
            (FsError::permission_denied("/"), io::ErrorKind::PermissionDenied),
            (FsError::invalid_argument("x"), io::ErrorKind::InvalidInput),
        ];
        for (err, kind) in cases {
            assert_eq!(io::Error::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_store_errors_wrap() {
        let err: FsError = StoreError::Unreachable("down".into()).into();
        assert!(err.is_store_failure());
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_path_errors_are_invalid_arguments() {
        let err: FsError = PathError::NotAbsolute("a".into()).into();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }
}
