//! Typed inode identifiers.
//!
//! An [`InodeKey`] names one inode record in the store. Its string form is
//! `<TAG>_<uuid>`, where the tag is `DIR` or `FILE`, so the type of any path
//! entry is known from the path map alone. The kind is decoded once, when the
//! key is generated or parsed, and carried as an enum from then on.
//!
//! Keys are generated fresh for every create/mkdir (UUIDv4) and never reused,
//! not even across a rename.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Separator between the type tag and the UUID in the string form.
const TAG_SEPARATOR: char = '_';

/// What kind of inode a key refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr,
)]
pub enum InodeKind {
    /// A directory. Its children are derived from the path map.
    #[strum(serialize = "DIR")]
    Directory,
    /// A regular file with byte content.
    #[strum(serialize = "FILE")]
    File,
}

impl InodeKind {
    /// Returns true for [`InodeKind::Directory`].
    pub fn is_dir(&self) -> bool {
        matches!(self, InodeKind::Directory)
    }

    /// Returns true for [`InodeKind::File`].
    pub fn is_file(&self) -> bool {
        matches!(self, InodeKind::File)
    }
}

/// Error parsing the string form of an [`InodeKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("inode key '{0}' has no type tag")]
    MissingTag(String),
    #[error("inode key '{key}' has unknown type tag '{tag}'")]
    UnknownTag { key: String, tag: String },
    #[error("inode key '{key}' has a malformed id: {reason}")]
    MalformedId { key: String, reason: String },
}

/// Identity of an inode record: its kind plus a unique id.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InodeKey {
    kind: InodeKind,
    id: uuid::Uuid,
}

impl InodeKey {
    /// Generate a fresh key of the given kind.
    pub fn generate(kind: InodeKind) -> Self {
        Self {
            kind,
            id: uuid::Uuid::new_v4(),
        }
    }

    /// Generate a fresh directory key.
    pub fn directory() -> Self {
        Self::generate(InodeKind::Directory)
    }

    /// Generate a fresh file key.
    pub fn file() -> Self {
        Self::generate(InodeKind::File)
    }

    /// The inode kind encoded in this key.
    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    /// The unique part of the key.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// First 8 hex characters of the id, for logs only.
    pub fn short(&self) -> String {
        self.id.as_simple().to_string()[..8].to_string()
    }

    /// Parse the `<TAG>_<uuid>` string form.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let (tag, id) = s
            .split_once(TAG_SEPARATOR)
            .ok_or_else(|| KeyError::MissingTag(s.to_string()))?;
        let kind = InodeKind::from_str(tag).map_err(|_| KeyError::UnknownTag {
            key: s.to_string(),
            tag: tag.to_string(),
        })?;
        let id = uuid::Uuid::parse_str(id).map_err(|e| KeyError::MalformedId {
            key: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { kind, id })
    }
}

impl fmt::Display for InodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, TAG_SEPARATOR, self.id)
    }
}

impl fmt::Debug for InodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InodeKey({}:{})", self.kind, self.short())
    }
}

impl FromStr for InodeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for InodeKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<InodeKey> for String {
    fn from(key: InodeKey) -> String {
        key.to_string()
    }
}
