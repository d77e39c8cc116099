//! Filesystem configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid:
//!
//! ```toml
//! refresh_interval_ms = 5000
//! reclaim_inodes = false
//! guard_creates = true
//!
//! [store]
//! endpoint = "memory"        # or "host:port"
//! namespace = "crdtfs"
//! timeout_ms = 10000         # 0 disables the per-call deadline
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default period between path-map refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(5000);

/// Default deadline for one remote round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default key namespace (bucket) for all maps.
pub const DEFAULT_NAMESPACE: &str = "crdtfs";

/// Endpoint string selecting the in-process store.
pub const MEMORY_ENDPOINT: &str = "memory";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid store endpoint '{0}': expected \"memory\" or <host>:<port>")]
    InvalidEndpoint(String),
}

/// Where the remote store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEndpoint {
    /// In-process [`MemoryStore`](crdtfs_store::MemoryStore).
    Memory,
    /// A remote replica.
    Remote { host: String, port: u16 },
}

impl FromStr for StoreEndpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(MEMORY_ENDPOINT) {
            return Ok(StoreEndpoint::Memory);
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidEndpoint(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(ConfigError::InvalidEndpoint(s.to_string()));
        }
        Ok(StoreEndpoint::Remote {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for StoreEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEndpoint::Memory => f.write_str(MEMORY_ENDPOINT),
            StoreEndpoint::Remote { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Remote store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `"memory"` or `<host>:<port>`.
    pub endpoint: String,
    /// Prefix for every map key, so several filesystems can share a store.
    pub namespace: String,
    /// Deadline for each remote call in milliseconds; 0 disables it.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: MEMORY_ENDPOINT.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_ms: DEFAULT_STORE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    /// Parse the endpoint string.
    pub fn endpoint(&self) -> Result<StoreEndpoint, ConfigError> {
        self.endpoint.parse()
    }

    /// Per-call deadline, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Period of the background path-map refresh, in milliseconds.
    /// Values of 0 fall back to the default.
    pub refresh_interval_ms: u64,
    /// Remove an inode's record in the same transaction that drops its last path.
    pub reclaim_inodes: bool,
    /// Guard create/mkdir with an absence check when the store supports it.
    pub guard_creates: bool,
    /// Remote store settings.
    pub store: StoreConfig,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL.as_millis() as u64,
            reclaim_inodes: false,
            guard_creates: true,
            store: StoreConfig::default(),
        }
    }
}

impl FsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Effective refresh period; non-positive settings use the default.
    pub fn refresh_interval(&self) -> Duration {
        if self.refresh_interval_ms == 0 {
            DEFAULT_REFRESH_INTERVAL
        } else {
            Duration::from_millis(self.refresh_interval_ms)
        }
    }

    /// Set the refresh period.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the store namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.store.namespace = namespace.into();
        self
    }

    /// Enable or disable inode reclamation.
    pub fn with_reclaim_inodes(mut self, reclaim: bool) -> Self {
        self.reclaim_inodes = reclaim;
        self
    }
}
