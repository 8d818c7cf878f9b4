use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::constants::storage::{DEFAULT_STORAGE_ROOT, STORAGE_ROOT_ENV};

/// How the partition store rediscovers saved datasets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Read `<name>.manifest.json` when present, otherwise fall back to a prefix scan.
    #[default]
    Manifest,
    /// Match every directory whose name starts with the requested name,
    /// sorted lexicographically.
    PrefixScan,
}

/// Storage layout configuration for `PartitionStore`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding the `raw` and `processed` stage roots.
    pub root: PathBuf,
    /// Discovery strategy used on load.
    pub discovery: DiscoveryMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            discovery: DiscoveryMode::default(),
        }
    }
}

impl StorageConfig {
    /// Config rooted at `root` with default discovery.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Resolve the storage root: `explicit`, then `CROSSFOLD_STORAGE_ROOT`, then `./data`.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::resolve_with(explicit, std::env::var_os(STORAGE_ROOT_ENV))
    }

    fn resolve_with(explicit: Option<&Path>, env_root: Option<OsString>) -> Self {
        if let Some(root) = explicit {
            return Self::new(root);
        }
        match env_root {
            Some(root) if !root.is_empty() => Self::new(root),
            _ => Self::default(),
        }
    }

    /// Override the discovery strategy.
    pub fn with_discovery(mut self, discovery: DiscoveryMode) -> Self {
        self.discovery = discovery;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins_over_environment() {
        let config = StorageConfig::resolve_with(
            Some(Path::new("/tmp/explicit")),
            Some(OsString::from("/tmp/env")),
        );
        assert_eq!(config.root, PathBuf::from("/tmp/explicit"));
        assert_eq!(config.discovery, DiscoveryMode::Manifest);
    }

    #[test]
    fn environment_then_default() {
        let from_env = StorageConfig::resolve_with(None, Some(OsString::from("/tmp/env")));
        assert_eq!(from_env.root, PathBuf::from("/tmp/env"));

        let blank_env = StorageConfig::resolve_with(None, Some(OsString::new()));
        assert_eq!(blank_env.root, PathBuf::from(DEFAULT_STORAGE_ROOT));
        assert_eq!(StorageConfig::resolve_with(None, None), StorageConfig::default());
    }

    #[test]
    fn discovery_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&DiscoveryMode::PrefixScan).unwrap(),
            "\"prefix_scan\""
        );
        let config = StorageConfig::new("data").with_discovery(DiscoveryMode::PrefixScan);
        assert_eq!(config.discovery, DiscoveryMode::PrefixScan);
    }
}
