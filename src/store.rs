//! Partition persistence under `<root>/<raw|processed>/<train|val|test>/`.
//!
//! Naming:
//! - `Partition::Single` is stored at `<split_dir>/<name>`
//! - `Partition::Many` is stored at `<split_dir>/<name>_<idx>` (zero-based)
//! - every save also writes `<split_dir>/<name>.manifest.json`
//!
//! Loading uses the manifest when `DiscoveryMode::Manifest` is active and the
//! manifest exists; otherwise every directory starting with `<name>` is
//! matched and sorted lexicographically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::DatasetCodec;
use crate::config::{DiscoveryMode, StorageConfig};
use crate::constants::storage::{INDEX_SEPARATOR, MANIFEST_SUFFIX, MANIFEST_VERSION};
use crate::data::{DatasetHandle, Partition};
use crate::errors::{FoldError, MissingDir};
use crate::splits::{SplitCategory, Stage};
use crate::transport::fs::child_dirs_with_prefix;
use crate::types::DatasetName;

/// Shape recorded in a partition manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Stored without an index suffix.
    Single,
    /// Stored as `<name>_<idx>`.
    Many,
}

/// Sidecar describing what a save wrote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionManifest {
    /// Manifest schema version.
    pub version: u32,
    /// Logical partition name.
    pub name: DatasetName,
    /// Single dataset or ordered list.
    pub kind: PartitionKind,
    /// Directory names relative to the split directory, in save order.
    pub entries: Vec<String>,
    /// Row count per entry.
    pub row_counts: Vec<usize>,
    /// Save timestamp.
    pub saved_at: DateTime<Utc>,
}

/// Saves and reloads partitions through a `DatasetCodec`.
pub struct PartitionStore<C> {
    config: StorageConfig,
    codec: C,
}

impl<C: DatasetCodec> PartitionStore<C> {
    /// Create a store over `config` using `codec` for each dataset directory.
    pub fn new(config: StorageConfig, codec: C) -> Self {
        Self { config, codec }
    }

    /// Active storage configuration.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// `<root>/<raw|processed>`.
    pub fn stage_root(&self, stage: Stage) -> PathBuf {
        self.config.root.join(stage.dir_name())
    }

    /// `<root>/<raw|processed>/<split>`.
    pub fn split_dir(&self, split: SplitCategory, stage: Stage) -> PathBuf {
        self.stage_root(stage).join(split.dir_name())
    }

    /// Create both stage roots. Saving never does this implicitly.
    pub fn init_layout(&self) -> Result<Vec<PathBuf>, FoldError> {
        [Stage::Raw, Stage::Processed]
            .into_iter()
            .map(|stage| {
                let root = self.stage_root(stage);
                fs::create_dir_all(&root)?;
                Ok(root)
            })
            .collect()
    }

    /// Persist `partition` under `name`, returning the written directories.
    ///
    /// Earlier entries of a list stay on disk when a later one fails.
    pub fn save(
        &self,
        partition: &Partition<C::Handle>,
        name: &str,
        split: SplitCategory,
        stage: Stage,
    ) -> Result<Vec<PathBuf>, FoldError> {
        validate_name(name)?;
        let stage_root = self.stage_root(stage);
        if !stage_root.is_dir() {
            return Err(FoldError::DirectoryNotFound {
                kind: MissingDir::StageRoot,
                path: stage_root,
            });
        }
        let split_dir = stage_root.join(split.dir_name());
        fs::create_dir_all(&split_dir)?;

        let manifest_path = manifest_path(&split_dir, name);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path)?;
        }

        let entries: Vec<String> = match partition {
            Partition::Single(_) => vec![name.to_string()],
            Partition::Many(items) => (0..items.len()).map(|idx| indexed_name(name, idx)).collect(),
        };
        let mut written = Vec::with_capacity(entries.len());
        for (entry, handle) in entries.iter().zip(partition.handles()) {
            let dir = split_dir.join(entry);
            self.codec.write(handle, &dir)?;
            debug!(
                "[crossfold:store] wrote {} rows to {}",
                handle.num_rows(),
                dir.display()
            );
            written.push(dir);
        }

        let manifest = PartitionManifest {
            version: MANIFEST_VERSION,
            name: name.to_string(),
            kind: if partition.is_single() {
                PartitionKind::Single
            } else {
                PartitionKind::Many
            },
            entries,
            row_counts: partition.row_counts(),
            saved_at: Utc::now(),
        };
        let encoded = serde_json::to_vec_pretty(&manifest).map_err(|err| FoldError::Manifest {
            path: manifest_path.clone(),
            reason: err.to_string(),
        })?;
        fs::write(&manifest_path, encoded)?;

        info!(
            "[crossfold:store] saved '{name}' ({} dataset(s)) to {}",
            written.len(),
            split_dir.display()
        );
        Ok(written)
    }

    /// Persist a dynamically typed value: a handle or a `Vec` of handles.
    ///
    /// Any other value fails with `TypeMismatch` before touching the filesystem.
    pub fn save_dyn(
        &self,
        value: Box<dyn Any>,
        name: &str,
        split: SplitCategory,
        stage: Stage,
    ) -> Result<Vec<PathBuf>, FoldError>
    where
        C::Handle: 'static,
    {
        let partition = Partition::<C::Handle>::from_dyn(value)?;
        self.save(&partition, name, split, stage)
    }

    /// Reload the partition stored under `name`.
    pub fn load(
        &self,
        name: &str,
        split: SplitCategory,
        stage: Stage,
    ) -> Result<Partition<C::Handle>, FoldError> {
        validate_name(name)?;
        let stage_root = self.stage_root(stage);
        if !stage_root.is_dir() {
            return Err(FoldError::DirectoryNotFound {
                kind: MissingDir::StageRoot,
                path: stage_root,
            });
        }
        let split_dir = stage_root.join(split.dir_name());
        if !split_dir.is_dir() {
            return Err(FoldError::DirectoryNotFound {
                kind: MissingDir::SplitDir,
                path: split_dir,
            });
        }

        if self.config.discovery == DiscoveryMode::Manifest {
            let manifest_path = manifest_path(&split_dir, name);
            if manifest_path.is_file() {
                return self.load_from_manifest(&split_dir, &manifest_path, name);
            }
            debug!(
                "[crossfold:store] no manifest for '{name}' in {}; scanning by prefix",
                split_dir.display()
            );
        }
        self.load_by_prefix(&split_dir, name)
    }

    fn load_from_manifest(
        &self,
        split_dir: &Path,
        manifest_path: &Path,
        name: &str,
    ) -> Result<Partition<C::Handle>, FoldError> {
        let manifest = read_manifest(manifest_path)?;
        if manifest.name != name {
            return Err(FoldError::Manifest {
                path: manifest_path.to_path_buf(),
                reason: format!("records name '{}' instead of '{name}'", manifest.name),
            });
        }
        let mut handles = Vec::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            let dir = split_dir.join(entry);
            if !dir.is_dir() {
                return Err(FoldError::Manifest {
                    path: manifest_path.to_path_buf(),
                    reason: format!("entry '{entry}' is missing from {}", split_dir.display()),
                });
            }
            handles.push(self.codec.read(&dir)?);
        }
        info!(
            "[crossfold:store] loaded '{name}' ({} dataset(s)) via manifest from {}",
            handles.len(),
            split_dir.display()
        );
        match manifest.kind {
            PartitionKind::Single => match <[_; 1]>::try_from(handles) {
                Ok([handle]) => Ok(Partition::Single(handle)),
                Err(handles) => Err(FoldError::Manifest {
                    path: manifest_path.to_path_buf(),
                    reason: format!("single partition lists {} entries", handles.len()),
                }),
            },
            PartitionKind::Many => Ok(Partition::Many(handles)),
        }
    }

    fn load_by_prefix(
        &self,
        split_dir: &Path,
        name: &str,
    ) -> Result<Partition<C::Handle>, FoldError> {
        let matches = child_dirs_with_prefix(split_dir, name)?;
        if matches.is_empty() {
            return Err(FoldError::NotFound {
                name: name.to_string(),
                dir: split_dir.to_path_buf(),
            });
        }
        info!(
            "[crossfold:store] loading '{name}' from {} ({} match(es))",
            split_dir.display(),
            matches.len()
        );
        if matches.len() == 1 && matches[0].name == name {
            return Ok(Partition::Single(self.codec.read(&matches[0].path)?));
        }
        if matches
            .iter()
            .any(|entry| entry.name != name && !is_indexed_entry(&entry.name, name))
        {
            warn!(
                "[crossfold:store] prefix '{name}' also matched unrelated directories in {}",
                split_dir.display()
            );
        }
        matches
            .iter()
            .map(|entry| self.codec.read(&entry.path))
            .collect::<Result<Vec<_>, _>>()
            .map(Partition::Many)
    }
}

fn validate_name(name: &str) -> Result<(), FoldError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(FoldError::InvalidArgument(format!(
            "partition name '{name}' must be a single non-empty path component"
        )));
    }
    Ok(())
}

fn indexed_name(name: &str, idx: usize) -> String {
    format!("{name}{INDEX_SEPARATOR}{idx}")
}

fn is_indexed_entry(entry: &str, name: &str) -> bool {
    entry
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(INDEX_SEPARATOR))
        .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
}

fn manifest_path(split_dir: &Path, name: &str) -> PathBuf {
    split_dir.join(format!("{name}{MANIFEST_SUFFIX}"))
}

fn read_manifest(path: &Path) -> Result<PartitionManifest, FoldError> {
    let bytes = fs::read(path)?;
    let manifest: PartitionManifest =
        serde_json::from_slice(&bytes).map_err(|err| FoldError::Manifest {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    if manifest.version != MANIFEST_VERSION {
        return Err(FoldError::Manifest {
            path: path.to_path_buf(),
            reason: format!(
                "unsupported version {} (expected {MANIFEST_VERSION})",
                manifest.version
            ),
        });
    }
    if manifest.entries.len() != manifest.row_counts.len() {
        return Err(FoldError::Manifest {
            path: path.to_path_buf(),
            reason: "entries and row_counts differ in length".to_string(),
        });
    }
    Ok(manifest)
}
