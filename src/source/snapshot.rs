use parquet::file::reader::{FileReader, SerializedFileReader};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::snapshot::{DEFAULT_CONFIG, DEFAULT_SHARD_EXTENSIONS, PARTIAL_EXTENSION};
use crate::data::RowTable;
use crate::errors::FoldError;
use crate::slice::SliceExpr;
use crate::types::{ConfigName, CorpusName, SplitName};

use super::{CorpusLoader, CorpusRef, LoadOptions, materialize_expr};

/// Configuration for a corpus read from local shard files.
///
/// Layout: `<root>/<corpus>/<config or "default">/...`, where shard files for a
/// split either live under a `<split>/` directory or carry the split in their
/// file name (`<split>-00000-of-00002.parquet`, `corpus-<split>-0.jsonl`).
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Directory holding one subdirectory per corpus.
    pub root: PathBuf,
    /// File extensions accepted as shard files.
    pub shard_extensions: Vec<String>,
}

impl SnapshotConfig {
    /// Create a config rooted at `root` accepting parquet and JSON-lines shards.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shard_extensions: DEFAULT_SHARD_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

type SplitKey = (CorpusName, ConfigName, SplitName);

/// `CorpusLoader` over a local snapshot directory.
///
/// Each split is read once per loader and cached, so the two batched fold
/// requests share a single pass over the shard files.
pub struct SnapshotCorpus {
    config: SnapshotConfig,
    cache: Mutex<HashMap<SplitKey, Arc<RowTable>>>,
}

impl SnapshotCorpus {
    /// Create a loader for the snapshot described by `config`.
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Directory holding all shards of `corpus` for its configuration.
    pub fn config_dir(&self, corpus: &CorpusRef) -> PathBuf {
        self.config
            .root
            .join(&corpus.name)
            .join(corpus.config.as_deref().unwrap_or(DEFAULT_CONFIG))
    }

    /// Canonical directory for shards of one split.
    pub fn split_dir(&self, corpus: &CorpusRef, split: &str) -> PathBuf {
        self.config_dir(corpus).join(split)
    }

    /// Sorted shard files belonging to `split`.
    pub fn shard_paths(&self, corpus: &CorpusRef, split: &str) -> Result<Vec<PathBuf>, FoldError> {
        let config_dir = self.config_dir(corpus);
        if !config_dir.is_dir() {
            return Err(FoldError::corpus(
                corpus.name.clone(),
                format!("snapshot directory {} does not exist", config_dir.display()),
            ));
        }
        let accepted = normalized_extensions(&self.config.shard_extensions);
        let mut shards = Vec::new();
        for entry in WalkDir::new(&config_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|v| v.to_str()) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();
            if ext == PARTIAL_EXTENSION || !accepted.iter().any(|allowed| allowed == &ext) {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&config_dir)
                .unwrap_or(entry.path());
            if shard_matches_split(relative, split) {
                shards.push(entry.path().to_path_buf());
            }
        }
        shards.sort();
        Ok(shards)
    }

    /// All rows of `split`, read from disk on first use.
    pub fn split_rows(&self, corpus: &CorpusRef, split: &str) -> Result<Arc<RowTable>, FoldError> {
        let key = (
            corpus.name.clone(),
            corpus
                .config
                .clone()
                .unwrap_or_else(|| DEFAULT_CONFIG.to_string()),
            split.to_string(),
        );
        if let Some(rows) = self
            .cache
            .lock()
            .map_err(|_| FoldError::corpus(corpus.name.clone(), "snapshot cache lock poisoned"))?
            .get(&key)
        {
            return Ok(rows.clone());
        }

        let started = Instant::now();
        let shards = self.shard_paths(corpus, split)?;
        if shards.is_empty() {
            return Err(FoldError::corpus(
                corpus.name.clone(),
                format!(
                    "no shard files for split '{split}' under {} with extensions {:?}",
                    self.config_dir(corpus).display(),
                    self.config.shard_extensions
                ),
            ));
        }

        let per_shard = shards
            .par_iter()
            .map(|path| read_shard(&corpus.name, path))
            .collect::<Result<Vec<_>, _>>()?;
        let rows: Vec<Value> = per_shard.into_iter().flatten().collect();
        info!(
            "[crossfold:snapshot] read {corpus} split '{split}' in {:.2}s (rows={}, shards={})",
            started.elapsed().as_secs_f64(),
            rows.len(),
            shards.len()
        );

        let table = Arc::new(RowTable::new(rows));
        self.cache
            .lock()
            .map_err(|_| FoldError::corpus(corpus.name.clone(), "snapshot cache lock poisoned"))?
            .insert(key, table.clone());
        Ok(table)
    }
}

impl CorpusLoader for SnapshotCorpus {
    type Handle = RowTable;

    fn load(
        &self,
        corpus: &CorpusRef,
        slices: &[SliceExpr],
        _options: &LoadOptions,
    ) -> Result<Vec<RowTable>, FoldError> {
        slices
            .iter()
            .map(|expr| {
                debug!("[crossfold:snapshot] materializing {expr} from {corpus}");
                materialize_expr(expr, |split| self.split_rows(corpus, split))
            })
            .collect()
    }
}

pub(crate) fn normalized_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

/// True when a shard path (relative to the config directory) belongs to `split`.
pub(crate) fn shard_matches_split(relative: &Path, split: &str) -> bool {
    let in_split_dir = relative
        .components()
        .rev()
        .skip(1)
        .any(|component| matches!(component, Component::Normal(name) if name == split));
    if in_split_dir {
        return true;
    }
    let Some(name) = relative.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.starts_with(&format!("{split}-"))
        || name.starts_with(&format!("{split}."))
        || name.contains(&format!("-{split}-"))
        || name.contains(&format!("-{split}."))
}

fn read_shard(corpus: &str, path: &Path) -> Result<Vec<Value>, FoldError> {
    let is_parquet = path
        .extension()
        .and_then(|v| v.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        read_parquet_rows(corpus, path)
    } else {
        read_jsonl_rows(corpus, path)
    }
}

fn read_jsonl_rows(corpus: &str, path: &Path) -> Result<Vec<Value>, FoldError> {
    let file = File::open(path).map_err(|err| {
        FoldError::corpus(corpus, format!("failed opening shard {}: {err}", path.display()))
    })?;
    let mut rows = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| {
            FoldError::corpus(corpus, format!("failed reading shard {}: {err}", path.display()))
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str::<Value>(trimmed).map_err(|err| {
            FoldError::corpus(
                corpus,
                format!(
                    "failed decoding JSON row in {} at line {}: {err}",
                    path.display(),
                    line_no + 1
                ),
            )
        })?;
        rows.push(value);
    }
    Ok(rows)
}

fn read_parquet_rows(corpus: &str, path: &Path) -> Result<Vec<Value>, FoldError> {
    let file = File::open(path).map_err(|err| {
        FoldError::corpus(corpus, format!("failed opening parquet shard {}: {err}", path.display()))
    })?;
    let reader = SerializedFileReader::new(file).map_err(|err| {
        FoldError::corpus(corpus, format!("failed reading parquet shard {}: {err}", path.display()))
    })?;
    let iter = reader.get_row_iter(None).map_err(|err| {
        FoldError::corpus(
            corpus,
            format!("failed iterating parquet shard {}: {err}", path.display()),
        )
    })?;
    let mut rows = Vec::new();
    for (position, row) in iter.enumerate() {
        let row = row.map_err(|err| {
            FoldError::corpus(
                corpus,
                format!(
                    "failed reading parquet row {position} in {}: {err}",
                    path.display()
                ),
            )
        })?;
        rows.push(row.to_json_value());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetHandle;
    use std::fs;
    use tempfile::tempdir;

    fn write_lines(path: &Path, count: usize, tag: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let body: String = (0..count)
            .map(|idx| format!("{{\"text\":\"{tag} {idx}\",\"label\":{}}}\n", idx % 2))
            .collect();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn split_matching_accepts_directory_and_filename_conventions() {
        assert!(shard_matches_split(Path::new("train/0000.parquet"), "train"));
        assert!(shard_matches_split(Path::new("train-00000-of-00002.parquet"), "train"));
        assert!(shard_matches_split(Path::new("imdb-train-0.jsonl"), "train"));
        assert!(shard_matches_split(Path::new("imdb-train.jsonl"), "train"));
        assert!(!shard_matches_split(Path::new("pretrain/0000.parquet"), "train"));
        assert!(!shard_matches_split(Path::new("test/0000.parquet"), "train"));
        assert!(!shard_matches_split(Path::new("train_extra.jsonl"), "train"));
    }

    #[test]
    fn shards_are_read_in_sorted_order_and_cached() {
        let temp = tempdir().unwrap();
        let split_dir = temp.path().join("reviews").join("default").join("train");
        write_lines(&split_dir.join("0001.jsonl"), 3, "second");
        write_lines(&split_dir.join("0000.jsonl"), 2, "first");
        write_lines(
            &temp.path().join("reviews").join("default").join("test").join("0000.jsonl"),
            4,
            "test",
        );

        let corpus = SnapshotCorpus::new(SnapshotConfig::new(temp.path()));
        let reference = CorpusRef::new("reviews");
        let rows = corpus.split_rows(&reference, "train").unwrap();
        assert_eq!(rows.num_rows(), 5);
        assert_eq!(rows.rows()[0]["text"], "first 0");
        assert_eq!(rows.rows()[2]["text"], "second 0");

        fs::remove_dir_all(&split_dir).unwrap();
        let cached = corpus.split_rows(&reference, "train").unwrap();
        assert_eq!(cached.num_rows(), 5);
        assert_eq!(corpus.split_rows(&reference, "test").unwrap().num_rows(), 4);
    }

    #[test]
    fn partial_and_foreign_files_are_ignored() {
        let temp = tempdir().unwrap();
        let split_dir = temp.path().join("reviews").join("default").join("train");
        write_lines(&split_dir.join("0000.jsonl"), 2, "kept");
        fs::write(split_dir.join("0001.part"), b"garbage").unwrap();
        fs::write(split_dir.join("README.md"), b"# notes").unwrap();

        let corpus = SnapshotCorpus::new(SnapshotConfig::new(temp.path()));
        let shards = corpus.shard_paths(&CorpusRef::new("reviews"), "train").unwrap();
        assert_eq!(shards, vec![split_dir.join("0000.jsonl")]);
    }

    #[test]
    fn missing_snapshot_and_bad_rows_surface_corpus_errors() {
        let temp = tempdir().unwrap();
        let corpus = SnapshotCorpus::new(SnapshotConfig::new(temp.path()));
        let reference = CorpusRef::new("reviews").with_config("plain_text");
        assert!(matches!(
            corpus.split_rows(&reference, "train"),
            Err(FoldError::Corpus { reason, .. }) if reason.contains("does not exist")
        ));

        let split_dir = corpus.split_dir(&reference, "train");
        fs::create_dir_all(&split_dir).unwrap();
        assert!(matches!(
            corpus.split_rows(&reference, "train"),
            Err(FoldError::Corpus { reason, .. }) if reason.contains("no shard files")
        ));

        fs::write(split_dir.join("0000.jsonl"), "{\"text\": \"ok\"}\nnot json\n").unwrap();
        assert!(matches!(
            corpus.split_rows(&reference, "train"),
            Err(FoldError::Corpus { reason, .. }) if reason.contains("line 2")
        ));
    }
}
