use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::constants::huggingface::{
    HUB_RETRIES, PARQUET_MANIFEST_ENDPOINT, PARQUET_REVISION, TOKEN_OPTION,
};
use crate::constants::snapshot::PARTIAL_EXTENSION;
use crate::data::RowTable;
use crate::errors::FoldError;
use crate::slice::SliceExpr;

use super::snapshot::{normalized_extensions, shard_matches_split};
use super::{CorpusLoader, CorpusRef, LoadOptions, SnapshotConfig, SnapshotCorpus};

/// Where a remote shard can be fetched from.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ShardLocation {
    /// Direct download URL from the datasets-server parquet manifest.
    Url(String),
    /// File name inside the hub's parquet-conversion revision.
    Hub(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RemoteShard {
    location: ShardLocation,
    file_name: String,
    size: Option<u64>,
}

/// `CorpusLoader` that mirrors Hugging Face parquet shards into a local
/// snapshot before slicing.
///
/// Splits already present in the snapshot are never re-downloaded.
pub struct HuggingFaceCorpus {
    snapshot: SnapshotCorpus,
    manifest_endpoint: String,
}

impl HuggingFaceCorpus {
    /// Create a loader mirroring into the snapshot described by `config`.
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            snapshot: SnapshotCorpus::new(config),
            manifest_endpoint: PARQUET_MANIFEST_ENDPOINT.to_string(),
        }
    }

    /// Override the datasets-server parquet endpoint.
    pub fn with_manifest_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.manifest_endpoint = endpoint.into();
        self
    }

    /// Local snapshot backing this loader.
    pub fn snapshot(&self) -> &SnapshotCorpus {
        &self.snapshot
    }

    /// Make sure shards for `split` exist locally, downloading them when missing.
    pub fn ensure_split(
        &self,
        corpus: &CorpusRef,
        split: &str,
        options: &LoadOptions,
    ) -> Result<Vec<PathBuf>, FoldError> {
        if let Ok(existing) = self.snapshot.shard_paths(corpus, split)
            && !existing.is_empty()
        {
            return Ok(existing);
        }

        let token = options.get_str(TOKEN_OPTION).map(str::to_string);
        let shards = match self.list_from_manifest(corpus, split, token.as_deref()) {
            Ok(shards) if !shards.is_empty() => shards,
            Ok(_) => self.list_from_hub(corpus, split, token.clone())?,
            Err(err) => {
                warn!(
                    "[crossfold:hf] parquet manifest unavailable for {corpus} ({err}); listing hub revision {PARQUET_REVISION}"
                );
                self.list_from_hub(corpus, split, token.clone())?
            }
        };
        if shards.is_empty() {
            return Err(FoldError::corpus(
                corpus.name.clone(),
                format!("no parquet shards published for split '{split}'"),
            ));
        }

        let split_dir = self.snapshot.split_dir(corpus, split);
        fs::create_dir_all(&split_dir)?;
        for shard in &shards {
            let target = split_dir.join(&shard.file_name);
            if target_matches_expected_size(&target, shard.size) {
                continue;
            }
            match &shard.location {
                ShardLocation::Url(url) => {
                    download_url(&corpus.name, url, &target, token.as_deref())?
                }
                ShardLocation::Hub(remote) => {
                    self.download_hub(corpus, remote, &target, token.clone())?
                }
            }
        }
        self.snapshot.shard_paths(corpus, split)
    }

    fn list_from_manifest(
        &self,
        corpus: &CorpusRef,
        split: &str,
        token: Option<&str>,
    ) -> Result<Vec<RemoteShard>, FoldError> {
        info!(
            "[crossfold:hf] reading datasets-server parquet manifest for {}",
            corpus.name
        );
        let mut request = ureq::get(&self.manifest_endpoint).query("dataset", &corpus.name);
        if let Some(config) = &corpus.config {
            request = request.query("config", config);
        }
        request = request.query("split", split);
        if let Some(token) = token {
            request = request.header("Authorization", &format!("Bearer {token}"));
        }
        let response = request.call().map_err(|err| {
            FoldError::corpus(
                corpus.name.clone(),
                format!("failed querying datasets-server parquet endpoint: {err}"),
            )
        })?;
        let body = response.into_body().read_to_string().map_err(|err| {
            FoldError::corpus(
                corpus.name.clone(),
                format!("failed reading datasets-server parquet response body: {err}"),
            )
        })?;
        let accepted = normalized_extensions(&self.snapshot.config().shard_extensions);
        parse_parquet_manifest(corpus, split, &accepted, &body)
    }

    fn hub_repo(
        &self,
        corpus: &CorpusRef,
        token: Option<String>,
    ) -> Result<hf_hub::api::sync::ApiRepo, FoldError> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .with_retries(HUB_RETRIES)
            .with_token(token)
            .build()
            .map_err(|err| {
                FoldError::corpus(
                    corpus.name.clone(),
                    format!("failed building hf-hub client: {err}"),
                )
            })?;
        Ok(api.repo(Repo::with_revision(
            corpus.name.clone(),
            RepoType::Dataset,
            PARQUET_REVISION.to_string(),
        )))
    }

    fn list_from_hub(
        &self,
        corpus: &CorpusRef,
        split: &str,
        token: Option<String>,
    ) -> Result<Vec<RemoteShard>, FoldError> {
        info!(
            "[crossfold:hf] reading hub file list for {} at {PARQUET_REVISION}",
            corpus.name
        );
        let info = self.hub_repo(corpus, token)?.info().map_err(|err| {
            FoldError::corpus(
                corpus.name.clone(),
                format!("failed reading hf-hub repository info: {err}"),
            )
        })?;
        let siblings: Vec<String> = info
            .siblings
            .into_iter()
            .map(|entry| entry.rfilename)
            .collect();
        let accepted = normalized_extensions(&self.snapshot.config().shard_extensions);
        Ok(hub_candidates(corpus, split, &accepted, &siblings))
    }

    fn download_hub(
        &self,
        corpus: &CorpusRef,
        remote: &str,
        target: &Path,
        token: Option<String>,
    ) -> Result<(), FoldError> {
        let cached = self.hub_repo(corpus, token)?.get(remote).map_err(|err| {
            FoldError::corpus(
                corpus.name.clone(),
                format!("failed downloading '{remote}' from hf-hub: {err}"),
            )
        })?;
        let resolved = fs::canonicalize(&cached).unwrap_or(cached);
        fs::copy(&resolved, target).map_err(|err| {
            FoldError::corpus(
                corpus.name.clone(),
                format!(
                    "failed copying hub file {} -> {}: {err}",
                    resolved.display(),
                    target.display()
                ),
            )
        })?;
        Ok(())
    }
}

impl CorpusLoader for HuggingFaceCorpus {
    type Handle = RowTable;

    fn load(
        &self,
        corpus: &CorpusRef,
        slices: &[SliceExpr],
        options: &LoadOptions,
    ) -> Result<Vec<RowTable>, FoldError> {
        for (key, value) in options.iter() {
            if key != TOKEN_OPTION {
                warn!(
                    "[crossfold:hf] option '{key}'={value} has no effect on parquet shard loading"
                );
            }
        }
        let splits: BTreeSet<&str> = slices
            .iter()
            .flat_map(|expr| expr.ranges().iter().map(|range| range.split.as_str()))
            .collect();
        for split in splits {
            self.ensure_split(corpus, split, options)?;
        }
        self.snapshot.load(corpus, slices, options)
    }
}

fn parse_parquet_manifest(
    corpus: &CorpusRef,
    split: &str,
    accepted: &[String],
    body: &str,
) -> Result<Vec<RemoteShard>, FoldError> {
    let json: Value = serde_json::from_str(body).map_err(|err| {
        FoldError::corpus(
            corpus.name.clone(),
            format!("failed parsing datasets-server parquet response: {err}"),
        )
    })?;
    let mut shards = Vec::new();
    let Some(entries) = json.get("parquet_files").and_then(Value::as_array) else {
        return Ok(shards);
    };
    for entry in entries {
        let Some(url) = entry.get("url").and_then(Value::as_str) else {
            continue;
        };
        if entry.get("split").and_then(Value::as_str) != Some(split) {
            continue;
        }
        if let Some(config) = &corpus.config
            && entry.get("config").and_then(Value::as_str) != Some(config.as_str())
        {
            continue;
        }
        let base_name = entry
            .get("filename")
            .and_then(Value::as_str)
            .or_else(|| url.rsplit('/').next())
            .unwrap_or_default();
        if !has_accepted_extension(base_name, accepted) {
            continue;
        }
        let file_name = match entry.get("config").and_then(Value::as_str) {
            Some(config) => format!("{config}__{base_name}"),
            None => base_name.to_string(),
        };
        shards.push(RemoteShard {
            location: ShardLocation::Url(url.to_string()),
            file_name,
            size: entry.get("size").and_then(Value::as_u64),
        });
    }
    shards.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(shards)
}

fn hub_candidates(
    corpus: &CorpusRef,
    split: &str,
    accepted: &[String],
    siblings: &[String],
) -> Vec<RemoteShard> {
    let mut shards: Vec<RemoteShard> = siblings
        .iter()
        .filter(|remote| has_accepted_extension(remote, accepted))
        .filter(|remote| match &corpus.config {
            Some(config) => remote.starts_with(&format!("{config}/")),
            None => true,
        })
        .filter(|remote| shard_matches_split(Path::new(remote.as_str()), split))
        .map(|remote| RemoteShard {
            location: ShardLocation::Hub(remote.clone()),
            file_name: remote.replace('/', "__"),
            size: None,
        })
        .collect();
    shards.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    shards
}

fn has_accepted_extension(name: &str, accepted: &[String]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| accepted.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn target_matches_expected_size(path: &Path, expected_bytes: Option<u64>) -> bool {
    if !path.exists() {
        return false;
    }
    if let Some(expected) = expected_bytes
        && expected > 0
    {
        return fs::metadata(path)
            .map(|meta| meta.len() == expected)
            .unwrap_or(false);
    }
    true
}

fn download_url(
    corpus: &str,
    url: &str,
    target: &Path,
    token: Option<&str>,
) -> Result<(), FoldError> {
    let partial = target.with_extension(PARTIAL_EXTENSION);
    if partial.exists() {
        let _ = fs::remove_file(&partial);
    }
    let mut request = ureq::get(url);
    if let Some(token) = token {
        request = request.header("Authorization", &format!("Bearer {token}"));
    }
    let response = request.call().map_err(|err| {
        FoldError::corpus(corpus, format!("failed downloading shard URL '{url}': {err}"))
    })?;
    let started = Instant::now();
    let mut reader = response.into_body().into_reader();
    let mut file = File::create(&partial)?;
    let bytes = io::copy(&mut reader, &mut file).map_err(|err| {
        FoldError::corpus(corpus, format!("failed reading shard stream '{url}': {err}"))
    })?;
    drop(file);
    fs::rename(&partial, target)?;
    info!(
        "[crossfold:hf] downloaded {} ({:.1} MiB in {:.1}s)",
        target.display(),
        bytes as f64 / (1024.0 * 1024.0),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
