//! Corpus loader interfaces and built-in loaders.
//!
//! Ownership model:
//! - `CorpusLoader` turns slice expressions into materialized dataset handles.
//! - Loaders own any network or disk access; the fold splitter only builds
//!   expressions and never inspects rows.
//! - `materialize_expr` is shared by row-table loaders so every backend
//!   resolves percentage windows identically.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::data::{DatasetHandle, RowTable};
use crate::errors::FoldError;
use crate::slice::SliceExpr;
use crate::types::{ConfigName, CorpusName, OptionKey};

/// Built-in in-memory corpus used for tests and small fixtures.
pub mod memory;
/// Local snapshot corpus reading parquet/jsonl shards.
pub mod snapshot;
/// Hugging Face hub backed corpus that fills a local snapshot on demand.
#[cfg(feature = "huggingface")]
pub mod huggingface;

pub use memory::InMemoryCorpus;
pub use snapshot::{SnapshotCorpus, SnapshotConfig};
#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceCorpus;

/// Address of a corpus: name plus optional configuration tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorpusRef {
    /// Corpus name, e.g. `imdb`.
    pub name: CorpusName,
    /// Optional configuration tag, e.g. `plain_text`.
    pub config: Option<ConfigName>,
}

impl CorpusRef {
    /// Reference a corpus without a configuration tag.
    pub fn new(name: impl Into<CorpusName>) -> Self {
        Self {
            name: name.into(),
            config: None,
        }
    }

    /// Attach a configuration tag.
    pub fn with_config(mut self, config: impl Into<ConfigName>) -> Self {
        self.config = Some(config.into());
        self
    }
}

impl fmt::Display for CorpusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config {
            Some(config) => write!(f, "{}/{}", self.name, config),
            None => f.write_str(&self.name),
        }
    }
}

/// Passthrough options forwarded to the corpus loader untouched.
///
/// Example keys: `trust_remote_code`, `token`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadOptions {
    entries: BTreeMap<OptionKey, Value>,
}

impl LoadOptions {
    /// Empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<OptionKey>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<OptionKey>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up an option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a string-valued option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &Value)> {
        self.entries.iter()
    }

    /// True when no options are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loader capability used by the fold splitter.
///
/// Implementations must return exactly one handle per expression, in input order.
pub trait CorpusLoader {
    /// Handle type produced for each materialized expression.
    type Handle: DatasetHandle;

    /// Materialize every expression in `slices` from `corpus`.
    fn load(
        &self,
        corpus: &CorpusRef,
        slices: &[SliceExpr],
        options: &LoadOptions,
    ) -> Result<Vec<Self::Handle>, FoldError>;
}

impl<L: CorpusLoader + ?Sized> CorpusLoader for &L {
    type Handle = L::Handle;

    fn load(
        &self,
        corpus: &CorpusRef,
        slices: &[SliceExpr],
        options: &LoadOptions,
    ) -> Result<Vec<Self::Handle>, FoldError> {
        (**self).load(corpus, slices, options)
    }
}

/// Resolve `expr` against full split rows supplied by `split_rows`.
///
/// Windows are concatenated in expression order.
pub fn materialize_expr<F>(expr: &SliceExpr, mut split_rows: F) -> Result<RowTable, FoldError>
where
    F: FnMut(&str) -> Result<Arc<RowTable>, FoldError>,
{
    let mut out: Option<RowTable> = None;
    for range in expr.ranges() {
        let rows = split_rows(&range.split)?;
        let part = rows.slice(range.row_bounds(rows.num_rows()));
        match out.as_mut() {
            Some(table) => table.extend(part),
            None => out = Some(part),
        }
    }
    Ok(out.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn materialize_concatenates_windows_in_order() {
        let rows = Arc::new(RowTable::new(
            (0..10).map(|idx| json!({ "idx": idx })).collect(),
        ));
        let expr: SliceExpr = "train[80%:100%]+train[0%:20%]".parse().unwrap();
        let table = materialize_expr(&expr, |_| Ok(rows.clone())).unwrap();
        let order: Vec<i64> = table
            .rows()
            .iter()
            .map(|row| row["idx"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![8, 9, 0, 1]);
    }

    #[test]
    fn materialize_propagates_split_lookup_errors() {
        let expr: SliceExpr = "missing[0%:10%]".parse().unwrap();
        let err = materialize_expr(&expr, |split| {
            Err(FoldError::corpus("demo", format!("unknown split '{split}'")))
        })
        .unwrap_err();
        assert!(matches!(err, FoldError::Corpus { reason, .. } if reason.contains("missing")));
    }

    #[test]
    fn load_options_keep_passthrough_values() {
        let options = LoadOptions::new()
            .with("trust_remote_code", true)
            .with("token", "hf_abc");
        assert_eq!(options.get("trust_remote_code"), Some(&json!(true)));
        assert_eq!(options.get_str("token"), Some("hf_abc"));
        assert_eq!(options.iter().count(), 2);
        assert!(!options.is_empty());
        assert_eq!(CorpusRef::new("imdb").with_config("plain_text").to_string(), "imdb/plain_text");
    }
}
