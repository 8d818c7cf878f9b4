use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::data::RowTable;
use crate::errors::FoldError;
use crate::slice::SliceExpr;
use crate::types::{ConfigName, CorpusName, SplitName};

use super::{CorpusLoader, CorpusRef, LoadOptions, materialize_expr};

/// Corpus held entirely in memory.
///
/// Useful as a fake in tests and for small fixture corpora.
#[derive(Clone, Debug)]
pub struct InMemoryCorpus {
    name: CorpusName,
    config: Option<ConfigName>,
    splits: HashMap<SplitName, Arc<RowTable>>,
}

impl InMemoryCorpus {
    /// Create an empty corpus named `name`.
    pub fn new(name: impl Into<CorpusName>) -> Self {
        Self {
            name: name.into(),
            config: None,
            splits: HashMap::new(),
        }
    }

    /// Require callers to address this corpus with `config`.
    pub fn with_config(mut self, config: impl Into<ConfigName>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Register a split.
    pub fn with_split(mut self, split: impl Into<SplitName>, rows: Vec<Value>) -> Self {
        self.splits
            .insert(split.into(), Arc::new(RowTable::new(rows)));
        self
    }

    /// Row count of a registered split.
    pub fn split_len(&self, split: &str) -> Option<usize> {
        self.splits.get(split).map(|rows| rows.rows().len())
    }

    fn check_ref(&self, corpus: &CorpusRef) -> Result<(), FoldError> {
        if corpus.name != self.name {
            return Err(FoldError::corpus(
                corpus.name.clone(),
                format!("unknown corpus (this loader serves '{}')", self.name),
            ));
        }
        if let Some(expected) = &self.config
            && corpus.config.as_ref() != Some(expected)
        {
            return Err(FoldError::corpus(
                corpus.name.clone(),
                format!(
                    "config {:?} does not match available config '{expected}'",
                    corpus.config
                ),
            ));
        }
        Ok(())
    }
}

impl CorpusLoader for InMemoryCorpus {
    type Handle = RowTable;

    fn load(
        &self,
        corpus: &CorpusRef,
        slices: &[SliceExpr],
        _options: &LoadOptions,
    ) -> Result<Vec<RowTable>, FoldError> {
        self.check_ref(corpus)?;
        slices
            .iter()
            .map(|expr| {
                debug!("[crossfold:memory] materializing {expr} from {corpus}");
                materialize_expr(expr, |split| {
                    self.splits.get(split).cloned().ok_or_else(|| {
                        FoldError::corpus(corpus.name.clone(), format!("unknown split '{split}'"))
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetHandle;
    use serde_json::json;

    fn corpus() -> InMemoryCorpus {
        InMemoryCorpus::new("reviews").with_split(
            "train",
            (0..200).map(|idx| json!({ "text": format!("review {idx}"), "label": idx % 2 })).collect(),
        )
    }

    #[test]
    fn load_returns_one_handle_per_expression() {
        let slices: Vec<SliceExpr> = ["train[0%:10%]", "train[10%:100%]"]
            .iter()
            .map(|raw| raw.parse().unwrap())
            .collect();
        let handles = corpus()
            .load(&CorpusRef::new("reviews"), &slices, &LoadOptions::new())
            .unwrap();
        assert_eq!(handles.iter().map(|h| h.num_rows()).collect::<Vec<_>>(), vec![20, 180]);
    }

    #[test]
    fn load_rejects_unknown_corpus_split_and_config() {
        let slices = vec!["train[0%:10%]".parse::<SliceExpr>().unwrap()];
        let opts = LoadOptions::new();
        assert!(matches!(
            corpus().load(&CorpusRef::new("other"), &slices, &opts),
            Err(FoldError::Corpus { .. })
        ));

        let bad_split = vec!["dev[0%:10%]".parse::<SliceExpr>().unwrap()];
        assert!(matches!(
            corpus().load(&CorpusRef::new("reviews"), &bad_split, &opts),
            Err(FoldError::Corpus { reason, .. }) if reason.contains("dev")
        ));

        let configured = corpus().with_config("plain_text");
        assert!(configured.load(&CorpusRef::new("reviews"), &slices, &opts).is_err());
        assert!(
            configured
                .load(&CorpusRef::new("reviews").with_config("plain_text"), &slices, &opts)
                .is_ok()
        );
        assert_eq!(configured.split_len("train"), Some(200));
    }
}
