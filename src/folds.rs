//! K-fold cross-validation splits expressed as percentage slices.
//!
//! For fold `i` with `step = limit_percent / fold_count` (truncated):
//! - validation: `split[i*step%:(i+1)*step%]`
//! - train: `split[0%:i*step%]+split[(i+1)*step%:100%]`
//!
//! Train folds deliberately keep everything outside the validation window,
//! including rows beyond `limit_percent`.

use tracing::{debug, info, warn};

use crate::constants::folds::{
    DEFAULT_LIMIT_PERCENT, DEFAULT_SPLIT, MAX_LIMIT_PERCENT, MIN_LIMIT_PERCENT,
};
use crate::constants::slices::FULL_PERCENT;
use crate::errors::FoldError;
use crate::slice::{PercentRange, SliceExpr};
use crate::source::{CorpusLoader, CorpusRef, LoadOptions};
use crate::types::SplitName;

/// Inputs for one fold-construction call.
#[derive(Clone, Debug, PartialEq)]
pub struct FoldRequest {
    /// Corpus to slice.
    pub corpus: CorpusRef,
    /// Number of folds (K).
    pub fold_count: u32,
    /// Split partitioned into folds.
    pub split: SplitName,
    /// Percentage of the split covered by validation folds.
    pub limit_percent: u32,
    /// Options forwarded to the loader untouched.
    pub options: LoadOptions,
}

impl FoldRequest {
    /// Request `fold_count` folds over the default split at 100%.
    pub fn new(corpus: CorpusRef, fold_count: u32) -> Self {
        Self {
            corpus,
            fold_count,
            split: DEFAULT_SPLIT.to_string(),
            limit_percent: DEFAULT_LIMIT_PERCENT,
            options: LoadOptions::default(),
        }
    }

    /// Partition a different split.
    pub fn with_split(mut self, split: impl Into<SplitName>) -> Self {
        self.split = split.into();
        self
    }

    /// Restrict validation folds to the first `limit_percent` of the split.
    pub fn with_limit_percent(mut self, limit_percent: u32) -> Self {
        self.limit_percent = limit_percent;
        self
    }

    /// Replace the loader passthrough options.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }
}

/// Slice pair for a single fold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldSpec {
    /// Zero-based fold index.
    pub index: u32,
    /// Validation window.
    pub val: SliceExpr,
    /// Complement of the validation window.
    pub train: SliceExpr,
}

/// Materialized folds, index-aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct Folds<H> {
    /// Training handle per fold.
    pub train: Vec<H>,
    /// Validation handle per fold.
    pub val: Vec<H>,
}

impl<H> Folds<H> {
    /// Number of folds.
    pub fn len(&self) -> usize {
        self.val.len()
    }

    /// True when no folds were produced.
    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }

    /// Iterate `(train, val)` pairs in fold order.
    pub fn pairs(&self) -> impl Iterator<Item = (&H, &H)> {
        self.train.iter().zip(self.val.iter())
    }
}

/// Compute the slice expressions for every fold without touching a loader.
pub fn fold_specs(
    fold_count: u32,
    limit_percent: u32,
    split: &str,
) -> Result<Vec<FoldSpec>, FoldError> {
    if !(MIN_LIMIT_PERCENT..=MAX_LIMIT_PERCENT).contains(&limit_percent) {
        return Err(FoldError::InvalidArgument(format!(
            "limit_percent must be between {MIN_LIMIT_PERCENT} and {MAX_LIMIT_PERCENT}, got {limit_percent}"
        )));
    }
    if fold_count == 0 {
        return Err(FoldError::InvalidArgument(
            "fold_count must be at least 1".to_string(),
        ));
    }

    let step = limit_percent / fold_count;
    if step == 0 {
        warn!(
            "[crossfold:folds] {fold_count} folds over {limit_percent}% leaves a zero-width validation window; every validation fold will be empty"
        );
    }
    let excluded = limit_percent - step * fold_count;
    if excluded > 0 {
        debug!(
            "[crossfold:folds] {excluded}% of the limit is outside every validation fold"
        );
    }

    (0..fold_count)
        .map(|index| {
            let start = index * step;
            let end = (index + 1) * step;
            let val = SliceExpr::single(PercentRange::new(split, start, end)?);
            let train = SliceExpr::concat(vec![
                PercentRange::new(split, 0, start)?,
                PercentRange::new(split, end, FULL_PERCENT)?,
            ])?;
            Ok(FoldSpec { index, val, train })
        })
        .collect()
}

/// Build `fold_count` train/validation handle pairs through `loader`.
///
/// Issues exactly two loader calls: all validation slices, then all train slices.
pub fn create_folds<L: CorpusLoader>(
    loader: &L,
    request: &FoldRequest,
) -> Result<Folds<L::Handle>, FoldError> {
    let specs = fold_specs(request.fold_count, request.limit_percent, &request.split)?;
    let (val_exprs, train_exprs): (Vec<SliceExpr>, Vec<SliceExpr>) = specs
        .into_iter()
        .map(|spec| (spec.val, spec.train))
        .unzip();

    info!(
        "[crossfold:folds] building {} folds from {} split '{}' (limit {}%)",
        request.fold_count, request.corpus, request.split, request.limit_percent
    );
    let val = load_batch(loader, request, &val_exprs, "validation")?;
    let train = load_batch(loader, request, &train_exprs, "train")?;
    Ok(Folds { train, val })
}

fn load_batch<L: CorpusLoader>(
    loader: &L,
    request: &FoldRequest,
    exprs: &[SliceExpr],
    role: &str,
) -> Result<Vec<L::Handle>, FoldError> {
    debug!(
        "[crossfold:folds] loading {} {role} slices from {}",
        exprs.len(),
        request.corpus
    );
    let handles = loader.load(&request.corpus, exprs, &request.options)?;
    if handles.len() != exprs.len() {
        return Err(FoldError::corpus(
            request.corpus.name.clone(),
            format!(
                "loader returned {} {role} datasets for {} slice expressions",
                handles.len(),
                exprs.len()
            ),
        ));
    }
    Ok(handles)
}
