#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command line runner behind the `crossfold` binary.
pub mod cli;
/// Dataset serialization used by the partition store.
pub mod codec;
/// Storage configuration types.
pub mod config;
/// Centralized constants used across folds, slices, sources, and storage.
pub mod constants;
/// Dataset handles and stored partition shapes.
pub mod data;
/// K-fold slice construction.
pub mod folds;
mod hash;
/// Percentage slice expressions.
pub mod slice;
/// Corpus loader traits and built-in loaders.
pub mod source;
/// Split categories and storage stages.
pub mod splits;
/// Partition persistence.
pub mod store;
/// Filesystem helpers.
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use codec::{DatasetCodec, DatasetInfo, JsonlCodec};
pub use config::{DiscoveryMode, StorageConfig};
pub use data::{DatasetHandle, Partition, RowTable};
pub use errors::{FoldError, MissingDir};
pub use folds::{FoldRequest, FoldSpec, Folds, create_folds, fold_specs};
pub use slice::{PercentRange, SliceExpr};
#[cfg(feature = "huggingface")]
pub use source::HuggingFaceCorpus;
pub use source::{CorpusLoader, CorpusRef, InMemoryCorpus, LoadOptions, SnapshotConfig, SnapshotCorpus};
pub use splits::{SplitCategory, Stage};
pub use store::{PartitionKind, PartitionManifest, PartitionStore};
pub use types::{ColumnName, ConfigName, CorpusName, DatasetName, OptionKey, SplitName};
