use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{CorpusName, DatasetName};

/// Which level of the storage layout was missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingDir {
    /// `<storage_root>/<raw|processed>`.
    StageRoot,
    /// `<storage_root>/<raw|processed>/<split>`.
    SplitDir,
}

impl fmt::Display for MissingDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingDir::StageRoot => f.write_str("storage stage root"),
            MissingDir::SplitDir => f.write_str("split directory"),
        }
    }
}

/// Error type for fold construction, corpus loading, and partition storage.
#[derive(Debug, Error)]
pub enum FoldError {
    /// Caller-supplied value outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Stage root or split directory is missing.
    #[error("{kind} does not exist: {}", path.display())]
    DirectoryNotFound {
        /// Which layout level was missing.
        kind: MissingDir,
        /// Expected directory path.
        path: PathBuf,
    },
    /// No directory matched the requested name.
    #[error("no stored partitions named '{name}' under {}", dir.display())]
    NotFound {
        /// Requested partition name.
        name: DatasetName,
        /// Split directory that was searched.
        dir: PathBuf,
    },
    /// Value handed to the store is neither a handle nor a list of handles.
    #[error("cannot store a value of type {found}; expected a dataset handle or a list of handles")]
    TypeMismatch {
        /// Description of the rejected value's type.
        found: String,
    },
    /// Corpus loader failure.
    #[error("corpus '{corpus}' failed to load: {reason}")]
    Corpus {
        /// Corpus that failed.
        corpus: CorpusName,
        /// Loader-provided failure detail.
        reason: String,
    },
    /// Dataset serialization failure.
    #[error("dataset codec failure at {}: {reason}", path.display())]
    Codec {
        /// Dataset file or directory involved.
        path: PathBuf,
        /// Codec failure detail.
        reason: String,
    },
    /// Manifest could not be read or disagrees with the directory contents.
    #[error("partition manifest {} is unusable: {reason}", path.display())]
    Manifest {
        /// Manifest file path.
        path: PathBuf,
        /// Why the manifest was rejected.
        reason: String,
    },
    /// Underlying filesystem error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FoldError {
    pub(crate) fn corpus(corpus: impl Into<CorpusName>, reason: impl Into<String>) -> Self {
        FoldError::Corpus {
            corpus: corpus.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn codec(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FoldError::Codec {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
