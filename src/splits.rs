use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::storage::{PROCESSED_DIR, RAW_DIR};
use crate::errors::FoldError;

/// Logical grouping a stored partition belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCategory {
    /// Training data (train folds, full training sets).
    Train,
    /// Validation data (validation folds).
    Val,
    /// Held-out test data.
    Test,
}

impl SplitCategory {
    /// Every category in storage order.
    pub const ALL: [SplitCategory; 3] = [SplitCategory::Train, SplitCategory::Val, SplitCategory::Test];

    /// Directory name used under a stage root.
    pub fn dir_name(self) -> &'static str {
        match self {
            SplitCategory::Train => "train",
            SplitCategory::Val => "val",
            SplitCategory::Test => "test",
        }
    }
}

impl fmt::Display for SplitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for SplitCategory {
    type Err = FoldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(SplitCategory::Train),
            "val" | "validation" => Ok(SplitCategory::Val),
            "test" => Ok(SplitCategory::Test),
            other => Err(FoldError::InvalidArgument(format!(
                "unknown split category '{other}' (expected train, val, or test)"
            ))),
        }
    }
}

/// Parallel storage roots separating source data from transformed data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Unprocessed partitions as sliced from the corpus.
    Raw,
    /// Partitions after downstream transformation.
    Processed,
}

impl Stage {
    /// Map the boolean `raw` flag onto a stage.
    pub fn from_raw_flag(raw: bool) -> Self {
        if raw { Stage::Raw } else { Stage::Processed }
    }

    /// Directory name used under the storage root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Raw => RAW_DIR,
            Stage::Processed => PROCESSED_DIR,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
