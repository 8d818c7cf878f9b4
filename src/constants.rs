/// Constants used by fold construction defaults.
pub mod folds {
    /// Source split folded when the request does not name one.
    pub const DEFAULT_SPLIT: &str = "train";
    /// Usage limit applied when the request does not set one.
    pub const DEFAULT_LIMIT_PERCENT: u32 = 100;
    /// Smallest accepted usage limit.
    pub const MIN_LIMIT_PERCENT: u32 = 1;
    /// Largest accepted usage limit.
    pub const MAX_LIMIT_PERCENT: u32 = 100;
}

/// Constants used by slice expressions.
pub mod slices {
    /// Separator joining concatenated slice ranges (`train[0%:4%]+train[8%:100%]`).
    pub const CONCAT_SEPARATOR: char = '+';
    /// Upper bound for percentage boundaries.
    pub const FULL_PERCENT: u32 = 100;
}

/// Constants used by the partition store layout and manifests.
pub mod storage {
    /// Stage directory holding unprocessed partitions.
    pub const RAW_DIR: &str = "raw";
    /// Stage directory holding transformed partitions.
    pub const PROCESSED_DIR: &str = "processed";
    /// Default storage root when neither an explicit path nor the environment sets one.
    pub const DEFAULT_STORAGE_ROOT: &str = "./data";
    /// Environment variable overriding the storage root.
    pub const STORAGE_ROOT_ENV: &str = "CROSSFOLD_STORAGE_ROOT";
    /// Separator between a dataset name and its list index (`<name>_<idx>`).
    pub const INDEX_SEPARATOR: char = '_';
    /// Suffix of the per-name manifest written next to stored partitions.
    pub const MANIFEST_SUFFIX: &str = ".manifest.json";
    /// Manifest schema version.
    pub const MANIFEST_VERSION: u32 = 1;
}

/// Constants used by the JSON-lines dataset codec.
pub mod codec {
    /// Row payload file written into each partition directory.
    pub const DATA_FILENAME: &str = "data-00000-of-00001.jsonl";
    /// Metadata file written into each partition directory.
    pub const INFO_FILENAME: &str = "dataset_info.json";
}

/// Constants used by local snapshot corpora.
pub mod snapshot {
    /// Snapshot root used by the CLI when none is given.
    pub const DEFAULT_SNAPSHOT_ROOT: &str = "./snapshots";
    /// Config directory used when a corpus reference carries no config tag.
    pub const DEFAULT_CONFIG: &str = "default";
    /// Shard extensions read by default.
    pub const DEFAULT_SHARD_EXTENSIONS: [&str; 3] = ["parquet", "jsonl", "ndjson"];
    /// Extension of partially downloaded shards.
    pub const PARTIAL_EXTENSION: &str = "part";
}

/// Constants used by the Hugging Face corpus backend.
#[cfg(feature = "huggingface")]
pub mod huggingface {
    /// datasets-server endpoint listing parquet shards.
    pub const PARQUET_MANIFEST_ENDPOINT: &str = "https://datasets-server.huggingface.co/parquet";
    /// Hub revision holding the parquet conversion of a dataset.
    pub const PARQUET_REVISION: &str = "refs/convert/parquet";
    /// Loader option carrying a hub access token.
    pub const TOKEN_OPTION: &str = "token";
    /// Number of hf-hub download retries.
    pub const HUB_RETRIES: usize = 5;
}
