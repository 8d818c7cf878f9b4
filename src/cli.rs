use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};

use crate::codec::JsonlCodec;
use crate::config::{DiscoveryMode, StorageConfig};
use crate::constants::folds::{DEFAULT_LIMIT_PERCENT, DEFAULT_SPLIT};
use crate::constants::snapshot::DEFAULT_SNAPSHOT_ROOT;
use crate::data::{DatasetHandle, Partition, RowTable};
use crate::folds::{FoldRequest, create_folds};
use crate::slice::SliceExpr;
use crate::source::{CorpusLoader, CorpusRef, LoadOptions, SnapshotConfig, SnapshotCorpus};
use crate::splits::{SplitCategory, Stage};
use crate::store::PartitionStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Train,
    Val,
    Test,
}

impl From<CategoryArg> for SplitCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Train => SplitCategory::Train,
            CategoryArg::Val => SplitCategory::Val,
            CategoryArg::Test => SplitCategory::Test,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "crossfold",
    disable_help_subcommand = true,
    about = "Build and persist k-fold cross-validation partitions",
    after_help = "The storage root is resolved in order by --storage-root, CROSSFOLD_STORAGE_ROOT, then ./data."
)]
struct CrossfoldCli {
    #[arg(
        long = "storage-root",
        value_name = "PATH",
        global = true,
        help = "Directory holding the raw/ and processed/ stage roots"
    )]
    storage_root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Slice a corpus into K folds and save train/val lists.
    Folds(FoldsArgs),
    /// Load a stored partition and print its shape.
    Inspect(InspectArgs),
    /// Create the raw/ and processed/ stage roots.
    Init,
}

#[derive(Debug, Args)]
struct FoldsArgs {
    #[arg(long, help = "Corpus name, e.g. imdb or local/reviews")]
    corpus: String,
    #[arg(long, help = "Optional corpus configuration tag")]
    config: Option<String>,
    #[arg(
        long = "folds",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Number of folds (K)"
    )]
    fold_count: u32,
    #[arg(long, default_value = DEFAULT_SPLIT, help = "Source split partitioned into folds")]
    split: String,
    #[arg(
        long = "limit-percent",
        default_value_t = DEFAULT_LIMIT_PERCENT,
        value_parser = clap::value_parser!(u32).range(1..=100),
        help = "Percentage of the split covered by validation folds"
    )]
    limit_percent: u32,
    #[arg(long, help = "Partition name (defaults to the corpus name)")]
    name: Option<String>,
    #[arg(
        long = "test-split",
        value_name = "SPLIT",
        help = "Also save this source split whole under the test category"
    )]
    test_split: Option<String>,
    #[arg(
        long = "snapshot-root",
        value_name = "PATH",
        default_value = DEFAULT_SNAPSHOT_ROOT,
        help = "Local snapshot holding <corpus>/<config>/<split>/ shards"
    )]
    snapshot_root: PathBuf,
    #[arg(
        long = "option",
        value_name = "KEY=VALUE",
        value_parser = parse_option_arg,
        help = "Loader passthrough option, repeat as needed (values parse as JSON when possible)"
    )]
    options: Vec<(String, Value)>,
    #[arg(long, help = "Save under processed/ instead of raw/")]
    processed: bool,
    #[arg(long = "init-layout", help = "Create missing stage roots before saving")]
    init_layout: bool,
    #[arg(
        long,
        help = "Download missing splits from the Hugging Face hub (requires the huggingface feature)"
    )]
    huggingface: bool,
}

#[derive(Debug, Args)]
struct InspectArgs {
    #[arg(long, help = "Partition name")]
    name: String,
    #[arg(long, value_enum, help = "Split category the partition was saved under")]
    category: CategoryArg,
    #[arg(long, help = "Read from processed/ instead of raw/")]
    processed: bool,
    #[arg(
        long = "prefix-scan",
        help = "Ignore manifests and match directories by name prefix"
    )]
    prefix_scan: bool,
}

/// Run the `crossfold` command line with `args_iter` (program name excluded).
pub fn run_crossfold<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<CrossfoldCli, _>(std::iter::once("crossfold".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let storage = StorageConfig::resolve(cli.storage_root.as_deref());
    match cli.command {
        Command::Folds(args) => run_folds(storage, args),
        Command::Inspect(args) => run_inspect(storage, args),
        Command::Init => {
            let store = PartitionStore::new(storage, JsonlCodec::new());
            for root in store.init_layout()? {
                println!("ready: {}", root.display());
            }
            Ok(())
        }
    }
}

fn run_folds(storage: StorageConfig, args: FoldsArgs) -> Result<(), Box<dyn Error>> {
    let snapshot = SnapshotConfig::new(&args.snapshot_root);
    if args.huggingface {
        #[cfg(feature = "huggingface")]
        {
            let loader = crate::source::HuggingFaceCorpus::new(snapshot);
            return build_and_save(&loader, storage, &args);
        }
        #[cfg(not(feature = "huggingface"))]
        return Err("--huggingface requires building crossfold with the huggingface feature".into());
    }
    let loader = SnapshotCorpus::new(snapshot);
    build_and_save(&loader, storage, &args)
}

fn build_and_save<L>(
    loader: &L,
    storage: StorageConfig,
    args: &FoldsArgs,
) -> Result<(), Box<dyn Error>>
where
    L: CorpusLoader<Handle = RowTable>,
{
    let store = PartitionStore::new(storage, JsonlCodec::new());
    if args.init_layout {
        store.init_layout()?;
    }

    let mut corpus = CorpusRef::new(args.corpus.clone());
    if let Some(config) = &args.config {
        corpus = corpus.with_config(config.clone());
    }
    let mut options = LoadOptions::new();
    for (key, value) in &args.options {
        options.insert(key.clone(), value.clone());
    }
    let request = FoldRequest::new(corpus, args.fold_count)
        .with_split(args.split.clone())
        .with_limit_percent(args.limit_percent)
        .with_options(options);

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_partition_name(&args.corpus));
    let stage = Stage::from_raw_flag(!args.processed);

    let folds = create_folds(loader, &request)?;
    println!(
        "{} folds from {} split '{}' (limit {}%)",
        folds.len(),
        request.corpus,
        request.split,
        request.limit_percent
    );
    for (idx, (train, val)) in folds.pairs().enumerate() {
        println!(
            "  fold {idx:>3}: train={:>8} val={:>8}",
            train.num_rows(),
            val.num_rows()
        );
    }

    store.save(&Partition::Many(folds.train), &name, SplitCategory::Train, stage)?;
    store.save(&Partition::Many(folds.val), &name, SplitCategory::Val, stage)?;
    println!(
        "saved '{name}' to {} and {}",
        store.split_dir(SplitCategory::Train, stage).display(),
        store.split_dir(SplitCategory::Val, stage).display()
    );

    if let Some(test_split) = &args.test_split {
        let expr: SliceExpr = test_split.parse()?;
        let mut handles = loader.load(&request.corpus, &[expr], &request.options)?;
        let Some(test) = handles.pop() else {
            return Err(format!("loader returned no dataset for split '{test_split}'").into());
        };
        println!("  test: {} rows", test.num_rows());
        store.save(&Partition::Single(test), &name, SplitCategory::Test, stage)?;
    }
    Ok(())
}

fn run_inspect(storage: StorageConfig, args: InspectArgs) -> Result<(), Box<dyn Error>> {
    let storage = if args.prefix_scan {
        storage.with_discovery(DiscoveryMode::PrefixScan)
    } else {
        storage
    };
    let store = PartitionStore::new(storage, JsonlCodec::new());
    let stage = Stage::from_raw_flag(!args.processed);
    let category = SplitCategory::from(args.category);
    let partition = store.load(&args.name, category, stage)?;

    let shape = if partition.is_single() { "single" } else { "list" };
    println!(
        "'{}' in {}: {shape} of {} dataset(s)",
        args.name,
        store.split_dir(category, stage).display(),
        partition.len()
    );
    for (idx, handle) in partition.handles().into_iter().enumerate() {
        println!(
            "  [{idx:>3}] rows={:>8} columns={}",
            handle.num_rows(),
            handle.columns().join(",")
        );
    }
    Ok(())
}

fn default_partition_name(corpus: &str) -> String {
    corpus.replace(['/', '\\'], "__")
}

fn parse_option_arg(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("--option expects KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("--option key must not be empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DatasetCodec;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn args(raw: &[&str]) -> std::vec::IntoIter<String> {
        raw.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn write_split(snapshot: &Path, split: &str, rows: usize) {
        let dir = snapshot.join("reviews").join("default").join(split);
        fs::create_dir_all(&dir).unwrap();
        let body: String = (0..rows)
            .map(|idx| format!("{{\"id\":{idx},\"label\":{}}}\n", idx % 2))
            .collect();
        fs::write(dir.join("0000.jsonl"), body).unwrap();
    }

    #[test]
    fn option_args_parse_json_or_fall_back_to_strings() {
        assert_eq!(
            parse_option_arg("trust_remote_code=true").unwrap(),
            ("trust_remote_code".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_option_arg("token=hf_abc").unwrap(),
            ("token".to_string(), Value::String("hf_abc".to_string()))
        );
        assert!(parse_option_arg("missing").is_err());
        assert!(parse_option_arg("=1").is_err());
    }

    #[test]
    fn help_exits_cleanly() {
        assert!(run_crossfold(args(&["--help"])).is_ok());
    }

    #[test]
    fn rejects_out_of_range_limit() {
        assert!(
            run_crossfold(args(&[
                "folds", "--corpus", "reviews", "--folds", "5", "--limit-percent", "0"
            ]))
            .is_err()
        );
    }

    #[test]
    fn folds_then_inspect_round_trip() {
        let temp = tempdir().unwrap();
        let snapshot = temp.path().join("snapshots");
        let storage = temp.path().join("data");
        write_split(&snapshot, "train", 200);
        write_split(&snapshot, "test", 50);

        let storage_arg = storage.to_string_lossy().to_string();
        let snapshot_arg = snapshot.to_string_lossy().to_string();
        run_crossfold(args(&[
            "folds",
            "--corpus",
            "reviews",
            "--folds",
            "4",
            "--limit-percent",
            "80",
            "--test-split",
            "test",
            "--init-layout",
            "--snapshot-root",
            &snapshot_arg,
            "--storage-root",
            &storage_arg,
            "--option",
            "trust_remote_code=true",
        ]))
        .unwrap();

        let codec = JsonlCodec::new();
        let val_0 = codec.read(&storage.join("raw/val/reviews_0")).unwrap();
        assert_eq!(val_0.num_rows(), 40);
        let train_3 = codec.read(&storage.join("raw/train/reviews_3")).unwrap();
        assert_eq!(train_3.num_rows(), 160);
        let test = codec.read(&storage.join("raw/test/reviews")).unwrap();
        assert_eq!(test.num_rows(), 50);
        assert!(storage.join("processed").is_dir());

        run_crossfold(args(&[
            "inspect",
            "--name",
            "reviews",
            "--category",
            "val",
            "--storage-root",
            &storage_arg,
        ]))
        .unwrap();
        assert!(
            run_crossfold(args(&[
                "inspect",
                "--name",
                "absent",
                "--category",
                "val",
                "--storage-root",
                &storage_arg,
            ]))
            .is_err()
        );
    }

    #[test]
    fn init_creates_stage_roots() {
        let temp = tempdir().unwrap();
        let storage_arg = temp.path().to_string_lossy().to_string();
        run_crossfold(args(&["init", "--storage-root", &storage_arg])).unwrap();
        assert!(temp.path().join("raw").is_dir());
        assert!(temp.path().join("processed").is_dir());
    }
}
