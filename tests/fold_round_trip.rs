use serde_json::json;

use crossfold::{
    CorpusLoader, CorpusRef, DatasetHandle, DiscoveryMode, FoldError, FoldRequest,
    InMemoryCorpus, JsonlCodec, MissingDir, Partition, PartitionStore, RowTable, SplitCategory,
    Stage, StorageConfig, create_folds,
};

fn corpus(train_rows: usize, test_rows: usize) -> InMemoryCorpus {
    let rows = |n: usize, prefix: &str| {
        (0..n)
            .map(|idx| json!({ "text": format!("{prefix} review {idx}"), "label": idx % 2 }))
            .collect::<Vec<_>>()
    };
    InMemoryCorpus::new("imdb")
        .with_config("plain_text")
        .with_split("train", rows(train_rows, "train"))
        .with_split("test", rows(test_rows, "test"))
}

fn imdb() -> CorpusRef {
    CorpusRef::new("imdb").with_config("plain_text")
}

#[test]
fn twenty_folds_survive_a_save_load_cycle() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let source = corpus(2000, 300);
    let folds = create_folds(&source, &FoldRequest::new(imdb(), 20).with_limit_percent(90))
        .expect("fold construction should succeed");
    assert_eq!(folds.len(), 20);

    let store = PartitionStore::new(StorageConfig::new(temp.path()), JsonlCodec::new());
    store.init_layout().expect("failed creating stage roots");

    let train_counts: Vec<usize> = folds.train.iter().map(DatasetHandle::num_rows).collect();
    let val_counts: Vec<usize> = folds.val.iter().map(DatasetHandle::num_rows).collect();
    assert!(val_counts.iter().all(|&rows| rows == 80));
    assert!(train_counts.iter().all(|&rows| rows == 1920));

    store
        .save(&Partition::Many(folds.train.clone()), "imdb", SplitCategory::Train, Stage::Raw)
        .expect("saving train folds should succeed");
    store
        .save(&Partition::Many(folds.val.clone()), "imdb", SplitCategory::Val, Stage::Raw)
        .expect("saving val folds should succeed");

    let test = source
        .load(&imdb(), &["test".parse().expect("bare split parses")], &Default::default())
        .expect("test split should load")
        .pop()
        .expect("one handle per expression");
    store
        .save(&Partition::Single(test), "imdb", SplitCategory::Test, Stage::Raw)
        .expect("saving the test split should succeed");

    let train = store
        .load("imdb", SplitCategory::Train, Stage::Raw)
        .expect("train folds should load");
    assert_eq!(train.row_counts(), train_counts);
    assert_eq!(train.into_vec(), folds.train);

    let val = store
        .load("imdb", SplitCategory::Val, Stage::Raw)
        .expect("val folds should load");
    assert_eq!(val.into_vec(), folds.val);

    let test = store
        .load("imdb", SplitCategory::Test, Stage::Raw)
        .expect("test split should load");
    assert!(test.is_single());
    assert_eq!(test.row_counts(), vec![300]);
}

#[test]
fn prefix_scan_reads_folds_in_lexicographic_order() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let source = corpus(1200, 0);
    let folds = create_folds(&source, &FoldRequest::new(imdb(), 12))
        .expect("fold construction should succeed");
    let first_ids: Vec<String> = folds
        .val
        .iter()
        .map(|fold| fold.rows()[0]["text"].as_str().unwrap_or_default().to_string())
        .collect();

    let store = PartitionStore::new(
        StorageConfig::new(temp.path()).with_discovery(DiscoveryMode::PrefixScan),
        JsonlCodec::new(),
    );
    store.init_layout().expect("failed creating stage roots");
    store
        .save(&Partition::Many(folds.val), "imdb", SplitCategory::Val, Stage::Processed)
        .expect("saving val folds should succeed");

    let loaded: Vec<RowTable> = store
        .load("imdb", SplitCategory::Val, Stage::Processed)
        .expect("val folds should load")
        .into_vec();
    let loaded_ids: Vec<String> = loaded
        .iter()
        .map(|fold| fold.rows()[0]["text"].as_str().unwrap_or_default().to_string())
        .collect();

    // imdb_0, imdb_1, imdb_10, imdb_11, imdb_2, ...
    let expected: Vec<String> = [0, 1, 10, 11, 2, 3, 4, 5, 6, 7, 8, 9]
        .iter()
        .map(|&idx| first_ids[idx].clone())
        .collect();
    assert_eq!(loaded_ids, expected);
}

#[test]
fn failures_surface_as_typed_errors() {
    let temp = tempfile::tempdir().expect("failed creating tempdir");
    let source = corpus(100, 10);

    let err = create_folds(&source, &FoldRequest::new(imdb(), 5).with_limit_percent(101))
        .expect_err("limit above 100 must be rejected");
    assert!(matches!(err, FoldError::InvalidArgument(_)));

    let err = create_folds(&source, &FoldRequest::new(CorpusRef::new("imdb"), 5))
        .expect_err("missing config must be rejected by the loader");
    assert!(matches!(err, FoldError::Corpus { .. }));

    let store = PartitionStore::new(StorageConfig::new(temp.path()), JsonlCodec::new());
    let err = store
        .save(&Partition::Single(RowTable::default()), "x", SplitCategory::Train, Stage::Raw)
        .expect_err("save must not create stage roots");
    assert!(matches!(
        err,
        FoldError::DirectoryNotFound { kind: MissingDir::StageRoot, .. }
    ));

    let err = store
        .save_dyn(Box::new(3.5_f64), "x", SplitCategory::Train, Stage::Raw)
        .expect_err("numbers are not partitions");
    assert!(matches!(err, FoldError::TypeMismatch { .. }));
}
