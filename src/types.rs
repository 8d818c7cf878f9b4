/// Name of a corpus as understood by a corpus loader.
/// Examples: `imdb`, `stanfordnlp/sst2`, `local/reviews`
pub type CorpusName = String;
/// Corpus configuration tag.
/// Examples: `default`, `plain_text`
pub type ConfigName = String;
/// Name of a source split inside a corpus.
/// Examples: `train`, `test`, `unsupervised`
pub type SplitName = String;
/// Logical name a partition is stored under.
/// Examples: `imdb_folds`, `imdb_test`
pub type DatasetName = String;
/// Column name of a row table.
/// Examples: `text`, `label`
pub type ColumnName = String;
/// Key of a passthrough loader option.
/// Examples: `trust_remote_code`, `token`
pub type OptionKey = String;
