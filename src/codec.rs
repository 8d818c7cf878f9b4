//! Dataset serialization used by the partition store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::constants::codec::{DATA_FILENAME, INFO_FILENAME};
use crate::data::{DatasetHandle, RowTable};
use crate::errors::FoldError;
use crate::hash::{fingerprint_hex, rows_fingerprint};
use crate::types::ColumnName;

/// Writes one dataset handle into a directory and reads it back.
pub trait DatasetCodec {
    /// Handle type this codec serializes.
    type Handle: DatasetHandle;

    /// Serialize `handle` into `dir`, creating it when missing.
    fn write(&self, handle: &Self::Handle, dir: &Path) -> Result<(), FoldError>;

    /// Deserialize the handle stored in `dir`.
    fn read(&self, dir: &Path) -> Result<Self::Handle, FoldError>;
}

/// Metadata stored next to the row payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Number of rows in the payload.
    pub num_rows: usize,
    /// Column names in table order.
    pub columns: Vec<ColumnName>,
    /// Hex fingerprint of the row payload.
    pub fingerprint: String,
}

/// JSON-lines codec for `RowTable`.
///
/// Layout inside the partition directory:
/// - `data-00000-of-00001.jsonl`: one JSON row per line
/// - `dataset_info.json`: `DatasetInfo`
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonlCodec {
    verify: bool,
}

impl JsonlCodec {
    /// Codec that verifies row count and fingerprint on read.
    pub fn new() -> Self {
        Self { verify: true }
    }

    /// Toggle read-time verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

impl DatasetCodec for JsonlCodec {
    type Handle = RowTable;

    fn write(&self, handle: &RowTable, dir: &Path) -> Result<(), FoldError> {
        fs::create_dir_all(dir)?;
        let data_path = dir.join(DATA_FILENAME);
        let mut writer = BufWriter::new(File::create(&data_path)?);
        for row in handle.rows() {
            serde_json::to_writer(&mut writer, row)
                .map_err(|err| FoldError::codec(&data_path, err.to_string()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let info = DatasetInfo {
            num_rows: handle.num_rows(),
            columns: handle.columns().to_vec(),
            fingerprint: fingerprint_hex(rows_fingerprint(handle.rows())),
        };
        let info_path = dir.join(INFO_FILENAME);
        let encoded = serde_json::to_vec_pretty(&info)
            .map_err(|err| FoldError::codec(&info_path, err.to_string()))?;
        fs::write(&info_path, encoded)?;
        Ok(())
    }

    fn read(&self, dir: &Path) -> Result<RowTable, FoldError> {
        let info_path = dir.join(INFO_FILENAME);
        let info: DatasetInfo = match fs::read(&info_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| FoldError::codec(&info_path, err.to_string()))?,
            Err(err) => {
                return Err(FoldError::codec(
                    &info_path,
                    format!("missing dataset info: {err}"),
                ));
            }
        };

        let data_path = dir.join(DATA_FILENAME);
        let file = File::open(&data_path)
            .map_err(|err| FoldError::codec(&data_path, format!("missing row payload: {err}")))?;
        let mut rows = Vec::with_capacity(info.num_rows);
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Value = serde_json::from_str(&line).map_err(|err| {
                FoldError::codec(&data_path, format!("line {}: {err}", idx + 1))
            })?;
            rows.push(row);
        }

        if self.verify {
            if rows.len() != info.num_rows {
                return Err(FoldError::codec(
                    &data_path,
                    format!(
                        "row count {} does not match dataset info ({})",
                        rows.len(),
                        info.num_rows
                    ),
                ));
            }
            let fingerprint = fingerprint_hex(rows_fingerprint(&rows));
            if fingerprint != info.fingerprint {
                return Err(FoldError::codec(
                    &data_path,
                    format!(
                        "fingerprint {fingerprint} does not match dataset info ({})",
                        info.fingerprint
                    ),
                ));
            }
        }
        Ok(RowTable::with_columns(info.columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn table() -> RowTable {
        RowTable::new(vec![
            json!({"text": "great film", "label": 1}),
            json!({"text": "dull", "label": 0}),
        ])
    }

    #[test]
    fn write_then_read_preserves_rows_and_columns() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("fold_0");
        let codec = JsonlCodec::new();
        codec.write(&table(), &dir).unwrap();
        assert!(dir.join(DATA_FILENAME).is_file());

        let info: DatasetInfo =
            serde_json::from_slice(&fs::read(dir.join(INFO_FILENAME)).unwrap()).unwrap();
        assert_eq!(info.num_rows, 2);
        assert_eq!(codec.read(&dir).unwrap(), table());
    }

    #[test]
    fn empty_tables_are_stored() {
        let temp = tempdir().unwrap();
        let codec = JsonlCodec::new();
        codec.write(&RowTable::default(), temp.path()).unwrap();
        assert_eq!(codec.read(temp.path()).unwrap().num_rows(), 0);
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let temp = tempdir().unwrap();
        let codec = JsonlCodec::new();
        codec.write(&table(), temp.path()).unwrap();
        fs::write(
            temp.path().join(DATA_FILENAME),
            "{\"text\":\"dull\",\"label\":0}\n{\"text\":\"great film\",\"label\":1}\n",
        )
        .unwrap();
        assert!(matches!(
            codec.read(temp.path()),
            Err(FoldError::Codec { reason, .. }) if reason.contains("fingerprint")
        ));
        assert_eq!(
            codec.with_verify(false).read(temp.path()).unwrap().num_rows(),
            2
        );
    }

    #[test]
    fn missing_files_are_codec_errors() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            JsonlCodec::new().read(temp.path()),
            Err(FoldError::Codec { .. })
        ));
    }
}
