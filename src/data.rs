use serde_json::Value;
use std::any::{Any, type_name};
use std::ops::Range;

use crate::errors::FoldError;
use crate::types::ColumnName;

/// Opaque in-memory handle to a materialized dataset slice.
pub trait DatasetHandle {
    /// Exact number of rows held by the handle.
    fn num_rows(&self) -> usize;
}

/// Row-oriented dataset with JSON-valued rows.
///
/// Column names are taken from the first object row unless set explicitly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowTable {
    columns: Vec<ColumnName>,
    rows: Vec<Value>,
}

impl RowTable {
    /// Build a table, inferring columns from the first row.
    pub fn new(rows: Vec<Value>) -> Self {
        let columns = infer_columns(&rows);
        Self { columns, rows }
    }

    /// Build a table with an explicit column list.
    pub fn with_columns(columns: Vec<ColumnName>, rows: Vec<Value>) -> Self {
        Self { columns, rows }
    }

    /// Column names in first-seen order.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Rows in corpus order.
    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// Consume the table and return its rows.
    pub fn into_rows(self) -> Vec<Value> {
        self.rows
    }

    /// Copy of the rows in `range` (clamped to the table length).
    pub fn slice(&self, range: Range<usize>) -> RowTable {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        RowTable {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Append another table's rows, keeping this table's columns and adding unseen ones.
    pub fn extend(&mut self, other: RowTable) {
        for column in other.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
    }
}

impl DatasetHandle for RowTable {
    fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

fn infer_columns(rows: &[Value]) -> Vec<ColumnName> {
    rows.iter()
        .find_map(Value::as_object)
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default()
}

/// A stored unit: one dataset, or an ordered list of datasets (folds).
#[derive(Clone, Debug, PartialEq)]
pub enum Partition<H> {
    /// A single dataset stored without an index suffix.
    Single(H),
    /// An ordered list stored as `<name>_<idx>`.
    Many(Vec<H>),
}

impl<H> Partition<H> {
    /// Number of datasets in the partition.
    pub fn len(&self) -> usize {
        match self {
            Partition::Single(_) => 1,
            Partition::Many(items) => items.len(),
        }
    }

    /// True only for an empty list.
    pub fn is_empty(&self) -> bool {
        matches!(self, Partition::Many(items) if items.is_empty())
    }

    /// True for the `Single` variant.
    pub fn is_single(&self) -> bool {
        matches!(self, Partition::Single(_))
    }

    /// Borrow the datasets in storage order.
    pub fn handles(&self) -> Vec<&H> {
        match self {
            Partition::Single(handle) => vec![handle],
            Partition::Many(items) => items.iter().collect(),
        }
    }

    /// Flatten into an ordered list.
    pub fn into_vec(self) -> Vec<H> {
        match self {
            Partition::Single(handle) => vec![handle],
            Partition::Many(items) => items,
        }
    }

    /// Return the single dataset, or `None` for a list.
    pub fn into_single(self) -> Option<H> {
        match self {
            Partition::Single(handle) => Some(handle),
            Partition::Many(_) => None,
        }
    }
}

impl<H: DatasetHandle> Partition<H> {
    /// Row counts per dataset in storage order.
    pub fn row_counts(&self) -> Vec<usize> {
        self.handles().into_iter().map(DatasetHandle::num_rows).collect()
    }
}

impl<H: 'static> Partition<H> {
    /// Resolve a dynamically typed value into a partition.
    ///
    /// Accepts an `H` or a `Vec<H>`; anything else is a `TypeMismatch`.
    pub fn from_dyn(value: Box<dyn Any>) -> Result<Self, FoldError> {
        let value = match value.downcast::<H>() {
            Ok(handle) => return Ok(Partition::Single(*handle)),
            Err(other) => other,
        };
        match value.downcast::<Vec<H>>() {
            Ok(items) => Ok(Partition::Many(*items)),
            Err(other) => Err(FoldError::TypeMismatch {
                found: describe_any(&*other),
            }),
        }
    }
}

fn describe_any(value: &dyn Any) -> String {
    macro_rules! probe {
        ($($ty:ty),*) => {
            $(if value.is::<$ty>() {
                return type_name::<$ty>().to_string();
            })*
        };
    }
    probe!(
        i32, i64, u32, u64, usize, f32, f64, bool, String, &'static str, Value
    );
    "an unsupported value".to_string()
}
