//! One result row, assembled from a column-major fetch batch.
//!
//! The decoder produces values column by column; rows are cut from those
//! columns and all rows of a statement share the same `ColumnInfo`.

use std::sync::Arc;

use super::column::ColumnInfo;
use super::metadata::ColumnMetadata;
use super::value::SqreamValue;

/// A fetched row: one `SqreamValue` per result column, in `queryTypeOut` order.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<SqreamValue>,
    column_info: Arc<ColumnInfo>,
}

impl Row {
    pub fn new(values: Vec<SqreamValue>, column_info: Arc<ColumnInfo>) -> Self {
        Self {
            values,
            column_info,
        }
    }

    /// Value at a 0-based column position.
    pub fn get(&self, index: usize) -> Option<&SqreamValue> {
        self.values.get(index)
    }

    /// Value of a named column. SQream folds unquoted names to lower case,
    /// so the lookup ignores case.
    pub fn get_by_name(&self, name: &str) -> Option<&SqreamValue> {
        self.column_info
            .find_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Whether the column at `index` was flagged null in the fetch batch.
    /// Out-of-range positions are not null.
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(SqreamValue::Null))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqreamValue] {
        &self.values
    }

    /// Take the values, dropping the shared column info.
    pub fn into_values(self) -> Vec<SqreamValue> {
        self.values
    }

    /// Metadata of the statement's result columns.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.column_info.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.column_info.column_names()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqreamValue> {
        self.values.iter()
    }
}

impl IntoIterator for Row {
    type Item = SqreamValue;
    type IntoIter = std::vec::IntoIter<SqreamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a SqreamValue;
    type IntoIter = std::slice::Iter<'a, SqreamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
