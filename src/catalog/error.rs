//! Catalog-specific errors.

use thiserror::Error;

use crate::datum::DatumError;

use super::StorageFormat;

/// Errors that can occur during catalog and record operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// Table already exists.
    #[error("table \"{name}\" already exists")]
    TableAlreadyExists { name: String },

    /// A table needs at least one column.
    #[error("table \"{name}\" has no columns")]
    EmptySchema { name: String },

    /// Two columns of one table share a name.
    #[error("column \"{name}\" specified more than once")]
    DuplicateColumn { name: String },

    /// A primary key names a column the table does not have.
    #[error("primary key column \"{name}\" does not exist")]
    UnknownPrimaryKey { name: String },

    /// The requested storage format is not available.
    #[error("storage format {0:?} is not supported")]
    UnsupportedFormat(StorageFormat),

    /// A record was built from the wrong number of values.
    #[error("record has {found} values, table expects {expected}")]
    ColumnCountMismatch { expected: usize, found: usize },

    /// A string value exceeds its column's length.
    #[error("value for column \"{column}\" is {len} bytes, limit is {max}")]
    ValueTooLong {
        column: String,
        len: usize,
        max: usize,
    },

    /// Display names must cover every field.
    #[error("{found} display names given for {expected} fields")]
    DisplayNameCountMismatch { expected: usize, found: usize },

    /// Value conversion or decoding failure.
    #[error(transparent)]
    Datum(#[from] DatumError),
}
