//! Executor-specific errors.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::datum::{DatumError, Type};
use crate::tx::TxError;

/// Errors that can occur while binding, planning or executing a query.
///
/// End of stream is not an error: `next`/`next_chunk` report it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The session has no current database.
    #[error("no database selected")]
    DatabaseNotSelected,

    /// Referenced table does not exist.
    #[error("table \"{name}\" does not exist")]
    TableNotFound { name: String },

    /// Referenced column does not exist.
    #[error("column \"{name}\" does not exist")]
    ColumnNotFound { name: String },

    /// Value or expression has the wrong type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Malformed request (bad statement shape, ungrouped column, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Broken internal invariant (row/column count mismatch, missing tuple, ...).
    #[error("internal error: {0}")]
    Internal(String),

    /// Operation or protocol the operator does not implement.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// Integer overflow.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Division by zero in arithmetic expression.
    #[error("division by zero")]
    DivisionByZero,

    /// Value conversion failure.
    #[error(transparent)]
    Datum(#[from] DatumError),

    /// Table creation or record layout failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Transaction failure.
    #[error(transparent)]
    Tx(#[from] TxError),
}

impl ExecutorError {
    /// Type mismatch against a concrete expected type.
    pub(crate) fn type_mismatch(expected: impl ToString, found: Option<Type>) -> Self {
        ExecutorError::TypeMismatch {
            expected: expected.to_string(),
            found: found.map_or_else(|| "null".to_string(), |t| t.to_string()),
        }
    }
}
