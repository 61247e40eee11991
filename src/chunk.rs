//! Column batches for vectorized execution.
//!
//! A [`Chunk`] is a set of position-correlated [`Column`]s holding up to
//! [`Chunk::MAX_ROWS`] rows. Each column carries a logical column id used to
//! align schemas across operators.
//!
//! # Ownership
//!
//! Columns are held behind `Arc`, so a chunk either owns its column buffers
//! exclusively or shares them with the chunk it was [`reference`](Chunk::reference)d
//! from. Shared buffers are read-only: mutation through [`Chunk::column_mut`]
//! detaches the column first, and [`Chunk::reset_data`] swaps shared columns
//! for fresh empty ones instead of clearing them in place. A consumer holding
//! a referenced chunk therefore keeps seeing the rows it was handed, even
//! after the producer moves on.

pub mod column;

use std::ops::Range;
use std::sync::Arc;

use crate::datum::{DatumError, Value};

pub use column::Column;

/// A batch of columnar data.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    columns: Vec<Arc<Column>>,
    column_ids: Vec<usize>,
}

impl Chunk {
    /// Maximum number of rows a producer places in one chunk.
    pub const MAX_ROWS: usize = 8192;

    /// Creates a chunk without columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column with the given logical id.
    pub fn add_column(&mut self, column: Column, column_id: usize) {
        self.columns.push(Arc::new(column));
        self.column_ids.push(column_id);
    }

    /// Number of columns.
    pub fn column_num(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows (the length of the first column; 0 without columns).
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index).map(Arc::as_ref)
    }

    /// Returns a mutable column, detaching it first if it is shared.
    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index).map(Arc::make_mut)
    }

    pub fn column_id(&self, index: usize) -> Option<usize> {
        self.column_ids.get(index).copied()
    }

    pub fn column_ids(&self) -> &[usize] {
        &self.column_ids
    }

    /// Iterates columns in order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().map(Arc::as_ref)
    }

    /// Returns the value at (`column`, `row`).
    pub fn get_value(&self, column: usize, row: usize) -> Option<&Value> {
        self.column(column).and_then(|c| c.get_value(row))
    }

    /// Collects one row across all columns.
    pub fn row_values(&self, row: usize) -> Option<Vec<Value>> {
        self.columns
            .iter()
            .map(|c| c.get_value(row).cloned())
            .collect()
    }

    /// Appends one row, one value per column.
    ///
    /// A row of the wrong width is rejected before any column changes.
    pub fn append_row(&mut self, values: Vec<Value>) -> Result<(), DatumError> {
        if values.len() != self.columns.len() {
            return Err(DatumError::RowWidth {
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            Arc::make_mut(column).append_value(value)?;
        }
        Ok(())
    }

    /// Makes this chunk a shared view of `other`'s columns and ids.
    ///
    /// No values are copied.
    pub fn reference(&mut self, other: &Chunk) {
        self.columns.clone_from(&other.columns);
        self.column_ids.clone_from(&other.column_ids);
    }

    /// Returns true if every column of this chunk is shared with `other`.
    pub fn is_reference_of(&self, other: &Chunk) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    /// Removes all columns.
    pub fn reset(&mut self) {
        self.columns.clear();
        self.column_ids.clear();
    }

    /// Removes all rows, keeping the column schema.
    pub fn reset_data(&mut self) {
        for column in &mut self.columns {
            match Arc::get_mut(column) {
                Some(owned) => owned.reset_data(),
                None => *column = Arc::new(column.empty_like()),
            }
        }
    }

    /// Returns an empty chunk with the same column types, lengths and ids.
    pub fn empty_like(&self) -> Chunk {
        Chunk {
            columns: self
                .columns
                .iter()
                .map(|c| Arc::new(c.empty_like()))
                .collect(),
            column_ids: self.column_ids.clone(),
        }
    }

    /// Copies the rows in `range` into a new owned chunk with the same schema.
    pub fn slice(&self, range: Range<usize>) -> Chunk {
        let end = range.end.min(self.rows());
        let start = range.start.min(end);
        Chunk {
            columns: self
                .columns
                .iter()
                .map(|c| Arc::new(c.slice(start..end)))
                .collect(),
            column_ids: self.column_ids.clone(),
        }
    }
}
