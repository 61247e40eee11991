use crate::chunk::{Chunk, Column};
use crate::datum::Value;
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::tuple::{ColumnDesc, Tuple};

/// Emits rows held in memory.
///
/// Rows are grouped into batches; chunk mode returns one chunk per batch,
/// including empty ones, and row mode walks every row in order.
pub struct Values {
    schema: Vec<ColumnDesc>,
    batches: Vec<Vec<Vec<Value>>>,
    batch: usize,
    row: usize,
    current: Option<Tuple>,
}

impl Values {
    /// Creates a source of `batches`, each a list of rows matching `schema`.
    pub fn new(schema: Vec<ColumnDesc>, batches: Vec<Vec<Vec<Value>>>) -> Self {
        Self {
            schema,
            batches,
            batch: 0,
            row: 0,
            current: None,
        }
    }

    /// Total number of rows.
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub(super) fn open(&mut self, _trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.rewind();
        Ok(())
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        while let Some(batch) = self.batches.get(self.batch) {
            if let Some(row) = batch.get(self.row) {
                self.check_width(row)?;
                self.current = Some(Tuple::new(row.clone()));
                self.row += 1;
                return Ok(true);
            }
            self.batch += 1;
            self.row = 0;
        }
        self.current = None;
        Ok(false)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        &self.schema
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        let Some(batch) = self.batches.get(self.batch) else {
            return Ok(false);
        };
        chunk.reset();
        for (id, desc) in self.schema.iter().enumerate() {
            let len = match desc.len {
                0 => desc.ty.default_length(),
                n => n,
            };
            chunk.add_column(Column::with_capacity(desc.ty, len, batch.len()), id);
        }
        for row in batch {
            self.check_width(row)?;
            chunk.append_row(row.clone())?;
        }
        self.batch += 1;
        self.row = 0;
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.rewind();
        Ok(())
    }

    fn rewind(&mut self) {
        self.batch = 0;
        self.row = 0;
        self.current = None;
    }

    fn check_width(&self, row: &[Value]) -> Result<(), ExecutorError> {
        if row.len() != self.schema.len() {
            return Err(ExecutorError::Internal(format!(
                "row has {} values, schema has {} columns",
                row.len(),
                self.schema.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Type;
    use crate::tx::{TransactionManager, Trx};
    use std::sync::Arc;

    fn source() -> Values {
        Values::new(
            vec![ColumnDesc::computed("n", Type::Int, 4)],
            vec![
                vec![vec![Value::Int(1)], vec![Value::Int(2)]],
                vec![],
                vec![vec![Value::Int(3)]],
            ],
        )
    }

    #[test]
    fn test_rows_cross_batches() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut values = source();
        assert_eq!(values.row_count(), 3);
        values.open(&trx).unwrap();
        let mut seen = Vec::new();
        while values.next().unwrap() {
            seen.push(values.current_tuple().unwrap().values()[0].clone());
        }
        assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_chunks_keep_empty_batches() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut values = source();
        values.open(&trx).unwrap();
        let mut chunk = Chunk::new();
        let mut sizes = Vec::new();
        while values.next_chunk(&mut chunk).unwrap() {
            sizes.push(chunk.rows());
        }
        assert_eq!(sizes, vec![2, 0, 1]);
    }

    #[test]
    fn test_ragged_row_is_internal_error() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut values = Values::new(
            vec![ColumnDesc::computed("n", Type::Int, 4)],
            vec![vec![vec![Value::Int(1), Value::Int(2)]]],
        );
        values.open(&trx).unwrap();
        assert!(matches!(values.next(), Err(ExecutorError::Internal(_))));
    }
}
