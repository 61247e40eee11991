use tracing::warn;

use crate::chunk::Chunk;
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::tuple::{ColumnDesc, Tuple};
use super::PhysicalOperator;

/// Returns at most `limit` rows of its child. A negative limit is unbounded.
///
/// Both protocols check the remaining quota before pulling from the child, so
/// an exhausted (or zero) limit never touches the child again. In chunk mode a
/// batch that fits the quota is shared with the child; otherwise only its
/// leading rows are copied out.
pub struct Limit {
    child: Box<PhysicalOperator>,
    limit: i64,
    returned: usize,
    input: Chunk,
}

impl Limit {
    pub fn new(child: PhysicalOperator, limit: i64) -> Self {
        Self {
            child: Box::new(child),
            limit,
            returned: 0,
            input: Chunk::new(),
        }
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows still allowed, or `None` when unbounded.
    fn remaining(&self) -> Option<usize> {
        usize::try_from(self.limit)
            .ok()
            .map(|limit| limit.saturating_sub(self.returned))
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.returned = 0;
        self.child.open(trx).inspect_err(|e| {
            warn!(error = %e, operator = "Limit", "failed to open child operator");
        })
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        if self.remaining() == Some(0) {
            return Ok(false);
        }
        let more = self.child.next()?;
        if more {
            self.returned += 1;
        }
        Ok(more)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.child.current_tuple()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        self.child.tuple_schema()
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        loop {
            let remaining = self.remaining();
            if remaining == Some(0) {
                return Ok(false);
            }
            if !self.child.next_chunk(&mut self.input)? {
                return Ok(false);
            }
            let rows = self.input.rows();
            if rows == 0 {
                continue;
            }
            match remaining {
                Some(left) if rows > left => {
                    *chunk = self.input.slice(0..left);
                    self.returned += left;
                }
                _ => {
                    chunk.reference(&self.input);
                    self.returned += rows;
                }
            }
            return Ok(true);
        }
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.returned = 0;
        self.input.reset();
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Value;
    use crate::executor::operator::test_util::{drain_chunks, drain_rows, values_operator};
    use crate::tx::{TransactionManager, Trx};
    use std::sync::Arc;

    fn ints(values: &[i32]) -> Vec<Vec<Value>> {
        values.iter().map(|n| vec![Value::Int(*n)]).collect()
    }

    #[test]
    fn test_row_limit() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut limit = PhysicalOperator::Limit(Limit::new(values_operator(&[&[1, 2, 3]]), 2));
        limit.open(&trx).unwrap();
        assert_eq!(drain_rows(&mut limit), ints(&[1, 2]));
        assert!(!limit.next().unwrap());
        limit.close().unwrap();
    }

    #[test]
    fn test_unbounded() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut limit = PhysicalOperator::Limit(Limit::new(values_operator(&[&[1, 2], &[3]]), -1));
        limit.open(&trx).unwrap();
        assert_eq!(drain_chunks(&mut limit), ints(&[1, 2, 3]));
        limit.close().unwrap();
    }

    #[test]
    fn test_zero_limit_never_pulls() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut limit = Limit::new(values_operator(&[&[1]]), 0);
        limit.open(&trx).unwrap();
        assert!(!limit.next().unwrap());
        assert!(!limit.next_chunk(&mut Chunk::new()).unwrap());
        assert!(limit.child().current_tuple().is_none());
    }

    #[test]
    fn test_chunk_passthrough_and_truncation() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let mut limit = Limit::new(values_operator(&[&[1, 2], &[], &[3, 4, 5]]), 3);
        limit.open(&trx).unwrap();

        let mut chunk = Chunk::new();
        assert!(limit.next_chunk(&mut chunk).unwrap());
        assert!(chunk.is_reference_of(&limit.input));
        assert_eq!(chunk.rows(), 2);

        assert!(limit.next_chunk(&mut chunk).unwrap());
        assert!(!chunk.is_reference_of(&limit.input));
        assert_eq!(chunk.rows(), 1);
        assert_eq!(chunk.get_value(0, 0), Some(&Value::Int(3)));

        assert!(!limit.next_chunk(&mut chunk).unwrap());
        limit.close().unwrap();
    }
}
