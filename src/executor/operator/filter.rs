use tracing::warn;

use crate::chunk::{Chunk, Column};
use crate::datum::Value;
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::expr::BoundExpr;
use super::super::tuple::{ColumnDesc, Tuple};
use super::PhysicalOperator;

/// Passes through rows whose predicate evaluates to true.
///
/// NULL and false both drop the row. In chunk mode a batch where every row
/// passes is shared with the child unchanged; a batch where none pass is
/// returned empty rather than skipped.
pub struct Filter {
    child: Box<PhysicalOperator>,
    predicate: BoundExpr,
    input: Chunk,
    mask: Column,
}

impl Filter {
    pub fn new(child: PhysicalOperator, predicate: BoundExpr) -> Self {
        let mask = Column::new(predicate.value_type(), 1);
        Self {
            child: Box::new(child),
            predicate,
            input: Chunk::new(),
            mask,
        }
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn predicate(&self) -> &BoundExpr {
        &self.predicate
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.child.open(trx).inspect_err(|e| {
            warn!(error = %e, operator = "Filter", "failed to open child operator");
        })
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        while self.child.next()? {
            let tuple = self.child.current_tuple().ok_or_else(|| {
                ExecutorError::Internal("child returned a row but exposes no tuple".into())
            })?;
            if matches!(self.predicate.get_value(tuple)?, Value::Boolean(true)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.child.current_tuple()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        self.child.tuple_schema()
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        if !self.child.next_chunk(&mut self.input)? {
            return Ok(false);
        }
        self.predicate
            .get_column(&self.input, &mut self.mask)
            .inspect_err(|e| warn!(error = %e, "failed to evaluate filter predicate"))?;

        let selected: Vec<usize> = self
            .mask
            .values()
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v, Value::Boolean(true)))
            .map(|(row, _)| row)
            .collect();

        if selected.len() == self.input.rows() {
            chunk.reference(&self.input);
            return Ok(true);
        }
        *chunk = self.input.empty_like();
        for row in selected {
            if let Some(values) = self.input.row_values(row) {
                chunk.append_row(values)?;
            }
        }
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.input.reset();
        self.mask.reset_data();
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Type;
    use crate::executor::operator::test_util::{int_column, values_operator};
    use crate::sql::BinaryOperator;
    use crate::tx::TransactionManager;
    use crate::tx::Trx;
    use std::sync::Arc;

    fn greater_than(n: i32) -> BoundExpr {
        BoundExpr::binary(int_column(0, "n"), BinaryOperator::Gt, BoundExpr::Literal(Value::Int(n)))
            .unwrap()
    }

    #[test]
    fn test_row_filter() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let child = values_operator(&[&[1, 5, 3, 7]]);
        let mut filter = Filter::new(child, greater_than(3));
        filter.open(&trx).unwrap();
        let mut out = Vec::new();
        while filter.next().unwrap() {
            out.push(filter.current_tuple().unwrap().values()[0].clone());
        }
        assert_eq!(out, vec![Value::Int(5), Value::Int(7)]);
        filter.close().unwrap();
    }

    #[test]
    fn test_chunk_filter_reference_and_copy() {
        let trx = Trx::new(Arc::new(TransactionManager::new()));
        let child = values_operator(&[&[4, 5], &[1, 2], &[1, 9]]);
        let mut filter = Filter::new(child, greater_than(3));
        filter.open(&trx).unwrap();

        let mut chunk = Chunk::new();
        assert!(filter.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk.rows(), 2);
        assert!(chunk.is_reference_of(&filter.input));

        assert!(filter.next_chunk(&mut chunk).unwrap());
        assert!(chunk.is_empty());
        assert_eq!(chunk.column(0).map(Column::attr_type), Some(Type::Int));

        assert!(filter.next_chunk(&mut chunk).unwrap());
        assert_eq!(chunk.rows(), 1);
        assert_eq!(chunk.get_value(0, 0), Some(&Value::Int(9)));
        assert_eq!(chunk.column_ids(), &[0]);

        assert!(!filter.next_chunk(&mut chunk).unwrap());
        filter.close().unwrap();
    }
}
