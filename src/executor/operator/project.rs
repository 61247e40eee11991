use tracing::warn;

use crate::chunk::{Chunk, Column};
use crate::tx::Transaction;

use super::super::error::ExecutorError;
use super::super::expr::BoundExpr;
use super::super::tuple::{ColumnDesc, Tuple};
use super::PhysicalOperator;

/// Evaluates a list of expressions over each input row.
///
/// Output column `i` carries logical id `i`.
pub struct Project {
    child: Box<PhysicalOperator>,
    expressions: Vec<BoundExpr>,
    schema: Vec<ColumnDesc>,
    input: Chunk,
    current: Option<Tuple>,
}

impl Project {
    pub fn new(child: PhysicalOperator, expressions: Vec<BoundExpr>) -> Self {
        let schema = expressions.iter().map(BoundExpr::column_desc).collect();
        Self {
            child: Box::new(child),
            expressions,
            schema,
            input: Chunk::new(),
            current: None,
        }
    }

    pub fn child(&self) -> &PhysicalOperator {
        &self.child
    }

    pub fn expressions(&self) -> &[BoundExpr] {
        &self.expressions
    }

    pub(super) fn open(&mut self, trx: &dyn Transaction) -> Result<(), ExecutorError> {
        self.current = None;
        self.child.open(trx).inspect_err(|e| {
            warn!(error = %e, operator = "Project", "failed to open child operator");
        })
    }

    pub(super) fn next(&mut self) -> Result<bool, ExecutorError> {
        self.current = None;
        if !self.child.next()? {
            return Ok(false);
        }
        let tuple = self.child.current_tuple().ok_or_else(|| {
            ExecutorError::Internal("child returned a row but exposes no tuple".into())
        })?;
        let values = self
            .expressions
            .iter()
            .map(|e| e.get_value(tuple))
            .collect::<Result<Vec<_>, _>>()?;
        self.current = Some(Tuple::new(values));
        Ok(true)
    }

    pub(super) fn current_tuple(&self) -> Option<&Tuple> {
        self.current.as_ref()
    }

    pub(super) fn tuple_schema(&self) -> &[ColumnDesc] {
        &self.schema
    }

    pub(super) fn next_chunk(&mut self, chunk: &mut Chunk) -> Result<bool, ExecutorError> {
        if !self.child.next_chunk(&mut self.input)? {
            return Ok(false);
        }
        chunk.reset();
        for (id, (expr, desc)) in self.expressions.iter().zip(&self.schema).enumerate() {
            let mut column = Column::new(desc.ty, desc.len);
            expr.get_column(&self.input, &mut column)
                .inspect_err(|e| warn!(error = %e, expr = %expr, "failed to evaluate projection"))?;
            chunk.add_column(column, id);
        }
        Ok(true)
    }

    pub(super) fn close(&mut self) -> Result<(), ExecutorError> {
        self.input.reset();
        self.current = None;
        self.child.close()
    }
}
